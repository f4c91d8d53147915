//! Canonical terrain elevation surface.
//!
//! A [`HeightField`] stores one f32 sample per cell in `[0, max_sample]`,
//! where `max_sample` is the largest representable elevation (16-bit
//! heightmap convention, so `u16::MAX`). Simulators import these samples
//! into their working grids and write eroded elevations back; the renderer
//! only ever reads.

use thiserror::Error;

/// Largest sample value a heightfield can hold (16-bit heightmap range).
pub const MAX_SAMPLE: f32 = u16::MAX as f32;

#[derive(Debug, Error)]
pub enum HeightFieldError {
    #[error("region {x},{y} {width}x{height} exceeds surface {surface_width}x{surface_height}")]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        surface_width: usize,
        surface_height: usize,
    },
    #[error("sample count {got} does not match region size {expected}")]
    SampleCountMismatch { got: usize, expected: usize },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// A width x height grid of elevation samples.
#[derive(Clone, Debug)]
pub struct HeightField {
    pub width: usize,
    pub height: usize,
    data: Vec<f32>,
}

impl HeightField {
    /// Create a flat heightfield at elevation zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_samples(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Maximum representable elevation sample.
    pub fn max_sample(&self) -> f32 {
        MAX_SAMPLE
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Replace the whole surface, adopting the new dimensions.
    pub fn set_data(&mut self, other: HeightField) {
        *self = other;
    }

    /// Replace a sub-rectangle of samples in place. Rejects regions that
    /// extend past the surface instead of truncating them.
    pub fn write_region(
        &mut self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        samples: &[f32],
    ) -> Result<(), HeightFieldError> {
        if x + width > self.width || y + height > self.height {
            return Err(HeightFieldError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                surface_width: self.width,
                surface_height: self.height,
            });
        }
        if samples.len() != width * height {
            return Err(HeightFieldError::SampleCountMismatch {
                got: samples.len(),
                expected: width * height,
            });
        }
        for row in 0..height {
            let src = &samples[row * width..(row + 1) * width];
            let start = (y + row) * self.width + x;
            self.data[start..start + width].copy_from_slice(src);
        }
        Ok(())
    }

    /// Load a heightfield from a grayscale PNG (any bit depth; converted to
    /// 16-bit luma).
    pub fn load_png(path: &str) -> Result<Self, HeightFieldError> {
        let img = image::open(path)?.into_luma16();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let data = img.pixels().map(|p| p.0[0] as f32).collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Save as a 16-bit grayscale PNG, clamping samples to the representable
    /// range.
    pub fn save_png(&self, path: &str) -> Result<(), HeightFieldError> {
        let img = image::ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
            let sample = self.get(x as usize, y as usize).clamp(0.0, MAX_SAMPLE);
            image::Luma([sample as u16])
        });
        img.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_heightfield_is_flat() {
        let hf = HeightField::new(8, 4);
        assert_eq!(hf.width, 8);
        assert_eq!(hf.height, 4);
        assert!(hf.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut hf = HeightField::new(4, 4);
        hf.set(2, 3, 1234.5);
        assert_eq!(hf.get(2, 3), 1234.5);
    }

    #[test]
    fn test_write_region() {
        let mut hf = HeightField::new(4, 4);
        hf.write_region(1, 1, 2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(hf.get(1, 1), 1.0);
        assert_eq!(hf.get(2, 1), 2.0);
        assert_eq!(hf.get(1, 2), 3.0);
        assert_eq!(hf.get(2, 2), 4.0);
        assert_eq!(hf.get(0, 0), 0.0);
    }

    #[test]
    fn test_write_region_rejects_overflow() {
        let mut hf = HeightField::new(4, 4);
        let result = hf.write_region(3, 3, 2, 2, &[0.0; 4]);
        assert!(matches!(
            result,
            Err(HeightFieldError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_write_region_rejects_bad_sample_count() {
        let mut hf = HeightField::new(4, 4);
        let result = hf.write_region(0, 0, 2, 2, &[0.0; 3]);
        assert!(matches!(
            result,
            Err(HeightFieldError::SampleCountMismatch { .. })
        ));
    }
}
