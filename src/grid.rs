//! Generic simulation cell grid with Moore-neighborhood lookup.
//!
//! Each simulator instantiates [`CellGrid`] with its own per-cell record and
//! moves elevation in and out of the shared [`HeightField`] through the
//! [`ElevationCell`] trait. Neighbor lookup is bounds-checked and returns
//! `None` past the grid edge — the grid never wraps and never clamps.

use rayon::prelude::*;
use thiserror::Error;

use crate::heightfield::HeightField;

/// Direction indices for the 8-neighborhood.
/// Order: N, NE, E, SE, S, SW, W, NW
pub const DIR_N: usize = 0;
pub const DIR_NE: usize = 1;
pub const DIR_E: usize = 2;
pub const DIR_SE: usize = 3;
pub const DIR_S: usize = 4;
pub const DIR_SW: usize = 5;
pub const DIR_W: usize = 6;
pub const DIR_NW: usize = 7;

/// Direction offsets (dx, dy), same order as the indices above.
pub const DIR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
];

#[derive(Debug, Error)]
pub enum GridError {
    #[error("heightfield is {hf_width}x{hf_height} but the working grid was allocated {grid_width}x{grid_height}")]
    SizeMismatch {
        hf_width: usize,
        hf_height: usize,
        grid_width: usize,
        grid_height: usize,
    },
}

/// Cell types that carry an elevation channel the grid can import/export.
pub trait ElevationCell {
    fn elevation(&self) -> f32;
    fn set_elevation(&mut self, elevation: f32);
}

/// The 8 Moore neighbors of a cell. Entries are `None` at grid edges;
/// callers must check before use.
pub struct Neighborhood<'a, T> {
    /// [N, NE, E, SE, S, SW, W, NW]
    pub adjacent: [Option<&'a T>; 8],
}

impl<'a, T> Neighborhood<'a, T> {
    pub fn north(&self) -> Option<&'a T> {
        self.adjacent[DIR_N]
    }
    pub fn north_east(&self) -> Option<&'a T> {
        self.adjacent[DIR_NE]
    }
    pub fn east(&self) -> Option<&'a T> {
        self.adjacent[DIR_E]
    }
    pub fn south_east(&self) -> Option<&'a T> {
        self.adjacent[DIR_SE]
    }
    pub fn south(&self) -> Option<&'a T> {
        self.adjacent[DIR_S]
    }
    pub fn south_west(&self) -> Option<&'a T> {
        self.adjacent[DIR_SW]
    }
    pub fn west(&self) -> Option<&'a T> {
        self.adjacent[DIR_W]
    }
    pub fn north_west(&self) -> Option<&'a T> {
        self.adjacent[DIR_NW]
    }

    pub fn valid_count(&self) -> usize {
        self.adjacent.iter().filter(|n| n.is_some()).count()
    }
}

/// A width x height array of simulation cell records.
#[derive(Clone, Debug)]
pub struct CellGrid<T> {
    pub width: usize,
    pub height: usize,
    /// Physical elevation corresponding to a full-scale heightfield sample.
    pub elevation_max: f32,
    data: Vec<T>,
}

impl<T: Clone + Default> CellGrid<T> {
    pub fn new(width: usize, height: usize, elevation_max: f32) -> Self {
        Self {
            width,
            height,
            elevation_max,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T> CellGrid<T> {
    pub fn at(&self, x: usize, y: usize) -> &T {
        &self.data[y * self.width + x]
    }

    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut T {
        &mut self.data[y * self.width + x]
    }

    /// Bounds-checked access. Signed coordinates so callers can probe
    /// one-past-the-edge without wrapping tricks.
    pub fn safe_get(&self, x: i32, y: i32) -> Option<&T> {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            Some(self.at(x as usize, y as usize))
        } else {
            None
        }
    }

    pub fn safe_get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            Some(self.at_mut(x as usize, y as usize))
        } else {
            None
        }
    }

    /// The 8 neighbors of (x, y), `None` past the grid edge.
    pub fn neighborhood_of(&self, x: i32, y: i32) -> Neighborhood<'_, T> {
        let mut adjacent = [None; 8];
        for (i, &(dx, dy)) in DIR_OFFSETS.iter().enumerate() {
            adjacent[i] = self.safe_get(x + dx, y + dy);
        }
        Neighborhood { adjacent }
    }

    pub fn cells(&self) -> &[T] {
        &self.data
    }

    pub fn cells_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn check_dims(&self, hf: &HeightField) -> Result<(), GridError> {
        if hf.width != self.width || hf.height != self.height {
            return Err(GridError::SizeMismatch {
                hf_width: hf.width,
                hf_height: hf.height,
                grid_width: self.width,
                grid_height: self.height,
            });
        }
        Ok(())
    }
}

impl<T: ElevationCell + Send + Sync> CellGrid<T> {
    /// Import elevation from a heightfield into the grid's elevation channel,
    /// rescaling samples into physical units:
    /// `elevation = sample / max_sample * elevation_max`.
    pub fn copy_elevation(&mut self, hf: &HeightField) -> Result<(), GridError> {
        self.check_dims(hf)?;
        let scale = self.elevation_max / hf.max_sample();
        let width = self.width;
        self.data
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, cell)| {
                let (x, y) = (idx % width, idx / width);
                cell.set_elevation(hf.get(x, y) * scale);
            });
        Ok(())
    }

    /// Export the elevation channel back into a heightfield, clamped to the
    /// heightfield's representable range.
    pub fn copy_elevation_to(&self, hf: &mut HeightField) -> Result<(), GridError> {
        self.check_dims(hf)?;
        let max_sample = hf.max_sample();
        let scale = max_sample / self.elevation_max;
        let width = self.width;
        let data = &self.data;
        hf.samples_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, sample)| {
                let (x, y) = (idx % width, idx / width);
                let cell = &data[y * width + x];
                *sample = (cell.elevation() * scale).clamp(0.0, max_sample);
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TestCell {
        z: f32,
    }

    impl ElevationCell for TestCell {
        fn elevation(&self) -> f32 {
            self.z
        }
        fn set_elevation(&mut self, elevation: f32) {
            self.z = elevation;
        }
    }

    #[test]
    fn test_corner_neighborhood_edges_are_none() {
        let grid: CellGrid<TestCell> = CellGrid::new(3, 3, 500.0);
        let n = grid.neighborhood_of(0, 0);

        assert!(n.north().is_none());
        assert!(n.north_east().is_none());
        assert!(n.north_west().is_none());
        assert!(n.west().is_none());
        assert!(n.south_west().is_none());

        assert!(n.east().is_some());
        assert!(n.south().is_some());
        assert!(n.south_east().is_some());

        assert_eq!(n.valid_count(), 3);
    }

    #[test]
    fn test_interior_neighborhood_is_full() {
        let grid: CellGrid<TestCell> = CellGrid::new(3, 3, 500.0);
        assert_eq!(grid.neighborhood_of(1, 1).valid_count(), 8);
    }

    #[test]
    fn test_safe_get_does_not_wrap() {
        let grid: CellGrid<TestCell> = CellGrid::new(4, 4, 500.0);
        assert!(grid.safe_get(-1, 0).is_none());
        assert!(grid.safe_get(4, 0).is_none());
        assert!(grid.safe_get(0, -1).is_none());
        assert!(grid.safe_get(0, 4).is_none());
        assert!(grid.safe_get(3, 3).is_some());
    }

    #[test]
    fn test_copy_elevation_scaling_roundtrip() {
        let mut hf = HeightField::new(2, 2);
        hf.set(0, 0, hf.max_sample()); // full scale
        hf.set(1, 0, hf.max_sample() / 2.0);

        let mut grid: CellGrid<TestCell> = CellGrid::new(2, 2, 500.0);
        grid.copy_elevation(&hf).unwrap();

        assert!((grid.at(0, 0).z - 500.0).abs() < 1e-3);
        assert!((grid.at(1, 0).z - 250.0).abs() < 1e-3);

        let mut out = HeightField::new(2, 2);
        grid.copy_elevation_to(&mut out).unwrap();
        assert!((out.get(0, 0) - hf.get(0, 0)).abs() < 1.0);
        assert!((out.get(1, 0) - hf.get(1, 0)).abs() < 1.0);
    }

    #[test]
    fn test_copy_elevation_to_clamps() {
        let mut grid: CellGrid<TestCell> = CellGrid::new(1, 1, 500.0);
        grid.at_mut(0, 0).z = 10_000.0; // far above elevation_max

        let mut hf = HeightField::new(1, 1);
        grid.copy_elevation_to(&mut hf).unwrap();
        assert_eq!(hf.get(0, 0), hf.max_sample());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let hf = HeightField::new(4, 4);
        let mut grid: CellGrid<TestCell> = CellGrid::new(2, 2, 500.0);
        assert!(matches!(
            grid.copy_elevation(&hf),
            Err(GridError::SizeMismatch { .. })
        ));
    }
}
