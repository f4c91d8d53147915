//! Headless wgpu compute backend for the GPU erosion models.
//!
//! Owns one device/queue pair and provides the small set of operations the
//! simulators need: allocate a 2D storage field, upload/download its
//! contents, and dispatch a compute kernel over a 2D domain. Execution is
//! single-queue and submission-ordered; the simulators never issue explicit
//! cross-dispatch synchronization.

use bytemuck::Pod;
use thiserror::Error;
use wgpu::util::DeviceExt;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to request device: {0}")]
    RequestDevice(String),
    #[error("failed to map staging buffer: {0}")]
    MapFailed(String),
    #[error("field of {requested} bytes exceeds device buffer limit of {limit} bytes")]
    FieldTooLarge { requested: u64, limit: u64 },
}

/// A 2D read/write field living in GPU memory, stored as a flat array with
/// `channels` f32 values per cell.
pub struct GpuField {
    pub buffer: wgpu::Buffer,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl GpuField {
    pub fn size_bytes(&self) -> u64 {
        (self.width as u64) * (self.height as u64) * (self.channels as u64) * 4
    }
}

/// Device/queue wrapper shared by the GPU-class simulators.
pub struct GpuBackend {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuBackend {
    /// Create a headless device/queue suitable for compute. Fails with a
    /// typed error when no adapter or device is available.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        println!("GPU adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("erosim compute"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        Ok(Self { device, queue })
    }

    /// Verify a field of the requested size can be allocated and bound on
    /// this device. Failing here keeps a `start` attempt from running on
    /// undersized buffers.
    pub fn check_field_size(&self, width: u32, height: u32, channels: u32) -> Result<(), GpuError> {
        let requested = (width as u64) * (height as u64) * (channels as u64) * 4;
        let limits = self.device.limits();
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if requested > limit {
            return Err(GpuError::FieldTooLarge { requested, limit });
        }
        Ok(())
    }

    /// Allocate a zero-initialized field of `width * height` cells with
    /// `channels` f32 values each.
    pub fn create_field(&self, label: &str, width: u32, height: u32, channels: u32) -> GpuField {
        let zeros = vec![0f32; (width * height * channels) as usize];
        self.create_field_with(label, width, height, channels, &zeros)
    }

    /// Allocate a field seeded with `data` (length `width * height * channels`).
    pub fn create_field_with(
        &self,
        label: &str,
        width: u32,
        height: u32,
        channels: u32,
        data: &[f32],
    ) -> GpuField {
        debug_assert_eq!(data.len(), (width * height * channels) as usize);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            });
        GpuField {
            buffer,
            width,
            height,
            channels,
        }
    }

    /// Create a uniform buffer from a plain-old-data parameter block.
    pub fn create_uniform<T: Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(value),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Overwrite a field's contents from the CPU.
    pub fn upload(&self, field: &GpuField, data: &[f32]) {
        debug_assert_eq!(data.len() as u64 * 4, field.size_bytes());
        self.queue
            .write_buffer(&field.buffer, 0, bytemuck::cast_slice(data));
    }

    /// Read a field's contents back to the CPU through a staging buffer.
    /// Blocks until the copy completes.
    pub fn download(&self, field: &GpuField) -> Result<Vec<f32>, GpuError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("erosim staging"),
            size: field.size_bytes(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("erosim readback"),
            });
        encoder.copy_buffer_to_buffer(&field.buffer, 0, &staging, 0, field.size_bytes());
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| GpuError::MapFailed(e.to_string()))?
            .map_err(|e| GpuError::MapFailed(e.to_string()))?;

        let data = slice.get_mapped_range();
        let out: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(out)
    }

    /// Encode and submit one compute dispatch covering a `width * height`
    /// domain with 8x8 workgroups.
    pub fn dispatch_2d(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        width: u32,
        height: u32,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("erosim dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("erosim pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(width.div_ceil(8), height.div_ceil(8), 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Build a compute pipeline from WGSL source. The bind group layout is
    /// inferred from the shader.
    pub fn create_pipeline(&self, label: &str, wgsl: &str, entry: &str) -> wgpu::ComputePipeline {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(wgsl)),
            });
        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
    }
}
