//! GPU port of the ecosystem runoff model.
//!
//! Same cell chemistry as the CPU model, different execution shape: instead
//! of walking one runoff event at a time, every cell carries a live event
//! and a kernel advances all of them by one step per dispatch. Every 25th
//! dispatch reseeds one fresh event per cell at a jittered position, so a
//! full iteration is a 25-step generation of simultaneous walks.
//!
//! Concurrent events may touch the same cell in one step; the resulting
//! races are tolerated, matching the stochastic character of the model.
//! This keeps the kernel free of atomics at the cost of exact mass
//! bookkeeping, which is why the CPU model remains the reference
//! implementation.

use bytemuck::{Pod, Zeroable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

use crate::backend::{GpuBackend, GpuField};
use crate::erosion::ecosystem::{EcoParams, ELEVATION_MAX};
use crate::erosion::pipe::progress_fraction;
use crate::erosion::{Erosion, ErosionError};
use crate::params::ParameterCollection;
use crate::terrain::Terrain;

/// Sub-steps per iteration: one reseed dispatch plus 24 walk dispatches.
const STEPS_PER_ITERATION: u32 = 25;

/// Uniform block shared by the init and step kernels. Layout must match the
/// `Params` struct in the WGSL source.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct EcoGpuUniforms {
    width: u32,
    height: u32,
    rand_offset: [f32; 2],
    water_sediment_capacity_p: f32,
    humus_water_capacity_p: f32,
    sand_water_capacity_p: f32,
    rock_water_capacity_p: f32,
    bedrock_water_capacity_p: f32,
    step_time_constant: f32,
    cell_area: f32,
    soil_absorption: f32,
    slope_threshold_sediment_lift: f32,
    bedrock_erosion_base_value: f32,
    rock_erosion_base_value: f32,
    rainfall: f32,
}

impl EcoGpuUniforms {
    fn from_params(p: &EcoParams, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rand_offset: [0.0, 0.0],
            water_sediment_capacity_p: p.water_sediment_capacity_p,
            humus_water_capacity_p: p.humus_water_capacity_p,
            sand_water_capacity_p: p.sand_water_capacity_p,
            rock_water_capacity_p: p.rock_water_capacity_p,
            bedrock_water_capacity_p: p.bedrock_water_capacity_p,
            step_time_constant: p.time_step_years,
            cell_area: p.cell_size,
            soil_absorption: p.soil_absorption,
            slope_threshold_sediment_lift: p.slope_threshold_sediment_lift,
            bedrock_erosion_base_value: p.bedrock_erosion_base_value,
            rock_erosion_base_value: p.rock_erosion_base_value,
            rainfall: p.rainfall,
        }
    }
}

/// Working GPU state, allocated per start at the target's current size.
struct EcoGpuFields {
    /// (bedrock, rock, sand, humus) per cell.
    soil: GpuField,
    /// (moisture, unused, unused, unused) per cell.
    hydro: GpuField,
    /// (x, y, water, sediment) per event; ping-pong [current, next].
    events: [GpuField; 2],
    /// Precomputed uniform variates sampled by both kernels.
    rand_field: GpuField,
    uniform_buffer: wgpu::Buffer,
    init_bind_groups: [wgpu::BindGroup; 2],
    step_bind_groups: [wgpu::BindGroup; 2],
    width: u32,
    height: u32,
}

/// GPU ecosystem erosion simulator.
pub struct EcosystemGpu {
    target: Arc<Terrain>,
    parameters: ParameterCollection,
    backend: GpuBackend,
    init_pipeline: wgpu::ComputePipeline,
    step_pipeline: wgpu::ComputePipeline,
    fields: Option<EcoGpuFields>,
    uniforms: EcoGpuUniforms,
    budget: u32,
    step_counter: u32,
    running: bool,
    slot: usize,
    rng: ChaCha8Rng,
}

impl EcosystemGpu {
    pub fn new(target: Arc<Terrain>) -> Result<Self, ErosionError> {
        let backend = GpuBackend::new()?;
        let init_pipeline = backend.create_pipeline("eco init", ECO_EROSION_SHADER, "init");
        let step_pipeline = backend.create_pipeline("eco step", ECO_EROSION_SHADER, "step");
        let mut parameters = ParameterCollection::new();
        EcoParams::default().register(&mut parameters);
        let uniforms = EcoGpuUniforms::from_params(&EcoParams::default(), 0, 0);
        Ok(Self {
            target,
            parameters,
            backend,
            init_pipeline,
            step_pipeline,
            fields: None,
            uniforms,
            budget: 0,
            step_counter: 0,
            running: false,
            slot: 0,
            rng: ChaCha8Rng::seed_from_u64(0),
        })
    }

    /// Reseed the walk randomness; useful for reproducible runs.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn allocate_fields(&mut self, width: u32, height: u32) -> Result<EcoGpuFields, ErosionError> {
        self.backend.check_field_size(width, height, 4)?;

        // Import elevation as bedrock; rock, sand and humus start empty and
        // develop through weathering, as in the CPU model.
        let mut soil_seed = Vec::with_capacity((width * height * 4) as usize);
        {
            let hf = self.target.heightfield();
            let scale = ELEVATION_MAX / hf.max_sample();
            for sample in hf.samples() {
                soil_seed.push(sample * scale); // bedrock
                soil_seed.push(0.0); // rock
                soil_seed.push(0.0); // sand
                soil_seed.push(0.0); // humus
            }
        }

        // One uniform variate per cell; kernels index it with a per-dispatch
        // offset so the stream does not repeat across steps.
        let rand_seed: Vec<f32> = (0..(width * height * 4) as usize)
            .map(|_| self.rng.gen::<f32>())
            .collect();

        let b = &self.backend;
        let soil = b.create_field_with("eco soil", width, height, 4, &soil_seed);
        let hydro = b.create_field("eco hydro", width, height, 4);
        let rand_field = b.create_field_with("eco rand", width, height, 4, &rand_seed);
        let events = [
            b.create_field("eco events a", width, height, 4),
            b.create_field("eco events b", width, height, 4),
        ];
        let uniform_buffer = b.create_uniform("eco params", &self.uniforms);

        // The inferred layouts differ per kernel: `init` never touches the
        // soil or moisture fields, so its groups must omit those bindings.
        let init_layout = self.init_pipeline.get_bind_group_layout(0);
        let init_bind_groups = [0usize, 1].map(|src| {
            b.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("eco init bind group"),
                layout: &init_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: rand_field.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: events[src].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: events[1 - src].buffer.as_entire_binding(),
                    },
                ],
            })
        });

        let step_layout = self.step_pipeline.get_bind_group_layout(0);
        let step_bind_groups = [0usize, 1].map(|src| {
            b.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("eco step bind group"),
                layout: &step_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: soil.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: hydro.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: rand_field.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: events[src].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: events[1 - src].buffer.as_entire_binding(),
                    },
                ],
            })
        });

        Ok(EcoGpuFields {
            soil,
            hydro,
            events,
            rand_field,
            uniform_buffer,
            init_bind_groups,
            step_bind_groups,
            width,
            height,
        })
    }

    fn run_erosion(&mut self) {
        let rand_offset = [self.rng.gen::<f32>(), self.rng.gen::<f32>()];
        self.uniforms.rand_offset = rand_offset;

        let Some(fields) = &self.fields else { return };
        self.backend.queue.write_buffer(
            &fields.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        if self.step_counter % STEPS_PER_ITERATION == 0 {
            // New generation: one fresh event per cell.
            self.backend.dispatch_2d(
                &self.init_pipeline,
                &fields.init_bind_groups[self.slot],
                fields.width,
                fields.height,
            );
        } else {
            self.backend.dispatch_2d(
                &self.step_pipeline,
                &fields.step_bind_groups[self.slot],
                fields.width,
                fields.height,
            );
            self.slot = 1 - self.slot;
        }

        self.step_counter += 1;
        if self.step_counter >= self.budget {
            self.finish();
        }
    }

    /// Download the soil field and write total elevation back to the target.
    fn finish(&mut self) {
        self.running = false;
        let Some(fields) = &self.fields else { return };
        match self.backend.download(&fields.soil) {
            Ok(data) => {
                let mut hf = self.target.heightfield_mut();
                if hf.width as u32 != fields.width || hf.height as u32 != fields.height {
                    eprintln!("ecosystem GPU erosion: target surface was resized mid-run");
                    return;
                }
                let scale = hf.max_sample() / ELEVATION_MAX;
                let max_sample = hf.max_sample();
                for (sample, cell) in hf.samples_mut().iter_mut().zip(data.chunks_exact(4)) {
                    let elevation = cell[0] + cell[1] + cell[2] + cell[3];
                    *sample = (elevation * scale).clamp(0.0, max_sample);
                }
            }
            Err(e) => eprintln!("ecosystem GPU erosion: readback failed: {}", e),
        }
    }
}

impl Erosion for EcosystemGpu {
    fn name(&self) -> &str {
        "ecosystem_gpu"
    }

    fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterCollection {
        &mut self.parameters
    }

    fn start_erosion_task(&mut self) -> Result<(), ErosionError> {
        if self.running {
            return Ok(());
        }

        let (width, height) = self.target.size();
        if width == 0 || height == 0 {
            return Err(ErosionError::EmptyTarget { width, height });
        }

        let params = EcoParams::snapshot(&self.parameters);
        self.uniforms = EcoGpuUniforms::from_params(&params, width as u32, height as u32);
        self.budget = params.iterations.max(1) * STEPS_PER_ITERATION;

        self.fields = None;
        self.fields = Some(self.allocate_fields(width as u32, height as u32)?);

        self.step_counter = 0;
        self.slot = 0;
        self.running = true;
        Ok(())
    }

    /// Stops dispatching and writes back whatever the fields hold now, so a
    /// cancelled run still surfaces its partial result.
    fn stop_erosion_task(&mut self) {
        if self.running {
            self.finish();
        }
    }

    fn update(&mut self) {
        if self.running {
            self.run_erosion();
        }
    }

    fn progress(&self) -> f32 {
        progress_fraction(self.step_counter, self.budget)
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// WGSL kernels. `init` seeds one runoff event per cell at a jittered
/// position; `step` advances every event one walk step against the shared
/// soil and moisture fields.
const ECO_EROSION_SHADER: &str = r#"
struct Params {
    width: u32,
    height: u32,
    rand_offset: vec2<f32>,
    water_sediment_capacity_p: f32,
    humus_water_capacity_p: f32,
    sand_water_capacity_p: f32,
    rock_water_capacity_p: f32,
    bedrock_water_capacity_p: f32,
    step_time_constant: f32,
    cell_area: f32,
    soil_absorption: f32,
    slope_threshold_sediment_lift: f32,
    bedrock_erosion_base_value: f32,
    rock_erosion_base_value: f32,
    rainfall: f32,
}

// soil  = (bedrock, rock, sand, humus)
// hydro = (moisture, 0, 0, 0)
// event = (x, y, water, sediment); water < 0 marks a dead event
@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> soil: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> hydro: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read> rand_field: array<vec4<f32>>;
@group(0) @binding(4) var<storage, read_write> src_events: array<vec4<f32>>;
@group(0) @binding(5) var<storage, read_write> dst_events: array<vec4<f32>>;

fn in_bounds(x: i32, y: i32) -> bool {
    return x >= 0 && x < i32(params.width) && y >= 0 && y < i32(params.height);
}

fn idx_of(x: i32, y: i32) -> u32 {
    return u32(y) * params.width + u32(x);
}

fn cell_count() -> u32 {
    return params.width * params.height;
}

// Per-invocation uniform variate: the precomputed noise cell addressed by a
// dispatch-constant offset.
fn rand_at(i: u32, channel: u32) -> f32 {
    let shift = u32(params.rand_offset.x * f32(cell_count()));
    return rand_field[(i + shift) % cell_count()][channel];
}

fn total_elevation(i: u32) -> f32 {
    let s = soil[i];
    return s.x + s.y + s.z + s.w;
}

fn granular_depth(i: u32) -> f32 {
    let s = soil[i];
    return s.y + s.z + s.w;
}

fn logistic_between(x: f32, low: f32, high: f32, mul: f32) -> f32 {
    let t = clamp((x - low) / max(high - low, 1e-6), 0.0, 1.0);
    return mul / (1.0 + exp(-10.0 * (t - 0.5)));
}

@compute @workgroup_size(8, 8)
fn init(@builtin(global_invocation_id) gid: vec3<u32>) {
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (!in_bounds(x, y)) {
        return;
    }
    let i = idx_of(x, y);

    // Jitter the spawn point inside a small neighborhood of the home cell.
    let jx = clamp(x + i32(floor(rand_at(i, 0u) * 3.0)) - 1, 0, i32(params.width) - 1);
    let jy = clamp(y + i32(floor(rand_at(i, 1u) * 3.0)) - 1, 0, i32(params.height) - 1);
    let water = params.rainfall * params.step_time_constant;
    src_events[i] = vec4<f32>(f32(jx), f32(jy), water, 0.0);
    dst_events[i] = vec4<f32>(0.0, 0.0, -1.0, 0.0);
}

@compute @workgroup_size(8, 8)
fn step(@builtin(global_invocation_id) gid: vec3<u32>) {
    let sx = i32(gid.x);
    let sy = i32(gid.y);
    if (!in_bounds(sx, sy)) {
        return;
    }
    let slot = idx_of(sx, sy);

    var event = src_events[slot];
    if (event.z < 0.0) {
        dst_events[slot] = event;
        return;
    }

    let x = i32(event.x);
    let y = i32(event.y);
    if (!in_bounds(x, y)) {
        dst_events[slot] = vec4<f32>(0.0, 0.0, -1.0, 0.0);
        return;
    }
    let i = idx_of(x, y);

    var water = event.z;
    var sediment = event.w;
    let here = total_elevation(i);

    // Weighted pick over strictly lower 8-neighbors; roulette position from
    // the noise field stands in for the CPU model's RNG draw.
    var weight_sum = 0.0;
    var weights: array<f32, 8>;
    var offsets = array<vec2<i32>, 8>(
        vec2<i32>(0, -1), vec2<i32>(1, -1), vec2<i32>(1, 0), vec2<i32>(1, 1),
        vec2<i32>(0, 1), vec2<i32>(-1, 1), vec2<i32>(-1, 0), vec2<i32>(-1, -1),
    );
    for (var d = 0u; d < 8u; d = d + 1u) {
        let nx = x + offsets[d].x;
        let ny = y + offsets[d].y;
        var w = 0.0;
        if (in_bounds(nx, ny)) {
            let drop = here - total_elevation(idx_of(nx, ny));
            if (drop > 0.0) {
                w = drop;
            }
        }
        weights[d] = w;
        weight_sum = weight_sum + w;
    }

    var grade = 0.0;
    var dir = -1;
    if (weight_sum > 0.0) {
        var roll = rand_at(slot, 2u) * weight_sum;
        for (var d = 0u; d < 8u; d = d + 1u) {
            roll = roll - weights[d];
            if (weights[d] > 0.0 && roll <= 0.0) {
                dir = i32(d);
                grade = weights[d] / params.cell_area;
                break;
            }
        }
    }

    var s = soil[i];
    var moisture = hydro[i].x;
    let r_slope = logistic_between(grade, -4.0, 5.0, 10.0);

    // Soil drinks part of the passing water, up to its layered capacity.
    let capacity = s.w * params.humus_water_capacity_p
        + s.z * params.sand_water_capacity_p
        + s.y * params.rock_water_capacity_p
        + params.bedrock_water_capacity_p;
    let absorb = clamp(
        params.soil_absorption * params.step_time_constant * water,
        0.0,
        max(capacity - moisture, 0.0),
    );
    water = water - absorb;
    moisture = moisture + absorb;

    if (dir >= 0 && grade > params.slope_threshold_sediment_lift) {
        // Fast flow lifts material, softest layer first.
        let saturation = sediment / max(water * params.water_sediment_capacity_p, 1e-6);
        let mobility = params.step_time_constant * water
            * (r_slope + 0.2 * logistic_between(saturation, 0.0, 1.0, 1.0))
            * (1.0 - logistic_between(granular_depth(i), 0.1, 2.0, 1.0));

        let from_sand = min(s.z, mobility);
        s.z = s.z - from_sand;
        var lifted = from_sand;

        let weather_rock = min(s.y, mobility * params.rock_erosion_base_value);
        s.y = s.y - weather_rock;
        s.z = s.z + weather_rock;

        let weather_bedrock = min(s.x, mobility * params.bedrock_erosion_base_value);
        s.x = s.x - weather_bedrock;
        s.y = s.y + weather_bedrock;

        sediment = sediment + lifted;
    } else {
        // Slow flow settles suspended material out as sand.
        let settled = sediment * 0.5;
        sediment = sediment - settled;
        s.z = s.z + settled;
    }

    // Keep the suspended load within the water's carrying capacity.
    let max_load = water * params.water_sediment_capacity_p;
    if (sediment > max_load) {
        let spill = sediment - max_load;
        sediment = max_load;
        s.z = s.z + spill;
    }

    soil[i] = s;
    hydro[i] = vec4<f32>(moisture, 0.0, 0.0, 0.0);

    if (dir < 0 || water <= 0.0) {
        // Terminal cell: drop the remaining load and retire the event.
        soil[i].z = soil[i].z + sediment;
        dst_events[slot] = vec4<f32>(0.0, 0.0, -1.0, 0.0);
        return;
    }

    let nx = x + offsets[u32(dir)].x;
    let ny = y + offsets[u32(dir)].y;
    dst_events[slot] = vec4<f32>(f32(nx), f32(ny), water, sediment);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_size_matches_shader_layout() {
        // 2 u32 + 2 f32 offsets + 12 f32 params = 16 scalars.
        assert_eq!(std::mem::size_of::<EcoGpuUniforms>(), 16 * 4);
    }

    #[test]
    fn test_uniforms_mirror_cpu_parameter_snapshot() {
        let mut parameters = ParameterCollection::new();
        EcoParams::default().register(&mut parameters);
        assert!(parameters.set_param("rainfall", 4.0));
        assert!(parameters.set_param("soil_absorption", 0.5));

        let params = EcoParams::snapshot(&parameters);
        let u = EcoGpuUniforms::from_params(&params, 128, 64);
        assert_eq!(u.width, 128);
        assert_eq!(u.height, 64);
        assert_eq!(u.rainfall, 4.0);
        assert_eq!(u.soil_absorption, 0.5);
        assert_eq!(u.step_time_constant, params.time_step_years);
    }

    #[test]
    fn test_progress_spans_full_step_budget() {
        let budget = 4 * STEPS_PER_ITERATION;
        assert_eq!(progress_fraction(0, budget), 0.0);
        assert_eq!(progress_fraction(budget / 2, budget), 0.5);
        assert_eq!(progress_fraction(budget, budget), 1.0);
        assert_eq!(progress_fraction(budget + 10, budget), 1.0);
    }
}
