//! Virtual-pipes hydraulic erosion on the GPU.
//!
//! The primary erosion model. Water sits in a column on every cell and
//! exchanges volume with its 4-connected neighbors through virtual pipes;
//! flow velocity suspends soil into sediment, transports it downstream and
//! deposits it where the flow slows. A thermal term collapses slopes
//! steeper than the talus angle.
//!
//! Field state is double buffered: {elevation, outflow, velocity} exist in
//! two copies ("current" and "next") and a slot flag flips after each step,
//! so call sites never hard-code buffer identity. Two auxiliary soil-flow
//! fields carry the thermal flux with one step of lag and are read and
//! rewritten every step without swapping.
//!
//! All state transitions happen on the caller's thread; the backend queue
//! executes submissions in order, so each step's dispatch is complete by
//! the time the following readback is mapped.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;

use crate::backend::{GpuBackend, GpuField};
use crate::erosion::{Erosion, ErosionError};
use crate::params::ParameterCollection;
use crate::terrain::Terrain;

/// Uniform parameter block handed to the compute kernel. Layout must match
/// the `Params` struct in the WGSL source.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PipeUniforms {
    width: u32,
    height: u32,
    _pad0: [u32; 2],
    water_sediment_capacity: f32,
    maximal_erosion_depth: f32,
    step_time_constant: f32,
    cell_size: f32,
    rock_erosion_base_value: f32,
    rainfall: f32,
    terrain_elevation_scale: f32,
    virtual_pipe_area: f32,
    soil_suspension_rate: f32,
    sediment_deposition_rate: f32,
    soil_softness_max: f32,
    water_evaporation_rate: f32,
    thermal_erosion_rate: f32,
    talus_angle_tangent_coef: f32,
    talus_angle_tangent_bias: f32,
    _pad1: f32,
}

impl PipeUniforms {
    fn register(parameters: &mut ParameterCollection) {
        parameters.add_parameter("water_sediment_capacity", 0.1, 3.0, 1.0);
        parameters.add_parameter("maximal_erosion_depth", 0.0, 40.0, 10.0);
        // min == max marks the unconstrained integer knob.
        parameters.add_parameter("iterations", 1.0, 1.0, 1000.0);
        parameters.add_parameter("step_time_constant", 0.01, 10.0, 0.05);
        // rainfall in meters per step
        parameters.add_parameter("rainfall", 0.0001, 0.5, 0.01);
        parameters.add_parameter("cell_size", 0.5, 150.0, 30.0);
        parameters.add_parameter("rock_erosion_base_value", 0.0001, 0.1, 0.05);
        parameters.add_parameter("terrain_elevation_scale", 1.0, 500.0, 100.0);
        parameters.add_parameter("virtual_pipe_area", 0.1, 60.0, 10.0);
        parameters.add_parameter("soil_suspension_rate", 0.1, 2.0, 0.5);
        parameters.add_parameter("sediment_deposition_rate", 0.1, 3.0, 1.0);
        parameters.add_parameter("soil_softness_max", 0.1, 1.0, 0.1);
        parameters.add_parameter("water_evaporation_rate", 0.0, 0.05, 0.015);
        parameters.add_parameter("thermal_erosion_rate", 0.0, 3.0, 0.15);
        parameters.add_parameter("talus_angle_tangent_coef", 0.0, 1.0, 0.8);
        parameters.add_parameter("talus_angle_tangent_bias", 0.0, 1.0, 0.1);
    }

    fn snapshot(parameters: &ParameterCollection, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            _pad0: [0; 2],
            water_sediment_capacity: parameters.get_param("water_sediment_capacity"),
            maximal_erosion_depth: parameters.get_param("maximal_erosion_depth"),
            step_time_constant: parameters.get_param("step_time_constant"),
            cell_size: parameters.get_param("cell_size"),
            rock_erosion_base_value: parameters.get_param("rock_erosion_base_value"),
            rainfall: parameters.get_param("rainfall"),
            terrain_elevation_scale: parameters.get_param("terrain_elevation_scale"),
            virtual_pipe_area: parameters.get_param("virtual_pipe_area"),
            soil_suspension_rate: parameters.get_param("soil_suspension_rate"),
            sediment_deposition_rate: parameters.get_param("sediment_deposition_rate"),
            soil_softness_max: parameters.get_param("soil_softness_max"),
            water_evaporation_rate: parameters.get_param("water_evaporation_rate"),
            thermal_erosion_rate: parameters.get_param("thermal_erosion_rate"),
            talus_angle_tangent_coef: parameters.get_param("talus_angle_tangent_coef"),
            talus_angle_tangent_bias: parameters.get_param("talus_angle_tangent_bias"),
            _pad1: 0.0,
        }
    }
}

/// Progress fraction, clamped so extra `update` calls past the budget never
/// report more than 1.0.
pub(crate) fn progress_fraction(iter_counter: u32, iterations: u32) -> f32 {
    if iterations == 0 {
        return 0.0;
    }
    (iter_counter as f32 / iterations as f32).min(1.0)
}

/// Working GPU state, allocated per start at the target's current size.
struct PipeFields {
    /// [current, next] per field; `slot` indexes the current copy.
    terrain: [GpuField; 2],
    outflow: [GpuField; 2],
    velocity: [GpuField; 2],
    soil_flow_cardinal: GpuField,
    soil_flow_diagonal: GpuField,
    uniform_buffer: wgpu::Buffer,
    /// Bind group for each slot direction (current -> next).
    bind_groups: [wgpu::BindGroup; 2],
    width: u32,
    height: u32,
}

/// GPU pipe-model hydraulic erosion simulator.
pub struct PipeModelGpu {
    target: Arc<Terrain>,
    parameters: ParameterCollection,
    backend: GpuBackend,
    pipeline: wgpu::ComputePipeline,
    fields: Option<PipeFields>,
    uniforms: PipeUniforms,
    iterations: u32,
    iter_counter: u32,
    running: bool,
    /// Ping-pong slot: which copy of the double-buffered fields is current.
    slot: usize,
}

impl PipeModelGpu {
    /// Create the simulator and compile its kernel. Fails when no compute
    /// device is available.
    pub fn new(target: Arc<Terrain>) -> Result<Self, ErosionError> {
        let backend = GpuBackend::new()?;
        let pipeline = backend.create_pipeline("pipe erosion", PIPE_EROSION_SHADER, "main");
        let mut parameters = ParameterCollection::new();
        PipeUniforms::register(&mut parameters);
        let uniforms = PipeUniforms::snapshot(&parameters, 0, 0);
        Ok(Self {
            target,
            parameters,
            backend,
            pipeline,
            fields: None,
            uniforms,
            iterations: 0,
            iter_counter: 0,
            running: false,
            slot: 0,
        })
    }

    fn allocate_fields(&self, width: u32, height: u32) -> Result<PipeFields, ErosionError> {
        self.backend.check_field_size(width, height, 4)?;

        // Seed the current elevation copy from the target heightmap:
        // physical height = sample / max_sample * elevation scale.
        let mut seed = Vec::with_capacity((width * height * 4) as usize);
        {
            let hf = self.target.heightfield();
            let scale = self.uniforms.terrain_elevation_scale / hf.max_sample();
            for sample in hf.samples() {
                seed.push(sample * scale); // elevation
                seed.push(0.0); // water
                seed.push(0.0); // sediment
                seed.push(self.uniforms.soil_softness_max); // softness
            }
        }

        let b = &self.backend;
        let terrain = [
            b.create_field_with("pipe terrain a", width, height, 4, &seed),
            b.create_field("pipe terrain b", width, height, 4),
        ];
        let outflow = [
            b.create_field("pipe outflow a", width, height, 4),
            b.create_field("pipe outflow b", width, height, 4),
        ];
        let velocity = [
            b.create_field("pipe velocity a", width, height, 4),
            b.create_field("pipe velocity b", width, height, 4),
        ];
        let soil_flow_cardinal = b.create_field("pipe soil flow cardinal", width, height, 4);
        let soil_flow_diagonal = b.create_field("pipe soil flow diagonal", width, height, 4);
        let uniform_buffer = b.create_uniform("pipe params", &self.uniforms);

        let layout = self.pipeline.get_bind_group_layout(0);
        let bind_groups = [0usize, 1].map(|src| {
            let dst = 1 - src;
            b.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pipe erosion bind group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: terrain[src].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: outflow[src].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: velocity[src].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: terrain[dst].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: outflow[dst].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: velocity[dst].buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: soil_flow_cardinal.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: soil_flow_diagonal.buffer.as_entire_binding(),
                    },
                ],
            })
        });

        Ok(PipeFields {
            terrain,
            outflow,
            velocity,
            soil_flow_cardinal,
            soil_flow_diagonal,
            uniform_buffer,
            bind_groups,
            width,
            height,
        })
    }

    /// Submit one simulation step and write the resulting elevation back
    /// into the shared terrain heightmap.
    fn run_erosion(&mut self) {
        let Some(fields) = &self.fields else { return };

        self.backend
            .dispatch_2d(&self.pipeline, &fields.bind_groups[self.slot], fields.width, fields.height);
        self.slot = 1 - self.slot;

        // The freshly written copy is now current; export its elevation.
        match self.backend.download(&fields.terrain[self.slot]) {
            Ok(data) => {
                let mut hf = self.target.heightfield_mut();
                if hf.width as u32 != fields.width || hf.height as u32 != fields.height {
                    eprintln!("pipe erosion: target surface was resized mid-run, stopping");
                    self.running = false;
                    return;
                }
                let scale = hf.max_sample() / self.uniforms.terrain_elevation_scale;
                let max_sample = hf.max_sample();
                for (sample, texel) in hf.samples_mut().iter_mut().zip(data.chunks_exact(4)) {
                    *sample = (texel[0] * scale).clamp(0.0, max_sample);
                }
            }
            Err(e) => {
                eprintln!("pipe erosion: readback failed: {}", e);
                self.running = false;
                return;
            }
        }

        self.iter_counter += 1;
    }
}

impl Erosion for PipeModelGpu {
    fn name(&self) -> &str {
        "pipe"
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

        self.uniforms = PipeUniforms::snapshot(&self.parameters, width as u32, height as u32);
        self.iterations = self.parameters.get_param("iterations").max(1.0) as u32;

        // Allocation failure leaves the model idle with no stale fields.
        self.fields = None;
        let fields = self.allocate_fields(width as u32, height as u32)?;
        self.backend.queue.write_buffer(
            &fields.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );
        self.fields = Some(fields);

        self.iter_counter = 0;
        self.slot = 0;
        self.running = true;
        Ok(())
    }

    fn stop_erosion_task(&mut self) {
        self.running = false;
    }

    fn update(&mut self) {
        if !self.running {
            return;
        }
        if self.iter_counter >= self.iterations {
            self.running = false;
        } else {
            self.run_erosion();
        }
    }

    fn progress(&self) -> f32 {
        progress_fraction(self.iter_counter, self.iterations)
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// WGSL kernel: one full pipe-model step per dispatch.
///
/// Out-of-bounds neighbors behave as sealed walls: no pipe flow crosses the
/// grid edge and no slope forms against it.
const PIPE_EROSION_SHADER: &str = r#"
struct Params {
    width: u32,
    height: u32,
    _pad0: vec2<u32>,
    water_sediment_capacity: f32,
    maximal_erosion_depth: f32,
    step_time_constant: f32,
    cell_size: f32,
    rock_erosion_base_value: f32,
    rainfall: f32,
    terrain_elevation_scale: f32,
    virtual_pipe_area: f32,
    soil_suspension_rate: f32,
    sediment_deposition_rate: f32,
    soil_softness_max: f32,
    water_evaporation_rate: f32,
    thermal_erosion_rate: f32,
    talus_angle_tangent_coef: f32,
    talus_angle_tangent_bias: f32,
    _pad1: f32,
}

// Cell texel layout:
//   terrain  = (elevation, water, sediment, softness)
//   outflow  = (left, right, top, bottom)
//   velocity = (u, v, unused, unused)
@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> src_terrain: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> src_outflow: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read> src_velocity: array<vec4<f32>>;
@group(0) @binding(4) var<storage, read_write> dst_terrain: array<vec4<f32>>;
@group(0) @binding(5) var<storage, read_write> dst_outflow: array<vec4<f32>>;
@group(0) @binding(6) var<storage, read_write> dst_velocity: array<vec4<f32>>;
// Thermal soil flux out of each cell, applied with one step of lag.
// (cardinal = L,R,T,B; diagonal = TL,TR,BL,BR)
@group(0) @binding(7) var<storage, read_write> soil_flow_cardinal: array<vec4<f32>>;
@group(0) @binding(8) var<storage, read_write> soil_flow_diagonal: array<vec4<f32>>;

const GRAVITY: f32 = 9.81;

fn in_bounds(x: i32, y: i32) -> bool {
    return x >= 0 && x < i32(params.width) && y >= 0 && y < i32(params.height);
}

fn idx_of(x: i32, y: i32) -> u32 {
    return u32(y) * params.width + u32(x);
}

// Water surface height of a (valid) neighbor.
fn surface(x: i32, y: i32) -> f32 {
    let t = src_terrain[idx_of(x, y)];
    return t.x + t.y;
}

fn ground(x: i32, y: i32) -> f32 {
    return src_terrain[idx_of(x, y)].x;
}

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (!in_bounds(x, y)) {
        return;
    }
    let i = idx_of(x, y);

    let dt = params.step_time_constant;
    let l = params.cell_size;
    let cell = src_terrain[i];
    var elevation = cell.x;
    var water = cell.y;
    var sediment = cell.z;
    var softness = cell.w;

    // ---- 1. rainfall ----------------------------------------------------
    water = water + dt * params.rainfall;

    // ---- 2. outflow flux through the four virtual pipes -----------------
    let here = elevation + water;
    var height_diff = vec4<f32>(0.0);
    if (in_bounds(x - 1, y)) { height_diff.x = here - surface(x - 1, y); }
    if (in_bounds(x + 1, y)) { height_diff.y = here - surface(x + 1, y); }
    if (in_bounds(x, y - 1)) { height_diff.z = here - surface(x, y - 1); }
    if (in_bounds(x, y + 1)) { height_diff.w = here - surface(x, y + 1); }

    let pipe_gain = dt * params.virtual_pipe_area * GRAVITY / l;
    var flux = max(vec4<f32>(0.0), src_outflow[i] + pipe_gain * height_diff);

    // Never drain more water than the column holds.
    let total_out = flux.x + flux.y + flux.z + flux.w;
    if (total_out > 0.0) {
        let limit = min(1.0, water * l * l / (total_out * dt));
        flux = flux * limit;
    }

    // ---- 3. water volume update -----------------------------------------
    var inflow = 0.0;
    if (in_bounds(x - 1, y)) { inflow = inflow + src_outflow[idx_of(x - 1, y)].y; }
    if (in_bounds(x + 1, y)) { inflow = inflow + src_outflow[idx_of(x + 1, y)].x; }
    if (in_bounds(x, y - 1)) { inflow = inflow + src_outflow[idx_of(x, y - 1)].w; }
    if (in_bounds(x, y + 1)) { inflow = inflow + src_outflow[idx_of(x, y + 1)].z; }
    let out_now = flux.x + flux.y + flux.z + flux.w;
    let water_mid = max(0.0, water + dt * (inflow - out_now) / (l * l));

    // ---- 4. flow velocity -----------------------------------------------
    var left_in = 0.0;
    var right_in = 0.0;
    var top_in = 0.0;
    var bottom_in = 0.0;
    if (in_bounds(x - 1, y)) { left_in = src_outflow[idx_of(x - 1, y)].y; }
    if (in_bounds(x + 1, y)) { right_in = src_outflow[idx_of(x + 1, y)].x; }
    if (in_bounds(x, y - 1)) { top_in = src_outflow[idx_of(x, y - 1)].w; }
    if (in_bounds(x, y + 1)) { bottom_in = src_outflow[idx_of(x, y + 1)].z; }

    let mean_water = max(0.01, 0.5 * (water + water_mid));
    let u = 0.5 * (left_in - flux.x + flux.y - right_in) / (l * mean_water);
    let v = 0.5 * (top_in - flux.z + flux.w - bottom_in) / (l * mean_water);
    let speed = sqrt(u * u + v * v);

    // ---- 5. suspension / deposition -------------------------------------
    var grad = vec2<f32>(0.0);
    if (in_bounds(x - 1, y) && in_bounds(x + 1, y)) {
        grad.x = (ground(x + 1, y) - ground(x - 1, y)) / (2.0 * l);
    }
    if (in_bounds(x, y - 1) && in_bounds(x, y + 1)) {
        grad.y = (ground(x, y + 1) - ground(x, y - 1)) / (2.0 * l);
    }
    let slope_mag = length(grad);
    let sin_tilt = max(0.05, slope_mag / sqrt(1.0 + slope_mag * slope_mag));

    // Advect suspended sediment upstream along last step's velocity before
    // exchanging with the bed.
    let vel_prev = src_velocity[i];
    let back_x = clamp(x - i32(round(vel_prev.x * dt)), 0, i32(params.width) - 1);
    let back_y = clamp(y - i32(round(vel_prev.y * dt)), 0, i32(params.height) - 1);
    sediment = src_terrain[idx_of(back_x, back_y)].z;

    let capacity = params.water_sediment_capacity * sin_tilt * speed * min(water_mid, 1.0);
    if (capacity > sediment) {
        var eroded = dt * params.soil_suspension_rate * softness * (capacity - sediment);
        eroded = min(eroded, params.maximal_erosion_depth);
        elevation = elevation - eroded;
        sediment = sediment + eroded;
        // Exposed material softens toward the cap as rock weathers.
        softness = min(
            softness + eroded * params.rock_erosion_base_value,
            params.soil_softness_max,
        );
    } else {
        // Never settle out more than the excess over capacity, so sediment
        // stays non-negative at any dt * rate product.
        let deposited = min(
            dt * params.sediment_deposition_rate * (sediment - capacity),
            sediment - capacity,
        );
        elevation = elevation + deposited;
        sediment = sediment - deposited;
    }

    // ---- 6. evaporation --------------------------------------------------
    let water_new = max(0.0, water_mid * (1.0 - params.water_evaporation_rate * dt));

    // ---- 7. thermal erosion ----------------------------------------------
    // Apply the soil flux recorded last step (own outflow and the four
    // cardinal neighbors' flow toward this cell), then record this step's
    // outgoing flux from the current heights.
    let prev_out = soil_flow_cardinal[i];
    var thermal_in = 0.0;
    if (in_bounds(x - 1, y)) { thermal_in = thermal_in + soil_flow_cardinal[idx_of(x - 1, y)].y; }
    if (in_bounds(x + 1, y)) { thermal_in = thermal_in + soil_flow_cardinal[idx_of(x + 1, y)].x; }
    if (in_bounds(x, y - 1)) { thermal_in = thermal_in + soil_flow_cardinal[idx_of(x, y - 1)].w; }
    if (in_bounds(x, y + 1)) { thermal_in = thermal_in + soil_flow_cardinal[idx_of(x, y + 1)].z; }
    elevation = elevation + thermal_in - (prev_out.x + prev_out.y + prev_out.z + prev_out.w);

    let talus = (params.talus_angle_tangent_coef * softness + params.talus_angle_tangent_bias) * l;
    var new_out = vec4<f32>(0.0);
    if (in_bounds(x - 1, y)) { new_out.x = max(0.0, elevation - ground(x - 1, y) - talus); }
    if (in_bounds(x + 1, y)) { new_out.y = max(0.0, elevation - ground(x + 1, y) - talus); }
    if (in_bounds(x, y - 1)) { new_out.z = max(0.0, elevation - ground(x, y - 1) - talus); }
    if (in_bounds(x, y + 1)) { new_out.w = max(0.0, elevation - ground(x, y + 1) - talus); }
    let excess = new_out.x + new_out.y + new_out.z + new_out.w;
    if (excess > 0.0) {
        // Move at most half the largest overhang, split proportionally.
        let budget = dt * params.thermal_erosion_rate
            * 0.5 * max(max(new_out.x, new_out.y), max(new_out.z, new_out.w));
        new_out = new_out * (budget / excess);
    }
    soil_flow_cardinal[i] = new_out;
    soil_flow_diagonal[i] = vec4<f32>(0.0);

    dst_terrain[i] = vec4<f32>(elevation, water_new, sediment, softness);
    dst_outflow[i] = flux;
    dst_velocity[i] = vec4<f32>(u, v, 0.0, 0.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    /// Host-side mirror of the kernel's deposition rule: a rate-scaled
    /// share of the excess over carrying capacity, never more than the
    /// excess itself.
    fn deposition_amount(dt: f32, rate: f32, sediment: f32, capacity: f32) -> f32 {
        (dt * rate * (sediment - capacity)).min(sediment - capacity)
    }

    #[test]
    fn test_deposition_cannot_overshoot_suspended_load() {
        // Extremes of the registered ranges (dt 10, rate 3) would settle
        // 30x the excess unclamped, driving sediment negative.
        let deposited = deposition_amount(10.0, 3.0, 1.0, 0.25);
        assert!(deposited <= 0.75 + 1e-6);
        assert!(1.0 - deposited >= 0.25 - 1e-6);

        // Mild settings keep the proportional form untouched.
        let deposited = deposition_amount(0.05, 1.0, 1.0, 0.25);
        assert!((deposited - 0.0375).abs() < 1e-6);
    }

    #[test]
    fn test_progress_fraction_clamps_past_budget() {
        assert_eq!(progress_fraction(0, 100), 0.0);
        assert_eq!(progress_fraction(50, 100), 0.5);
        assert_eq!(progress_fraction(100, 100), 1.0);
        // Extra update calls past the budget must not push progress past 1.
        assert_eq!(progress_fraction(150, 100), 1.0);
        assert_eq!(progress_fraction(5, 0), 0.0);
    }

    #[test]
    fn test_uniform_snapshot_reads_registry() {
        let mut parameters = ParameterCollection::new();
        PipeUniforms::register(&mut parameters);

        assert!(parameters.set_param("rainfall", 0.2));
        assert!(parameters.set_param("cell_size", 10.0));
        assert!(parameters.set_param("iterations", 50.0));

        let u = PipeUniforms::snapshot(&parameters, 64, 32);
        assert_eq!(u.width, 64);
        assert_eq!(u.height, 32);
        assert_eq!(u.rainfall, 0.2);
        assert_eq!(u.cell_size, 10.0);
        // Defaults survive for untouched knobs.
        assert_eq!(u.water_sediment_capacity, 1.0);
        assert_eq!(u.talus_angle_tangent_coef, 0.8);
    }

    #[test]
    fn test_uniform_block_size_matches_shader_layout() {
        // 2 u32 + 2 pad + 16 f32 = 20 scalars.
        assert_eq!(std::mem::size_of::<PipeUniforms>(), 20 * 4);
    }

    #[test]
    fn test_out_of_range_pipe_params_are_rejected() {
        let mut parameters = ParameterCollection::new();
        PipeUniforms::register(&mut parameters);

        assert!(!parameters.set_param("water_evaporation_rate", 0.9));
        assert_eq!(parameters.get_param("water_evaporation_rate"), 0.015);
    }
}
