//! Erosion simulation models.
//!
//! Implements interchangeable simulators behind one polymorphic contract:
//! - **Pipe model** (`pipe`): virtual-pipes hydraulic erosion on the GPU,
//!   the primary, actively-used model
//! - **Ecosystem model** (`ecosystem`): Monte-Carlo runoff-event erosion over
//!   layered ground material, run to completion on a background thread
//! - **Ecosystem model, GPU variant** (`ecosystem_gpu`)
//!
//! A driver calls `start_erosion_task`, then `update` once per frame while
//! polling `progress`/`is_running`; when the model goes idle the target
//! terrain's heightmap holds the eroded result (thread-backed models hand
//! results over through `join`).

pub mod ecosystem;
pub mod ecosystem_gpu;
pub mod pipe;
pub mod utils;

pub use ecosystem::EcosystemCpu;
pub use ecosystem_gpu::EcosystemGpu;
pub use pipe::PipeModelGpu;

use thiserror::Error;

use crate::backend::GpuError;
use crate::grid::GridError;
use crate::params::{ParameterCollection, ParameterList};

#[derive(Debug, Error)]
pub enum ErosionError {
    #[error("compute backend failure: {0}")]
    Gpu(#[from] GpuError),
    #[error("elevation transfer failure: {0}")]
    Grid(#[from] GridError),
    #[error("target surface has zero area ({width}x{height})")]
    EmptyTarget { width: usize, height: usize },
}

/// Contract implemented by every erosion simulator.
///
/// State machine: Idle -> (start) -> Running -> (stop | iteration budget
/// exhausted) -> Idle. Re-entrant start while running and stop while idle
/// are both no-ops. While idle, `progress` reports the last computed value.
pub trait Erosion {
    /// Display name of the concrete model.
    fn name(&self) -> &str;

    fn parameters(&self) -> &ParameterCollection;
    fn parameters_mut(&mut self) -> &mut ParameterCollection;

    /// Snapshot parameters, (re)allocate working fields at the target's
    /// current dimensions, reset the iteration counter and transition to
    /// Running. No-op if already running. On failure the model stays Idle.
    fn start_erosion_task(&mut self) -> Result<(), ErosionError>;

    /// Force a transition to Idle. Thread-backed models signal their worker
    /// cooperatively; synchronization happens on a later `join` or on drop.
    fn stop_erosion_task(&mut self);

    /// Advance the simulation by one discrete step. No-op while idle.
    fn update(&mut self);

    /// Monotonic non-decreasing fraction in [0, 1] while running.
    fn progress(&self) -> f32;

    fn is_running(&self) -> bool;

    /// For thread-backed models: recover finished results into the target
    /// terrain. Returns true once, when results were aggregated. Models that
    /// write back during `update` keep the default.
    fn join(&mut self) -> bool {
        false
    }

    /// Set a tunable, rejecting out-of-range values. See
    /// [`ParameterCollection::set_param`].
    fn set_param(&mut self, name: &str, value: f32) -> bool {
        self.parameters_mut().set_param(name, value)
    }

    fn get_param(&self, name: &str) -> f32 {
        self.parameters().get_param(name)
    }

    fn get_params(&self) -> ParameterList {
        self.parameters().get_params()
    }
}
