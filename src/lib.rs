//! Terrain erosion simulation library
//!
//! Re-exports modules for use by binaries and tools.

pub mod backend;
pub mod erosion;
pub mod grid;
pub mod heightfield;
pub mod params;
pub mod task;
pub mod terrain;
