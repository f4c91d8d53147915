//! Target terrain surface and simulator factory.
//!
//! A [`Terrain`] owns the canonical heightfield behind a read/write lock so
//! a renderer can read samples while the owning manager hands the same
//! surface to a simulator. At most one simulator should be actively writing
//! to a terrain at any time; this is a caller discipline invariant, not
//! enforced here.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::erosion::{EcosystemCpu, EcosystemGpu, Erosion, PipeModelGpu};
use crate::heightfield::{HeightField, HeightFieldError};

/// A terrain entity owning its heightmap.
pub struct Terrain {
    heightfield: RwLock<HeightField>,
}

impl Terrain {
    /// Create a flat terrain of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            heightfield: RwLock::new(HeightField::new(width, height)),
        }
    }

    pub fn from_heightfield(hf: HeightField) -> Self {
        Self {
            heightfield: RwLock::new(hf),
        }
    }

    /// Current surface dimensions.
    pub fn size(&self) -> (usize, usize) {
        let hf = self.heightfield();
        (hf.width, hf.height)
    }

    /// Shared read access for simulators importing elevation and for the
    /// renderer.
    pub fn heightfield(&self) -> RwLockReadGuard<'_, HeightField> {
        self.heightfield.read().expect("heightfield lock poisoned")
    }

    /// Exclusive write access for erosion write-back.
    pub fn heightfield_mut(&self) -> RwLockWriteGuard<'_, HeightField> {
        self.heightfield.write().expect("heightfield lock poisoned")
    }

    /// Replace the terrain surface wholesale (adopts new dimensions).
    pub fn set_terrain_data(&self, hf: HeightField) {
        *self.heightfield_mut() = hf;
    }

    /// Load the surface from a grayscale PNG heightmap.
    pub fn load_terrain(&self, path: &str) -> Result<(), HeightFieldError> {
        let hf = HeightField::load_png(path)?;
        self.set_terrain_data(hf);
        Ok(())
    }

    /// Save the surface as a 16-bit grayscale PNG.
    pub fn save_terrain(&self, path: &str) -> Result<(), HeightFieldError> {
        self.heightfield().save_png(path)
    }
}

/// Owns the terrain being edited and creates simulators bound to it.
pub struct TerrainManager {
    terrain: Arc<Terrain>,
}

impl TerrainManager {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            terrain: Arc::new(Terrain::new(width, height)),
        }
    }

    pub fn terrain(&self) -> Arc<Terrain> {
        Arc::clone(&self.terrain)
    }

    /// Instantiate a named erosion model bound to this manager's terrain.
    /// Unknown names yield `None`, not an error. GPU-backed models also
    /// yield `None` when no compute device is available (the failure is
    /// reported on stderr).
    pub fn create_erosion(&self, name: &str) -> Option<Box<dyn Erosion>> {
        match name {
            "pipe" => match PipeModelGpu::new(self.terrain()) {
                Ok(model) => Some(Box::new(model)),
                Err(e) => {
                    eprintln!("pipe erosion unavailable: {}", e);
                    None
                }
            },
            "ecosystem" => Some(Box::new(EcosystemCpu::new(self.terrain()))),
            "ecosystem_gpu" => match EcosystemGpu::new(self.terrain()) {
                Ok(model) => Some(Box::new(model)),
                Err(e) => {
                    eprintln!("ecosystem GPU erosion unavailable: {}", e);
                    None
                }
            },
            _ => None,
        }
    }

    /// Names accepted by [`Self::create_erosion`].
    pub fn erosion_model_names() -> &'static [&'static str] {
        &["pipe", "ecosystem", "ecosystem_gpu"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_name_yields_none() {
        let manager = TerrainManager::new(4, 4);
        assert!(manager.create_erosion("does_not_exist").is_none());
    }

    #[test]
    fn test_ecosystem_model_is_created_idle() {
        let manager = TerrainManager::new(4, 4);
        let model = manager.create_erosion("ecosystem").unwrap();
        assert_eq!(model.name(), "ecosystem");
        assert!(!model.is_running());
        assert!(!model.get_params().is_empty());
    }

    #[test]
    fn test_terrain_outlives_manager() {
        let manager = TerrainManager::new(4, 4);
        let terrain = manager.terrain();
        drop(manager);
        assert_eq!(terrain.size(), (4, 4));
    }

    #[test]
    fn test_set_terrain_data_adopts_dimensions() {
        let terrain = Terrain::new(4, 4);
        terrain.set_terrain_data(HeightField::new(8, 2));
        assert_eq!(terrain.size(), (8, 2));
    }
}
