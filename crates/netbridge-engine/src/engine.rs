//! Engine Entry Point
//!
//! The [`Engine`] trait is everything the bridge needs from a native
//! runtime besides the network and solver objects themselves: building
//! them from definition files, device selection, and mean files.

use std::path::Path;

use netbridge_array::Blob;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::net::CpuNet;
use crate::phase::Phase;
use crate::record::{read_json, write_json, BlobRecord};
use crate::solver::SgdSolver;
use crate::{shared, SharedNet, SharedSolver};

/// Version string reported by [`CpuEngine`]
pub const ENGINE_VERSION: &str = concat!("netbridge-cpu ", env!("CARGO_PKG_VERSION"));

/// Native runtime interface.
pub trait Engine: Send {
    /// Build a solver from its definition file
    fn load_solver(&mut self, path: &Path) -> EngineResult<SharedSolver>;

    /// Build a network from its definition file
    fn load_net(&mut self, path: &Path, phase: Phase) -> EngineResult<SharedNet>;

    /// Select the compute device
    fn set_device(&mut self, id: usize) -> EngineResult<()>;

    /// Currently selected device
    fn device(&self) -> usize;

    /// Read a mean file
    fn read_mean(&self, path: &Path) -> EngineResult<Blob>;

    /// Write a mean file
    fn write_mean(&self, mean: &mut Blob, path: &Path) -> EngineResult<()>;

    /// Engine version string
    fn version(&self) -> &str;
}

/// Reference engine that runs everything on the host CPU.
///
/// It still reports a configurable number of devices so device selection
/// can be exercised.
#[derive(Debug, Clone)]
pub struct CpuEngine {
    device: usize,
    device_count: usize,
}

impl CpuEngine {
    /// Engine with a single device
    pub fn new() -> Self {
        Self::with_devices(1)
    }

    /// Engine reporting `count` devices (at least one)
    pub fn with_devices(count: usize) -> Self {
        Self {
            device: 0,
            device_count: count.max(1),
        }
    }

    /// Number of selectable devices
    pub fn device_count(&self) -> usize {
        self.device_count
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for CpuEngine {
    fn load_solver(&mut self, path: &Path) -> EngineResult<SharedSolver> {
        let solver = SgdSolver::load(path)?;
        info!(path = %path.display(), "loaded solver");
        Ok(shared(solver))
    }

    fn load_net(&mut self, path: &Path, phase: Phase) -> EngineResult<SharedNet> {
        let net = CpuNet::load(path, phase)?;
        info!(path = %path.display(), %phase, "loaded net");
        Ok(shared(net))
    }

    fn set_device(&mut self, id: usize) -> EngineResult<()> {
        if id >= self.device_count {
            return Err(EngineError::InvalidDevice {
                id,
                count: self.device_count,
            });
        }
        self.device = id;
        Ok(())
    }

    fn device(&self) -> usize {
        self.device
    }

    fn read_mean(&self, path: &Path) -> EngineResult<Blob> {
        let record: BlobRecord = read_json(path)?;
        Ok(record.to_blob()?)
    }

    fn write_mean(&self, mean: &mut Blob, path: &Path) -> EngineResult<()> {
        write_json(path, &BlobRecord::capture(mean))?;
        info!(path = %path.display(), shape = %mean.shape_string(), "wrote mean file");
        Ok(())
    }

    fn version(&self) -> &str {
        ENGINE_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_device_selection() {
        let mut engine = CpuEngine::with_devices(2);
        assert_eq!(engine.device(), 0);
        engine.set_device(1).unwrap();
        assert_eq!(engine.device(), 1);

        let err = engine.set_device(2).unwrap_err();
        assert_eq!(err, EngineError::InvalidDevice { id: 2, count: 2 });
        assert_eq!(engine.device(), 1);
    }

    #[test]
    fn test_zero_devices_clamps_to_one() {
        assert_eq!(CpuEngine::with_devices(0).device_count(), 1);
    }

    #[test]
    fn test_mean_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.json");
        let engine = CpuEngine::new();

        let mut mean = Blob::from_data(&[1, 2, 1, 2], &[0.1, 0.2, 0.3, 0.4]).unwrap();
        engine.write_mean(&mut mean, &path).unwrap();
        let mut back = engine.read_mean(&path).unwrap();
        assert_eq!(back.shape(), &[1, 2, 1, 2]);
        assert_eq!(back.host_data(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_load_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = CpuEngine::new();
        let err = engine.load_solver(&dir.path().join("solver.toml")).err().unwrap();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
        let err = engine
            .load_net(&dir.path().join("net.toml"), Phase::Test)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
        let err = engine.read_mean(&dir.path().join("mean.json")).unwrap_err();
        assert!(err.is_file_error());
    }

    #[test]
    fn test_version() {
        assert!(CpuEngine::new().version().starts_with("netbridge-cpu "));
    }
}
