//! On-Disk Records
//!
//! Weights, solver snapshots and mean files are stored as JSON. The
//! layout is private to this engine and carries no compatibility promise.

use std::fs;
use std::path::Path;

use netbridge_array::{ArrayResult, Blob};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{require_file, EngineError, EngineResult};

/// One serialized tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Native shape
    pub shape: Vec<usize>,
    /// Row-major contents
    pub data: Vec<f32>,
}

impl BlobRecord {
    /// Capture a blob's shape and primary data
    pub fn capture(blob: &mut Blob) -> Self {
        Self {
            shape: blob.shape().to_vec(),
            data: blob.host_data().to_vec(),
        }
    }

    /// Build a fresh blob from this record
    pub fn to_blob(&self) -> ArrayResult<Blob> {
        Blob::from_data(&self.shape, &self.data)
    }
}

/// Learned parameters of one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    /// Layer name used for matching on load
    pub name: String,
    /// Parameter tensors in layer order
    pub blobs: Vec<BlobRecord>,
}

/// Learned parameters of a whole network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetWeights {
    /// Per-layer parameters; layers without parameters are omitted
    pub layers: Vec<LayerWeights>,
}

/// Serialized solver progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverState {
    /// Completed iterations
    pub iter: usize,
    /// Momentum history, one vector per learnable parameter
    pub history: Vec<Vec<f32>>,
    /// Training network parameters
    pub weights: NetWeights,
}

/// Read and decode a JSON record
pub fn read_json<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    require_file(path)?;
    let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| EngineError::parse(path, e))
}

/// Encode and write a JSON record, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    let text = serde_json::to_string(value).map_err(|e| EngineError::io(path, e))?;
    fs::write(path, text).map_err(|e| EngineError::io(path, e))
}

/// Read and decode a TOML definition
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    require_file(path)?;
    let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    toml::from_str(&text).map_err(|e| EngineError::parse(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blob_record_capture() {
        let mut blob = Blob::from_data(&[2, 1], &[0.5, -0.5]).unwrap();
        let record = BlobRecord::capture(&mut blob);
        assert_eq!(record.shape, vec![2, 1]);
        let mut rebuilt = record.to_blob().unwrap();
        assert_eq!(rebuilt.host_data(), &[0.5, -0.5]);
    }

    #[test]
    fn test_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/weights.json");
        let weights = NetWeights {
            layers: vec![LayerWeights {
                name: "ip".into(),
                blobs: vec![BlobRecord {
                    shape: vec![1],
                    data: vec![2.0],
                }],
            }],
        };
        write_json(&path, &weights).unwrap();
        let back: NetWeights = read_json(&path).unwrap();
        assert_eq!(back, weights);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = read_json::<NetWeights>(&missing).unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = read_json::<NetWeights>(&bad).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }
}
