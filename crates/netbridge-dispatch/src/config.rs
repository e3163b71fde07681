//! Bridge configuration.
//!
//! Loaded from TOML; every field is optional:
//!
//! ```toml
//! mode = "gpu"
//! device_id = 0
//! strict_shapes = true
//! ```

use std::env;
use std::fs;
use std::path::Path;

use netbridge_array::ExecutionMode;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Environment variable overriding [`BridgeConfig::mode`]
pub const ENV_MODE: &str = "NETBRIDGE_MODE";
/// Environment variable overriding [`BridgeConfig::device_id`]
pub const ENV_DEVICE: &str = "NETBRIDGE_DEVICE";
/// Environment variable overriding [`BridgeConfig::strict_shapes`]
pub const ENV_STRICT_SHAPES: &str = "NETBRIDGE_STRICT_SHAPES";

/// Startup options of a bridge context
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Initial execution mode
    pub mode: ExecutionMode,

    /// Device selected when the context is created
    pub device_id: Option<usize>,

    /// Also compare axis layout, not just element count, when writing
    /// host arrays into tensors
    pub strict_shapes: bool,

    /// Seed for the epoch generator; entropy when absent.
    ///
    /// A seeded bridge hands out a reproducible epoch sequence, so
    /// tokens from one run can be forged in the next. Only tests set it,
    /// so config files cannot.
    #[serde(skip)]
    pub epoch_seed: Option<u64>,
}

impl BridgeConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        toml::from_str(text).map_err(|e| BridgeError::config(e.to_string()))
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> BridgeResult<Self> {
        if !path.is_file() {
            return Err(BridgeError::file_not_found(path));
        }
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `NETBRIDGE_*` environment overrides
    pub fn with_env_overrides(self) -> BridgeResult<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<Self> {
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = mode.parse().map_err(|e: String| invalid_env(ENV_MODE, e))?;
        }
        if let Some(device) = lookup(ENV_DEVICE) {
            let id = device
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid_env(ENV_DEVICE, e.to_string()))?;
            self.device_id = Some(id);
        }
        if let Some(strict) = lookup(ENV_STRICT_SHAPES) {
            self.strict_shapes = match strict.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(invalid_env(
                        ENV_STRICT_SHAPES,
                        format!("expected a boolean, got '{}'", other),
                    ))
                }
            };
        }
        Ok(self)
    }
}

fn invalid_env(var: &str, reason: String) -> BridgeError {
    BridgeError::config(format!("{}: {}", var, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.mode, ExecutionMode::Cpu);
        assert_eq!(config.device_id, None);
        assert!(!config.strict_shapes);
        assert_eq!(BridgeConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_parse_toml() {
        let config = BridgeConfig::from_toml_str(
            "mode = \"gpu\"\ndevice_id = 1\nstrict_shapes = true\n",
        )
        .unwrap();
        assert_eq!(config.mode, ExecutionMode::Gpu);
        assert_eq!(config.device_id, Some(1));
        assert!(config.strict_shapes);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(BridgeConfig::from_toml_str("modes = \"gpu\"").is_err());
    }

    #[test]
    fn test_epoch_seed_not_loadable() {
        assert!(BridgeConfig::from_toml_str("epoch_seed = 3").is_err());
        assert_eq!(BridgeConfig::from_toml_str("").unwrap().epoch_seed, None);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        assert!(matches!(
            BridgeConfig::load(&path),
            Err(BridgeError::FileNotFound { .. })
        ));
        std::fs::write(&path, "strict_shapes = true").unwrap();
        assert!(BridgeConfig::load(&path).unwrap().strict_shapes);
    }

    #[test]
    fn test_overrides() {
        let mut vars = FxHashMap::default();
        vars.insert(ENV_MODE, "GPU".to_string());
        vars.insert(ENV_DEVICE, " 2 ".to_string());
        vars.insert(ENV_STRICT_SHAPES, "yes".to_string());
        let config = BridgeConfig::new()
            .with_overrides(|key| vars.get(key).cloned())
            .unwrap();
        assert_eq!(config.mode, ExecutionMode::Gpu);
        assert_eq!(config.device_id, Some(2));
        assert!(config.strict_shapes);
    }

    #[test]
    fn test_bad_override() {
        let err = BridgeConfig::new()
            .with_overrides(|key| (key == ENV_STRICT_SHAPES).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_STRICT_SHAPES));
    }
}
