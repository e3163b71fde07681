//! Network Phase

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether a network is built for training or for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Training phase
    #[default]
    Train,
    /// Testing / inference phase
    Test,
}

impl Phase {
    /// Lowercase phase name
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Test => "test",
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    /// Phase names are matched exactly
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Phase::Train),
            "test" => Ok(Phase::Test),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parsing_is_exact() {
        assert_eq!("train".parse::<Phase>(), Ok(Phase::Train));
        assert_eq!("test".parse::<Phase>(), Ok(Phase::Test));
        assert!("Train".parse::<Phase>().is_err());
        assert!("validate".parse::<Phase>().is_err());
    }
}
