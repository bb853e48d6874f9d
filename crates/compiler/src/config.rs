//! Driver configuration.
//!
//! Loaded from an optional `chococ.toml` next to the invocation, with every
//! field defaulted so an absent file means stock behavior. CLI flags win
//! over file values.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CompileError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Default pipeline stopping point (`type`, `warn`, `ir`, `fold`,
    /// `riscv`, `all`).
    pub passes: String,
    /// Default output format (`riscv` or `mlir`).
    pub target: String,
    /// Exit non-zero on syntax/semantic errors instead of the
    /// harness-compatible exit 0.
    pub strict_exit_codes: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            passes: "all".to_string(),
            target: "riscv".to_string(),
            strict_exit_codes: false,
        }
    }
}

impl DriverConfig {
    pub fn load(path: &Path) -> Result<DriverConfig, CompileError> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| CompileError::semantic(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load `chococ.toml` from the current directory if present.
    pub fn load_default() -> DriverConfig {
        let path = Path::new("chococ.toml");
        if path.exists() {
            DriverConfig::load(path).unwrap_or_default()
        } else {
            DriverConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.passes, "all");
        assert_eq!(config.target, "riscv");
        assert!(!config.strict_exit_codes);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict_exit_codes = true").unwrap();
        let config = DriverConfig::load(file.path()).unwrap();
        assert!(config.strict_exit_codes);
        assert_eq!(config.target, "riscv");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "optimise = 3").unwrap();
        assert!(DriverConfig::load(file.path()).is_err());
    }
}
