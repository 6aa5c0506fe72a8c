use std::path::Path;

use serde::{Deserialize, Serialize};
use vcl_archive::OpenMode;

/// Errors loading a registry configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which built-in providers a registry starts with and how they behave.
///
/// ```toml
/// archive_schemes = ["jar", "vca"]
/// read_policy = "mapped"
/// verify_checksums = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Schemes served by the archive provider.
    pub archive_schemes: Vec<String>,
    /// How archives are read: one locked file handle or a memory map.
    pub read_policy: OpenMode,
    pub verify_checksums: bool,
    /// Register the `file` scheme for host directories.
    pub enable_host_dirs: bool,
    /// Register the `mem` scheme for in-memory trees.
    pub enable_memory: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            archive_schemes: vec!["jar".into()],
            read_policy: OpenMode::Serialized,
            verify_checksums: true,
            enable_host_dirs: true,
            enable_memory: true,
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RegistryConfig::default();
        assert_eq!(c.archive_schemes, vec!["jar".to_string()]);
        assert_eq!(c.read_policy, OpenMode::Serialized);
        assert!(c.verify_checksums);
        assert!(c.enable_host_dirs);
        assert!(c.enable_memory);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = RegistryConfig::from_toml_str(
            r#"
            archive_schemes = ["jar", "vca"]
            read_policy = "mapped"
            "#,
        )
        .unwrap();
        assert_eq!(c.archive_schemes, vec!["jar".to_string(), "vca".to_string()]);
        assert_eq!(c.read_policy, OpenMode::Mapped);
        assert!(c.verify_checksums);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vcl.toml");
        std::fs::write(&path, "enable_memory = false\n").unwrap();
        let c = RegistryConfig::load(&path).unwrap();
        assert!(!c.enable_memory);
        assert!(RegistryConfig::load(&dir.path().join("missing.toml")).is_err());
        assert!(RegistryConfig::from_toml_str("read_policy = \"sideways\"").is_err());
    }
}
