//! Configuration schema and loader for causal-kv nodes.

use serde::{Deserialize, Serialize};

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Replica group and memory settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Drain cadence and demo workload settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of key slots in the replicated memory.
    #[serde(default = "default_size")]
    pub size: usize,

    /// Number of processes in the replica group (N).
    #[serde(default = "default_members")]
    pub members: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            members: default_members(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Outbound drain poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub send_interval_ms: u64,

    /// Inbound drain poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub apply_interval_ms: u64,

    /// Number of demonstration writes each member issues (0 = idle).
    #[serde(default)]
    pub workload_writes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: default_interval_ms(),
            apply_interval_ms: default_interval_ms(),
            workload_writes: 0,
        }
    }
}

// --- Defaults ---

fn default_size() -> usize {
    64
}
fn default_members() -> usize {
    3
}
fn default_interval_ms() -> u64 {
    10
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.size == 0 {
            return Err(ConfigError::Invalid("store.size must be > 0".into()));
        }
        if self.store.members == 0 {
            return Err(ConfigError::Invalid("store.members must be > 0".into()));
        }
        if self.runtime.send_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "runtime.send_interval_ms must be > 0".into(),
            ));
        }
        if self.runtime.apply_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "runtime.apply_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load a `NodeConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<NodeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: NodeConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a `NodeConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = load_from_str("{}").unwrap();
        assert_eq!(config.store.size, 64);
        assert_eq!(config.store.members, 3);
        assert_eq!(config.runtime.send_interval_ms, 10);
        assert_eq!(config.runtime.apply_interval_ms, 10);
        assert_eq!(config.runtime.workload_writes, 0);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  size: 128
  members: 5
runtime:
  send_interval_ms: 5
  apply_interval_ms: 2
  workload_writes: 100
metrics_port: 9600
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.store.size, 128);
        assert_eq!(config.store.members, 5);
        assert_eq!(config.runtime.send_interval_ms, 5);
        assert_eq!(config.runtime.apply_interval_ms, 2);
        assert_eq!(config.runtime.workload_writes, 100);
        assert_eq!(config.metrics_port, Some(9600));
    }

    #[test]
    fn test_roundtrip_yaml() {
        let config = load_from_str("store:\n  size: 16\n").unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let config2 = load_from_str(&serialized).unwrap();
        assert_eq!(config.store.size, config2.store.size);
        assert_eq!(config.store.members, config2.store.members);
    }

    #[test]
    fn test_rejects_zero_size() {
        let result = load_from_str("store:\n  size: 0\n");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("store.size"), "error should mention store.size: {}", err);
    }

    #[test]
    fn test_rejects_zero_members() {
        let result = load_from_str("store:\n  members: 0\n");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("store.members"),
            "error should mention store.members: {}",
            err
        );
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = load_from_str("runtime:\n  apply_interval_ms: 0\n");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("apply_interval_ms"),
            "error should mention apply_interval_ms: {}",
            err
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, "store:\n  size: 8\n  members: 2\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.store.size, 8);
        assert_eq!(config.store.members, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from_file(std::path::Path::new("/nonexistent/node.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
