//! Configuration parsing and management.

pub use crate::error::ConfigError;
use crate::resolver::ResolverTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weft_types::ResolverSpecs;

/// Gateway configuration matching weft.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base definitions placed before everything the services contribute
    #[serde(default, alias = "typeDefs")]
    pub type_defs: Vec<String>,

    /// Initial resolver table services are merged on top of
    #[serde(default)]
    pub resolvers: ResolverSpecs,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub server: ServerConfig,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("schema.snapshot.graphql")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_snapshot_path(),
        }
    }
}

/// Transport-level toggles. The core carries them for the HTTP layer and
/// never reads them itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_route")]
    pub path: String,

    #[serde(default)]
    pub playground: bool,
}

fn default_route() -> String {
    String::from("/graphql")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: default_route(),
            playground: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: GatewayConfig = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Snapshot target, resolved relative to the config file
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot
            .enabled
            .then(|| self.resolve_path(&self.snapshot.path))
    }

    /// The configured initial resolvers as a table
    pub fn seed_resolvers(&self) -> ResolverTable {
        ResolverTable::from_specs(&self.resolvers)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();
        assert!(config.type_defs.is_empty());
        assert!(config.snapshot.enabled);
        assert_eq!(config.server.path, "/graphql");
        assert!(!config.server.playground);
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("schema.snapshot.graphql")));
    }

    #[test]
    fn test_from_file_resolves_snapshot_relative_to_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weft.yml");
        fs::write(
            &path,
            r#"
typeDefs:
  - "scalar Date"
resolvers:
  Query:
    health:
      action: gateway.health
snapshot:
  path: out/schema.graphql
server:
  playground: true
"#,
        )
        .unwrap();

        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.type_defs, vec!["scalar Date"]);
        assert!(config.server.playground);
        assert_eq!(config.snapshot_path(), Some(dir.path().join("out/schema.graphql")));
        assert_eq!(
            config.seed_resolvers().get("Query", "health").unwrap().action(),
            Some("gateway.health")
        );
    }

    #[test]
    fn test_snapshot_disabled() {
        let config: GatewayConfig = serde_yaml::from_str("snapshot:\n  enabled: false\n").unwrap();
        assert_eq!(config.snapshot_path(), None);
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::from_file("/nonexistent/weft.yml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }
}
