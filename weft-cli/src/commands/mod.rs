//! CLI command implementations.

pub mod check;
pub mod compose;
pub mod emit;

pub use check::check_schema;
pub use compose::compose_schema;
pub use emit::{emit_event, EmitOptions};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use weft_core::{Gateway, GatewayConfig, RegistryManifest, StaticRegistry};

/// Load the optional config file and the registry manifest into a gateway.
///
/// Without a config file the defaults apply, minus the snapshot file.
pub fn load_gateway(config_path: &Path, registry_path: &Path) -> Result<Gateway> {
    let config = if config_path.exists() {
        tracing::debug!("Loading config from {:?}", config_path);
        GatewayConfig::from_file(config_path).context("Failed to load configuration")?
    } else {
        let mut config = GatewayConfig::default();
        config.snapshot.enabled = false;
        config
    };

    let manifest = RegistryManifest::from_file(registry_path)
        .with_context(|| format!("Failed to load registry manifest {:?}", registry_path))?;
    tracing::debug!("Loaded {} services", manifest.services.len());

    let gateway = Gateway::builder()
        .config(config)
        .registry(Arc::new(StaticRegistry::from_manifest(manifest)))
        .build()
        .context("Failed to assemble gateway")?;
    Ok(gateway)
}
