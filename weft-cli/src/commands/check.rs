//! Check command implementation.

use super::load_gateway;
use anyhow::{Context, Result};
use std::path::Path;

/// Compile the registry and report what the contract contains
pub async fn check_schema(config_path: &Path, registry_path: &Path) -> Result<()> {
    let gateway = load_gateway(config_path, registry_path)?;
    let artifact = gateway
        .lifecycle()
        .ensure_compiled()
        .await
        .context("Schema check failed")?;
    gateway.lifecycle().flush_snapshot().await;

    let count = |type_name: &str| artifact.outline.fields(type_name).count();
    println!(
        "Schema OK: {} queries, {} mutations, {} subscriptions, {} resolvers",
        count("Query"),
        count("Mutation"),
        count("Subscription"),
        artifact.resolvers.entries().len()
    );

    Ok(())
}
