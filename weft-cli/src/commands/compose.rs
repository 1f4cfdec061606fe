//! Compose command implementation.

use super::load_gateway;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct ResolverEntry<'a> {
    #[serde(rename = "type")]
    type_name: String,
    field: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
}

#[derive(Serialize)]
struct ComposeOutput<'a> {
    generation: u64,
    document: &'a str,
    resolvers: Vec<ResolverEntry<'a>>,
}

/// Compile the registry and print the composed document
pub async fn compose_schema(
    config_path: &Path,
    registry_path: &Path,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let gateway = load_gateway(config_path, registry_path)?;
    let artifact = gateway
        .lifecycle()
        .ensure_compiled()
        .await
        .context("Failed to compile schema")?;
    gateway.lifecycle().flush_snapshot().await;

    if let Some(out) = out {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
        fs::write(out, &artifact.document)
            .with_context(|| format!("Failed to write {:?}", out))?;
        tracing::info!("Wrote schema to {:?}", out);
    }

    if json {
        let output = ComposeOutput {
            generation: artifact.generation.0,
            document: &artifact.document,
            resolvers: artifact
                .resolvers
                .entries()
                .into_iter()
                .map(|(type_name, field, resolver)| ResolverEntry {
                    type_name,
                    field,
                    kind: resolver.kind(),
                    action: resolver.action(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", artifact.document);
    }

    Ok(())
}
