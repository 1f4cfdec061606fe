//! Emit command implementation.
//!
//! Opens a subscription, publishes one event and prints the resolved value.
//! Remote calls are answered locally by echoing the action and its params.

use super::load_gateway;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use weft_core::{CallContext, CallError, FieldOutcome, Params};

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub tag: String,
    pub payload: String,
    pub field: String,
}

/// Answers every call with the action name and the params it received
struct EchoContext;

#[async_trait]
impl CallContext for EchoContext {
    async fn call(&self, action: &str, params: Value) -> Result<Value, CallError> {
        Ok(json!({ "action": action, "params": params }))
    }
}

pub async fn emit_event(
    config_path: &Path,
    registry_path: &Path,
    opts: EmitOptions,
) -> Result<()> {
    let payload: Value = serde_json::from_str(&opts.payload).context("Invalid --payload JSON")?;
    let gateway = load_gateway(config_path, registry_path)?;

    let mut stream = gateway
        .subscribe(&opts.field, Params::new(), Arc::new(EchoContext))
        .await
        .with_context(|| format!("Failed to subscribe to Subscription.{}", opts.field))?;

    let delivered = gateway.publish(&opts.tag, payload);
    if delivered == 0 {
        println!("No subscriber for tag '{}'", opts.tag);
        return Ok(());
    }

    match stream.next().await {
        Some(FieldOutcome::Value(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Some(FieldOutcome::Failed(err)) => bail!("Subscription.{} failed: {}", opts.field, err),
        None => bail!("Subscription.{} ended before the event arrived", opts.field),
    }
}
