//! The inbound surface a transport drives
//!
//! A [`Gateway`] owns the schema lifecycle and routes every field invocation,
//! subscription and published event through the currently compiled artifact.

use crate::builder::ContractBuilder;
use crate::compiler::SchemaCompiler;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::{ResolutionError, Result};
use crate::lifecycle::{CompiledArtifact, Generation, SchemaLifecycle, SchemaUpdated};
use crate::registry::ServiceRegistry;
use crate::resolver::{CallContext, FieldOutcome, FieldResolver, Params, Resolver};
use futures::future::{join_all, ready};
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Stream of resolved subscription values; dropping it cancels the
/// subscription
pub type SubscriptionStream = BoxStream<'static, FieldOutcome>;

/// One field to resolve as part of a request
#[derive(Debug, Clone, Default)]
pub struct FieldInvocation {
    pub type_name: String,
    pub field: String,
    pub parent: Value,
    pub args: Params,
}

impl FieldInvocation {
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: Value) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_args(mut self, args: Params) -> Self {
        self.args = args;
        self
    }
}

/// Assembles a [`Gateway`] from its collaborators
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    registry: Option<Arc<dyn ServiceRegistry>>,
    contract_builder: Option<Arc<dyn ContractBuilder>>,
    local: Vec<(String, String, Arc<dyn FieldResolver>)>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn contract_builder(mut self, builder: Arc<dyn ContractBuilder>) -> Self {
        self.contract_builder = Some(builder);
        self
    }

    /// Bind an in-process resolver ahead of everything services declare
    pub fn local_resolver(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: Arc<dyn FieldResolver>,
    ) -> Self {
        self.local.push((type_name.into(), field.into(), resolver));
        self
    }

    pub fn build(self) -> std::result::Result<Gateway, ConfigError> {
        let registry = self
            .registry
            .ok_or(ConfigError::MissingCollaborator("registry"))?;

        let mut seed = self.config.seed_resolvers();
        for (type_name, field, resolver) in self.local {
            seed.insert(&type_name, &field, Resolver::Local(resolver));
        }

        let mut compiler = SchemaCompiler::new(self.config.type_defs.clone(), seed);
        if let Some(builder) = self.contract_builder {
            compiler = compiler.with_builder(builder);
        }

        let lifecycle =
            SchemaLifecycle::new(registry, compiler).with_snapshot(self.config.snapshot_path());

        Ok(Gateway {
            lifecycle: Arc::new(lifecycle),
        })
    }
}

/// Routes invocations to the compiled contract
#[derive(Debug, Clone)]
pub struct Gateway {
    lifecycle: Arc<SchemaLifecycle>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn lifecycle(&self) -> &SchemaLifecycle {
        &self.lifecycle
    }

    /// The current contract document, compiling first if needed
    pub async fn document(&self) -> Result<String> {
        Ok(self.lifecycle.ensure_compiled().await?.document.clone())
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<SchemaUpdated> {
        self.lifecycle.subscribe_updates()
    }

    /// The registry changed; the next invocation recompiles
    pub fn on_registry_changed(&self) -> Generation {
        let generation = self.lifecycle.invalidate();
        info!(%generation, "service topology changed");
        generation
    }

    /// Resolve one field.
    ///
    /// Only a failed compile is an `Err`; a failing field comes back as
    /// [`FieldOutcome::Failed`].
    pub async fn invoke(
        &self,
        type_name: &str,
        field: &str,
        parent: &Value,
        args: Params,
        ctx: &dyn CallContext,
    ) -> Result<FieldOutcome> {
        let artifact = self.lifecycle.ensure_compiled().await?;
        Ok(resolve_field(&artifact, type_name, field, parent, args, ctx).await)
    }

    /// Resolve sibling fields concurrently against one compiled artifact
    pub async fn execute(
        &self,
        invocations: &[FieldInvocation],
        ctx: &dyn CallContext,
    ) -> Result<Vec<FieldOutcome>> {
        let artifact = self.lifecycle.ensure_compiled().await?;
        let pending = invocations.iter().map(|inv| {
            resolve_field(
                &artifact,
                &inv.type_name,
                &inv.field,
                &inv.parent,
                inv.args.clone(),
                ctx,
            )
        });
        Ok(join_all(pending).await)
    }

    /// Open a live subscription on `Subscription.<field>`
    ///
    /// The stream ends when the schema is recompiled.
    pub async fn subscribe(
        &self,
        field: &str,
        args: Params,
        ctx: Arc<dyn CallContext>,
    ) -> Result<SubscriptionStream> {
        let artifact = self.lifecycle.ensure_compiled().await?;
        let resolver = match artifact.resolvers.get("Subscription", field) {
            Some(Resolver::Subscription(resolver)) => resolver.clone(),
            _ => {
                return Err(ResolutionError::NoResolver {
                    type_name: "Subscription".into(),
                    field: field.into(),
                }
                .into())
            }
        };

        let listener = resolver
            .subscribe(&artifact.broker)
            .map_err(|err| ResolutionError::Broker(err.to_string()))?;
        debug!(field, tags = ?resolver.tags(), "subscription opened");

        let stream = listener
            .then(move |event| {
                let resolver = resolver.clone();
                let args = args.clone();
                let ctx = ctx.clone();
                async move { resolver.resolve(event.payload, args, ctx.as_ref()).await }
            })
            .filter_map(ready);

        Ok(stream.boxed())
    }

    /// Publish an event to subscribers of `tag`.
    ///
    /// Returns how many listeners received it. Nothing is compiled here, so
    /// events published before the first compile reach no one.
    pub fn publish(&self, tag: &str, payload: Value) -> usize {
        let Some(artifact) = self.lifecycle.current() else {
            debug!(tag, "event dropped: no schema compiled yet");
            return 0;
        };
        match artifact.broker.publish(tag, payload) {
            Ok(delivered) => delivered,
            Err(err) => {
                debug!(tag, error = %err, "event dropped");
                0
            }
        }
    }
}

async fn resolve_field(
    artifact: &CompiledArtifact,
    type_name: &str,
    field: &str,
    parent: &Value,
    args: Params,
    ctx: &dyn CallContext,
) -> FieldOutcome {
    match artifact.resolvers.get(type_name, field) {
        Some(Resolver::Action(resolver)) => resolver.resolve(parent, args, ctx).await,
        Some(Resolver::Local(resolver)) => resolver.resolve(parent, args, ctx).await,
        Some(Resolver::Subscription(_)) => FieldOutcome::Failed(ResolutionError::NotInvokable {
            type_name: type_name.into(),
            field: field.into(),
        }),
        // declared fields without a resolver read straight from the parent
        None if artifact.outline.has_field(type_name, field) => {
            FieldOutcome::Value(parent.get(field).cloned().unwrap_or(Value::Null))
        }
        None => FieldOutcome::Failed(ResolutionError::NoResolver {
            type_name: type_name.into(),
            field: field.into(),
        }),
    }
}
