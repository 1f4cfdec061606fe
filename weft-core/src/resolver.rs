//! Field resolvers bound to remote actions
//!
//! Every resolver receives the calling context as an explicit argument, so a
//! resolver built by one compile stays valid for any request and can be
//! exercised in isolation with a stub context.

use crate::error::{CallError, CompileError, ResolutionError};
use crate::merge::{merge_reporting, Override, Tree};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use weft_broker::{Broker, BrokerError, Listener};
use weft_types::{ActionResolverSpec, ResolverSpecs, RootParams};

/// Arguments of a field invocation
pub type Params = serde_json::Map<String, Value>;

/// The remote call primitive, scoped to one request or connection
#[async_trait]
pub trait CallContext: Send + Sync {
    async fn call(&self, action: &str, params: Value) -> Result<Value, CallError>;
}

/// The value produced for one field
///
/// A failed remote call is a value here, not an error: it fails its own
/// field and leaves sibling fields alone.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Value(Value),
    Failed(ResolutionError),
}

impl FieldOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FieldOutcome::Failed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldOutcome::Value(v) => Some(v),
            FieldOutcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Value, ResolutionError> {
        match self {
            FieldOutcome::Value(v) => Ok(v),
            FieldOutcome::Failed(e) => Err(e),
        }
    }
}

/// An in-process resolver supplied by the embedding application
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(&self, parent: &Value, args: Params, ctx: &dyn CallContext) -> FieldOutcome;
}

/// Resolves a field by calling one remote action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResolver {
    action: String,
    root_params: RootParams,
}

impl ActionResolver {
    pub fn new(action: impl Into<String>, root_params: Option<RootParams>) -> Self {
        Self {
            action: action.into(),
            root_params: root_params.unwrap_or_default(),
        }
    }

    pub fn from_spec(spec: &ActionResolverSpec) -> Self {
        Self::new(spec.action.clone(), spec.root_params.clone())
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn root_params(&self) -> &RootParams {
        &self.root_params
    }

    /// Copy `parent[source]` into `args[target]` for every root param.
    ///
    /// A field missing from the parent removes the target argument.
    pub fn remap(&self, parent: &Value, mut args: Params) -> Params {
        for (source, target) in &self.root_params {
            match parent.get(source) {
                Some(value) => {
                    args.insert(target.clone(), value.clone());
                }
                None => {
                    args.remove(target);
                }
            }
        }
        args
    }

    pub async fn resolve(
        &self,
        parent: &Value,
        args: Params,
        ctx: &dyn CallContext,
    ) -> FieldOutcome {
        let args = self.remap(parent, args);
        match ctx.call(&self.action, Value::Object(args)).await {
            Ok(value) => FieldOutcome::Value(value),
            Err(source) => {
                debug!(action = %self.action, error = %source, "field call failed");
                FieldOutcome::Failed(ResolutionError::CallFailed {
                    action: self.action.clone(),
                    source,
                })
            }
        }
    }
}

/// Binds a subscription field to broker tags and a per-event action call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionResolver {
    action: String,
    tags: Vec<String>,
    filter: bool,
}

impl SubscriptionResolver {
    pub fn new(action: impl Into<String>, tags: Vec<String>, filter: bool) -> Self {
        Self {
            action: action.into(),
            tags,
            filter,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn filter(&self) -> bool {
        self.filter
    }

    /// Open a listener over exactly this field's tags
    pub fn subscribe(&self, broker: &Broker) -> Result<Listener, BrokerError> {
        broker.subscribe(self.tags.iter().cloned())
    }

    /// Turn one delivered event into the value pushed to the subscriber.
    ///
    /// Returns `None` when filtering is on and the action answered `null`.
    pub async fn resolve(
        &self,
        payload: Value,
        mut args: Params,
        ctx: &dyn CallContext,
    ) -> Option<FieldOutcome> {
        args.insert("payload".to_string(), payload);
        match ctx.call(&self.action, Value::Object(args)).await {
            Ok(Value::Null) if self.filter => None,
            Ok(value) => Some(FieldOutcome::Value(value)),
            Err(source) => Some(FieldOutcome::Failed(ResolutionError::CallFailed {
                action: self.action.clone(),
                source,
            })),
        }
    }
}

/// A resolver bound to one field of one type
#[derive(Clone)]
pub enum Resolver {
    Action(ActionResolver),
    Subscription(SubscriptionResolver),
    Local(Arc<dyn FieldResolver>),
}

impl Resolver {
    /// The remote action this resolver depends on, if any
    pub fn action(&self) -> Option<&str> {
        match self {
            Resolver::Action(r) => Some(r.action()),
            Resolver::Subscription(r) => Some(r.action()),
            Resolver::Local(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Resolver::Action(_) => "action",
            Resolver::Subscription(_) => "subscription",
            Resolver::Local(_) => "local",
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Action(r) => f.debug_tuple("Action").field(r).finish(),
            Resolver::Subscription(r) => f.debug_tuple("Subscription").field(r).finish(),
            Resolver::Local(_) => f.write_str("Local(..)"),
        }
    }
}

/// Resolvers keyed by `TypeName -> fieldName`
#[derive(Debug, Clone, Default)]
pub struct ResolverTable {
    tree: Tree<Resolver>,
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from service-level specs.
    ///
    /// Entries without an action bind nothing and are skipped.
    pub fn from_specs(specs: &ResolverSpecs) -> Self {
        let mut table = Self::new();
        for (type_name, fields) in specs {
            for (field, spec) in fields {
                match spec.as_action() {
                    Some(spec) => {
                        let resolver = Resolver::Action(ActionResolver::from_spec(spec));
                        table.insert(type_name, field, resolver);
                    }
                    None => debug!(%type_name, %field, "skipping resolver entry without an action"),
                }
            }
        }
        table
    }

    pub fn insert(&mut self, type_name: &str, field: &str, resolver: Resolver) {
        self.tree.insert_path(&[type_name, field], Tree::Leaf(resolver));
    }

    pub fn get(&self, type_name: &str, field: &str) -> Option<&Resolver> {
        self.tree.get_path(&[type_name, field])?.as_leaf()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Type names in first-declaration order
    pub fn type_names(&self) -> Vec<&str> {
        self.tree
            .as_map()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every bound field as `(type, field, resolver)`
    pub fn entries(&self) -> Vec<(String, String, &Resolver)> {
        self.tree
            .leaves()
            .into_iter()
            .filter_map(|(path, resolver)| match path.as_slice() {
                [type_name, field] => Some((type_name.clone(), field.clone(), resolver)),
                _ => None,
            })
            .collect()
    }

    /// Deep-merge `patch` into this table; later entries win
    pub fn merge(self, patch: ResolverTable, overrides: &mut Vec<Override>) -> Self {
        Self {
            tree: merge_reporting(self.tree, patch.tree, overrides),
        }
    }

    /// Fail on the first resolver whose action is not in `known`
    pub fn check_actions<F>(&self, mut known: F) -> Result<(), CompileError>
    where
        F: FnMut(&str) -> bool,
    {
        for (type_name, field, resolver) in self.entries() {
            if let Some(action) = resolver.action() {
                if !known(action) {
                    return Err(CompileError::UnknownAction {
                        type_name,
                        field,
                        action: action.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
