//! # weft-core
//!
//! Core library for the weft service gateway.
//!
//! This crate composes one API contract out of the fragments many services
//! declare, binds each field to the remote action that serves it, and keeps
//! the compiled result in step with a changing service registry.

pub mod builder;
pub mod collector;
pub mod compiler;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod merge;
pub mod registry;
pub mod resolver;
pub mod snapshot;

pub use builder::{ContractBuilder, Outline, StructuralBuilder};
pub use collector::{field_name, Conflict, FragmentCollector, Fragments};
pub use compiler::{Compiled, SchemaCompiler};
pub use config::GatewayConfig;
pub use error::{CallError, CompileError, ConfigError, Error, ResolutionError, Result};
pub use gateway::{FieldInvocation, Gateway, GatewayBuilder, SubscriptionStream};
pub use lifecycle::{
    CompiledArtifact, Generation, Invalidator, LifecycleStats, SchemaLifecycle, SchemaState,
    SchemaUpdated,
};
pub use merge::{merge, Override, Tree};
pub use registry::{RegistryManifest, ServiceRegistry, StaticRegistry};
pub use resolver::{
    ActionResolver, CallContext, FieldOutcome, FieldResolver, Params, Resolver, ResolverTable,
    SubscriptionResolver,
};
pub use weft_broker::{Broker, Event, Listener};
