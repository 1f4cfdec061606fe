//! Schema compilation
//!
//! Turns one registry listing into a contract document plus the resolver
//! table bound to it. Every compile starts from scratch; nothing from a
//! previous compile is patched or reused.

use crate::builder::{ContractBuilder, Outline, StructuralBuilder};
use crate::collector::{FragmentCollector, Fragments};
use crate::error::CompileError;
use crate::resolver::ResolverTable;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};
use weft_types::ServiceDescriptor;

/// Output of a successful compile
#[derive(Debug, Clone)]
pub struct Compiled {
    pub document: String,
    pub resolvers: ResolverTable,
    pub outline: Outline,
}

fn block(type_name: &str, declarations: &[String]) -> Option<String> {
    if declarations.is_empty() {
        return None;
    }
    Some(format!("type {type_name} {{\n{}\n}}", declarations.join("\n")))
}

/// Assemble the contract document.
///
/// Base definitions first, then the root blocks that have at least one
/// declaration, then type and enum declarations verbatim.
pub fn assemble(base: &[String], fragments: &Fragments) -> String {
    let mut segments: Vec<String> = base.to_vec();

    if fragments.has_declarations() {
        segments.extend(block("Query", &fragments.queries));
        segments.extend(block("Mutation", &fragments.mutations));
        segments.extend(block("Subscription", &fragments.subscriptions));
        segments.extend(fragments.types.iter().cloned());
        segments.extend(fragments.enums.iter().cloned());
    }

    segments.join("\n\n")
}

/// Compiles registry listings into contracts
pub struct SchemaCompiler {
    base_type_defs: Vec<String>,
    collector: FragmentCollector,
    builder: Arc<dyn ContractBuilder>,
}

impl std::fmt::Debug for SchemaCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCompiler")
            .field("base_type_defs", &self.base_type_defs.len())
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new(Vec::new(), ResolverTable::new())
    }
}

impl SchemaCompiler {
    pub fn new(base_type_defs: Vec<String>, seed: ResolverTable) -> Self {
        Self {
            base_type_defs,
            collector: FragmentCollector::new(seed),
            builder: Arc::new(StructuralBuilder),
        }
    }

    pub fn with_builder(mut self, builder: Arc<dyn ContractBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn compile(&self, services: &[ServiceDescriptor]) -> Result<Compiled, CompileError> {
        self.try_compile(services).inspect_err(|err| {
            error!(error = %err, services = services.len(), "schema compilation failed");
        })
    }

    fn try_compile(&self, services: &[ServiceDescriptor]) -> Result<Compiled, CompileError> {
        let fragments = self.collector.collect(services)?;

        for conflict in &fragments.conflicts {
            warn!(
                service = %conflict.service,
                resolver = %conflict.path,
                "resolver overridden by a later service"
            );
        }

        let known: HashSet<&str> = services
            .iter()
            .flat_map(|s| s.actions.keys().map(String::as_str))
            .collect();
        fragments.resolvers.check_actions(|action| known.contains(action))?;

        let document = assemble(&self.base_type_defs, &fragments);
        let outline = self.builder.build(&document, &fragments.resolvers)?;

        debug!(
            queries = fragments.queries.len(),
            mutations = fragments.mutations.len(),
            subscriptions = fragments.subscriptions.len(),
            types = fragments.types.len(),
            "schema compiled"
        );

        Ok(Compiled {
            document,
            resolvers: fragments.resolvers,
            outline,
        })
    }
}
