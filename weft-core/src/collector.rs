//! Fragment collection
//!
//! Walks the registry listing and gathers every contract contribution into
//! ordered sequences plus one merged resolver table. Services are visited in
//! listing order, which is also the precedence order for resolver conflicts.

use crate::error::CompileError;
use crate::merge::Override;
use crate::resolver::{ActionResolver, Resolver, ResolverTable, SubscriptionResolver};
use tracing::trace;
use weft_types::{ActionContractDecl, OneOrMany, ServiceDescriptor};

/// Extract the field name from a declaration.
///
/// `"user(id: ID!): User"` gives `user`, `"count: Int"` gives `count`.
/// Returns `None` when nothing precedes the first `(` or `:`.
pub fn field_name(declaration: &str) -> Option<&str> {
    let head = declaration
        .trim()
        .split(['(', ':'])
        .next()
        .unwrap_or_default()
        .trim();
    (!head.is_empty()).then_some(head)
}

/// A resolver from an earlier service replaced by a later one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The service whose contribution won
    pub service: String,
    /// `Type.field` of the replaced resolver
    pub path: String,
}

/// Everything collected from one registry listing
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    pub queries: Vec<String>,
    pub mutations: Vec<String>,
    pub subscriptions: Vec<String>,
    pub types: Vec<String>,
    pub enums: Vec<String>,
    pub resolvers: ResolverTable,
    pub conflicts: Vec<Conflict>,
}

impl Fragments {
    /// True when no service contributed any declaration text
    pub fn has_declarations(&self) -> bool {
        !(self.queries.is_empty()
            && self.mutations.is_empty()
            && self.subscriptions.is_empty()
            && self.types.is_empty()
            && self.enums.is_empty())
    }
}

/// Root operation a declaration contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Query,
    Mutation,
    Subscription,
}

impl Root {
    fn type_name(self) -> &'static str {
        match self {
            Root::Query => "Query",
            Root::Mutation => "Mutation",
            Root::Subscription => "Subscription",
        }
    }
}

/// Collects fragments on top of a seed resolver table
#[derive(Debug, Clone, Default)]
pub struct FragmentCollector {
    seed: ResolverTable,
}

impl FragmentCollector {
    pub fn new(seed: ResolverTable) -> Self {
        Self { seed }
    }

    pub fn collect(&self, services: &[ServiceDescriptor]) -> Result<Fragments, CompileError> {
        let mut out = Fragments {
            resolvers: self.seed.clone(),
            ..Fragments::default()
        };

        for service in services {
            self.collect_service(service, &mut out)?;
        }

        Ok(out)
    }

    fn collect_service(
        &self,
        service: &ServiceDescriptor,
        out: &mut Fragments,
    ) -> Result<(), CompileError> {
        if let Some(contract) = service.contract() {
            extend(&mut out.types, contract.types.as_ref());
            extend(&mut out.enums, contract.enums.as_ref());
            extend(&mut out.subscriptions, contract.subscriptions.as_ref());

            if !contract.resolvers.is_empty() {
                let patch = ResolverTable::from_specs(&contract.resolvers);
                merge_into(out, patch, &service.name);
            }
        }

        let mut patch = ResolverTable::new();
        for action in service.actions.values() {
            let Some(decl) = &action.graphql else {
                continue;
            };
            trace!(
                service = %service.name,
                action = %action.name,
                "collecting action declarations"
            );

            for (root, declarations) in [
                (Root::Query, &decl.query),
                (Root::Mutation, &decl.mutation),
                (Root::Subscription, &decl.subscription),
            ] {
                let Some(declarations) = declarations else {
                    continue;
                };
                for declaration in declarations.iter() {
                    let field = field_name(declaration).ok_or_else(|| {
                        CompileError::MalformedDeclaration {
                            owner: action.name.clone(),
                            declaration: declaration.to_string(),
                        }
                    })?;

                    let sequence = match root {
                        Root::Query => &mut out.queries,
                        Root::Mutation => &mut out.mutations,
                        Root::Subscription => &mut out.subscriptions,
                    };
                    sequence.push(declaration.to_string());
                    patch.insert(root.type_name(), field, bind(root, &action.name, decl));
                }
            }
        }

        if !patch.is_empty() {
            merge_into(out, patch, &service.name);
        }
        Ok(())
    }
}

fn bind(root: Root, action: &str, decl: &ActionContractDecl) -> Resolver {
    match root {
        Root::Subscription => Resolver::Subscription(SubscriptionResolver::new(
            action,
            decl.tags.clone(),
            decl.filter,
        )),
        Root::Query | Root::Mutation => {
            Resolver::Action(ActionResolver::new(action, decl.root_params.clone()))
        }
    }
}

fn extend(sequence: &mut Vec<String>, declarations: Option<&OneOrMany>) {
    if let Some(declarations) = declarations {
        sequence.extend(declarations.iter().map(String::from));
    }
}

fn merge_into(out: &mut Fragments, patch: ResolverTable, service: &str) {
    let mut overrides: Vec<Override> = Vec::new();
    let resolvers = std::mem::take(&mut out.resolvers);
    out.resolvers = resolvers.merge(patch, &mut overrides);
    out.conflicts.extend(overrides.into_iter().map(|o| Conflict {
        service: service.to_string(),
        path: o.dotted(),
    }));
}
