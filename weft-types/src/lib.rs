//! Shared types for weft
//!
//! This crate provides the data model that services use to declare their
//! contributions to the composed contract: per-action declarations, the
//! service-level declaration block, and the service descriptor the registry
//! hands out.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One declaration or a list of them.
///
/// Services may write `query: "user(id: ID!): User"` or
/// `query: ["user(id: ID!): User", "users: [User]"]`; both collapse to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            OneOrMany::One(s) => std::slice::from_ref(s),
            OneOrMany::Many(v) => v.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for OneOrMany {
    fn from(s: &str) -> Self {
        OneOrMany::One(s.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(v: Vec<&str>) -> Self {
        OneOrMany::Many(v.into_iter().map(String::from).collect())
    }
}

/// Mapping from a field on the parent object to the argument name the
/// downstream action expects.
pub type RootParams = IndexMap<String, String>;

/// Contract fragment declared by a single action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContractDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<OneOrMany>,

    /// Topics a subscription listens on. Multiple tags are OR'd.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Drop events whose resolved value is `null`
    #[serde(default)]
    pub filter: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_params: Option<RootParams>,
}

/// Resolver declared at service level for a non-root type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResolverSpec {
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_params: Option<RootParams>,
}

/// One entry of a service-level resolver map
///
/// Only `{action, rootParams?}` entries bind anything. Entries of any other
/// shape are kept as written so one odd entry does not reject the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolverSpec {
    Action(ActionResolverSpec),
    Other(serde_json::Value),
}

impl ResolverSpec {
    /// The action resolver, if this entry names a non-empty action
    pub fn as_action(&self) -> Option<&ActionResolverSpec> {
        match self {
            ResolverSpec::Action(spec) if !spec.action.is_empty() => Some(spec),
            _ => None,
        }
    }
}

impl From<ActionResolverSpec> for ResolverSpec {
    fn from(spec: ActionResolverSpec) -> Self {
        ResolverSpec::Action(spec)
    }
}

/// `TypeName -> fieldName -> entry`
pub type ResolverSpecs = IndexMap<String, IndexMap<String, ResolverSpec>>;

/// Contract fragment declared by a service as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContractDecl {
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub types: Option<OneOrMany>,

    #[serde(default, alias = "enum", skip_serializing_if = "Option::is_none")]
    pub enums: Option<OneOrMany>,

    #[serde(default)]
    pub resolvers: ResolverSpecs,

    #[serde(default, alias = "subscription", skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<OneOrMany>,
}

/// An action as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Fully qualified action name, e.g. `users.get`
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<ActionContractDecl>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graphql: None,
        }
    }

    pub fn with_contract(mut self, decl: ActionContractDecl) -> Self {
        self.graphql = Some(decl);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<ServiceContractDecl>,

    /// Everything else a service carries in its settings; ignored by the composer.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A service as listed by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Actions in declaration order, keyed by fully qualified name
    #[serde(default, with = "action_list")]
    pub actions: IndexMap<String, ActionDescriptor>,

    #[serde(default)]
    pub settings: ServiceSettings,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            actions: IndexMap::new(),
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn with_contract(mut self, decl: ServiceContractDecl) -> Self {
        self.settings.graphql = Some(decl);
        self
    }

    pub fn contract(&self) -> Option<&ServiceContractDecl> {
        self.settings.graphql.as_ref()
    }
}

/// Actions are written as a list in manifests and kept keyed by name.
mod action_list {
    use super::ActionDescriptor;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        actions: &IndexMap<String, ActionDescriptor>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(actions.values())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<IndexMap<String, ActionDescriptor>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<ActionDescriptor>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|a| (a.name.clone(), a)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let one: OneOrMany = serde_json::from_str(r#""users: [User]""#).unwrap();
        let many: OneOrMany = serde_json::from_str(r#"["a: Int", "b: Int"]"#).unwrap();

        assert_eq!(one.to_vec(), vec!["users: [User]"]);
        assert_eq!(many.iter().collect::<Vec<_>>(), vec!["a: Int", "b: Int"]);
    }

    #[test]
    fn service_manifest_from_yaml() {
        let yaml = r#"
name: orders
settings:
  timeout: 30
  graphql:
    type: "type Order { id: ID! customer: Customer }"
    resolvers:
      Order:
        customer:
          action: customers.get
          rootParams:
            customerId: id
actions:
  - name: orders.list
    graphql:
      query: "orders: [Order]"
  - name: orders.created
    graphql:
      subscription: "orderCreated: Order"
      tags: [orders]
      filter: true
"#;
        let service: ServiceDescriptor = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(service.name, "orders");
        assert_eq!(service.actions.len(), 2);
        assert_eq!(
            service.actions.keys().collect::<Vec<_>>(),
            vec!["orders.list", "orders.created"]
        );

        let contract = service.contract().unwrap();
        assert_eq!(contract.types.as_ref().unwrap().to_vec().len(), 1);
        let spec = contract.resolvers["Order"]["customer"].as_action().unwrap();
        assert_eq!(spec.action, "customers.get");
        assert_eq!(spec.root_params.as_ref().unwrap()["customerId"], "id");

        let created = service.actions["orders.created"].graphql.as_ref().unwrap();
        assert!(created.filter);
        assert_eq!(created.tags, vec!["orders"]);
        assert_eq!(service.settings.extra["timeout"], serde_json::json!(30));
    }

    #[test]
    fn resolver_entry_without_action_is_kept_aside() {
        let yaml = r#"
name: orders
settings:
  graphql:
    resolvers:
      Order:
        customer:
          action: customers.get
        total:
          rootParams:
            orderId: id
        notes: computed locally
        empty:
          action: ""
"#;
        let service: ServiceDescriptor = serde_yaml::from_str(yaml).unwrap();
        let order = &service.contract().unwrap().resolvers["Order"];

        assert_eq!(order.len(), 4);
        assert_eq!(order["customer"].as_action().unwrap().action, "customers.get");
        assert!(matches!(order["total"], ResolverSpec::Other(_)));
        assert!(order["total"].as_action().is_none());
        assert!(order["notes"].as_action().is_none());
        assert!(order["empty"].as_action().is_none());
    }
}
