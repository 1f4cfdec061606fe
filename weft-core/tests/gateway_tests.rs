//! End-to-end behaviour of the gateway over a changing registry

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use weft_core::config::SnapshotConfig;
use weft_core::{
    CallContext, CallError, FieldInvocation, FieldOutcome, FieldResolver, Gateway, GatewayConfig,
    Params, ResolutionError, SchemaState, StaticRegistry,
};
use weft_types::{
    ActionContractDecl, ActionDescriptor, ActionResolverSpec, ResolverSpec, ServiceContractDecl,
    ServiceDescriptor,
};

/// Answers from a table keyed by action; unknown actions fail
#[derive(Default)]
struct StubContext {
    answers: Vec<(&'static str, Value)>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StubContext {
    fn answering(answers: Vec<(&'static str, Value)>) -> Self {
        Self {
            answers,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CallContext for StubContext {
    async fn call(&self, action: &str, params: Value) -> Result<Value, CallError> {
        self.calls.lock().push((action.to_string(), params));
        self.answers
            .iter()
            .find(|(name, _)| *name == action)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| CallError::new(format!("{action} is down")).with_code("UNAVAILABLE"))
    }
}

fn query(decl: &str) -> ActionContractDecl {
    ActionContractDecl {
        query: Some(decl.into()),
        ..Default::default()
    }
}

fn subscription(decl: &str, tags: &[&str], filter: bool) -> ActionContractDecl {
    ActionContractDecl {
        subscription: Some(decl.into()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        filter,
        ..Default::default()
    }
}

fn users() -> ServiceDescriptor {
    ServiceDescriptor::new("users")
        .with_action(ActionDescriptor::new("users.get").with_contract(query("user(id: ID!): User")))
        .with_action(ActionDescriptor::new("users.find"))
        .with_contract(ServiceContractDecl {
            types: Some("type User { id: ID! name: String }".into()),
            ..Default::default()
        })
}

fn orders() -> ServiceDescriptor {
    ServiceDescriptor::new("orders")
        .with_action(ActionDescriptor::new("orders.list").with_contract(query("orders: [Order]")))
        .with_action(ActionDescriptor::new("orders.created").with_contract(subscription(
            "orderCreated: Order",
            &["orders"],
            false,
        )))
        .with_action(
            ActionDescriptor::new("orders.mine").with_contract(subscription(
                "myOrders: Order",
                &["orders", "refunds"],
                true,
            )),
        )
        .with_contract(ServiceContractDecl {
            types: Some("type Order { id: ID! customerId: ID customer: User }".into()),
            resolvers: [(
                "Order".to_string(),
                [(
                    "customer".to_string(),
                    ResolverSpec::Action(ActionResolverSpec {
                        action: "users.find".into(),
                        root_params: Some(
                            [("customerId".to_string(), "id".to_string())]
                                .into_iter()
                                .collect(),
                        ),
                    }),
                )]
                .into_iter()
                .collect(),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        })
}

fn no_snapshot() -> GatewayConfig {
    GatewayConfig {
        snapshot: SnapshotConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn gateway(registry: Arc<StaticRegistry>) -> Gateway {
    Gateway::builder().config(no_snapshot()).registry(registry).build().unwrap()
}

#[tokio::test]
async fn nested_field_uses_root_params() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let ctx = StubContext::answering(vec![("users.find", json!({"id": "c9", "name": "Ada"}))]);

    let parent = json!({"id": "o1", "customerId": "c9"});
    let outcome = gw
        .invoke("Order", "customer", &parent, Params::new(), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome, FieldOutcome::Value(json!({"id": "c9", "name": "Ada"})));
    assert_eq!(ctx.calls(), vec![("users.find".to_string(), json!({"id": "c9"}))]);
}

#[tokio::test]
async fn declared_field_without_resolver_reads_parent() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users()])));
    let ctx = StubContext::default();

    let parent = json!({"id": "u1", "name": "Ada"});
    let name = gw.invoke("User", "name", &parent, Params::new(), &ctx).await.unwrap();
    assert_eq!(name, FieldOutcome::Value(json!("Ada")));
    assert!(ctx.calls().is_empty());
}

#[tokio::test]
async fn failing_field_leaves_siblings_alone() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let ctx = StubContext::answering(vec![("orders.list", json!([{"id": "o1"}]))]);

    let mut args = Params::new();
    args.insert("id".into(), json!("u1"));
    let outcomes = gw
        .execute(
            &[
                FieldInvocation::new("Query", "user").with_args(args),
                FieldInvocation::new("Query", "orders"),
                FieldInvocation::new("Query", "missing"),
            ],
            &ctx,
        )
        .await
        .unwrap();

    match &outcomes[0] {
        FieldOutcome::Failed(ResolutionError::CallFailed { action, source }) => {
            assert_eq!(action, "users.get");
            assert_eq!(source.code.as_deref(), Some("UNAVAILABLE"));
        }
        other => panic!("expected call failure, got {other:?}"),
    }
    assert_eq!(outcomes[1], FieldOutcome::Value(json!([{"id": "o1"}])));
    assert!(matches!(outcomes[2], FieldOutcome::Failed(ResolutionError::NoResolver { .. })));
}

#[tokio::test]
async fn subscription_field_is_not_invokable() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let outcome = gw
        .invoke(
            "Subscription",
            "orderCreated",
            &Value::Null,
            Params::new(),
            &StubContext::default(),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        FieldOutcome::Failed(ResolutionError::NotInvokable { .. })
    ));
}

#[tokio::test]
async fn events_fan_out_by_tag() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let ctx: Arc<StubContext> = Arc::new(StubContext::answering(vec![
        ("orders.created", json!("created")),
        ("orders.mine", json!("mine")),
    ]));

    let mut created = gw
        .subscribe("orderCreated", Params::new(), ctx.clone())
        .await
        .unwrap();
    let mut mine = gw
        .subscribe("myOrders", Params::new(), ctx.clone())
        .await
        .unwrap();

    assert_eq!(gw.publish("orders", json!({"id": "o1"})), 2);
    assert_eq!(gw.publish("refunds", json!({"id": "o2"})), 1);
    assert_eq!(gw.publish("shipping", json!({"id": "o3"})), 0);

    assert_eq!(created.next().await, Some(FieldOutcome::Value(json!("created"))));
    assert_eq!(mine.next().await, Some(FieldOutcome::Value(json!("mine"))));
    assert_eq!(mine.next().await, Some(FieldOutcome::Value(json!("mine"))));

    let payloads: Vec<Value> = ctx
        .calls()
        .into_iter()
        .filter(|(action, _)| action == "orders.mine")
        .map(|(_, params)| params["payload"]["id"].clone())
        .collect();
    assert_eq!(payloads, vec![json!("o1"), json!("o2")]);
}

#[tokio::test]
async fn filtered_subscription_skips_null_results() {
    struct OnlyEven;

    #[async_trait]
    impl CallContext for OnlyEven {
        async fn call(&self, _action: &str, params: Value) -> Result<Value, CallError> {
            let n = params["payload"].as_i64().unwrap_or_default();
            Ok(if n % 2 == 0 { json!(n) } else { Value::Null })
        }
    }

    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let mut mine = gw
        .subscribe("myOrders", Params::new(), Arc::new(OnlyEven))
        .await
        .unwrap();

    for n in 1..=4 {
        gw.publish("orders", json!(n));
    }
    gw.on_registry_changed();
    gw.document().await.unwrap();

    let seen: Vec<FieldOutcome> = mine.by_ref().collect().await;
    assert_eq!(seen, vec![FieldOutcome::Value(json!(2)), FieldOutcome::Value(json!(4))]);
}

#[tokio::test]
async fn recompile_ends_open_subscriptions() {
    let registry = Arc::new(StaticRegistry::new(vec![users(), orders()]));
    let gw = gateway(registry.clone());
    let ctx = Arc::new(StubContext::answering(vec![("orders.created", json!(1))]));

    let mut stream = gw
        .subscribe("orderCreated", Params::new(), ctx.clone())
        .await
        .unwrap();
    let old_broker = gw.lifecycle().current().unwrap().broker.clone();

    registry.remove("users");
    gw.on_registry_changed();
    assert_eq!(gw.lifecycle().state(), SchemaState::Invalid);

    // orders still references users.find, so the recompile fails and the
    // old artifact keeps serving
    assert!(gw.document().await.is_err());
    assert!(!old_broker.is_closed());
    assert_eq!(gw.publish("orders", json!({})), 1);
    assert_eq!(stream.next().await, Some(FieldOutcome::Value(json!(1))));

    registry.upsert(users());
    gw.on_registry_changed();
    gw.document().await.unwrap();

    assert!(old_broker.is_closed());
    assert_eq!(stream.next().await, None);
    assert_eq!(gw.publish("orders", json!({})), 0);
}

#[tokio::test]
async fn compiles_once_until_the_registry_changes() {
    let registry = Arc::new(StaticRegistry::new(vec![users()]));
    let gw = gateway(registry.clone());
    let ctx = StubContext::answering(vec![("users.get", json!({"id": "u1"}))]);
    let mut updates = gw.subscribe_updates();

    for _ in 0..3 {
        gw.invoke("Query", "user", &Value::Null, Params::new(), &ctx).await.unwrap();
    }
    assert_eq!(gw.lifecycle().stats().compiles, 1);
    assert_eq!(updates.recv().await.unwrap().generation.0, 0);

    registry.upsert(orders());
    let generation = gw.on_registry_changed();
    let outcome = gw
        .invoke("Query", "orders", &Value::Null, Params::new(), &ctx)
        .await
        .unwrap();

    // orders.list is not stubbed, but the field now exists
    assert!(matches!(outcome, FieldOutcome::Failed(ResolutionError::CallFailed { .. })));
    assert_eq!(gw.lifecycle().stats().compiles, 2);

    let update = updates.recv().await.unwrap();
    assert_eq!(update.generation, generation);
    assert!(update.document.contains("orders: [Order]"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invocations_share_one_compile() {
    let gw = gateway(Arc::new(StaticRegistry::new(vec![users(), orders()])));
    let ctx = Arc::new(StubContext::answering(vec![("orders.list", json!([]))]));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let gw = gw.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                gw.invoke("Query", "orders", &Value::Null, Params::new(), ctx.as_ref())
                    .await
                    .unwrap()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), FieldOutcome::Value(json!([])));
    }
    assert_eq!(gw.lifecycle().stats().compiles, 1);
}

#[tokio::test]
async fn local_resolver_is_bound_ahead_of_services() {
    struct Health;

    #[async_trait]
    impl FieldResolver for Health {
        async fn resolve(
            &self,
            _parent: &Value,
            _args: Params,
            _ctx: &dyn CallContext,
        ) -> FieldOutcome {
            FieldOutcome::Value(json!("ok"))
        }
    }

    let base = ServiceDescriptor::new("gateway").with_contract(ServiceContractDecl {
        types: Some("extend type Query { health: String }".into()),
        ..Default::default()
    });
    let gw = Gateway::builder()
        .config(no_snapshot())
        .registry(Arc::new(StaticRegistry::new(vec![base, users()])))
        .local_resolver("Query", "health", Arc::new(Health))
        .build()
        .unwrap();

    let outcome = gw
        .invoke("Query", "health", &Value::Null, Params::new(), &StubContext::default())
        .await
        .unwrap();
    assert_eq!(outcome, FieldOutcome::Value(json!("ok")));
}

#[tokio::test]
async fn snapshot_written_on_compile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots").join("schema.graphql");
    let gw = Gateway::builder()
        .config(GatewayConfig {
            type_defs: vec!["scalar Date".into()],
            snapshot: SnapshotConfig {
                enabled: true,
                path: path.clone(),
            },
            ..Default::default()
        })
        .registry(Arc::new(StaticRegistry::new(vec![users()])))
        .build()
        .unwrap();

    let document = gw.document().await.unwrap();
    assert!(document.starts_with("scalar Date\n\ntype Query {"));
    assert_eq!(gw.lifecycle().flush_snapshot().await, Some(true));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), document);
}
