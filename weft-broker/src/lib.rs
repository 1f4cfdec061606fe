//! weft-broker - tag-keyed publish/subscribe for weft subscriptions
//!
//! Events are published under a tag and delivered to every listener that
//! subscribed to that tag. A listener may subscribe to several tags at once;
//! it then receives the events of all of them.
//!
//! # Example
//!
//! ```rust
//! use weft_broker::Broker;
//! use serde_json::json;
//!
//! let broker = Broker::new();
//! let mut listener = broker.subscribe(["orders", "inventory"]).unwrap();
//!
//! broker.publish("orders", json!({"id": "o1"})).unwrap();
//! assert_eq!(listener.try_recv().unwrap().payload, json!({"id": "o1"}));
//!
//! // Dropping the listener removes it from both topics
//! drop(listener);
//! assert!(broker.active_tags().is_empty());
//! ```

pub mod broker;
pub mod error;
pub mod topic;
pub mod types;

pub use broker::{Broker, Listener};
pub use error::{BrokerError, Result};
pub use topic::TopicTable;
pub use types::{BrokerId, Event, ListenerId};
