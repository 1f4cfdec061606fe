//! The publish/subscribe broker

use crate::error::{BrokerError, Result};
use crate::topic::TopicTable;
use crate::types::{BrokerId, Event, ListenerId};
use futures_util::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, trace};

struct Inner {
    id: BrokerId,
    topics: Mutex<TopicTable>,
    closed: AtomicBool,
}

/// A tag-keyed publish/subscribe channel
///
/// Cloning is cheap and yields a handle to the same broker.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: BrokerId::new(),
                topics: Mutex::new(TopicTable::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> BrokerId {
        self.inner.id
    }

    /// Open a listener receiving every event published under any of `tags`
    pub fn subscribe<I, S>(&self, tags: I) -> Result<Listener>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_closed() {
            return Err(BrokerError::Closed(self.inner.id));
        }

        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        let id = ListenerId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.topics.lock().insert(id, &tags, &tx);
        debug!(broker = %self.inner.id, listener = %id, ?tags, "listener subscribed");

        Ok(Listener {
            id,
            tags,
            rx,
            broker: Arc::downgrade(&self.inner),
        })
    }

    /// Fan an event out to every listener of `tag`.
    ///
    /// Returns how many listeners received it.
    pub fn publish(&self, tag: impl Into<String>, payload: serde_json::Value) -> Result<usize> {
        if self.is_closed() {
            return Err(BrokerError::Closed(self.inner.id));
        }

        let event = Event {
            tag: tag.into(),
            payload,
        };
        let delivered = self.inner.topics.lock().dispatch(&event);
        trace!(broker = %self.inner.id, tag = %event.tag, delivered, "event published");
        Ok(delivered)
    }

    /// Stop accepting work and end every open listener.
    ///
    /// Events already queued for a listener are still yielded before its
    /// stream ends.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.topics.lock().clear();
            debug!(broker = %self.inner.id, "broker closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, tag: &str) -> usize {
        self.inner.topics.lock().listener_count(tag)
    }

    /// Tags that currently have at least one listener
    pub fn active_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.inner.topics.lock().tags().map(String::from).collect();
        tags.sort();
        tags
    }
}

/// A live registration on a broker
///
/// Yields events as a [`Stream`]. Dropping the listener removes it from every
/// topic it was registered under before `drop` returns.
pub struct Listener {
    id: ListenerId,
    tags: Vec<String>,
    rx: mpsc::UnboundedReceiver<Event>,
    broker: Weak<Inner>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Wait for the next event; `None` once the broker is closed
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Listener {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            inner.topics.lock().remove(self.id, &self.tags);
            debug!(broker = %inner.id, listener = %self.id, "listener released");
        }
    }
}
