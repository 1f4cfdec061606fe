//! Tag-keyed listener table
//!
//! Maps each tag to the listeners currently interested in it. A tag with no
//! listeners is removed from the table, so topics only exist while someone is
//! listening.

use crate::types::{Event, ListenerId};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Listener registrations grouped by tag
#[derive(Debug, Default)]
pub struct TopicTable {
    topics: HashMap<String, Vec<(ListenerId, UnboundedSender<Event>)>>,
}

impl TopicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` under every tag in `tags`
    ///
    /// Duplicate tags are registered once.
    pub fn insert(&mut self, id: ListenerId, tags: &[String], sender: &UnboundedSender<Event>) {
        for tag in tags {
            let listeners = self.topics.entry(tag.clone()).or_default();
            if !listeners.iter().any(|(existing, _)| *existing == id) {
                listeners.push((id, sender.clone()));
            }
        }
    }

    /// Remove a listener from the given tags, dropping emptied topics
    pub fn remove(&mut self, id: ListenerId, tags: &[String]) {
        for tag in tags {
            if let Some(listeners) = self.topics.get_mut(tag) {
                listeners.retain(|(existing, _)| *existing != id);
                if listeners.is_empty() {
                    self.topics.remove(tag);
                }
            }
        }
    }

    /// Deliver an event to every listener of its tag, in registration order.
    ///
    /// Returns the number of listeners reached. Listeners whose receiving end
    /// is gone are pruned.
    pub fn dispatch(&mut self, event: &Event) -> usize {
        let Some(listeners) = self.topics.get_mut(&event.tag) else {
            return 0;
        };

        let mut delivered = 0;
        listeners.retain(|(_, sender)| {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });

        if listeners.is_empty() {
            self.topics.remove(&event.tag);
        }
        delivered
    }

    pub fn listener_count(&self, tag: &str) -> usize {
        self.topics.get(tag).map(Vec::len).unwrap_or(0)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }
}
