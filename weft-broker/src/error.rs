//! Error types for the broker

use crate::types::BrokerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker was superseded by a newer compile and no longer accepts work
    #[error("{0} is closed")]
    Closed(BrokerId),
}

/// Result type using BrokerError
pub type Result<T> = std::result::Result<T, BrokerError>;
