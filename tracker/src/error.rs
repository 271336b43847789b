//! Error types for the tracker.
//!
//! Everything that can go wrong on the network or with positioning is converted into one of
//! these at the feed/adapter boundary and then into screen state, never thrown at the renderer.
//!

use std::time::Duration;

use thiserror::Error;

use ambutrack_common::Role;

/// Errors reported by a location or notification feed.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FeedError {
    /// Missing/invalid token, not recoverable by retrying the same request
    #[error("Authorization failed: {0}")]
    Authorization(String),
    /// Channel can not connect, was closed or the fetch failed
    #[error("Transport error: {0}")]
    Transport(String),
    /// Broker talked nonsense to us
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Malformed payload, only ever logged
    #[error("Invalid payload: {0}")]
    Parse(String),
}

impl FeedError {
    #[inline]
    pub fn is_authorization(&self) -> bool {
        matches!(self, FeedError::Authorization(_))
    }
}

/// Errors from the position sources.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Positioning denied or not supported")]
    PermissionDenied,
    #[error("Position unavailable: {0}")]
    Unavailable(String),
    #[error("No fix after {0:?}")]
    Timeout(Duration),
}

/// Errors from the driver-side position publisher.
///
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Role {0} can not publish a position")]
    NotDriver(Role),
    #[error("No token in session")]
    NoToken,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Server answered {0}")]
    Status(u16),
}
