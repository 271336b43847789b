//! Remote location feeds.
//!
//! A feed delivers the tracked ambulance's coordinate to a `Sink`, whatever the transport:
//!
//! - `PollFeed` repeatedly calls the REST endpoint on a fixed interval,
//! - `StompFeed` subscribes to the per-ambulance topic of the STOMP broker over a WebSocket,
//! - `ReplayFeed` reads raw payloads from a file or a channel (recorded sessions, tests).
//!
//! Push and poll are alternatives, a deployment picks one through the `transport` setting.
//!
//! Contract shared by all of them:
//!
//! - malformed payloads are logged, counted and dropped, the feed goes on;
//! - authorization problems are reported once through `on_error()` and the feed stops;
//! - transport errors are reported once and the feed stops, retrying is up to the caller;
//! - once `Subscription::cancel()` returns, the sink is never called again.
//!

use std::fmt::Debug;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use ambutrack_common::{Coordinate, Session};

use crate::{FeedError, Outlet, Sink, Subscription};

mod payload;
mod poll;
mod replay;
mod stomp;

pub use payload::*;
pub use poll::*;
pub use replay::*;
pub use stomp::*;

pub(crate) use stomp::pump;

/// Which transport a deployment uses.
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Transport {
    /// REST polling
    #[default]
    Poll,
    /// STOMP over WebSocket
    Push,
}

/// Anything able to deliver coordinates for a given ambulance.
///
#[enum_dispatch(FeedSource)]
pub trait Feed: Debug + Send + Sync {
    /// Return feed's name
    fn name(&self) -> String;
    /// Start delivering coordinates for `entity` to `sink`.
    fn subscribe(
        &self,
        entity: &str,
        session: &Session,
        sink: Box<dyn Sink<Coordinate>>,
    ) -> Subscription;
}

/// All feeds we know about.
///
#[enum_dispatch]
#[derive(Debug)]
pub enum FeedSource {
    PollFeed,
    StompFeed,
    ReplayFeed,
}

/// Network feeds refuse to start without a token.  The error is reported exactly once and the
/// returned `Subscription` has no task behind it.
///
pub(crate) fn authorize<T: 'static>(
    outlet: &Outlet<T>,
    session: &Session,
) -> Result<String, Subscription> {
    match session.bearer() {
        Some(bearer) => Ok(bearer),
        None => {
            outlet.fail(FeedError::Authorization(format!(
                "no token for user {}",
                session.user_id
            )));
            Err(outlet.subscription(None))
        }
    }
}

/// `User-Agent` for every request we make.
///
pub(crate) fn user_agent() -> String {
    crate::version()
}
