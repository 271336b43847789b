//! Live ambulance location tracking.
//!
//! This library holds everything between the network and the map:
//!
//! - `geo`: where is the device (viewer or driver), with a fallback when it can not tell,
//! - `feed`: where is the tracked ambulance, through REST polling or STOMP push,
//! - `reconcile`: is an update actually new, where should the map be centered,
//! - `map`: the map screen state machine driving a `Renderer`,
//! - `publish`: driver side, sending the device position to the backend,
//! - `notify`: per-user notifications from the dispatcher.
//!
//! Statistics are gathered by a `StatsActor` shared by feeds and publishers.
//!

mod actors;
mod config;
mod error;
mod handle;
mod stats;

pub mod feed;
pub mod geo;
pub mod map;
pub mod notify;
pub mod publish;
pub mod reconcile;

pub use actors::*;
pub use config::*;
pub use error::*;
pub use feed::{Feed, FeedSource, Transport};
pub use handle::{callbacks, Callbacks, ConnectionState, FeedEvent, Sink, Subscription, WatchHandle};
pub use stats::*;

pub(crate) use handle::Outlet;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
