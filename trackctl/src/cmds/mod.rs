//! Implementation of the sub-commands.
//!

mod list;
mod locate;
mod notify;
mod publish;
mod watch;

pub use list::*;
pub use locate::*;
pub use notify::*;
pub use publish::*;
pub use watch::*;

use tracing::{info, warn};

/// Resolve on Ctrl-C.
///
pub async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupted"),
        // Without signal handling, we never get here
        Err(e) => {
            warn!("no signal handling: {}", e);
            std::future::pending::<()>().await
        }
    }
}
