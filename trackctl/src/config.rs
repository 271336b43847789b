//! Configuration of the `trackctl` utility.
//!
//! ```hcl
//! version = 1
//!
//! session {
//!   user_id = "42"
//!   role    = "DRIVER"
//!   token   = "eyJhbGciOi..."
//! }
//!
//! tracker {
//!   base_url  = "https://dispatch.example.net"
//!   transport = "push"
//! }
//! ```
//!

use std::path::PathBuf;

use eyre::{eyre, Result};
use serde::Deserialize;
use tracing::{trace, warn};

use ambutrack_common::{ConfigError, ConfigFile, Session, Versioned};
use ambutrack_tracker::TrackerConfig;

/// Config filename
pub const CONFIG: &str = "trackctl.hcl";
/// Current version
pub const CVERSION: usize = 1;

/// Configuration for the CLI tool: who we are and how to reach the backend.
///
#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: usize,
    /// Identity and credentials
    pub session: Option<Session>,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: CVERSION,
            session: None,
            tracker: TrackerConfig::default(),
        }
    }
}

impl Versioned for Config {
    const VERSION: usize = CVERSION;

    fn version(&self) -> usize {
        self.version
    }
}

impl Config {
    /// Load the given file or the default one.  Not having a default file is fine, it only means
    /// running with defaults and without a session.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<PathBuf>) -> Result<Config> {
        match ConfigFile::<Config>::load(CONFIG, fname.as_deref()) {
            Ok(cfg) => {
                trace!("loaded {:?}", cfg.path());
                Ok(cfg.into_inner())
            }
            Err(e) if fname.is_none() => match e.downcast_ref::<ConfigError>() {
                Some(ConfigError::MissingConfig(path)) => {
                    warn!("No configuration file {}, using defaults", path);
                    Ok(Config::default())
                }
                _ => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// The session, required by anything talking to the backend.
    ///
    pub fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| eyre!("no session defined in {}", CONFIG))
    }
}
