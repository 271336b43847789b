//! Tracker configuration.
//!
//! This is the `tracker` block of the tool configuration file, every field has a default so an
//! empty block (or no block at all) is valid:
//!
//! ```hcl
//! tracker {
//!   base_url      = "https://dispatch.example.net"
//!   transport     = "push"
//!   poll_interval = "5s"
//!
//!   geolocation {
//!     source   = "gpsd"
//!     address  = "127.0.0.1:2947"
//!     timeout  = "5s"
//!     fallback = [5.99245976331867, 7.465015634005065]
//!   }
//! }
//! ```
//!
//! The base URL can be overridden with `AMBUTRACK_API_URL`.
//!

use std::time::Duration;

use eyre::{eyre, Result};
use ractor::ActorRef;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tracing::{debug, trace};

use ambutrack_common::{Coordinate, DEFAULT_FALLBACK};

use crate::actors::StatsMsg;
use crate::feed::{
    FeedSource, PollFeed, StompEndpoint, StompFeed, Transport, DEF_INTERVAL, DEF_LOCATION_ROUTE,
    DEF_TOPIC, DEF_WS_ROUTE,
};
use crate::geo::{
    DeniedSource, FixedSource, GeoSource, GpsdSource, Locator, ReplaySource, DEF_GPSD,
    DEF_TIMEOUT,
};
use crate::notify::{NotificationFeed, DEF_QUEUE};
use crate::publish::{Publisher, DEF_UPDATE_ROUTE};
use crate::reconcile::Reconciler;

/// Environment variable overriding `base_url`
pub const API_URL_ENV: &str = "AMBUTRACK_API_URL";
/// Default backend
pub const DEF_BASE_URL: &str = "http://localhost:8080";
/// Default delay between two replayed positions
pub const DEF_STEP: Duration = Duration::from_secs(2);

/// Which position source to use.
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceKind {
    #[default]
    Fixed,
    Gpsd,
    Denied,
    Replay,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    pub source: SourceKind,
    /// gpsd address
    pub address: String,
    /// Position of a `fixed` source, the fallback if not set
    pub position: Option<[f64; 2]>,
    /// Positions played by a `replay` source
    pub track: Vec<[f64; 2]>,
    /// Delay between two replayed positions
    #[serde_as(as = "DisplayFromStr")]
    pub step: humantime::Duration,
    /// One-shot timeout
    #[serde_as(as = "DisplayFromStr")]
    pub timeout: humantime::Duration,
    pub high_accuracy: bool,
    pub fallback: [f64; 2],
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            source: SourceKind::default(),
            address: DEF_GPSD.to_owned(),
            position: None,
            track: vec![],
            step: DEF_STEP.into(),
            timeout: DEF_TIMEOUT.into(),
            high_accuracy: true,
            fallback: [DEFAULT_FALLBACK.latitude(), DEFAULT_FALLBACK.longitude()],
        }
    }
}

fn coordinate([lat, lon]: [f64; 2]) -> Result<Coordinate> {
    Coordinate::new(lat, lon).map_err(|e| eyre!("bad position [{lat}, {lon}]: {e}"))
}

impl GeoConfig {
    pub fn fallback(&self) -> Result<Coordinate> {
        coordinate(self.fallback)
    }

    /// Build the position source.
    ///
    #[tracing::instrument(skip(self))]
    pub fn source(&self) -> Result<GeoSource> {
        let src = match self.source {
            SourceKind::Fixed => {
                let pos = match self.position {
                    Some(pos) => coordinate(pos)?,
                    None => self.fallback()?,
                };
                FixedSource::new(pos).into()
            }
            SourceKind::Gpsd => GpsdSource::new(&self.address).into(),
            SourceKind::Denied => DeniedSource.into(),
            SourceKind::Replay => {
                let track = self
                    .track
                    .iter()
                    .map(|&p| coordinate(p))
                    .collect::<Result<Vec<_>>>()?;
                ReplaySource::track(&track, self.step.into()).into()
            }
        };
        trace!("source = {:?}", src);
        Ok(src)
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// REST API and broker base URL
    pub base_url: String,
    pub transport: Transport,
    #[serde_as(as = "DisplayFromStr")]
    pub poll_interval: humantime::Duration,
    /// `{id}` is the ambulance
    pub location_route: String,
    /// `{id}` is the ambulance
    pub update_route: String,
    /// `{user}` is the user id
    pub ws_route: String,
    /// `{id}` is the ambulance
    pub topic: String,
    pub notifications_queue: String,
    /// Reconciler tolerance in degrees
    pub epsilon: f64,
    pub geolocation: GeoConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            base_url: DEF_BASE_URL.to_owned(),
            transport: Transport::default(),
            poll_interval: DEF_INTERVAL.into(),
            location_route: DEF_LOCATION_ROUTE.to_owned(),
            update_route: DEF_UPDATE_ROUTE.to_owned(),
            ws_route: DEF_WS_ROUTE.to_owned(),
            topic: DEF_TOPIC.to_owned(),
            notifications_queue: DEF_QUEUE.to_owned(),
            epsilon: 0.,
            geolocation: GeoConfig::default(),
        }
    }
}

impl TrackerConfig {
    fn resolve_url(&self, env: Option<String>) -> String {
        match env {
            Some(url) if !url.trim().is_empty() => {
                debug!("base URL from {}: {}", API_URL_ENV, url);
                url.trim().to_owned()
            }
            _ => self.base_url.clone(),
        }
    }

    /// Base URL, environment first.
    ///
    pub fn api_url(&self) -> String {
        self.resolve_url(std::env::var(API_URL_ENV).ok())
    }

    pub fn endpoint(&self) -> StompEndpoint {
        StompEndpoint::new(&self.api_url()).route(&self.ws_route)
    }

    /// Build the location feed for the configured transport.
    ///
    #[tracing::instrument(skip(self, stat))]
    pub fn feed(&self, stat: Option<ActorRef<StatsMsg>>) -> FeedSource {
        match self.transport {
            Transport::Poll => {
                let feed = PollFeed::new(&self.api_url())
                    .route(&self.location_route)
                    .interval(self.poll_interval.into());
                match stat {
                    Some(stat) => feed.stats(stat).into(),
                    None => feed.into(),
                }
            }
            Transport::Push => {
                let feed = StompFeed::new(self.endpoint()).topic(&self.topic);
                match stat {
                    Some(stat) => feed.stats(stat).into(),
                    None => feed.into(),
                }
            }
        }
    }

    pub fn locator(&self) -> Result<Locator> {
        let geo = &self.geolocation;
        Ok(Locator::new(geo.source()?)
            .timeout(geo.timeout.into())
            .high_accuracy(geo.high_accuracy)
            .fallback(geo.fallback()?))
    }

    pub fn publisher(&self, stat: Option<ActorRef<StatsMsg>>) -> Publisher {
        let publisher = Publisher::new(&self.api_url()).route(&self.update_route);
        match stat {
            Some(stat) => publisher.stats(stat),
            None => publisher,
        }
    }

    pub fn notifications(&self, stat: Option<ActorRef<StatsMsg>>) -> NotificationFeed {
        let feed = NotificationFeed::new(self.endpoint()).queue(&self.notifications_queue);
        match stat {
            Some(stat) => feed.stats(stat),
            None => feed,
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.epsilon)
    }
}
