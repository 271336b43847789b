//! Location source adapter.
//!
//! Gets the viewer's (or driver's) own position from the device, either once or continuously.
//! The sources themselves can fail in all sorts of ways; `Locator` is the layer which applies
//! the timeout and substitutes the fallback coordinate so the map always has somewhere to go.
//!

use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, warn};

use ambutrack_common::{Coordinate, DEFAULT_FALLBACK};

use crate::{GeoError, Sink, WatchHandle};

mod fixed;
mod gpsd;
mod replay;

pub use fixed::*;
pub use gpsd::*;
pub use replay::*;

/// Default one-shot timeout
pub const DEF_TIMEOUT: Duration = Duration::from_secs(5);

/// Hints given to the source.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixOptions {
    /// Bound on a one-shot request
    pub timeout: Duration,
    /// Ask for a real fix (3D for gpsd) instead of whatever is at hand
    pub high_accuracy: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        FixOptions {
            timeout: DEF_TIMEOUT,
            high_accuracy: true,
        }
    }
}

/// Anything able to tell where the device is.
///
#[allow(async_fn_in_trait)]
pub trait PositionSource: Debug {
    /// Return source's name
    fn name(&self) -> String;
    /// One shot request.  No timeout applied here.
    async fn current_position(&self, opts: &FixOptions) -> Result<Coordinate, GeoError>;
    /// Continuous updates until the handle is cancelled.
    fn watch(&self, opts: &FixOptions, sink: Box<dyn Sink<Coordinate, GeoError>>)
        -> WatchHandle;
}

/// All position sources we know about.
///
#[derive(Debug)]
pub enum GeoSource {
    Fixed(FixedSource),
    Gpsd(GpsdSource),
    Replay(ReplaySource),
    Denied(DeniedSource),
}

impl PositionSource for GeoSource {
    fn name(&self) -> String {
        match self {
            GeoSource::Fixed(s) => s.name(),
            GeoSource::Gpsd(s) => s.name(),
            GeoSource::Replay(s) => s.name(),
            GeoSource::Denied(s) => s.name(),
        }
    }

    async fn current_position(&self, opts: &FixOptions) -> Result<Coordinate, GeoError> {
        match self {
            GeoSource::Fixed(s) => s.current_position(opts).await,
            GeoSource::Gpsd(s) => s.current_position(opts).await,
            GeoSource::Replay(s) => s.current_position(opts).await,
            GeoSource::Denied(s) => s.current_position(opts).await,
        }
    }

    fn watch(
        &self,
        opts: &FixOptions,
        sink: Box<dyn Sink<Coordinate, GeoError>>,
    ) -> WatchHandle {
        match self {
            GeoSource::Fixed(s) => s.watch(opts, sink),
            GeoSource::Gpsd(s) => s.watch(opts, sink),
            GeoSource::Replay(s) => s.watch(opts, sink),
            GeoSource::Denied(s) => s.watch(opts, sink),
        }
    }
}

impl From<FixedSource> for GeoSource {
    fn from(s: FixedSource) -> Self {
        GeoSource::Fixed(s)
    }
}

impl From<GpsdSource> for GeoSource {
    fn from(s: GpsdSource) -> Self {
        GeoSource::Gpsd(s)
    }
}

impl From<ReplaySource> for GeoSource {
    fn from(s: ReplaySource) -> Self {
        GeoSource::Replay(s)
    }
}

impl From<DeniedSource> for GeoSource {
    fn from(s: DeniedSource) -> Self {
        GeoSource::Denied(s)
    }
}

/// Position source with timeout and fallback applied.
///
#[derive(Debug)]
pub struct Locator {
    source: GeoSource,
    opts: FixOptions,
    fallback: Coordinate,
}

impl Locator {
    #[tracing::instrument]
    pub fn new(source: GeoSource) -> Self {
        Locator {
            source,
            opts: FixOptions::default(),
            fallback: DEFAULT_FALLBACK,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    pub fn high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.opts.high_accuracy = high_accuracy;
        self
    }

    pub fn fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    #[inline]
    pub fn fallback_position(&self) -> Coordinate {
        self.fallback
    }

    #[inline]
    pub fn name(&self) -> String {
        self.source.name()
    }

    /// One shot with the timeout, errors are given back.
    ///
    #[tracing::instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn try_locate(&self) -> Result<Coordinate, GeoError> {
        let timeout = self.opts.timeout;
        match tokio::time::timeout(timeout, self.source.current_position(&self.opts)).await {
            Ok(res) => res,
            Err(_) => Err(GeoError::Timeout(timeout)),
        }
    }

    /// One shot, never fails: any error ends up as the fallback coordinate.
    ///
    pub async fn locate(&self) -> Coordinate {
        match self.try_locate().await {
            Ok(pos) => {
                debug!("fix: {}", pos);
                pos
            }
            Err(e) => {
                warn!("{}, using fallback position {}", e, self.fallback);
                self.fallback
            }
        }
    }

    /// Continuous updates, see `PositionSource::watch()`.
    ///
    pub fn watch(&self, sink: Box<dyn Sink<Coordinate, GeoError>>) -> WatchHandle {
        self.source.watch(&self.opts, sink)
    }
}
