//! Trivial sources: a device which never moves and one which refuses to tell.
//!

use tracing::trace;

use ambutrack_common::Coordinate;

use crate::geo::{FixOptions, PositionSource};
use crate::{GeoError, Outlet, Sink, WatchHandle};

/// Static position, for fixed terminals (dispatch desk) and demos.
///
#[derive(Clone, Copy, Debug)]
pub struct FixedSource {
    position: Coordinate,
}

impl FixedSource {
    pub fn new(position: Coordinate) -> Self {
        FixedSource { position }
    }
}

impl PositionSource for FixedSource {
    fn name(&self) -> String {
        String::from("fixed")
    }

    async fn current_position(&self, _opts: &FixOptions) -> Result<Coordinate, GeoError> {
        Ok(self.position)
    }

    /// The position is given once, there will never be another one.
    ///
    fn watch(
        &self,
        _opts: &FixOptions,
        sink: Box<dyn Sink<Coordinate, GeoError>>,
    ) -> WatchHandle {
        let outlet = Outlet::new("fixed", sink, None);
        outlet.subscribed();
        outlet.deliver(self.position, 0);
        trace!("fixed position sent");
        outlet.subscription(None)
    }
}

/// Positioning disabled or refused.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct DeniedSource;

impl PositionSource for DeniedSource {
    fn name(&self) -> String {
        String::from("denied")
    }

    async fn current_position(&self, _opts: &FixOptions) -> Result<Coordinate, GeoError> {
        Err(GeoError::PermissionDenied)
    }

    fn watch(
        &self,
        _opts: &FixOptions,
        sink: Box<dyn Sink<Coordinate, GeoError>>,
    ) -> WatchHandle {
        let outlet = Outlet::new("denied", sink, None);
        outlet.fail(GeoError::PermissionDenied);
        outlet.subscription(None)
    }
}
