//! Scripted position source.
//!
//! Plays a list of fixes and failures with a fixed delay before each one.  Used for demos (a
//! driver "moving" along a track) and to reproduce positioning failures in tests.
//!

use std::time::Duration;

use tracing::trace;

use ambutrack_common::Coordinate;

use crate::geo::{FixOptions, PositionSource};
use crate::{GeoError, Outlet, Sink, WatchHandle};

#[derive(Clone, Debug, PartialEq)]
pub enum ReplayStep {
    Fix(Coordinate),
    Fail(GeoError),
}

#[derive(Clone, Debug)]
pub struct ReplaySource {
    steps: Vec<ReplayStep>,
    /// Delay before each step
    delay: Duration,
}

impl ReplaySource {
    pub fn new(steps: Vec<ReplayStep>, delay: Duration) -> Self {
        ReplaySource { steps, delay }
    }

    /// Only fixes, typically a track loaded from the configuration.
    ///
    pub fn track(track: &[Coordinate], delay: Duration) -> Self {
        Self::new(track.iter().copied().map(ReplayStep::Fix).collect(), delay)
    }
}

impl PositionSource for ReplaySource {
    fn name(&self) -> String {
        String::from("replay")
    }

    /// Only the first step matters.  Without any step, this never resolves.
    ///
    async fn current_position(&self, _opts: &FixOptions) -> Result<Coordinate, GeoError> {
        tokio::time::sleep(self.delay).await;
        match self.steps.first() {
            Some(ReplayStep::Fix(pos)) => Ok(*pos),
            Some(ReplayStep::Fail(e)) => Err(e.clone()),
            None => std::future::pending().await,
        }
    }

    /// Errors are reported and the watch goes on with the next step, like a device losing and
    /// getting back its fix.
    ///
    fn watch(
        &self,
        _opts: &FixOptions,
        sink: Box<dyn Sink<Coordinate, GeoError>>,
    ) -> WatchHandle {
        let outlet = Outlet::new("replay", sink, None);
        let steps = self.steps.clone();
        let delay = self.delay;

        let task = tokio::spawn({
            let outlet = outlet.clone();
            async move {
                outlet.subscribed();
                for step in steps {
                    tokio::time::sleep(delay).await;
                    match step {
                        ReplayStep::Fix(pos) => {
                            if !outlet.deliver(pos, 0) {
                                break;
                            }
                        }
                        ReplayStep::Fail(e) => outlet.fail(e),
                    }
                }
                trace!("replay over");
            }
        });
        outlet.subscription(Some(task))
    }
}
