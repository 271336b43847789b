//! Location reconciler.
//!
//! Decides whether an incoming coordinate is actually new (and so worth moving the camera for)
//! and which point the map should be centered on.
//!

use ambutrack_common::Coordinate;

/// Outcome of one reconciliation.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reconciled {
    /// What the tracked state should become
    pub next: Coordinate,
    /// `true` iff `next` differs from the previous state
    pub changed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reconciler {
    /// Tolerance in degrees, on each component.  0 means any difference counts.
    pub epsilon: f64,
}

impl Reconciler {
    pub fn new(epsilon: f64) -> Self {
        Reconciler {
            epsilon: epsilon.abs(),
        }
    }

    /// Compare `incoming` with the current tracked state.
    ///
    /// When nothing changed, `next` is the current value so state is never rewritten with an
    /// equivalent coordinate.
    ///
    pub fn reconcile(&self, current: Option<Coordinate>, incoming: Coordinate) -> Reconciled {
        match current {
            None => Reconciled {
                next: incoming,
                changed: true,
            },
            Some(cur) => {
                let dlat = (cur.latitude() - incoming.latitude()).abs();
                let dlon = (cur.longitude() - incoming.longitude()).abs();
                if dlat > self.epsilon || dlon > self.epsilon {
                    Reconciled {
                        next: incoming,
                        changed: true,
                    }
                } else {
                    Reconciled {
                        next: cur,
                        changed: false,
                    }
                }
            }
        }
    }
}

/// Tracked ambulance first, then the viewer, then the fallback.
///
#[inline]
pub fn select_center(
    tracked: Option<Coordinate>,
    me: Option<Coordinate>,
    fallback: Coordinate,
) -> Coordinate {
    tracked.or(me).unwrap_or(fallback)
}
