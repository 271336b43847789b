//! Map screen state machine.
//!
//! ```text
//! Initializing --assets--> AwaitingFirstFix --coordinate--> Live
//!                                |                           |
//!                                +-------feed error------> Stalled --retry--> Live/AwaitingFirstFix
//!
//! any --close--> Closed
//! ```
//!
//! The screen owns the tracked and self positions and exactly one feed subscription at a time.
//! `Stalled` keeps the last known position on screen and only goes back through an explicit
//! retry.  After an authorization error, retrying is refused until a new session is given.
//!

use ractor::ActorRef;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use ambutrack_common::{Coordinate, Session, DEFAULT_FALLBACK};

use crate::actors::StatsMsg;
use crate::geo::Locator;
use crate::map::{Camera, MapView, Marker, Renderer, DEFAULT_ZOOM, TILE_URL};
use crate::reconcile::{select_center, Reconciler};
use crate::{Feed, FeedError, FeedEvent};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
pub enum ScreenState {
    /// Assets loading
    #[default]
    Initializing,
    /// No tracked coordinate yet
    AwaitingFirstFix,
    /// Updates flowing
    Live,
    /// Feed errored, last known position still shown
    Stalled,
    /// All subscriptions released
    Closed,
}

/// Everything the screen reacts to.
///
#[derive(Clone, Debug, PartialEq)]
pub enum ScreenEvent {
    AssetsLoaded,
    /// Viewer's own position (or the fallback)
    SelfFix(Coordinate),
    Feed(FeedEvent<Coordinate>),
    Retry,
    Reauthenticated,
    Close,
}

/// What the owner of the screen has to do after an event.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    None,
    /// Cancel the current subscription and open a new one
    Resubscribe,
    Close,
}

/// User commands for `MapScreen::run()`.
///
#[derive(Clone, Debug)]
pub enum Command {
    Retry,
    Reauthenticate(Session),
    Close,
}

#[derive(Debug)]
pub struct MapScreen<R: Renderer> {
    entity: String,
    renderer: R,
    reconciler: Reconciler,
    camera: Camera,
    fallback: Coordinate,
    state: ScreenState,
    tracked: Option<Coordinate>,
    me: Option<Coordinate>,
    error: Option<FeedError>,
    /// Last center given to the renderer
    center: Option<Coordinate>,
    stat: Option<ActorRef<StatsMsg>>,
}

impl<R: Renderer> MapScreen<R> {
    #[tracing::instrument(skip(renderer))]
    pub fn new(entity: &str, renderer: R) -> Self {
        MapScreen {
            entity: entity.to_owned(),
            renderer,
            reconciler: Reconciler::default(),
            camera: Camera::default(),
            fallback: DEFAULT_FALLBACK,
            state: ScreenState::default(),
            tracked: None,
            me: None,
            error: None,
            center: None,
            stat: None,
        }
    }

    pub fn reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }

    #[inline]
    pub fn state(&self) -> ScreenState {
        self.state
    }

    #[inline]
    pub fn tracked(&self) -> Option<Coordinate> {
        self.tracked
    }

    #[inline]
    pub fn me(&self) -> Option<Coordinate> {
        self.me
    }

    #[inline]
    pub fn error(&self) -> Option<&FeedError> {
        self.error.as_ref()
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Current frame.
    ///
    pub fn view(&self) -> MapView {
        let mut view = MapView {
            state: self.state,
            center: None,
            zoom: DEFAULT_ZOOM,
            tiles: TILE_URL.to_owned(),
            markers: vec![],
            banner: None,
        };
        if self.state == ScreenState::Initializing {
            return view;
        }

        view.center = Some(select_center(self.tracked, self.me, self.fallback));
        if let Some(pos) = self.tracked {
            view.markers.push(Marker::ambulance(pos));
        }
        if let Some(pos) = self.me {
            view.markers.push(Marker::user(pos));
        }
        if self.state == ScreenState::Stalled {
            view.banner = self.error.as_ref().map(|e| match e {
                FeedError::Authorization(_) => {
                    String::from("Session expired, sign in again to resume tracking")
                }
                e => format!("Live updates interrupted ({e}), retry to resume"),
            });
        }
        view
    }

    fn redraw(&mut self) {
        let view = self.view();
        self.center = view.center;
        self.renderer.render(&view);
    }

    /// Where we go when there is nothing to track (anymore).
    ///
    fn waiting_state(&self) -> ScreenState {
        if self.tracked.is_some() {
            ScreenState::Live
        } else {
            ScreenState::AwaitingFirstFix
        }
    }

    fn on_coordinate(&mut self, incoming: Coordinate) {
        let res = self.reconciler.reconcile(self.tracked, incoming);
        if !res.changed {
            trace!("duplicate {}", incoming);
            if let Some(stat) = &self.stat {
                let _ = stat.cast(StatsMsg::Dup);
            }
            return;
        }
        self.tracked = Some(res.next);
        if self.state == ScreenState::AwaitingFirstFix {
            info!("{}: first position {}", self.entity, res.next);
            self.state = ScreenState::Live;
        }

        let path = self.camera.path(self.center, res.next);
        self.renderer.fly_to(&path);
        self.redraw();
    }

    /// Apply one event.  Events after `Closed` are ignored.
    ///
    #[tracing::instrument(skip(self), fields(entity = %self.entity, state = %self.state))]
    pub fn handle(&mut self, event: ScreenEvent) -> Action {
        if self.state == ScreenState::Closed {
            trace!("closed, ignoring {:?}", event);
            return Action::None;
        }

        match event {
            ScreenEvent::AssetsLoaded => {
                if self.state == ScreenState::Initializing {
                    // The feed may already be dead
                    self.state = if self.error.is_some() {
                        ScreenState::Stalled
                    } else {
                        self.waiting_state()
                    };
                    if let Some(pos) = self.tracked {
                        self.renderer.fly_to(&self.camera.path(None, pos));
                    }
                    self.redraw();
                }
                Action::None
            }
            ScreenEvent::SelfFix(pos) => {
                self.me = Some(pos);
                if self.state != ScreenState::Initializing {
                    self.redraw();
                }
                Action::None
            }
            ScreenEvent::Feed(FeedEvent::Update(pos)) => {
                // Nothing is drawn before the assets, only remember it
                if self.state == ScreenState::Initializing {
                    self.tracked = self.reconciler.reconcile(self.tracked, pos).next.into();
                } else {
                    self.on_coordinate(pos);
                }
                Action::None
            }
            ScreenEvent::Feed(FeedEvent::Error(e)) => {
                warn!("{}: {}", self.entity, e);
                self.error = Some(e);
                if self.state != ScreenState::Initializing {
                    self.state = ScreenState::Stalled;
                    self.redraw();
                }
                Action::None
            }
            ScreenEvent::Retry => {
                if self.error.as_ref().is_some_and(FeedError::is_authorization) {
                    warn!("{}: retry refused, new session needed", self.entity);
                    Action::None
                } else if self.state == ScreenState::Stalled {
                    info!("{}: retrying", self.entity);
                    self.error = None;
                    self.state = self.waiting_state();
                    self.redraw();
                    Action::Resubscribe
                } else {
                    debug!("nothing to retry");
                    Action::None
                }
            }
            ScreenEvent::Reauthenticated => {
                info!("{}: new session", self.entity);
                self.error = None;
                if self.state == ScreenState::Stalled {
                    self.state = self.waiting_state();
                    self.redraw();
                }
                Action::Resubscribe
            }
            ScreenEvent::Close => {
                info!("{}: closing", self.entity);
                self.state = ScreenState::Closed;
                self.redraw();
                Action::Close
            }
        }
    }

    /// Event loop: feed events, the one-shot self position and user commands.  The subscription
    /// is cancelled before returning, whatever the way out.
    ///
    /// A closed command channel counts as `Close`.
    ///
    #[tracing::instrument(skip_all, fields(entity = %self.entity, feed = %feed.name()))]
    pub async fn run(
        mut self,
        feed: &dyn Feed,
        locator: &Locator,
        session: &Session,
        mut commands: mpsc::Receiver<Command>,
    ) -> Self {
        let mut session = session.clone();

        self.renderer.prepare();
        self.handle(ScreenEvent::AssetsLoaded);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sub = feed.subscribe(&self.entity, &session, Box::new(tx));

        let fix = locator.locate();
        tokio::pin!(fix);
        let mut located = false;

        loop {
            let action = tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(Command::Retry) => self.handle(ScreenEvent::Retry),
                    Some(Command::Reauthenticate(s)) => {
                        session = s;
                        self.handle(ScreenEvent::Reauthenticated)
                    }
                    Some(Command::Close) | None => self.handle(ScreenEvent::Close),
                },
                Some(ev) = rx.recv() => self.handle(ScreenEvent::Feed(ev)),
                pos = &mut fix, if !located => {
                    located = true;
                    self.handle(ScreenEvent::SelfFix(pos))
                }
            };

            match action {
                Action::None => (),
                Action::Resubscribe => {
                    sub.cancel();
                    let (tx, nrx) = mpsc::unbounded_channel();
                    rx = nrx;
                    sub = feed.subscribe(&self.entity, &session, Box::new(tx));
                    debug!("resubscribed: {:?}", sub);
                }
                Action::Close => break,
            }
        }
        sub.cancel();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RecordingRenderer;

    fn pos(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn screen() -> MapScreen<RecordingRenderer> {
        MapScreen::new("A1", RecordingRenderer::default())
    }

    fn update(lat: f64, lon: f64) -> ScreenEvent {
        ScreenEvent::Feed(FeedEvent::Update(pos(lat, lon)))
    }

    #[test]
    fn test_placeholder_while_initializing() {
        let mut s = screen();
        s.handle(ScreenEvent::SelfFix(pos(1., 1.)));
        assert!(s.view().is_placeholder());
        assert!(s.renderer().frames.is_empty());

        s.handle(ScreenEvent::AssetsLoaded);
        assert_eq!(ScreenState::AwaitingFirstFix, s.state());
        let view = s.renderer().last().unwrap();
        assert_eq!(Some(pos(1., 1.)), view.center);
        assert_eq!(1, view.markers.len());
    }

    #[test]
    fn test_update_before_assets() {
        let mut s = screen();
        s.handle(update(9.05, 7.49));
        assert!(s.renderer().flights.is_empty());

        s.handle(ScreenEvent::AssetsLoaded);
        assert_eq!(ScreenState::Live, s.state());
        assert_eq!(vec![pos(9.05, 7.49)], s.renderer().destinations());
    }

    #[test]
    fn test_three_messages_two_flights() {
        let mut s = screen();
        s.handle(ScreenEvent::AssetsLoaded);
        s.handle(update(9.05, 7.49));
        assert_eq!(ScreenState::Live, s.state());
        s.handle(update(9.05, 7.49));
        s.handle(update(9.06, 7.50));

        let r = s.renderer();
        assert_eq!(vec![pos(9.05, 7.49), pos(9.06, 7.50)], r.destinations());
        assert_eq!(Some(pos(9.06, 7.50)), r.last().unwrap().center);
    }

    #[test]
    fn test_tracked_wins_center() {
        let mut s = screen().fallback(pos(3., 3.));
        s.handle(ScreenEvent::AssetsLoaded);
        assert_eq!(Some(pos(3., 3.)), s.view().center);

        s.handle(ScreenEvent::SelfFix(pos(2., 2.)));
        assert_eq!(Some(pos(2., 2.)), s.view().center);

        s.handle(update(1., 1.));
        s.handle(ScreenEvent::SelfFix(pos(2.5, 2.5)));
        assert_eq!(Some(pos(1., 1.)), s.view().center);
    }

    #[test_pretty_log::test]
    fn test_stalled_keeps_marker() {
        let mut s = screen();
        s.handle(ScreenEvent::AssetsLoaded);
        s.handle(update(9.05, 7.49));
        s.handle(ScreenEvent::Feed(FeedEvent::Error(FeedError::Transport(
            "reset".into(),
        ))));

        assert_eq!(ScreenState::Stalled, s.state());
        let view = s.renderer().last().unwrap();
        let marker = view.marker(crate::map::MarkerKind::Ambulance).unwrap();
        assert_eq!(pos(9.05, 7.49), marker.position);
        assert!(view.banner.as_ref().unwrap().contains("reset"));

        // Only an explicit retry brings it back
        s.handle(update(9.07, 7.49));
        assert_eq!(ScreenState::Stalled, s.state());
        assert_eq!(Action::Resubscribe, s.handle(ScreenEvent::Retry));
        assert_eq!(ScreenState::Live, s.state());
        assert!(s.renderer().last().unwrap().banner.is_none());
    }

    #[test_pretty_log::test]
    fn test_authorization_needs_new_session() {
        let mut s = screen();
        s.handle(ScreenEvent::AssetsLoaded);
        s.handle(ScreenEvent::Feed(FeedEvent::Error(FeedError::Authorization(
            "no token".into(),
        ))));
        assert_eq!(ScreenState::Stalled, s.state());
        assert!(s.view().banner.unwrap().contains("sign in"));

        assert_eq!(Action::None, s.handle(ScreenEvent::Retry));
        assert_eq!(ScreenState::Stalled, s.state());

        assert_eq!(Action::Resubscribe, s.handle(ScreenEvent::Reauthenticated));
        assert_eq!(ScreenState::AwaitingFirstFix, s.state());
    }

    #[test]
    fn test_error_before_assets_stalls() {
        let mut s = screen();
        s.handle(ScreenEvent::Feed(FeedEvent::Error(FeedError::Transport(
            "refused".into(),
        ))));
        assert_eq!(ScreenState::Initializing, s.state());

        s.handle(ScreenEvent::AssetsLoaded);
        assert_eq!(ScreenState::Stalled, s.state());
        let view = s.renderer().last().unwrap();
        assert_eq!(ScreenState::Stalled, view.state);
        assert!(view.banner.as_ref().unwrap().contains("refused"));

        assert_eq!(Action::Resubscribe, s.handle(ScreenEvent::Retry));
        assert_eq!(ScreenState::AwaitingFirstFix, s.state());
    }

    #[test]
    fn test_retry_when_live_does_nothing() {
        let mut s = screen();
        s.handle(ScreenEvent::AssetsLoaded);
        s.handle(update(9.05, 7.49));
        assert_eq!(Action::None, s.handle(ScreenEvent::Retry));
    }

    #[test_pretty_log::test]
    fn test_closed_is_terminal() {
        let mut s = screen();
        s.handle(ScreenEvent::AssetsLoaded);
        assert_eq!(Action::Close, s.handle(ScreenEvent::Close));
        let frames = s.renderer().frames.len();

        assert_eq!(Action::None, s.handle(update(1., 1.)));
        assert_eq!(Action::None, s.handle(ScreenEvent::Retry));
        assert_eq!(ScreenState::Closed, s.state());
        assert_eq!(None, s.tracked());
        assert_eq!(frames, s.renderer().frames.len());
    }
}
