//! Sinks, outlets and subscription handles.
//!
//! Every running feed or position watch is a spawned task writing into a `Sink` through an
//! `Outlet`.  The sink lives behind a `Gate` (a mutex around an `Option`): cancelling the
//! `Subscription` empties the gate, so once `cancel()` has returned no sink method can be called
//! anymore, whatever the task is doing at that moment.
//!
//! NOTE: a sink must not cancel its own subscription from inside a callback, the gate lock is
//!       held while the callback runs.
//!

use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

use ractor::ActorRef;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::actors::StatsMsg;
use crate::FeedError;

/// State of the underlying channel, observable through `Subscription::state()`.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Subscribed,
    Receiving,
    Errored,
    Closed,
}

/// Receiver side of a feed or a position watch.
///
pub trait Sink<T, E = FeedError>: Send {
    fn on_item(&mut self, item: T);
    fn on_error(&mut self, err: E);
}

/// What a channel-based sink receives.
///
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent<T, E = FeedError> {
    Update(T),
    Error(E),
}

impl<T: Send, E: Send> Sink<T, E> for mpsc::UnboundedSender<FeedEvent<T, E>> {
    fn on_item(&mut self, item: T) {
        let _ = self.send(FeedEvent::Update(item));
    }

    fn on_error(&mut self, err: E) {
        let _ = self.send(FeedEvent::Error(err));
    }
}

/// Pair of closures acting as a sink.
///
pub struct Callbacks<C, F> {
    on_item: C,
    on_error: F,
}

/// Build a sink from two closures.
///
pub fn callbacks<T, E, C, F>(on_item: C, on_error: F) -> Callbacks<C, F>
where
    C: FnMut(T) + Send,
    F: FnMut(E) + Send,
{
    Callbacks { on_item, on_error }
}

impl<T, E, C, F> Sink<T, E> for Callbacks<C, F>
where
    C: FnMut(T) + Send,
    F: FnMut(E) + Send,
{
    fn on_item(&mut self, item: T) {
        (self.on_item)(item)
    }

    fn on_error(&mut self, err: E) {
        (self.on_error)(err)
    }
}

/// Mutex-protected optional sink.
///
pub(crate) struct Gate<S> {
    inner: Mutex<Option<S>>,
}

impl<S> Gate<S> {
    fn new(sink: S) -> Self {
        Gate {
            inner: Mutex::new(Some(sink)),
        }
    }

    /// Run `f` on the sink if the gate is still open.
    ///
    fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f)
    }
}

/// Type-erased closing side of a `Gate`.
///
trait Closer: Send + Sync {
    /// Return `true` the first time only.
    fn close(&self) -> bool;
    fn is_closed(&self) -> bool;
}

impl<S: Send> Closer for Gate<S> {
    fn close(&self) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.take().is_some()
    }

    fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Writing side given to the task behind a subscription.
///
pub(crate) struct Outlet<T, E = FeedError> {
    name: String,
    gate: Arc<Gate<Box<dyn Sink<T, E>>>>,
    state: Arc<watch::Sender<ConnectionState>>,
    stat: Option<ActorRef<StatsMsg>>,
}

impl<T, E> Clone for Outlet<T, E> {
    fn clone(&self) -> Self {
        Outlet {
            name: self.name.clone(),
            gate: Arc::clone(&self.gate),
            state: Arc::clone(&self.state),
            stat: self.stat.clone(),
        }
    }
}

impl<T, E> Outlet<T, E>
where
    T: 'static,
    E: Display + 'static,
{
    pub(crate) fn new(
        name: &str,
        sink: Box<dyn Sink<T, E>>,
        stat: Option<ActorRef<StatsMsg>>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Outlet {
            name: name.to_owned(),
            gate: Arc::new(Gate::new(sink)),
            state: Arc::new(state),
            stat,
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self, msg: StatsMsg) {
        if let Some(stat) = &self.stat {
            let _ = stat.cast(msg);
        }
    }

    /// Handshake done (or first good answer for polling).
    ///
    pub(crate) fn subscribed(&self) -> bool {
        self.gate
            .with(|_| {
                self.state.send_if_modified(|s| {
                    if *s == ConnectionState::Connecting {
                        *s = ConnectionState::Subscribed;
                        true
                    } else {
                        false
                    }
                });
            })
            .is_some()
    }

    /// Hand over one item, return `false` if the subscription is gone.
    ///
    pub(crate) fn deliver(&self, item: T, bytes: usize) -> bool {
        let open = self
            .gate
            .with(|sink| {
                self.state.send_if_modified(|s| {
                    if *s != ConnectionState::Receiving {
                        *s = ConnectionState::Receiving;
                        true
                    } else {
                        false
                    }
                });
                sink.on_item(item);
            })
            .is_some();
        if open {
            self.stat(StatsMsg::Pkts(1));
            self.stat(StatsMsg::Bytes(bytes as u64));
        }
        open
    }

    /// Report an error; the task is expected to stop right after.
    ///
    pub(crate) fn fail(&self, err: E) {
        warn!("{}: {}", self.name, err);
        self.gate.with(|sink| {
            self.state.send_replace(ConnectionState::Errored);
            sink.on_error(err);
        });
        self.stat(StatsMsg::Error);
    }

    /// Malformed payload, log it and go on.
    ///
    pub(crate) fn drop_payload(&self, raw: &str, err: impl Display) {
        warn!("{}: dropping payload ({}): {:?}", self.name, err, raw);
        self.stat(StatsMsg::Dropped);
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Build the handle given back to the caller.
    ///
    pub(crate) fn subscription(&self, task: Option<JoinHandle<()>>) -> Subscription {
        let gate: Arc<dyn Closer> = self.gate.clone();
        Subscription {
            name: self.name.clone(),
            gate,
            state_tx: Arc::clone(&self.state),
            state: self.state.subscribe(),
            task,
        }
    }
}

/// Handle on a running feed or position watch.
///
/// Dropping it cancels the subscription.
///
pub struct Subscription {
    name: String,
    gate: Arc<dyn Closer>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

/// Position watches are the same thing.
///
pub type WatchHandle = Subscription;

impl Subscription {
    /// Current state of the channel.
    ///
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Get notified on state changes.
    ///
    pub fn changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Stop everything.  Idempotent, no sink call happens once this has returned.
    ///
    #[tracing::instrument(skip(self), fields(name = %self.name))]
    pub fn cancel(&mut self) {
        if self.gate.close() {
            debug!("{} cancelled", self.name);
        }
        self.state_tx.send_replace(ConnectionState::Closed);
        if let Some(task) = self.task.take() {
            trace!("{}: aborting task", self.name);
            task.abort();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_outlet(
        items: Arc<AtomicUsize>,
        errors: Arc<AtomicUsize>,
    ) -> Outlet<u32, FeedError> {
        let sink = callbacks(
            move |_: u32| {
                items.fetch_add(1, Ordering::SeqCst);
            },
            move |_: FeedError| {
                errors.fetch_add(1, Ordering::SeqCst);
            },
        );
        Outlet::new("test", Box::new(sink), None)
    }

    #[test]
    fn test_cancel_then_inject() {
        let items = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let outlet = counting_outlet(items.clone(), errors.clone());
        let mut sub = outlet.subscription(None);

        assert!(outlet.deliver(1, 4));
        assert_eq!(1, items.load(Ordering::SeqCst));

        sub.cancel();
        assert!(sub.is_closed());
        assert!(!outlet.deliver(2, 4));
        outlet.fail(FeedError::Transport("late".into()));

        assert_eq!(1, items.load(Ordering::SeqCst));
        assert_eq!(0, errors.load(Ordering::SeqCst));
        assert_eq!(ConnectionState::Closed, sub.state());
    }

    #[test]
    fn test_cancel_idempotent() {
        let outlet = counting_outlet(Arc::default(), Arc::default());
        let mut sub = outlet.subscription(None);

        sub.cancel();
        sub.cancel();
        assert_eq!(ConnectionState::Closed, sub.state());
        drop(sub);
        assert!(outlet.is_closed());
    }

    #[test]
    fn test_state_transitions() {
        let outlet = counting_outlet(Arc::default(), Arc::default());
        let sub = outlet.subscription(None);
        assert_eq!(ConnectionState::Connecting, sub.state());

        outlet.subscribed();
        assert_eq!(ConnectionState::Subscribed, sub.state());

        outlet.deliver(1, 1);
        assert_eq!(ConnectionState::Receiving, sub.state());

        // Never goes back to Subscribed
        outlet.subscribed();
        assert_eq!(ConnectionState::Receiving, sub.state());

        outlet.fail(FeedError::Transport("closed".into()));
        assert_eq!(ConnectionState::Errored, sub.state());
    }

    #[test]
    fn test_no_state_change_after_close() {
        let outlet = counting_outlet(Arc::default(), Arc::default());
        let mut sub = outlet.subscription(None);

        sub.cancel();
        outlet.subscribed();
        outlet.deliver(1, 1);
        assert_eq!(ConnectionState::Closed, sub.state());
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel::<FeedEvent<u32>>();
        let outlet: Outlet<u32> = Outlet::new("chan", Box::new(tx), None);
        let _sub = outlet.subscription(None);

        outlet.deliver(42, 2);
        outlet.fail(FeedError::Protocol("bad frame".into()));

        assert_eq!(Some(FeedEvent::Update(42)), rx.recv().await);
        assert_eq!(
            Some(FeedEvent::Error(FeedError::Protocol("bad frame".into()))),
            rx.recv().await
        );
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let sink = callbacks(|_: u32| {}, |_: FeedError| {});
        let outlet: Outlet<u32> = Outlet::new("task", Box::new(sink), None);
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        let mut sub = outlet.subscription(Some(task));
        sub.cancel();
        assert_eq!(ConnectionState::Closed, sub.state());
    }
}
