//! Replay feed.
//!
//! Feeds raw payloads, one per line, either from a recorded file or from a channel.  Payloads go
//! through the same parsing as the network feeds, so a recording can contain bad lines.
//!

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use ractor::ActorRef;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace};

use ambutrack_common::{Coordinate, Session};

use crate::actors::StatsMsg;
use crate::feed::parse_coordinate;
use crate::{Feed, FeedError, Outlet, Sink, Subscription};

#[derive(Debug)]
enum Input {
    File(PathBuf),
    Channel(Mutex<Option<UnboundedReceiver<String>>>),
}

#[derive(Debug)]
pub struct ReplayFeed {
    input: Input,
    /// Delay before each payload
    delay: Duration,
    stat: Option<ActorRef<StatsMsg>>,
}

impl ReplayFeed {
    /// Replay a recording, one JSON payload per line.
    ///
    #[tracing::instrument]
    pub fn from_file(path: &Path, delay: Duration) -> Self {
        ReplayFeed {
            input: Input::File(path.to_path_buf()),
            delay,
            stat: None,
        }
    }

    /// Replay whatever is sent on the returned channel.  Can be subscribed to only once.
    ///
    pub fn channel() -> (Self, UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = ReplayFeed {
            input: Input::Channel(Mutex::new(Some(rx))),
            delay: Duration::ZERO,
            stat: None,
        };
        (feed, tx)
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }
}

impl Feed for ReplayFeed {
    fn name(&self) -> String {
        String::from("replay")
    }

    #[tracing::instrument(skip(self, _session, sink))]
    fn subscribe(
        &self,
        entity: &str,
        _session: &Session,
        sink: Box<dyn Sink<Coordinate>>,
    ) -> Subscription {
        let outlet = Outlet::new(&format!("replay({entity})"), sink, self.stat.clone());
        let delay = self.delay;

        let task = match &self.input {
            Input::File(path) => {
                info!("Replaying {:?}", path);
                tokio::spawn(from_file(outlet.clone(), path.clone(), delay))
            }
            Input::Channel(rx) => {
                let rx = rx
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take();
                match rx {
                    Some(rx) => tokio::spawn(from_channel(outlet.clone(), rx)),
                    None => {
                        outlet.fail(FeedError::Transport("replay already consumed".into()));
                        return outlet.subscription(None);
                    }
                }
            }
        };
        outlet.subscription(Some(task))
    }
}

/// Push one raw line through, `false` means stop.
///
fn replay_line(outlet: &Outlet<Coordinate>, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    match parse_coordinate(line) {
        Ok(coord) => outlet.deliver(coord, line.len()),
        Err(e) => {
            outlet.drop_payload(line, e);
            !outlet.is_closed()
        }
    }
}

async fn from_file(outlet: Outlet<Coordinate>, path: PathBuf, delay: Duration) {
    let data = match tokio::fs::read_to_string(&path).await {
        Ok(data) => data,
        Err(e) => {
            outlet.fail(FeedError::Transport(format!("{}: {e}", path.display())));
            return;
        }
    };
    outlet.subscribed();

    for line in data.lines() {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !replay_line(&outlet, line) {
            break;
        }
    }
    debug!("{}: end of file", outlet.name());
}

async fn from_channel(outlet: Outlet<Coordinate>, mut rx: UnboundedReceiver<String>) {
    outlet.subscribed();
    while let Some(line) = rx.recv().await {
        if !replay_line(&outlet, &line) {
            break;
        }
    }
    trace!("{}: channel closed", outlet.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionState, FeedEvent};
    use ambutrack_common::Role;
    use std::io::Write;

    fn anon() -> Session {
        Session::new("42", Role::User)
    }

    #[tokio::test]
    async fn test_channel_replay() {
        let (feed, tx) = ReplayFeed::channel();
        let (etx, mut erx) = mpsc::unbounded_channel();
        let sub = feed.subscribe("A1", &anon(), Box::new(etx));

        tx.send("garbage".into()).unwrap();
        tx.send(r#"{"latitude": 9.05, "longitude": 7.49}"#.into())
            .unwrap();

        let ev = erx.recv().await.unwrap();
        assert_eq!(
            FeedEvent::Update(Coordinate::new(9.05, 7.49).unwrap()),
            ev
        );
        assert_eq!(ConnectionState::Receiving, sub.state());
    }

    #[tokio::test]
    async fn test_channel_consumed_once() {
        let (feed, _tx) = ReplayFeed::channel();
        let (etx, _erx) = mpsc::unbounded_channel();
        let _first = feed.subscribe("A1", &anon(), Box::new(etx));

        let (etx, mut erx) = mpsc::unbounded_channel();
        let second = feed.subscribe("A1", &anon(), Box::new(etx));
        assert!(matches!(
            erx.try_recv().unwrap(),
            FeedEvent::Error(FeedError::Transport(_))
        ));
        assert_eq!(ConnectionState::Errored, second.state());
    }

    #[tokio::test]
    async fn test_file_replay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"latitude": 1.0, "longitude": 2.0}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"lat": 1.5, "lng": 2.5}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let feed = ReplayFeed::from_file(file.path(), Duration::ZERO);
        let (etx, mut erx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe("A1", &anon(), Box::new(etx));

        let a = erx.recv().await.unwrap();
        let b = erx.recv().await.unwrap();
        assert_eq!(FeedEvent::Update(Coordinate::new(1.0, 2.0).unwrap()), a);
        assert_eq!(FeedEvent::Update(Coordinate::new(1.5, 2.5).unwrap()), b);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let feed = ReplayFeed::from_file(Path::new("/nonexistent/replay.jsonl"), Duration::ZERO);
        let (etx, mut erx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe("A1", &anon(), Box::new(etx));

        let ev = erx.recv().await.unwrap();
        assert!(matches!(ev, FeedEvent::Error(FeedError::Transport(_))));
    }
}
