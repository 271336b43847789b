//! `watch`: follow an ambulance on the terminal.
//!
//! Commands are read from stdin, one per line:
//!
//! - `r` retry after the feed stopped,
//! - `t TOKEN` use a new token,
//! - `q` quit (Ctrl-C works too).
//!

use std::io::BufRead;

use eyre::{eyre, Result};
use ractor::{call, Actor};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use ambutrack_common::Session;
use ambutrack_tracker::feed::ReplayFeed;
use ambutrack_tracker::map::{Command, MapScreen};
use ambutrack_tracker::{FeedSource, Stats, StatsActor, StatsMsg};

use crate::{interrupted, Config, TermRenderer, WatchOpts};

/// Parse one line of user input.
///
pub fn parse_command(line: &str, session: &Session) -> Option<Command> {
    let mut words = line.split_whitespace();
    match (words.next()?, words.next()) {
        ("r" | "retry", None) => Some(Command::Retry),
        ("q" | "quit", None) => Some(Command::Close),
        ("t" | "token", Some(token)) => Some(Command::Reauthenticate(
            session.clone().with_token(token),
        )),
        _ => None,
    }
}

/// Read stdin on its own thread, a blocked read must not hold the runtime when we exit.
///
fn read_commands(session: Session, tx: mpsc::Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line, &session) {
                Some(cmd) => {
                    trace!("command {:?}", cmd);
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command {line:?}, use r, t TOKEN or q"),
            }
        }
    });
}

#[tracing::instrument(skip(cfg))]
pub async fn watch_entity(cfg: &Config, opts: &WatchOpts) -> Result<Stats> {
    let session = cfg.session()?;

    let mut tracker = cfg.tracker.clone();
    if let Some(transport) = opts.transport {
        tracker.transport = transport;
    }

    let (stat, handle) = Actor::spawn(None, StatsActor, ()).await?;

    let feed: FeedSource = match &opts.replay {
        Some(path) => ReplayFeed::from_file(path, opts.delay.into())
            .stats(stat.clone())
            .into(),
        None => tracker.feed(Some(stat.clone())),
    };
    let locator = tracker.locator()?;
    info!("Watching {} with {:?}, position from {}", opts.entity, feed, locator.name());

    let (tx, rx) = mpsc::channel(8);
    read_commands(session.clone(), tx.clone());
    tokio::spawn(async move {
        interrupted().await;
        let _ = tx.send(Command::Close).await;
    });

    let screen = MapScreen::new(&opts.entity, TermRenderer::stdout())
        .reconciler(tracker.reconciler())
        .fallback(locator.fallback_position())
        .stats(stat.clone());
    let screen = screen.run(&feed, &locator, session, rx).await;
    debug!("screen closed in {}", screen.state());

    if let Some(e) = screen.error() {
        warn!("Last feed error: {}", e);
    }

    let stats = call!(stat, StatsMsg::Exit).map_err(|e| eyre!("stats: {e}"))?;
    handle.await?;
    Ok(stats)
}
