//! `notify`: print notifications for the session user until interrupted.
//!

use eyre::{eyre, Result};
use tokio::sync::mpsc;
use tracing::info;

use ambutrack_tracker::notify::Notification;
use ambutrack_tracker::FeedEvent;

use crate::{interrupted, Config};

#[tracing::instrument(skip(cfg))]
pub async fn print_notifications(cfg: &Config) -> Result<usize> {
    let session = cfg.session()?;
    let feed = cfg.tracker.notifications(None);

    let (tx, mut rx) = mpsc::unbounded_channel::<FeedEvent<Notification>>();
    let _sub = feed.subscribe(session, Box::new(tx));
    info!("Waiting for notifications for {}", session.user_id);

    let mut count = 0;
    let stop = interrupted();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            ev = rx.recv() => match ev {
                Some(FeedEvent::Update(n)) => {
                    count += 1;
                    println!("{n}");
                }
                Some(FeedEvent::Error(e)) => return Err(eyre!("notifications: {e}")),
                None => break,
            },
        }
    }
    Ok(count)
}
