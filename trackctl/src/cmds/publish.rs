//! `publish`: driver side, send our position for an ambulance until interrupted.
//!

use eyre::Result;
use tracing::info;

use ambutrack_tracker::Stats;

use crate::{interrupted, Config, PublishOpts};

#[tracing::instrument(skip(cfg))]
pub async fn publish_position(cfg: &Config, opts: &PublishOpts) -> Result<Stats> {
    let session = cfg.session()?;
    let locator = cfg.tracker.locator()?;
    let publisher = cfg.tracker.publisher(None);

    info!("Publishing as {} for ambulance {}", session, opts.entity);
    let stats = publisher
        .run(&opts.entity, session, &locator, interrupted())
        .await?;
    Ok(stats)
}
