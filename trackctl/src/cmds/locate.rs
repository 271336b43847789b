//! `locate`: ask the position source once.
//!

use eyre::Result;
use tracing::{info, warn};

use ambutrack_common::Coordinate;

use crate::Config;

/// Return the position and whether it is the fallback one.
///
#[tracing::instrument(skip(cfg))]
pub async fn locate(cfg: &Config) -> Result<(Coordinate, bool)> {
    let locator = cfg.tracker.locator()?;
    info!("Asking {} for a position", locator.name());

    match locator.try_locate().await {
        Ok(pos) => Ok((pos, false)),
        Err(e) => {
            warn!("{}", e);
            Ok((locator.fallback_position(), true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambutrack_common::DEFAULT_FALLBACK;
    use ambutrack_tracker::SourceKind;

    #[tokio::test]
    async fn test_locate_fixed() {
        let mut cfg = Config::default();
        cfg.tracker.geolocation.position = Some([9.05, 7.49]);

        let (pos, fallback) = locate(&cfg).await.unwrap();
        assert_eq!(Coordinate::new(9.05, 7.49).unwrap(), pos);
        assert!(!fallback);
    }

    #[tokio::test]
    async fn test_locate_denied() {
        let mut cfg = Config::default();
        cfg.tracker.geolocation.source = SourceKind::Denied;

        let (pos, fallback) = locate(&cfg).await.unwrap();
        assert_eq!(DEFAULT_FALLBACK, pos);
        assert!(fallback);
    }
}
