//! Driver side: publish the device position for the ambulance being driven.
//!
//! Only a session with the `DRIVER` role may publish.  Positions come from a `Locator` watch,
//! each one is sent with `PUT {base}{route}?latitude=..&longitude=..&userId=..`.  Failed updates
//! are logged and counted, the next position will be tried anyway.  The fallback coordinate is
//! never published, a driver position is either real or absent.
//!

use std::future::Future;
use std::time::Instant;

use ractor::ActorRef;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use ambutrack_common::{Coordinate, Session};

use crate::actors::StatsMsg;
use crate::feed::user_agent;
use crate::geo::Locator;
use crate::{FeedEvent, GeoError, PublishError, Stats};

/// Default publish route
pub const DEF_UPDATE_ROUTE: &str = "/api/v1/ambulances/{id}/update-location";

#[derive(Clone, Debug)]
pub struct Publisher {
    pub base_url: String,
    /// `{id}` is the ambulance
    pub route: String,
    pub client: Client,
    pub stat: Option<ActorRef<StatsMsg>>,
}

impl Publisher {
    #[tracing::instrument]
    pub fn new(base_url: &str) -> Self {
        Publisher {
            base_url: base_url.trim_end_matches('/').to_owned(),
            route: DEF_UPDATE_ROUTE.to_owned(),
            client: Client::new(),
            stat: None,
        }
    }

    pub fn route(mut self, route: &str) -> Self {
        self.route = route.to_owned();
        self
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }

    pub fn url(&self, entity: &str) -> String {
        format!("{}{}", self.base_url, self.route.replace("{id}", entity))
    }

    fn stat(&self, msg: StatsMsg) {
        if let Some(stat) = &self.stat {
            let _ = stat.cast(msg);
        }
    }

    /// Check the session before anything goes on the wire.
    ///
    fn authorize(session: &Session) -> Result<String, PublishError> {
        if !session.is_driver() {
            return Err(PublishError::NotDriver(session.role));
        }
        session.bearer().ok_or(PublishError::NoToken)
    }

    /// Send one position.
    ///
    #[tracing::instrument(skip(self, session), fields(user = %session.user_id))]
    pub async fn publish(
        &self,
        entity: &str,
        session: &Session,
        pos: Coordinate,
    ) -> Result<(), PublishError> {
        let bearer = Self::authorize(session)?;

        let query = [
            ("latitude", pos.latitude().to_string()),
            ("longitude", pos.longitude().to_string()),
            ("userId", session.user_id.clone()),
        ];
        let resp = self
            .client
            .put(self.url(entity))
            .query(&query)
            .header("authorization", bearer)
            .header("user-agent", user_agent())
            .send()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;
        trace!("{:?}", resp);

        let status = resp.status();
        if !status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }
        debug!("published {}", pos);
        Ok(())
    }

    /// Follow the locator and publish every position until `shutdown` resolves.  Only a bad
    /// session is fatal, and it is checked before starting.
    ///
    #[tracing::instrument(skip_all, fields(entity = %entity, source = %locator.name()))]
    pub async fn run<F>(
        &self,
        entity: &str,
        session: &Session,
        locator: &Locator,
        shutdown: F,
    ) -> Result<Stats, PublishError>
    where
        F: Future<Output = ()>,
    {
        Self::authorize(session)?;

        let start = Instant::now();
        let mut stats = Stats::default();

        let (tx, mut rx) = mpsc::unbounded_channel::<FeedEvent<Coordinate, GeoError>>();
        let mut watch = locator.watch(Box::new(tx));
        info!("Publishing positions to {}", self.url(entity));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                ev = rx.recv() => match ev {
                    Some(FeedEvent::Update(pos)) => match self.publish(entity, session, pos).await {
                        Ok(()) => {
                            stats.pkts += 1;
                            self.stat(StatsMsg::Pkts(1));
                        }
                        Err(e) => {
                            warn!("update of {} failed: {}", pos, e);
                            stats.err += 1;
                            self.stat(StatsMsg::Error);
                        }
                    },
                    Some(FeedEvent::Error(e)) => {
                        warn!("no position: {}", e);
                        stats.dropped += 1;
                        self.stat(StatsMsg::Dropped);
                    }
                    None => break,
                },
            }
        }
        watch.cancel();

        stats.tm = start.elapsed().as_secs();
        info!("Publisher stopped: {}", stats);
        Ok(stats)
    }
}
