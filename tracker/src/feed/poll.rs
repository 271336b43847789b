//! REST polling feed.
//!
//! `GET {base_url}{route}` with the bearer token, `{id}` in the route being replaced by the
//! ambulance id.  The first request goes out immediately, then one every `interval`.  The timer
//! is a task owned by the subscription, cancelling the subscription stops it.
//!

use std::time::Duration;

use ractor::ActorRef;
use reqwest::{Client, StatusCode};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use ambutrack_common::{Coordinate, Session};

use crate::actors::StatsMsg;
use crate::feed::{authorize, parse_coordinate, user_agent};
use crate::{Feed, FeedError, Outlet, Sink, Subscription};

/// Default polling interval
pub const DEF_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest polling interval, `tokio::time::interval()` panics on zero
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);
/// Default location route
pub const DEF_LOCATION_ROUTE: &str = "/api/v1/ambulances/{id}/location";

#[derive(Clone, Debug)]
pub struct PollFeed {
    /// Base site url taken from config
    pub base_url: String,
    /// Add this to `base_url` to fetch data, `{id}` is the ambulance
    pub route: String,
    /// Time between two requests
    pub interval: Duration,
    /// reqwest async client
    pub client: Client,
    /// Stats gathering actor
    pub stat: Option<ActorRef<StatsMsg>>,
}

impl PollFeed {
    #[tracing::instrument]
    pub fn new(base_url: &str) -> Self {
        PollFeed {
            base_url: base_url.trim_end_matches('/').to_owned(),
            route: DEF_LOCATION_ROUTE.to_owned(),
            interval: DEF_INTERVAL,
            client: Client::new(),
            stat: None,
        }
    }

    pub fn route(mut self, route: &str) -> Self {
        self.route = route.to_owned();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }

    /// Full URL for a given ambulance
    ///
    pub fn url(&self, entity: &str) -> String {
        format!("{}{}", self.base_url, self.route.replace("{id}", entity))
    }
}

impl Feed for PollFeed {
    fn name(&self) -> String {
        String::from("poll")
    }

    #[tracing::instrument(skip(self, sink))]
    fn subscribe(
        &self,
        entity: &str,
        session: &Session,
        sink: Box<dyn Sink<Coordinate>>,
    ) -> Subscription {
        let outlet = Outlet::new(&format!("poll({entity})"), sink, self.stat.clone());
        let bearer = match authorize(&outlet, session) {
            Ok(bearer) => bearer,
            Err(sub) => return sub,
        };

        let url = self.url(entity);
        info!("Polling {} every {:?}", url, self.interval);

        let task = tokio::spawn(poll(
            outlet.clone(),
            self.client.clone(),
            url,
            bearer,
            self.interval,
        ));
        outlet.subscription(Some(task))
    }
}

/// The polling loop itself.  Any non-2xx answer or network error ends it.
///
async fn poll(
    outlet: Outlet<Coordinate>,
    client: Client,
    url: String,
    bearer: String,
    interval: Duration,
) {
    if interval < MIN_INTERVAL {
        warn!("{}: interval {:?} too short, using {:?}", outlet.name(), interval, MIN_INTERVAL);
    }
    let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if outlet.is_closed() {
            break;
        }

        trace!("{}: GET {}", outlet.name(), url);
        let resp = client
            .get(&url)
            .header("authorization", &bearer)
            .header("user-agent", user_agent())
            .header("accept", "application/json")
            .send()
            .await;

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                outlet.fail(FeedError::Transport(e.to_string()));
                break;
            }
        };
        debug!("{:?}", &resp);

        // Check status
        //
        match resp.status() {
            code if code.is_success() => {
                outlet.subscribed();
            }
            code @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                outlet.fail(FeedError::Authorization(format!("HTTP {code}")));
                break;
            }
            code => {
                outlet.fail(FeedError::Transport(format!("HTTP {code} from {url}")));
                break;
            }
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                outlet.fail(FeedError::Transport(e.to_string()));
                break;
            }
        };

        match parse_coordinate(&body) {
            Ok(coord) => {
                if !outlet.deliver(coord, body.len()) {
                    break;
                }
            }
            Err(e) => outlet.drop_payload(&body, e),
        }
    }
    trace!("{}: end of polling", outlet.name());
}
