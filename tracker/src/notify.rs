//! Per-user notifications.
//!
//! The dispatcher pushes a notification on the user's private queue when an ambulance has been
//! assigned or its ETA changed.
//!

use std::fmt::{Display, Formatter};

use ractor::ActorRef;
use serde::{Deserialize, Serialize};
use tracing::info;

use ambutrack_common::Session;

use crate::actors::StatsMsg;
use crate::feed::{authorize, pump, StompEndpoint};
use crate::{FeedError, Outlet, Sink, Subscription};

/// Default user queue
pub const DEF_QUEUE: &str = "/user/queue/ambulance-locations";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    pub message: String,
    pub ambulance_plate_number: Option<String>,
    pub driver_name: Option<String>,
    pub driver_contact: Option<String>,
    pub eta: Option<String>,
    pub user_id: Option<String>,
    pub ambulance_id: Option<String>,
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(plate) = &self.ambulance_plate_number {
            write!(f, " [{plate}]")?;
        }
        if let Some(eta) = &self.eta {
            write!(f, " ETA {eta}")?;
        }
        Ok(())
    }
}

/// Parse one queue message.  A message without text is of no use to anyone.
///
pub fn parse_notification(raw: &str) -> Result<Notification, FeedError> {
    let n: Notification =
        serde_json::from_str(raw.trim()).map_err(|e| FeedError::Parse(e.to_string()))?;
    if n.message.is_empty() {
        return Err(FeedError::Parse("empty message".into()));
    }
    Ok(n)
}

#[derive(Clone, Debug)]
pub struct NotificationFeed {
    pub endpoint: StompEndpoint,
    pub queue: String,
    pub stat: Option<ActorRef<StatsMsg>>,
}

impl NotificationFeed {
    pub fn new(endpoint: StompEndpoint) -> Self {
        NotificationFeed {
            endpoint,
            queue: DEF_QUEUE.to_owned(),
            stat: None,
        }
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.queue = queue.to_owned();
        self
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }

    #[tracing::instrument(skip(self, sink))]
    pub fn subscribe(
        &self,
        session: &Session,
        sink: Box<dyn Sink<Notification>>,
    ) -> Subscription {
        let outlet = Outlet::new(
            &format!("notify({})", session.user_id),
            sink,
            self.stat.clone(),
        );
        let bearer = match authorize(&outlet, session) {
            Ok(bearer) => bearer,
            Err(sub) => return sub,
        };

        let url = self.endpoint.url(&session.user_id);
        info!("Waiting for notifications on {}", self.queue);

        let task = tokio::spawn(pump(
            outlet.clone(),
            url,
            bearer,
            self.queue.clone(),
            parse_notification,
        ));
        outlet.subscription(Some(task))
    }
}
