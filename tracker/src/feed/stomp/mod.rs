//! Push feed: STOMP 1.2 over a WebSocket.
//!
//! The backend exposes a broker at `/ws/ambulance-updates`; each ambulance has its own topic
//! and every user gets a private notification queue.
//!

use ractor::ActorRef;
use tracing::{debug, info, trace};

use ambutrack_common::{Coordinate, Session};

use crate::actors::StatsMsg;
use crate::feed::{authorize, parse_coordinate};
use crate::{Feed, FeedError, Outlet, Sink, Subscription};

mod client;
mod frame;

pub(crate) use client::*;
pub use frame::*;

/// Default WebSocket route, `{user}` is the user id
pub const DEF_WS_ROUTE: &str = "/ws/ambulance-updates?userId={user}";
/// Default topic, `{id}` is the ambulance
pub const DEF_TOPIC: &str = "/topic/ambulance/location/{id}";

/// Where the broker lives.
///
#[derive(Clone, Debug)]
pub struct StompEndpoint {
    /// Same base URL as the REST API
    pub base_url: String,
    /// WebSocket route
    pub ws_route: String,
}

impl StompEndpoint {
    pub fn new(base_url: &str) -> Self {
        StompEndpoint {
            base_url: base_url.trim_end_matches('/').to_owned(),
            ws_route: DEF_WS_ROUTE.to_owned(),
        }
    }

    pub fn route(mut self, route: &str) -> Self {
        self.ws_route = route.to_owned();
        self
    }

    /// WebSocket URL for a given user, `http` becomes `ws` and `https` becomes `wss`.
    ///
    pub fn url(&self, user_id: &str) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if self.base_url.starts_with("ws://") || self.base_url.starts_with("wss://") {
            self.base_url.clone()
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{}{}", base, self.ws_route.replace("{user}", user_id))
    }
}

#[derive(Clone, Debug)]
pub struct StompFeed {
    pub endpoint: StompEndpoint,
    /// Per-ambulance topic, `{id}` is replaced
    pub topic: String,
    pub stat: Option<ActorRef<StatsMsg>>,
}

impl StompFeed {
    #[tracing::instrument]
    pub fn new(endpoint: StompEndpoint) -> Self {
        StompFeed {
            endpoint,
            topic: DEF_TOPIC.to_owned(),
            stat: None,
        }
    }

    pub fn topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_owned();
        self
    }

    pub fn stats(mut self, stat: ActorRef<StatsMsg>) -> Self {
        self.stat = Some(stat);
        self
    }
}

impl Feed for StompFeed {
    fn name(&self) -> String {
        String::from("push")
    }

    #[tracing::instrument(skip(self, sink))]
    fn subscribe(
        &self,
        entity: &str,
        session: &Session,
        sink: Box<dyn Sink<Coordinate>>,
    ) -> Subscription {
        let outlet = Outlet::new(&format!("push({entity})"), sink, self.stat.clone());
        let bearer = match authorize(&outlet, session) {
            Ok(bearer) => bearer,
            Err(sub) => return sub,
        };

        let url = self.endpoint.url(&session.user_id);
        let topic = self.topic.replace("{id}", entity);
        info!("Subscribing to {} on {}", topic, url);

        let task = tokio::spawn(pump(outlet.clone(), url, bearer, topic, parse_coordinate));
        outlet.subscription(Some(task))
    }
}

/// Connect, subscribe and pass every message body through `parse` to the outlet until the
/// subscription is cancelled or something breaks.
///
pub(crate) async fn pump<T, P>(
    outlet: Outlet<T>,
    url: String,
    bearer: String,
    destination: String,
    parse: P,
) where
    T: Send + 'static,
    P: Fn(&str) -> Result<T, FeedError> + Send,
{
    let res: Result<(), FeedError> = async {
        let mut client = StompClient::connect(&url, &bearer).await?;
        client.subscribe(&destination).await?;
        outlet.subscribed();

        loop {
            let frame = client.next_message().await?;
            trace!("{}: {:?}", outlet.name(), frame.body);
            match parse(&frame.body) {
                Ok(item) => {
                    if !outlet.deliver(item, frame.body.len()) {
                        client.disconnect().await;
                        return Ok(());
                    }
                }
                Err(e) => outlet.drop_payload(&frame.body, e),
            }
        }
    }
    .await;

    if let Err(e) = res {
        outlet.fail(e);
    }
    debug!("{}: session over", outlet.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionState, FeedEvent};
    use ambutrack_common::Role;
    use futures_util::{SinkExt, StreamExt};
    use rstest::rstest;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    const WAIT: Duration = Duration::from_secs(5);

    #[rstest]
    #[case("http://localhost:8080", "ws://localhost:8080/ws/ambulance-updates?userId=42")]
    #[case("https://api.example.net/", "wss://api.example.net/ws/ambulance-updates?userId=42")]
    #[case("localhost:8080", "ws://localhost:8080/ws/ambulance-updates?userId=42")]
    #[case("wss://broker:443", "wss://broker:443/ws/ambulance-updates?userId=42")]
    fn test_endpoint_url(#[case] base: &str, #[case] url: &str) {
        assert_eq!(url, StompEndpoint::new(base).url("42"));
    }

    async fn read_frame(ws: &mut WebSocketStream<TcpStream>) -> Frame {
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return parse_all(&text).unwrap().remove(0);
            }
        }
    }

    /// Accept one client, do the handshake (or refuse it) then send `replies` and hang up.
    ///
    async fn broker(listener: TcpListener, connected: &str, replies: Vec<String>) -> Vec<Frame> {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut seen = vec![read_frame(&mut ws).await];
        ws.send(Message::Text(connected.to_owned())).await.unwrap();
        if connected.starts_with("CONNECTED") {
            seen.push(read_frame(&mut ws).await);
            for r in replies {
                ws.send(Message::Text(r)).await.unwrap();
            }
        }
        seen
    }

    fn message(body: &str) -> String {
        format!("MESSAGE\ndestination:/topic/ambulance/location/A1\nsubscription:sub-0\n\n{body}\0")
    }

    #[tokio::test]
    async fn test_stomp_feed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(broker(
            listener,
            "CONNECTED\nversion:1.2\n\n\0",
            vec![
                message("not a position"),
                message(r#"{"latitude": 9.05, "longitude": 7.49}"#),
            ],
        ));

        let feed = StompFeed::new(StompEndpoint::new(&format!("http://127.0.0.1:{port}")));
        let session = Session::new("42", Role::User).with_token("FOOBAR");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe("A1", &session, Box::new(tx));

        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(
            FeedEvent::Update(Coordinate::new(9.05, 7.49).unwrap()),
            ev
        );

        let seen = server.await.unwrap();
        assert_eq!(Command::Connect, seen[0].command);
        assert_eq!(Some("Bearer FOOBAR"), seen[0].get("Authorization"));
        assert_eq!(Command::Subscribe, seen[1].command);
        assert_eq!(
            Some("/topic/ambulance/location/A1"),
            seen[1].get("destination")
        );

        // Broker hung up
        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(ev, FeedEvent::Error(FeedError::Transport(_))));
        assert_eq!(ConnectionState::Errored, sub.state());
    }

    #[tokio::test]
    async fn test_stomp_auth_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(broker(
            listener,
            "ERROR\nmessage:Invalid token\n\n\0",
            vec![],
        ));

        let feed = StompFeed::new(StompEndpoint::new(&format!("http://127.0.0.1:{port}")));
        let session = Session::new("42", Role::User).with_token("EXPIRED");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe("A1", &session, Box::new(tx));

        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(
            FeedEvent::Error(FeedError::Authorization("Invalid token".into())),
            ev
        );
        server.await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stomp_no_token() {
        let feed = StompFeed::new(StompEndpoint::new("http://127.0.0.1:9"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe("A1", &Session::new("42", Role::User), Box::new(tx));

        assert!(matches!(
            rx.try_recv().unwrap(),
            FeedEvent::Error(FeedError::Authorization(_))
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(ConnectionState::Errored, sub.state());
    }
}
