//! STOMP client over a WebSocket.
//!

use std::collections::VecDeque;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::feed::stomp::{parse_all, Command, Frame};
use crate::FeedError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn transport(e: impl ToString) -> FeedError {
    FeedError::Transport(e.to_string())
}

/// Turn a broker `ERROR` frame into our own error.  Spring brokers only give us free text.
///
pub(crate) fn broker_error(frame: &Frame) -> FeedError {
    let text = format!("{} {}", frame.get("message").unwrap_or_default(), frame.body)
        .trim()
        .to_owned();
    let lower = text.to_lowercase();
    let auth = ["auth", "401", "403", "forbidden", "denied", "token"]
        .iter()
        .any(|w| lower.contains(w));
    if auth {
        FeedError::Authorization(text)
    } else {
        FeedError::Protocol(text)
    }
}

pub(crate) struct StompClient {
    ws: WsStream,
    pending: VecDeque<Frame>,
    subs: usize,
}

impl StompClient {
    /// Open the WebSocket and do the STOMP handshake.
    ///
    #[tracing::instrument(skip(bearer))]
    pub(crate) async fn connect(url: &str, bearer: &str) -> Result<Self, FeedError> {
        let mut req = url.into_client_request().map_err(transport)?;
        let auth = HeaderValue::from_str(bearer)
            .map_err(|e| FeedError::Authorization(e.to_string()))?;
        req.headers_mut().insert("authorization", auth);
        let host = req.uri().host().unwrap_or("localhost").to_owned();

        let (ws, resp) = connect_async(req).await.map_err(|e| match e {
            WsError::Http(resp) if matches!(resp.status().as_u16(), 401 | 403) => {
                FeedError::Authorization(format!("HTTP {}", resp.status()))
            }
            e => transport(e),
        })?;
        debug!("websocket open ({})", resp.status());

        let mut client = StompClient {
            ws,
            pending: VecDeque::new(),
            subs: 0,
        };

        let connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", &host)
            .header("heart-beat", "0,0")
            .header("Authorization", bearer);
        client.send(connect).await?;

        let frame = client.next_frame().await?;
        match frame.command {
            Command::Connected => {
                debug!("connected, version {:?}", frame.get("version"));
                Ok(client)
            }
            Command::Error => Err(broker_error(&frame)),
            other => Err(FeedError::Protocol(format!(
                "expected CONNECTED, got {other}"
            ))),
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), FeedError> {
        trace!("send {}", frame.command);
        self.ws
            .send(Message::Text(frame.encode()))
            .await
            .map_err(transport)
    }

    /// Next frame from the broker, whatever it is.
    ///
    async fn next_frame(&mut self) -> Result<Frame, FeedError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }
            let msg = self
                .ws
                .next()
                .await
                .ok_or_else(|| transport("connection closed"))?
                .map_err(transport)?;

            let text = match msg {
                Message::Text(text) => text,
                Message::Binary(data) => {
                    String::from_utf8(data).map_err(|e| FeedError::Protocol(e.to_string()))?
                }
                Message::Close(reason) => {
                    return Err(transport(format!("closed by broker: {reason:?}")));
                }
                _ => continue,
            };
            self.pending.extend(parse_all(&text)?);
        }
    }

    /// Subscribe to `destination`, return the subscription id.
    ///
    pub(crate) async fn subscribe(&mut self, destination: &str) -> Result<String, FeedError> {
        let id = format!("sub-{}", self.subs);
        self.subs += 1;

        let frame = Frame::new(Command::Subscribe)
            .header("id", &id)
            .header("destination", destination)
            .header("ack", "auto");
        self.send(frame).await?;
        debug!("subscribed to {} as {}", destination, id);
        Ok(id)
    }

    /// Wait for the next `MESSAGE`, an `ERROR` frame ends the session.
    ///
    pub(crate) async fn next_message(&mut self) -> Result<Frame, FeedError> {
        loop {
            let frame = self.next_frame().await?;
            match frame.command {
                Command::Message => return Ok(frame),
                Command::Error => return Err(broker_error(&frame)),
                other => trace!("ignoring {}", other),
            }
        }
    }

    /// Polite goodbye, errors do not matter anymore at this point.
    ///
    pub(crate) async fn disconnect(mut self) {
        let _ = self.send(Frame::new(Command::Disconnect)).await;
        let _ = self.ws.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Invalid token", true)]
    #[case("Access denied", true)]
    #[case("403 Forbidden", true)]
    #[case("Unauthorized", true)]
    #[case("Destination does not exist", false)]
    fn test_broker_error(#[case] msg: &str, #[case] auth: bool) {
        let frame = Frame::new(Command::Error).header("message", msg);
        assert_eq!(auth, broker_error(&frame).is_authorization());
    }
}
