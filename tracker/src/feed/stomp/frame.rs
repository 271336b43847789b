//! Minimal STOMP 1.2 frame codec.
//!
//! Only what a subscriber needs: CONNECT/SUBSCRIBE/UNSUBSCRIBE/DISCONNECT going out and
//! CONNECTED/MESSAGE/RECEIPT/ERROR coming in.  A single WebSocket message may carry several
//! frames, each one ends with a NUL byte; bare EOLs between frames are heart-beats.
//!

use std::str::FromStr;

use strum::{Display, EnumString};

use crate::FeedError;

#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Headers of the connection frames are not escaped.
    ///
    fn escapes(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Frame {
            command,
            headers: vec![],
            body: String::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_owned();
        self
    }

    /// First occurrence wins, as per the protocol.
    ///
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        let esc = self.command.escapes();
        let mut out = format!("{}\n", self.command);
        for (k, v) in &self.headers {
            if esc {
                out.push_str(&format!("{}:{}\n", escape(k), escape(v)));
            } else {
                out.push_str(&format!("{k}:{v}\n"));
            }
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    fn parse(text: &str) -> Result<Self, FeedError> {
        let (head, body) = match text.find("\n\n") {
            Some(i) => (&text[..i], &text[i + 2..]),
            None => (text.trim_end_matches('\n'), ""),
        };

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(str::trim)
            .ok_or_else(|| FeedError::Protocol("empty frame".into()))?;
        let command = Command::from_str(command)
            .map_err(|_| FeedError::Protocol(format!("unknown command {command:?}")))?;
        let esc = command.escapes();

        let mut headers = vec![];
        for line in lines {
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| FeedError::Protocol(format!("bad header {line:?}")))?;
            if esc {
                headers.push((unescape(k)?, unescape(v)?));
            } else {
                headers.push((k.to_owned(), v.to_owned()));
            }
        }
        Ok(Frame {
            command,
            headers,
            body: body.to_owned(),
        })
    }
}

/// Split a WebSocket message into frames.
///
pub fn parse_all(text: &str) -> Result<Vec<Frame>, FeedError> {
    let text = text.replace("\r\n", "\n");
    text.split('\0')
        .map(|chunk| chunk.trim_start_matches('\n'))
        .filter(|chunk| !chunk.is_empty())
        .map(Frame::parse)
        .collect()
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
        .replace(':', "\\c")
}

fn unescape(s: &str) -> Result<String, FeedError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(FeedError::Protocol(format!("bad escape \\{other:?}")));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_encode_connect() {
        let f = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("Authorization", "Bearer a:b");
        assert_eq!(
            "CONNECT\naccept-version:1.2\nAuthorization:Bearer a:b\n\n\0",
            f.encode()
        );
    }

    #[test]
    fn test_encode_escapes() {
        let f = Frame::new(Command::Subscribe).header("destination", "/a:b\nc");
        assert_eq!("SUBSCRIBE\ndestination:/a\\cb\\nc\n\n\0", f.encode());
    }

    #[test]
    fn test_parse_message() {
        let raw = "MESSAGE\ndestination:/topic/ambulance/location/A1\nsubscription:sub-0\n\
                   message-id:12\n\n{\"latitude\":1,\"longitude\":2}\0";
        let frames = parse_all(raw).unwrap();
        assert_eq!(1, frames.len());
        let f = &frames[0];
        assert_eq!(Command::Message, f.command);
        assert_eq!(Some("sub-0"), f.get("subscription"));
        assert_eq!(r#"{"latitude":1,"longitude":2}"#, f.body);
    }

    #[test]
    fn test_parse_several_with_heartbeats() {
        let raw = "\n\nCONNECTED\r\nversion:1.2\r\n\r\n\0\nMESSAGE\ndestination:/x\n\nhello\0\n";
        let frames = parse_all(raw).unwrap();
        assert_eq!(2, frames.len());
        assert_eq!(Command::Connected, frames[0].command);
        assert_eq!(Some("1.2"), frames[0].get("version"));
        assert_eq!("hello", frames[1].body);
    }

    #[test]
    fn test_first_header_wins() {
        let frames = parse_all("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap();
        assert_eq!(Some("1"), frames[0].get("foo"));
    }

    #[test]
    fn test_unescape_headers() {
        let frames = parse_all("ERROR\nmessage:bad\\ctoken\\\\x\n\n\0").unwrap();
        assert_eq!(Some("bad:token\\x"), frames[0].get("message"));
    }

    #[rstest]
    #[case("")]
    #[case("\n\n")]
    fn test_heartbeat_only(#[case] raw: &str) {
        assert!(parse_all(raw).unwrap().is_empty());
    }

    #[rstest]
    #[case("FOO\n\n\0")]
    #[case("MESSAGE\nno-colon\n\n\0")]
    #[case("MESSAGE\nbad:\\t\n\n\0")]
    fn test_parse_errors(#[case] raw: &str) {
        assert!(matches!(parse_all(raw), Err(FeedError::Protocol(_))));
    }
}
