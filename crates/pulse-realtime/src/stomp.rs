//! STOMP 1.2 frame codec.
//!
//! A frame is a command line, `key:value` header lines, a blank line, the
//! body, and a NUL byte. A bare end-of-line between frames is a heartbeat.
//! One WebSocket text message may carry several frames.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::RealtimeError;

const NUL: char = '\0';

/// Heartbeat payload sent on the wire.
pub const HEARTBEAT: &str = "\n";

/// STOMP commands used by the client and broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (alternate spelling).
    Stomp,
    /// Broker handshake reply.
    Connected,
    /// Publish to a destination.
    Send,
    /// Start receiving from a destination.
    Subscribe,
    /// Stop receiving from a subscription.
    Unsubscribe,
    /// Graceful client shutdown.
    Disconnect,
    /// Broker delivery for a subscription.
    Message,
    /// Broker acknowledgement of a `receipt` header.
    Receipt,
    /// Broker failure report.
    Error,
    /// Acknowledge a message.
    Ack,
    /// Reject a message.
    Nack,
    /// Start a transaction.
    Begin,
    /// Commit a transaction.
    Commit,
    /// Roll back a transaction.
    Abort,
}

impl Command {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
        }
    }

    /// Handshake frames carry headers verbatim.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            other => return Err(RealtimeError::Frame(format!("unknown command {other:?}"))),
        })
    }
}

/// A single STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated keys keep the first occurrence.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl Frame {
    /// Frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Best available description of an `ERROR` frame.
    pub fn error_message(&self) -> String {
        match (self.get("message"), self.body.trim()) {
            (Some(m), "") => m.to_string(),
            (Some(m), body) => format!("{m}: {body}"),
            (None, "") => "unspecified broker error".to_string(),
            (None, body) => body.to_string(),
        }
    }

    /// Serialize to wire text, NUL terminated.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }
}

/// One decoded unit of inbound traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A bare end-of-line.
    Heartbeat,
    /// A complete frame.
    Frame(Frame),
}

/// Decode every heartbeat and frame in one text message.
pub fn decode(input: &str) -> Result<Vec<Decoded>, RealtimeError> {
    match decode_prefix(input) {
        (decoded, None) => Ok(decoded),
        (_, Some(e)) => Err(e),
    }
}

/// Decode up to the first malformed frame.
///
/// Returns everything decoded before it, plus the error that stopped
/// decoding, if any.
pub fn decode_prefix(input: &str) -> (Vec<Decoded>, Option<RealtimeError>) {
    let mut out = Vec::new();
    let mut rest = input;
    loop {
        if let Some(r) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
            out.push(Decoded::Heartbeat);
            rest = r;
            continue;
        }
        if rest.is_empty() {
            return (out, None);
        }
        match decode_frame(rest) {
            Ok((frame, r)) => {
                out.push(Decoded::Frame(frame));
                rest = r;
            }
            Err(e) => return (out, Some(e)),
        }
    }
}

fn decode_frame(input: &str) -> Result<(Frame, &str), RealtimeError> {
    let (command_line, mut rest) = split_line(input)
        .ok_or_else(|| RealtimeError::Frame("missing command line".into()))?;
    let command: Command = command_line.parse()?;
    let escaped = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, r) = split_line(rest)
            .ok_or_else(|| RealtimeError::Frame("unterminated header block".into()))?;
        rest = r;
        if line.is_empty() {
            break;
        }
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| RealtimeError::Frame(format!("malformed header {line:?}")))?;
        if escaped {
            headers.push((unescape_header(k)?, unescape_header(v)?));
        } else {
            headers.push((k.to_string(), v.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| RealtimeError::Frame(format!("invalid content-length {v:?}")))
        })
        .transpose()?;

    let (body, rest) = match content_length {
        Some(len) => {
            let body = rest
                .get(..len)
                .ok_or_else(|| RealtimeError::Frame("body shorter than content-length".into()))?;
            let after = &rest[len..];
            let after = after
                .strip_prefix(NUL)
                .ok_or_else(|| RealtimeError::Frame("missing NUL terminator".into()))?;
            (body, after)
        }
        None => {
            let end = rest
                .find(NUL)
                .ok_or_else(|| RealtimeError::Frame("missing NUL terminator".into()))?;
            (&rest[..end], &rest[end + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        rest,
    ))
}

/// Split off one line, accepting `\n` or `\r\n`.
fn split_line(input: &str) -> Option<(&str, &str)> {
    let idx = input.find('\n')?;
    let line = &input[..idx];
    Some((line.strip_suffix('\r').unwrap_or(line), &input[idx + 1..]))
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, RealtimeError> {
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
                return Err(RealtimeError::Frame(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// Heartbeat intervals for one side: `(outgoing, incoming)` in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartBeat {
    /// Smallest interval at which this side can send.
    pub outgoing_ms: u64,
    /// Desired interval at which this side wants to receive.
    pub incoming_ms: u64,
}

impl HeartBeat {
    /// Construct from millisecond values.
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parse a `heart-beat` header value (`"cx,cy"`).
    pub fn parse(value: &str) -> Option<Self> {
        let (x, y) = value.split_once(',')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }

    /// Header value.
    pub fn to_header(self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }
}

/// Agreed heartbeat periods. `None` disables a direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Negotiated {
    /// How often the client sends a heartbeat.
    pub outgoing: Option<Duration>,
    /// How often the client expects traffic from the broker.
    pub incoming: Option<Duration>,
}

/// Combine client and broker heartbeat settings.
///
/// Each direction is disabled when either side reports 0, else it runs at the
/// larger of the two values.
pub fn negotiate_heartbeat(client: HeartBeat, server: HeartBeat) -> Negotiated {
    let pick = |ours: u64, theirs: u64| {
        (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
    };
    Negotiated {
        outgoing: pick(client.outgoing_ms, server.incoming_ms),
        incoming: pick(client.incoming_ms, server.outgoing_ms),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn single_frame(input: &str) -> Frame {
        let mut decoded = decode(input).unwrap();
        assert_eq!(decoded.len(), 1);
        match decoded.remove(0) {
            Decoded::Frame(f) => f,
            Decoded::Heartbeat => panic!("expected a frame"),
        }
    }

    #[test]
    fn encode_send_frame() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/chat.send")
            .body("{}");
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/chat.send\ncontent-length:2\n\n{}\0"
        );
    }

    #[test]
    fn decode_message_frame() {
        let frame = single_frame(
            "MESSAGE\nsubscription:sub-1\ndestination:/topic/rooms/5\nmessage-id:7\n\n{\"a\":1}\0",
        );
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-1"));
        assert_eq!(frame.body, "{\"a\":1}");
    }

    #[test]
    fn header_escaping_survives_the_wire() {
        let frame = Frame::new(Command::Send).header("x-note", "a:b\\c\nd");
        let encoded = frame.encode();
        assert!(encoded.contains("x-note:a\\cb\\\\c\\nd\n"));
        assert_eq!(single_frame(&encoded), frame);
    }

    #[test]
    fn handshake_headers_are_not_escaped() {
        let frame = single_frame("CONNECTED\nserver:broker:1.0\nversion:1.2\n\n\0");
        assert_eq!(frame.get("server"), Some("broker:1.0"));
    }

    #[test]
    fn content_length_allows_embedded_nul() {
        let frame = single_frame("MESSAGE\ncontent-length:3\n\na\0b\0");
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn heartbeats_and_multiple_frames() {
        let decoded = decode("\n\r\nRECEIPT\nreceipt-id:1\n\n\0MESSAGE\n\nhi\0\n").unwrap();
        assert_eq!(decoded.len(), 5);
        assert_eq!(decoded[0], Decoded::Heartbeat);
        assert_eq!(decoded[1], Decoded::Heartbeat);
        assert_matches!(&decoded[2], Decoded::Frame(f) if f.command == Command::Receipt);
        assert_matches!(&decoded[3], Decoded::Frame(f) if f.body == "hi");
        assert_eq!(decoded[4], Decoded::Heartbeat);
    }

    #[test]
    fn crlf_line_endings() {
        let frame = single_frame("MESSAGE\r\nsubscription:sub-2\r\n\r\nbody\0");
        assert_eq!(frame.get("subscription"), Some("sub-2"));
        assert_eq!(frame.body, "body");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_matches!(decode("GARBAGE\n\n\0"), Err(RealtimeError::Frame(_)));
        assert_matches!(decode("MESSAGE\nsub\n\n\0"), Err(RealtimeError::Frame(_)));
        assert_matches!(decode("MESSAGE\n\nno terminator"), Err(RealtimeError::Frame(_)));
        assert_matches!(decode("MESSAGE\ncontent-length:99\n\nshort\0"), Err(RealtimeError::Frame(_)));
        assert_matches!(decode("SEND\nbad:\\t\n\n\0"), Err(RealtimeError::Frame(_)));
    }

    #[test]
    fn prefix_keeps_frames_before_the_bad_one() {
        let (decoded, err) = decode_prefix("\nMESSAGE\n\nfirst\0GARBAGE\n\n\0MESSAGE\n\nlost\0");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0], Decoded::Heartbeat);
        assert_matches!(&decoded[1], Decoded::Frame(f) if f.body == "first");
        assert_matches!(err, Some(RealtimeError::Frame(_)));

        let (decoded, err) = decode_prefix("MESSAGE\n\nok\0");
        assert_eq!(decoded.len(), 1);
        assert!(err.is_none());
    }

    #[test]
    fn error_message_prefers_header() {
        let frame = Frame::new(Command::Error).header("message", "denied").body("detail");
        assert_eq!(frame.error_message(), "denied: detail");
        assert_eq!(Frame::new(Command::Error).error_message(), "unspecified broker error");
    }

    #[test]
    fn heart_beat_header_round_trip() {
        let hb = HeartBeat::parse("4000, 10000").unwrap();
        assert_eq!(hb, HeartBeat::new(4000, 10_000));
        assert_eq!(hb.to_header(), "4000,10000");
        assert!(HeartBeat::parse("oops").is_none());
    }

    #[test]
    fn negotiation_takes_max_and_honors_zero() {
        let n = negotiate_heartbeat(HeartBeat::new(4000, 4000), HeartBeat::new(10_000, 0));
        assert_eq!(n.outgoing, None);
        assert_eq!(n.incoming, Some(Duration::from_millis(10_000)));

        let n = negotiate_heartbeat(HeartBeat::new(4000, 4000), HeartBeat::new(1000, 2000));
        assert_eq!(n.outgoing, Some(Duration::from_millis(4000)));
        assert_eq!(n.incoming, Some(Duration::from_millis(4000)));

        assert_eq!(
            negotiate_heartbeat(HeartBeat::new(0, 0), HeartBeat::new(5000, 5000)),
            Negotiated::default()
        );
    }
}
