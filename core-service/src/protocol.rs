//! # fuo Wire Protocol
//!
//! Framing shared by the RPC and pub/sub servers.
//!
//! ```text
//! server: OK rpc 2.0\r\n                      welcome line
//! client: status --json\n                     one request per line
//! server: ACK OK 42\r\n{...42 bytes...}\r\n   one response per request
//!
//! client: jsonrpc <<EOF\n                     heredoc: the lines up to the
//! client: {"jsonrpc": "2.0", ...}\n           terminator become the last
//! client: EOF\n                               positional argument
//!
//! server: MSG player.state_changed 7\r\n      pub/sub frame (version 2.0)
//! server: playing\r\n
//! ```
//!
//! A request line and a request with its heredoc body are both limited to
//! [`MAX_REQUEST_SIZE`] bytes. Oversized or malformed requests yield a
//! `bad request!` response and the session goes on.

use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use std::fmt;
use std::str::FromStr;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::dsl::{self, Request};
use crate::error::{Result, ServiceError};

/// 64 KiB.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Dialect of a session, selected per connection with `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1.0",
            ProtocolVersion::V2 => "2.0",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" | "1.0" => Ok(ProtocolVersion::V1),
            "2" | "2.0" => Ok(ProtocolVersion::V2),
            other => Err(ServiceError::handler(format!(
                "unsupported protocol version '{other}', expected 1.0 or 2.0"
            ))),
        }
    }
}

/// Which server accepted the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Rpc,
    Pubsub,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Rpc => "rpc",
            SessionKind::Pubsub => "pubsub",
        }
    }
}

/// `OK <kind> <version>\r\n`
pub fn welcome(kind: SessionKind, version: ProtocolVersion) -> Bytes {
    Bytes::from(format!("OK {} {}\r\n", kind.as_str(), version))
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ok: bool,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            ok: true,
            body: body.into(),
        }
    }

    pub fn oops(body: impl Into<String>) -> Self {
        Self {
            ok: false,
            body: body.into(),
        }
    }

    pub fn bad_request(diagnostic: &str) -> Self {
        Self::oops(format!("bad request!\n{diagnostic}"))
    }

    pub fn code(&self) -> &'static str {
        if self.ok {
            "OK"
        } else {
            "Oops"
        }
    }

    /// `ACK <OK|Oops> <len>\r\n<body>\r\n`, `len` counting UTF-8 bytes.
    pub fn encode(&self) -> Bytes {
        let header = format!("ACK {} {}\r\n", self.code(), self.body.len());
        let mut buf = BytesMut::with_capacity(header.len() + self.body.len() + 2);
        buf.put_slice(header.as_bytes());
        buf.put_slice(self.body.as_bytes());
        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}

/// Pub/sub frame: the raw body for 1.0, `MSG <topic> <len>\r\n<body>\r\n`
/// for 2.0.
pub fn topic_frame(topic: &str, body: &str, version: ProtocolVersion) -> Bytes {
    match version {
        ProtocolVersion::V1 => Bytes::copy_from_slice(body.as_bytes()),
        ProtocolVersion::V2 => {
            let header = format!("MSG {} {}\r\n", topic, body.len());
            let mut buf = BytesMut::with_capacity(header.len() + body.len() + 2);
            buf.put_slice(header.as_bytes());
            buf.put_slice(body.as_bytes());
            buf.put_slice(b"\r\n");
            buf.freeze()
        }
    }
}

/// What [`RequestReader::read_request`] found on the wire.
#[derive(Debug)]
pub enum ReadOutcome {
    Request(Request),
    /// A blank line, ignored.
    Empty,
    /// Malformed or oversized request; the text is the diagnostic.
    Bad(String),
    /// The client closed the connection.
    Eof,
}

/// Reads requests line by line from one connection.
pub struct RequestReader<R> {
    lines: FramedRead<R, LinesCodec>,
}

impl<R: AsyncRead + Unpin> RequestReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            lines: FramedRead::new(inner, LinesCodec::new_with_max_length(MAX_REQUEST_SIZE)),
        }
    }

    /// Read the next request, parsed with the grammar of `version`.
    pub async fn read_request(&mut self, version: ProtocolVersion) -> ReadOutcome {
        let line = match self.lines.next().await {
            None => return ReadOutcome::Eof,
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                return ReadOutcome::Bad("request size should be less than 64KiB".into())
            }
            Some(Err(LinesCodecError::Io(err))) => {
                debug!(error = %err, "Connection read failed");
                return ReadOutcome::Eof;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            return ReadOutcome::Empty;
        }

        let raw = match dsl::parse_line(line, version) {
            Ok(raw) => raw,
            Err(err) => return ReadOutcome::Bad(err.to_string()),
        };
        let heredoc = match raw.heredoc_word() {
            Some(word) => {
                let budget = MAX_REQUEST_SIZE.saturating_sub(line.len());
                match self.read_heredoc(word, budget).await {
                    Ok(body) => Some(body),
                    Err(HeredocError::Eof) => return ReadOutcome::Eof,
                    Err(HeredocError::TooLarge) => {
                        return ReadOutcome::Bad(
                            "heredoc body should be less than 64KiB".into(),
                        )
                    }
                }
            }
            None => None,
        };
        match raw.into_request(heredoc) {
            Ok(request) => ReadOutcome::Request(request),
            Err(err) => ReadOutcome::Bad(err.to_string()),
        }
    }

    /// Collect lines until one equals `word`. An oversized body is still
    /// consumed up to its terminator so the next request starts cleanly.
    async fn read_heredoc(
        &mut self,
        word: &str,
        budget: usize,
    ) -> std::result::Result<String, HeredocError> {
        let mut body = String::new();
        let mut too_large = false;
        loop {
            let line = match self.lines.next().await {
                None | Some(Err(LinesCodecError::Io(_))) => return Err(HeredocError::Eof),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    too_large = true;
                    continue;
                }
                Some(Ok(line)) => line,
            };
            if line == word {
                break;
            }
            if !too_large {
                body.push_str(&line);
                body.push('\n');
                too_large = body.len() >= budget;
            }
        }
        if too_large {
            Err(HeredocError::TooLarge)
        } else {
            Ok(body)
        }
    }
}

enum HeredocError {
    Eof,
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{Command, Format};

    fn reader(input: &str) -> RequestReader<&[u8]> {
        RequestReader::new(input.as_bytes())
    }

    #[test]
    fn test_response_length_counts_bytes() {
        let resp = Response::ok("晴天");
        assert_eq!(&resp.encode()[..], "ACK OK 6\r\n晴天\r\n".as_bytes());
        assert_eq!(&Response::oops("").encode()[..], b"ACK Oops 0\r\n\r\n");
    }

    #[test]
    fn test_topic_frames() {
        assert_eq!(
            &topic_frame("player.state_changed", "playing", ProtocolVersion::V2)[..],
            b"MSG player.state_changed 7\r\nplaying\r\n"
        );
        assert_eq!(
            &topic_frame("live_lyric", "la la", ProtocolVersion::V1)[..],
            b"la la"
        );
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("2.0".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V2);
        assert_eq!("1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V1);
        assert!("3.0".parse::<ProtocolVersion>().is_err());
        assert_eq!(
            &welcome(SessionKind::Pubsub, ProtocolVersion::V1)[..],
            b"OK pubsub 1.0\r\n"
        );
    }

    #[tokio::test]
    async fn test_read_requests_in_order() {
        let mut r = reader("status --json\r\n\nquit\n");
        match r.read_request(ProtocolVersion::V2).await {
            ReadOutcome::Request(req) => {
                assert_eq!(req.command, Command::Status);
                assert_eq!(req.format, Format::Json);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Empty
        ));
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Request(Request {
                command: Command::Quit,
                ..
            })
        ));
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Eof
        ));
    }

    #[tokio::test]
    async fn test_heredoc_becomes_last_argument() {
        let mut r = reader("exec <<EOF\nplayer.pause\nplayer.resume\nEOF\nstatus\n");
        match r.read_request(ProtocolVersion::V2).await {
            ReadOutcome::Request(req) => assert_eq!(
                req.command,
                Command::Exec {
                    code: Some("player.pause\nplayer.resume\n".into())
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Request(Request {
                command: Command::Status,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_oversized_line_is_bad_and_session_continues() {
        let input = format!("show {}\nstatus\n", "x".repeat(MAX_REQUEST_SIZE + 10));
        let mut r = reader(&input);
        match r.read_request(ProtocolVersion::V2).await {
            ReadOutcome::Bad(diag) => assert!(diag.contains("64KiB")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Request(Request {
                command: Command::Status,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_oversized_heredoc_is_consumed() {
        let chunk = "y".repeat(1024);
        let mut input = String::from("jsonrpc <<END\n");
        for _ in 0..70 {
            input.push_str(&chunk);
            input.push('\n');
        }
        input.push_str("END\nstatus\n");
        let mut r = reader(&input);
        match r.read_request(ProtocolVersion::V2).await {
            ReadOutcome::Bad(diag) => assert!(diag.contains("heredoc")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            r.read_request(ProtocolVersion::V2).await,
            ReadOutcome::Request(Request {
                command: Command::Status,
                ..
            })
        ));
    }
}
