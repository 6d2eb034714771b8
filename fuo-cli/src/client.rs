//! Minimal RPC client: read the welcome line, send one request, read one
//! `ACK` frame.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected welcome line: {0:?}")]
    Welcome(String),

    #[error("Malformed response header: {0:?}")]
    Header(String),

    #[error("Arguments cannot be quoted: {0}")]
    Quote(String),

    #[error("Connection closed by server")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// One decoded `ACK <code> <len>` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
    pub body: String,
}

/// Join `cmd` and `args` into a single v2 request line.
pub fn request_line(cmd: &str, args: &[String]) -> Result<String> {
    let words = std::iter::once(cmd).chain(args.iter().map(String::as_str));
    shlex::try_join(words).map_err(|err| ClientError::Quote(err.to_string()))
}

pub struct Client<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Wrap a connected stream and consume the server's welcome line.
    pub async fn handshake(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
        };
        let welcome = client.read_line().await?;
        if !welcome.starts_with("OK rpc ") {
            return Err(ClientError::Welcome(welcome));
        }
        debug!(welcome = %welcome.trim_end(), "Connected");
        Ok(client)
    }

    pub async fn request(&mut self, line: &str) -> Result<Ack> {
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let header = self.read_line().await?;
        let mut parts = header.trim_end().splitn(3, ' ');
        let (Some("ACK"), Some(code), Some(len)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ClientError::Header(header));
        };
        let ok = match code {
            "OK" => true,
            "Oops" => false,
            _ => return Err(ClientError::Header(header)),
        };
        let len: usize = len
            .parse()
            .map_err(|_| ClientError::Header(header.clone()))?;

        let mut body = vec![0; len + 2];
        self.stream.read_exact(&mut body).await?;
        body.truncate(len);
        Ok(Ack {
            ok,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_request_line_quotes_arguments() {
        let args = vec!["周杰伦 晴天".to_string(), "--type=so".to_string()];
        let line = request_line("search", &args).unwrap();
        assert_eq!(
            shlex::split(&line).unwrap(),
            ["search", "周杰伦 晴天", "--type=so"]
        );
        assert_eq!(request_line("status", &[]).unwrap(), "status");
    }

    #[tokio::test]
    async fn test_request_reads_one_frame() {
        let (client_end, mut server_end) = duplex(1024);
        let server = tokio::spawn(async move {
            server_end.write_all(b"OK rpc 2.0\r\n").await.unwrap();
            let mut buf = vec![0; 7];
            server_end.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, b"status\n");
            server_end
                .write_all("ACK Oops 6\r\n错误\r\n".as_bytes())
                .await
                .unwrap();
        });

        let mut client = Client::handshake(client_end).await.unwrap();
        let ack = client.request("status").await.unwrap();
        assert_eq!(
            ack,
            Ack {
                ok: false,
                body: "错误".into()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_foreign_server() {
        let (client_end, mut server_end) = duplex(64);
        server_end.write_all(b"SSH-2.0-OpenSSH\r\n").await.unwrap();
        assert!(matches!(
            Client::handshake(client_end).await,
            Err(ClientError::Welcome(_))
        ));
    }
}
