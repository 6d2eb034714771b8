//! # RPC and Pub/Sub Servers
//!
//! Two line-protocol TCP servers sharing one [`App`]. Each accepted
//! connection becomes a [`Session`]:
//!
//! 1. the server writes the welcome line (`OK rpc 2.0`)
//! 2. requests are read one at a time and answered in order with
//!    `ACK <OK|Oops> <len>\r\n<body>\r\n`
//! 3. `quit` or end of stream closes the session and unlinks it from every
//!    pub/sub topic
//!
//! Responses and topic messages are both queued on the session outbox and
//! written by a single writer task, so frames never interleave.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::app::App;
use crate::dsl::Command;
use crate::error::Result;
use crate::handlers::handle_request;
use crate::protocol::{welcome, ReadOutcome, RequestReader, Response, SessionKind};
use crate::session::Session;

pub struct FuoServer {
    app: Arc<App>,
    rpc: TcpListener,
    pubsub: TcpListener,
    shutdown: CancellationToken,
}

impl FuoServer {
    /// Bind both servers as configured: loopback unless
    /// `allow_lan_connect`.
    pub async fn bind(app: Arc<App>) -> Result<Self> {
        let host = app.config.bind_host();
        let rpc = TcpListener::bind((host, app.config.rpc_port)).await?;
        let pubsub = TcpListener::bind((host, app.config.pubsub_port)).await?;
        Ok(Self::from_listeners(app, rpc, pubsub))
    }

    /// Serve on listeners bound by the caller.
    pub fn from_listeners(app: Arc<App>, rpc: TcpListener, pubsub: TcpListener) -> Self {
        Self {
            app,
            rpc,
            pubsub,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn rpc_addr(&self) -> Result<SocketAddr> {
        Ok(self.rpc.local_addr()?)
    }

    pub fn pubsub_addr(&self) -> Result<SocketAddr> {
        Ok(self.pubsub.local_addr()?)
    }

    /// Cancelling the token stops both accept loops and closes every
    /// session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until the shutdown token is cancelled.
    pub async fn serve(self) -> Result<()> {
        info!(
            rpc = %self.rpc_addr()?,
            pubsub = %self.pubsub_addr()?,
            "Servers listening"
        );
        let rpc = accept_loop(
            Arc::clone(&self.app),
            self.rpc,
            SessionKind::Rpc,
            self.shutdown.clone(),
        );
        let pubsub = accept_loop(
            Arc::clone(&self.app),
            self.pubsub,
            SessionKind::Pubsub,
            self.shutdown.clone(),
        );
        tokio::join!(rpc, pubsub);
        info!("Servers stopped");
        Ok(())
    }
}

async fn accept_loop(
    app: Arc<App>,
    listener: TcpListener,
    kind: SessionKind,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(run_session(
                    Arc::clone(&app),
                    stream,
                    peer,
                    kind,
                    shutdown.child_token(),
                ));
            }
            Err(err) => {
                // Usually a transient resource error, e.g. too many open files.
                warn!(kind = kind.as_str(), error = %err, "Accept failed");
            }
        }
    }
}

#[instrument(skip(app, stream, shutdown), fields(kind = kind.as_str()))]
async fn run_session(
    app: Arc<App>,
    stream: TcpStream,
    peer: SocketAddr,
    kind: SessionKind,
    shutdown: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let (outbox, mut outgoing) = unbounded_channel::<Bytes>();
    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = outgoing.recv().await {
            if let Err(err) = writer.write_all(&bytes).await {
                debug!(error = %err, "Write failed, closing session");
                break;
            }
        }
        // Dropping the receiver makes the session look dead to publishers.
        drop(outgoing);
        let _ = writer.shutdown().await;
    });

    let session = Session::new(kind, Some(peer), outbox);
    info!(session = session.id(), %peer, "Session opened");
    let options = session.options();
    let version = match kind {
        SessionKind::Rpc => options.rpc_version,
        SessionKind::Pubsub => options.pubsub_version,
    };
    session.send(welcome(kind, version));

    let mut requests = RequestReader::new(reader);
    loop {
        let version = session.options().rpc_version;
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => break,
            outcome = requests.read_request(version) => outcome,
        };
        let response = match outcome {
            ReadOutcome::Eof => break,
            ReadOutcome::Empty => continue,
            ReadOutcome::Bad(diagnostic) => Response::bad_request(&diagnostic),
            ReadOutcome::Request(request) if request.command == Command::Quit => break,
            ReadOutcome::Request(request) => handle_request(&app, &session, request).await,
        };
        if !session.send(response.encode()) {
            break;
        }
    }

    app.gateway.remove_subscriber(session.id());
    let id = session.id();
    drop(session);
    if let Err(err) = writer_task.await {
        error!(session = id, error = %err, "Session writer panicked");
    }
    info!(session = id, "Session closed");
}
