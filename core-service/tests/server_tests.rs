//! RPC and pub/sub servers over real loopback sockets.
//!
//! This test suite verifies:
//! - Playing a URI reaches the engine and answers `ACK OK 0`
//! - Declared response lengths match the body bytes
//! - Topic messages reach subscribers and dead sessions are unlinked
//! - Bad requests keep the session usable
//! - Heredoc requests, `exec`, `jsonrpc`, `show` and `quit`

use bridge_traits::{error::Result as BridgeResult, EngineEventSender, Media, MediaEngine};
use core_library::models::BriefSong;
use core_library::testing::FakeProvider;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, PlayerEvent};
use core_runtime::Delivery;
use core_service::{create_app, App, FuoServer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Recording Engine
// ============================================================================

#[derive(Default)]
struct RecordingEngine {
    played: Mutex<Vec<String>>,
    events: Mutex<Option<EngineEventSender>>,
}

impl MediaEngine for RecordingEngine {
    fn attach(&self, events: EngineEventSender) {
        *self.events.lock() = Some(events);
    }

    fn play(&self, media: &Media, _video: bool) -> BridgeResult<()> {
        self.played.lock().push(media.url.clone());
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn resume(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn shutdown(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn set_volume(&self, _volume: u8) -> BridgeResult<()> {
        Ok(())
    }

    fn seek(&self, _position: f64) -> BridgeResult<()> {
        Ok(())
    }

    fn set_play_range(&self, _start: f64, _end: Option<f64>) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    app: Arc<App>,
    engine: Arc<RecordingEngine>,
    rpc_port: u16,
    pubsub_port: u16,
    shutdown: CancellationToken,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn one() -> BriefSong {
    BriefSong::new("dummy", "1", "One")
        .with_artists_name("Alice")
        .with_album_name("First")
}

async fn fixture() -> Fixture {
    let engine = Arc::new(RecordingEngine::default());
    let app = create_app(CoreConfig::default(), engine.clone()).unwrap();
    app.library
        .register(Arc::new(
            FakeProvider::new("dummy").with_song_media(one(), Media::new("http://x/1.mp3")),
        ))
        .unwrap();

    let rpc = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let pubsub = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = FuoServer::from_listeners(Arc::clone(&app), rpc, pubsub);
    let rpc_port = server.rpc_addr().unwrap().port();
    let pubsub_port = server.pubsub_addr().unwrap().port();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.serve());

    Fixture {
        app,
        engine,
        rpc_port,
        pubsub_port,
        shutdown,
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    welcome: String,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            welcome: String::new(),
        };
        client.welcome = client.read_line().await;
        client
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Read one response: `(code, declared length, body)`.
    async fn response(&mut self) -> (String, usize, String) {
        let header = self.read_line().await;
        let parts: Vec<&str> = header.trim_end().split(' ').collect();
        assert_eq!(parts.len(), 3, "bad header {header:?}");
        assert_eq!(parts[0], "ACK");
        let len: usize = parts[2].parse().unwrap();
        let mut body = vec![0; len + 2];
        self.reader.read_exact(&mut body).await.unwrap();
        assert_eq!(&body[len..], b"\r\n");
        body.truncate(len);
        (parts[1].to_string(), len, String::from_utf8(body).unwrap())
    }

    async fn request(&mut self, text: &str) -> (String, String) {
        self.send(text).await;
        let (code, _, body) = self.response().await;
        (code, body)
    }
}

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_play_uri() {
    let fx = fixture().await;
    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&order);
    fx.app.playlist.song_changed.connect(
        move |_song| sink.lock().push("song_changed"),
        Delivery::Direct,
    );
    let sink = Arc::clone(&order);
    fx.app.playlist.song_changed_v2.connect(
        move |_change| sink.lock().push("song_changed_v2"),
        Delivery::Direct,
    );

    let mut client = Client::connect(fx.rpc_port).await;
    assert_eq!(client.welcome, "OK rpc 2.0\r\n");
    client.send("play fuo://dummy/songs/1").await;
    let (code, len, body) = client.response().await;

    assert_eq!((code.as_str(), len, body.as_str()), ("OK", 0, ""));
    assert_eq!(
        fx.app.playlist.current_song().map(|s| s.identifier),
        Some("1".to_string())
    );
    assert_eq!(*fx.engine.played.lock(), ["http://x/1.mp3"]);
    assert_eq!(*order.lock(), ["song_changed", "song_changed_v2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_json_roundtrip() {
    let fx = fixture().await;
    let mut client = Client::connect(fx.rpc_port).await;

    client.send("status --json").await;
    let (code, len, body) = client.response().await;
    assert_eq!(code, "OK");
    assert_eq!(len, body.len());
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    for key in ["state", "volume", "playback_mode", "repeat", "random"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["state"], "stopped");

    // Plain status after playing shows the song line.
    let (code, _) = client.request("play fuo://dummy/songs/1").await;
    assert_eq!(code, "OK");
    let (_, body) = client.request("status").await;
    assert!(body.contains("state:  playing"), "{body}");
    assert!(body.contains("fuo://dummy/songs/1\t# One - Alice"), "{body}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pubsub_fan_out_and_dead_subscriber() {
    let fx = fixture().await;
    let mut sub = Client::connect(fx.pubsub_port).await;
    assert_eq!(sub.welcome, "OK pubsub 1.0\r\n");

    assert_eq!(sub.request("set --pubsub-version 2.0").await.0, "OK");
    assert_eq!(sub.request(r"sub 'player\..*'").await.0, "OK");
    assert_eq!(fx.app.gateway.subscriber_count("player.state_changed"), 1);
    assert_eq!(fx.app.gateway.subscriber_count("live_lyric"), 0);

    fx.app
        .events
        .emit(CoreEvent::Player(PlayerEvent::StateChanged {
            state: "playing".into(),
        }))
        .unwrap();
    let expected = b"MSG player.state_changed 7\r\nplaying\r\n";
    let mut frame = vec![0; expected.len()];
    sub.reader.read_exact(&mut frame).await.unwrap();
    assert_eq!(&frame[..], expected);

    drop(sub);
    let app = Arc::clone(&fx.app);
    eventually(move || {
        let _ = app.events.emit(CoreEvent::Player(PlayerEvent::StateChanged {
            state: "paused".into(),
        }));
        app.gateway.subscriber_count("player.state_changed") == 0
            && app.gateway.subscriber_count("player.seeked") == 0
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_request_keeps_session() {
    let fx = fixture().await;
    let mut client = Client::connect(fx.rpc_port).await;

    let (code, body) = client.request("play").await;
    assert_eq!(code, "Oops");
    assert!(body.starts_with("bad request!\n"), "{body}");

    let (code, body) = client.request("search 'unclosed").await;
    assert_eq!(code, "Oops");
    assert!(body.starts_with("bad request!\n"), "{body}");

    let (code, _) = client.request("status").await;
    assert_eq!(code, "OK");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_errors_are_oops() {
    let fx = fixture().await;
    let mut client = Client::connect(fx.rpc_port).await;

    let (code, body) = client.request("show fuo://nope/songs/1").await;
    assert_eq!((code.as_str(), body.as_str()), ("Oops", "provider:nope not found"));

    let (code, body) = client.request("show fuo://dummy/songs/1/nothing").await;
    assert_eq!(code, "Oops");
    assert_eq!(body, "path /dummy/songs/1/nothing not found");

    let (code, body) = client.request("show fuo://").await;
    assert_eq!((code.as_str(), body.as_str()), ("OK", "fuo://dummy\t# dummy"));

    let (_, body) = client.request("show fuo://server/sessions/me").await;
    assert_eq!(body, "   rpc_version: 2.0\npubsub_version: 1.0");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heredoc_exec_and_jsonrpc() {
    let fx = fixture().await;
    let mut client = Client::connect(fx.rpc_port).await;

    client
        .send("exec <<EOF\nplaylist.add \"fuo://dummy/songs/1\"\nplaylist.list\nEOF")
        .await;
    let (code, _, body) = client.response().await;
    assert_eq!(code, "OK");
    assert_eq!(body, r#"["fuo://dummy/songs/1"]"#);

    let (_, body) = client.request("list").await;
    assert_eq!(body, "fuo://dummy/songs/1\t# One - Alice");

    client
        .send("jsonrpc <<EOF\n{\"jsonrpc\": \"2.0\", \"method\": \"os.system\", \"id\": 7}\nEOF")
        .await;
    let (code, _, body) = client.response().await;
    assert_eq!(code, "OK");
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["error"]["code"], -32601);
    assert_eq!(value["id"], 7);

    client
        .send("jsonrpc <<EOF\n{\"jsonrpc\": \"2.0\", \"method\": \"playlist.playback_mode\", \"id\": 1}\nEOF")
        .await;
    let (_, _, body) = client.response().await;
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["result"], "loop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_v1_session_and_quit() {
    let fx = fixture().await;
    let mut client = Client::connect(fx.rpc_port).await;

    assert_eq!(client.request("set --rpc-version=1.0").await.0, "OK");
    let (code, body) = client.request("status #: format=json").await;
    assert_eq!(code, "OK");
    assert!(serde_json::from_str::<serde_json::Value>(&body).is_ok());

    let (code, body) = client.request("jsonrpc <<EOF").await;
    assert_eq!(code, "Oops");
    assert!(body.starts_with("bad request!"));

    client.send("quit").await;
    let mut rest = Vec::new();
    client.reader.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}
