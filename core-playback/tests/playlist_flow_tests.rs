//! Playlist and player working together against a recording engine.
//!
//! This test suite verifies:
//! - Media reaches the engine after a current-song change
//! - Standby substitution when the owner has no media
//! - Engine end-of-media drives the playlist forward
//! - Engine loading failures mark songs as bad

use bridge_traits::{
    error::Result as BridgeResult, EngineEvent, EngineEventSender, EngineState, Media, MediaEngine,
    MediaFinishReason,
};
use core_library::models::BriefSong;
use core_library::testing::FakeProvider;
use core_library::{Library, LibraryError};
use core_playback::{PlaybackMode, Player, Playlist};
use core_runtime::{Delivery, TaskManager};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Recording Engine
// ============================================================================

#[derive(Default)]
struct RecordingEngine {
    calls: Mutex<Vec<String>>,
    events: Mutex<Option<EngineEventSender>>,
}

impl RecordingEngine {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("play ").map(str::to_string))
            .collect()
    }

    fn send(&self, event: EngineEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            tx.send(event).unwrap();
        }
    }

    fn record(&self, call: impl Into<String>) -> BridgeResult<()> {
        self.calls.lock().push(call.into());
        Ok(())
    }
}

impl MediaEngine for RecordingEngine {
    fn attach(&self, events: EngineEventSender) {
        *self.events.lock() = Some(events);
    }

    fn play(&self, media: &Media, _video: bool) -> BridgeResult<()> {
        self.record(format!("play {}", media.url))
    }

    fn pause(&self) -> BridgeResult<()> {
        self.record("pause")
    }

    fn resume(&self) -> BridgeResult<()> {
        self.record("resume")
    }

    fn stop(&self) -> BridgeResult<()> {
        self.record("stop")
    }

    fn shutdown(&self) -> BridgeResult<()> {
        self.record("shutdown")
    }

    fn set_volume(&self, volume: u8) -> BridgeResult<()> {
        self.record(format!("volume {volume}"))
    }

    fn seek(&self, position: f64) -> BridgeResult<()> {
        self.record(format!("seek {position}"))
    }

    fn set_play_range(&self, start: f64, _end: Option<f64>) -> BridgeResult<()> {
        self.record(format!("range {start}"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    engine: Arc<RecordingEngine>,
    player: Arc<Player>,
    playlist: Arc<Playlist>,
}

fn fixture(providers: Vec<FakeProvider>) -> Fixture {
    let library = Library::default();
    for provider in providers {
        library.register(Arc::new(provider)).unwrap();
    }
    let engine = Arc::new(RecordingEngine::default());
    let player = Player::new(engine.clone());
    player.start();
    let tasks = TaskManager::current().unwrap();
    let playlist = Playlist::new(Arc::new(library), Arc::clone(&player), &tasks, "hq<>");
    Fixture {
        engine,
        player,
        playlist,
    }
}

fn song(source: &str, id: &str, title: &str) -> BriefSong {
    BriefSong::new(source, id, title)
        .with_artists_name("ArtistA")
        .with_album_name("AlbumA")
        .with_duration_ms("03:00")
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

#[tokio::test]
async fn test_current_song_reaches_engine() {
    let one = song("dummy", "1", "One");
    let fx = fixture(vec![
        FakeProvider::new("dummy").with_song_media(one.clone(), Media::new("http://x/1.mp3"))
    ]);

    fx.playlist
        .set_current_song(Some(one.clone()))
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fx.engine.played(), ["http://x/1.mp3"]);
    assert_eq!(fx.player.state(), EngineState::Playing);
    assert_eq!(fx.player.current_metadata().title, "One");
}

#[tokio::test]
async fn test_standby_substitution() {
    let origin = song("p1", "a", "TitleA");
    let standby = song("p2", "a2", "TitleA");
    let fx = fixture(vec![
        FakeProvider::new("p1").with_song_media(origin.clone(), Media::new("http://p1/a.mp3"))
            .with_media_error("a", LibraryError::MediaNotFound("fuo://p1/songs/a".into())),
        FakeProvider::new("p2").with_song_media(standby.clone(), Media::new("http://p2/a2.mp3")),
    ]);
    fx.playlist.add(origin.clone());
    fx.playlist.add(song("p1", "b", "TitleB"));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    fx.playlist.song_changed_v2.connect(
        move |(song, media): (Option<BriefSong>, Option<Media>)| {
            sink.lock().push((song.map(|s| s.identifier), media.map(|m| m.url)));
        },
        Delivery::Direct,
    );

    fx.playlist
        .a_set_current_song(Some(origin.clone()))
        .await
        .unwrap();

    assert_eq!(fx.playlist.bad_songs(), [origin.clone()]);
    assert_eq!(fx.playlist.current_song(), Some(standby.clone()));
    let ids: Vec<String> = fx.playlist.list().into_iter().map(|s| s.identifier).collect();
    assert_eq!(ids, ["a", "a2", "b"]);
    assert_eq!(
        *changes.lock(),
        [(Some("a2".to_string()), Some("http://p2/a2.mp3".to_string()))]
    );
    assert_eq!(fx.engine.played(), ["http://p2/a2.mp3"]);
}

#[tokio::test]
async fn test_no_media_and_no_standby_stops_player() {
    let origin = song("p1", "a", "TitleA");
    let fx = fixture(vec![FakeProvider::new("p1")
        .with_song_media(origin.clone(), Media::new("http://p1/a.mp3"))
        .with_media_error("a", LibraryError::MediaNotFound("fuo://p1/songs/a".into()))]);

    fx.playlist
        .a_set_current_song(Some(origin.clone()))
        .await
        .unwrap();

    assert_eq!(fx.playlist.current_song(), Some(origin));
    assert_eq!(fx.player.state(), EngineState::Stopped);
    assert_eq!(fx.engine.calls().last().map(String::as_str), Some("stop"));
}

#[tokio::test]
async fn test_engine_eof_advances_playlist() {
    let one = song("dummy", "1", "One");
    let two = song("dummy", "2", "Two");
    let fx = fixture(vec![FakeProvider::new("dummy")
        .with_song_media(one.clone(), Media::new("http://x/1.mp3"))
        .with_song_media(two.clone(), Media::new("http://x/2.mp3"))]);
    fx.playlist.set_models(vec![one.clone(), two.clone()], false);
    fx.playlist
        .set_playback_mode(PlaybackMode::Sequential)
        .unwrap();
    fx.playlist
        .set_current_song(Some(one))
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    fx.engine.send(EngineEvent::MediaFinished {
        reason: MediaFinishReason::Eof,
        error_code: None,
    });
    eventually(|| fx.playlist.current_song() == Some(two.clone())).await;
    eventually(|| fx.engine.played().len() == 2).await;

    // Sequential mode stops at the end.
    fx.engine.send(EngineEvent::MediaFinished {
        reason: MediaFinishReason::Eof,
        error_code: None,
    });
    eventually(|| fx.player.state() == EngineState::Stopped).await;
}

#[tokio::test]
async fn test_loading_failure_marks_bad() {
    let one = song("dummy", "1", "One");
    let two = song("dummy", "2", "Two");
    let fx = fixture(vec![FakeProvider::new("dummy")
        .with_song_media(one.clone(), Media::new("http://x/1.mp3"))
        .with_song_media(two.clone(), Media::new("http://x/2.mp3"))]);
    fx.playlist.set_models(vec![one.clone(), two.clone()], false);
    fx.playlist
        .set_current_song(Some(one.clone()))
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    fx.engine.send(EngineEvent::MediaFinished {
        reason: MediaFinishReason::Error,
        error_code: Some(-13),
    });
    eventually(|| fx.playlist.current_song() == Some(two.clone())).await;
    assert!(fx.playlist.is_bad(&one));
}
