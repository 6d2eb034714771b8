//! # Event Bus System
//!
//! Provides the asynchronous fan-out used to feed pub/sub topics, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Signals (see [`crate::signal`]) run receivers inline, which is what the
//! playlist and player need to stay consistent. Network subscribers are a
//! different audience: they must never slow an emit down, and they only care
//! about a serialized snapshot of what happened. The application bridges the
//! interesting signals into [`CoreEvent`]s on an [`EventBus`]; the pub/sub
//! gateway consumes the bus and publishes every event to its topic.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  signal   ┌───────────┐   emit    ┌───────────┐
//! │ Player       ├──────────>│           │           │           │
//! └──────────────┘           │  bridge   ├──────────>│ EventBus  │
//! ┌──────────────┐  signal   │ receivers │           │ (broadcast│
//! │ Playlist     ├──────────>│           │           │  channel) │
//! └──────────────┘           └───────────┘           └─────┬─────┘
//!                                                          │ subscribe
//!                                                          v
//!                                                 ┌──────────────────┐
//!                                                 │ pub/sub gateway  │
//!                                                 │ topic -> sessions│
//!                                                 └──────────────────┘
//! ```
//!
//! ## Topics
//!
//! Every event maps to exactly one topic name, e.g. `player.state_changed`
//! or `live_lyric`. [`ALL_TOPICS`] lists them so the gateway can register
//! them up front and match subscription patterns against them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::SendError, Receiver};

/// Default buffer size for the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Every topic an event can be published to.
pub const ALL_TOPICS: &[&str] = &[
    "player.state_changed",
    "player.position_changed",
    "player.duration_changed",
    "player.media_changed",
    "player.metadata_changed",
    "player.volume_changed",
    "player.seeked",
    "player.media_finished",
    "playlist.song_changed",
    "playlist.playback_mode_changed",
    "playlist.mode_changed",
    "playlist.songs_added",
    "playlist.songs_removed",
    "library.provider_added",
    "library.provider_removed",
    "live_lyric",
];

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Player(PlayerEvent),
    Playlist(PlaylistEvent),
    Library(LibraryEvent),
    /// The sentence of the lyric matching the playback position.
    LiveLyric { sentence: String },
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Playlist(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::LiveLyric { .. } => "Lyric sentence changed",
        }
    }

    /// The pub/sub topic this event is published to.
    pub fn topic(&self) -> &'static str {
        match self {
            CoreEvent::Player(e) => e.topic(),
            CoreEvent::Playlist(e) => e.topic(),
            CoreEvent::Library(e) => e.topic(),
            CoreEvent::LiveLyric { .. } => "live_lyric",
        }
    }

    /// Message body sent to subscribers.
    ///
    /// Scalar payloads are sent as bare text (`playing`, `12.5`), structured
    /// payloads as compact JSON.
    pub fn payload(&self) -> String {
        match self {
            CoreEvent::Player(e) => e.payload(),
            CoreEvent::Playlist(e) => e.payload(),
            CoreEvent::Library(e) => e.payload(),
            CoreEvent::LiveLyric { sentence } => sentence.clone(),
        }
    }
}

// ============================================================================
// Player Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    StateChanged { state: String },
    PositionChanged { position: f64 },
    DurationChanged { duration: f64 },
    /// `url` is `None` when the player unloaded its media.
    MediaChanged { url: Option<String> },
    MetadataChanged { metadata: serde_json::Value },
    VolumeChanged { volume: u8 },
    Seeked { position: f64 },
    MediaFinished,
}

impl PlayerEvent {
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::StateChanged { .. } => "Player state changed",
            PlayerEvent::PositionChanged { .. } => "Playback position changed",
            PlayerEvent::DurationChanged { .. } => "Media duration changed",
            PlayerEvent::MediaChanged { .. } => "Current media changed",
            PlayerEvent::MetadataChanged { .. } => "Media metadata changed",
            PlayerEvent::VolumeChanged { .. } => "Volume changed",
            PlayerEvent::Seeked { .. } => "Seek completed",
            PlayerEvent::MediaFinished => "Media finished",
        }
    }

    fn topic(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "player.state_changed",
            PlayerEvent::PositionChanged { .. } => "player.position_changed",
            PlayerEvent::DurationChanged { .. } => "player.duration_changed",
            PlayerEvent::MediaChanged { .. } => "player.media_changed",
            PlayerEvent::MetadataChanged { .. } => "player.metadata_changed",
            PlayerEvent::VolumeChanged { .. } => "player.volume_changed",
            PlayerEvent::Seeked { .. } => "player.seeked",
            PlayerEvent::MediaFinished => "player.media_finished",
        }
    }

    fn payload(&self) -> String {
        match self {
            PlayerEvent::StateChanged { state } => state.clone(),
            PlayerEvent::PositionChanged { position } | PlayerEvent::Seeked { position } => {
                position.to_string()
            }
            PlayerEvent::DurationChanged { duration } => duration.to_string(),
            PlayerEvent::MediaChanged { url } => url.clone().unwrap_or_else(|| "null".into()),
            PlayerEvent::MetadataChanged { metadata } => metadata.to_string(),
            PlayerEvent::VolumeChanged { volume } => volume.to_string(),
            PlayerEvent::MediaFinished => String::new(),
        }
    }
}

// ============================================================================
// Playlist Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaylistEvent {
    /// `uri` of the new current song, `None` when cleared.
    SongChanged { uri: Option<String> },
    PlaybackModeChanged { mode: String },
    ModeChanged { mode: String },
    SongsAdded { index: usize, count: usize },
    SongsRemoved { index: usize, count: usize },
}

impl PlaylistEvent {
    pub fn description(&self) -> &str {
        match self {
            PlaylistEvent::SongChanged { .. } => "Current song changed",
            PlaylistEvent::PlaybackModeChanged { .. } => "Playback mode changed",
            PlaylistEvent::ModeChanged { .. } => "Playlist mode changed",
            PlaylistEvent::SongsAdded { .. } => "Songs added",
            PlaylistEvent::SongsRemoved { .. } => "Songs removed",
        }
    }

    fn topic(&self) -> &'static str {
        match self {
            PlaylistEvent::SongChanged { .. } => "playlist.song_changed",
            PlaylistEvent::PlaybackModeChanged { .. } => "playlist.playback_mode_changed",
            PlaylistEvent::ModeChanged { .. } => "playlist.mode_changed",
            PlaylistEvent::SongsAdded { .. } => "playlist.songs_added",
            PlaylistEvent::SongsRemoved { .. } => "playlist.songs_removed",
        }
    }

    fn payload(&self) -> String {
        match self {
            PlaylistEvent::SongChanged { uri } => uri.clone().unwrap_or_else(|| "null".into()),
            PlaylistEvent::PlaybackModeChanged { mode } | PlaylistEvent::ModeChanged { mode } => {
                mode.clone()
            }
            PlaylistEvent::SongsAdded { index, count }
            | PlaylistEvent::SongsRemoved { index, count } => {
                serde_json::json!({ "index": index, "count": count }).to_string()
            }
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    ProviderAdded { provider: String },
    ProviderRemoved { provider: String },
}

impl LibraryEvent {
    pub fn description(&self) -> &str {
        match self {
            LibraryEvent::ProviderAdded { .. } => "Provider registered",
            LibraryEvent::ProviderRemoved { .. } => "Provider deregistered",
        }
    }

    fn topic(&self) -> &'static str {
        match self {
            LibraryEvent::ProviderAdded { .. } => "library.provider_added",
            LibraryEvent::ProviderRemoved { .. } => "library.provider_removed",
        }
    }

    fn payload(&self) -> String {
        match self {
            LibraryEvent::ProviderAdded { provider }
            | LibraryEvent::ProviderRemoved { provider } => provider.clone(),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .emit(CoreEvent::Player(PlayerEvent::MediaFinished))
            .is_err());
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let event = CoreEvent::Player(PlayerEvent::StateChanged {
            state: "playing".into(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap(), event);
    }

    #[test]
    fn test_topics_are_registered() {
        let samples = [
            CoreEvent::Player(PlayerEvent::VolumeChanged { volume: 30 }),
            CoreEvent::Playlist(PlaylistEvent::SongsAdded { index: 0, count: 2 }),
            CoreEvent::Library(LibraryEvent::ProviderAdded {
                provider: "local".into(),
            }),
            CoreEvent::LiveLyric {
                sentence: String::new(),
            },
        ];
        for event in samples {
            assert!(ALL_TOPICS.contains(&event.topic()), "{}", event.topic());
        }
    }

    #[test]
    fn test_payloads() {
        let state = CoreEvent::Player(PlayerEvent::StateChanged {
            state: "playing".into(),
        });
        assert_eq!(state.payload(), "playing");

        let added = CoreEvent::Playlist(PlaylistEvent::SongsAdded { index: 3, count: 1 });
        let json: serde_json::Value = serde_json::from_str(&added.payload()).unwrap();
        assert_eq!(json["index"], 3);

        let cleared = CoreEvent::Playlist(PlaylistEvent::SongChanged { uri: None });
        assert_eq!(cleared.payload(), "null");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Library(LibraryEvent::ProviderRemoved {
            provider: "dummy".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Library");
        assert_eq!(json["payload"]["event"], "ProviderRemoved");
        assert_eq!(event.description(), "Provider deregistered");
    }
}
