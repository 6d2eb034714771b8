//! Media engine bridge trait and the media record it consumes.
//!
//! The engine is an external collaborator. The core hands it a [`Media`]
//! describing a playable stream and listens to [`EngineEvent`]s for progress.
//! Host applications are expected to provide a concrete implementation that
//! satisfies their platform constraints.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Separate video and audio streams that must be played together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAudioManifest {
    pub video_url: String,
    pub audio_url: String,
}

/// A playable stream.
///
/// `url` is always set. When `manifest` is present the engine should play
/// the video and audio parts together and treat `url` as the video part.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Media {
    /// Stream location understood by the engine.
    pub url: String,
    /// Extra headers the engine must send when fetching `url`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub http_headers: HashMap<String, String>,
    /// Proxy to use for HTTP requests, e.g. `http://127.0.0.1:8080`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    /// Optional split video/audio streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<VideoAudioManifest>,
    /// Bitrate in kbps, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    /// Container or codec hint such as `mp3` or `flac`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Media {
    /// Create a media record for a plain URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Attach an HTTP header sent with every request for this stream.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(key.into(), value.into());
        self
    }

    /// Route requests for this stream through a proxy.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    /// Pair a video stream with a separate audio stream.
    pub fn with_manifest(video_url: impl Into<String>, audio_url: impl Into<String>) -> Self {
        let video_url = video_url.into();
        Self {
            url: video_url.clone(),
            manifest: Some(VideoAudioManifest {
                video_url,
                audio_url: audio_url.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether the record describes split video/audio streams.
    pub fn has_manifest(&self) -> bool {
        self.manifest.is_some()
    }
}

/// Engine playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Stopped => "stopped",
            EngineState::Paused => "paused",
            EngineState::Playing => "playing",
        }
    }
}

/// Why the engine stopped playing the current media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFinishReason {
    /// Reached the end of the stream.
    Eof,
    /// The same media was loaded again.
    Restarted,
    /// Playback was replaced by another media.
    Aborted,
    /// The engine is shutting down.
    Quit,
    /// Decoding or loading failed; see the accompanying error code.
    Error,
    /// The stream redirected to another location.
    Redirect,
}

/// Events emitted by the engine, possibly from its own thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback position in seconds.
    PositionChanged(f64),
    /// Media duration in seconds.
    DurationChanged(f64),
    StateChanged(EngineState),
    /// The engine opened the media and is ready to play it.
    MediaLoaded,
    MediaFinished {
        reason: MediaFinishReason,
        error_code: Option<i32>,
    },
    /// Tags read from the stream itself (title, artist, album, ...).
    MetadataChanged(HashMap<String, String>),
    /// A seek completed; the new position in seconds.
    Seeked(f64),
}

/// Channel on which an engine publishes [`EngineEvent`]s.
pub type EngineEventSender = UnboundedSender<EngineEvent>;

/// Contract every media engine adapter must satisfy.
///
/// Calls are synchronous and must return quickly; long running work (network,
/// decoding) belongs on the engine's own threads. Results are reported back
/// through the sender handed to [`attach`](MediaEngine::attach).
pub trait MediaEngine: Send + Sync {
    /// Register the channel the engine publishes its events on.
    fn attach(&self, events: EngineEventSender);

    /// Start playing `media`. `video` tells the engine whether to open a video
    /// output when the stream carries one.
    fn play(&self, media: &Media, video: bool) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    /// Stop playback and unload the current media.
    fn stop(&self) -> Result<()>;

    /// Release every native resource. No call is made after this one.
    fn shutdown(&self) -> Result<()>;

    /// Volume in `0..=100`.
    fn set_volume(&self, volume: u8) -> Result<()>;

    /// Seek to an absolute position in seconds.
    fn seek(&self, position: f64) -> Result<()>;

    /// Restrict playback of the next media to `start..end` seconds. Used to
    /// resume a previous session at its saved position.
    fn set_play_range(&self, start: f64, end: Option<f64>) -> Result<()>;
}
