//! Response serializers.
//!
//! Handlers return an [`Output`]; the request's `--format` picks how it is
//! rendered:
//!
//! - [`plain`] - aligned `key:  value` items, one model per line in
//!   listings, wide characters fitted to display columns
//! - [`json`] - objects tagged with `__type__`, `provider`, `identifier`
//!   and `uri` for models

pub mod json;
pub mod plain;

use bridge_traits::EngineState;
use core_library::models::{BriefSong, Model};
use core_library::{Provider, SearchResult};
use core_playback::PlaybackMode;

use crate::dsl::Format;
use crate::error::Result;

/// A provider as listed by `show fuo://`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub identifier: String,
    pub name: String,
}

impl ProviderInfo {
    pub fn of(provider: &dyn Provider) -> Self {
        Self {
            identifier: provider.identifier().to_string(),
            name: provider.name().to_string(),
        }
    }

    pub fn uri(&self) -> String {
        format!("fuo://{}", self.identifier)
    }
}

/// Snapshot answered by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub playback_mode: PlaybackMode,
    pub volume: u8,
    pub state: EngineState,
    /// Only present while a song is playing or paused.
    pub now_playing: Option<NowPlaying>,
}

impl StatusReport {
    pub fn repeat(&self) -> bool {
        matches!(
            self.playback_mode,
            PlaybackMode::Loop | PlaybackMode::OneLoop
        )
    }

    pub fn random(&self) -> bool {
        self.playback_mode == PlaybackMode::Random
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub duration: f64,
    pub position: f64,
    pub song: BriefSong,
    pub lyric_sentence: String,
}

/// What a handler produced.
#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Empty,
    Text(String),
    /// One model, every field.
    Model(Model),
    /// One line per model.
    Models(Vec<Model>),
    Providers(Vec<ProviderInfo>),
    Status(StatusReport),
    Search(Vec<SearchResult>),
    Json(serde_json::Value),
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

pub fn serialize(format: Format, output: &Output) -> Result<String> {
    match format {
        Format::Plain => Ok(plain::render(output)),
        Format::Json => json::render(output),
    }
}
