//! # Playback Module
//!
//! Everything between "the user picked a song" and "the engine plays a URL".
//!
//! ## Overview
//!
//! This module handles:
//! - A player facade over the external media engine ([`Player`])
//! - The playlist state machine: playback modes, bad songs, standby
//!   fallback and preemptive current-song changes ([`Playlist`])
//! - FM mode, an endless playlist fed by a fetcher ([`Fm`])
//! - Live lyric and the recently played list
//! - Metadata assembly for now-playing integrations
//! - The persisted state snapshot

pub mod error;
pub mod fm;
pub mod lyric;
pub mod metadata;
pub mod player;
pub mod playlist;
pub mod recently_played;
pub mod state;

pub use error::{PlaybackError, Result};
pub use fm::{FetchSongs, Fm};
pub use lyric::{LiveLyric, LyricLine};
pub use metadata::{Metadata, MetadataAssembler};
pub use player::{Player, PlayerState};
pub use playlist::{PlaybackMode, Playlist, PlaylistMode};
pub use recently_played::RecentlyPlayed;
pub use state::StateSnapshot;
