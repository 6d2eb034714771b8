//! # Playback Error Types
//!
//! Errors raised by the player facade, the playlist and the state snapshot.

use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The media engine refused or failed an operation.
    #[error("Media engine error: {0}")]
    Engine(#[from] BridgeError),

    /// Player has been shut down, no further engine call is made.
    #[error("Player is shut down")]
    ShutDown,

    // ========================================================================
    // Playlist Errors
    // ========================================================================
    /// The model given to the playlist is not a song.
    #[error("Not a song: {0}")]
    NotASong(String),

    /// The requested change would break a playlist invariant.
    #[error("Invalid playlist state: {0}")]
    InvalidState(String),

    // ========================================================================
    // Persisted State Errors
    // ========================================================================
    /// Reading or writing the state file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file is not valid JSON of the expected shape.
    #[error("Invalid state file: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Runtime error, e.g. a preemptive task that was cancelled or panicked.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if the error only means a newer request superseded
    /// this one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlaybackError::Runtime(err) if err.is_cancelled())
    }

    /// Returns `true` if no playable media exists for the song.
    pub fn is_media_not_found(&self) -> bool {
        matches!(self, PlaybackError::Library(err) if err.is_media_not_found())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
