//! # Library Module
//!
//! Music models, the provider contract and the [`Library`] that aggregates
//! registered providers.
//!
//! ## Overview
//!
//! This module manages:
//! - Model types (songs, albums, artists, playlists, users, videos) in brief
//!   and normal forms, identified by `(source, type, identifier)`
//! - `fuo://` URIs and the plain-text line format built on them
//! - The [`Provider`] trait and quality selection policies
//! - Search fan-out across providers and standby song resolution

pub mod cache;
pub mod error;
pub mod library;
pub mod models;
pub mod provider;
pub mod quality;
pub mod search;
pub mod similarity;
pub mod uri;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{LibraryError, Result};
pub use library::Library;
pub use models::{
    BriefAlbum, BriefArtist, BriefPlaylist, BriefSong, BriefUser, BriefVideo, Model,
    ModelIdentity, ModelKey, ModelState, ModelType, Song,
};
pub use provider::{Provider, ProviderCapability};
pub use quality::{AudioQuality, SortPolicy, VideoQuality};
pub use search::{SearchResult, SearchType};
