//! Metadata records shown by now-playing integrations.
//!
//! [`MetadataAssembler`] cooks a basic record from the brief song right away
//! and then tries to enrich it (artwork, release date) from the provider.
//! Every enrichment step is best-effort: a slow or failing provider leaves
//! the field empty.

use core_library::models::{BriefAlbum, BriefSong, BriefVideo, Model, ModelIdentity, ModelType};
use core_library::Library;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Time allowed for each provider lookup while assembling metadata.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artwork: String,
    #[serde(default)]
    pub released: String,
}

impl Metadata {
    /// Build a record from tags read by the media engine.
    pub fn from_engine_tags(tags: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| {
                    tags.iter()
                        .find(|(tag, _)| tag.eq_ignore_ascii_case(k))
                        .map(|(_, v)| v.clone())
                })
                .unwrap_or_default()
        };
        let artist = get(&["artist", "album_artist"]);
        Self {
            title: get(&["title"]),
            artists: if artist.is_empty() { Vec::new() } else { vec![artist] },
            album: get(&["album"]),
            released: get(&["date", "year"]),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub struct MetadataAssembler {
    library: Arc<Library>,
    timeout: Duration,
}

impl MetadataAssembler {
    pub fn new(library: Arc<Library>) -> Self {
        Self {
            library,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Metadata available without asking the provider.
    pub fn basic_for_song(song: &BriefSong) -> Metadata {
        Metadata {
            uri: song.uri(),
            source: song.source.clone(),
            title: song.title.clone(),
            artists: vec![song.artists_name.clone()],
            album: song.album_name.clone(),
            ..Metadata::default()
        }
    }

    async fn fetch(&self, source: &str, model_type: ModelType, identifier: &str) -> Option<Model> {
        let lookup = self.library.model_get(source, model_type, identifier);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(model)) => Some(model),
            Ok(Err(err)) if err.is_model_not_found() || err.is_not_supported() => {
                debug!(%source, %identifier, error = %err, "No metadata from provider");
                None
            }
            Ok(Err(err)) => {
                warn!(%source, %identifier, error = %err, "Fetching metadata failed");
                None
            }
            Err(_) => {
                warn!(%source, %identifier, "Fetching metadata timed out");
                None
            }
        }
    }

    async fn fetch_from_song(&self, song: &BriefSong) -> (String, String, Option<BriefAlbum>) {
        match self
            .fetch(&song.source, ModelType::Song, &song.identifier)
            .await
        {
            Some(Model::Song(full)) => (full.pic_url, full.date, full.album),
            _ => (String::new(), String::new(), None),
        }
    }

    async fn fetch_from_album(&self, album: &BriefAlbum) -> (String, String) {
        match self
            .fetch(&album.source, ModelType::Album, &album.identifier)
            .await
        {
            Some(Model::Album(full)) => (full.cover, full.released),
            _ => (String::new(), String::new()),
        }
    }

    /// Basic metadata enriched with artwork and release date.
    ///
    /// The album's cover and release date are preferred over the song's when
    /// the song lacks either of them.
    pub async fn prepare_for_song(&self, song: &BriefSong) -> Metadata {
        let mut metadata = Self::basic_for_song(song);
        let (mut artwork, mut released, album) = self.fetch_from_song(song).await;
        if artwork.is_empty() || released.is_empty() {
            if let Some(album) = album {
                let (cover, album_released) = self.fetch_from_album(&album).await;
                if !cover.is_empty() {
                    artwork = cover;
                }
                if !album_released.is_empty() {
                    released = album_released;
                }
            }
        }
        metadata.artwork = artwork;
        metadata.released = released;
        metadata
    }

    pub async fn prepare_for_video(&self, video: &BriefVideo) -> Metadata {
        let mut metadata = Metadata {
            uri: video.uri(),
            source: video.source.clone(),
            title: video.title.clone(),
            ..Metadata::default()
        };
        if let Some(Model::Video(full)) = self
            .fetch(&video.source, ModelType::Video, &video.identifier)
            .await
        {
            metadata.artwork = full.cover;
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::{Album, Song};
    use core_library::{Provider, Result as LibraryResult};
    use async_trait::async_trait;

    struct Catalogue;

    #[async_trait]
    impl Provider for Catalogue {
        fn identifier(&self) -> &str {
            "cat"
        }

        fn name(&self) -> &str {
            "Catalogue"
        }

        async fn song_get(&self, identifier: &str) -> LibraryResult<Song> {
            Ok(Song {
                identifier: identifier.into(),
                source: "cat".into(),
                title: "Blue".into(),
                album: Some(BriefAlbum::new("cat", "a1", "Colors")),
                date: "2001".into(),
                ..Song::default()
            })
        }

        async fn album_get(&self, identifier: &str) -> LibraryResult<Album> {
            let mut album = Album::new("cat", identifier, "Colors");
            album.cover = "http://cat/cover.jpg".into();
            Ok(album)
        }
    }

    fn library() -> Arc<Library> {
        let library = Library::default();
        library.register(Arc::new(Catalogue)).unwrap();
        Arc::new(library)
    }

    #[test]
    fn test_basic_metadata() {
        let song = BriefSong::new("cat", "1", "Blue")
            .with_artists_name("A, B")
            .with_album_name("Colors");
        let metadata = MetadataAssembler::basic_for_song(&song);
        assert_eq!(metadata.uri, "fuo://cat/songs/1");
        assert_eq!(metadata.artists, ["A, B"]);
        assert!(metadata.artwork.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_for_song_uses_album_cover() {
        let assembler = MetadataAssembler::new(library());
        let metadata = assembler
            .prepare_for_song(&BriefSong::new("cat", "1", "Blue"))
            .await;
        assert_eq!(metadata.artwork, "http://cat/cover.jpg");
        assert_eq!(metadata.released, "2001");
    }

    #[tokio::test]
    async fn test_prepare_tolerates_missing_provider() {
        let assembler = MetadataAssembler::new(library());
        let metadata = assembler
            .prepare_for_song(&BriefSong::new("gone", "1", "Blue"))
            .await;
        assert_eq!(metadata.title, "Blue");
        assert!(metadata.artwork.is_empty());
    }

    #[test]
    fn test_engine_tags() {
        let tags: HashMap<String, String> = [("TITLE", "Blue"), ("Artist", "A"), ("date", "2001")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let metadata = Metadata::from_engine_tags(&tags);
        assert_eq!(metadata.title, "Blue");
        assert_eq!(metadata.artists, ["A"]);
        assert_eq!(metadata.released, "2001");
        assert!(Metadata::default().is_empty());
    }
}
