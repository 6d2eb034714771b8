//! In-memory provider for tests of this crate and its dependents.
//!
//! Enabled for downstream crates through the `test-util` feature.

use async_trait::async_trait;
use bridge_traits::Media;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{LibraryError, Result};
use crate::models::{BriefAlbum, BriefArtist, BriefSong, Lyric, ModelIdentity, Song, User};
use crate::provider::{Provider, ProviderCapability};
use crate::quality::AudioQuality;
use crate::search::{SearchResult, SearchType};

/// Provider backed by a fixed catalogue.
///
/// Search matches songs whose title contains any word of the keyword,
/// ignoring case. By default media is served through the multi-quality
/// path with a single `hq` level; [`legacy`](Self::legacy) switches to
/// `Song::url`.
pub struct FakeProvider {
    identifier: String,
    multi_quality: bool,
    song_get_supported: bool,
    songs: Vec<BriefSong>,
    full_songs: HashMap<String, Song>,
    media: HashMap<String, Media>,
    media_errors: HashMap<String, LibraryError>,
    lyrics: HashMap<String, String>,
    search_error: Option<LibraryError>,
    search_delay: Option<Duration>,
    user: Option<User>,
    search_calls: AtomicUsize,
    media_calls: AtomicUsize,
    lyric_calls: AtomicUsize,
    last_keyword: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            multi_quality: true,
            song_get_supported: true,
            songs: Vec::new(),
            full_songs: HashMap::new(),
            media: HashMap::new(),
            media_errors: HashMap::new(),
            lyrics: HashMap::new(),
            search_error: None,
            search_delay: None,
            user: None,
            search_calls: AtomicUsize::new(0),
            media_calls: AtomicUsize::new(0),
            lyric_calls: AtomicUsize::new(0),
            last_keyword: Mutex::new(None),
        }
    }

    pub fn with_song(mut self, song: BriefSong) -> Self {
        self.songs.push(song);
        self
    }

    pub fn with_song_media(mut self, song: BriefSong, media: Media) -> Self {
        self.media.insert(song.identifier.clone(), media);
        self.songs.push(song);
        self
    }

    /// Serve `song` from `song_get` as is.
    pub fn with_full_song(mut self, song: Song) -> Self {
        self.songs.push(song.to_brief());
        self.full_songs.insert(song.identifier.clone(), song);
        self
    }

    /// Fail media preparation of `song_id` with `err`.
    pub fn with_media_error(mut self, song_id: &str, err: LibraryError) -> Self {
        self.media_errors.insert(song_id.to_string(), err);
        self
    }

    pub fn with_lyric(mut self, song_id: &str, content: &str) -> Self {
        self.lyrics.insert(song_id.to_string(), content.to_string());
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn failing_search(mut self, err: LibraryError) -> Self {
        self.search_error = Some(err);
        self
    }

    pub fn legacy(mut self) -> Self {
        self.multi_quality = false;
        self
    }

    pub fn without_song_get(mut self) -> Self {
        self.song_get_supported = false;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn media_calls(&self) -> usize {
        self.media_calls.load(Ordering::SeqCst)
    }

    pub fn lyric_calls(&self) -> usize {
        self.lyric_calls.load(Ordering::SeqCst)
    }

    pub fn last_keyword(&self) -> Option<String> {
        self.last_keyword.lock().clone()
    }

    fn find(&self, identifier: &str) -> Option<&BriefSong> {
        self.songs.iter().find(|s| s.identifier == identifier)
    }

    fn expand(&self, brief: &BriefSong) -> Song {
        let artists = brief
            .artists_name
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| BriefArtist::new(&self.identifier, name, name))
            .collect();
        let album = (!brief.album_name.is_empty())
            .then(|| BriefAlbum::new(&self.identifier, &brief.album_name, &brief.album_name));
        Song {
            identifier: brief.identifier.clone(),
            source: brief.source.clone(),
            title: brief.title.clone(),
            album,
            artists,
            duration: brief.duration().unwrap_or(0),
            url: self
                .media
                .get(&brief.identifier)
                .map(|m| m.url.clone())
                .unwrap_or_default(),
            ..Song::default()
        }
    }

    fn media_for(&self, identifier: &str) -> Result<Option<Media>> {
        self.media_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.media_errors.get(identifier) {
            return Err(err.clone());
        }
        Ok(self.media.get(identifier).cloned())
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn name(&self) -> &str {
        &self.identifier
    }

    fn capabilities(&self) -> HashSet<ProviderCapability> {
        let mut caps: HashSet<_> = [ProviderCapability::Search, ProviderCapability::SongLyric]
            .into_iter()
            .collect();
        if self.song_get_supported {
            caps.insert(ProviderCapability::SongGet);
        }
        if self.multi_quality {
            caps.insert(ProviderCapability::SongMultiQuality);
        }
        if self.user.is_some() {
            caps.insert(ProviderCapability::CurrentUser);
        }
        caps
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> Result<SearchResult> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_keyword.lock() = Some(keyword.to_string());
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.search_error {
            return Err(err.clone());
        }
        let words: Vec<String> = keyword.split_whitespace().map(str::to_lowercase).collect();
        let songs = if search_type == SearchType::Song {
            self.songs
                .iter()
                .filter(|s| {
                    let title = s.title.to_lowercase();
                    words.iter().any(|w| title.contains(w.as_str()))
                })
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Ok(SearchResult::new(&self.identifier, search_type).with_songs(songs))
    }

    async fn song_get(&self, identifier: &str) -> Result<Song> {
        if !self.song_get_supported {
            return Err(LibraryError::not_supported(&self.identifier, "song_get"));
        }
        if let Some(song) = self.full_songs.get(identifier) {
            return Ok(song.clone());
        }
        match self.find(identifier) {
            Some(brief) => {
                if let Some(err) = self.media_errors.get(identifier) {
                    return Err(err.clone());
                }
                Ok(self.expand(brief))
            }
            None => Err(LibraryError::model_not_found(
                format!("fuo://{}/songs/{}", self.identifier, identifier),
                "no such song",
            )),
        }
    }

    async fn song_list_quality(&self, song: &BriefSong) -> Result<Vec<AudioQuality>> {
        if !self.multi_quality {
            return Err(LibraryError::not_supported(&self.identifier, "song_list_quality"));
        }
        if self.media.contains_key(&song.identifier)
            || self.media_errors.contains_key(&song.identifier)
        {
            Ok(vec![AudioQuality::Hq])
        } else {
            Ok(Vec::new())
        }
    }

    async fn song_get_media(
        &self,
        song: &BriefSong,
        _quality: AudioQuality,
    ) -> Result<Option<Media>> {
        self.media_for(&song.identifier)
    }

    async fn song_get_lyric(&self, song: &BriefSong) -> Result<Option<Lyric>> {
        self.lyric_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lyrics.get(&song.identifier).map(|content| Lyric {
            identifier: song.identifier.clone(),
            source: song.source().to_string(),
            content: content.clone(),
            ..Lyric::default()
        }))
    }

    async fn current_user(&self) -> Result<User> {
        self.user
            .clone()
            .ok_or_else(|| LibraryError::NoUserLoggedIn(self.identifier.clone()))
    }
}
