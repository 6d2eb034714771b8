//! # Library
//!
//! Registry of providers and the cross-provider operations built on top of
//! it: search fan-out, media preparation, standby resolution and URI
//! resolution.
//!
//! ## Standby resolution
//!
//! When the owner of a song cannot serve playable media, other providers are
//! searched for `"<title> <artists_name>"`. The top two songs of every
//! provider are scored against the origin (see [`crate::similarity`]) and
//! the best ones that actually have media are returned.
//!
//! ```text
//!             ┌──────────┐   search   ┌────────────┐
//!   origin ──>│ Library  ├───────────>│ provider B │──┐
//!             │          ├───────────>│ provider C │──┤ top 2 each
//!             └────┬─────┘            └────────────┘  │
//!                  │  score, sort, prepare media      │
//!                  │<─────────────────────────────────┘
//!                  v
//!        [(standby, media), ...]
//! ```

use bridge_traits::Media;
use core_runtime::config::{
    CoreConfig, DEFAULT_AUDIO_SELECT_POLICY, DEFAULT_SEARCH_TIMEOUT, DEFAULT_STANDBY_TIMEOUT,
};
use core_runtime::Signal;
use futures::stream::{self, BoxStream, FuturesUnordered};
use futures::StreamExt;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::TtlCache;
use crate::error::{LibraryError, Result};
use crate::models::{
    BriefAlbum, BriefArtist, BriefPlaylist, BriefSong, BriefVideo, Lyric, Model, ModelIdentity,
    ModelKey, ModelState, ModelType, User,
};
use crate::provider::{Provider, ProviderCapability};
use crate::quality::SortPolicy;
use crate::search::{SearchResult, SearchType};
use crate::similarity::{normalized_standby_score, score_standby, FULL_SCORE};
use crate::uri;

/// Songs taken from each provider's search result when looking for a standby.
const STANDBY_PER_PROVIDER: usize = 2;

/// Lyric URLs handed out by providers stay valid for about this long.
const LYRIC_TTL_MINUTES: i64 = 20;

pub struct Library {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    standby_sources: RwLock<Vec<String>>,
    audio_select_policy: RwLock<String>,
    search_timeout: Duration,
    standby_timeout: Duration,
    lyric_cache: TtlCache<ModelKey, Option<Lyric>>,

    /// Emitted with the provider id after registration.
    pub provider_added: Signal<String>,
    /// Emitted with the provider id after deregistration.
    pub provider_removed: Signal<String>,
}

impl Default for Library {
    fn default() -> Self {
        Self::new(
            Vec::new(),
            DEFAULT_AUDIO_SELECT_POLICY,
            DEFAULT_SEARCH_TIMEOUT,
            DEFAULT_STANDBY_TIMEOUT,
        )
    }
}

impl Library {
    pub fn new(
        standby_sources: Vec<String>,
        audio_select_policy: &str,
        search_timeout: Duration,
        standby_timeout: Duration,
    ) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            standby_sources: RwLock::new(standby_sources),
            audio_select_policy: RwLock::new(audio_select_policy.to_string()),
            search_timeout,
            standby_timeout,
            lyric_cache: TtlCache::new(),
            provider_added: Signal::new("library.provider_added"),
            provider_removed: Signal::new("library.provider_removed"),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.standby_sources.clone(),
            &config.audio_select_policy,
            config.search_timeout,
            config.standby_timeout,
        )
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let id = provider.identifier().to_string();
        {
            let mut providers = self.providers.write();
            if providers.iter().any(|p| p.identifier() == id) {
                return Err(LibraryError::ProviderAlreadyExists(id));
            }
            providers.push(provider);
        }
        info!(provider = %id, "Provider registered");
        self.provider_added.emit(id);
        Ok(())
    }

    /// Returns `false` when no provider with that id was registered.
    pub fn deregister(&self, identifier: &str) -> bool {
        let removed = {
            let mut providers = self.providers.write();
            let before = providers.len();
            providers.retain(|p| p.identifier() != identifier);
            providers.len() != before
        };
        if removed {
            info!(provider = %identifier, "Provider deregistered");
            self.provider_removed.emit(identifier.to_string());
        }
        removed
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.identifier() == identifier)
            .cloned()
    }

    pub fn list(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.read().clone()
    }

    fn require(&self, identifier: &str) -> Result<Arc<dyn Provider>> {
        self.get(identifier)
            .ok_or_else(|| LibraryError::ProviderNotFound(identifier.to_string()))
    }

    pub fn standby_sources(&self) -> Vec<String> {
        self.standby_sources.read().clone()
    }

    pub fn set_standby_sources(&self, sources: Vec<String>) {
        *self.standby_sources.write() = sources;
    }

    pub fn audio_select_policy(&self) -> String {
        self.audio_select_policy.read().clone()
    }

    pub fn set_audio_select_policy(&self, policy: &str) -> Result<()> {
        SortPolicy::parse(policy)?;
        *self.audio_select_policy.write() = policy.to_string();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    fn search_targets(
        &self,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
    ) -> Vec<(Arc<dyn Provider>, SearchType)> {
        let types: Vec<SearchType> = if type_in.is_empty() {
            vec![SearchType::Song]
        } else {
            type_in.to_vec()
        };
        self.list()
            .into_iter()
            .filter(|p| {
                source_in
                    .map(|sources| sources.iter().any(|s| s == p.identifier()))
                    .unwrap_or(true)
            })
            .flat_map(|p| types.iter().map(move |t| (Arc::clone(&p), *t)))
            .collect()
    }

    /// Search providers one after another, yielding each result as it
    /// arrives. A failing provider is logged and skipped.
    pub fn search(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
    ) -> BoxStream<'static, SearchResult> {
        let keyword = keyword.to_string();
        stream::iter(self.search_targets(type_in, source_in))
            .then(move |(provider, search_type)| {
                let keyword = keyword.clone();
                async move {
                    let result = provider.search(&keyword, search_type).await;
                    log_search_failure(provider.identifier(), &keyword, result)
                }
            })
            .filter_map(futures::future::ready)
            .boxed()
    }

    /// Search every provider concurrently and yield results in completion
    /// order. Providers still running when `timeout` (default: the
    /// configured search timeout) elapses are dropped.
    pub fn a_search(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> BoxStream<'static, SearchResult> {
        let timeout = timeout.unwrap_or(self.search_timeout);
        let keyword = keyword.to_string();
        let pending: FuturesUnordered<_> = self
            .search_targets(type_in, source_in)
            .into_iter()
            .map(|(provider, search_type)| {
                let keyword = keyword.clone();
                async move {
                    let result = provider.search(&keyword, search_type).await;
                    log_search_failure(provider.identifier(), &keyword, result)
                }
            })
            .collect();

        pending
            .filter_map(futures::future::ready)
            .take_until(async move { tokio::time::sleep(timeout).await })
            .boxed()
    }

    // ------------------------------------------------------------------------
    // Media
    // ------------------------------------------------------------------------

    /// Resolve the playable media of `song` with the configured policy.
    pub async fn song_prepare_media_default(&self, song: &BriefSong) -> Result<Media> {
        let policy = self.audio_select_policy();
        self.song_prepare_media(song, &policy).await
    }

    /// Resolve the playable media of `song`.
    ///
    /// Multi-quality providers select by `policy`. Other providers are asked
    /// for the full song and its direct `url`.
    #[instrument(skip(self, song), fields(song = %song.uri()))]
    pub async fn song_prepare_media(&self, song: &BriefSong, policy: &str) -> Result<Media> {
        let provider = self.get(&song.source).ok_or_else(|| {
            LibraryError::MediaNotFound(format!("provider {} not registered", song.source))
        })?;

        if provider.has_capability(ProviderCapability::SongMultiQuality) {
            let policy = SortPolicy::parse(policy)?;
            let (media, quality) = provider.song_select_media(song, &policy).await?;
            debug!(%quality, url = %media.url, "Media prepared");
            return Ok(media);
        }

        let full = provider
            .song_get(&song.identifier)
            .await
            .map_err(|err| match err {
                LibraryError::NotSupported { .. } | LibraryError::ModelNotFound { .. } => {
                    LibraryError::MediaNotFound(song.uri())
                }
                other => other,
            })?;
        if full.url.is_empty() {
            return Err(LibraryError::MediaNotFound(song.uri()));
        }
        Ok(Media::new(full.url))
    }

    #[instrument(skip(self, video), fields(video = %video.uri()))]
    pub async fn video_prepare_media(&self, video: &BriefVideo, policy: &str) -> Result<Media> {
        let provider = self.require(&video.source)?;
        if !provider.has_capability(ProviderCapability::VideoMultiQuality) {
            return Err(LibraryError::MediaNotFound(video.uri()));
        }
        let policy = SortPolicy::parse(policy)?;
        let (media, _) = provider.video_select_media(video, &policy).await?;
        Ok(media)
    }

    // ------------------------------------------------------------------------
    // Standby
    // ------------------------------------------------------------------------

    fn standby_providers(
        &self,
        origin: &BriefSong,
        source_in: Option<&[String]>,
    ) -> Vec<Arc<dyn Provider>> {
        let configured = self.standby_sources();
        let wanted: Option<Vec<String>> = match source_in {
            Some(sources) => Some(sources.to_vec()),
            None if !configured.is_empty() => Some(configured),
            None => None,
        };
        let candidates: Vec<Arc<dyn Provider>> = match wanted {
            // Keep the configured order, it expresses preference.
            Some(ids) => ids.iter().filter_map(|id| self.get(id)).collect(),
            None => self.list(),
        };
        candidates
            .into_iter()
            .filter(|p| p.identifier() != origin.source)
            .collect()
    }

    async fn search_standby_candidates(
        provider: Arc<dyn Provider>,
        query: String,
        timeout: Duration,
    ) -> Vec<BriefSong> {
        let search = provider.search(&query, SearchType::Song);
        match tokio::time::timeout(timeout, search).await {
            Ok(Ok(result)) => result
                .songs
                .into_iter()
                .take(STANDBY_PER_PROVIDER)
                .collect(),
            Ok(Err(err)) => {
                warn!(provider = %provider.identifier(), error = %err, "Standby search failed");
                Vec::new()
            }
            Err(_) => {
                debug!(provider = %provider.identifier(), "Standby search timed out");
                Vec::new()
            }
        }
    }

    async fn gather_standby_candidates(
        &self,
        origin: &BriefSong,
        source_in: Option<&[String]>,
        concurrent: bool,
    ) -> Vec<BriefSong> {
        let query = format!("{} {}", origin.title, origin.artists_name)
            .trim()
            .to_string();
        let providers = self.standby_providers(origin, source_in);
        let timeout = self.standby_timeout;

        let mut candidates = Vec::new();
        if concurrent {
            let mut pending: FuturesUnordered<_> = providers
                .into_iter()
                .map(|p| Self::search_standby_candidates(p, query.clone(), timeout))
                .collect();
            while let Some(songs) = pending.next().await {
                candidates.extend(songs);
            }
        } else {
            for provider in providers {
                candidates
                    .extend(Self::search_standby_candidates(provider, query.clone(), timeout).await);
            }
        }
        candidates
    }

    fn sort_by_score(origin: &BriefSong, candidates: Vec<BriefSong>) -> Vec<(f64, BriefSong)> {
        let mut scored: Vec<(f64, BriefSong)> = candidates
            .into_iter()
            .map(|c| (score_standby(origin, &c), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored
    }

    async fn pick_standby(
        &self,
        origin: &BriefSong,
        candidates: Vec<BriefSong>,
        onlyone: bool,
    ) -> Vec<BriefSong> {
        let policy = self.audio_select_policy();
        let mut picked = Vec::new();
        for (score, candidate) in Self::sort_by_score(origin, candidates) {
            if self.song_prepare_media(&candidate, &policy).await.is_err() {
                continue;
            }
            picked.push(candidate);
            if score >= FULL_SCORE || onlyone || picked.len() >= 2 {
                break;
            }
        }
        picked
    }

    /// Songs on other providers that can stand in for `song`, best first.
    ///
    /// Providers are searched one after another. At most one song is
    /// returned when `onlyone` is set or an exact match is found, else two.
    #[instrument(skip(self, song), fields(song = %song.uri()))]
    pub async fn list_song_standby(&self, song: &BriefSong, onlyone: bool) -> Vec<BriefSong> {
        let candidates = self.gather_standby_candidates(song, None, false).await;
        self.pick_standby(song, candidates, onlyone).await
    }

    /// Concurrent variant of [`list_song_standby`](Self::list_song_standby).
    #[instrument(skip(self, song), fields(song = %song.uri()))]
    pub async fn a_list_song_standby(&self, song: &BriefSong, onlyone: bool) -> Vec<BriefSong> {
        let candidates = self.gather_standby_candidates(song, None, true).await;
        self.pick_standby(song, candidates, onlyone).await
    }

    /// Standby songs paired with their prepared media.
    ///
    /// Candidates whose normalized score is below `min_score` are ignored;
    /// at most `limit` pairs are returned.
    #[instrument(skip(self, song, source_in), fields(song = %song.uri()))]
    pub async fn a_list_song_standby_v2(
        &self,
        song: &BriefSong,
        audio_select_policy: &str,
        source_in: Option<&[String]>,
        min_score: f64,
        limit: usize,
    ) -> Vec<(BriefSong, Media)> {
        let candidates = self.gather_standby_candidates(song, source_in, true).await;
        let mut found = Vec::new();
        for (_, candidate) in Self::sort_by_score(song, candidates) {
            if found.len() >= limit {
                break;
            }
            let score = normalized_standby_score(song, &candidate);
            if score < min_score {
                debug!(candidate = %candidate.uri(), score, "Standby below threshold");
                continue;
            }
            match self.song_prepare_media(&candidate, audio_select_policy).await {
                Ok(media) => found.push((candidate, media)),
                Err(err) => debug!(candidate = %candidate.uri(), error = %err, "Standby has no media"),
            }
        }
        found
    }

    // ------------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------------

    /// Fetch the normal model `(source, model_type, identifier)`.
    pub async fn model_get(
        &self,
        source: &str,
        model_type: ModelType,
        identifier: &str,
    ) -> Result<Model> {
        let provider = self.require(source)?;
        let model = match model_type {
            ModelType::Song => provider.song_get(identifier).await?.into(),
            ModelType::Album => provider.album_get(identifier).await?.into(),
            ModelType::Artist => provider.artist_get(identifier).await?.into(),
            ModelType::Playlist => provider.playlist_get(identifier).await?.into(),
            ModelType::User => provider.user_get(identifier).await?.into(),
            ModelType::Video => provider.video_get(identifier).await?.into(),
            ModelType::Lyric | ModelType::Comment | ModelType::Dummy => {
                return Err(LibraryError::not_supported(
                    source,
                    &format!("{model_type}_get"),
                ))
            }
        };
        Ok(model)
    }

    /// Replace a brief model with its normal form in place.
    ///
    /// A provider that cannot fetch the model leaves it brief with state
    /// `cant_upgrade`. A model the provider reports missing gets state
    /// `not_exists` and the error is returned.
    pub async fn model_upgrade(&self, model: &mut Model) -> Result<()> {
        if !model.is_brief() {
            return Ok(());
        }
        match self
            .model_get(model.source(), model.model_type(), model.identifier())
            .await
        {
            Ok(mut upgraded) => {
                upgraded.set_state(ModelState::Upgraded);
                *model = upgraded;
                Ok(())
            }
            Err(LibraryError::NotSupported { .. }) => {
                model.set_state(ModelState::CantUpgrade);
                Ok(())
            }
            Err(err @ LibraryError::ModelNotFound { .. }) => {
                model.set_state(ModelState::NotExists);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Map a `fuo://` URI to a model.
    pub async fn resolve(&self, uri: &str) -> Result<Model> {
        let parsed = uri::parse(uri)?;
        if !parsed.path.is_empty() {
            return Err(LibraryError::ResolveFailed(uri.to_string()));
        }
        let key = parsed.key;
        self.require(&key.source)?;
        self.model_get(&key.source, key.model_type, &key.identifier)
            .await
            .map_err(|err| match err {
                LibraryError::NotSupported { .. } => {
                    LibraryError::model_not_found(key.uri(), "provider cannot fetch it")
                }
                other => other,
            })
    }

    pub async fn song_get_lyric(&self, song: &BriefSong) -> Result<Option<Lyric>> {
        let key = song.key();
        if let Some(cached) = self.lyric_cache.get(&key) {
            return Ok(cached);
        }
        let provider = self.require(&song.source)?;
        let lyric = provider.song_get_lyric(song).await?;
        self.lyric_cache.insert(
            key,
            lyric.clone(),
            Some(chrono::Duration::minutes(LYRIC_TTL_MINUTES)),
        );
        Ok(lyric)
    }

    pub async fn album_list_songs(&self, album: &BriefAlbum) -> Result<Vec<BriefSong>> {
        self.require(&album.source)?.album_list_songs(album).await
    }

    pub async fn artist_list_albums(&self, artist: &BriefArtist) -> Result<Vec<BriefAlbum>> {
        self.require(&artist.source)?
            .artist_list_albums(&artist.identifier)
            .await
    }

    pub async fn playlist_list_songs(&self, playlist: &BriefPlaylist) -> Result<Vec<BriefSong>> {
        self.require(&playlist.source)?
            .playlist_list_songs(playlist)
            .await
    }

    pub async fn current_user(&self, source: &str) -> Result<User> {
        self.require(source)?.current_user().await
    }
}

fn log_search_failure(
    provider: &str,
    keyword: &str,
    result: Result<SearchResult>,
) -> Option<SearchResult> {
    match result {
        Ok(result) => Some(result),
        Err(err) if err.is_not_supported() => {
            debug!(%provider, "Provider does not support search");
            None
        }
        Err(err) => {
            warn!(%provider, %keyword, error = %err, "Search failed");
            None
        }
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .providers
            .read()
            .iter()
            .map(|p| p.identifier().to_string())
            .collect();
        f.debug_struct("Library")
            .field("providers", &ids)
            .field("standby_sources", &*self.standby_sources.read())
            .finish()
    }
}
