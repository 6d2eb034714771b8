//! # Provider Trait
//!
//! A provider owns a namespace of music resources (`source`) and knows how to
//! fetch them: a streaming service, a local folder scanner, a podcast feed.
//! Concrete providers live outside this crate.
//!
//! Every operation has a default implementation that fails with
//! [`LibraryError::NotSupported`], so providers only implement what their
//! backend offers and advertise it through [`Provider::capabilities`].
//!
//! ## Media selection
//!
//! Providers that offer several qualities per song implement
//! [`song_list_quality`](Provider::song_list_quality) and
//! [`song_get_media`](Provider::song_get_media), and report
//! [`ProviderCapability::SongMultiQuality`]. The default
//! [`song_select_media`](Provider::song_select_media) then walks the
//! qualities in the order of a [`SortPolicy`]. Providers without multiple
//! qualities fill [`Song::url`] instead.

use async_trait::async_trait;
use bridge_traits::Media;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{LibraryError, Result};
use crate::models::{
    Album, Artist, BriefAlbum, BriefPlaylist, BriefSong, BriefVideo, Lyric, Playlist, Song,
    User, Video,
};
use crate::quality::{AudioQuality, QualityLevel, SortPolicy, VideoQuality};
use crate::search::{SearchResult, SearchType};

/// Operations a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCapability {
    Search,
    SongGet,
    SongMultiQuality,
    SongLyric,
    AlbumGet,
    AlbumSongs,
    ArtistGet,
    ArtistAlbums,
    PlaylistGet,
    PlaylistSongs,
    UserGet,
    CurrentUser,
    VideoGet,
    VideoMultiQuality,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique id, used as the `source` of every model it owns.
    fn identifier(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str;

    fn capabilities(&self) -> HashSet<ProviderCapability> {
        HashSet::new()
    }

    fn has_capability(&self, capability: ProviderCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn search(&self, _keyword: &str, _search_type: SearchType) -> Result<SearchResult> {
        Err(LibraryError::not_supported(self.identifier(), "search"))
    }

    async fn song_get(&self, _identifier: &str) -> Result<Song> {
        Err(LibraryError::not_supported(self.identifier(), "song_get"))
    }

    async fn song_list_quality(&self, _song: &BriefSong) -> Result<Vec<AudioQuality>> {
        Err(LibraryError::not_supported(self.identifier(), "song_list_quality"))
    }

    /// `None` when the song has no media of that quality.
    async fn song_get_media(
        &self,
        _song: &BriefSong,
        _quality: AudioQuality,
    ) -> Result<Option<Media>> {
        Err(LibraryError::not_supported(self.identifier(), "song_get_media"))
    }

    /// First available media in `policy` order.
    async fn song_select_media(
        &self,
        song: &BriefSong,
        policy: &SortPolicy,
    ) -> Result<(Media, AudioQuality)> {
        let available = self.song_list_quality(song).await?;
        for quality in policy.apply(AudioQuality::LEVELS)? {
            if !available.contains(&quality) {
                continue;
            }
            if let Some(media) = self.song_get_media(song, quality).await? {
                debug!(song = %song.identifier, %quality, "Selected media");
                return Ok((media, quality));
            }
        }
        Err(LibraryError::MediaNotFound(format!(
            "no media for song {} in {}",
            song.identifier,
            self.identifier()
        )))
    }

    async fn song_get_lyric(&self, _song: &BriefSong) -> Result<Option<Lyric>> {
        Err(LibraryError::not_supported(self.identifier(), "song_get_lyric"))
    }

    async fn album_get(&self, _identifier: &str) -> Result<Album> {
        Err(LibraryError::not_supported(self.identifier(), "album_get"))
    }

    async fn album_list_songs(&self, _album: &BriefAlbum) -> Result<Vec<BriefSong>> {
        Err(LibraryError::not_supported(self.identifier(), "album_list_songs"))
    }

    async fn artist_get(&self, _identifier: &str) -> Result<Artist> {
        Err(LibraryError::not_supported(self.identifier(), "artist_get"))
    }

    async fn artist_list_albums(&self, _identifier: &str) -> Result<Vec<BriefAlbum>> {
        Err(LibraryError::not_supported(self.identifier(), "artist_list_albums"))
    }

    async fn playlist_get(&self, _identifier: &str) -> Result<Playlist> {
        Err(LibraryError::not_supported(self.identifier(), "playlist_get"))
    }

    async fn playlist_list_songs(&self, _playlist: &BriefPlaylist) -> Result<Vec<BriefSong>> {
        Err(LibraryError::not_supported(self.identifier(), "playlist_list_songs"))
    }

    async fn user_get(&self, _identifier: &str) -> Result<User> {
        Err(LibraryError::not_supported(self.identifier(), "user_get"))
    }

    /// The logged-in user, [`LibraryError::NoUserLoggedIn`] when anonymous.
    async fn current_user(&self) -> Result<User> {
        Err(LibraryError::not_supported(self.identifier(), "current_user"))
    }

    async fn video_get(&self, _identifier: &str) -> Result<Video> {
        Err(LibraryError::not_supported(self.identifier(), "video_get"))
    }

    async fn video_list_quality(&self, _video: &BriefVideo) -> Result<Vec<VideoQuality>> {
        Err(LibraryError::not_supported(self.identifier(), "video_list_quality"))
    }

    async fn video_get_media(
        &self,
        _video: &BriefVideo,
        _quality: VideoQuality,
    ) -> Result<Option<Media>> {
        Err(LibraryError::not_supported(self.identifier(), "video_get_media"))
    }

    async fn video_select_media(
        &self,
        video: &BriefVideo,
        policy: &SortPolicy,
    ) -> Result<(Media, VideoQuality)> {
        let available = self.video_list_quality(video).await?;
        for quality in policy.apply(VideoQuality::LEVELS)? {
            if !available.contains(&quality) {
                continue;
            }
            if let Some(media) = self.video_get_media(video, quality).await? {
                return Ok((media, quality));
            }
        }
        Err(LibraryError::MediaNotFound(format!(
            "no media for video {} in {}",
            video.identifier,
            self.identifier()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Multi {}

        #[async_trait]
        impl Provider for Multi {
            fn identifier(&self) -> &str;
            fn name(&self) -> &str;
            async fn song_list_quality(&self, song: &BriefSong) -> Result<Vec<AudioQuality>>;
            async fn song_get_media(&self, song: &BriefSong, quality: AudioQuality) -> Result<Option<Media>>;
        }
    }

    fn multi() -> MockMulti {
        let mut provider = MockMulti::new();
        provider.expect_identifier().return_const("qq".to_string());
        provider.expect_name().return_const("QQ".to_string());
        provider
    }

    #[tokio::test]
    async fn test_select_media_follows_policy() {
        let mut provider = multi();
        provider
            .expect_song_list_quality()
            .returning(|_| Ok(vec![AudioQuality::Shq, AudioQuality::Sq]));
        provider
            .expect_song_get_media()
            .with(mockall::predicate::always(), eq(AudioQuality::Sq))
            .times(1)
            .returning(|_, _| Ok(Some(Media::new("http://x/sq.mp3"))));

        let song = BriefSong::new("qq", "1", "x");
        let policy = SortPolicy::parse("hq><").unwrap();
        let (media, quality) = provider.song_select_media(&song, &policy).await.unwrap();
        assert_eq!(quality, AudioQuality::Sq);
        assert_eq!(media.url, "http://x/sq.mp3");
    }

    #[tokio::test]
    async fn test_select_media_skips_missing_media() {
        let mut provider = multi();
        provider
            .expect_song_list_quality()
            .returning(|_| Ok(vec![AudioQuality::Hq, AudioQuality::Lq]));
        provider
            .expect_song_get_media()
            .returning(|_, quality| match quality {
                AudioQuality::Hq => Ok(None),
                _ => Ok(Some(Media::new("http://x/lq.mp3"))),
            });

        let song = BriefSong::new("qq", "1", "x");
        let policy = SortPolicy::parse("hq<>").unwrap();
        let (_, quality) = provider.song_select_media(&song, &policy).await.unwrap();
        assert_eq!(quality, AudioQuality::Lq);
    }

    #[tokio::test]
    async fn test_select_media_not_found() {
        let mut provider = multi();
        provider.expect_song_list_quality().returning(|_| Ok(vec![]));

        let song = BriefSong::new("qq", "1", "x");
        let policy = SortPolicy::parse(">>>").unwrap();
        let err = provider.song_select_media(&song, &policy).await.unwrap_err();
        assert!(err.is_media_not_found());
    }

    #[tokio::test]
    async fn test_defaults_are_not_supported() {
        let provider = multi();
        assert!(!provider.has_capability(ProviderCapability::Search));
        let err = provider.search("x", SearchType::Song).await.unwrap_err();
        assert!(err.is_not_supported());
        assert!(provider.current_user().await.unwrap_err().is_not_supported());
    }
}
