//! Search request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LibraryError, Result};
use crate::models::{BriefAlbum, BriefArtist, BriefPlaylist, BriefSong, BriefVideo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Song,
    Album,
    Artist,
    Playlist,
    Video,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Song => "song",
            SearchType::Album => "album",
            SearchType::Artist => "artist",
            SearchType::Playlist => "playlist",
            SearchType::Video => "video",
        }
    }

    pub fn all() -> [SearchType; 5] {
        [
            SearchType::Song,
            SearchType::Album,
            SearchType::Artist,
            SearchType::Playlist,
            SearchType::Video,
        ]
    }

    /// Parse a comma separated list such as `so,al`.
    pub fn parse_list(text: &str) -> Result<Vec<SearchType>> {
        let mut types = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let t = part.parse::<SearchType>()?;
            if !types.contains(&t) {
                types.push(t);
            }
        }
        Ok(types)
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "song" | "songs" | "so" => Ok(SearchType::Song),
            "album" | "albums" | "al" => Ok(SearchType::Album),
            "artist" | "artists" | "ar" => Ok(SearchType::Artist),
            "playlist" | "playlists" | "pl" => Ok(SearchType::Playlist),
            "video" | "videos" | "vi" => Ok(SearchType::Video),
            other => Err(LibraryError::ResolveFailed(format!(
                "unknown search type '{other}'"
            ))),
        }
    }
}

/// Results of one provider for one keyword and type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: String,
    pub search_type: SearchType,
    #[serde(default)]
    pub songs: Vec<BriefSong>,
    #[serde(default)]
    pub albums: Vec<BriefAlbum>,
    #[serde(default)]
    pub artists: Vec<BriefArtist>,
    #[serde(default)]
    pub playlists: Vec<BriefPlaylist>,
    #[serde(default)]
    pub videos: Vec<BriefVideo>,
}

impl SearchResult {
    pub fn new(source: impl Into<String>, search_type: SearchType) -> Self {
        Self {
            source: source.into(),
            search_type,
            ..Self::default()
        }
    }

    pub fn with_songs(mut self, songs: Vec<BriefSong>) -> Self {
        self.songs = songs;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
            && self.videos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!("so".parse::<SearchType>().unwrap(), SearchType::Song);
        assert_eq!("AL".parse::<SearchType>().unwrap(), SearchType::Album);
        assert_eq!("vi".parse::<SearchType>().unwrap(), SearchType::Video);
        assert!("podcast".parse::<SearchType>().is_err());
    }

    #[test]
    fn test_parse_list_dedups() {
        let types = SearchType::parse_list("so, al,song,,pl").unwrap();
        assert_eq!(
            types,
            [SearchType::Song, SearchType::Album, SearchType::Playlist]
        );
    }

    #[test]
    fn test_result_is_empty() {
        let result = SearchResult::new("local", SearchType::Song);
        assert!(result.is_empty());
        let result = result.with_songs(vec![BriefSong::new("local", "1", "x")]);
        assert!(!result.is_empty());
    }
}
