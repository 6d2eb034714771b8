//! Domain models for music resources
//!
//! Every resource is owned by a provider and identified by the triple
//! `(source, model_type, identifier)`. Equality and hashing use that triple
//! only, so a brief song fetched from a search result and the same song read
//! back from a persisted playlist are interchangeable.
//!
//! Each resource type comes in two shapes:
//! - a *brief* form holding pre-formatted display strings (`artists_name`,
//!   `duration_ms`) that is cheap to list and to persist;
//! - a *normal* form verified by the provider, with nested brief models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::{LibraryError, Result};

// =============================================================================
// Model Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ModelType {
    Dummy = 0,
    Song = 1,
    Artist = 2,
    Album = 3,
    Playlist = 4,
    Lyric = 5,
    Video = 6,
    User = 17,
    Comment = 18,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Dummy => "dummy",
            ModelType::Song => "song",
            ModelType::Artist => "artist",
            ModelType::Album => "album",
            ModelType::Playlist => "playlist",
            ModelType::Lyric => "lyric",
            ModelType::Video => "video",
            ModelType::User => "user",
            ModelType::Comment => "comment",
        }
    }

    /// Path segment used in `fuo://` URIs.
    pub fn plural(&self) -> &'static str {
        match self {
            ModelType::Dummy => "dummies",
            ModelType::Song => "songs",
            ModelType::Artist => "artists",
            ModelType::Album => "albums",
            ModelType::Playlist => "playlists",
            ModelType::Lyric => "lyrics",
            ModelType::Video => "videos",
            ModelType::User => "users",
            ModelType::Comment => "comments",
        }
    }

    pub fn from_plural(plural: &str) -> Option<Self> {
        Self::all().into_iter().find(|t| t.plural() == plural)
    }

    pub fn all() -> [ModelType; 9] {
        [
            ModelType::Dummy,
            ModelType::Song,
            ModelType::Artist,
            ModelType::Album,
            ModelType::Playlist,
            ModelType::Lyric,
            ModelType::Video,
            ModelType::User,
            ModelType::Comment,
        ]
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Life-cycle state of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Constructed by hand, never confirmed by the provider.
    #[default]
    Artificial,
    Exists,
    NotExists,
    Upgraded,
    CantUpgrade,
}

/// Availability flags of a song's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaFlags(u8);

impl MediaFlags {
    pub const NOT_SURE: MediaFlags = MediaFlags(0x80);
    pub const NOT_EXISTS: MediaFlags = MediaFlags(0);
    pub const SAMPLE: MediaFlags = MediaFlags(1);
    pub const FREE: MediaFlags = MediaFlags(2);
    pub const VIP: MediaFlags = MediaFlags(4);
    pub const PAY: MediaFlags = MediaFlags(8);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        MediaFlags(bits)
    }

    /// `NOT_EXISTS` is the empty set, so it is only contained in itself.
    pub fn contains(&self, other: MediaFlags) -> bool {
        if other.0 == 0 {
            return self.0 == 0;
        }
        self.0 & other.0 == other.0
    }
}

impl Default for MediaFlags {
    fn default() -> Self {
        MediaFlags::NOT_SURE
    }
}

impl BitOr for MediaFlags {
    type Output = MediaFlags;

    fn bitor(self, rhs: MediaFlags) -> MediaFlags {
        MediaFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlbumType {
    #[default]
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "EP")]
    Ep,
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "compilation")]
    Compilation,
    #[serde(rename = "retrospective")]
    Retrospective,
}

impl AlbumType {
    /// Guess the album type from its name.
    pub fn guess_by_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let trimmed = lower.trim_end();

        if trimmed.ends_with(" - single")
            || trimmed.ends_with("(single)")
            || trimmed.ends_with("（single）")
        {
            return AlbumType::Single;
        }
        if trimmed.ends_with(" - ep") {
            return AlbumType::Ep;
        }
        if lower.contains("live") || name.contains("演唱会") || name.contains("音乐会") {
            return AlbumType::Live;
        }
        if trimmed.ends_with("精选") {
            return AlbumType::Retrospective;
        }
        AlbumType::Standard
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumType::Standard => "standard",
            AlbumType::Single => "single",
            AlbumType::Ep => "EP",
            AlbumType::Live => "live",
            AlbumType::Compilation => "compilation",
            AlbumType::Retrospective => "retrospective",
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Global identity of a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub source: String,
    pub model_type: ModelType,
    pub identifier: String,
}

impl ModelKey {
    pub fn new(source: impl Into<String>, model_type: ModelType, identifier: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            model_type,
            identifier: identifier.into(),
        }
    }

    pub fn uri(&self) -> String {
        format!(
            "fuo://{}/{}/{}",
            self.source,
            self.model_type.plural(),
            self.identifier
        )
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Implemented by every model struct.
pub trait ModelIdentity {
    fn model_type(&self) -> ModelType;
    fn source(&self) -> &str;
    fn identifier(&self) -> &str;

    fn key(&self) -> ModelKey {
        ModelKey::new(self.source(), self.model_type(), self.identifier())
    }

    /// Canonical `fuo://<source>/<plural>/<identifier>` reference.
    fn uri(&self) -> String {
        format!(
            "fuo://{}/{}/{}",
            self.source(),
            self.model_type().plural(),
            self.identifier()
        )
    }
}

macro_rules! model_identity {
    ($($ty:ident => $model_type:expr),+ $(,)?) => {
        $(
            impl ModelIdentity for $ty {
                fn model_type(&self) -> ModelType {
                    $model_type
                }

                fn source(&self) -> &str {
                    &self.source
                }

                fn identifier(&self) -> &str {
                    &self.identifier
                }
            }

            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.source == other.source && self.identifier == other.identifier
                }
            }

            impl Eq for $ty {}

            impl Hash for $ty {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.source.hash(state);
                    ($model_type as u8).hash(state);
                    self.identifier.hash(state);
                }
            }

            impl From<$ty> for Model {
                fn from(model: $ty) -> Self {
                    Model::$ty(model)
                }
            }
        )+
    };
}

// =============================================================================
// Helpers
// =============================================================================

/// `[a, b, c]` -> `a, b & c`
pub fn join_artists_name<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => format!("{} & {}", rest.join(", "), last),
    }
}

/// Milliseconds to `MM:SS`, or `HH:MM:SS` for an hour or more.
pub fn format_duration_ms(ms: u64) -> String {
    let total = ms / 1000;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Inverse of [`format_duration_ms`]. `None` for empty or malformed input.
pub fn parse_duration_ms(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parts = text
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let seconds = match parts.as_slice() {
        [m, s] => m * 60 + s,
        [h, m, s] => h * 3600 + m * 60 + s,
        _ => return None,
    };
    Some(seconds * 1000)
}

// =============================================================================
// Songs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefSong {
    pub identifier: String,
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub artists_name: String,
    #[serde(default)]
    pub album_name: String,
    /// `MM:SS` or `HH:MM:SS`
    #[serde(default)]
    pub duration_ms: String,
    #[serde(default)]
    pub state: ModelState,
}

impl BriefSong {
    pub fn new(source: impl Into<String>, identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_artists_name(mut self, artists_name: impl Into<String>) -> Self {
        self.artists_name = artists_name.into();
        self
    }

    pub fn with_album_name(mut self, album_name: impl Into<String>) -> Self {
        self.album_name = album_name.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: impl Into<String>) -> Self {
        self.duration_ms = duration_ms.into();
        self
    }

    /// Duration in milliseconds, `None` when unknown.
    pub fn duration(&self) -> Option<u64> {
        parse_duration_ms(&self.duration_ms).filter(|ms| *ms > 0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Song {
    pub identifier: String,
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub album: Option<BriefAlbum>,
    #[serde(default)]
    pub artists: Vec<BriefArtist>,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub children: Vec<BriefSong>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub track: String,
    #[serde(default)]
    pub disc: String,
    #[serde(default)]
    pub pic_url: String,
    #[serde(default)]
    pub media_flags: MediaFlags,
    /// Direct stream url of providers without multi-quality support.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub state: ModelState,
}

impl Song {
    pub fn artists_name(&self) -> String {
        join_artists_name(self.artists.iter().map(|a| a.name.as_str()))
    }

    pub fn album_name(&self) -> String {
        self.album.as_ref().map(|a| a.name.clone()).unwrap_or_default()
    }

    pub fn duration_ms(&self) -> String {
        format_duration_ms(self.duration)
    }

    pub fn to_brief(&self) -> BriefSong {
        BriefSong {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            title: self.title.clone(),
            artists_name: self.artists_name(),
            album_name: self.album_name(),
            duration_ms: self.duration_ms(),
            state: self.state,
        }
    }
}

// =============================================================================
// Albums / Artists
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefAlbum {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub artists_name: String,
    #[serde(default)]
    pub state: ModelState,
}

impl BriefAlbum {
    pub fn new(source: impl Into<String>, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default, rename = "type")]
    pub type_: AlbumType,
    #[serde(default)]
    pub artists: Vec<BriefArtist>,
    #[serde(default)]
    pub songs: Vec<BriefSong>,
    /// `-1` when unknown
    #[serde(default = "unknown_count")]
    pub song_count: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub released: String,
    #[serde(default)]
    pub state: ModelState,
}

fn unknown_count() -> i64 {
    -1
}

impl Album {
    /// An album whose type is guessed from `name`.
    pub fn new(source: impl Into<String>, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identifier: identifier.into(),
            source: source.into(),
            type_: AlbumType::guess_by_name(&name),
            name,
            cover: String::new(),
            artists: Vec::new(),
            songs: Vec::new(),
            song_count: -1,
            description: String::new(),
            released: String::new(),
            state: ModelState::Artificial,
        }
    }

    pub fn artists_name(&self) -> String {
        join_artists_name(self.artists.iter().map(|a| a.name.as_str()))
    }

    pub fn to_brief(&self) -> BriefAlbum {
        BriefAlbum {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            name: self.name.clone(),
            artists_name: self.artists_name(),
            state: self.state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefArtist {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub state: ModelState,
}

impl BriefArtist {
    pub fn new(source: impl Into<String>, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            name: name.into(),
            state: ModelState::Artificial,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artist {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub pic_url: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub hot_songs: Vec<BriefSong>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: ModelState,
}

impl Artist {
    pub fn to_brief(&self) -> BriefArtist {
        BriefArtist {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            name: self.name.clone(),
            state: self.state,
        }
    }
}

// =============================================================================
// Playlists / Users
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefPlaylist {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub creator_name: String,
    #[serde(default)]
    pub state: ModelState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator: Option<BriefUser>,
    #[serde(default)]
    pub state: ModelState,
}

impl Playlist {
    pub fn creator_name(&self) -> String {
        self.creator.as_ref().map(|u| u.name.clone()).unwrap_or_default()
    }

    pub fn to_brief(&self) -> BriefPlaylist {
        BriefPlaylist {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            name: self.name.clone(),
            creator_name: self.creator_name(),
            state: self.state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefUser {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub state: ModelState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub identifier: String,
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub playlists: Vec<BriefPlaylist>,
    #[serde(default)]
    pub fav_playlists: Vec<BriefPlaylist>,
    #[serde(default)]
    pub state: ModelState,
}

impl User {
    pub fn to_brief(&self) -> BriefUser {
        BriefUser {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            name: self.name.clone(),
            state: self.state,
        }
    }
}

// =============================================================================
// Videos / Lyrics / Comments
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefVideo {
    pub identifier: String,
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub artists_name: String,
    #[serde(default)]
    pub duration_ms: String,
    #[serde(default)]
    pub state: ModelState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    pub identifier: String,
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<BriefArtist>,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub state: ModelState,
}

impl Video {
    pub fn to_brief(&self) -> BriefVideo {
        BriefVideo {
            identifier: self.identifier.clone(),
            source: self.source.clone(),
            title: self.title.clone(),
            artists_name: join_artists_name(self.artists.iter().map(|a| a.name.as_str())),
            duration_ms: format_duration_ms(self.duration),
            state: self.state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lyric {
    pub identifier: String,
    pub source: String,
    /// LRC formatted text
    #[serde(default)]
    pub content: String,
    /// Translation, also LRC
    #[serde(default)]
    pub trans_content: String,
    #[serde(default)]
    pub state: ModelState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefComment {
    pub identifier: String,
    pub source: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub state: ModelState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    pub identifier: String,
    pub source: String,
    pub user: BriefUser,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub liked_count: i64,
    /// Unix timestamp, seconds
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub state: ModelState,
}

model_identity! {
    BriefSong => ModelType::Song,
    Song => ModelType::Song,
    BriefAlbum => ModelType::Album,
    Album => ModelType::Album,
    BriefArtist => ModelType::Artist,
    Artist => ModelType::Artist,
    BriefPlaylist => ModelType::Playlist,
    Playlist => ModelType::Playlist,
    BriefUser => ModelType::User,
    User => ModelType::User,
    BriefVideo => ModelType::Video,
    Video => ModelType::Video,
    Lyric => ModelType::Lyric,
    BriefComment => ModelType::Comment,
    Comment => ModelType::Comment,
}

// =============================================================================
// Model
// =============================================================================

/// Any model, brief or normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    BriefSong(BriefSong),
    Song(Song),
    BriefAlbum(BriefAlbum),
    Album(Album),
    BriefArtist(BriefArtist),
    Artist(Artist),
    BriefPlaylist(BriefPlaylist),
    Playlist(Playlist),
    BriefUser(BriefUser),
    User(User),
    BriefVideo(BriefVideo),
    Video(Video),
    Lyric(Lyric),
    BriefComment(BriefComment),
    Comment(Comment),
}

macro_rules! each_model {
    ($model:expr, $m:ident => $body:expr) => {
        match $model {
            Model::BriefSong($m) => $body,
            Model::Song($m) => $body,
            Model::BriefAlbum($m) => $body,
            Model::Album($m) => $body,
            Model::BriefArtist($m) => $body,
            Model::Artist($m) => $body,
            Model::BriefPlaylist($m) => $body,
            Model::Playlist($m) => $body,
            Model::BriefUser($m) => $body,
            Model::User($m) => $body,
            Model::BriefVideo($m) => $body,
            Model::Video($m) => $body,
            Model::Lyric($m) => $body,
            Model::BriefComment($m) => $body,
            Model::Comment($m) => $body,
        }
    };
}

impl ModelIdentity for Model {
    fn model_type(&self) -> ModelType {
        each_model!(self, m => m.model_type())
    }

    fn source(&self) -> &str {
        each_model!(self, m => m.source.as_str())
    }

    fn identifier(&self) -> &str {
        each_model!(self, m => m.identifier.as_str())
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.model_type() == other.model_type()
            && self.source() == other.source()
            && self.identifier() == other.identifier()
    }
}

impl Eq for Model {}

impl Hash for Model {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source().hash(state);
        (self.model_type() as u8).hash(state);
        self.identifier().hash(state);
    }
}

impl Model {
    pub fn state(&self) -> ModelState {
        each_model!(self, m => m.state)
    }

    pub fn set_state(&mut self, state: ModelState) {
        each_model!(self, m => m.state = state)
    }

    pub fn is_brief(&self) -> bool {
        matches!(
            self,
            Model::BriefSong(_)
                | Model::BriefAlbum(_)
                | Model::BriefArtist(_)
                | Model::BriefPlaylist(_)
                | Model::BriefUser(_)
                | Model::BriefVideo(_)
                | Model::BriefComment(_)
        )
    }

    /// Value of a display field, e.g. `artists_name`.
    ///
    /// Normal models compute it from their nested models; brief models return
    /// the stored preview. Unknown fields render as an empty string.
    pub fn display_field(&self, field: &str) -> String {
        let field = field.strip_suffix("_display").unwrap_or(field);
        match (self, field) {
            (Model::BriefSong(s), "title") => s.title.clone(),
            (Model::BriefSong(s), "artists_name") => s.artists_name.clone(),
            (Model::BriefSong(s), "album_name") => s.album_name.clone(),
            (Model::BriefSong(s), "duration_ms") => s.duration_ms.clone(),
            (Model::Song(s), "title") => s.title.clone(),
            (Model::Song(s), "artists_name") => s.artists_name(),
            (Model::Song(s), "album_name") => s.album_name(),
            (Model::Song(s), "duration_ms") => s.duration_ms(),
            (Model::BriefAlbum(a), "name") => a.name.clone(),
            (Model::BriefAlbum(a), "artists_name") => a.artists_name.clone(),
            (Model::Album(a), "name") => a.name.clone(),
            (Model::Album(a), "artists_name") => a.artists_name(),
            (Model::BriefArtist(a), "name") => a.name.clone(),
            (Model::Artist(a), "name") => a.name.clone(),
            (Model::BriefPlaylist(p), "name") => p.name.clone(),
            (Model::BriefPlaylist(p), "creator_name") => p.creator_name.clone(),
            (Model::Playlist(p), "name") => p.name.clone(),
            (Model::Playlist(p), "creator_name") => p.creator_name(),
            (Model::BriefUser(u), "name") => u.name.clone(),
            (Model::User(u), "name") => u.name.clone(),
            (Model::BriefVideo(v), "title") => v.title.clone(),
            (Model::BriefVideo(v), "artists_name") => v.artists_name.clone(),
            (Model::BriefVideo(v), "duration_ms") => v.duration_ms.clone(),
            (Model::Video(v), "title") => v.title.clone(),
            (Model::Video(v), "artists_name") => v.to_brief().artists_name,
            (Model::Video(v), "duration_ms") => format_duration_ms(v.duration),
            (Model::BriefComment(c), "user_name") => c.user_name.clone(),
            (Model::BriefComment(c), "content") => c.content.clone(),
            (Model::Comment(c), "user_name") => c.user.name.clone(),
            (Model::Comment(c), "content") => c.content.clone(),
            _ => String::new(),
        }
    }

    /// Brief song of a song model.
    pub fn as_brief_song(&self) -> Option<BriefSong> {
        match self {
            Model::BriefSong(s) => Some(s.clone()),
            Model::Song(s) => Some(s.to_brief()),
            _ => None,
        }
    }

    /// Short human readable label used after `#` in plain listings.
    pub fn summary(&self) -> String {
        match self.model_type() {
            ModelType::Song => [
                self.display_field("title"),
                self.display_field("artists_name"),
                self.display_field("album_name"),
                self.display_field("duration_ms"),
            ]
            .join(" - "),
            ModelType::Album => format!(
                "{} - {}",
                self.display_field("name"),
                self.display_field("artists_name")
            ),
            ModelType::Video => format!(
                "{} - {}",
                self.display_field("title"),
                self.display_field("artists_name")
            ),
            ModelType::Playlist | ModelType::Artist | ModelType::User => {
                self.display_field("name")
            }
            ModelType::Comment => self.display_field("content"),
            ModelType::Lyric | ModelType::Dummy => String::new(),
        }
    }
}

impl FromStr for ModelType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        ModelType::all()
            .into_iter()
            .find(|t| t.as_str() == s || t.plural() == s)
            .ok_or_else(|| LibraryError::ResolveFailed(format!("unknown model type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_model_json_shape() {
        let model = Model::from(BriefSong::new("local", "1", "Blue").with_artists_name("Alice"));
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["kind"], "brief_song");
        assert_eq!(value["identifier"], "1");
        assert_eq!(value["artists_name"], "Alice");
        assert_eq!(serde_json::to_value(MediaFlags::SAMPLE).unwrap(), 1);

        // Listing fields may be absent in stored payloads.
        let stored = r#"{"kind": "brief_song", "identifier": "2", "source": "local", "title": "Red"}"#;
        let Model::BriefSong(song) = serde_json::from_str(stored).unwrap() else {
            panic!("expected a brief song");
        };
        assert_eq!(song.title, "Red");
        assert!(song.artists_name.is_empty());
    }

    #[test]
    fn test_identity_equality() {
        let a = BriefSong::new("local", "1", "Song A");
        let b = BriefSong::new("local", "1", "Renamed");
        let c = BriefSong::new("netease", "1", "Song A");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_model_equality_includes_type() {
        let song: Model = BriefSong::new("local", "1", "x").into();
        let album: Model = BriefAlbum::new("local", "1", "x").into();
        let full: Model = Song {
            identifier: "1".into(),
            source: "local".into(),
            ..Song::default()
        }
        .into();
        assert_ne!(song, album);
        assert_eq!(song, full);
    }

    #[test]
    fn test_uri() {
        let song = BriefSong::new("local", "42", "x");
        assert_eq!(song.uri(), "fuo://local/songs/42");
        assert_eq!(song.key().to_string(), "fuo://local/songs/42");
        assert_eq!(ModelType::from_plural("albums"), Some(ModelType::Album));
        assert_eq!("playlist".parse::<ModelType>().unwrap(), ModelType::Playlist);
    }

    #[test]
    fn test_model_type_values() {
        assert_eq!(ModelType::Song as u8, 1);
        assert_eq!(ModelType::User as u8, 17);
        assert_eq!(ModelType::Comment as u8, 18);
    }

    #[test]
    fn test_media_flags() {
        let flags = MediaFlags::VIP | MediaFlags::PAY;
        assert!(flags.contains(MediaFlags::VIP));
        assert!(!flags.contains(MediaFlags::FREE));
        assert!(!flags.contains(MediaFlags::NOT_EXISTS));
        assert!(MediaFlags::NOT_EXISTS.contains(MediaFlags::NOT_EXISTS));
        assert_eq!(MediaFlags::default().bits(), 0x80);
    }

    #[test]
    fn test_album_type_guess() {
        assert_eq!(AlbumType::guess_by_name("Hello - Single"), AlbumType::Single);
        assert_eq!(AlbumType::guess_by_name("Hello (Single)"), AlbumType::Single);
        assert_eq!(AlbumType::guess_by_name("Hello（single）"), AlbumType::Single);
        assert_eq!(AlbumType::guess_by_name("Hello - EP"), AlbumType::Ep);
        assert_eq!(AlbumType::guess_by_name("Live at Wembley"), AlbumType::Live);
        assert_eq!(AlbumType::guess_by_name("2004 无与伦比演唱会"), AlbumType::Live);
        assert_eq!(AlbumType::guess_by_name("十年精选"), AlbumType::Retrospective);
        assert_eq!(AlbumType::guess_by_name("Fantasy"), AlbumType::Standard);
        assert_eq!(Album::new("x", "1", "Deep - EP").type_, AlbumType::Ep);
    }

    #[test]
    fn test_artists_name() {
        assert_eq!(join_artists_name([]), "");
        assert_eq!(join_artists_name(["a"]), "a");
        assert_eq!(join_artists_name(["a", "b"]), "a & b");
        assert_eq!(join_artists_name(["a", "b", "c"]), "a, b & c");
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(format_duration_ms(215_000), "03:35");
        assert_eq!(format_duration_ms(3_725_000), "01:02:05");
        assert_eq!(parse_duration_ms("03:35"), Some(215_000));
        assert_eq!(parse_duration_ms("01:02:05"), Some(3_725_000));
        assert_eq!(parse_duration_ms(""), None);
        assert_eq!(parse_duration_ms("abc"), None);
        assert_eq!(BriefSong::new("x", "1", "t").with_duration_ms("00:00").duration(), None);
    }

    #[test]
    fn test_display_fallback() {
        let song = Song {
            identifier: "1".into(),
            source: "local".into(),
            title: "Blue".into(),
            artists: vec![BriefArtist::new("local", "a", "A"), BriefArtist::new("local", "b", "B")],
            album: Some(BriefAlbum::new("local", "al", "Colors")),
            duration: 61_000,
            ..Song::default()
        };
        let model = Model::Song(song.clone());
        assert_eq!(model.display_field("artists_name_display"), "A & B");
        assert_eq!(model.display_field("album_name"), "Colors");
        assert_eq!(model.display_field("missing"), "");

        let brief = Model::BriefSong(song.to_brief());
        assert_eq!(brief.display_field("duration_ms"), "01:01");
        assert_eq!(brief.summary(), "Blue - A & B - Colors - 01:01");
    }
}
