//! `fuo://` URI parsing and reversing.
//!
//! A model URI looks like `fuo://<source>/<plural>/<identifier>`, optionally
//! followed by a sub-resource path (`/lyric`, `/songs`, ...) and a trailing
//! ` # comment` that plain listings append for humans:
//!
//! ```text
//! fuo://local/songs/42/lyric
//! fuo://netease/songs/1001	# Blue - A & B - Colors - 03:35
//! ```

use crate::error::{LibraryError, Result};
use crate::models::{
    BriefAlbum, BriefArtist, BriefPlaylist, BriefSong, BriefUser, BriefVideo, Model,
    ModelIdentity, ModelKey, ModelState, ModelType,
};

pub const SCHEME: &str = "fuo://";

/// A parsed model URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub key: ModelKey,
    /// Sub-resource path without leading slash, e.g. `lyric`; empty for the
    /// model itself.
    pub path: String,
    /// Text after `#`, trimmed.
    pub comment: Option<String>,
}

/// Split `line` into the URI part and an optional trailing comment.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.find('#') {
        Some(idx) => {
            let comment = line[idx + 1..].trim();
            (
                line[..idx].trim(),
                if comment.is_empty() { None } else { Some(comment) },
            )
        }
        None => (line.trim(), None),
    }
}

/// Parse a model URI, tolerating a trailing ` # comment`.
pub fn parse(line: &str) -> Result<ModelUri> {
    let (uri, comment) = split_comment(line);
    let invalid = || LibraryError::ResolveFailed(uri.to_string());
    let rest = uri.strip_prefix(SCHEME).ok_or_else(invalid)?;
    if rest.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let mut parts = rest.splitn(4, '/');
    let source = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let model_type = parts
        .next()
        .and_then(ModelType::from_plural)
        .ok_or_else(invalid)?;
    let identifier = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let path = parts.next().unwrap_or_default().trim_end_matches('/');

    Ok(ModelUri {
        key: ModelKey::new(source, model_type, identifier),
        path: path.to_string(),
        comment: comment.map(str::to_string),
    })
}

/// Canonical URI of `model`, with an optional sub-resource path.
pub fn reverse<M: ModelIdentity + ?Sized>(model: &M, path: Option<&str>) -> String {
    match path {
        Some(path) if !path.is_empty() => {
            format!("{}/{}", model.uri(), path.trim_start_matches('/'))
        }
        _ => model.uri(),
    }
}

/// Build a brief model from a plain listing line.
///
/// The comment is split on ` - ` into the brief display fields of the model
/// type, so `fuo://x/songs/1 # t - a - al - 03:00` keeps its title, artists,
/// album and duration without asking the provider.
pub fn parse_brief_line(line: &str) -> Result<Model> {
    let parsed = parse(line)?;
    if !parsed.path.is_empty() {
        return Err(LibraryError::ResolveFailed(line.trim().to_string()));
    }
    let fields: Vec<String> = parsed
        .comment
        .as_deref()
        .map(|c| c.split(" - ").map(|f| f.trim().to_string()).collect())
        .unwrap_or_default();
    let field = |idx: usize| fields.get(idx).cloned().unwrap_or_default();
    let ModelKey {
        source,
        model_type,
        identifier,
    } = parsed.key;

    let model = match model_type {
        ModelType::Song => Model::BriefSong(BriefSong {
            identifier,
            source,
            title: field(0),
            artists_name: field(1),
            album_name: field(2),
            duration_ms: field(3),
            state: ModelState::Artificial,
        }),
        ModelType::Album => Model::BriefAlbum(BriefAlbum {
            identifier,
            source,
            name: field(0),
            artists_name: field(1),
            state: ModelState::Artificial,
        }),
        ModelType::Artist => Model::BriefArtist(BriefArtist {
            identifier,
            source,
            name: field(0),
            state: ModelState::Artificial,
        }),
        ModelType::Playlist => Model::BriefPlaylist(BriefPlaylist {
            identifier,
            source,
            name: field(0),
            creator_name: field(1),
            state: ModelState::Artificial,
        }),
        ModelType::User => Model::BriefUser(BriefUser {
            identifier,
            source,
            name: field(0),
            state: ModelState::Artificial,
        }),
        ModelType::Video => Model::BriefVideo(BriefVideo {
            identifier,
            source,
            title: field(0),
            artists_name: field(1),
            duration_ms: field(2),
            state: ModelState::Artificial,
        }),
        ModelType::Lyric | ModelType::Comment | ModelType::Dummy => {
            return Err(LibraryError::ResolveFailed(line.trim().to_string()))
        }
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_uri() {
        let uri = parse("fuo://local/songs/42").unwrap();
        assert_eq!(uri.key, ModelKey::new("local", ModelType::Song, "42"));
        assert_eq!(uri.path, "");
        assert_eq!(uri.comment, None);
    }

    #[test]
    fn test_parse_sub_path_and_comment() {
        let uri = parse("fuo://netease/songs/1001/lyric  # Blue - A").unwrap();
        assert_eq!(uri.key.source, "netease");
        assert_eq!(uri.path, "lyric");
        assert_eq!(uri.comment.as_deref(), Some("Blue - A"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("http://local/songs/1").is_err());
        assert!(parse("fuo://local/tracks/1").is_err());
        assert!(parse("fuo://local/songs").is_err());
    }

    #[test]
    fn test_reverse() {
        let song = BriefSong::new("local", "1", "x");
        assert_eq!(reverse(&song, None), "fuo://local/songs/1");
        assert_eq!(reverse(&song, Some("/lyric")), "fuo://local/songs/1/lyric");
    }

    #[test]
    fn test_parse_brief_line() {
        let model =
            parse_brief_line("fuo://local/songs/1\t# Blue - A & B - Colors - 03:35").unwrap();
        match model {
            Model::BriefSong(song) => {
                assert_eq!(song.title, "Blue");
                assert_eq!(song.artists_name, "A & B");
                assert_eq!(song.album_name, "Colors");
                assert_eq!(song.duration_ms, "03:35");
            }
            other => panic!("unexpected {other:?}"),
        }

        let bare = parse_brief_line("fuo://local/albums/9").unwrap();
        assert_eq!(bare.model_type(), ModelType::Album);
        assert!(parse_brief_line("fuo://local/songs/1/lyric").is_err());
    }
}
