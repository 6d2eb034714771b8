//! Machine oriented output.
//!
//! Models become JSON objects carrying their own fields plus `__type__`,
//! `provider`, `identifier` and `uri`; nested models are tagged the same
//! way.

use core_library::models::{Model, ModelIdentity};
use core_library::SearchResult;
use serde_json::{json, Map, Value};

use super::{Output, ProviderInfo, StatusReport};
use crate::error::Result;

fn type_name(model: &Model) -> &'static str {
    match model {
        Model::BriefSong(_) => "feeluown.library.BriefSongModel",
        Model::Song(_) => "feeluown.library.SongModel",
        Model::BriefAlbum(_) => "feeluown.library.BriefAlbumModel",
        Model::Album(_) => "feeluown.library.AlbumModel",
        Model::BriefArtist(_) => "feeluown.library.BriefArtistModel",
        Model::Artist(_) => "feeluown.library.ArtistModel",
        Model::BriefPlaylist(_) => "feeluown.library.BriefPlaylistModel",
        Model::Playlist(_) => "feeluown.library.PlaylistModel",
        Model::BriefUser(_) => "feeluown.library.BriefUserModel",
        Model::User(_) => "feeluown.library.UserModel",
        Model::BriefVideo(_) => "feeluown.library.BriefVideoModel",
        Model::Video(_) => "feeluown.library.VideoModel",
        Model::Lyric(_) => "feeluown.library.LyricModel",
        Model::BriefComment(_) => "feeluown.library.BriefCommentModel",
        Model::Comment(_) => "feeluown.library.CommentModel",
    }
}

/// Nested fields holding models, with the model kind they hold.
fn nested_fields(model: &Model) -> &'static [(&'static str, &'static str)] {
    match model {
        Model::Song(_) => &[("album", "brief_album"), ("artists", "brief_artist"), ("children", "brief_song")],
        Model::Album(_) => &[("artists", "brief_artist"), ("songs", "brief_song")],
        Model::Artist(_) => &[("hot_songs", "brief_song")],
        Model::Playlist(_) => &[("creator", "brief_user")],
        Model::User(_) => &[("playlists", "brief_playlist"), ("fav_playlists", "brief_playlist")],
        Model::Video(_) => &[("artists", "brief_artist")],
        Model::Comment(_) => &[("user", "brief_user")],
        _ => &[],
    }
}

fn tag(object: &mut Map<String, Value>, model: &Model) {
    object.remove("kind");
    object.remove("state");
    object.insert("__type__".into(), Value::from(type_name(model)));
    object.insert("provider".into(), Value::from(model.source()));
    object.insert("identifier".into(), Value::from(model.identifier()));
    object.insert("uri".into(), Value::from(model.uri()));
}

/// Re-read a nested object as a model of `kind` and tag it.
fn tag_nested(value: &mut Value, kind: &str) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                tag_nested(item, kind)?;
            }
        }
        Value::Object(object) => {
            let mut tagged = object.clone();
            tagged.insert("kind".into(), Value::from(kind));
            let nested: Model = serde_json::from_value(Value::Object(tagged))?;
            tag(object, &nested);
        }
        _ => {}
    }
    Ok(())
}

pub fn model_json(model: &Model) -> Result<Value> {
    let mut value = serde_json::to_value(model)?;
    if let Value::Object(object) = &mut value {
        for (field, kind) in nested_fields(model) {
            if let Some(nested) = object.get_mut(*field) {
                tag_nested(nested, kind)?;
            }
        }
        tag(object, model);
    }
    Ok(value)
}

fn models_json<T: Clone + Into<Model>>(models: &[T]) -> Result<Value> {
    models
        .iter()
        .map(|m| model_json(&m.clone().into()))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn providers_json(providers: &[ProviderInfo]) -> Value {
    providers
        .iter()
        .map(|p| {
            json!({
                "identifier": p.identifier,
                "name": p.name,
                "uri": p.uri(),
            })
        })
        .collect()
}

fn status_json(status: &StatusReport) -> Result<Value> {
    let mut object = Map::new();
    object.insert("repeat".into(), Value::from(status.repeat()));
    object.insert("random".into(), Value::from(status.random()));
    object.insert("playback_mode".into(), Value::from(status.playback_mode.as_str()));
    object.insert("volume".into(), Value::from(status.volume));
    object.insert("state".into(), Value::from(status.state.as_str()));
    if let Some(now) = &status.now_playing {
        object.insert("duration".into(), Value::from(now.duration));
        object.insert("position".into(), Value::from(now.position));
        object.insert("song".into(), model_json(&now.song.clone().into())?);
        object.insert("lyric-s".into(), Value::from(now.lyric_sentence.as_str()));
    }
    Ok(Value::Object(object))
}

fn search_json(results: &[SearchResult]) -> Result<Value> {
    let mut items = Vec::with_capacity(results.len());
    for result in results {
        let mut object = Map::new();
        object.insert("source".into(), Value::from(result.source.as_str()));
        let lists = [
            ("songs", models_json(&result.songs)?),
            ("albums", models_json(&result.albums)?),
            ("artists", models_json(&result.artists)?),
            ("playlists", models_json(&result.playlists)?),
            ("videos", models_json(&result.videos)?),
        ];
        for (key, list) in lists {
            if list.as_array().map(|a| !a.is_empty()).unwrap_or(false) {
                object.insert(key.into(), list);
            }
        }
        items.push(Value::Object(object));
    }
    Ok(Value::Array(items))
}

pub fn render(output: &Output) -> Result<String> {
    let value = match output {
        Output::Empty => return Ok(String::new()),
        Output::Text(text) => Value::from(text.as_str()),
        Output::Model(model) => model_json(model)?,
        Output::Models(models) => models_json(models)?,
        Output::Providers(providers) => providers_json(providers),
        Output::Status(status) => status_json(status)?,
        Output::Search(results) => search_json(results)?,
        Output::Json(value) => value.clone(),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializers::NowPlaying;
    use bridge_traits::EngineState;
    use core_library::models::{BriefAlbum, BriefArtist, BriefSong, Song};
    use core_library::SearchType;
    use core_playback::PlaybackMode;

    #[test]
    fn test_model_is_tagged() {
        let song = Song {
            identifier: "1".into(),
            source: "local".into(),
            title: "Blue".into(),
            album: Some(BriefAlbum::new("local", "9", "Colors")),
            artists: vec![BriefArtist::new("local", "3", "A")],
            ..Song::default()
        };
        let value = model_json(&song.into()).unwrap();
        assert_eq!(value["__type__"], "feeluown.library.SongModel");
        assert_eq!(value["uri"], "fuo://local/songs/1");
        assert_eq!(value["provider"], "local");
        assert_eq!(value["title"], "Blue");
        assert!(value.get("kind").is_none());
        assert_eq!(value["album"]["__type__"], "feeluown.library.BriefAlbumModel");
        assert_eq!(value["album"]["uri"], "fuo://local/albums/9");
        assert_eq!(value["artists"][0]["uri"], "fuo://local/artists/3");
    }

    #[test]
    fn test_status_object() {
        let status = StatusReport {
            playback_mode: PlaybackMode::Random,
            volume: 50,
            state: EngineState::Paused,
            now_playing: Some(NowPlaying {
                duration: 10.0,
                position: 2.0,
                song: BriefSong::new("local", "1", "Blue"),
                lyric_sentence: String::new(),
            }),
        };
        let text = render(&Output::Status(status)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["random"], true);
        assert_eq!(value["repeat"], false);
        assert_eq!(value["state"], "paused");
        assert_eq!(value["song"]["__type__"], "feeluown.library.BriefSongModel");
        assert_eq!(value["lyric-s"], "");
    }

    #[test]
    fn test_search_skips_empty_lists() {
        let result = SearchResult {
            source: "local".into(),
            search_type: SearchType::Song,
            songs: vec![BriefSong::new("local", "1", "Blue")],
            albums: vec![],
            artists: vec![],
            playlists: vec![],
            videos: vec![],
        };
        let value: Value = serde_json::from_str(&render(&Output::Search(vec![result])).unwrap()).unwrap();
        assert_eq!(value[0]["source"], "local");
        assert_eq!(value[0]["songs"][0]["title"], "Blue");
        assert!(value[0].get("albums").is_none());
    }

    #[test]
    fn test_empty_is_empty_string() {
        assert_eq!(render(&Output::Empty).unwrap(), "");
        assert_eq!(render(&Output::Text("hi".into())).unwrap(), "\"hi\"");
    }
}
