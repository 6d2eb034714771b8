//! Human oriented text.
//!
//! ```text
//!       repeat:  true
//!       random:  false
//!       volume:  100
//!        state:  playing
//!         song:  fuo://local/songs/1	# 晴天 - 周杰伦
//! ```
//!
//! A list field is written as `key::` followed by one line per model,
//! indented past the keys. Model lines pad the URI to the longest one of the
//! list and fit titles to a fixed number of display columns, so CJK text
//! stays aligned.

use core_library::models::{Model, ModelIdentity, ModelType};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{Output, ProviderInfo, StatusReport};

enum Field {
    Scalar(String),
    Line(Model),
    Lines(Vec<Model>),
}

fn scalar(value: impl ToString) -> Field {
    Field::Scalar(value.to_string())
}

fn float(value: f64) -> Field {
    Field::Scalar(format!("{value:?}"))
}

fn lines<T: Clone + Into<Model>>(models: &[T]) -> Field {
    Field::Lines(models.iter().cloned().map(Into::into).collect())
}

/// Truncate or pad `text` to `width` display columns.
///
/// Text that does not fit is cut and ends with `…`; when a wide character
/// would straddle the limit, a space pads the gap.
pub fn fit_text(text: &str, width: usize, filling: bool) -> String {
    let text_width = UnicodeWidthStr::width(text);
    if text_width <= width {
        if filling {
            return format!("{text}{}", " ".repeat(width - text_width));
        }
        return text.to_string();
    }

    let remain = width.saturating_sub(1);
    let mut fitted = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > remain {
            break;
        }
        fitted.push(c);
        used += w;
    }
    if used == remain {
        fitted.push('…');
    } else {
        fitted.push_str(" …");
    }
    fitted
}

/// One-line form of a model.
pub fn model_line(model: &Model, uri_length: usize) -> String {
    let uri = format!("{:<width$}", model.uri(), width = uri_length);
    let field = |name: &str, width: usize| fit_text(&model.display_field(name), width, false);
    match model.model_type() {
        ModelType::Song | ModelType::Video => format!(
            "{uri}\t# {} - {}",
            field("title", 18),
            field("artists_name", 20)
        ),
        ModelType::Album => format!(
            "{uri}\t# {} - {}",
            field("name", 18),
            field("artists_name", 20)
        ),
        ModelType::Artist | ModelType::Playlist | ModelType::User => {
            format!("{uri}\t# {}", field("name", 40))
        }
        ModelType::Comment => format!(
            "{uri}\t# {} - {}",
            field("user_name", 18),
            field("content", 40)
        ),
        ModelType::Lyric | ModelType::Dummy => uri.trim_end().to_string(),
    }
}

fn model_lines(models: &[Model]) -> String {
    let uri_length = models.iter().map(|m| m.uri().len()).max().unwrap_or(0);
    models
        .iter()
        .map(|m| model_line(m, uri_length))
        .collect::<Vec<_>>()
        .join("\n")
}

fn model_items(model: &Model) -> Vec<(&'static str, Field)> {
    let mut items = vec![
        ("provider", scalar(model.source())),
        ("identifier", scalar(model.identifier())),
        ("uri", scalar(model.uri())),
    ];
    match model {
        Model::BriefSong(s) => items.extend([
            ("title", scalar(&s.title)),
            ("artists_name", scalar(&s.artists_name)),
            ("album_name", scalar(&s.album_name)),
            ("duration_ms", scalar(&s.duration_ms)),
        ]),
        Model::Song(s) => items.extend([
            ("title", scalar(&s.title)),
            ("duration", scalar(s.duration)),
            (
                "album",
                s.album
                    .clone()
                    .map(|a| Field::Line(a.into()))
                    .unwrap_or_else(|| scalar("null")),
            ),
            ("artists", lines(&s.artists)),
            ("genre", scalar(&s.genre)),
            ("date", scalar(&s.date)),
            ("track", scalar(&s.track)),
            ("disc", scalar(&s.disc)),
            ("pic_url", scalar(&s.pic_url)),
        ]),
        Model::BriefAlbum(a) => items.extend([
            ("name", scalar(&a.name)),
            ("artists_name", scalar(&a.artists_name)),
        ]),
        Model::Album(a) => items.extend([
            ("name", scalar(&a.name)),
            ("type", scalar(a.type_.as_str())),
            ("artists", lines(&a.artists)),
            ("songs", lines(&a.songs)),
            ("song_count", scalar(a.song_count)),
            ("released", scalar(&a.released)),
            ("cover", scalar(&a.cover)),
            ("description", scalar(&a.description)),
        ]),
        Model::BriefArtist(a) => items.push(("name", scalar(&a.name))),
        Model::Artist(a) => items.extend([
            ("name", scalar(&a.name)),
            ("aliases", scalar(a.aliases.join(", "))),
            ("songs", lines(&a.hot_songs)),
            ("pic_url", scalar(&a.pic_url)),
            ("description", scalar(&a.description)),
        ]),
        Model::BriefPlaylist(p) => items.extend([
            ("name", scalar(&p.name)),
            ("creator_name", scalar(&p.creator_name)),
        ]),
        Model::Playlist(p) => items.extend([
            ("name", scalar(&p.name)),
            (
                "creator",
                p.creator
                    .clone()
                    .map(|u| Field::Line(u.into()))
                    .unwrap_or_else(|| scalar("null")),
            ),
            ("cover", scalar(&p.cover)),
            ("description", scalar(&p.description)),
        ]),
        Model::BriefUser(u) => items.push(("name", scalar(&u.name))),
        Model::User(u) => items.extend([
            ("name", scalar(&u.name)),
            ("avatar_url", scalar(&u.avatar_url)),
            ("playlists", lines(&u.playlists)),
            ("fav_playlists", lines(&u.fav_playlists)),
        ]),
        Model::BriefVideo(v) => items.extend([
            ("title", scalar(&v.title)),
            ("artists_name", scalar(&v.artists_name)),
            ("duration_ms", scalar(&v.duration_ms)),
        ]),
        Model::Video(v) => items.extend([
            ("title", scalar(&v.title)),
            ("duration", scalar(v.duration)),
            ("artists", lines(&v.artists)),
            ("cover", scalar(&v.cover)),
        ]),
        Model::Lyric(l) => items.extend([
            ("content", scalar(&l.content)),
            ("trans_content", scalar(&l.trans_content)),
        ]),
        Model::BriefComment(c) => items.extend([
            ("user_name", scalar(&c.user_name)),
            ("content", scalar(&c.content)),
        ]),
        Model::Comment(c) => items.extend([
            ("user", Field::Line(c.user.clone().into())),
            ("content", scalar(&c.content)),
            ("liked_count", scalar(c.liked_count)),
            ("time", scalar(c.time)),
        ]),
    }
    items
}

fn status_items(status: &StatusReport) -> Vec<(&'static str, Field)> {
    let mut items = vec![
        ("repeat", scalar(status.repeat())),
        ("random", scalar(status.random())),
        ("playback_mode", scalar(status.playback_mode)),
        ("volume", scalar(status.volume)),
        ("state", scalar(status.state.as_str())),
    ];
    if let Some(now) = &status.now_playing {
        items.extend([
            ("duration", float(now.duration)),
            ("position", float(now.position)),
            ("song", Field::Line(now.song.clone().into())),
            ("lyric-s", scalar(&now.lyric_sentence)),
        ]);
    }
    items
}

fn serialize_items(items: &[(&str, Field)]) -> String {
    let key_length = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let indent = " ".repeat(key_length + 4);
    let mut text = Vec::with_capacity(items.len());
    for (key, value) in items {
        match value {
            Field::Scalar(value) => {
                text.push(format!("{key:>width$}:  {value}", width = key_length + 1));
            }
            Field::Line(model) => {
                text.push(format!(
                    "{key:>width$}:  {}",
                    model_line(model, 0),
                    width = key_length + 1
                ));
            }
            Field::Lines(models) => {
                text.push(format!("{key:>key_length$}::"));
                if !models.is_empty() {
                    for line in model_lines(models).lines() {
                        text.push(format!("{indent}{line}"));
                    }
                }
            }
        }
    }
    text.join("\n")
}

fn provider_lines(providers: &[ProviderInfo]) -> String {
    let uri_length = providers.iter().map(|p| p.uri().len()).max().unwrap_or(0);
    providers
        .iter()
        .map(|p| format!("{:<uri_length$}\t# {}", p.uri(), p.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render(output: &Output) -> String {
    match output {
        Output::Empty => String::new(),
        Output::Text(text) => text.clone(),
        Output::Model(model) => serialize_items(&model_items(model)),
        Output::Models(models) => model_lines(models),
        Output::Providers(providers) => provider_lines(providers),
        Output::Status(status) => serialize_items(&status_items(status)),
        Output::Search(results) => {
            let models: Vec<Model> = results
                .iter()
                .flat_map(|r| {
                    r.songs
                        .iter()
                        .cloned()
                        .map(Model::from)
                        .chain(r.albums.iter().cloned().map(Model::from))
                        .chain(r.artists.iter().cloned().map(Model::from))
                        .chain(r.playlists.iter().cloned().map(Model::from))
                        .chain(r.videos.iter().cloned().map(Model::from))
                })
                .collect();
            model_lines(&models)
        }
        Output::Json(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}
