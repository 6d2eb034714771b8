//! `play`, `pause`, `resume`, `toggle` and `stop`.

use bridge_traits::Media;
use core_library::models::{BriefSong, Model, ModelIdentity};
use core_library::similarity::text_ratio;
use core_library::{uri, SearchType};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::app::App;
use crate::error::{Result, ServiceError};
use crate::serializers::plain::model_line;
use crate::serializers::Output;

/// How well `song` matches a free text `keyword`, out of 100.
///
/// Half of the score is the similarity ratio between the keyword and the
/// song's `title artists album`; the other half is lost by fractions for
/// each word of the keyword the song does not contain.
pub fn keyword_score(keyword: &str, song: &BriefSong) -> i64 {
    let target = format!("{} {} {}", song.title, song.artists_name, song.album_name);
    let s1 = (text_ratio(keyword, &target) * 50.0) as i64;

    let parts: Vec<&str> = keyword
        .split(" - ")
        .flat_map(|p| p.split('-'))
        .flat_map(|p| p.split(' '))
        .filter(|p| !p.is_empty())
        .collect();
    let mut s2 = 50;
    if !parts.is_empty() {
        let penalty = 50 / parts.len() as i64;
        for part in &parts {
            if !target.contains(part) {
                s2 -= penalty;
            }
        }
    }
    s1 + s2
}

#[instrument(skip(app))]
pub async fn play(app: &Arc<App>, target: &str) -> Result<Output> {
    if target.starts_with(uri::SCHEME) {
        play_uri(app, target).await?;
        Ok(Output::Empty)
    } else if target.starts_with("http") {
        app.player.play(Media::new(target), false)?;
        Ok(Output::Empty)
    } else {
        play_keyword(app, target).await
    }
}

async fn play_uri(app: &Arc<App>, target: &str) -> Result<()> {
    match uri::parse_brief_line(target)? {
        model @ (Model::BriefSong(_) | Model::Song(_)) => {
            app.playlist.play_model(model).await?;
        }
        Model::BriefPlaylist(playlist) => {
            let songs = app.library.playlist_list_songs(&playlist).await?;
            info!(playlist = %playlist.uri(), songs = songs.len(), "Playing playlist");
            if let Some(handle) = app.playlist.set_models(songs, true) {
                match handle.await {
                    Ok(result) => result?,
                    Err(err) if err.is_cancelled() => debug!("Superseded by a newer song"),
                    Err(err) => return Err(err.into()),
                }
            }
            app.player.resume()?;
        }
        model => {
            return Err(ServiceError::handler(format!(
                "can't play a {} model: {}",
                model.model_type().as_str(),
                model.uri()
            )))
        }
    }
    Ok(())
}

async fn play_keyword(app: &Arc<App>, keyword: &str) -> Result<Output> {
    let mut results = app
        .library
        .a_search(keyword, &[SearchType::Song], None, None);
    let mut seen_sources = HashSet::new();
    let mut songs = Vec::new();
    while let Some(result) = results.next().await {
        if let Some(song) = result.songs.into_iter().next() {
            if seen_sources.insert(song.source.clone()) {
                songs.push(song);
            }
        }
    }
    if songs.is_empty() {
        return Ok(Output::Text("No song has been found.".into()));
    }

    let mut scored: Vec<(i64, BriefSong)> = songs
        .into_iter()
        .map(|song| (keyword_score(keyword, &song), song))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let best = scored[0].1.clone();
    app.playlist.play_model(best.clone().into()).await?;

    let mut text = format!("select:\t{}\n", model_line(&best.into(), 0));
    let options: Vec<String> = scored
        .into_iter()
        .skip(1)
        .map(|(_, song)| format!("\t{}", model_line(&song.into(), 0)))
        .collect();
    text.push_str("options::");
    for option in options {
        text.push('\n');
        text.push_str(&option);
    }
    Ok(Output::Text(text))
}

pub fn pause(app: &Arc<App>) -> Result<Output> {
    app.player.pause()?;
    Ok(Output::Empty)
}

pub fn resume(app: &Arc<App>) -> Result<Output> {
    app.player.resume()?;
    Ok(Output::Empty)
}

pub fn toggle(app: &Arc<App>) -> Result<Output> {
    app.player.toggle()?;
    Ok(Output::Empty)
}

pub fn stop(app: &Arc<App>) -> Result<Output> {
    app.player.stop()?;
    Ok(Output::Empty)
}
