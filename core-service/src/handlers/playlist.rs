//! Playlist commands: `list`, `clear`, `add`, `remove`, `next`, `previous`.

use core_library::models::{BriefSong, Model, ModelIdentity};
use core_library::uri;
use core_runtime::TaskHandle;
use std::sync::Arc;
use tracing::debug;

use crate::app::App;
use crate::error::{Result, ServiceError};
use crate::serializers::Output;

pub fn list(app: &Arc<App>) -> Output {
    Output::Models(app.playlist.list().into_iter().map(Model::from).collect())
}

pub fn clear(app: &Arc<App>) -> Output {
    app.playlist.clear();
    Output::Empty
}

/// Songs referred to by one listing line. Albums and playlists expand to
/// their songs.
async fn songs_of(app: &App, line: &str) -> Result<Vec<BriefSong>> {
    let songs = match uri::parse_brief_line(line)? {
        Model::BriefSong(song) => vec![song],
        Model::Song(song) => vec![song.to_brief()],
        Model::BriefAlbum(album) => app.library.album_list_songs(&album).await?,
        Model::BriefPlaylist(playlist) => app.library.playlist_list_songs(&playlist).await?,
        model => {
            return Err(ServiceError::handler(format!(
                "can't add a {} model: {}",
                model.model_type().as_str(),
                model.uri()
            )))
        }
    };
    Ok(songs)
}

/// Every argument may hold several lines when it comes from a heredoc.
pub async fn add(app: &Arc<App>, uris: &[String]) -> Result<Output> {
    let lines = uris
        .iter()
        .flat_map(|arg| arg.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty());
    for line in lines {
        for song in songs_of(app, line).await? {
            app.playlist.add(song);
        }
    }
    Ok(Output::Empty)
}

pub fn remove(app: &Arc<App>, line: &str) -> Result<Output> {
    let model = uri::parse_brief_line(line)?;
    let song = model
        .as_brief_song()
        .ok_or_else(|| ServiceError::handler(format!("not a song: {}", model.uri())))?;
    app.playlist.remove(&song);
    Ok(Output::Empty)
}

async fn wait(handle: Option<TaskHandle<core_playback::Result<()>>>) -> Result<Output> {
    if let Some(handle) = handle {
        match handle.await {
            Ok(result) => result?,
            Err(err) if err.is_cancelled() => debug!("Superseded by a newer song"),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(Output::Empty)
}

pub async fn next(app: &Arc<App>) -> Result<Output> {
    wait(app.playlist.next()).await
}

pub async fn previous(app: &Arc<App>) -> Result<Output> {
    wait(app.playlist.previous()).await
}
