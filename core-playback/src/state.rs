//! Persisted playback state.
//!
//! A single JSON document written on shutdown and read on startup:
//!
//! ```json
//! {"playback_mode": "loop", "volume": 80, "state": "playing",
//!  "song": "fuo://local/songs/1\t# Blue - A - Colors - 03:35",
//!  "position": 12.5, "playlist": ["..."], "recently_played": ["..."],
//!  "saved_at": "2024-05-01T10:00:00Z"}
//! ```
//!
//! Songs are stored as plain listing lines so a restore does not need to ask
//! any provider. Lines that fail to parse are skipped.

use bridge_traits::EngineState;
use chrono::{DateTime, Utc};
use core_library::models::{BriefSong, ModelIdentity};
use core_library::uri;
use core_runtime::logging::strip_path;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::player::Player;
use crate::playlist::{PlaybackMode, Playlist};
use crate::recently_played::RecentlyPlayed;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub playback_mode: PlaybackMode,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub state: EngineState,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub playlist: Vec<String>,
    #[serde(default)]
    pub recently_played: Vec<String>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

fn default_volume() -> u8 {
    crate::player::DEFAULT_VOLUME
}

fn song_line(song: &BriefSong) -> String {
    let summary = [
        song.title.as_str(),
        song.artists_name.as_str(),
        song.album_name.as_str(),
        song.duration_ms.as_str(),
    ]
    .join(" - ");
    format!("{}\t# {}", song.uri(), summary)
}

fn parse_song_line(line: &str) -> Option<BriefSong> {
    match uri::parse_brief_line(line) {
        Ok(model) => {
            let song = model.as_brief_song();
            if song.is_none() {
                warn!(%line, "Not a song, skipped");
            }
            song
        }
        Err(err) => {
            warn!(%line, error = %err, "Unresolvable song, skipped");
            None
        }
    }
}

impl StateSnapshot {
    pub fn capture(player: &Player, playlist: &Playlist, recently_played: &RecentlyPlayed) -> Self {
        Self {
            playback_mode: playlist.playback_mode(),
            volume: player.volume(),
            state: player.state(),
            song: playlist.current_song().as_ref().map(song_line),
            position: player.position(),
            playlist: playlist.list().iter().map(song_line).collect(),
            recently_played: recently_played.list().iter().map(song_line).collect(),
            saved_at: Some(Utc::now()),
        }
    }

    /// Read a snapshot. A missing file yields `None`.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(file = %strip_path(&path.to_string_lossy()), "No state file");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn dump(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(self)?;
        tokio::fs::write(path, bytes).await?;
        info!(file = %strip_path(&path.to_string_lossy()), "State dumped");
        Ok(())
    }

    /// Apply the snapshot. The saved song is prepared again and playback
    /// resumes from the saved position, paused unless it was playing.
    pub async fn restore(
        &self,
        player: &Player,
        playlist: &std::sync::Arc<Playlist>,
        recently_played: &RecentlyPlayed,
    ) -> Result<()> {
        player.set_volume(i64::from(self.volume))?;
        if let Err(err) = playlist.set_playback_mode(self.playback_mode) {
            warn!(error = %err, "Restoring playback mode failed");
        }

        let songs: Vec<BriefSong> = self.playlist.iter().filter_map(|l| parse_song_line(l)).collect();
        playlist.set_models(songs, false);
        recently_played.init_from(
            self.recently_played
                .iter()
                .filter_map(|l| parse_song_line(l))
                .collect(),
        );

        let Some(song) = self.song.as_deref().and_then(parse_song_line) else {
            return Ok(());
        };
        if self.position > 0.0 {
            player.set_play_range(self.position, None)?;
        }
        if let Some(handle) = playlist.set_current_song(Some(song)) {
            match handle.await {
                Ok(result) => result?,
                Err(err) if err.is_cancelled() => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
        if self.state != EngineState::Playing && player.current_media().is_some() {
            player.pause()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::permissive_engine;
    use bridge_traits::Media;
    use core_library::testing::FakeProvider;
    use core_library::Library;
    use core_runtime::TaskManager;
    use std::sync::Arc;

    fn song(id: &str) -> BriefSong {
        BriefSong::new("fake", id, format!("Song {id}"))
            .with_artists_name("A")
            .with_album_name("Colors")
            .with_duration_ms("03:35")
    }

    #[test]
    fn test_song_line_keeps_display_fields() {
        let line = song_line(&song("1"));
        assert_eq!(line, "fuo://fake/songs/1\t# Song 1 - A - Colors - 03:35");
        let parsed = parse_song_line(&line).unwrap();
        assert_eq!(parsed.title, "Song 1");
        assert_eq!(parsed.artists_name, "A");
        assert_eq!(parsed.duration(), Some(215_000));
        assert!(parse_song_line("fuo://fake/albums/1").is_none());
        assert!(parse_song_line("garbage").is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("fuo-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(StateSnapshot::load(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dump_then_restore() {
        let library = Library::default();
        library
            .register(Arc::new(
                FakeProvider::new("fake")
                    .with_song_media(song("1"), Media::new("http://x/1.mp3"))
                    .with_song_media(song("2"), Media::new("http://x/2.mp3")),
            ))
            .unwrap();
        let tasks = TaskManager::current().unwrap();
        let player = Player::new(Arc::new(permissive_engine()));
        let playlist = Playlist::new(Arc::new(library), Arc::clone(&player), &tasks, "hq<>");
        let recent = RecentlyPlayed::default();

        let snapshot = StateSnapshot {
            playback_mode: PlaybackMode::Random,
            volume: 40,
            state: EngineState::Paused,
            song: Some(song_line(&song("2"))),
            position: 30.0,
            playlist: vec![song_line(&song("1")), "bad line".into(), song_line(&song("2"))],
            recently_played: vec![song_line(&song("2"))],
            saved_at: None,
        };
        let path = std::env::temp_dir().join(format!("fuo-state-{}.json", uuid::Uuid::new_v4()));
        snapshot.dump(&path).await.unwrap();
        let loaded = StateSnapshot::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        loaded.restore(&player, &playlist, &recent).await.unwrap();
        assert_eq!(player.volume(), 40);
        assert_eq!(playlist.playback_mode(), PlaybackMode::Random);
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.current_song().unwrap().identifier, "2");
        assert_eq!(player.state(), EngineState::Paused);
        assert_eq!(recent.len(), 1);

        let captured = StateSnapshot::capture(&player, &playlist, &recent);
        assert_eq!(captured.playlist.len(), 2);
        assert_eq!(captured.volume, 40);
        assert!(captured.saved_at.is_some());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
