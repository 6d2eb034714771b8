//! # Playlist
//!
//! The coordination layer between what the user wants to hear, what the
//! library can serve and what the player is playing.
//!
//! ## State
//!
//! - `songs`: ordered, deduplicated song list
//! - `bad_songs`: songs whose last playback attempt failed, always a subset
//!   of `songs`
//! - `current_song`: `None` or an element of `songs`
//! - `playback_mode` / `mode`; in [`PlaylistMode::Fm`] the playback mode is
//!   always [`PlaybackMode::Sequential`]
//!
//! State lives behind one mutex which is never held across an `.await` or a
//! signal emission.
//!
//! ## Changing the current song
//!
//! [`Playlist::set_current_song`] binds the preemptive task
//! `playlist.set_current_model`, so a newer request cancels an older one
//! still preparing media. The task resolves media through the library:
//!
//! ```text
//! prepare media ── ok ──────────────> commit(song, media)
//!      │
//!      ├─ MediaNotFound ─> mark bad ─> standby found? ─ yes ─> commit(standby, media)
//!      │                                     │                 (inserted after song)
//!      │                                     └─ no ──> commit(song, none)
//!      └─ other error ───> mark bad ─> next
//! ```
//!
//! A commit emits `song_changed` and then `song_changed_v2`. The player
//! follows `song_changed_v2`; the playlist never drives the engine itself.

use bridge_traits::Media;
use core_library::models::{BriefSong, Model, ModelIdentity};
use core_library::similarity::STANDBY_DEFAULT_MIN_SCORE;
use core_library::Library;
use core_runtime::{Delivery, PreemptiveTaskSpec, Signal, TaskHandle, TaskManager};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::metadata::MetadataAssembler;
use crate::player::Player;

pub const SET_CURRENT_SONG_TASK: &str = "playlist.set_current_model";

// ============================================================================
// Modes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    OneLoop,
    Sequential,
    #[default]
    Loop,
    Random,
}

impl PlaybackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::OneLoop => "one_loop",
            PlaybackMode::Sequential => "sequential",
            PlaybackMode::Loop => "loop",
            PlaybackMode::Random => "random",
        }
    }

    fn wraps(&self) -> bool {
        matches!(self, PlaybackMode::Loop | PlaybackMode::OneLoop)
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackMode {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "one_loop" => Ok(PlaybackMode::OneLoop),
            "sequential" => Ok(PlaybackMode::Sequential),
            "loop" => Ok(PlaybackMode::Loop),
            "random" => Ok(PlaybackMode::Random),
            other => Err(PlaybackError::InvalidState(format!(
                "unknown playback mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistMode {
    #[default]
    Normal,
    Fm,
}

impl PlaylistMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistMode::Normal => "normal",
            PlaylistMode::Fm => "fm",
        }
    }
}

impl fmt::Display for PlaylistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Default)]
struct PlaylistState {
    songs: Vec<BriefSong>,
    bad_songs: Vec<BriefSong>,
    current_song: Option<BriefSong>,
    playback_mode: PlaybackMode,
    mode: PlaylistMode,
    audio_select_policy: String,
}

impl PlaylistState {
    fn index_of(&self, song: &BriefSong) -> Option<usize> {
        self.songs.iter().position(|s| s == song)
    }

    fn is_bad(&self, song: &BriefSong) -> bool {
        self.bad_songs.contains(song)
    }

    fn current_index(&self) -> Option<usize> {
        self.current_song.as_ref().and_then(|s| self.index_of(s))
    }

    /// First song that is not bad, walking from `base` in `direction`.
    ///
    /// A negative `base` counts from the end. With `wrap` the walk continues
    /// past the end of the list back to `base`. With `random` a good song
    /// on that walk is picked uniformly.
    fn good_song(
        &self,
        base: isize,
        direction: Direction,
        random: bool,
        wrap: bool,
    ) -> Option<BriefSong> {
        let n = self.songs.len();
        if n == 0 || n <= self.bad_songs.len() {
            debug!("No good song in playlist");
            return None;
        }
        let base = if base < 0 { n as isize + base } else { base };
        let base = base.clamp(0, n as isize) as usize;

        let order: Vec<usize> = match (direction, wrap) {
            (Direction::Forward, true) => (base..n).chain(0..base).collect(),
            (Direction::Forward, false) => (base..n).collect(),
            (Direction::Backward, true) => {
                let start = base.min(n - 1);
                (0..=start).rev().chain((start + 1..n).rev()).collect()
            }
            (Direction::Backward, false) => (0..=base.min(n - 1)).rev().collect(),
        };
        let good: Vec<&BriefSong> = order
            .into_iter()
            .map(|i| &self.songs[i])
            .filter(|s| !self.is_bad(s))
            .collect();
        if random {
            good.choose(&mut rand::thread_rng()).map(|s| (*s).clone())
        } else {
            good.first().map(|s| (*s).clone())
        }
    }

    fn next_song(&self) -> Option<BriefSong> {
        let Some(index) = self.current_index() else {
            return self.good_song(0, Direction::Forward, false, true);
        };
        if self.playback_mode == PlaybackMode::Random {
            return self.good_song(0, Direction::Forward, true, true);
        }
        if index + 1 == self.songs.len() {
            if self.playback_mode.wraps() {
                self.good_song(0, Direction::Forward, false, true)
            } else {
                None
            }
        } else {
            // Loop modes may wrap here too, so trailing bad songs never end the list.
            self.good_song(
                index as isize + 1,
                Direction::Forward,
                false,
                self.playback_mode.wraps(),
            )
        }
    }

    fn previous_song(&self) -> Option<BriefSong> {
        let Some(index) = self.current_index() else {
            return self.good_song(-1, Direction::Backward, false, true);
        };
        if self.playback_mode == PlaybackMode::Random {
            return self.good_song(0, Direction::Backward, false, true);
        }
        self.good_song(index as isize - 1, Direction::Backward, false, true)
    }

    /// Insert after the current song, or append. Returns the new index.
    fn insert_after(&mut self, anchor: Option<&BriefSong>, song: BriefSong) -> Option<usize> {
        if self.index_of(&song).is_some() {
            return None;
        }
        let index = anchor
            .and_then(|a| self.index_of(a))
            .or_else(|| self.current_index())
            .map(|i| i + 1)
            .unwrap_or(self.songs.len());
        self.songs.insert(index, song);
        Some(index)
    }
}

// ============================================================================
// Playlist
// ============================================================================

pub struct Playlist {
    library: Arc<Library>,
    player: Arc<Player>,
    metadata: MetadataAssembler,
    set_current_task: Arc<PreemptiveTaskSpec>,
    state: Mutex<PlaylistState>,

    pub song_changed: Signal<Option<BriefSong>>,
    pub song_changed_v2: Signal<(Option<BriefSong>, Option<Media>)>,
    pub playback_mode_changed: Signal<PlaybackMode>,
    pub mode_changed: Signal<PlaylistMode>,
    pub eof_reached: Signal<()>,
    /// `(index, count)`
    pub songs_added: Signal<(usize, usize)>,
    /// `(index, count)`
    pub songs_removed: Signal<(usize, usize)>,
}

impl Playlist {
    /// Create a playlist and wire it to `player`.
    pub fn new(
        library: Arc<Library>,
        player: Arc<Player>,
        tasks: &TaskManager,
        audio_select_policy: &str,
    ) -> Arc<Self> {
        let playlist = Arc::new(Self {
            metadata: MetadataAssembler::new(Arc::clone(&library)),
            library,
            player: Arc::clone(&player),
            set_current_task: tasks.get_or_create(SET_CURRENT_SONG_TASK),
            state: Mutex::new(PlaylistState {
                audio_select_policy: audio_select_policy.to_string(),
                ..PlaylistState::default()
            }),
            song_changed: Signal::new("playlist.song_changed"),
            song_changed_v2: Signal::new("playlist.song_changed_v2"),
            playback_mode_changed: Signal::new("playlist.playback_mode_changed"),
            mode_changed: Signal::new("playlist.mode_changed"),
            eof_reached: Signal::new("playlist.eof_reached"),
            songs_added: Signal::new("playlist.songs_added"),
            songs_removed: Signal::new("playlist.songs_removed"),
        });

        playlist
            .song_changed_v2
            .connect_method(&player, Player::on_song_changed_v2, Delivery::Direct);
        player
            .media_finished
            .connect_method(&playlist, Playlist::on_media_finished, Delivery::Direct);
        player.media_loading_failed.connect_method(
            &playlist,
            Playlist::on_media_loading_failed,
            Delivery::Direct,
        );
        playlist
            .eof_reached
            .connect_method(&playlist, Playlist::on_eof_reached, Delivery::Direct);
        playlist
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn list(&self) -> Vec<BriefSong> {
        self.state.lock().songs.clone()
    }

    pub fn bad_songs(&self) -> Vec<BriefSong> {
        self.state.lock().bad_songs.clone()
    }

    pub fn current_song(&self) -> Option<BriefSong> {
        self.state.lock().current_song.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, song: &BriefSong) -> bool {
        self.state.lock().index_of(song).is_some()
    }

    pub fn is_bad(&self, song: &BriefSong) -> bool {
        self.state.lock().is_bad(song)
    }

    pub fn next_song(&self) -> Option<BriefSong> {
        self.state.lock().next_song()
    }

    pub fn previous_song(&self) -> Option<BriefSong> {
        self.state.lock().previous_song()
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.state.lock().playback_mode
    }

    pub fn mode(&self) -> PlaylistMode {
        self.state.lock().mode
    }

    pub fn audio_select_policy(&self) -> String {
        self.state.lock().audio_select_policy.clone()
    }

    pub fn set_audio_select_policy(&self, policy: &str) {
        self.state.lock().audio_select_policy = policy.to_string();
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    // ------------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------------

    /// Switch the playlist mode. Entering FM forces sequential playback.
    pub fn set_mode(&self, mode: PlaylistMode) {
        let (changed, forced_sequential) = {
            let mut state = self.state.lock();
            if state.mode == mode {
                (false, false)
            } else {
                let forced = mode == PlaylistMode::Fm
                    && state.playback_mode != PlaybackMode::Sequential;
                if forced {
                    state.playback_mode = PlaybackMode::Sequential;
                }
                state.mode = mode;
                (true, forced)
            }
        };
        if forced_sequential {
            self.playback_mode_changed.emit(PlaybackMode::Sequential);
        }
        if changed {
            info!(%mode, "Playlist mode changed");
            self.mode_changed.emit(mode);
        }
    }

    /// Fails in FM mode for anything but [`PlaybackMode::Sequential`].
    pub fn set_playback_mode(&self, playback_mode: PlaybackMode) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.mode == PlaylistMode::Fm && playback_mode != PlaybackMode::Sequential {
                return Err(PlaybackError::InvalidState(
                    "playback mode is sequential in fm mode".into(),
                ));
            }
            state.playback_mode = playback_mode;
        }
        self.playback_mode_changed.emit(playback_mode);
        Ok(())
    }

    fn leave_fm(&self) {
        if self.mode() == PlaylistMode::Fm {
            self.set_mode(PlaylistMode::Normal);
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    fn append(&self, song: BriefSong) {
        let index = {
            let mut state = self.state.lock();
            if state.index_of(&song).is_some() {
                return;
            }
            state.songs.push(song);
            state.songs.len() - 1
        };
        self.songs_added.emit((index, 1));
    }

    /// Append `song` if absent. Leaves FM mode.
    pub fn add(&self, song: BriefSong) {
        self.leave_fm();
        self.append(song);
    }

    /// Append without leaving FM mode. Only the FM feeder calls this.
    pub fn fm_add(&self, song: BriefSong) {
        self.append(song);
    }

    /// Insert `song` after the current song, or append when there is none.
    /// Leaves FM mode.
    pub fn insert(&self, song: BriefSong) {
        self.leave_fm();
        let index = self.state.lock().insert_after(None, song);
        if let Some(index) = index {
            self.songs_added.emit((index, 1));
        }
    }

    pub fn mark_as_bad(&self, song: &BriefSong) {
        let mut state = self.state.lock();
        if state.index_of(song).is_some() && !state.is_bad(song) {
            state.bad_songs.push(song.clone());
        }
    }

    /// Remove `song`. Removing the current song moves to the next one, or
    /// the previous one when nothing follows, in a single transition.
    pub fn remove(self: &Arc<Self>, song: &BriefSong) {
        let removed = {
            let mut state = self.state.lock();
            state.bad_songs.retain(|s| s != song);
            let Some(index) = state.index_of(song) else {
                debug!(song = %song.title, "Remove failed, song not in playlist");
                return;
            };
            let is_current = state.current_song.as_ref() == Some(song);
            let next = if is_current {
                state.next_song().filter(|s| s != song)
            } else {
                None
            };
            state.songs.remove(index);
            let replacement = if is_current {
                state.current_song = None;
                let replacement = next.or_else(|| state.previous_song());
                state.current_song = replacement.clone();
                Some(replacement)
            } else {
                None
            };
            (index, replacement)
        };

        let (index, replacement) = removed;
        self.songs_removed.emit((index, 1));
        match replacement {
            Some(Some(next)) => {
                self.set_current_song(Some(next));
            }
            Some(None) => self.commit_none(),
            None => {}
        }
    }

    /// Remove every song. The current song becomes `None`.
    pub fn clear(&self) {
        let (had_current, count) = {
            let mut state = self.state.lock();
            let had_current = state.current_song.take().is_some();
            let count = state.songs.len();
            state.songs.clear();
            state.bad_songs.clear();
            (had_current, count)
        };
        if had_current {
            self.emit_song_changed(None, None);
        }
        if count > 0 {
            self.songs_removed.emit((0, count));
        }
    }

    /// Replace the content with `songs`. With `next_` the playlist advances
    /// right away.
    pub fn set_models(
        self: &Arc<Self>,
        songs: Vec<BriefSong>,
        next_: bool,
    ) -> Option<TaskHandle<Result<()>>> {
        self.leave_fm();
        self.clear();
        let count = {
            let mut state = self.state.lock();
            for song in songs {
                if state.index_of(&song).is_none() {
                    state.songs.push(song);
                }
            }
            state.songs.len()
        };
        if count > 0 {
            self.songs_added.emit((0, count));
        }
        if next_ {
            self.next()
        } else {
            None
        }
    }

    // ------------------------------------------------------------------------
    // Current song
    // ------------------------------------------------------------------------

    /// Change the current song in the background.
    ///
    /// A newer call cancels a previous one still in flight. `None` clears
    /// the current song synchronously and returns no handle.
    pub fn set_current_song(
        self: &Arc<Self>,
        song: Option<BriefSong>,
    ) -> Option<TaskHandle<Result<()>>> {
        let Some(song) = song else {
            self.commit_none();
            return None;
        };
        self.leave_fm_for(&song);
        Some(self.set_current_task.bind_coro(self.a_set_current_song(Some(song))))
    }

    /// Resolve media for `song` and make it current.
    pub fn a_set_current_song(
        self: &Arc<Self>,
        song: Option<BriefSong>,
    ) -> BoxFuture<'static, Result<()>> {
        let this = Arc::clone(self);
        async move { this.set_current_song_inner(song).await }.boxed()
    }

    #[instrument(skip_all)]
    async fn set_current_song_inner(self: Arc<Self>, song: Option<BriefSong>) -> Result<()> {
        let Some(song) = song else {
            self.commit_none();
            return Ok(());
        };
        self.leave_fm_for(&song);

        let policy = self.audio_select_policy();
        match self.library.song_prepare_media(&song, &policy).await {
            Ok(media) => {
                self.commit(song, Some(media), None).await;
                Ok(())
            }
            Err(err) if err.is_media_not_found() => {
                info!(song = %song.title, "Song has no valid media, marking it as bad");
                self.mark_as_bad(&song);
                if self.mode() == PlaylistMode::Fm {
                    return self.a_next().await;
                }

                let standby = self
                    .library
                    .a_list_song_standby_v2(&song, &policy, None, STANDBY_DEFAULT_MIN_SCORE, 1)
                    .await;
                match standby.into_iter().next() {
                    Some((standby, media)) => {
                        info!(standby = %standby.uri(), "Song standby was found");
                        self.commit(standby, Some(media), Some(&song)).await;
                    }
                    None => {
                        warn!(song = %song.title, "Song standby not found");
                        self.commit(song, None, None).await;
                    }
                }
                Ok(())
            }
            Err(err) => {
                error!(song = %song.title, error = %err, "Prepare media failed, marking song as bad");
                self.mark_as_bad(&song);
                self.a_next().await
            }
        }
    }

    fn leave_fm_for(&self, song: &BriefSong) {
        if self.mode() == PlaylistMode::Fm && !self.contains(song) {
            self.set_mode(PlaylistMode::Normal);
        }
    }

    /// Make `song` current, inserting it after `anchor` (or the current
    /// song) when it is not in the list yet.
    async fn commit(&self, song: BriefSong, media: Option<Media>, anchor: Option<&BriefSong>) {
        let metadata = match media {
            Some(_) => Some(self.metadata.prepare_for_song(&song).await),
            None => None,
        };

        let added = {
            let mut state = self.state.lock();
            let added = state.insert_after(anchor, song.clone());
            state.current_song = Some(song.clone());
            added
        };
        if let Some(index) = added {
            self.songs_added.emit((index, 1));
        }
        self.emit_song_changed(Some(song), media);
        if let Some(metadata) = metadata {
            self.player.set_metadata(metadata);
        }
    }

    fn commit_none(&self) {
        self.state.lock().current_song = None;
        self.emit_song_changed(None, None);
    }

    fn emit_song_changed(&self, song: Option<BriefSong>, media: Option<Media>) {
        self.song_changed.emit(song.clone());
        self.song_changed_v2.emit((song, media));
    }

    /// Play the next song, or emit `eof_reached` when there is none.
    pub fn next(self: &Arc<Self>) -> Option<TaskHandle<Result<()>>> {
        let candidate = self.next_song();
        match candidate {
            Some(song) => self.set_current_song(Some(song)),
            None => {
                debug!("Playlist reached its end");
                self.eof_reached.emit(());
                None
            }
        }
    }

    /// Async variant of [`next`](Self::next), run inside the current task.
    pub async fn a_next(self: &Arc<Self>) -> Result<()> {
        match self.next_song() {
            Some(song) => self.a_set_current_song(Some(song)).await,
            None => {
                self.eof_reached.emit(());
                Ok(())
            }
        }
    }

    pub fn previous(self: &Arc<Self>) -> Option<TaskHandle<Result<()>>> {
        match self.previous_song() {
            Some(song) => self.set_current_song(Some(song)),
            None => {
                debug!("No previous song");
                None
            }
        }
    }

    /// Upgrade `model` if brief, make it current and resume playback.
    pub async fn play_model(self: &Arc<Self>, model: Model) -> Result<()> {
        let mut model = model;
        if model.is_brief() {
            if let Err(err) = self.library.model_upgrade(&mut model).await {
                warn!(uri = %model.uri(), error = %err, "Upgrade failed, playing brief model");
            }
        }
        let song = model
            .as_brief_song()
            .ok_or_else(|| PlaybackError::NotASong(model.uri()))?;

        if let Some(handle) = self.set_current_song(Some(song)) {
            match handle.await {
                Ok(result) => result?,
                Err(err) if err.is_cancelled() => debug!("Superseded by a newer song"),
                Err(err) => return Err(err.into()),
            }
        }
        self.player.resume()
    }

    // ------------------------------------------------------------------------
    // Player coordination
    // ------------------------------------------------------------------------

    fn on_media_finished(self: &Arc<Self>, _: ()) {
        let (playback_mode, current) = {
            let state = self.state.lock();
            (state.playback_mode, state.current_song.clone())
        };
        match (playback_mode, current) {
            (PlaybackMode::OneLoop, Some(current)) => {
                self.set_current_song(Some(current));
            }
            _ => {
                self.next();
            }
        }
    }

    fn on_media_loading_failed(self: &Arc<Self>, error_code: Option<i32>) {
        if let Some(current) = self.current_song() {
            warn!(song = %current.title, ?error_code, "Media loading failed, marking song as bad");
            self.mark_as_bad(&current);
        }
        self.next();
    }

    fn on_eof_reached(self: &Arc<Self>, _: ()) {
        if self.mode() == PlaylistMode::Normal {
            if let Err(err) = self.player.stop() {
                warn!(error = %err, "Stopping player at end of playlist failed");
            }
        }
    }
}

impl fmt::Debug for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Playlist")
            .field("len", &state.songs.len())
            .field("bad", &state.bad_songs.len())
            .field("mode", &state.mode)
            .field("playback_mode", &state.playback_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::permissive_engine;
    use core_library::testing::FakeProvider;

    fn song(id: &str) -> BriefSong {
        BriefSong::new("fake", id, format!("Song {id}"))
    }

    fn state_with(ids: &[&str], bad: &[&str], current: Option<&str>) -> PlaylistState {
        PlaylistState {
            songs: ids.iter().map(|id| song(id)).collect(),
            bad_songs: bad.iter().map(|id| song(id)).collect(),
            current_song: current.map(song),
            ..PlaylistState::default()
        }
    }

    fn id(song: Option<BriefSong>) -> Option<String> {
        song.map(|s| s.identifier)
    }

    #[test]
    fn test_good_song_walks() {
        let state = state_with(&["1", "2", "3"], &[], None);
        assert_eq!(id(state.good_song(0, Direction::Forward, false, true)), Some("1".into()));
        assert_eq!(id(state.good_song(1, Direction::Forward, false, true)), Some("2".into()));

        let state = state_with(&["1", "2", "3"], &["2"], None);
        assert_eq!(id(state.good_song(1, Direction::Backward, false, true)), Some("1".into()));
        assert_eq!(id(state.good_song(1, Direction::Forward, false, true)), Some("3".into()));

        let state = state_with(&["1", "2", "3"], &["1", "2", "3"], None);
        assert_eq!(state.good_song(0, Direction::Forward, false, true), None);
    }

    #[test]
    fn test_next_song_by_mode() {
        let mut state = state_with(&["1", "2", "3"], &[], Some("3"));
        state.playback_mode = PlaybackMode::Loop;
        assert_eq!(id(state.next_song()), Some("1".into()));

        state.playback_mode = PlaybackMode::Sequential;
        assert_eq!(state.next_song(), None);

        state.current_song = Some(song("1"));
        assert_eq!(id(state.next_song()), Some("2".into()));

        state.current_song = None;
        assert_eq!(id(state.next_song()), Some("1".into()));
    }

    #[test]
    fn test_next_song_skips_bad_songs() {
        let mut state = state_with(&["1", "2", "3", "4"], &["2", "3"], Some("1"));
        assert_eq!(id(state.next_song()), Some("4".into()));

        // Loop mode wraps past bad trailing songs.
        state.bad_songs = vec![song("3"), song("4")];
        state.current_song = Some(song("2"));
        assert_eq!(id(state.next_song()), Some("1".into()));

        // Sequential mode stops there instead.
        state.playback_mode = PlaybackMode::Sequential;
        assert_eq!(state.next_song(), None);

        state.playback_mode = PlaybackMode::Random;
        for _ in 0..20 {
            let next = state.next_song().unwrap();
            assert!(!state.is_bad(&next));
        }
    }

    #[test]
    fn test_loop_mode_reaches_every_good_song() {
        let mut state = state_with(&["1", "2", "3", "4", "5"], &["3"], Some("4"));
        let mut seen = Vec::new();
        for _ in 0..5 {
            let next = state.next_song().unwrap();
            seen.push(next.identifier.clone());
            state.current_song = Some(next);
        }
        for expected in ["1", "2", "4", "5"] {
            assert!(seen.iter().any(|s| s == expected));
        }
        assert!(!seen.iter().any(|s| s == "3"));
    }

    #[test]
    fn test_previous_song() {
        let state = state_with(&["1", "2", "3"], &[], Some("1"));
        assert_eq!(id(state.previous_song()), Some("3".into()));
        let state = state_with(&["1", "2", "3"], &[], Some("3"));
        assert_eq!(id(state.previous_song()), Some("2".into()));
        let state = state_with(&["1", "2", "3"], &[], None);
        assert_eq!(id(state.previous_song()), Some("3".into()));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("one_loop".parse::<PlaybackMode>().unwrap(), PlaybackMode::OneLoop);
        assert!("shuffle".parse::<PlaybackMode>().is_err());
        assert_eq!(PlaylistMode::Fm.to_string(), "fm");
    }

    fn playlist(library: Library) -> Arc<Playlist> {
        let tasks = TaskManager::current().unwrap();
        let player = Player::new(Arc::new(permissive_engine()));
        Playlist::new(Arc::new(library), player, &tasks, "hq<>")
    }

    #[tokio::test]
    async fn test_add_insert_and_fm_demotion() {
        let playlist = playlist(Library::default());
        playlist.add(song("1"));
        playlist.add(song("1"));
        playlist.add(song("2"));
        assert_eq!(playlist.len(), 2);

        playlist.set_mode(PlaylistMode::Fm);
        assert_eq!(playlist.playback_mode(), PlaybackMode::Sequential);
        assert!(playlist.set_playback_mode(PlaybackMode::Loop).is_err());

        playlist.fm_add(song("3"));
        assert_eq!(playlist.mode(), PlaylistMode::Fm);
        playlist.insert(song("4"));
        assert_eq!(playlist.mode(), PlaylistMode::Normal);
        let ids: Vec<String> = playlist.list().into_iter().map(|s| s.identifier).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_set_current_song_commits_and_plays() {
        let library = Library::default();
        library
            .register(Arc::new(
                FakeProvider::new("fake").with_song_media(song("1"), Media::new("http://x/1.mp3")),
            ))
            .unwrap();
        let playlist = playlist(library);

        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        playlist
            .song_changed
            .connect(move |_| sink.lock().push("v1"), Delivery::Direct);
        let sink = Arc::clone(&order);
        playlist
            .song_changed_v2
            .connect(move |_| sink.lock().push("v2"), Delivery::Direct);

        let handle = playlist.set_current_song(Some(song("1"))).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(id(playlist.current_song()), Some("1".into()));
        assert!(playlist.contains(&song("1")));
        assert_eq!(*order.lock(), ["v1", "v2"]);
        assert_eq!(
            playlist.player().current_media().map(|m| m.url),
            Some("http://x/1.mp3".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_error_marks_bad_and_advances() {
        let library = Library::default();
        library
            .register(Arc::new(
                FakeProvider::new("fake")
                    .with_song_media(song("1"), Media::new("http://x/1.mp3"))
                    .with_song_media(song("2"), Media::new("http://x/2.mp3"))
                    .with_media_error(
                        "1",
                        core_library::LibraryError::ProviderIo {
                            provider: "fake".into(),
                            message: "reset".into(),
                        },
                    ),
            ))
            .unwrap();
        let playlist = playlist(library);
        playlist.add(song("1"));
        playlist.add(song("2"));

        playlist
            .set_current_song(Some(song("1")))
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(playlist.bad_songs(), [song("1")]);
        assert_eq!(id(playlist.current_song()), Some("2".into()));
    }

    #[tokio::test]
    async fn test_remove_current_is_one_transition() {
        let library = Library::default();
        library
            .register(Arc::new(
                FakeProvider::new("fake")
                    .with_song_media(song("1"), Media::new("http://x/1.mp3"))
                    .with_song_media(song("2"), Media::new("http://x/2.mp3")),
            ))
            .unwrap();
        let playlist = playlist(library);
        playlist.set_models(vec![song("1"), song("2")], false);
        playlist
            .set_current_song(Some(song("1")))
            .unwrap()
            .await
            .unwrap()
            .unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        playlist
            .song_changed
            .connect(move |s| sink.lock().push(s), Delivery::Direct);

        playlist.remove(&song("1"));
        // Never transiently empty.
        assert_eq!(id(playlist.current_song()), Some("2".into()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*changes.lock(), [Some(song("2"))]);

        playlist.remove(&song("2"));
        assert_eq!(playlist.current_song(), None);
        assert!(playlist.is_empty());
        assert_eq!(changes.lock().last(), Some(&None));
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let playlist = playlist(Library::default());
        playlist.set_models(vec![song("1"), song("2")], false);
        playlist.mark_as_bad(&song("2"));
        playlist.mark_as_bad(&song("9"));
        assert_eq!(playlist.bad_songs().len(), 1);

        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        playlist
            .songs_removed
            .connect(move |r| sink.lock().push(r), Delivery::Direct);
        playlist.clear();
        assert!(playlist.is_empty());
        assert!(playlist.bad_songs().is_empty());
        assert_eq!(*removed.lock(), [(0, 2)]);
    }
}
