//! # Player Facade
//!
//! Thin layer over the external [`MediaEngine`]. It keeps the observable
//! player state (state, position, duration, volume, current media and
//! metadata) and republishes engine progress as signals.
//!
//! ## Event flow
//!
//! ```text
//! engine thread ──EngineEvent──> unbounded channel ──> drain task (tokio)
//!                                                           │
//!                                                           v
//!                                          Player::handle_engine_event
//!                                                           │
//!                                                  signals (position_changed, ...)
//! ```
//!
//! The drain task holds the player weakly, so dropping the last `Arc<Player>`
//! ends it.
//!
//! ## Metadata
//!
//! Metadata set through [`Player::set_metadata`] is considered manual and
//! wins over tags the engine reads from the stream, until the next media is
//! played.

use bridge_traits::{EngineEvent, EngineState, Media, MediaEngine, MediaFinishReason};
use core_library::models::BriefSong;
use core_runtime::logging::redact_if_sensitive;
use core_runtime::Signal;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PlaybackError, Result};
use crate::metadata::Metadata;

pub type PlayerState = EngineState;

/// Volume of a freshly created player.
pub const DEFAULT_VOLUME: u8 = 100;

#[derive(Debug, Default)]
struct PlayerInner {
    state: PlayerState,
    position: f64,
    duration: f64,
    volume: u8,
    current_media: Option<Media>,
    current_metadata: Metadata,
    manual_metadata: bool,
    shut_down: bool,
}

pub struct Player {
    engine: Arc<dyn MediaEngine>,
    inner: Mutex<PlayerInner>,

    pub state_changed: Signal<PlayerState>,
    /// Seconds
    pub position_changed: Signal<f64>,
    /// Seconds
    pub duration_changed: Signal<f64>,
    pub volume_changed: Signal<u8>,
    pub media_changed: Signal<Option<Media>>,
    /// `(old, new)`, emitted before the engine switches media.
    pub media_about_to_changed: Signal<(Option<Media>, Option<Media>)>,
    pub media_loaded: Signal<()>,
    pub media_finished: Signal<()>,
    /// Engine error code, when the engine reported one.
    pub media_loading_failed: Signal<Option<i32>>,
    pub metadata_changed: Signal<Metadata>,
    /// Seconds
    pub seeked: Signal<f64>,
}

impl Player {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            inner: Mutex::new(PlayerInner {
                volume: DEFAULT_VOLUME,
                ..PlayerInner::default()
            }),
            state_changed: Signal::new("player.state_changed"),
            position_changed: Signal::new("player.position_changed"),
            duration_changed: Signal::new("player.duration_changed"),
            volume_changed: Signal::new("player.volume_changed"),
            media_changed: Signal::new("player.media_changed"),
            media_about_to_changed: Signal::new("player.media_about_to_changed"),
            media_loaded: Signal::new("player.media_loaded"),
            media_finished: Signal::new("player.media_finished"),
            media_loading_failed: Signal::new("player.media_loading_failed"),
            metadata_changed: Signal::new("player.metadata_changed"),
            seeked: Signal::new("player.seeked"),
        })
    }

    /// Attach to the engine and drain its events on the current runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.engine.attach(tx);
        let player: Weak<Player> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match player.upgrade() {
                    Some(player) => player.handle_engine_event(event),
                    None => break,
                }
            }
            debug!("Engine event channel closed");
        })
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().position
    }

    pub fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    pub fn volume(&self) -> u8 {
        self.inner.lock().volume
    }

    pub fn current_media(&self) -> Option<Media> {
        self.inner.lock().current_media.clone()
    }

    pub fn current_metadata(&self) -> Metadata {
        self.inner.lock().current_metadata.clone()
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    fn ensure_running(&self) -> Result<()> {
        if self.inner.lock().shut_down {
            return Err(PlaybackError::ShutDown);
        }
        Ok(())
    }

    /// Play `media`, replacing the current one.
    pub fn play(&self, media: Media, video: bool) -> Result<()> {
        self.ensure_running()?;
        let old = self.current_media();
        self.media_about_to_changed
            .emit((old, Some(media.clone())));

        info!(url = %media.url, video, "Playing media");
        for (name, value) in &media.http_headers {
            debug!(header = %name, value = %redact_if_sensitive(name, value), "Media header");
        }
        self.engine.play(&media, video)?;
        {
            let mut inner = self.inner.lock();
            inner.current_media = Some(media.clone());
            inner.position = 0.0;
            inner.manual_metadata = false;
            inner.current_metadata = Metadata::default();
        }
        self.media_changed.emit(Some(media));
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.ensure_running()?;
        self.engine.pause()?;
        self.set_state(PlayerState::Paused);
        Ok(())
    }

    /// Resume playback. Without current media this does nothing.
    pub fn resume(&self) -> Result<()> {
        self.ensure_running()?;
        if self.current_media().is_none() {
            debug!("Nothing to resume");
            return Ok(());
        }
        self.engine.resume()?;
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    pub fn toggle(&self) -> Result<()> {
        match self.state() {
            PlayerState::Playing => self.pause(),
            _ => self.resume(),
        }
    }

    pub fn stop(&self) -> Result<()> {
        self.ensure_running()?;
        self.engine.stop()?;
        let had_media = {
            let mut inner = self.inner.lock();
            inner.position = 0.0;
            inner.current_media.take().is_some()
        };
        if had_media {
            self.media_changed.emit(None);
        }
        self.set_state(PlayerState::Stopped);
        Ok(())
    }

    /// Release the engine. Every later control call fails with
    /// [`PlaybackError::ShutDown`].
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.shut_down {
                return Ok(());
            }
            inner.shut_down = true;
        }
        info!("Shutting down media engine");
        self.engine.shutdown()?;
        Ok(())
    }

    /// Set the volume, clamped to `0..=100`.
    pub fn set_volume(&self, volume: i64) -> Result<()> {
        self.ensure_running()?;
        let volume = volume.clamp(0, 100) as u8;
        self.engine.set_volume(volume)?;
        let changed = {
            let mut inner = self.inner.lock();
            let changed = inner.volume != volume;
            inner.volume = volume;
            changed
        };
        if changed {
            self.volume_changed.emit(volume);
        }
        Ok(())
    }

    pub fn seek(&self, position: f64) -> Result<()> {
        self.ensure_running()?;
        self.engine.seek(position.max(0.0))?;
        Ok(())
    }

    /// Restrict the next media to `start..end` seconds.
    pub fn set_play_range(&self, start: f64, end: Option<f64>) -> Result<()> {
        self.ensure_running()?;
        self.engine.set_play_range(start.max(0.0), end)?;
        Ok(())
    }

    /// Set metadata manually. Engine tags no longer override it until the
    /// next [`play`](Self::play).
    pub fn set_metadata(&self, metadata: Metadata) {
        {
            let mut inner = self.inner.lock();
            inner.manual_metadata = true;
            inner.current_metadata = metadata.clone();
        }
        self.metadata_changed.emit(metadata);
    }

    fn set_state(&self, state: PlayerState) {
        let changed = {
            let mut inner = self.inner.lock();
            let changed = inner.state != state;
            inner.state = state;
            changed
        };
        if changed {
            debug!(state = state.as_str(), "Player state changed");
            self.state_changed.emit(state);
        }
    }

    // ------------------------------------------------------------------------
    // Playlist coordination
    // ------------------------------------------------------------------------

    /// Receiver of `playlist.song_changed_v2`: play the media, or stop when
    /// there is none.
    pub fn on_song_changed_v2(self: &Arc<Self>, (song, media): (Option<BriefSong>, Option<Media>)) {
        let result = match media {
            Some(media) => self.play(media, false),
            None => {
                if let Some(song) = song {
                    warn!(song = %song.title, "No media for song, stopping");
                }
                self.stop()
            }
        };
        if let Err(err) = result {
            warn!(error = %err, "Player failed to follow playlist");
        }
    }

    // ------------------------------------------------------------------------
    // Engine events
    // ------------------------------------------------------------------------

    pub fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::PositionChanged(position) => {
                self.inner.lock().position = position;
                self.position_changed.emit(position);
            }
            EngineEvent::DurationChanged(duration) => {
                self.inner.lock().duration = duration;
                self.duration_changed.emit(duration);
            }
            EngineEvent::StateChanged(state) => self.set_state(state),
            EngineEvent::MediaLoaded => self.media_loaded.emit(()),
            EngineEvent::MediaFinished { reason, error_code } => match reason {
                MediaFinishReason::Eof => self.media_finished.emit(()),
                MediaFinishReason::Error => {
                    warn!(?error_code, "Media loading failed");
                    self.media_loading_failed.emit(error_code);
                }
                other => debug!(reason = ?other, "Media finished"),
            },
            EngineEvent::MetadataChanged(tags) => {
                let metadata = {
                    let mut inner = self.inner.lock();
                    if inner.manual_metadata {
                        None
                    } else {
                        let metadata = Metadata::from_engine_tags(&tags);
                        inner.current_metadata = metadata.clone();
                        Some(metadata)
                    }
                };
                if let Some(metadata) = metadata {
                    self.metadata_changed.emit(metadata);
                }
            }
            EngineEvent::Seeked(position) => {
                self.inner.lock().position = position;
                self.seeked.emit(position);
            }
        }
    }
}
