//! FM: an endless playlist fed by a song fetcher.
//!
//! While active, the playlist runs in [`PlaylistMode::Fm`]. Every time it
//! reaches its end the fetcher is called on the blocking pool for at least
//! `minimum_per_fetch` songs, which are appended through
//! [`Playlist::fm_add`] before advancing. Leaving FM mode by any route
//! (`deactivate`, `add`, `insert`, playing a foreign song) disconnects the
//! feeder.

use core_library::models::BriefSong;
use core_runtime::{Delivery, PreemptiveTaskSpec, TaskManager};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::playlist::{Playlist, PlaylistMode};

pub const FETCH_SONGS_TASK: &str = "fm-fetch-songs";

pub const MINIMUM_PER_FETCH: usize = 3;

/// Produces at least `minimum` songs. Runs on a blocking thread.
pub type FetchSongs =
    Arc<dyn Fn(usize) -> core_library::Result<Vec<BriefSong>> + Send + Sync + 'static>;

pub struct Fm {
    playlist: Arc<Playlist>,
    runtime: Handle,
    fetch_task: Arc<PreemptiveTaskSpec>,
    fetcher: Mutex<Option<FetchSongs>>,
    is_fetching: AtomicBool,
    minimum_per_fetch: usize,
}

impl Fm {
    pub fn new(playlist: Arc<Playlist>, tasks: &TaskManager) -> Arc<Self> {
        let fm = Arc::new(Self {
            playlist,
            runtime: tasks.runtime().clone(),
            fetch_task: tasks.get_or_create(FETCH_SONGS_TASK),
            fetcher: Mutex::new(None),
            is_fetching: AtomicBool::new(false),
            minimum_per_fetch: MINIMUM_PER_FETCH,
        });
        fm.playlist
            .mode_changed
            .connect_method(&fm, Fm::on_mode_changed, Delivery::Direct);
        fm
    }

    pub fn is_active(&self) -> bool {
        self.playlist.mode() == PlaylistMode::Fm
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.load(Ordering::SeqCst)
    }

    /// Enter FM mode and start playing songs produced by `fetcher`.
    pub fn activate<F>(self: &Arc<Self>, fetcher: F)
    where
        F: Fn(usize) -> core_library::Result<Vec<BriefSong>> + Send + Sync + 'static,
    {
        if self.is_active() {
            warn!("FM already activated");
            return;
        }
        *self.fetcher.lock() = Some(Arc::new(fetcher));
        self.playlist
            .eof_reached
            .connect_method(self, Fm::on_eof_reached, Delivery::Direct);
        self.playlist.set_mode(PlaylistMode::Fm);
        self.playlist.next();
        if let Err(err) = self.playlist.player().resume() {
            warn!(error = %err, "Resume after FM activation failed");
        }
        info!("FM mode activated");
    }

    pub fn deactivate(&self) {
        self.playlist.set_mode(PlaylistMode::Normal);
    }

    fn on_mode_changed(self: &Arc<Self>, mode: PlaylistMode) {
        if mode == PlaylistMode::Fm {
            return;
        }
        self.playlist
            .eof_reached
            .disconnect_method(self, Fm::on_eof_reached);
        *self.fetcher.lock() = None;
        info!("FM mode deactivated");
    }

    fn on_eof_reached(self: &Arc<Self>, _: ()) {
        let Some(fetcher) = self.fetcher.lock().clone() else {
            return;
        };
        if self.is_fetching.swap(true, Ordering::SeqCst) {
            debug!("FM is already fetching songs");
            return;
        }

        let minimum = self.minimum_per_fetch;
        let handle = self.fetch_task.bind_blocking_io(move || fetcher(minimum));
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            match handle.await {
                Ok(Ok(songs)) => {
                    debug!(count = songs.len(), "FM songs fetched");
                    this.feed_playlist(songs);
                }
                Ok(Err(err)) => error!(error = %err, "FM fetch songs failed"),
                Err(err) if err.is_cancelled() => debug!("FM fetch songs cancelled"),
                Err(err) => error!(error = %err, "FM fetch songs task failed"),
            }
            this.is_fetching.store(false, Ordering::SeqCst);
        });
    }

    fn feed_playlist(&self, songs: Vec<BriefSong>) {
        if !self.is_active() {
            debug!("FM deactivated while fetching, dropping songs");
            return;
        }
        if songs.is_empty() {
            warn!("FM fetcher returned no songs");
            return;
        }
        for song in songs {
            self.playlist.fm_add(song);
        }
        self.playlist.next();
    }
}

impl std::fmt::Debug for Fm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fm")
            .field("active", &self.is_active())
            .field("fetching", &self.is_fetching())
            .finish()
    }
}
