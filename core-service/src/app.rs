//! Application context.
//!
//! [`App`] owns every long-lived component: library, player, playlist, FM,
//! live lyric, recently played list, task manager, event bus and the pub/sub
//! gateway. It is built once by [`create_app`] and shared by reference with
//! the servers and handlers; tests build a fresh one per case.

use bridge_traits::{Media, MediaEngine};
use core_library::models::{BriefSong, ModelIdentity};
use core_library::Library;
use core_playback::{Fm, LiveLyric, Player, Playlist, RecentlyPlayed, StateSnapshot};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    CoreEvent, EventBus, LibraryEvent, PlayerEvent, PlaylistEvent, DEFAULT_EVENT_BUFFER_SIZE,
};
use core_runtime::{Delivery, SlotQueue, TaskManager};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::gateway::Gateway;

pub struct App {
    pub config: CoreConfig,
    pub library: Arc<Library>,
    pub player: Arc<Player>,
    pub playlist: Arc<Playlist>,
    pub fm: Arc<Fm>,
    pub live_lyric: Arc<LiveLyric>,
    pub recently_played: Arc<RecentlyPlayed>,
    pub tasks: TaskManager,
    pub events: EventBus,
    pub gateway: Arc<Gateway>,
    /// Runs the receivers that must not execute on the emitter's thread:
    /// the live lyric, the recently played list and the event bus forwarders.
    pub slot_queue: SlotQueue,
}

/// Build and wire the application on the current tokio runtime.
///
/// The player starts draining engine events, the live lyric and recently
/// played list follow the playlist, and every component signal is forwarded
/// to the event bus so the gateway can publish it. Those followers are
/// queued on [`App::slot_queue`], whose worker runs on the current runtime.
pub fn create_app(config: CoreConfig, engine: Arc<dyn MediaEngine>) -> Result<Arc<App>> {
    let tasks = TaskManager::current()?;
    let library = Arc::new(Library::from_config(&config));
    let player = Player::new(engine);
    let playlist = Playlist::new(
        Arc::clone(&library),
        Arc::clone(&player),
        &tasks,
        &config.audio_select_policy,
    );
    let fm = Fm::new(Arc::clone(&playlist), &tasks);
    let live_lyric = LiveLyric::new(Arc::clone(&library), &tasks);
    let recently_played = Arc::new(RecentlyPlayed::new(config.recently_played_capacity));
    let events = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
    let gateway = Arc::new(Gateway::new());

    let slot_queue = SlotQueue::new();
    slot_queue.install();
    player.start();
    live_lyric.connect(&playlist, &player, Delivery::queued(&slot_queue));
    recently_played.connect(&playlist, Delivery::queued(&slot_queue));
    gateway.spawn_pump(&events);

    let app = Arc::new(App {
        config,
        library,
        player,
        playlist,
        fm,
        live_lyric,
        recently_played,
        tasks,
        events,
        gateway,
        slot_queue,
    });
    app.forward_signals();
    info!(
        rpc_port = app.config.rpc_port,
        pubsub_port = app.config.pubsub_port,
        "App created"
    );
    Ok(app)
}

impl App {
    fn forward_signals(&self) {
        let delivery = Delivery::queued(&self.slot_queue);
        let bus = self.events.clone();
        let emit = move |event: CoreEvent| {
            // No receiver just means nobody is subscribed yet.
            if bus.emit(event).is_err() {
                debug!("Event dropped, no pub/sub pump");
            }
        };

        let player = &self.player;
        let e = emit.clone();
        player.state_changed.connect(
            move |state| {
                e(CoreEvent::Player(PlayerEvent::StateChanged {
                    state: state.as_str().to_string(),
                }))
            },
            delivery.clone(),
        );
        let e = emit.clone();
        player.position_changed.connect(
            move |position| e(CoreEvent::Player(PlayerEvent::PositionChanged { position })),
            delivery.clone(),
        );
        let e = emit.clone();
        player.duration_changed.connect(
            move |duration| e(CoreEvent::Player(PlayerEvent::DurationChanged { duration })),
            delivery.clone(),
        );
        let e = emit.clone();
        player.volume_changed.connect(
            move |volume| e(CoreEvent::Player(PlayerEvent::VolumeChanged { volume })),
            delivery.clone(),
        );
        let e = emit.clone();
        player.media_changed.connect(
            move |media: Option<Media>| {
                e(CoreEvent::Player(PlayerEvent::MediaChanged {
                    url: media.map(|m| m.url),
                }))
            },
            delivery.clone(),
        );
        let e = emit.clone();
        player.metadata_changed.connect(
            move |metadata| match serde_json::to_value(&metadata) {
                Ok(metadata) => e(CoreEvent::Player(PlayerEvent::MetadataChanged { metadata })),
                Err(err) => warn!(error = %err, "Metadata is not serializable"),
            },
            delivery.clone(),
        );
        let e = emit.clone();
        player.seeked.connect(
            move |position| e(CoreEvent::Player(PlayerEvent::Seeked { position })),
            delivery.clone(),
        );
        let e = emit.clone();
        player.media_finished.connect(
            move |()| e(CoreEvent::Player(PlayerEvent::MediaFinished)),
            delivery.clone(),
        );

        let playlist = &self.playlist;
        let e = emit.clone();
        playlist.song_changed.connect(
            move |song: Option<BriefSong>| {
                e(CoreEvent::Playlist(PlaylistEvent::SongChanged {
                    uri: song.map(|s| s.uri()),
                }))
            },
            delivery.clone(),
        );
        let e = emit.clone();
        playlist.playback_mode_changed.connect(
            move |mode| {
                e(CoreEvent::Playlist(PlaylistEvent::PlaybackModeChanged {
                    mode: mode.as_str().to_string(),
                }))
            },
            delivery.clone(),
        );
        let e = emit.clone();
        playlist.mode_changed.connect(
            move |mode| {
                e(CoreEvent::Playlist(PlaylistEvent::ModeChanged {
                    mode: mode.as_str().to_string(),
                }))
            },
            delivery.clone(),
        );
        let e = emit.clone();
        playlist.songs_added.connect(
            move |(index, count)| e(CoreEvent::Playlist(PlaylistEvent::SongsAdded { index, count })),
            delivery.clone(),
        );
        let e = emit.clone();
        playlist.songs_removed.connect(
            move |(index, count)| {
                e(CoreEvent::Playlist(PlaylistEvent::SongsRemoved { index, count }))
            },
            delivery.clone(),
        );

        let e = emit.clone();
        self.library.provider_added.connect(
            move |provider| e(CoreEvent::Library(LibraryEvent::ProviderAdded { provider })),
            delivery.clone(),
        );
        let e = emit.clone();
        self.library.provider_removed.connect(
            move |provider| e(CoreEvent::Library(LibraryEvent::ProviderRemoved { provider })),
            delivery.clone(),
        );

        self.live_lyric.sentence_changed.connect(
            move |sentence| emit(CoreEvent::LiveLyric { sentence }),
            delivery,
        );
    }

    /// Write the playback state to `path`.
    #[instrument(skip(self))]
    pub async fn dump_state_to(&self, path: &Path) -> Result<()> {
        StateSnapshot::capture(&self.player, &self.playlist, &self.recently_played)
            .dump(path)
            .await?;
        Ok(())
    }

    /// Restore the playback state from `path`. A missing file is not an
    /// error.
    #[instrument(skip(self))]
    pub async fn load_state_from(&self, path: &Path) -> Result<()> {
        match StateSnapshot::load(path).await? {
            Some(snapshot) => {
                snapshot
                    .restore(&self.player, &self.playlist, &self.recently_played)
                    .await?;
                info!(songs = self.playlist.len(), "State restored");
            }
            None => debug!("Nothing to restore"),
        }
        Ok(())
    }

    /// [`dump_state_to`](Self::dump_state_to) the configured state file.
    pub async fn dump_state(&self) -> Result<()> {
        match self.config.state_file.clone() {
            Some(path) => self.dump_state_to(&path).await,
            None => Ok(()),
        }
    }

    /// [`load_state_from`](Self::load_state_from) the configured state file.
    pub async fn load_state(&self) -> Result<()> {
        match self.config.state_file.clone() {
            Some(path) => self.load_state_from(&path).await,
            None => Ok(()),
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // The worker drains what is already queued, then exits.
        self.slot_queue.teardown();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("providers", &self.library.list().len())
            .field("playlist", &self.playlist.len())
            .field("gateway", &self.gateway)
            .field("slot_queue", &self.slot_queue)
            .finish()
    }
}
