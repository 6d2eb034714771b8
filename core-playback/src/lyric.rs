//! Live lyric: maps the playback position to the current LRC sentence.

use core_library::models::{BriefSong, Lyric};
use core_library::Library;
use core_runtime::{Delivery, PreemptiveTaskSpec, Signal, TaskManager};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::player::Player;
use crate::playlist::Playlist;

/// Sentences are shown slightly before their timestamp.
const LOOKAHEAD_MS: u64 = 300;

const FETCH_TASK_NAME: &str = "live-lyric.fetch";

/// Parse LRC text into `(milliseconds, sentence)` pairs sorted by time.
///
/// A line may carry several time tags (`[01:30][01:10]text`). Tags written as
/// `mm:ss:xx` are read as `mm:ss.xx`. Lines without a valid tag are ignored.
pub fn parse_lrc(content: &str) -> Vec<(u64, String)> {
    let mut entries: Vec<(u64, String)> = Vec::new();
    for line in content.lines() {
        let mut rest = line.trim_start();
        let mut times = Vec::new();
        while let Some(tagged) = rest.strip_prefix('[') {
            let Some(end) = tagged.find(']') else { break };
            match parse_time_tag(&tagged[..end]) {
                Some(ms) => times.push(ms),
                None => break,
            }
            rest = &tagged[end + 1..];
        }
        for ms in times {
            match entries.iter_mut().find(|(t, _)| *t == ms) {
                Some(entry) => entry.1 = rest.to_string(),
                None => entries.push((ms, rest.to_string())),
            }
        }
    }
    entries.sort_by_key(|(ms, _)| *ms);
    entries
}

fn parse_time_tag(tag: &str) -> Option<u64> {
    let (minutes, seconds) = tag.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.replace(':', ".").trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(minutes * 60_000 + (seconds * 1000.0) as u64)
}

/// Index of the last element `<= value` in a sorted slice.
fn find_previous(value: u64, sorted: &[u64]) -> Option<usize> {
    match sorted.partition_point(|t| *t <= value) {
        0 => None,
        n => Some(n - 1),
    }
}

#[derive(Debug, Clone)]
struct LyricCursor {
    times: Vec<u64>,
    sentences: Vec<String>,
    index: Option<usize>,
}

impl LyricCursor {
    fn from_content(content: &str) -> Self {
        let (times, sentences) = parse_lrc(content).into_iter().unzip();
        Self {
            times,
            sentences,
            index: None,
        }
    }

    fn current(&self) -> String {
        self.index
            .and_then(|i| self.sentences.get(i).cloned())
            .unwrap_or_default()
    }

    /// Move to `position` seconds; returns whether the sentence changed.
    fn update_position(&mut self, position: f64) -> bool {
        let ms = (position.max(0.0) * 1000.0) as u64 + LOOKAHEAD_MS;
        let index = find_previous(ms, &self.times);
        if index.is_some() && index != self.index {
            self.index = index;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub origin: String,
    pub trans: String,
    pub has_trans: bool,
}

#[derive(Default)]
struct LiveLyricState {
    lyric: Option<LyricCursor>,
    trans: Option<LyricCursor>,
    line: LyricLine,
}

pub struct LiveLyric {
    library: Arc<Library>,
    fetch: Arc<PreemptiveTaskSpec>,
    state: Mutex<LiveLyricState>,

    pub sentence_changed: Signal<String>,
    pub line_changed: Signal<LyricLine>,
    /// Whether a lyric is loaded now.
    pub lyrics_changed: Signal<bool>,
}

impl LiveLyric {
    pub fn new(library: Arc<Library>, tasks: &TaskManager) -> Arc<Self> {
        Arc::new(Self {
            library,
            fetch: tasks.get_or_create(FETCH_TASK_NAME),
            state: Mutex::new(LiveLyricState::default()),
            sentence_changed: Signal::new("live_lyric.sentence_changed"),
            line_changed: Signal::new("live_lyric.line_changed"),
            lyrics_changed: Signal::new("live_lyric.lyrics_changed"),
        })
    }

    /// Follow `playlist.song_changed` and `player.position_changed`.
    /// Follow the playlist and the player. Pass a queued delivery when the
    /// player may emit from the engine's thread.
    pub fn connect(self: &Arc<Self>, playlist: &Playlist, player: &Player, delivery: Delivery) {
        playlist
            .song_changed
            .connect_method(self, LiveLyric::on_song_changed, delivery.clone());
        player
            .position_changed
            .connect_method(self, LiveLyric::on_position_changed, delivery);
    }

    pub fn current_sentence(&self) -> String {
        let state = self.state.lock();
        state.lyric.as_ref().map(LyricCursor::current).unwrap_or_default()
    }

    pub fn current_line(&self) -> LyricLine {
        self.state.lock().line.clone()
    }

    pub fn on_song_changed(self: &Arc<Self>, song: Option<BriefSong>) {
        let Some(song) = song else {
            self.set_lyric(None);
            return;
        };
        let this = Arc::clone(self);
        self.fetch.bind_coro(async move {
            let lyric = match this.library.song_get_lyric(&song).await {
                Ok(lyric) => lyric,
                Err(err) => {
                    warn!(song = %song.title, error = %err, "Get lyric failed");
                    None
                }
            };
            this.set_lyric(lyric.as_ref());
        });
    }

    pub fn on_position_changed(self: &Arc<Self>, position: f64) {
        let changed = {
            let mut state = self.state.lock();
            let LiveLyricState { lyric, trans, line } = &mut *state;
            let moved = lyric
                .as_mut()
                .map(|cursor| cursor.update_position(position))
                .unwrap_or(false);
            match lyric.as_ref() {
                Some(cursor) if moved => {
                    let has_trans = trans.is_some();
                    let trans_sentence = match trans.as_mut() {
                        Some(trans) => {
                            trans.update_position(position);
                            trans.current()
                        }
                        None => String::new(),
                    };
                    *line = LyricLine {
                        origin: cursor.current(),
                        trans: trans_sentence,
                        has_trans,
                    };
                    Some(line.clone())
                }
                _ => None,
            }
        };
        if let Some(line) = changed {
            self.sentence_changed.emit(line.origin.clone());
            self.line_changed.emit(line);
        }
    }

    pub fn set_lyric(&self, lyric: Option<&Lyric>) {
        let loaded = {
            let mut state = self.state.lock();
            match lyric.filter(|l| !l.content.is_empty()) {
                Some(lyric) => {
                    state.lyric = Some(LyricCursor::from_content(&lyric.content));
                    state.trans = (!lyric.trans_content.is_empty())
                        .then(|| LyricCursor::from_content(&lyric.trans_content));
                }
                None => {
                    state.lyric = None;
                    state.trans = None;
                }
            }
            state.line = LyricLine::default();
            state.lyric.is_some()
        };
        debug!(loaded, "Lyric changed");
        self.lyrics_changed.emit(loaded);
    }
}
