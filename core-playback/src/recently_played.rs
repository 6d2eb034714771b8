//! Most recently played songs, newest first.

use core_library::models::BriefSong;
use core_runtime::config::DEFAULT_RECENTLY_PLAYED_CAPACITY;
use core_runtime::{Delivery, Signal};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::playlist::Playlist;

pub struct RecentlyPlayed {
    capacity: usize,
    songs: Mutex<VecDeque<BriefSong>>,
    pub changed: Signal<()>,
}

impl Default for RecentlyPlayed {
    fn default() -> Self {
        Self::new(DEFAULT_RECENTLY_PLAYED_CAPACITY)
    }
}

impl RecentlyPlayed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            songs: Mutex::new(VecDeque::new()),
            changed: Signal::new("recently_played.changed"),
        }
    }

    /// Follow `playlist.song_changed`.
    pub fn connect(self: &Arc<Self>, playlist: &Playlist, delivery: Delivery) {
        playlist
            .song_changed
            .connect_method(self, RecentlyPlayed::on_song_changed, delivery);
    }

    fn on_song_changed(self: &Arc<Self>, song: Option<BriefSong>) {
        if let Some(song) = song {
            self.push(song);
        }
    }

    /// Move `song` to the front, dropping the oldest entry when full.
    pub fn push(&self, song: BriefSong) {
        {
            let mut songs = self.songs.lock();
            songs.retain(|s| s != &song);
            songs.push_front(song);
            songs.truncate(self.capacity);
        }
        self.changed.emit(());
    }

    pub fn list(&self) -> Vec<BriefSong> {
        self.songs.lock().iter().cloned().collect()
    }

    /// Replace the content, e.g. with a restored snapshot.
    pub fn init_from(&self, songs: Vec<BriefSong>) {
        {
            let mut list = self.songs.lock();
            list.clear();
            for song in songs {
                if list.len() >= self.capacity {
                    break;
                }
                if !list.contains(&song) {
                    list.push_back(song);
                }
            }
        }
        self.changed.emit(());
    }

    pub fn len(&self) -> usize {
        self.songs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> BriefSong {
        BriefSong::new("local", id, id)
    }

    #[test]
    fn test_newest_first_and_dedup() {
        let recent = RecentlyPlayed::new(3);
        for id in ["1", "2", "3", "2", "4"] {
            recent.push(song(id));
        }
        let ids: Vec<String> = recent.list().into_iter().map(|s| s.identifier).collect();
        assert_eq!(ids, ["4", "2", "3"]);
    }

    #[test]
    fn test_init_from_respects_capacity() {
        let recent = RecentlyPlayed::new(2);
        recent.init_from(vec![song("1"), song("1"), song("2"), song("3")]);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.list()[1].identifier, "2");
    }
}
