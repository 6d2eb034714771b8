use bridge_traits::EngineState;
use std::sync::Arc;

use crate::app::App;
use crate::serializers::{NowPlaying, Output, StatusReport};

pub fn report(app: &App) -> StatusReport {
    let player = &app.player;
    let state = player.state();
    let now_playing = match (state, app.playlist.current_song()) {
        (EngineState::Playing | EngineState::Paused, Some(song)) => Some(NowPlaying {
            duration: player.duration(),
            position: player.position(),
            song,
            lyric_sentence: app.live_lyric.current_sentence(),
        }),
        _ => None,
    };
    StatusReport {
        playback_mode: app.playlist.playback_mode(),
        volume: player.volume(),
        state,
        now_playing,
    }
}

pub fn status(app: &Arc<App>) -> Output {
    Output::Status(report(app))
}
