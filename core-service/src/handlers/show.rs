//! `show <uri>`
//!
//! ```text
//! fuo://                          providers
//! fuo://server/sessions/me        options of the current session
//! fuo://<p>                       one provider
//! fuo://<p>/users/me              logged-in user
//! fuo://<p>/<plural>/<id>         a model, every field
//! fuo://<p>/songs/<id>/lyric      lyric text
//! fuo://<p>/playlists/<id>/songs
//! fuo://<p>/albums/<id>/songs
//! fuo://<p>/artists/<id>/albums
//! ```

use core_library::models::{BriefAlbum, BriefArtist, BriefPlaylist, BriefSong, Model, ModelType};
use core_library::uri::{split_comment, SCHEME};
use tracing::instrument;

use super::Context;
use crate::error::{Result, ServiceError};
use crate::serializers::{Output, ProviderInfo};

#[instrument(skip(ctx))]
pub async fn show(ctx: &Context<'_>, uri: &str) -> Result<Output> {
    let (uri, _) = split_comment(uri);
    let path = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| ServiceError::handler(format!("invalid uri: {uri}")))?
        .trim_end_matches('/');
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let library = &ctx.app.library;

    let Some((&source, rest)) = parts.split_first() else {
        let mut providers: Vec<ProviderInfo> =
            library.list().iter().map(|p| ProviderInfo::of(p.as_ref())).collect();
        providers.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        return Ok(Output::Providers(providers));
    };

    if source == "server" {
        return match rest {
            ["sessions", "me"] => {
                let options = ctx.session.options();
                Ok(Output::Text(format!(
                    "   rpc_version: {}\npubsub_version: {}",
                    options.rpc_version, options.pubsub_version
                )))
            }
            _ => Err(not_found(path)),
        };
    }

    let provider = library
        .get(source)
        .ok_or_else(|| ServiceError::handler(format!("provider:{source} not found")))?;

    let output = match rest {
        [] => Output::Providers(vec![ProviderInfo::of(provider.as_ref())]),
        ["users", "me"] => Output::Model(library.current_user(source).await?.into()),
        ["songs", id, "lyric"] => {
            let song = BriefSong::new(source, *id, "");
            let lyric = library.song_get_lyric(&song).await?;
            Output::Text(lyric.map(|l| l.content).unwrap_or_default())
        }
        ["playlists", id, "songs"] => {
            let playlist = BriefPlaylist {
                identifier: id.to_string(),
                source: source.to_string(),
                ..BriefPlaylist::default()
            };
            songs_output(library.playlist_list_songs(&playlist).await?)
        }
        ["albums", id, "songs"] => {
            let album = BriefAlbum::new(source, *id, "");
            songs_output(library.album_list_songs(&album).await?)
        }
        ["artists", id, "albums"] => {
            let artist = BriefArtist::new(source, *id, "");
            let albums = library.artist_list_albums(&artist).await?;
            Output::Models(albums.into_iter().map(Model::from).collect())
        }
        [plural, id] => {
            let model_type = ModelType::from_plural(plural).ok_or_else(|| not_found(path))?;
            Output::Model(library.model_get(source, model_type, id).await?)
        }
        _ => return Err(not_found(path)),
    };
    Ok(output)
}

fn songs_output(songs: Vec<BriefSong>) -> Output {
    Output::Models(songs.into_iter().map(Model::from).collect())
}

fn not_found(path: &str) -> ServiceError {
    ServiceError::handler(format!("path /{path} not found"))
}
