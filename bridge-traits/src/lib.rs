//! # Host Bridge Traits
//!
//! Contracts between the headless core and the collaborators it drives but
//! does not implement.
//!
//! ## Overview
//!
//! The core never decodes audio itself. Playback is delegated to a media
//! engine (a libmpv-like library) that the host wires in through the
//! [`MediaEngine`](playback::MediaEngine) trait. The engine reports its own
//! progress through an [`EngineEvent`](playback::EngineEvent) channel which
//! the player facade drains on the async runtime.
//!
//! ## Traits
//!
//! - [`MediaEngine`](playback::MediaEngine) - play/pause/stop/seek a [`Media`](playback::Media)
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Engine
//! implementations should convert their native error codes into
//! `BridgeError::OperationFailed` or `BridgeError::MediaRejected` with an
//! actionable message.
//!
//! ## Thread Safety
//!
//! Engines may deliver events from their own internal thread, so every trait
//! requires `Send + Sync`. Events cross threads through an unbounded tokio
//! channel and are never delivered to signal receivers directly.

pub mod error;
pub mod playback;

pub use error::BridgeError;

pub use playback::{
    EngineEvent, EngineEventSender, EngineState, Media, MediaEngine, MediaFinishReason,
    VideoAudioManifest,
};
