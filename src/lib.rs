//! Workspace placeholder crate.
//!
//! This crate exposes a single `server` feature that pulls in the headless
//! FeelUOwn core (`core-service`, `core-playback`, `core-library`). Host
//! applications can depend on `feeluown-workspace` and reach every layer
//! through the re-exports below without wiring each crate individually.

#[cfg(feature = "server")]
pub use core_library as library;
#[cfg(feature = "server")]
pub use core_playback as playback;
#[cfg(feature = "server")]
pub use core_service as service;
