//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the FeelUOwn core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Signal/slot dispatch with an optional queued worker
//! - Preemptive task management
//! - Event bus feeding the pub/sub topics
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on. It
//! establishes the async runtime patterns, logging conventions, and the
//! in-process wiring (signals) that couples the library, playlist, player and
//! server without back-pointers between them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod signal;
pub mod task;

pub use error::{Error, Result};
pub use signal::{Delivery, Signal, SlotKey, SlotQueue};
pub use task::{PreemptiveTaskSpec, TaskHandle, TaskManager};
