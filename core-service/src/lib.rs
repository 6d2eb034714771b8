//! # Core Service
//!
//! The application context and its line-protocol servers.
//!
//! ## Overview
//!
//! - [`create_app`] builds the [`App`]: library, player, playlist, FM, live
//!   lyric and recently played list, wired together through signals
//! - [`FuoServer`] serves the RPC and pub/sub ports
//! - [`dsl`] parses request lines of both protocol versions
//! - [`handlers`] run the commands, [`serializers`] render their output
//! - [`gateway`] fans application events out to subscribed sessions
//!
//! ```no_run
//! # async fn example(engine: std::sync::Arc<dyn bridge_traits::MediaEngine>) -> core_service::Result<()> {
//! use core_runtime::config::CoreConfig;
//! use core_service::{create_app, FuoServer};
//!
//! let app = create_app(CoreConfig::default(), engine)?;
//! app.load_state().await?;
//! FuoServer::bind(app).await?.serve().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod dsl;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod protocol;
pub mod serializers;
pub mod server;
pub mod session;

pub use app::{create_app, App};
pub use error::{Result, ServiceError};
pub use gateway::Gateway;
pub use protocol::{ProtocolVersion, Response};
pub use server::FuoServer;
pub use session::Session;
