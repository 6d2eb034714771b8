//! # Core Configuration Module
//!
//! Provides configuration management for the FeelUOwn daemon.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance. Every field has a default, so `CoreConfig::builder().build()` is
//! always a valid daemon configuration. The builder validates fail-fast and
//! reports actionable messages through [`Error::Config`].
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .rpc_port(23333)
//!     .pubsub_port(23334)
//!     .audio_select_policy("sq<>")
//!     .standby_sources(["qqmusic", "netease"])
//!     .standby_timeout(Duration::from_millis(1500))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.bind_host(), "127.0.0.1");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // The two servers cannot share a port
//! let config = CoreConfig::builder()
//!     .rpc_port(23333)
//!     .pubsub_port(23333)
//!     .build()
//!     .expect("Should fail - duplicate ports");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RPC_PORT: u16 = 23333;
pub const DEFAULT_PUBSUB_PORT: u16 = 23334;
pub const DEFAULT_AUDIO_SELECT_POLICY: &str = "hq<>";
pub const DEFAULT_VIDEO_SELECT_POLICY: &str = "hd<>";
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_STANDBY_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_RECENTLY_PLAYED_CAPACITY: usize = 100;

/// Traversal suffixes a select policy may end with.
const POLICY_SUFFIXES: &[&str] = &["<<>", ">><", "><", "<>"];
/// Policies that need no target quality.
const POLICY_ABSOLUTE: &[&str] = &[">>>", "<<<"];

/// Core configuration for the daemon.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Port of the RPC server
    pub rpc_port: u16,

    /// Port of the pub/sub server
    pub pubsub_port: u16,

    /// Listen on every interface instead of loopback only
    pub allow_lan_connect: bool,

    /// Sort policy used to pick a song's audio quality, e.g. `hq<>`
    pub audio_select_policy: String,

    /// Sort policy used to pick a video's quality, e.g. `hd<>`
    pub video_select_policy: String,

    /// Provider ids tried, in order, when looking for a standby song.
    /// Empty means every registered provider.
    pub standby_sources: Vec<String>,

    /// Overall timeout of a concurrent search
    pub search_timeout: Duration,

    /// Per-provider timeout while looking for a standby
    pub standby_timeout: Duration,

    /// Where the playback state is persisted, if anywhere
    pub state_file: Option<PathBuf>,

    /// Maximum length of the recently played list
    pub recently_played_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rpc_port: DEFAULT_RPC_PORT,
            pubsub_port: DEFAULT_PUBSUB_PORT,
            allow_lan_connect: false,
            audio_select_policy: DEFAULT_AUDIO_SELECT_POLICY.to_string(),
            video_select_policy: DEFAULT_VIDEO_SELECT_POLICY.to_string(),
            standby_sources: Vec::new(),
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            standby_timeout: DEFAULT_STANDBY_TIMEOUT,
            state_file: None,
            recently_played_capacity: DEFAULT_RECENTLY_PLAYED_CAPACITY,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Address both servers bind to.
    pub fn bind_host(&self) -> &'static str {
        if self.allow_lan_connect {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The two server ports are distinct
    /// - Select policies are well formed
    /// - Timeouts are non-zero
    /// - The recently played list can hold at least one song
    pub fn validate(&self) -> Result<()> {
        if self.rpc_port == self.pubsub_port && self.rpc_port != 0 {
            return Err(Error::Config(format!(
                "RPC and pub/sub servers cannot share port {}. \
                 Use .pubsub_port() to pick another one.",
                self.rpc_port
            )));
        }

        validate_policy("audio_select_policy", &self.audio_select_policy)?;
        validate_policy("video_select_policy", &self.video_select_policy)?;

        if self.search_timeout.is_zero() {
            return Err(Error::Config(
                "Search timeout must be greater than 0".to_string(),
            ));
        }

        if self.standby_timeout.is_zero() {
            return Err(Error::Config(
                "Standby timeout must be greater than 0".to_string(),
            ));
        }

        if self.recently_played_capacity == 0 {
            return Err(Error::Config(
                "Recently played capacity must be at least 1".to_string(),
            ));
        }

        if self.standby_sources.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::Config(
                "Standby sources cannot contain empty provider ids".to_string(),
            ));
        }

        Ok(())
    }
}

/// Shape check only; quality names are resolved by the library.
fn validate_policy(field: &str, policy: &str) -> Result<()> {
    if POLICY_ABSOLUTE.contains(&policy) {
        return Ok(());
    }
    let well_formed = POLICY_SUFFIXES.iter().any(|suffix| {
        policy
            .strip_suffix(suffix)
            .map(|quality| !quality.is_empty() && quality.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or(false)
    });
    if well_formed {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid {field} '{policy}'. Expected a quality followed by one of \
             '><', '<>', '<<>', '>><', or one of '>>>', '<<<'."
        )))
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset options fall back to the defaults of [`CoreConfig::default`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    rpc_port: Option<u16>,
    pubsub_port: Option<u16>,
    allow_lan_connect: Option<bool>,
    audio_select_policy: Option<String>,
    video_select_policy: Option<String>,
    standby_sources: Option<Vec<String>>,
    search_timeout: Option<Duration>,
    standby_timeout: Option<Duration>,
    state_file: Option<PathBuf>,
    recently_played_capacity: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the RPC port. `0` lets the OS pick one, which tests rely on.
    pub fn rpc_port(mut self, port: u16) -> Self {
        self.rpc_port = Some(port);
        self
    }

    pub fn pubsub_port(mut self, port: u16) -> Self {
        self.pubsub_port = Some(port);
        self
    }

    pub fn allow_lan_connect(mut self, allow: bool) -> Self {
        self.allow_lan_connect = Some(allow);
        self
    }

    pub fn audio_select_policy(mut self, policy: impl Into<String>) -> Self {
        self.audio_select_policy = Some(policy.into());
        self
    }

    pub fn video_select_policy(mut self, policy: impl Into<String>) -> Self {
        self.video_select_policy = Some(policy.into());
        self
    }

    /// Sets the provider ids tried when looking for a standby song.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let config = CoreConfig::builder()
    ///     .standby_sources(vec!["kuwo".to_string()])
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.standby_sources, ["kuwo"]);
    /// ```
    pub fn standby_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.standby_sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    pub fn standby_timeout(mut self, timeout: Duration) -> Self {
        self.standby_timeout = Some(timeout);
        self
    }

    pub fn state_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn recently_played_capacity(mut self, capacity: usize) -> Self {
        self.recently_played_capacity = Some(capacity);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a value is out of range or the servers
    /// would collide on the same port.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();
        let config = CoreConfig {
            rpc_port: self.rpc_port.unwrap_or(defaults.rpc_port),
            pubsub_port: self.pubsub_port.unwrap_or(defaults.pubsub_port),
            allow_lan_connect: self.allow_lan_connect.unwrap_or(defaults.allow_lan_connect),
            audio_select_policy: self
                .audio_select_policy
                .unwrap_or(defaults.audio_select_policy),
            video_select_policy: self
                .video_select_policy
                .unwrap_or(defaults.video_select_policy),
            standby_sources: self.standby_sources.unwrap_or(defaults.standby_sources),
            search_timeout: self.search_timeout.unwrap_or(defaults.search_timeout),
            standby_timeout: self.standby_timeout.unwrap_or(defaults.standby_timeout),
            state_file: self.state_file.or(defaults.state_file),
            recently_played_capacity: self
                .recently_played_capacity
                .unwrap_or(defaults.recently_played_capacity),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let config = CoreConfig::builder().build().unwrap();

        assert_eq!(config.rpc_port, 23333);
        assert_eq!(config.pubsub_port, 23334);
        assert!(!config.allow_lan_connect);
        assert_eq!(config.audio_select_policy, "hq<>");
        assert_eq!(config.video_select_policy, "hd<>");
        assert!(config.standby_sources.is_empty());
        assert_eq!(config.search_timeout, Duration::from_secs(3));
        assert_eq!(config.standby_timeout, Duration::from_secs(2));
        assert_eq!(config.state_file, None);
        assert_eq!(config.recently_played_capacity, 100);
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_bind_host() {
        let local = CoreConfig::builder().build().unwrap();
        assert_eq!(local.bind_host(), "127.0.0.1");

        let lan = CoreConfig::builder().allow_lan_connect(true).build().unwrap();
        assert_eq!(lan.bind_host(), "0.0.0.0");
    }

    #[test]
    fn test_builder_rejects_shared_port() {
        let result = CoreConfig::builder().rpc_port(9000).pubsub_port(9000).build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot share port 9000"));
    }

    #[test]
    fn test_ephemeral_ports_may_both_be_zero() {
        let config = CoreConfig::builder().rpc_port(0).pubsub_port(0).build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_policy_validation() {
        for policy in ["hq<>", "sq><", "shq<<>", "lq>><", ">>>", "<<<", "fhd<>"] {
            assert!(
                validate_policy("audio_select_policy", policy).is_ok(),
                "{policy}"
            );
        }
        for policy in ["", "hq", "<>", "hq<<", "h1<>", "hq<>>"] {
            assert!(
                validate_policy("audio_select_policy", policy).is_err(),
                "{policy}"
            );
        }
    }

    #[test]
    fn test_builder_rejects_bad_policy() {
        let result = CoreConfig::builder().video_select_policy("best").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("video_select_policy")));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        assert!(CoreConfig::builder()
            .search_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(CoreConfig::builder()
            .standby_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let result = CoreConfig::builder().recently_played_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_standby_sources_keep_order() {
        let config = CoreConfig::builder()
            .standby_sources(["qqmusic", "netease", "kuwo"])
            .build()
            .unwrap();
        assert_eq!(config.standby_sources, ["qqmusic", "netease", "kuwo"]);

        assert!(CoreConfig::builder()
            .standby_sources([" "])
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_accepts_state_file() {
        let config = CoreConfig::builder()
            .state_file("/tmp/fuo/state.json")
            .build()
            .unwrap();
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/fuo/state.json")));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder().rpc_port(1).pubsub_port(2).build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.rpc_port, 1);
        assert_eq!(cloned, config);
    }
}
