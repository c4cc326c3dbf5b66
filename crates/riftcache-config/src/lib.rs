//! # riftcache-config
//!
//! Layered configuration for a riftcache repository: compiled-in
//! defaults, overridden by `<repo_root>/.riftcache/config.toml`,
//! overridden in turn by `RIFTCACHE_*` environment variables, resolved
//! through a field-by-field `Config::merge` rather than `Option`
//! sentinels throughout.

pub mod logging;
mod error;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{ConfigError, Result};
pub use riftcache_core::LinkKind;

/// Conventional metadata directory name under a repository root,
/// holding `config.toml`, the process lock and the state cache's
/// backing file (§6).
pub const META_DIR: &str = ".riftcache";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The full configuration surface consumed by the core (§6's table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub core: CoreConfig,
    pub state: StateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            core: CoreConfig::default(),
            state: StateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// `cache.type`: ordered preference list for C6's link policy.
    #[serde(rename = "type")]
    pub link_type: Vec<LinkKind>,
    /// `cache.protected`: chmod finalized objects to `0o444`.
    pub protected: bool,
    /// `cache.shared`: umask policy for newly created objects.
    pub shared: SharedMode,
    /// `cache.dir`: the object store root.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            link_type: riftcache_core::default_link_types(),
            protected: true,
            shared: SharedMode::None,
            dir: PathBuf::from(META_DIR).join("cache"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedMode {
    None,
    Group,
}

impl SharedMode {
    /// The umask value implied by this sharing policy: `0o022` for an
    /// exclusive cache, `0o002` to leave the group-write bit alone
    /// for a cache shared across a team.
    pub fn umask(self) -> u32 {
        match self {
            SharedMode::None => 0o022,
            SharedMode::Group => 0o002,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// `core.checksum_jobs`: C4's worker pool size.
    pub checksum_jobs: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            checksum_jobs: default_checksum_jobs(),
        }
    }
}

/// `min(4, cpu_count/2)`, at least 1: checksumming is I/O-bound enough
/// that more threads rarely helps and can thrash spinning disks.
pub fn default_checksum_jobs() -> usize {
    (num_cpus::get() / 2).clamp(1, 4)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// `state.row_limit`: C3's eviction threshold.
    pub row_limit: u64,
    /// `state.row_cleanup_quota`: extra fraction (0-100) evicted per sweep.
    pub row_cleanup_quota: u8,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            row_limit: 100_000_000,
            row_cleanup_quota: 50,
        }
    }
}

impl Config {
    /// Load defaults merged over `<project_root>/.riftcache/config.toml`,
    /// then environment overrides. No global (`$HOME`) layer: a
    /// riftcache repository's cache directory is inherently
    /// per-project, so there is nothing meaningful to put in a
    /// user-wide default beyond what env vars already cover.
    pub fn load_for_project(project_root: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.cache.dir = project_root.join(META_DIR).join("cache");

        let config_path = project_root.join(META_DIR).join(CONFIG_FILE_NAME);
        if config_path.exists() {
            debug!(path = %config_path.display(), "loading project config");
            let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;
            let loaded: Config = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                path: config_path.clone(),
                source,
            })?;
            config.merge(loaded, &Config::default());
            if !contents.contains("dir") {
                config.cache.dir = project_root.join(META_DIR).join("cache");
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Field-by-field override: a value from `other` replaces `self`'s
    /// only where it differs from a fresh default, so an unset TOML
    /// field never clobbers a value already resolved above.
    fn merge(&mut self, other: Config, default: &Config) {
        if other.cache.link_type != default.cache.link_type {
            self.cache.link_type = other.cache.link_type;
        }
        if other.cache.protected != default.cache.protected {
            self.cache.protected = other.cache.protected;
        }
        if other.cache.shared != default.cache.shared {
            self.cache.shared = other.cache.shared;
        }
        if other.cache.dir != default.cache.dir {
            self.cache.dir = other.cache.dir;
        }
        if other.core.checksum_jobs != default.core.checksum_jobs {
            self.core.checksum_jobs = other.core.checksum_jobs;
        }
        if other.state.row_limit != default.state.row_limit {
            self.state.row_limit = other.state.row_limit;
        }
        if other.state.row_cleanup_quota != default.state.row_cleanup_quota {
            self.state.row_cleanup_quota = other.state.row_cleanup_quota;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("RIFTCACHE_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Ok(types) = std::env::var("RIFTCACHE_CACHE_TYPE") {
            let parsed: std::result::Result<Vec<LinkKind>, _> =
                types.split(',').map(LinkKind::from_str).collect();
            match parsed {
                Ok(list) if !list.is_empty() => self.cache.link_type = list,
                _ => debug!(value = %types, "ignoring invalid RIFTCACHE_CACHE_TYPE"),
            }
        }
        if let Ok(protected) = std::env::var("RIFTCACHE_CACHE_PROTECTED") {
            if let Ok(v) = protected.parse() {
                self.cache.protected = v;
            }
        }
        if let Ok(jobs) = std::env::var("RIFTCACHE_CHECKSUM_JOBS") {
            if let Ok(n) = jobs.parse() {
                self.core.checksum_jobs = n;
            }
        }
        if let Ok(limit) = std::env::var("RIFTCACHE_ROW_LIMIT") {
            if let Ok(n) = limit.parse() {
                self.state.row_limit = n;
            }
        }
        if let Ok(quota) = std::env::var("RIFTCACHE_ROW_CLEANUP_QUOTA") {
            if let Ok(n) = quota.parse() {
                self.state.row_cleanup_quota = n;
            }
        }
    }
}
