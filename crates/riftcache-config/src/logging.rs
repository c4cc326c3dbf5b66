//! Structured logging for riftcache components.
//!
//! Every log line carries a `component` field so a single combined
//! log stream (object store writes interleaved with state-cache
//! lookups interleaved with checkout progress) can still be filtered
//! per subsystem.
//!
//! ```ignore
//! use riftcache_config::logging::*;
//!
//! log_store_info!("wrote object", hash = %info.digest);
//! log_state_debug!("inode miss", inode = ino);
//! ```

/// Component identifiers used as the `component` field on every line.
pub struct Component;

impl Component {
    pub const STATE: &'static str = "STATE";
    pub const STORE: &'static str = "STORE";
    pub const HASH: &'static str = "HASH";
    pub const LINK: &'static str = "LINK";
    pub const IGNORE: &'static str = "IGNORE";
    pub const CHECKOUT: &'static str = "CHECKOUT";
    pub const GC: &'static str = "GC";
}

/// Log levels for runtime configuration, independent of `RUST_LOG`
/// syntax so callers (e.g. a CLI `--verbose` flag) don't need to know
/// `tracing`'s filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// === STATE logging macros ===

#[macro_export]
macro_rules! log_state_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "STATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_state_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "STATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_state_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STATE", $($key = $value,)* $msg)
    };
}

// === STORE logging macros ===

#[macro_export]
macro_rules! log_store_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "STORE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_store_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "STORE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_store_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STORE", $($key = $value,)* $msg)
    };
}

// === HASH logging macros ===

#[macro_export]
macro_rules! log_hash_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "HASH", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_hash_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "HASH", $($key = $value,)* $msg)
    };
}

// === LINK logging macros ===

#[macro_export]
macro_rules! log_link_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "LINK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_link_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LINK", $($key = $value,)* $msg)
    };
}

// === IGNORE logging macros ===

#[macro_export]
macro_rules! log_ignore_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "IGNORE", $($key = $value,)* $msg)
    };
}

// === CHECKOUT logging macros ===

#[macro_export]
macro_rules! log_checkout_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "CHECKOUT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_checkout_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CHECKOUT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_checkout_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CHECKOUT", $($key = $value,)* $msg)
    };
}

// === GC logging macros ===

#[macro_export]
macro_rules! log_gc_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "GC", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_gc_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "GC", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_gc_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "GC", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter. Call once at
/// process startup; `RUST_LOG` takes precedence when set.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
