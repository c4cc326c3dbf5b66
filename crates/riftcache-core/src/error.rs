use thiserror::Error;

/// Errors raised by path and hash primitives themselves (parsing,
/// validation). Filesystem/store/state errors live in their own
/// crates and are composed at the `riftcache` facade.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("path contains a backslash, which riftcache never canonicalizes: {0}")]
    BackslashInPath(String),

    #[error("path escapes its root via a `..` component: {0}")]
    ParentTraversal(String),

    #[error("empty hash algorithm name")]
    EmptyAlgorithm,

    #[error("digest is not lowercase hex: {0}")]
    NotHex(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unknown cache link kind: {0}")]
    UnknownLinkKind(String),
}
