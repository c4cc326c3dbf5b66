use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::DIR_SUFFIX;

/// A content hash plus the bookkeeping the rest of the system carries
/// alongside it. Two `HashInfo`s are equal iff `algorithm` and
/// `digest` match (§3); `size`/`entry_count` are metadata, not
/// identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashInfo {
    pub algorithm: String,
    /// Lowercase hex digest. For a directory this carries the
    /// [`crate::DIR_SUFFIX`] suffix, e.g. `"...abcd.dir"`.
    pub digest: String,
    pub size: Option<u64>,
    pub entry_count: Option<u64>,
}

impl HashInfo {
    pub fn new(algorithm: impl Into<String>, digest: impl Into<String>) -> Result<Self, CoreError> {
        let algorithm = algorithm.into();
        let digest = digest.into();
        if algorithm.is_empty() {
            return Err(CoreError::EmptyAlgorithm);
        }
        let plain = digest.strip_suffix(DIR_SUFFIX).unwrap_or(&digest);
        if plain.is_empty() || !plain.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::NotHex(digest));
        }
        Ok(Self {
            algorithm,
            digest,
            size: None,
            entry_count: None,
        })
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_entry_count(mut self, count: u64) -> Self {
        self.entry_count = Some(count);
        self
    }

    /// A directory digest carries [`DIR_SUFFIX`]; see §3.
    pub fn is_dir(&self) -> bool {
        self.digest.ends_with(DIR_SUFFIX)
    }

    /// The digest with any directory suffix stripped, i.e. the digest
    /// of the underlying `FileObject` bytes (for a directory, the
    /// digest of its serialized tree manifest).
    pub fn file_digest(&self) -> &str {
        self.digest.strip_suffix(DIR_SUFFIX).unwrap_or(&self.digest)
    }

    /// Append [`DIR_SUFFIX`] to a plain file digest, producing the
    /// directory form. No-op if already suffixed.
    pub fn into_dir(mut self) -> Self {
        if !self.is_dir() {
            self.digest.push_str(DIR_SUFFIX);
        }
        self
    }

    /// Two-character/rest fan-out path components used by the object
    /// store (`store_root/<xx>/<rest>`), computed over the file
    /// digest (directories are stored as a FileObject too).
    pub fn fanout(&self) -> (&str, &str) {
        let d = self.file_digest();
        d.split_at(2.min(d.len()))
    }
}

impl PartialEq for HashInfo {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.digest == other.digest
    }
}
impl Eq for HashInfo {}

impl PartialOrd for HashInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.algorithm, &self.digest).cmp(&(&other.algorithm, &other.digest))
    }
}

impl std::hash::Hash for HashInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.algorithm.hash(state);
        self.digest.hash(state);
    }
}

impl fmt::Display for HashInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}
