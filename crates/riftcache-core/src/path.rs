use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Scheme tag of a [`PathRef`]. The core only ever operates on
/// `Local`; other schemes are opaque to it and passed through to
/// external transports (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Local,
    Ssh,
    S3,
    Other(String),
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Local => write!(f, "local"),
            Scheme::Ssh => write!(f, "ssh"),
            Scheme::S3 => write!(f, "s3"),
            Scheme::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scheme {
    fn from(s: &str) -> Self {
        match s {
            "local" | "" => Scheme::Local,
            "ssh" => Scheme::Ssh,
            "s3" => Scheme::S3,
            other => Scheme::Other(other.to_string()),
        }
    }
}

/// A POSIX-form relative path: a list of non-empty, non-`.`/`..`
/// path components, compared component-wise so two `RelPath`s built
/// from different OS separators still compare equal (§1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelPath(Vec<String>);

impl RelPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a path into POSIX components. Rejects backslashes
    /// outright rather than translating them — a backslash in a
    /// tracked relpath is far more likely to be an accidental
    /// Windows-style path than an intentional filename — and rejects
    /// `..` components, since a directory entry's relpath must stay
    /// inside its tree.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.contains('\\') {
            return Err(CoreError::BackslashInPath(s.to_string()));
        }
        let mut parts = Vec::new();
        for comp in s.split('/') {
            if comp.is_empty() || comp == "." {
                continue;
            }
            if comp == ".." {
                return Err(CoreError::ParentTraversal(s.to_string()));
            }
            parts.push(comp.to_string());
        }
        Ok(Self(parts))
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, child: &str) -> Result<Self, CoreError> {
        let mut parts = self.0.clone();
        let suffix = Self::parse(child)?;
        parts.extend(suffix.0);
        Ok(Self(parts))
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }

    pub fn with_name(&self, name: &str) -> Self {
        let mut parts = self.0.clone();
        if parts.is_empty() {
            parts.push(name.to_string());
        } else {
            let last = parts.len() - 1;
            parts[last] = name.to_string();
        }
        Self(parts)
    }

    /// `self` relative to `base`, given `base` is a prefix of `self`.
    pub fn relative_to(&self, base: &Self) -> Option<Self> {
        if self.0.len() < base.0.len() || &self.0[..base.0.len()] != base.0.as_slice() {
            return None;
        }
        Some(Self(self.0[base.0.len()..].to_vec()))
    }

    pub fn is_in(&self, other: &Self) -> bool {
        self.relative_to(other).is_some()
    }

    /// Canonical POSIX string form, as used for TreeObject entries
    /// (§6).
    pub fn to_posix(&self) -> String {
        self.0.join("/")
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.0.iter().collect()
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_posix())
    }
}

/// A scheme-tagged path (§3). The core's filesystem adapter and
/// object store only ever dereference the `Local` variant; other
/// schemes round-trip through unchanged for external transports to
/// interpret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRef {
    pub scheme: Scheme,
    path: RelPath,
    /// Whether `path` is rooted (e.g. started with `/`); kept
    /// separately from `RelPath`'s component list so equality still
    /// ignores OS separator style.
    pub absolute: bool,
}

impl PathRef {
    pub fn local(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let p = path.as_ref();
        let absolute = p.is_absolute();
        let s = p.to_string_lossy();
        Ok(Self {
            scheme: Scheme::Local,
            path: RelPath::parse(&s)?,
            absolute,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn rel(&self) -> &RelPath {
        &self.path
    }

    pub fn join(&self, child: &str) -> Result<Self, CoreError> {
        Ok(Self {
            scheme: self.scheme.clone(),
            path: self.path.join(child)?,
            absolute: self.absolute,
        })
    }

    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|p| Self {
            scheme: self.scheme.clone(),
            path: p,
            absolute: self.absolute,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            scheme: self.scheme.clone(),
            path: self.path.with_name(name),
            absolute: self.absolute,
        }
    }

    pub fn relative_to(&self, base: &Self) -> Option<RelPath> {
        if self.scheme != base.scheme {
            return None;
        }
        self.path.relative_to(&base.path)
    }

    pub fn is_in(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.path.is_in(&other.path)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.scheme, Scheme::Local)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        if self.absolute {
            PathBuf::from("/").join(self.path.to_path_buf())
        } else {
            self.path.to_path_buf()
        }
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = if self.absolute { "/" } else { "" };
        write!(f, "{}://{}{}", self.scheme, root, self.path.to_posix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_path_rejects_backslash() {
        assert!(RelPath::parse("a\\b").is_err());
    }

    #[test]
    fn rel_path_rejects_parent_traversal() {
        assert!(RelPath::parse("a/../b").is_err());
    }

    #[test]
    fn rel_path_normalizes_dot_and_empty_components() {
        let p = RelPath::parse("a/./b//c").unwrap();
        assert_eq!(p.to_posix(), "a/b/c");
    }

    #[test]
    fn relative_to_and_is_in() {
        let root = RelPath::parse("a/b").unwrap();
        let child = RelPath::parse("a/b/c/d").unwrap();
        assert_eq!(child.relative_to(&root).unwrap().to_posix(), "c/d");
        assert!(child.is_in(&root));
        assert!(!root.is_in(&child));
    }

    #[test]
    fn with_name_replaces_last_component() {
        let p = RelPath::parse("a/b/old").unwrap();
        assert_eq!(p.with_name("new").to_posix(), "a/b/new");
    }

    #[test]
    fn path_ref_equal_regardless_of_os_separator_style() {
        let a = PathRef::local("/x/y/z").unwrap();
        let b = PathRef {
            scheme: Scheme::Local,
            path: RelPath::parse("x/y/z").unwrap(),
            absolute: true,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn non_local_scheme_round_trips() {
        let p = PathRef {
            scheme: Scheme::S3,
            path: RelPath::parse("bucket/key").unwrap(),
            absolute: false,
        };
        assert!(!p.is_local());
        assert_eq!(p.to_path_buf(), PathBuf::from("bucket/key"));
    }
}
