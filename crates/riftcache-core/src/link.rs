use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One mechanism for making a working-tree path refer to an object's
/// bytes (§4.6, §6's `cache.type`). Shared between `riftcache-config`
/// (parsing the configured preference list) and `riftcache-link`
/// (acting on it) so neither crate depends on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Reflink,
    Hardlink,
    Symlink,
    Copy,
}

impl LinkKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            LinkKind::Reflink => "reflink",
            LinkKind::Hardlink => "hardlink",
            LinkKind::Symlink => "symlink",
            LinkKind::Copy => "copy",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reflink" => Ok(LinkKind::Reflink),
            "hardlink" => Ok(LinkKind::Hardlink),
            "symlink" => Ok(LinkKind::Symlink),
            "copy" => Ok(LinkKind::Copy),
            other => Err(CoreError::UnknownLinkKind(other.to_string())),
        }
    }
}

/// The default preference order (§6): try the cheapest, most
/// space-sharing mechanism first, falling back to a plain copy.
pub fn default_link_types() -> Vec<LinkKind> {
    vec![
        LinkKind::Reflink,
        LinkKind::Hardlink,
        LinkKind::Symlink,
        LinkKind::Copy,
    ]
}
