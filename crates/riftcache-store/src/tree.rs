//! Canonical on-disk form of a directory's manifest (§4.5, §7's
//! external-interface table): a JSON array of `{md5, relpath}`
//! entries sorted by `relpath`, stored as an ordinary object under its
//! own digest. Field order is alphabetical to match what Python's
//! `json.dump(..., sort_keys=True)` produces in the system this was
//! modeled on.

use serde::{Deserialize, Serialize};

use riftcache_core::{HashInfo, RelPath};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeEntryDto {
    pub md5: String,
    pub relpath: String,
}

/// One entry of a resolved tree manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub relpath: RelPath,
    pub hash: HashInfo,
}

/// Serialize `entries` (already sorted by relpath by the caller) to
/// the canonical compact JSON form.
pub fn encode(entries: &[TreeEntry]) -> serde_json::Result<Vec<u8>> {
    let dtos: Vec<TreeEntryDto> = entries
        .iter()
        .map(|e| TreeEntryDto {
            md5: e.hash.file_digest().to_string(),
            relpath: e.relpath.to_string(),
        })
        .collect();
    serde_json::to_vec(&dtos)
}

/// Parse a stored tree manifest back into entries. The `algorithm`
/// every entry was hashed with must be supplied since the on-disk
/// form (matching the system this was modeled on) doesn't repeat it
/// per entry.
///
/// Every entry is validated (§4.5): a non-hex digest, an empty
/// algorithm or a relpath that isn't pure POSIX form (a `..`
/// component, a backslash) fails the whole decode with
/// [`StoreError::CorruptTree`] rather than silently dropping the bad
/// entry — a manifest that doesn't fully validate is not trustworthy
/// in part.
pub fn decode(bytes: &[u8], algorithm: &str) -> Result<Vec<TreeEntry>> {
    let dtos: Vec<TreeEntryDto> = serde_json::from_slice(bytes)?;
    dtos.into_iter()
        .map(|dto| {
            let hash = HashInfo::new(algorithm, &dto.md5)
                .map_err(|e| StoreError::CorruptTree(format!("entry {:?}: {e}", dto.relpath)))?;
            let relpath = RelPath::parse(&dto.relpath)
                .map_err(|e| StoreError::CorruptTree(format!("entry {:?}: {e}", dto.relpath)))?;
            Ok(TreeEntry { relpath, hash })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_in_alphabetical_order() {
        let entries = vec![TreeEntry {
            relpath: RelPath::parse("a/b.txt").unwrap(),
            hash: HashInfo::new("md5", "acbd18db4cc2f85cedef654fccc4a4d8").unwrap(),
        }];
        let bytes = encode(&entries).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"[{"md5":"acbd18db4cc2f85cedef654fccc4a4d8","relpath":"a/b.txt"}]"#
        );
    }

    #[test]
    fn round_trips() {
        let entries = vec![TreeEntry {
            relpath: RelPath::parse("x.txt").unwrap(),
            hash: HashInfo::new("md5", "acbd18db4cc2f85cedef654fccc4a4d8").unwrap(),
        }];
        let bytes = encode(&entries).unwrap();
        let decoded = decode(&bytes, "md5").unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn decode_rejects_entry_with_non_hex_digest() {
        let bytes = br#"[{"md5":"not-hex","relpath":"a.txt"}]"#;
        let err = decode(bytes, "md5").unwrap_err();
        assert!(matches!(err, StoreError::CorruptTree(_)));
    }

    #[test]
    fn decode_rejects_entry_with_parent_traversal_relpath() {
        let bytes = br#"[{"md5":"acbd18db4cc2f85cedef654fccc4a4d8","relpath":"../escape.txt"}]"#;
        let err = decode(bytes, "md5").unwrap_err();
        assert!(matches!(err, StoreError::CorruptTree(_)));
    }
}
