//! # riftcache-link
//!
//! The link policy (§4.6): an ordered preference list of mechanisms
//! for making a working-tree path refer to an object's bytes, tried
//! in order and popped on failure until one sticks. Once one has been
//! verified to actually work, later calls skip the verification (the
//! filesystem isn't going to change its mind about supporting
//! hardlinks mid-run).

mod error;

pub use error::{LinkError, Result};

use std::path::Path;

use riftcache_config::{log_link_debug, log_link_warn};
use riftcache_core::LinkKind;
use riftcache_fs::FileSystem;

/// Mutable, per-repository policy state: the remaining candidates
/// (earlier ones are popped off after failing once) and whether one
/// has already been confirmed to work.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    candidates: Vec<LinkKind>,
    confirmed: bool,
}

impl LinkPolicy {
    pub fn new(preference: Vec<LinkKind>) -> Self {
        Self {
            candidates: preference,
            confirmed: false,
        }
    }

    /// The link type that would be tried next, if any remain.
    pub fn active(&self) -> Option<LinkKind> {
        self.candidates.first().copied()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Whether every remaining candidate is `copy` (so a copy is
    /// guaranteed and there's no point probing further, §4.6).
    pub fn is_copy_only(&self) -> bool {
        self.candidates.iter().all(|k| *k == LinkKind::Copy)
    }

    /// Materialize `dst` as a reference to `src`'s bytes, trying each
    /// remaining candidate in order and dropping any that fails
    /// (§4.6's pop-on-failure loop, mirroring `_try_links`).
    pub fn materialize(&mut self, fs: &dyn FileSystem, src: &Path, dst: &Path) -> Result<LinkKind> {
        while let Some(kind) = self.candidates.first().copied() {
            match self.try_one(fs, kind, src, dst) {
                Ok(()) => return Ok(kind),
                Err(e) => {
                    log_link_debug!(
                        "link type did not work, trying next",
                        kind = kind.as_str(),
                        error = %e
                    );
                    self.candidates.remove(0);
                }
            }
        }
        log_link_warn!("exhausted every configured link type", dst = %dst.display());
        Err(LinkError::Exhausted(dst.to_path_buf()))
    }

    fn try_one(&mut self, fs: &dyn FileSystem, kind: LinkKind, src: &Path, dst: &Path) -> Result<()> {
        do_link(fs, kind, src, dst)?;
        match self.verify(fs, kind, src, dst) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs.remove(dst);
                Err(e)
            }
        }
    }

    /// §4.6: a zero-byte hardlink is exempt (every empty file shares
    /// one digest and `FileSystem::hardlink` already degrades it to a
    /// plain file). Once any candidate has verified successfully,
    /// later calls skip straight through.
    fn verify(&mut self, fs: &dyn FileSystem, kind: LinkKind, src: &Path, dst: &Path) -> Result<()> {
        if kind == LinkKind::Hardlink && fs.getsize(src).unwrap_or(1) == 0 {
            self.confirmed = true;
            return Ok(());
        }
        if self.confirmed {
            return Ok(());
        }

        let ok = match kind {
            LinkKind::Hardlink => fs.is_hardlink(dst)?,
            LinkKind::Symlink => fs.is_symlink(dst),
            // reflink/copy are indistinguishable after the fact on
            // most filesystems (§9's open-question resolution); trust
            // the call that created them.
            LinkKind::Reflink | LinkKind::Copy => true,
        };

        if !ok {
            return Err(LinkError::Fs(riftcache_fs::FsError::Unsupported(
                "link type did not verify",
            )));
        }

        self.confirmed = true;
        Ok(())
    }
}

fn do_link(fs: &dyn FileSystem, kind: LinkKind, src: &Path, dst: &Path) -> Result<()> {
    if fs.exists(dst) {
        return Err(LinkError::AlreadyExists(dst.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs.makedirs(parent)?;
    }
    match kind {
        LinkKind::Reflink => fs.reflink(src, dst)?,
        LinkKind::Hardlink => fs.hardlink(src, dst)?,
        LinkKind::Symlink => fs.symlink(src, dst)?,
        LinkKind::Copy => fs.copy(src, dst)?,
    }
    Ok(())
}

/// Detects whether the configured policy's active candidate actually
/// produces copies, by materializing and inspecting a disposable test
/// file (§4.8, mirroring `_cache_is_copy`). Once a policy is
/// confirmed, this is a cheap table lookup instead.
pub fn detect_copy_policy(policy: &LinkPolicy, fs: &dyn FileSystem, probe_dir: &Path) -> Result<bool> {
    if policy.is_confirmed() {
        return Ok(policy.active() == Some(LinkKind::Copy));
    }
    if policy.is_copy_only() {
        return Ok(true);
    }

    let test_src = probe_dir.join(".riftcache_link_probe_src");
    let test_dst = probe_dir.join(format!(".riftcache_link_probe_{}", uuid::Uuid::new_v4()));
    if !fs.exists(&test_src) {
        fs.makedirs(probe_dir)?;
        let mut file = fs.open(&test_src, riftcache_fs::OpenMode::Write)?;
        use std::io::Write;
        file.write_all(&[0u8])?;
    }

    let mut probe = policy.clone();
    let result = probe.materialize(fs, &test_src, &test_dst);
    let _ = fs.remove(&test_dst);
    let _ = fs.remove(&test_src);

    match result {
        Ok(kind) => Ok(kind == LinkKind::Copy),
        Err(e) => Err(e),
    }
}

/// Restore write permission on a path that was checked out via copy,
/// so the working tree stays editable without forcing a relink
/// (§4.8's unprotect branch).
pub fn unprotect(fs: &dyn FileSystem, path: &Path) -> Result<()> {
    fs.chmod(path, 0o644)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcache_fs::LocalFs;
    use tempfile::TempDir;

    #[test]
    fn materializes_with_first_working_candidate() {
        let tmp = TempDir::new().unwrap();
        let fs = LocalFs;
        let src = tmp.path().join("src.txt");
        std::fs::write(&src, b"hello").unwrap();

        let mut policy = LinkPolicy::new(vec![LinkKind::Hardlink, LinkKind::Copy]);
        let dst = tmp.path().join("dst.txt");
        let kind = policy.materialize(&fs, &src, &dst).unwrap();
        assert_eq!(kind, LinkKind::Hardlink);
        assert!(policy.is_confirmed());
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
    }

    #[test]
    fn refuses_to_overwrite_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let fs = LocalFs;
        let src = tmp.path().join("src.txt");
        std::fs::write(&src, b"hello").unwrap();
        let dst = tmp.path().join("dst.txt");
        std::fs::write(&dst, b"already here").unwrap();

        let mut policy = LinkPolicy::new(vec![LinkKind::Copy]);
        let err = policy.materialize(&fs, &src, &dst).unwrap_err();
        assert!(matches!(err, LinkError::Exhausted(_)));
    }

    #[test]
    fn zero_byte_hardlink_is_exempt_from_verification() {
        let tmp = TempDir::new().unwrap();
        let fs = LocalFs;
        let src = tmp.path().join("empty.txt");
        std::fs::write(&src, b"").unwrap();
        let dst = tmp.path().join("dst.txt");

        let mut policy = LinkPolicy::new(vec![LinkKind::Hardlink]);
        let kind = policy.materialize(&fs, &src, &dst).unwrap();
        assert_eq!(kind, LinkKind::Hardlink);
        assert!(dst.exists());
    }

    #[test]
    fn detects_copy_only_policy_without_probing() {
        let tmp = TempDir::new().unwrap();
        let fs = LocalFs;
        let policy = LinkPolicy::new(vec![LinkKind::Copy]);
        assert!(detect_copy_policy(&policy, &fs, tmp.path()).unwrap());
    }
}
