//! # riftcache-store
//!
//! The content-addressed object store (§4.5): every object lives at
//! `store_root/<xx>/<rest>` where `xx` is the first two hex
//! characters of its digest. Writes land in a uniquely named temp
//! file first and are `rename`d into place, so a reader never
//! observes a partially written object; once in place, an object's
//! bytes never change, so reads can trust its digest without
//! rehashing.

mod error;
mod iter;
mod tree;

pub use error::{Result, StoreError};
pub use iter::ObjectIterator;
pub use tree::{decode as decode_tree, encode as encode_tree, TreeEntry};

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use riftcache_config::{log_store_debug, log_store_info, log_store_warn};
use riftcache_core::HashInfo;
use riftcache_fs::FileSystem;

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    /// Whether finalized objects are chmod'd to read-only (§6's
    /// `cache.protected`).
    protected: bool,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, protected: bool) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, protected })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `store_root/<xx>/<rest>` for a file digest (directories are
    /// stored under their manifest's own file digest; the `.dir`
    /// suffix is metadata carried on the [`HashInfo`], not part of
    /// the storage path).
    pub fn object_path(&self, file_digest: &str) -> PathBuf {
        let (prefix, rest) = file_digest.split_at(2.min(file_digest.len()));
        self.root.join(prefix).join(rest)
    }

    pub fn exists(&self, file_digest: &str) -> bool {
        self.object_path(file_digest).exists()
    }

    /// Write `data` under its own digest if not already present.
    /// Dedup-by-existence: an existing object is assumed correct and
    /// is never rewritten (§4.5).
    pub fn put_bytes(&self, file_digest: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(file_digest);
        if path.exists() {
            log_store_debug!("object already present, skipping write", digest = file_digest);
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_name = format!(
            "{}.{}.{:?}.tmp",
            path.file_name().unwrap().to_string_lossy(),
            std::process::id(),
            std::thread::current().id()
        );
        let tmp_path = path.with_file_name(tmp_name);
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            if path.exists() {
                // Another writer won the race with identical content.
                return Ok(());
            }
            return Err(e.into());
        }

        if self.protected {
            set_readonly(&path)?;
        }
        log_store_info!("stored object", digest = file_digest, bytes = data.len());
        Ok(())
    }

    /// Stream `src` into the store under `file_digest`, for large
    /// files the caller doesn't want to buffer wholesale.
    pub fn put_reader(&self, file_digest: &str, src: &mut dyn Read) -> Result<()> {
        let path = self.object_path(file_digest);
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_name = format!(
            "{}.{}.{:?}.tmp",
            path.file_name().unwrap().to_string_lossy(),
            std::process::id(),
            std::thread::current().id()
        );
        let tmp_path = path.with_file_name(tmp_name);
        {
            let mut file = File::create(&tmp_path)?;
            std::io::copy(src, &mut file)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            if path.exists() {
                return Ok(());
            }
            return Err(e.into());
        }

        if self.protected {
            set_readonly(&path)?;
        }
        Ok(())
    }

    /// §4.5's `put`: move `source_path` into the object location
    /// atomically (via `fs`'s rename-or-copy+remove), rather than
    /// writing fresh bytes. If the destination already exists and
    /// verifies, discard the source rather than overwrite; if it
    /// exists but fails verification, [`Self::verify`] has already
    /// deleted the corrupt bytes (§4.5/§7), so this falls through to
    /// adopting `source_path` in its place.
    pub fn adopt_file(&self, fs: &dyn FileSystem, source_path: &Path, file_digest: &str) -> Result<()> {
        let path = self.object_path(file_digest);
        if path.exists() {
            if self.verify(file_digest)? {
                fs.remove(source_path)?;
                log_store_debug!("object already present, discarded adopted source", digest = file_digest);
                return Ok(());
            }
            log_store_warn!("existing object failed verification, replacing it", digest = file_digest);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs.move_path(source_path, &path)?;
        if self.protected {
            set_readonly(&path)?;
        }
        log_store_info!("adopted object", digest = file_digest);
        Ok(())
    }

    /// Read an object's bytes. Trusts the store's atomicity and
    /// read-only invariant rather than rehashing on every read; use
    /// [`Self::verify`] for an explicit integrity check (§4.5).
    pub fn get_bytes(&self, file_digest: &str) -> Result<Vec<u8>> {
        let path = self.object_path(file_digest);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    digest: file_digest.to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    pub fn open(&self, file_digest: &str) -> Result<File> {
        let path = self.object_path(file_digest);
        File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    digest: file_digest.to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    /// Recompute an MD5 over the stored bytes and compare against
    /// `file_digest`, for fsck-style paranoia rather than ordinary
    /// reads. A read-only object is trusted without rehashing — once
    /// protected, nothing but this store could have changed it (§4.5).
    /// On a mismatch the object is deleted so the next `get`/`exists`
    /// reports [`StoreError::NotFound`] rather than handing back
    /// corrupt bytes (§4.5, §7).
    pub fn verify(&self, file_digest: &str) -> Result<bool> {
        let path = self.object_path(file_digest);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    digest: file_digest.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if meta.permissions().readonly() {
            return Ok(true);
        }

        let mut file = self.open(file_digest)?;
        let mut hasher = Md5::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let actual = hex::encode(hasher.finalize());
        if actual == file_digest {
            return Ok(true);
        }

        log_store_warn!("object failed verification, deleting", digest = file_digest, actual = %actual);
        self.delete(file_digest)?;
        Ok(false)
    }

    pub fn delete(&self, file_digest: &str) -> Result<()> {
        let path = self.object_path(file_digest);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize and store a directory's manifest, returning the
    /// resulting directory [`HashInfo`] (§4.5, §6).
    pub fn store_tree(&self, entries: &mut Vec<TreeEntry>) -> Result<HashInfo> {
        entries.sort_by(|a, b| a.relpath.to_string().cmp(&b.relpath.to_string()));
        let bytes = encode_tree(entries)?;
        let digest = hex::encode(Md5::digest(&bytes));
        self.put_bytes(&digest, &bytes)?;

        let total_size: u64 = entries.iter().filter_map(|e| e.hash.size).sum();
        let hash = HashInfo::new("md5", digest)?
            .into_dir()
            .with_size(total_size)
            .with_entry_count(entries.len() as u64);
        Ok(hash)
    }

    pub fn load_tree(&self, dir_hash: &HashInfo) -> Result<Vec<TreeEntry>> {
        let bytes = self.get_bytes(dir_hash.file_digest())?;
        Ok(decode_tree(&bytes, &dir_hash.algorithm)?)
    }

    /// Enumerate every object's digest under this store, for garbage
    /// collection's live-set diff (§4.10).
    pub fn iter(&self) -> Result<ObjectIterator> {
        ObjectIterator::new(&self.root)
    }
}

#[cfg(unix)]
fn set_readonly(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o444);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_readonly(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcache_core::RelPath;
    use tempfile::TempDir;

    #[test]
    fn stores_and_retrieves_bytes_by_digest() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), true).unwrap();
        let data = b"hello world";
        let digest = hex::encode(Md5::digest(data));
        store.put_bytes(&digest, data).unwrap();
        assert!(store.exists(&digest));
        assert_eq!(store.get_bytes(&digest).unwrap(), data);
    }

    #[test]
    fn protected_objects_are_read_only() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), true).unwrap();
        let data = b"immutable";
        let digest = hex::encode(Md5::digest(data));
        store.put_bytes(&digest, data).unwrap();
        let meta = fs::metadata(store.object_path(&digest)).unwrap();
        assert!(meta.permissions().readonly());
    }

    #[test]
    fn put_is_idempotent_on_existing_object() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), false).unwrap();
        let data = b"x";
        let digest = hex::encode(Md5::digest(data));
        store.put_bytes(&digest, data).unwrap();
        store.put_bytes(&digest, data).unwrap();
        assert_eq!(store.get_bytes(&digest).unwrap(), data);
    }

    #[test]
    fn verify_detects_corruption_and_deletes_the_object() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), false).unwrap();
        let data = b"verify me";
        let digest = hex::encode(Md5::digest(data));
        store.put_bytes(&digest, data).unwrap();
        assert!(store.verify(&digest).unwrap());

        fs::write(store.object_path(&digest), b"tampered").unwrap();
        assert!(!store.verify(&digest).unwrap());
        assert!(!store.exists(&digest), "corrupt object is deleted by verify");
        assert!(matches!(
            store.get_bytes(&digest).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn verify_trusts_a_read_only_object_without_rehashing() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), true).unwrap();
        let data = b"protected";
        let digest = hex::encode(Md5::digest(data));
        store.put_bytes(&digest, data).unwrap();

        // Tamper with the read-only file's contents directly (bypassing
        // the permission bit, as a test double for bit-rot/disk damage);
        // verify should still accept it since it never rehashes a
        // read-only object.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = store.object_path(&digest);
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o644);
            fs::set_permissions(&path, perms).unwrap();
            fs::write(&path, b"tampered").unwrap();
            perms.set_mode(0o444);
            fs::set_permissions(&path, perms).unwrap();
        }

        assert!(store.verify(&digest).unwrap());
        assert!(store.exists(&digest));
    }

    #[test]
    fn get_missing_object_errors() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), false).unwrap();
        let err = store.get_bytes("deadbeef").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn stores_and_loads_a_tree_manifest() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), false).unwrap();

        let a = b"a";
        let b = b"bb";
        let a_digest = hex::encode(Md5::digest(a));
        let b_digest = hex::encode(Md5::digest(b));
        store.put_bytes(&a_digest, a).unwrap();
        store.put_bytes(&b_digest, b).unwrap();

        let mut entries = vec![
            TreeEntry {
                relpath: RelPath::parse("b.txt").unwrap(),
                hash: HashInfo::new("md5", b_digest).unwrap().with_size(2),
            },
            TreeEntry {
                relpath: RelPath::parse("a.txt").unwrap(),
                hash: HashInfo::new("md5", a_digest).unwrap().with_size(1),
            },
        ];
        let dir_hash = store.store_tree(&mut entries).unwrap();
        assert!(dir_hash.is_dir());
        assert_eq!(dir_hash.size, Some(3));
        assert_eq!(dir_hash.entry_count, Some(2));

        let loaded = store.load_tree(&dir_hash).unwrap();
        assert_eq!(loaded[0].relpath.to_string(), "a.txt");
        assert_eq!(loaded[1].relpath.to_string(), "b.txt");
    }

    #[test]
    fn adopt_file_moves_source_into_the_store() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path().join("store"), true).unwrap();
        let fs = riftcache_fs::LocalFs;
        let source = tmp.path().join("incoming");
        fs::write(&source, b"payload").unwrap();
        let digest = hex::encode(Md5::digest(b"payload"));

        store.adopt_file(&fs, &source, &digest).unwrap();
        assert!(!source.exists());
        assert_eq!(store.get_bytes(&digest).unwrap(), b"payload");
    }

    #[test]
    fn adopt_file_discards_source_when_object_already_present() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path().join("store"), false).unwrap();
        let fs = riftcache_fs::LocalFs;
        let digest = hex::encode(Md5::digest(b"payload"));
        store.put_bytes(&digest, b"payload").unwrap();

        let source = tmp.path().join("incoming");
        fs::write(&source, b"payload").unwrap();
        store.adopt_file(&fs, &source, &digest).unwrap();
        assert!(!source.exists());
    }

    #[test]
    fn iterator_enumerates_every_stored_object() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path(), false).unwrap();
        let mut expected = std::collections::HashSet::new();
        for byte in 0..5u8 {
            let data = vec![byte];
            let digest = hex::encode(Md5::digest(&data));
            store.put_bytes(&digest, &data).unwrap();
            expected.insert(digest);
        }

        let found: std::collections::HashSet<String> =
            store.iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(found, expected);
    }
}
