//! End-to-end scenarios exercised against the [`riftcache::Repository`]
//! facade rather than any single component crate: real temp
//! directories, no mocked filesystem.
//!
//! Scenario numbers (S1-S6) refer to the seed scenarios a riftcache
//! implementation is expected to satisfy.

use std::collections::HashSet;

use md5::{Digest, Md5};
use riftcache::{HashInfo, LinkKind, Output, Repository};
use tempfile::TempDir;

fn open_repo(root: &std::path::Path) -> Repository {
    std::fs::create_dir_all(root).unwrap();
    Repository::open(root).unwrap()
}

/// S2 - directory with canonical ordering: entries created out of
/// order still hash the same as a freshly-sorted manifest, and the
/// loaded tree comes back sorted by relpath regardless of creation
/// order or walk order.
#[test]
fn s2_directory_hash_is_order_independent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    let repo = open_repo(&root);

    let dir = root.join("d");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("b"), b"B").unwrap();
    std::fs::write(dir.join("a"), b"A").unwrap();

    let hash = repo.add(&dir).unwrap();
    assert!(hash.is_dir());

    let entries = repo.store().load_tree(&hash).unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.relpath.to_string()).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

/// S3 - link fallback: a policy listing reflink before hardlink still
/// produces a working checkout on filesystems (like most CI tmpfs /
/// ext4 mounts) that don't support reflink, and the policy remembers
/// whichever type actually worked so a second materialization in the
/// same run doesn't re-probe.
#[test]
fn s3_link_policy_falls_back_when_a_preferred_type_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();

    let mut policy = riftcache_link::LinkPolicy::new(vec![
        LinkKind::Reflink,
        LinkKind::Hardlink,
        LinkKind::Copy,
    ]);
    let fs = riftcache_fs::LocalFs;
    let src = work.join("src.bin");
    std::fs::write(&src, b"payload bytes").unwrap();

    let dst1 = work.join("out1.bin");
    let used1 = policy.materialize(&fs, &src, &dst1).unwrap();
    assert_ne!(used1, LinkKind::Reflink, "this filesystem has no reflink support in CI");
    assert!(policy.is_confirmed());

    let confirmed_kind = policy.active().unwrap();
    let dst2 = work.join("out2.bin");
    let used2 = policy.materialize(&fs, &src, &dst2).unwrap();
    assert_eq!(used2, confirmed_kind, "confirmed policy must not try anything else");
    assert_eq!(std::fs::read(&dst2).unwrap(), b"payload bytes");
}

/// S4 - corrupt object recovery: tampering with a stored object's
/// bytes is caught by `verify`, the object is removed, and a
/// subsequent read reports `NotFound`.
#[test]
fn s4_corrupt_object_is_detected_and_evicted() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    let repo = open_repo(&root);

    let src = root.join("foo.txt");
    std::fs::write(&src, b"foo").unwrap();
    let hash = repo.add(&src).unwrap();
    assert_eq!(hash.digest, "acbd18db4cc2f85cedef654fccc4a4d8");

    let object_path = repo.store().object_path(hash.file_digest());
    let mut perms = std::fs::metadata(&object_path).unwrap().permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o644);
    }
    std::fs::set_permissions(&object_path, perms).unwrap();
    let mut bytes = std::fs::read(&object_path).unwrap();
    bytes.push(b'!');
    std::fs::write(&object_path, bytes).unwrap();

    assert!(!repo.store().verify(hash.file_digest()).unwrap(), "verify catches the tamper");
    assert!(!repo.store().exists(hash.file_digest()), "verify deletes the corrupt object itself");
    let err = repo.store().get_bytes(hash.file_digest()).unwrap_err();
    assert!(matches!(err, riftcache_store::StoreError::NotFound { .. }));
}

/// S5 - GC preserves live, removes dead: adding three objects and
/// running `gc` with only two of them live leaves exactly those two
/// behind.
#[test]
fn s5_gc_preserves_live_set_and_removes_the_rest() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    let repo = open_repo(&root);

    let h1 = repo.add(&write_file(&root, "one", b"one")).unwrap();
    let h2 = repo.add(&write_file(&root, "two", b"two")).unwrap();
    let h3 = repo.add(&write_file(&root, "three", b"three")).unwrap();

    let mut live: HashSet<HashInfo> = HashSet::new();
    live.insert(h1.clone());
    live.insert(h3.clone());

    repo.gc(&live).unwrap();

    assert!(repo.store().exists(h1.file_digest()));
    assert!(!repo.store().exists(h2.file_digest()));
    assert!(repo.store().exists(h3.file_digest()));
}

/// S6 - partial checkout failure through the facade: one output's
/// object is missing from the store; checkout materializes the other
/// and reports exactly the missing one as failed.
#[test]
fn s6_facade_checkout_reports_exactly_the_missing_output() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    let mut repo = open_repo(&root);

    let hash_a = repo.add(&write_file(&root, "a-src", b"a-bytes")).unwrap();
    let digest_b = hex::encode(Md5::digest(b"never-written"));
    let hash_b = HashInfo::new("md5", digest_b).unwrap();

    let out_a = root.join("out-a");
    let out_b = root.join("out-b");
    let outputs = vec![
        Output {
            path: out_a.clone(),
            hash: Some(hash_a),
            is_dir: false,
        },
        Output {
            path: out_b.clone(),
            hash: Some(hash_b),
            is_dir: false,
        },
    ];

    let err = repo.checkout(&outputs, false, false).unwrap_err();
    let riftcache::RiftCacheError::Checkout(riftcache_checkout::CheckoutError::Failed(failed)) = err else {
        panic!("expected an aggregate checkout failure");
    };
    assert_eq!(failed, vec![out_b]);
    assert_eq!(std::fs::read(out_a).unwrap(), b"a-bytes");
}

fn write_file(root: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = root.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
