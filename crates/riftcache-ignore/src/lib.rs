//! # riftcache-ignore
//!
//! Per-directory gitignore-style filtering (§4.7): each directory that
//! carries its own `.riftignore` file (or, at the root, the built-in
//! default patterns) gets one compiled [`ignore::gitignore::Gitignore`]
//! covering only its own patterns. A query walks from the repository
//! root down to the queried path's parent, applying each level's
//! compiled set in turn and letting the last level that actually
//! matched decide the outcome — a whitelist re-include pattern in a
//! subdirectory overrides an ignore from an ancestor, but only for
//! paths under that subdirectory.

mod error;

pub use error::{IgnoreError, Result};

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use riftcache_config::log_ignore_debug;
use riftcache_core::REPO_MARKER_DIR;
use riftcache_fs::{FileSystem, OpenMode, WalkEntry};

pub const IGNORE_FILE_NAME: &str = ".riftignore";

fn default_patterns() -> Vec<String> {
    vec![".hg/".to_string(), ".git/".to_string(), format!("{REPO_MARKER_DIR}/")]
}

pub struct IgnoreFilter {
    root: PathBuf,
    layers: HashMap<PathBuf, Gitignore>,
}

impl IgnoreFilter {
    /// Walk `root` once, compiling one [`Gitignore`] per directory
    /// that has its own patterns (default patterns at the root, plus
    /// whatever that directory's `.riftignore` adds, plus a
    /// `/<name>/` re-ignore for any immediate subdirectory that looks
    /// like a nested repository's root, §4.7).
    pub fn build(fs: &dyn FileSystem, root: &Path) -> Result<Self> {
        let mut filter = Self {
            root: root.to_path_buf(),
            layers: HashMap::new(),
        };
        fs.walk(root, &mut |entry: &mut WalkEntry| {
            filter.ingest_dir(fs, entry)?;
            Ok(())
        })?;
        Ok(filter)
    }

    /// An ignore filter with no patterns at all, for contexts (tests,
    /// `--no-ignore` modes) that want every path visible.
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            layers: HashMap::new(),
        }
    }

    fn ingest_dir(&mut self, fs: &dyn FileSystem, entry: &mut WalkEntry) -> Result<()> {
        let mut lines: Vec<String> = Vec::new();
        if entry.dir == self.root {
            lines.extend(default_patterns().into_iter().map(String::from));
        }

        let ignore_path = entry.dir.join(IGNORE_FILE_NAME);
        if fs.isfile(&ignore_path) {
            let mut file = fs.open(&ignore_path, OpenMode::Read)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            lines.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from),
            );
        }

        for subdir in &entry.subdirs {
            let marker = entry.dir.join(subdir).join(REPO_MARKER_DIR);
            if fs.isdir(&marker) {
                log_ignore_debug!("nested repository marker found", subdir = %subdir);
                lines.push(format!("/{subdir}/"));
            }
        }

        if !lines.is_empty() {
            let mut builder = GitignoreBuilder::new(&entry.dir);
            for line in &lines {
                builder
                    .add_line(None, line)
                    .map_err(|source| IgnoreError::Pattern {
                        path: ignore_path.clone(),
                        source,
                    })?;
            }
            let compiled = builder
                .build()
                .map_err(|source| IgnoreError::Pattern {
                    path: ignore_path.clone(),
                    source,
                })?;
            self.layers.insert(entry.dir.clone(), compiled);
        }

        let dir = entry.dir.clone();
        entry
            .subdirs
            .retain(|d| !self.is_ignored_dir(&dir.join(d)));

        Ok(())
    }

    pub fn is_ignored_dir(&self, path: &Path) -> bool {
        if path == self.root {
            return false;
        }
        self.is_ignored(path, true)
    }

    pub fn is_ignored_file(&self, path: &Path) -> bool {
        self.is_ignored(path, false)
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.outside_repo(path) {
            return true;
        }

        let mut result = false;
        for dir in self.ancestor_dirs(path) {
            let Some(compiled) = self.layers.get(&dir) else {
                continue;
            };
            match compiled.matched(path, is_dir) {
                Match::None => {}
                Match::Ignore(_) => result = true,
                Match::Whitelist(_) => result = false,
            }
        }
        result
    }

    fn outside_repo(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root).is_err()
    }

    fn ancestor_dirs(&self, path: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![self.root.clone()];
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return dirs;
        };
        let comps: Vec<_> = rel.components().collect();
        let mut cur = self.root.clone();
        for comp in comps.iter().take(comps.len().saturating_sub(1)) {
            cur = cur.join(comp.as_os_str());
            dirs.push(cur.clone());
        }
        dirs
    }

    /// Flattened, ignore-pruned file listing under `top` (§4.7, used
    /// by the hashing pipeline's directory collection).
    pub fn walk_files(&self, fs: &dyn FileSystem, top: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        fs.walk(top, &mut |entry: &mut WalkEntry| {
            let dir = entry.dir.clone();
            entry.subdirs.retain(|d| !self.is_ignored_dir(&dir.join(d)));
            for f in &entry.files {
                let path = dir.join(f);
                if !self.is_ignored_file(&path) {
                    out.push(path);
                }
            }
            Ok(())
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcache_fs::LocalFs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn default_patterns_ignore_dot_git() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        write(&tmp.path().join("a.txt"), "hi");

        let filter = IgnoreFilter::build(&LocalFs, tmp.path()).unwrap();
        assert!(filter.is_ignored_dir(&tmp.path().join(".git")));
        assert!(!filter.is_ignored_file(&tmp.path().join("a.txt")));
    }

    #[test]
    fn riftignore_file_hides_matching_entries() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(".riftignore"), "*.log\n");
        write(&tmp.path().join("keep.txt"), "hi");
        write(&tmp.path().join("drop.log"), "hi");

        let filter = IgnoreFilter::build(&LocalFs, tmp.path()).unwrap();
        assert!(filter.is_ignored_file(&tmp.path().join("drop.log")));
        assert!(!filter.is_ignored_file(&tmp.path().join("keep.txt")));
    }

    #[test]
    fn nested_repo_marker_is_ignored_whole() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub/.riftcache")).unwrap();
        write(&tmp.path().join("sub/file.txt"), "hi");

        let filter = IgnoreFilter::build(&LocalFs, tmp.path()).unwrap();
        assert!(filter.is_ignored_dir(&tmp.path().join("sub")));
    }

    #[test]
    fn subdirectory_whitelist_overrides_ancestor_ignore() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(".riftignore"), "*.log\n");
        std::fs::create_dir_all(tmp.path().join("keep")).unwrap();
        write(&tmp.path().join("keep/.riftignore"), "!important.log\n");
        write(&tmp.path().join("keep/important.log"), "hi");
        write(&tmp.path().join("keep/other.log"), "hi");

        let filter = IgnoreFilter::build(&LocalFs, tmp.path()).unwrap();
        assert!(!filter.is_ignored_file(&tmp.path().join("keep/important.log")));
        assert!(filter.is_ignored_file(&tmp.path().join("keep/other.log")));
    }

    #[test]
    fn walk_files_prunes_ignored_directories() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(".riftignore"), "build/\n");
        write(&tmp.path().join("src/main.rs"), "fn main() {}");
        write(&tmp.path().join("build/out.o"), "binary");

        let filter = IgnoreFilter::build(&LocalFs, tmp.path()).unwrap();
        let files = filter.walk_files(&LocalFs, tmp.path()).unwrap();
        assert!(files.iter().any(|p| p.ends_with("src/main.rs")));
        assert!(!files.iter().any(|p| p.ends_with("build/out.o")));
    }
}
