use std::fs::{self, ReadDir};
use std::path::Path;

use crate::error::Result;

/// Walks `store_root/<xx>/<rest>`, yielding each object's full
/// (unprefixed) digest. Skips `.tmp` files left behind by an
/// interrupted write (§4.5, §4.10's GC enumeration).
pub struct ObjectIterator {
    prefix_iter: ReadDir,
    current: Option<(String, ReadDir)>,
}

impl ObjectIterator {
    pub(crate) fn new(root: &Path) -> Result<Self> {
        Ok(Self {
            prefix_iter: fs::read_dir(root)?,
            current: None,
        })
    }
}

impl Iterator for ObjectIterator {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, entries)) = &mut self.current {
                match entries.next() {
                    Some(Ok(entry)) => {
                        let path = entry.path();
                        if !path.is_file() {
                            continue;
                        }
                        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                            continue;
                        };
                        if name.ends_with(".tmp") {
                            continue;
                        }
                        return Some(Ok(format!("{prefix}{name}")));
                    }
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            match self.prefix_iter.next() {
                Some(Ok(entry)) => {
                    let path = entry.path();
                    if !path.is_dir() {
                        continue;
                    }
                    let Some(prefix) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    match fs::read_dir(&path) {
                        Ok(entries) => {
                            self.current = Some((prefix.to_string(), entries));
                        }
                        Err(e) => return Some(Err(e.into())),
                    }
                }
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }
}
