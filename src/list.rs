//! Identifier discovery
//!
//! A [`ListSource`] produces the set of identifiers worth loading, off the
//! caller's thread. The directory source walks a glob pattern under a root
//! and yields root-relative ids in sorted order, matching what
//! [`FileSource`](crate::fetch::FileSource) resolves.

use std::path::PathBuf;
use std::thread;

use glob::glob;
use log::{debug, warn};

/// Asynchronous identifier enumeration.
pub trait ListSource: Send + Sync {
    fn load_list(&self, on_complete: Box<dyn FnOnce(Vec<String>) + Send>);
}

/// Globs a directory on a background thread.
pub struct DirListSource {
    root: PathBuf,
    pattern: String,
}

impl DirListSource {
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
        }
    }
}

impl ListSource for DirListSource {
    fn load_list(&self, on_complete: Box<dyn FnOnce(Vec<String>) + Send>) {
        let root = self.root.clone();
        let pattern = self.pattern.clone();
        thread::Builder::new()
            .name("galleria-list".into())
            .spawn(move || {
                let full = root.join(&pattern);
                let full = full.to_string_lossy().into_owned();
                let mut ids = Vec::new();
                match glob(&full) {
                    Ok(paths) => {
                        for entry in paths.flatten() {
                            if !entry.is_file() {
                                continue;
                            }
                            if let Ok(rel) = entry.strip_prefix(&root) {
                                ids.push(rel.to_string_lossy().into_owned());
                            }
                        }
                    }
                    Err(e) => warn!("bad glob pattern {}: {}", full, e),
                }
                ids.sort();
                debug!("listed {} ids under {}", ids.len(), root.display());
                on_complete(ids);
            })
            .expect("failed to spawn list thread");
    }
}

/// Fixed identifier list, completing synchronously.
pub struct StaticListSource {
    ids: Vec<String>,
}

impl StaticListSource {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }
}

impl ListSource for StaticListSource {
    fn load_list(&self, on_complete: Box<dyn FnOnce(Vec<String>) + Send>) {
        on_complete(self.ids.clone());
    }
}
