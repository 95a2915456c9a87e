//! Filesystem fetch source
//!
//! Identifiers are paths relative to a root directory. Reads happen in
//! fixed-size chunks with a progress checkpoint after each one, so large
//! files can be cancelled partway through.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use log::debug;

use super::{FetchError, FetchSource, ProgressSink};

const DEFAULT_CHUNK: usize = 64 * 1024;

pub struct FileSource {
    root: PathBuf,
    chunk_size: usize,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK,
        }
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Reject ids that are blank, absolute, or traverse out of the root.
    fn resolve(&self, id: &str) -> Result<PathBuf, FetchError> {
        if id.trim().is_empty() {
            return Err(FetchError::InvalidIdentifier(id.to_string()));
        }
        let rel = Path::new(id);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(FetchError::InvalidIdentifier(id.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl FetchSource for FileSource {
    fn fetch(&self, id: &str, progress: ProgressSink) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(id)?;
        let mut file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(id.to_string())
            } else {
                FetchError::Io {
                    id: id.to_string(),
                    source: e,
                }
            }
        })?;

        let total = file
            .metadata()
            .map(|m| m.len() as usize)
            .unwrap_or(0)
            .max(1);
        let mut out = Vec::with_capacity(total);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf).map_err(|e| FetchError::Io {
                id: id.to_string(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
            let frac = (out.len() as f32 / total as f32).min(1.0);
            if !progress(frac) {
                debug!("fetch cancelled mid-read: {}", id);
                return Err(FetchError::Cancelled(id.to_string()));
            }
        }
        if !progress(1.0) {
            return Err(FetchError::Cancelled(id.to_string()));
        }
        debug!("fetched {} ({} bytes)", id, out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("galleria-fs-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Test: chunked file read
    /// Validates: bytes match the file and progress reaches 1.0
    #[test]
    fn test_file_fetch() {
        let root = temp_root("fetch");
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut f = File::create(root.join("img.bin")).unwrap();
        f.write_all(&data).unwrap();

        let src = FileSource::new(&root).with_chunk_size(256);
        let mut last = 0.0f32;
        let got = src
            .fetch("img.bin", &mut |p| {
                last = p;
                true
            })
            .unwrap();
        assert_eq!(got, data);
        assert!((last - 1.0).abs() < f32::EPSILON);

        std::fs::remove_dir_all(&root).ok();
    }

    /// Test: path traversal
    /// Validates: absolute and parent-dir identifiers are invalid
    #[test]
    fn test_file_rejects_escaping_ids() {
        let src = FileSource::new("/tmp");
        assert!(matches!(
            src.fetch("../etc/passwd", &mut |_| true),
            Err(FetchError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            src.fetch("/etc/passwd", &mut |_| true),
            Err(FetchError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            src.fetch("", &mut |_| true),
            Err(FetchError::InvalidIdentifier(_))
        ));
    }

    /// Test: missing file
    /// Validates: NotFound is distinguished from other I/O errors
    #[test]
    fn test_file_not_found() {
        let root = temp_root("missing");
        let src = FileSource::new(&root);
        assert!(matches!(
            src.fetch("absent.bin", &mut |_| true),
            Err(FetchError::NotFound(_))
        ));
        std::fs::remove_dir_all(&root).ok();
    }
}
