//! Size-capped directory of write-once entries.
//!
//! Each entry is one top-level file or subdirectory. After every write the
//! oldest entries by modification time are deleted until the directory fits
//! its byte budget again. One writer per directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::StorageError;

/// A top-level entry and its recursive on-disk size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug)]
pub struct LogDir {
    path: PathBuf,
    max_bytes: u64,
    counter: u64,
}

impl LogDir {
    /// Open (or create) the directory. Nothing is evicted here even if the
    /// directory is already over budget; the next write prunes it.
    pub fn open(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            max_bytes,
            counter: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Write `bytes` as one new file and return its path.
    pub fn write_data(&mut self, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        self.write(|path| fs::write(path, bytes))
    }

    /// Hand `build` a fresh path that does not exist yet. It may create a file
    /// or a directory there. Once it returns, the entry is moved into place
    /// and the directory is pruned back under budget.
    ///
    /// If `build` fails, whatever it left behind is removed and the error is
    /// returned.
    pub fn write<F>(&mut self, build: F) -> Result<PathBuf, StorageError>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let name = self.next_name();
        let staging = self.path.join(format!(".{}.tmp", name));
        let target = self.path.join(&name);

        if let Err(e) = build(&staging) {
            remove_entry(&staging);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staging, &target) {
            remove_entry(&staging);
            return Err(e.into());
        }

        self.evict(&target)?;
        Ok(target)
    }

    /// Visible entries in eviction order: oldest modification time first,
    /// ties broken by name.
    pub fn entries(&self) -> Result<Vec<LogDirEntry>, StorageError> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.path)? {
            let dirent = dirent?;
            if is_hidden(&dirent.file_name()) {
                continue;
            }
            let meta = dirent.metadata()?;
            let path = dirent.path();
            let size = if meta.is_dir() {
                dir_size(&path)?
            } else {
                meta.len()
            };
            entries.push(LogDirEntry {
                path,
                size,
                modified: meta.modified()?,
            });
        }
        entries.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(entries)
    }

    /// Total size in bytes of all visible entries.
    pub fn total_size(&self) -> Result<u64, StorageError> {
        Ok(self.entries()?.iter().map(|e| e.size).sum())
    }

    fn evict(&self, keep: &Path) -> Result<(), StorageError> {
        let entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        if total <= self.max_bytes {
            return Ok(());
        }

        let mut removed = 0usize;
        for entry in entries.iter().filter(|e| e.path != keep) {
            if total <= self.max_bytes {
                break;
            }
            if entry.path.is_dir() {
                fs::remove_dir_all(&entry.path)?;
            } else {
                fs::remove_file(&entry.path)?;
            }
            total -= entry.size;
            removed += 1;
            debug!(path = %entry.path.display(), size = entry.size, "Evicted log entry");
        }

        if total > self.max_bytes {
            warn!(
                path = %keep.display(),
                total,
                max_bytes = self.max_bytes,
                "New entry alone exceeds directory budget"
            );
        } else {
            debug!(removed, total, "Pruned log directory");
        }
        Ok(())
    }

    /// Names sort in write order within one process.
    fn next_name(&mut self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.counter += 1;
        format!("{:020}-{:08}", nanos, self.counter)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(total)
}

fn remove_entry(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = result {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove staging entry");
        }
    }
}
