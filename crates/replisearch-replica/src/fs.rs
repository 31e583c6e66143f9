//! Local-filesystem [`Directory`] implementation.
//!
//! Backs both the master and cache roots in single-host deployments; a
//! master on a network mount uses the same implementation. Lock files use
//! create-new semantics so the race to obtain resolves in the filesystem.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use replisearch_core::error::{ReplicaError, ReplicaResult};
use replisearch_core::traits::{Directory, IndexLock, ReadStream, WriteStream};
use replisearch_core::types::{DirectoryIdentity, FileEntry};
use tracing::{debug, warn};

/// A directory rooted at one local filesystem path.
#[derive(Debug)]
pub struct FsDirectory {
    root: PathBuf,
    identity: DirectoryIdentity,
}

impl FsDirectory {
    /// Open (creating if needed) a directory rooted at `root`.
    pub fn open(root: &Path) -> ReplicaResult<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            identity: DirectoryIdentity::from_path(root),
        })
    }

    /// The filesystem root this directory operates on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> ReplicaResult<PathBuf> {
        if name.is_empty() {
            return Err(ReplicaError::InvalidFileName {
                name: name.to_owned(),
                reason: "empty name",
            });
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ReplicaError::InvalidFileName {
                name: name.to_owned(),
                reason: "path components are not allowed",
            });
        }
        Ok(self.root.join(name))
    }

    fn transient(name: &str, err: &std::io::Error) -> ReplicaError {
        ReplicaError::Transient {
            path: name.to_owned(),
            detail: err.to_string(),
        }
    }
}

impl Directory for FsDirectory {
    fn identity(&self) -> &DirectoryIdentity {
        &self.identity
    }

    fn list_all(&self) -> ReplicaResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                warn!(
                    target: "replisearch",
                    entry = %entry.path().display(),
                    "skipping non-UTF-8 file name"
                );
                continue;
            };
            entries.push(FileEntry {
                name,
                length: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn file_exists(&self, name: &str) -> ReplicaResult<bool> {
        Ok(self.resolve(name)?.is_file())
    }

    fn file_length(&self, name: &str) -> ReplicaResult<u64> {
        let path = self.resolve(name)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Self::transient(name, &e))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn file_modified(&self, name: &str) -> ReplicaResult<SystemTime> {
        let path = self.resolve(name)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.modified()?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Self::transient(name, &e))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_read(&self, name: &str) -> ReplicaResult<Box<dyn ReadStream>> {
        let path = self.resolve(name)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(FsReadStream {
                name: name.to_owned(),
                path,
                file,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Self::transient(name, &e))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_write(&self, name: &str) -> ReplicaResult<Box<dyn WriteStream>> {
        let path = self.resolve(name)?;
        let file = File::create(&path)?;
        Ok(Box::new(FsWriteStream {
            name: name.to_owned(),
            file: Some(file),
        }))
    }

    fn delete(&self, name: &str) -> ReplicaResult<()> {
        let path = self.resolve(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn make_lock(&self, name: &str) -> Box<dyn IndexLock> {
        Box::new(FsLock {
            path: self.root.join(name),
            owned: AtomicBool::new(false),
        })
    }
}

// ─── Streams ────────────────────────────────────────────────────────────────

struct FsReadStream {
    name: String,
    path: PathBuf,
    file: File,
}

impl Read for FsReadStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FsReadStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

impl ReadStream for FsReadStream {
    fn try_clone(&self) -> ReplicaResult<Box<dyn ReadStream>> {
        // File::try_clone shares the cursor, so a usable clone means
        // re-opening the path and seeking to the current position.
        let clone_failed = |e: std::io::Error| ReplicaError::CloneUnsupported {
            name: self.name.clone(),
            detail: e.to_string(),
        };
        let mut shadow = self.file.try_clone().map_err(clone_failed)?;
        let position = shadow.stream_position().map_err(clone_failed)?;
        let mut reopened = File::open(&self.path).map_err(clone_failed)?;
        reopened
            .seek(SeekFrom::Start(position))
            .map_err(clone_failed)?;
        Ok(Box::new(FsReadStream {
            name: self.name.clone(),
            path: self.path.clone(),
            file: reopened,
        }))
    }
}

struct FsWriteStream {
    name: String,
    file: Option<File>,
}

impl Write for FsWriteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(std::io::Error::other("write stream already closed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl WriteStream for FsWriteStream {
    fn close(&mut self) -> ReplicaResult<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for FsWriteStream {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!(
                target: "replisearch",
                file = %self.name,
                "write stream dropped without close; bytes may not be durable"
            );
        }
    }
}

// ─── Lock ───────────────────────────────────────────────────────────────────

/// Lock-file based [`IndexLock`]: existence of the file designates the
/// holder, creation races resolve via create-new semantics.
#[derive(Debug)]
struct FsLock {
    path: PathBuf,
    owned: AtomicBool,
}

impl IndexLock for FsLock {
    fn obtain(&self) -> ReplicaResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                self.owned.store(true, Ordering::Release);
                debug!(target: "replisearch", lock = %self.path.display(), "lock obtained");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn is_locked(&self) -> ReplicaResult<bool> {
        Ok(self.owned.load(Ordering::Acquire) || self.path.exists())
    }

    fn release(&self) -> ReplicaResult<()> {
        if !self.owned.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(target: "replisearch", lock = %self.path.display(), "lock released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                // Removal failed: we still own the file on disk.
                self.owned.store(true, Ordering::Release);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, FsDirectory) {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = FsDirectory::open(dir.path()).expect("open");
        (dir, fs)
    }

    fn write_file(dir: &FsDirectory, name: &str, bytes: &[u8]) {
        let mut stream = dir.open_write(name).expect("open_write");
        stream.write_all(bytes).expect("write");
        stream.close().expect("close");
    }

    #[test]
    fn round_trips_bytes() {
        let (_guard, dir) = scratch();
        write_file(&dir, "a.bin", b"hello replica");

        let mut stream = dir.open_read("a.bin").expect("open_read");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).expect("read");
        assert_eq!(out, b"hello replica");
        assert_eq!(dir.file_length("a.bin").expect("len"), 13);
    }

    #[test]
    fn list_all_reports_files_sorted() {
        let (_guard, dir) = scratch();
        write_file(&dir, "b", b"1");
        write_file(&dir, "a", b"22");
        let names: Vec<_> = dir
            .list_all()
            .expect("list")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn missing_file_is_transient() {
        let (_guard, dir) = scratch();
        let err = dir.file_length("missing").expect_err("should fail");
        assert!(matches!(err, ReplicaError::Transient { .. }), "{err}");
        let err = dir.open_read("missing").err().expect("should fail");
        assert!(matches!(err, ReplicaError::Transient { .. }), "{err}");
    }

    #[test]
    fn path_components_rejected() {
        let (_guard, dir) = scratch();
        let err = dir.file_exists("../escape").expect_err("must reject");
        assert!(matches!(err, ReplicaError::InvalidFileName { .. }), "{err}");
    }

    #[test]
    fn delete_tolerates_absence() {
        let (_guard, dir) = scratch();
        dir.delete("never-existed").expect("absent delete ok");
        write_file(&dir, "x", b"x");
        dir.delete("x").expect("delete");
        assert!(!dir.file_exists("x").expect("exists"));
    }

    #[test]
    fn cloned_stream_has_independent_position() {
        let (_guard, dir) = scratch();
        write_file(&dir, "c", b"0123456789");

        let mut original = dir.open_read("c").expect("open");
        let mut buf = [0_u8; 4];
        original.read_exact(&mut buf).expect("read 4");

        let mut clone = original.try_clone().expect("clone");
        let mut rest_original = Vec::new();
        original.read_to_end(&mut rest_original).expect("read rest");

        // The clone starts where the original was at clone time, and
        // advancing it does not disturb the already-drained original.
        let mut rest_clone = Vec::new();
        clone.read_to_end(&mut rest_clone).expect("read clone");
        assert_eq!(rest_clone, b"456789");
        assert_eq!(rest_original, b"456789");
    }

    #[test]
    fn lock_obtain_release_cycle() {
        let (_guard, dir) = scratch();
        let lock = dir.make_lock("write.lock");
        assert!(lock.obtain().expect("obtain"));
        assert!(lock.is_locked().expect("locked"));

        let competitor = dir.make_lock("write.lock");
        assert!(!competitor.obtain().expect("contended obtain"));

        lock.release().expect("release");
        assert!(!lock.is_locked().expect("unlocked"));
        assert!(competitor.obtain().expect("now obtainable"));
        competitor.release().expect("release competitor");
    }

    #[test]
    fn release_without_obtain_is_noop() {
        let (_guard, dir) = scratch();
        let lock = dir.make_lock("write.lock");
        lock.release().expect("idempotent release");
    }
}
