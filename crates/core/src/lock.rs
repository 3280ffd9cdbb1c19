//! Advisory run locking.
//!
//! The generator mutates a shared build target and assumes exclusive
//! ownership of it for the duration of a run. A file lock under the target
//! root serializes concurrent invocations; it is acquired once, before the
//! repository walk, and held until the process exits.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILENAME: &str = ".envrpm.lock";

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
    pub version: u32,
    pub pid: u32,
    pub started_at_unix: u64,
    pub command: String,
    pub target: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "target is locked by another process: {command} (PID {pid}, started at Unix timestamp {started_at_unix})\n\
         If you're sure no other run is in progress, remove the lock file:\n  {lock_path}"
    )]
    Contention {
        command: String,
        pid: u32,
        started_at_unix: u64,
        lock_path: PathBuf,
    },

    #[error(
        "target is locked (could not read lock metadata)\n\
         If you're sure no other run is in progress, remove the lock file:\n  {lock_path}"
    )]
    ContentionUnknown { lock_path: PathBuf },

    #[error("failed to create target directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("failed to open lock file: {0}")]
    OpenFile(#[source] io::Error),

    #[error("failed to write lock metadata: {0}")]
    WriteMetadata(#[source] io::Error),

    #[error("failed to acquire lock: {0}")]
    LockFailed(#[source] io::Error),
}

/// An exclusive lock on a build target, held for the life of the value.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    lock_path: PathBuf,
}

impl RunLock {
    pub fn acquire(target: &Path, command: &str) -> Result<Self, LockError> {
        let lock_path = target.join(LOCK_FILENAME);

        if !target.exists() {
            std::fs::create_dir_all(target).map_err(LockError::CreateDir)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(LockError::OpenFile)?;

        if let Err(err) = try_lock(&file) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(Self::read_contention_error(&lock_path));
            }
            return Err(LockError::LockFailed(err));
        }

        Self::write_metadata(&file, command, target)?;

        Ok(RunLock {
            _file: file,
            lock_path,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn write_metadata(file: &File, command: &str, target: &Path) -> Result<(), LockError> {
        let metadata = LockMetadata {
            version: 1,
            pid: std::process::id(),
            started_at_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            command: command.to_string(),
            target: target.to_path_buf(),
        };

        file.set_len(0).map_err(LockError::WriteMetadata)?;
        let mut writer = io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &metadata)
            .map_err(|e| LockError::WriteMetadata(io::Error::other(e)))?;
        writer.flush().map_err(LockError::WriteMetadata)?;

        Ok(())
    }

    fn read_contention_error(lock_path: &Path) -> LockError {
        if let Ok(mut file) = File::open(lock_path) {
            let mut contents = String::new();
            if file.read_to_string(&mut contents).is_ok() {
                if let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents) {
                    return LockError::Contention {
                        command: metadata.command,
                        pid: metadata.pid,
                        started_at_unix: metadata.started_at_unix,
                        lock_path: lock_path.to_path_buf(),
                    };
                }
            }
        }

        LockError::ContentionUnknown {
            lock_path: lock_path.to_path_buf(),
        }
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{FlockOperation, flock};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> io::Result<()> {
    // Advisory locking is only implemented for unix; rpmbuild targets are
    // linux hosts.
    Ok(())
}
