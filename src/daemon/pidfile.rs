//! PID-file acquisition with stale-lock recovery (§4.6), one per running
//! agent process.
//!
//! Grounded directly in the original `nrpe_ng/daemon/pidfile.py`
//! (`PidFile.create`/`write`/`close`), translated from `fcntl.lockf` to a
//! raw `libc::flock` advisory lock since there is no lock-file crate in
//! the retrieved pack's dependency stack.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("already running (PID {0})")]
    AlreadyRunning(i32),
}

/// A held PID file: created on daemonization, removed on clean shutdown.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Acquire `path`, recovering from a stale lock per §4.6: the
    /// pre-existing file is treated as stale (deleted and recreated) when
    /// its content isn't a decimal PID, the PID equals this process, or
    /// the advisory lock could itself be acquired (meaning no live holder
    /// remains). Otherwise another instance is live and this fails.
    pub fn create(path: &Path) -> Result<Self, PidFileError> {
        let file = match open_exclusive(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => recover_or_fail(path)?,
            Err(e) => return Err(io_err(path, e)),
        };
        lock_exclusive(&file, path)?;
        Ok(PidFile {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Write this process's PID, truncating any previous content.
    /// Re-asserts the lock first since it may have been dropped across a
    /// fork, and marks the descriptor close-on-exec so children never
    /// inherit it.
    pub fn write(&mut self) -> Result<(), PidFileError> {
        lock_exclusive(&self.file, &self.path)?;
        let pid = std::process::id();
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| io_err(&self.path, e))?;
        write!(self.file, "{pid}\n").map_err(|e| io_err(&self.path, e))?;
        self.file.flush().map_err(|e| io_err(&self.path, e))?;
        let len = self
            .file
            .stream_position()
            .map_err(|e| io_err(&self.path, e))?;
        self.file.set_len(len).map_err(|e| io_err(&self.path, e))?;
        set_cloexec(&self.file);
        Ok(())
    }

    /// Close the descriptor and unlink the file. Called on clean
    /// shutdown only; a crashed process leaves the file behind for the
    /// next start's stale-lock recovery to clean up.
    pub fn close(self) -> Result<(), PidFileError> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path).map_err(|e| io_err(&path, e))
    }
}

fn open_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(path)
}

fn recover_or_fail(path: &Path) -> Result<File, PidFileError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;

    let mut contents = String::new();
    let _ = file.read_to_string(&mut contents);
    let existing_pid: Option<i32> = contents
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok());

    let locked = try_lock_exclusive(&file);
    let is_stale = match existing_pid {
        None => true,
        Some(pid) => pid == std::process::id() as i32 || locked,
    };

    if !is_stale {
        return Err(PidFileError::AlreadyRunning(existing_pid.unwrap_or(0)));
    }

    drop(file);
    fs::remove_file(path).map_err(|e| io_err(path, e))?;
    open_exclusive(path).map_err(|e| io_err(path, e))
}

fn lock_exclusive(file: &File, path: &Path) -> Result<(), PidFileError> {
    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret != 0 {
        return Err(io_err(path, std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Like [`lock_exclusive`] but reports failure as a bool instead of an
/// error; used only to probe "does anyone else hold this lock".
fn try_lock_exclusive(file: &File) -> bool {
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

fn set_cloexec(file: &File) {
    unsafe {
        let flags = libc::fcntl(file.as_raw_fd(), libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(file.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> PidFileError {
    PidFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_and_writes_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let mut pf = PidFile::create(&path).unwrap();
        pf.write().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn close_unlinks_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let mut pf = PidFile::create(&path).unwrap();
        pf.write().unwrap();
        pf.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn stale_file_with_non_numeric_content_is_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        fs::write(&path, "not-a-pid\n").unwrap();

        let mut pf = PidFile::create(&path).unwrap();
        pf.write().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), std::process::id().to_string());
    }

    #[test]
    fn stale_file_naming_our_own_pid_is_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let pf = PidFile::create(&path);
        assert!(pf.is_ok());
    }

    #[test]
    fn live_lock_holder_is_reported_as_already_running() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.pid");

        // Simulate a different, still-live process: write a bogus but
        // numeric PID and hold the lock ourselves without releasing it.
        let held = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        unsafe {
            libc::flock(held.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB);
        }
        fs::write(&path, "999999\n").unwrap();

        let err = PidFile::create(&path).unwrap_err();
        assert!(matches!(err, PidFileError::AlreadyRunning(999999)));
        drop(held);
    }
}
