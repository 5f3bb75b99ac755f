//! Advisory lock serializing installer runs on one install root.
//!
//! The lock is an OS file lock on `{root}/.lock`, released when the
//! [`InstallLock`] is dropped or the process dies. The file also carries a
//! small JSON record of who holds it, used to explain contention.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::InstallLayout;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "Another installer is running: {command} (PID {pid}, started at Unix time {started_at_unix})\n\
     If you're sure no installer is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "Another installer is running (lock owner unknown)\n\
     If you're sure no installer is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("Failed to create install root {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("Failed to write lock owner: {0}")]
  WriteHolder(#[source] io::Error),

  #[error("Failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Exclusive hold on an install root.
#[derive(Debug)]
pub struct InstallLock {
  file: File,
  lock_path: PathBuf,
}

impl InstallLock {
  /// Take the lock without waiting. `command` is recorded for other runs to report.
  pub fn acquire(layout: &InstallLayout, command: &str) -> Result<Self, LockError> {
    let root = layout.root();
    let lock_path = layout.lock_path();

    std::fs::create_dir_all(root).map_err(|source| LockError::CreateDir {
      path: root.to_path_buf(),
      source,
    })?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(LockError::OpenFile)?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock || is_lock_violation(&err) {
        return Err(contention_error(&lock_path));
      }
      return Err(LockError::LockFailed(err));
    }

    write_holder(&file, command, root)?;
    debug!(path = ?lock_path, "install lock acquired");
    Ok(Self { file, lock_path })
  }

  /// Read the owner record through the held handle.
  pub fn holder(&self) -> io::Result<LockHolder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_holder(file: &File, command: &str, root: &Path) -> Result<(), LockError> {
  let holder = LockHolder {
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    root: root.to_path_buf(),
  };

  file.set_len(0).map_err(LockError::WriteHolder)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0)).map_err(LockError::WriteHolder)?;
  serde_json::to_writer(&mut writer, &holder).map_err(|e| LockError::WriteHolder(io::Error::other(e)))?;
  writer.flush().map_err(LockError::WriteHolder)?;
  Ok(())
}

fn contention_error(lock_path: &Path) -> LockError {
  let holder = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<LockHolder>(&contents).ok());

  match holder {
    Some(holder) => LockError::Contention {
      command: holder.command,
      pid: holder.pid,
      started_at_unix: holder.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    },
    None => LockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn is_lock_violation(_err: &io::Error) -> bool {
  false
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
  // owned by `file` and open for the duration of the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
  err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}
