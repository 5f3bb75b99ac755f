//! Recursive removal with retries.
//!
//! Each entry is unlinked first; directories fall through to `rmdir`, and a
//! non-empty directory has its children removed concurrently before the
//! `rmdir` is retried. Busy paths are retried a few times with linear
//! backoff. Running out of file descriptors is retried with a delay that is
//! shared by the whole session, so a storm of `EMFILE` slows every task
//! down, and any success resets it.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Attempts allowed on a busy path.
const BUSY_TRIES_MAX: u32 = 3;

/// Upper bound for the shared too-many-open-files delay, in milliseconds.
const EMFILE_MAX: u64 = 1000;

type RemoveFuture = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

/// What to do after a failed removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
  /// The path is gone; count it as removed.
  Done,
  /// Busy: wait `busy_tries * 100ms` and try again.
  RetryBusy,
  /// Out of file descriptors: wait for the shared delay and try again.
  RetryEmfile,
  Fail,
}

fn next_step(err: &io::Error, busy_tries: u32, emfile_delay: u64) -> Next {
  match err.kind() {
    ErrorKind::NotFound => Next::Done,
    ErrorKind::ResourceBusy if busy_tries < BUSY_TRIES_MAX => Next::RetryBusy,
    _ if is_too_many_open_files(err) && emfile_delay < EMFILE_MAX => Next::RetryEmfile,
    _ => Next::Fail,
  }
}

#[cfg(unix)]
fn is_too_many_open_files(err: &io::Error) -> bool {
  err.raw_os_error() == Some(rustix::io::Errno::MFILE.raw_os_error())
}

#[cfg(windows)]
fn is_too_many_open_files(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_TOO_MANY_OPEN_FILES;
  err.raw_os_error() == Some(ERROR_TOO_MANY_OPEN_FILES as i32)
}

/// State shared by every task of one purge.
#[derive(Debug, Default)]
pub(super) struct PurgeSession {
  emfile_delay: AtomicU64,
}

impl PurgeSession {
  pub(super) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Remove `path` and everything below it.
  pub(super) fn remove(self: Arc<Self>, path: PathBuf) -> RemoveFuture {
    Box::pin(async move {
      let mut busy_tries = 0;
      loop {
        let err = match self.remove_once(&path).await {
          Ok(()) => {
            self.emfile_delay.store(0, Ordering::Relaxed);
            return Ok(());
          }
          Err(err) => err,
        };

        match next_step(&err, busy_tries, self.emfile_delay.load(Ordering::Relaxed)) {
          Next::Done => {
            self.emfile_delay.store(0, Ordering::Relaxed);
            return Ok(());
          }
          Next::RetryBusy => {
            busy_tries += 1;
            debug!(path = ?path, tries = busy_tries, "path busy, retrying");
            tokio::time::sleep(Duration::from_millis(u64::from(busy_tries) * 100)).await;
          }
          Next::RetryEmfile => {
            let delay = self.emfile_delay.fetch_add(1, Ordering::Relaxed);
            debug!(path = ?path, delay_ms = delay, "too many open files, retrying");
            tokio::time::sleep(Duration::from_millis(delay)).await;
          }
          Next::Fail => return Err(err),
        }
      }
    })
  }

  async fn remove_once(self: &Arc<Self>, path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
      Ok(()) => {
        trace!(path = ?path, "unlinked");
        Ok(())
      }
      Err(err) if matches!(err.kind(), ErrorKind::PermissionDenied | ErrorKind::IsADirectory) => {
        self.remove_dir(path, err).await
      }
      Err(err) => Err(err),
    }
  }

  /// `unlink_err` is reported instead if the path turns out not to be a directory.
  async fn remove_dir(self: &Arc<Self>, path: &Path, unlink_err: io::Error) -> io::Result<()> {
    match fs::remove_dir(path).await {
      Ok(()) => Ok(()),
      Err(err) if matches!(err.kind(), ErrorKind::DirectoryNotEmpty | ErrorKind::AlreadyExists) => {
        self.remove_children(path).await?;
        fs::remove_dir(path).await
      }
      Err(err) if err.kind() == ErrorKind::NotADirectory => Err(unlink_err),
      Err(err) => Err(err),
    }
  }

  async fn remove_children(self: &Arc<Self>, dir: &Path) -> io::Result<()> {
    let mut entries = fs::read_dir(dir).await?;
    let mut tasks = JoinSet::new();
    while let Some(entry) = entries.next_entry().await? {
      tasks.spawn(Arc::clone(self).remove(entry.path()));
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
      let result = joined.unwrap_or_else(|e| Err(io::Error::other(e)));
      if let Err(err) = result
        && first_error.is_none()
      {
        first_error = Some(err);
      }
    }

    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}
