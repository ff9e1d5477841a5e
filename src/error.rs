use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the blocking producer side of a [`ThreadPool`](crate::pool::ThreadPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has started shutting down and accepts no further tasks.
    #[error("worker pool is stopped")]
    Stopped,
    /// An unbounded queue refused to grow past its ceiling.
    #[error("task queue capacity exhausted")]
    CapacityOverflow,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Error returned by the non-blocking submit path, handing the task back
/// to the caller so it can be run somewhere else instead.
#[derive(Debug)]
pub enum TrySubmitError<T> {
    /// A bounded queue is at its limit.
    Full(T),
    /// The pool is stopped.
    Stopped(T),
}

impl<T> TrySubmitError<T> {
    /// Recovers the task that could not be queued.
    #[inline]
    #[must_use]
    pub fn into_task(self) -> T {
        match self {
            Self::Full(task) | Self::Stopped(task) => task,
        }
    }
}

/// Errors returned by [`Walker::traverse`](crate::walk::Walker::traverse).
///
/// Everything that goes wrong past the root is routed to the visitor's
/// `handle_error` and repaired locally; only a failure to stat the root or
/// to bring the worker pool up aborts the traversal as a whole.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The root path could not be stat'ed.
    #[error("failed to stat {}: {source}", path.display())]
    Root {
        /// The offending path.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },
    /// The worker pool could not be brought up, or the root task submitted.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
