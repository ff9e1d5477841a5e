use crate::WalkError;
use crate::pool::{Handle, Priority, Task as _, ThreadPool};
use crate::walk::task::{DirTask, FileTask, WalkTask, depth_first_priority, phase_priority};
use crate::walk::visitor::{ChildEntry, TreeVisitor};
use core::num::NonZeroUsize;
use crossbeam_channel::{Sender, bounded};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::{fs, io};
use tracing::{debug, trace, warn};

/// Everything shared by every task of one traversal.
pub(crate) struct WalkContext<V: TreeVisitor> {
    pub(crate) visitor: V,
    pub(crate) sorted: bool,
    pub(crate) file_tasks: bool,
    pub(crate) pool: Handle<WalkTask<V>>,
    /// Two-party barrier releasing the caller once the root completes.
    pub(crate) done: Sender<Option<V::Data>>,
}

/**
A builder for configuring a [`Walker`].

Options cover the worker pool (thread count, per-worker stack size, queue
bound) and the two traversal toggles: entry sorting and per-file tasks.
*/
pub struct WalkerBuilder {
    root: PathBuf,
    threads: NonZeroUsize,
    queue_limit: Option<NonZeroUsize>,
    stack_size: Option<usize>,
    sorted: bool,
    file_tasks: bool,
}

impl WalkerBuilder {
    /// Creates a builder rooted at `root`. An empty root means the current
    /// directory, resolved at [`build`](Self::build) time.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let threads = thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.as_ref().to_owned(),
            threads,
            queue_limit: None,
            stack_size: None,
            sorted: false,
            file_tasks: false,
        }
    }

    /// Worker threads used for traversal, defaults to available parallelism.
    #[must_use]
    pub const fn threads(mut self, threads: Option<NonZeroUsize>) -> Self {
        if let Some(count) = threads {
            self.threads = count;
        }
        self
    }

    /// Bounds the task queue; `None` (the default) lets it grow. Saturation
    /// never drops work: tasks the queue refuses run on the worker that
    /// produced them.
    #[must_use]
    pub const fn queue_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Stack size per worker thread, defaults to the platform's.
    #[must_use]
    pub const fn stack_size(mut self, bytes: Option<usize>) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Presents entries to `leave_dir` in ascending name order and biases
    /// scheduling towards finishing deep paths first, defaults to false.
    /// Sibling visits themselves still interleave arbitrarily.
    #[must_use]
    pub const fn sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Dispatches every non-directory as its own pool task instead of
    /// visiting it inline from the parent's task, defaults to false.
    /// Directory children always get their own task either way.
    #[must_use]
    pub const fn file_tasks(mut self, file_tasks: bool) -> Self {
        self.file_tasks = file_tasks;
        self
    }

    /// Resolves the root and fixes the configuration.
    ///
    /// # Errors
    /// [`WalkError::Root`] when an empty root is given and the current
    /// directory cannot be determined.
    pub fn build(self) -> Result<Walker, WalkError> {
        let root = if self.root.as_os_str().is_empty() {
            match std::env::current_dir() {
                Ok(dir) => dir,
                Err(source) => {
                    return Err(WalkError::Root {
                        path: self.root,
                        source,
                    });
                }
            }
        } else {
            self.root
        };

        Ok(Walker {
            root,
            threads: self.threads,
            queue_limit: self.queue_limit,
            stack_size: self.stack_size,
            sorted: self.sorted,
            file_tasks: self.file_tasks,
        })
    }
}

/**
A configured traversal, ready to run against a [`TreeVisitor`].

The engine walks one root with a pool of worker threads, calling
`enter_dir` before anything below a directory and `leave_dir` after
everything below it, with per-entry results flowing upward. See the
[module docs](crate::walk) for the full ordering contract.
*/
pub struct Walker {
    root: PathBuf,
    threads: NonZeroUsize,
    queue_limit: Option<NonZeroUsize>,
    stack_size: Option<usize>,
    sorted: bool,
    file_tasks: bool,
}

impl Walker {
    /// Starts configuring a traversal rooted at `root`.
    #[must_use]
    #[inline]
    pub fn init<P: AsRef<Path>>(root: P) -> WalkerBuilder {
        WalkerBuilder::new(root)
    }

    /**
    Walks the tree, blocking until every task has completed.

    Returns the root's own result: what `leave_dir` returned for the root
    directory, or what `visit_file` returned when the root is not a
    directory, or `None` when the root was skipped.

    # Errors
    [`WalkError::Root`] when the root cannot be stat'ed,
    [`WalkError::Pool`] when the pool cannot be brought up or the root
    task cannot be submitted. Every later failure is routed to the
    visitor's `handle_error` and repaired locally instead.
    */
    pub fn traverse<V: TreeVisitor>(self, visitor: V) -> Result<Option<V::Data>, WalkError> {
        let meta = match fs::symlink_metadata(&self.root) {
            Ok(meta) => meta,
            Err(source) => {
                return Err(WalkError::Root {
                    path: self.root,
                    source,
                });
            }
        };

        // A root that is not a directory gets its single visit on the
        // calling thread; no pool spins up.
        if !meta.is_dir() {
            return Ok(visitor.visit_file(&self.root, &meta, None));
        }

        let priority: Priority<WalkTask<V>> = if self.sorted {
            depth_first_priority::<V>
        } else {
            phase_priority::<V>
        };
        let pool = ThreadPool::builder()
            .threads(Some(self.threads))
            .stack_size(self.stack_size)
            .queue_limit(self.queue_limit)
            .priority(Some(priority))
            .build()?;

        let (done, finished) = bounded(1);
        let ctx = Arc::new(WalkContext {
            visitor,
            sorted: self.sorted,
            file_tasks: self.file_tasks,
            pool: pool.handle(),
            done,
        });

        let root = DirTask::new(self.root, meta, None, 0, None, ctx);
        pool.submit(WalkTask::Enter(root))?;

        match finished.recv() {
            Ok(data) => Ok(data),
            // Every sender died without a root result: a callback panicked
            // on a worker and took its subtree's tasks with it.
            Err(_) => {
                warn!("traversal ended without a root result");
                Ok(None)
            }
        }
        // Dropping the pool here stops and joins the workers; the root's
        // exit was the last task, so the queue is already empty.
    }
}

/// Reads a directory's child names. `read_dir` never yields `.`/`..`; a
/// mid-stream error poisons the whole listing rather than truncating it
/// silently.
fn read_names(path: &Path, sorted: bool) -> io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        names.push(entry?.file_name());
    }
    if sorted {
        names.sort_unstable();
    }
    Ok(names)
}

/// Submits a child task, or queues it for inline execution when the pool
/// refuses it. Inline execution must wait until the parent's lock is
/// released, since the child's completion path takes that same lock.
fn dispatch<V: TreeVisitor>(
    ctx: &WalkContext<V>,
    task: WalkTask<V>,
    deferred: &mut Vec<WalkTask<V>>,
) {
    if let Err(bounced) = ctx.pool.try_submit(task) {
        warn!("task queue saturated, absorbing child on this worker");
        deferred.push(bounced.into_task());
    }
}

/// Pre-order half of the directory state machine.
pub(crate) fn enter<V: TreeVisitor>(task: Arc<DirTask<V>>) {
    let ctx = Arc::clone(&task.ctx);
    trace!(path = %task.path.display(), "entering directory");

    let Some(token) = ctx
        .visitor
        .enter_dir(&task.path, &task.meta, task.parent_token.as_ref())
    else {
        // Subtree declined: nothing is read, no leave_dir fires, and the
        // parent sees this entry with no data.
        finish(task, None);
        return;
    };

    let names = match read_names(&task.path, ctx.sorted) {
        Ok(names) => names,
        Err(error) => {
            debug!(path = %task.path.display(), %error, "directory read failed");
            let data = ctx
                .visitor
                .handle_error(&task.path, Some(&task.meta), Some(&token), &error);
            finish(task, data);
            return;
        }
    };

    let mut deferred = Vec::new();
    let ready = {
        let mut state = task.state.lock();
        state.token = Some(token);
        state.entries.reserve(names.len());

        for name in names {
            let child_path = task.path.join(&name);
            let child_meta = match fs::symlink_metadata(&child_path) {
                Ok(meta) => meta,
                // Deleted between the directory read and the stat:
                // filesystem churn, not an error. No entry is recorded.
                Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
                Err(error) => {
                    debug!(path = %child_path.display(), %error, "child stat failed");
                    ctx.visitor.handle_error(&child_path, None, None, &error);
                    state.entries.push(ChildEntry { name, data: None });
                    continue;
                }
            };

            let slot = state.entries.len();
            state.entries.push(ChildEntry { name, data: None });

            if child_meta.is_dir() {
                let child = DirTask::new(
                    child_path,
                    child_meta,
                    Some(Arc::clone(&task)),
                    slot,
                    state.token.clone(),
                    Arc::clone(&ctx),
                );
                state.pending += 1;
                dispatch(&ctx, WalkTask::Enter(child), &mut deferred);
            } else if ctx.file_tasks {
                let file = FileTask {
                    path: child_path,
                    meta: child_meta,
                    parent: Arc::clone(&task),
                    slot,
                    token: state.token.clone().unwrap_or_default(),
                };
                state.pending += 1;
                dispatch(&ctx, WalkTask::File(file), &mut deferred);
            } else {
                let data = ctx
                    .visitor
                    .visit_file(&child_path, &child_meta, state.token.as_ref());
                state.entries[slot].data = data;
            }
        }

        state.pending == 0
    };

    // Children the saturated queue bounced run here, on their producer,
    // after the lock is gone. This is what keeps a tiny queue bound (or a
    // stopping pool) from wedging the traversal.
    for bounced in deferred {
        bounced.run();
    }

    if ready {
        // No child was scheduled; skip the round trip through the queue.
        exit(task);
    }
}

/// Post-order half: aggregate children, pass the result up.
pub(crate) fn exit<V: TreeVisitor>(task: Arc<DirTask<V>>) {
    let (token, entries) = {
        let mut state = task.state.lock();
        (state.token.take(), core::mem::take(&mut state.entries))
    };

    trace!(path = %task.path.display(), entries = entries.len(), "leaving directory");
    let data = match token {
        Some(token) => task
            .ctx
            .visitor
            .leave_dir(&task.path, &task.meta, token, entries),
        // Exits are only scheduled for entered directories.
        None => None,
    };
    finish(task, data);
}

/// Runs a dispatched file visit, then joins on the parent.
pub(crate) fn visit<V: TreeVisitor>(file: FileTask<V>) {
    let FileTask {
        path,
        meta,
        parent,
        slot,
        token,
    } = file;
    let data = parent.ctx.visitor.visit_file(&path, &meta, Some(&token));
    complete_child(&parent, slot, data);
}

/// Ends a directory task: its result goes to the parent's entry, or out
/// through the root barrier.
fn finish<V: TreeVisitor>(task: Arc<DirTask<V>>, data: Option<V::Data>) {
    match task.parent.as_ref() {
        Some(parent) => {
            let parent = Arc::clone(parent);
            let slot = task.slot;
            drop(task);
            complete_child(&parent, slot, data);
        }
        None => {
            let _ = task.ctx.done.send(data);
        }
    }
}

/// Joins a completed child into its parent. Whoever drops `pending` to
/// zero schedules the parent's exit; the lock is released first because a
/// refused submission runs that exit right here.
fn complete_child<V: TreeVisitor>(parent: &Arc<DirTask<V>>, slot: usize, data: Option<V::Data>) {
    let ready = {
        let mut state = parent.state.lock();
        state.entries[slot].data = data;
        state.pending -= 1;
        state.pending == 0
    };
    if ready {
        let exit_task = WalkTask::Exit(Arc::clone(parent));
        if let Err(bounced) = parent.ctx.pool.try_submit(exit_task) {
            bounced.into_task().run();
        }
    }
}
