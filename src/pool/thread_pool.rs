use crate::pool::queue::{Priority, TaskQueue};
use crate::{PoolError, TrySubmitError};
use core::num::NonZeroUsize;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::trace;

/// A unit of work the pool can run. The task value carries everything its
/// routine needs, so the pool stays oblivious to what it is executing.
pub trait Task: Send + 'static {
    fn run(self);
}

struct PoolState<T> {
    queue: TaskQueue<T>,
    stop: bool,
    running: usize,
}

struct Shared<T> {
    state: Mutex<PoolState<T>>,
    /// Signalled when the queue transitions empty to non-empty.
    consumer: Condvar,
    /// Signalled when a bounded queue transitions full to non-full.
    producer: Condvar,
    limit: Option<NonZeroUsize>,
}

impl<T: Task> Shared<T> {
    /// Blocking submit. Bounded pools park the caller while the queue is at
    /// its limit; unbounded pools grow instead.
    fn submit(&self, task: T) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        loop {
            if state.stop {
                return Err(PoolError::Stopped);
            }
            match self.limit {
                Some(limit) if state.queue.len() == limit.get() => {
                    self.producer.wait(&mut state);
                }
                _ => break,
            }
        }
        self.enqueue(&mut state, task)
            .map_err(|_| PoolError::CapacityOverflow)
    }

    /// Non-blocking submit; a task that cannot be queued right now is handed
    /// back so the caller can run it itself.
    fn try_submit(&self, task: T) -> Result<(), TrySubmitError<T>> {
        let mut state = self.state.lock();
        if state.stop {
            return Err(TrySubmitError::Stopped(task));
        }
        if self
            .limit
            .is_some_and(|limit| state.queue.len() == limit.get())
        {
            return Err(TrySubmitError::Full(task));
        }
        // A refused growth behaves like saturation.
        self.enqueue(&mut state, task).map_err(TrySubmitError::Full)
    }

    fn enqueue(&self, state: &mut PoolState<T>, task: T) -> Result<(), T> {
        let was_empty = state.queue.len() == 0;
        state.queue.push(task)?;
        if was_empty {
            self.consumer.notify_one();
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.state.lock().stop = true;
        self.consumer.notify_all();
        self.producer.notify_all();
    }
}

fn worker_loop<T: Task>(shared: &Shared<T>) {
    let mut state = shared.state.lock();
    loop {
        let was_full = shared
            .limit
            .is_some_and(|limit| state.queue.len() == limit.get());
        if let Some(task) = state.queue.pop() {
            if was_full {
                shared.producer.notify_one();
            }
            state.running += 1;
            drop(state);
            task.run();
            state = shared.state.lock();
            state.running -= 1;
            continue;
        }
        // Stopped pools drain whatever is still queued before exiting.
        if state.stop {
            break;
        }
        shared.consumer.wait(&mut state);
    }
}

/**
A fixed set of worker threads draining a task queue.

The queue discipline is fixed at construction: FIFO by default, or a binary
max-heap when [`Builder::priority`] supplies a comparator. A
[`Builder::queue_limit`] bounds the queue, parking blocking producers while
it is full; without one the queue grows geometrically.
*/
pub struct ThreadPool<T: Task> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Task> ThreadPool<T> {
    #[must_use]
    #[inline]
    pub fn builder() -> Builder<T> {
        Builder::new()
    }

    /// Enqueues a task, blocking while a bounded queue is full.
    ///
    /// # Errors
    /// [`PoolError::Stopped`] once shutdown has begun,
    /// [`PoolError::CapacityOverflow`] if an unbounded queue hits its ceiling.
    #[inline]
    pub fn submit(&self, task: T) -> Result<(), PoolError> {
        self.shared.submit(task)
    }

    /// Enqueues a task without blocking.
    ///
    /// # Errors
    /// Hands the task back inside [`TrySubmitError`] when the queue is full
    /// or the pool is stopped.
    #[inline]
    pub fn try_submit(&self, task: T) -> Result<(), TrySubmitError<T>> {
        self.shared.try_submit(task)
    }

    /// A cheap clonable submitter for tasks that schedule further tasks.
    #[must_use]
    #[inline]
    pub fn handle(&self) -> Handle<T> {
        Handle(Arc::clone(&self.shared))
    }

    /// Number of tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Number of tasks currently executing on workers.
    #[must_use]
    pub fn running(&self) -> usize {
        self.shared.state.lock().running
    }
}

impl<T: Task> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shared.shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Submit-only reference to a pool, held by in-flight tasks.
pub struct Handle<T: Task>(Arc<Shared<T>>);

impl<T: Task> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Task> Handle<T> {
    /// See [`ThreadPool::submit`].
    ///
    /// # Errors
    /// As [`ThreadPool::submit`].
    #[inline]
    pub fn submit(&self, task: T) -> Result<(), PoolError> {
        self.0.submit(task)
    }

    /// See [`ThreadPool::try_submit`].
    ///
    /// # Errors
    /// As [`ThreadPool::try_submit`].
    #[inline]
    pub fn try_submit(&self, task: T) -> Result<(), TrySubmitError<T>> {
        self.0.try_submit(task)
    }
}

/// Configures and launches a [`ThreadPool`].
pub struct Builder<T> {
    threads: NonZeroUsize,
    stack_size: Option<usize>,
    queue_limit: Option<NonZeroUsize>,
    priority: Option<Priority<T>>,
}

impl<T: Task> Builder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            threads: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            stack_size: None,
            queue_limit: None,
            priority: None,
        }
    }

    /// Worker count, defaults to available parallelism.
    #[must_use]
    pub const fn threads(mut self, threads: Option<NonZeroUsize>) -> Self {
        if let Some(count) = threads {
            self.threads = count;
        }
        self
    }

    /// Stack size per worker, forwarded to [`thread::Builder`].
    #[must_use]
    pub const fn stack_size(mut self, bytes: Option<usize>) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Bounds the queue; `None` (the default) grows it geometrically.
    #[must_use]
    pub const fn queue_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Switches the queue to heap mode. `Ordering::Greater` means the first
    /// argument is dequeued before the second.
    #[must_use]
    pub const fn priority(mut self, priority: Option<Priority<T>>) -> Self {
        self.priority = priority;
        self
    }

    /// Launches the workers, each starting in the wait-for-task state.
    ///
    /// # Errors
    /// [`PoolError::Spawn`] when the OS refuses a worker thread; workers
    /// spawned so far are torn down before returning.
    pub fn build(self) -> Result<ThreadPool<T>, PoolError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: TaskQueue::new(self.queue_limit.map(NonZeroUsize::get), self.priority),
                stop: false,
                running: 0,
            }),
            consumer: Condvar::new(),
            producer: Condvar::new(),
            limit: self.queue_limit,
        });

        let mut workers = Vec::with_capacity(self.threads.get());
        for index in 0..self.threads.get() {
            let mut builder = thread::Builder::new().name(format!("ptw-worker-{index}"));
            if let Some(bytes) = self.stack_size {
                builder = builder.stack_size(bytes);
            }
            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || worker_loop(&worker_shared)) {
                Ok(handle) => workers.push(handle),
                Err(error) => {
                    shared.shutdown();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(PoolError::Spawn(error));
                }
            }
        }
        trace!(workers = self.threads.get(), "pool started");

        Ok(ThreadPool { shared, workers })
    }
}

impl<T: Task> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}
