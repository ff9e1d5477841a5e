use crate::pool::Task;
use crate::walk::visitor::{ChildEntry, TreeVisitor};
use crate::walk::walker::{self, WalkContext};
use core::cmp::Ordering;
use parking_lot::Mutex;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Position of a task in the per-directory state machine. The derived
/// order ranks exits above file visits above fresh enters, so heap-mode
/// scheduling drains open directories before opening new ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Enter,
    File,
    Exit,
}

/// Join state of one in-flight directory, all behind a single mutex.
///
/// `pending` counts children whose results are still outstanding; the task
/// that drops it to zero owns scheduling the exit. Holding the lock across
/// the whole child-spawn loop means no child can observe a partially
/// published count.
pub(crate) struct DirState<V: TreeVisitor> {
    pub(crate) token: Option<V::Token>,
    pub(crate) pending: usize,
    pub(crate) entries: Vec<ChildEntry<V::Data>>,
}

/// One directory being traversed. Shared by its children through the
/// `parent` back-link; the `Arc` drops it exactly once, when the last
/// task referencing it completes.
pub(crate) struct DirTask<V: TreeVisitor> {
    pub(crate) path: PathBuf,
    /// `lstat` snapshot taken when the task was scheduled.
    pub(crate) meta: Metadata,
    pub(crate) parent: Option<Arc<DirTask<V>>>,
    /// Index of this directory's record in the parent's entries.
    pub(crate) slot: usize,
    pub(crate) parent_token: Option<V::Token>,
    pub(crate) state: Mutex<DirState<V>>,
    pub(crate) ctx: Arc<WalkContext<V>>,
}

impl<V: TreeVisitor> DirTask<V> {
    pub(crate) fn new(
        path: PathBuf,
        meta: Metadata,
        parent: Option<Arc<DirTask<V>>>,
        slot: usize,
        parent_token: Option<V::Token>,
        ctx: Arc<WalkContext<V>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path,
            meta,
            parent,
            slot,
            parent_token,
            state: Mutex::new(DirState {
                token: None,
                pending: 0,
                entries: Vec::new(),
            }),
            ctx,
        })
    }
}

/// A non-directory child dispatched as its own pool task.
pub(crate) struct FileTask<V: TreeVisitor> {
    pub(crate) path: PathBuf,
    pub(crate) meta: Metadata,
    pub(crate) parent: Arc<DirTask<V>>,
    pub(crate) slot: usize,
    pub(crate) token: V::Token,
}

/// What the worker pool actually runs.
pub(crate) enum WalkTask<V: TreeVisitor> {
    Enter(Arc<DirTask<V>>),
    Exit(Arc<DirTask<V>>),
    File(FileTask<V>),
}

impl<V: TreeVisitor> WalkTask<V> {
    pub(crate) fn phase(&self) -> Phase {
        match self {
            Self::Enter(_) => Phase::Enter,
            Self::File(_) => Phase::File,
            Self::Exit(_) => Phase::Exit,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            Self::Enter(task) | Self::Exit(task) => &task.path,
            Self::File(file) => &file.path,
        }
    }
}

impl<V: TreeVisitor> Task for WalkTask<V> {
    fn run(self) {
        match self {
            Self::Enter(task) => walker::enter(task),
            Self::Exit(task) => walker::exit(task),
            Self::File(file) => walker::visit(file),
        }
    }
}

/// Heap priority with entry sorting off: phase alone.
pub(crate) fn phase_priority<V: TreeVisitor>(a: &WalkTask<V>, b: &WalkTask<V>) -> Ordering {
    a.phase().cmp(&b.phase())
}

/// Heap priority with entry sorting on: phase, then lexicographic path.
/// The pool pops whichever task compares greater, so the later, deeper
/// sibling finishes ahead of work that would open new directories.
pub(crate) fn depth_first_priority<V: TreeVisitor>(a: &WalkTask<V>, b: &WalkTask<V>) -> Ordering {
    a.phase().cmp(&b.phase()).then_with(|| a.path().cmp(b.path()))
}
