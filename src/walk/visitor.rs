use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::Path;

/// One record per directory child, handed to [`TreeVisitor::leave_dir`].
///
/// `data` starts out `None` and is filled in by whichever task visited the
/// child: a file visit, a nested `leave_dir`, or an error handler. A child
/// whose subtree was declined by `enter_dir` keeps `None`.
#[derive(Debug)]
pub struct ChildEntry<D> {
    /// Name of the child within its parent directory.
    pub name: OsString,
    /// Result produced by the child's visit, if any.
    pub data: Option<D>,
}

/**
Receives the traversal's callbacks.

Every method has a no-op default, so a visitor overrides only what it
needs. The engine guarantees, for any directory it enters:

- `enter_dir` happens-before every callback on a descendant;
- every descendant callback happens-before that directory's `leave_dir`;
- the root's `leave_dir` (or the lone `visit_file` when the root is not a
  directory) is the last callback before the traversal call returns.

Nothing is promised about ordering between siblings or across unrelated
directories; callbacks run concurrently on worker threads, so state shared
between them goes behind its own synchronisation.
*/
pub trait TreeVisitor: Send + Sync + 'static {
    /// Result payload flowing from children to parents. The engine stores
    /// and forwards it but never looks inside.
    type Data: Send + 'static;

    /// Per-directory continuation created by [`enter_dir`](Self::enter_dir)
    /// and consumed by [`leave_dir`](Self::leave_dir). Children receive
    /// clones, so state shared with them belongs behind an `Arc`.
    type Token: Clone + Default + Send + Sync + 'static;

    /// Called before a directory is read. `parent` is the enclosing
    /// directory's token, absent at the root. Returning `None` skips the
    /// whole subtree: nothing under it is visited, no `leave_dir` fires,
    /// and the parent sees the child's entry with `data == None`.
    fn enter_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        parent: Option<&Self::Token>,
    ) -> Option<Self::Token> {
        let _ = (path, meta, parent);
        Some(Self::Token::default())
    }

    /// Called once every child of the directory has completed. `entries`
    /// holds one record per child present at read time, in name order when
    /// sorting is enabled. The return value becomes this directory's data
    /// in its own parent's entry.
    fn leave_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        token: Self::Token,
        entries: Vec<ChildEntry<Self::Data>>,
    ) -> Option<Self::Data> {
        let _ = (path, meta, token, entries);
        None
    }

    /// Called for every non-directory, and for the root itself when the
    /// root is not a directory (in which case `parent` is `None`).
    fn visit_file(
        &self,
        path: &Path,
        meta: &Metadata,
        parent: Option<&Self::Token>,
    ) -> Option<Self::Data> {
        let _ = (path, meta, parent);
        None
    }

    /// Called when a directory cannot be read or a child cannot be
    /// stat'ed. `meta` and `token` are present when the failing node got
    /// far enough to have them. The return value replaces the normal
    /// result for that node; the traversal itself carries on.
    fn handle_error(
        &self,
        path: &Path,
        meta: Option<&Metadata>,
        token: Option<&Self::Token>,
        error: &io::Error,
    ) -> Option<Self::Data> {
        let _ = (path, meta, token, error);
        None
    }
}
