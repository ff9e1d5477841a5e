/*!
Multi-threaded directory tree traversal with ordered visitor callbacks.

Each directory moves through a three-phase state machine: an *enter* task
reads the directory and schedules one task per child, and once the last
child has reported back an *exit* task aggregates their results. Files are
visited inline from their parent's enter task, or as tasks of their own
when [`WalkerBuilder::file_tasks`] is on.

The scheduler runs the tasks on a heap-mode [`pool`](crate::pool),
preferring exits over file visits over fresh enters so the working set of
open directories stays bounded by tree depth times parallelism rather than
tree width.

Ordering, as observed by a [`TreeVisitor`]:

- `enter_dir(d)` happens-before every callback on a descendant of `d`, and
  every descendant callback happens-before `leave_dir(d)`;
- with sorting on, `leave_dir` receives entries in ascending name order;
- no cross-directory ordering is promised; sibling visits interleave.

Parent/child joins are mediated entirely by the task queue: no worker ever
blocks on another task, and when the queue itself is saturated a worker
runs the refused task in place, so a queue bound of one still completes.
*/

mod task;
mod visitor;
mod walker;

pub use visitor::{ChildEntry, TreeVisitor};
pub use walker::{Walker, WalkerBuilder};
