/*!
A fixed-size worker pool draining a shared task queue.

The queue runs one of two disciplines, chosen at construction: a FIFO ring
(amortised O(1), power-of-two capacity) or a binary max-heap driven by a
caller comparator. Either can be bounded, parking blocking producers while
full, or unbounded, doubling its backing storage on overflow.

Workers suspend only on the pool's condition variables; producers and
consumers never spin. Tasks are opaque values implementing [`Task`], so a
task that needs to schedule follow-up work carries a [`Handle`] of its own.
*/

mod queue;
mod thread_pool;

pub use queue::Priority;
pub use thread_pool::{Builder, Handle, Task, ThreadPool};
