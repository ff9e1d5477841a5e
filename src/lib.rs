#![allow(clippy::inline_always)]

/*!
ptw — a multi-threaded path traversal engine.

Sequential `readdir`/`stat` pipelines leave a parallel filesystem mostly
idle; the client, not the storage, is the bottleneck. `ptw` walks one
directory tree with a pool of worker threads, handing every directory and
file to a [`TreeVisitor`] while keeping strict parent-before-child order
for the pre-order callback and child-before-parent order for the
post-order one, with per-entry results flowing upward.

Symlinks are never followed (only `lstat` is taken), so symlink loops
cannot recurse.

# Example

Sum file sizes across a tree:

```no_run
use ptw::{ChildEntry, TreeVisitor, Walker};
use std::fs::Metadata;
use std::path::Path;

struct Sizes;

impl TreeVisitor for Sizes {
    type Data = u64;
    type Token = ();

    fn visit_file(&self, _: &Path, meta: &Metadata, _: Option<&()>) -> Option<u64> {
        Some(meta.len())
    }

    fn leave_dir(
        &self,
        _: &Path,
        _: &Metadata,
        _: (),
        entries: Vec<ChildEntry<u64>>,
    ) -> Option<u64> {
        Some(entries.iter().filter_map(|entry| entry.data).sum())
    }
}

fn main() -> Result<(), ptw::WalkError> {
    let total = Walker::init("/var/log").sorted(true).build()?.traverse(Sizes)?;
    println!("{} bytes", total.unwrap_or(0));
    Ok(())
}
```
*/

mod error;
pub mod pool;
pub mod walk;

pub use error::{PoolError, TrySubmitError, WalkError};
pub use walk::{ChildEntry, TreeVisitor, Walker, WalkerBuilder};

mod test;

//this allocator is more efficient than jemalloc through my testing
#[cfg(all(
    feature = "mimalloc",
    any(target_os = "linux", target_os = "macos", target_os = "android")
))]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;
