use criterion::{Criterion, criterion_group, criterion_main};
use ptw::{ChildEntry, TreeVisitor, Walker};
use std::fs::{self, Metadata};
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

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
        (): (),
        entries: Vec<ChildEntry<u64>>,
    ) -> Option<u64> {
        Some(entries.iter().filter_map(|entry| entry.data).sum())
    }
}

/// Lays a reusable fixture tree under the system temp directory: three
/// levels, four directories and eight small files per level.
fn build_fixture() -> PathBuf {
    fn populate(dir: &Path, depth: u32) {
        for index in 0..8 {
            fs::write(dir.join(format!("f{index}")), "data").unwrap();
        }
        if depth > 0 {
            for index in 0..4 {
                let child = dir.join(format!("d{index}"));
                fs::create_dir_all(&child).unwrap();
                populate(&child, depth - 1);
            }
        }
    }

    let root = std::env::temp_dir().join("ptw_bench_fixture");
    if !root.exists() {
        fs::create_dir_all(&root).unwrap();
        populate(&root, 3);
    }
    root
}

fn bench_walk(c: &mut Criterion) {
    let root = build_fixture();
    let mut group = c.benchmark_group("walk");

    for &threads in &[1usize, 2, 4, 8] {
        group.bench_function(format!("threads_{threads}"), |b| {
            b.iter(|| {
                let total = Walker::init(&root)
                    .threads(NonZeroUsize::new(threads))
                    .sorted(true)
                    .build()
                    .unwrap()
                    .traverse(Sizes)
                    .unwrap();
                black_box(total)
            });
        });
    }

    for &threads in &[1usize, 8] {
        group.bench_function(format!("file_tasks_threads_{threads}"), |b| {
            b.iter(|| {
                let total = Walker::init(&root)
                    .threads(NonZeroUsize::new(threads))
                    .file_tasks(true)
                    .build()
                    .unwrap()
                    .traverse(Sizes)
                    .unwrap();
                black_box(total)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_walk);
criterion_main!(benches);
