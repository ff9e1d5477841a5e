#![allow(clippy::single_call_fn)]
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::exit)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::std_instead_of_core)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::cast_precision_loss)]

use clap::{ArgAction, CommandFactory, Parser, ValueHint, value_parser};
use clap_complete::aot::{Shell, generate};
use dashmap::DashSet;
use ptw::{ChildEntry, TreeVisitor, WalkError, Walker};
use std::ffi::OsString;
use std::fs::Metadata;
use std::io::stdout;
use std::num::NonZeroUsize;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
/// Summarise disk usage of a directory tree, in parallel.
pub struct Args {
    #[arg(
        value_name = "PATH",
        help = "Path to summarise (defaults to the current directory)",
        value_hint = ValueHint::AnyPath,
        required = false,
        index = 1
    )]
    path: Option<OsString>,

    #[arg(
        short = 'j',
        long = "threads",
        help = "Number of worker threads, defaults to available threads"
    )]
    threads: Option<usize>,

    #[arg(
        short = 'd',
        long = "depth",
        help = "Only print directories up to this many levels below the root"
    )]
    depth: Option<usize>,

    #[arg(short = 'a', long = "all", help = "Print files as well as directories\n")]
    all: bool,

    #[arg(
        short = 's',
        long = "summarise",
        conflicts_with = "all",
        help = "Print only the grand total\n"
    )]
    summarise: bool,

    #[arg(short = 'b', long = "bytes", help = "Print exact byte counts\n")]
    bytes: bool,

    #[arg(
        short = 'u',
        long = "unsorted",
        help = "Skip name-sorting of directory entries\n"
    )]
    unsorted: bool,

    #[arg(
        short = 'T',
        long = "file-tasks",
        help = "Dispatch every file as its own pool task (helps on parallel filesystems)\n"
    )]
    file_tasks: bool,

    #[arg(
        short = 'q',
        long = "queue-limit",
        help = "Bound the task queue instead of letting it grow"
    )]
    queue_limit: Option<usize>,

    #[arg(
        long = "generate",
        action = ArgAction::Set,
        value_parser = value_parser!(Shell),
        help = "Generate shell completions"
    )]
    generate: Option<Shell>,
}

/// Folds sizes upward: each file reports its length, each directory sums
/// its children plus its own inode. Hard-linked inodes count once, the
/// way du does it.
struct UsageVisitor {
    root: PathBuf,
    all: bool,
    summarise: bool,
    bytes: bool,
    depth: Option<usize>,
    seen: DashSet<(u64, u64)>,
    failed: Arc<AtomicBool>,
}

impl UsageVisitor {
    fn depth_of(&self, path: &Path) -> usize {
        path.strip_prefix(&self.root)
            .map_or(0, |rest| rest.components().count())
    }

    fn printable(&self, path: &Path) -> bool {
        !self.summarise && self.depth.is_none_or(|limit| self.depth_of(path) <= limit)
    }
}

impl TreeVisitor for UsageVisitor {
    type Data = u64;
    type Token = ();

    fn leave_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        (): (),
        entries: Vec<ChildEntry<u64>>,
    ) -> Option<u64> {
        let total = meta.len() + entries.iter().filter_map(|entry| entry.data).sum::<u64>();
        if self.printable(path) {
            println!("{}\t{}", format_size(total, self.bytes), path.display());
        }
        Some(total)
    }

    fn visit_file(&self, path: &Path, meta: &Metadata, _: Option<&()>) -> Option<u64> {
        if meta.nlink() > 1 && !self.seen.insert((meta.dev(), meta.ino())) {
            // Another link to this inode was already counted.
            return Some(0);
        }
        if self.all && self.printable(path) {
            println!("{}\t{}", format_size(meta.len(), self.bytes), path.display());
        }
        Some(meta.len())
    }

    fn handle_error(
        &self,
        path: &Path,
        _: Option<&Metadata>,
        _: Option<&()>,
        error: &std::io::Error,
    ) -> Option<u64> {
        self.failed.store(true, Ordering::Relaxed);
        eprintln!("ptw: {}: {error}", path.display());
        None
    }
}

fn format_size(bytes: u64, raw: bool) -> String {
    const UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];
    if raw {
        return bytes.to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}{}", UNITS[0])
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

fn main() -> Result<(), WalkError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Some(generator) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_owned();
        generate(generator, &mut cmd, name, &mut stdout());
        return Ok(());
    }

    let root = PathBuf::from(args.path.unwrap_or_else(|| ".".into()));
    let failed = Arc::new(AtomicBool::new(false));

    let walker = Walker::init(&root)
        .threads(args.threads.and_then(NonZeroUsize::new))
        .queue_limit(args.queue_limit.and_then(NonZeroUsize::new))
        .sorted(!args.unsorted)
        .file_tasks(args.file_tasks)
        .build()?;

    let visitor = UsageVisitor {
        root: root.clone(),
        all: args.all,
        summarise: args.summarise,
        bytes: args.bytes,
        depth: args.depth,
        seen: DashSet::new(),
        failed: Arc::clone(&failed),
    };

    let total = walker.traverse(visitor)?;
    println!(
        "{}\ttotal",
        format_size(total.unwrap_or(0), args.bytes)
    );

    if failed.load(Ordering::Relaxed) {
        std::process::exit(1);
    }
    Ok(())
}
