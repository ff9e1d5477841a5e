#[cfg(test)]
mod tests {
    use crate::{ChildEntry, TreeVisitor, WalkError, Walker};
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::{RngExt, SeedableRng};
    use std::ffi::OsString;
    use std::fs::{self, Metadata};
    use std::io;
    use std::num::NonZeroUsize;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Data returned by `handle_error` so tests can spot repaired nodes.
    const ERROR_MARKER: u64 = 999_999;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        Enter,
        File,
        Exit,
        Error,
    }

    #[derive(Default)]
    struct ProbeState {
        log: Mutex<Vec<(Event, PathBuf)>>,
        exits: Mutex<Vec<(PathBuf, Vec<(OsString, Option<u64>)>)>>,
        violations: Mutex<Vec<String>>,
    }

    /// Visitor recording every callback. Sums file sizes upward, carries
    /// its own path as the continuation so token routing is checkable.
    #[derive(Clone, Default)]
    struct Probe {
        state: Arc<ProbeState>,
        skip: Option<OsString>,
        sabotage: Option<PathBuf>,
    }

    impl Probe {
        fn new() -> Self {
            Self::default()
        }

        fn record(&self, event: Event, path: &Path) {
            self.state.log.lock().push((event, path.to_owned()));
        }

        fn violation(&self, message: String) {
            self.state.violations.lock().push(message);
        }
    }

    impl TreeVisitor for Probe {
        type Data = u64;
        type Token = PathBuf;

        fn enter_dir(&self, path: &Path, _: &Metadata, parent: Option<&PathBuf>) -> Option<PathBuf> {
            self.record(Event::Enter, path);
            if let Some(parent_token) = parent {
                if Some(parent_token.as_path()) != path.parent() {
                    self.violation(format!(
                        "enter_dir({}) saw parent token {}",
                        path.display(),
                        parent_token.display()
                    ));
                }
            }
            if self
                .skip
                .as_deref()
                .is_some_and(|name| path.file_name() == Some(name))
            {
                return None;
            }
            if self.sabotage.as_deref() == Some(path) {
                // Yank the directory out from underneath its own read.
                fs::remove_dir_all(path).unwrap();
            }
            Some(path.to_owned())
        }

        fn leave_dir(
            &self,
            path: &Path,
            _: &Metadata,
            token: PathBuf,
            entries: Vec<ChildEntry<u64>>,
        ) -> Option<u64> {
            self.record(Event::Exit, path);
            if token != path {
                self.violation(format!(
                    "leave_dir({}) got token {}",
                    path.display(),
                    token.display()
                ));
            }
            let snapshot = entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.data))
                .collect();
            self.state.exits.lock().push((path.to_owned(), snapshot));
            Some(entries.iter().filter_map(|entry| entry.data).sum())
        }

        fn visit_file(&self, path: &Path, meta: &Metadata, parent: Option<&PathBuf>) -> Option<u64> {
            self.record(Event::File, path);
            if let Some(parent_token) = parent {
                if Some(parent_token.as_path()) != path.parent() {
                    self.violation(format!(
                        "visit_file({}) saw parent token {}",
                        path.display(),
                        parent_token.display()
                    ));
                }
            }
            Some(meta.len())
        }

        fn handle_error(
            &self,
            path: &Path,
            _: Option<&Metadata>,
            _: Option<&PathBuf>,
            _: &io::Error,
        ) -> Option<u64> {
            self.record(Event::Error, path);
            Some(ERROR_MARKER)
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ptw_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn walk(root: &Path, probe: Probe, threads: usize) -> Option<u64> {
        Walker::init(root)
            .threads(NonZeroUsize::new(threads))
            .sorted(true)
            .build()
            .unwrap()
            .traverse(probe)
            .unwrap()
    }

    fn position(log: &[(Event, PathBuf)], event: Event, path: &Path) -> usize {
        log.iter()
            .position(|(logged, at)| *logged == event && at == path)
            .unwrap_or_else(|| panic!("{event:?} {} not in log", path.display()))
    }

    fn assert_clean(state: &ProbeState) {
        let violations = state.violations.lock();
        assert!(violations.is_empty(), "token violations: {violations:?}");
    }

    #[test]
    fn empty_directory_enters_and_exits_once() {
        let root = scratch_dir("empty");
        let probe = Probe::new();
        let state = Arc::clone(&probe.state);

        let total = walk(&root, probe, 4);
        assert_eq!(total, Some(0));

        let log = state.log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(position(&log, Event::Enter, &root), 0);
        assert_eq!(position(&log, Event::Exit, &root), 1);
        drop(log);

        let exits = state.exits.lock();
        assert_eq!(exits.len(), 1);
        assert!(exits[0].1.is_empty());
        drop(exits);

        assert_clean(&state);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn flat_directory_presents_sorted_entries() {
        let root = scratch_dir("flat");
        let mut expected = 0u64;
        for (index, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let body = "x".repeat(index + 1);
            expected += body.len() as u64;
            fs::write(root.join(name), body).unwrap();
        }

        for file_tasks in [false, true] {
            let probe = Probe::new();
            let state = Arc::clone(&probe.state);
            let total = Walker::init(&root)
                .threads(NonZeroUsize::new(4))
                .sorted(true)
                .file_tasks(file_tasks)
                .build()
                .unwrap()
                .traverse(probe)
                .unwrap();
            assert_eq!(total, Some(expected));

            let exits = state.exits.lock();
            assert_eq!(exits.len(), 1);
            let names: Vec<_> = exits[0].1.iter().map(|(name, _)| name.clone()).collect();
            assert_eq!(names, ["a", "b", "c", "d", "e"]);
            assert!(exits[0].1.iter().all(|(_, data)| data.is_some()));
            drop(exits);

            assert_eq!(
                state
                    .log
                    .lock()
                    .iter()
                    .filter(|(event, _)| *event == Event::File)
                    .count(),
                5
            );
            assert_clean(&state);
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn two_level_tree_nests_enter_and_exit() {
        let root = scratch_dir("nested");
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("x"), "xx").unwrap();
        fs::write(sub.join("y"), "yyy").unwrap();
        fs::write(root.join("z"), "z").unwrap();

        let probe = Probe::new();
        let state = Arc::clone(&probe.state);
        let total = walk(&root, probe, 4);
        assert_eq!(total, Some(6));

        let log = state.log.lock();
        let enter_root = position(&log, Event::Enter, &root);
        let enter_sub = position(&log, Event::Enter, &sub);
        let file_x = position(&log, Event::File, &sub.join("x"));
        let file_y = position(&log, Event::File, &sub.join("y"));
        let file_z = position(&log, Event::File, &root.join("z"));
        let exit_sub = position(&log, Event::Exit, &sub);
        let exit_root = position(&log, Event::Exit, &root);

        assert!(enter_root < enter_sub);
        assert!(enter_sub < file_x && enter_sub < file_y);
        assert!(file_x < exit_sub && file_y < exit_sub);
        assert!(exit_sub < exit_root);
        assert!(enter_root < file_z && file_z < exit_root);
        drop(log);

        assert_clean(&state);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn declined_subtree_yields_no_exit_and_no_data() {
        let root = scratch_dir("skip");
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("hidden"), "zzzz").unwrap();
        fs::write(root.join("kept"), "kk").unwrap();

        let probe = Probe {
            skip: Some("sub".into()),
            ..Probe::new()
        };
        let state = Arc::clone(&probe.state);
        let total = walk(&root, probe, 2);
        // Only the kept file contributes.
        assert_eq!(total, Some(2));

        let log = state.log.lock();
        assert!(
            !log.iter()
                .any(|(event, path)| *event == Event::Exit && path == &sub)
        );
        assert!(
            !log.iter()
                .any(|(event, path)| *event == Event::File && path == &sub.join("hidden"))
        );
        drop(log);

        let exits = state.exits.lock();
        let (_, root_entries) = exits.iter().find(|(path, _)| path == &root).unwrap();
        let sub_entry = root_entries
            .iter()
            .find(|(name, _)| name == "sub")
            .unwrap();
        assert_eq!(sub_entry.1, None);
        drop(exits);

        assert_clean(&state);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unreadable_directory_routes_through_error_handler() {
        let root = scratch_dir("unreadable");
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(root.join("ok"), "abc").unwrap();

        // The probe removes `sub` inside enter_dir, so the subsequent
        // directory read fails deterministically whoever runs it.
        let probe = Probe {
            sabotage: Some(sub.clone()),
            ..Probe::new()
        };
        let state = Arc::clone(&probe.state);
        let total = walk(&root, probe, 2);
        assert_eq!(total, Some(3 + ERROR_MARKER));

        let log = state.log.lock();
        let error_at = position(&log, Event::Error, &sub);
        assert!(error_at > position(&log, Event::Enter, &sub));
        assert!(
            !log.iter()
                .any(|(event, path)| *event == Event::Exit && path == &sub)
        );
        drop(log);

        let exits = state.exits.lock();
        let (_, root_entries) = exits.iter().find(|(path, _)| path == &root).unwrap();
        let sub_entry = root_entries
            .iter()
            .find(|(name, _)| name == "sub")
            .unwrap();
        assert_eq!(sub_entry.1, Some(ERROR_MARKER));
        drop(exits);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn root_that_is_a_file_gets_one_inline_visit() {
        let root = scratch_dir("fileroot");
        let file = root.join("lonely");
        fs::write(&file, "12345").unwrap();

        let probe = Probe::new();
        let state = Arc::clone(&probe.state);
        let total = Walker::init(&file)
            .build()
            .unwrap()
            .traverse(probe)
            .unwrap();
        assert_eq!(total, Some(5));

        let log = state.log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], (Event::File, file.clone()));
        drop(log);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = scratch_dir("missing");
        let ghost = root.join("ghost");
        let result = Walker::init(&ghost).build().unwrap().traverse(Probe::new());
        assert!(matches!(result, Err(WalkError::Root { .. })));
        let _ = fs::remove_dir_all(&root);
    }

    /// Builds a deterministic random tree, returning the byte total.
    fn grow_tree(rng: &mut StdRng, dir: &Path, depth: u32) -> u64 {
        let mut total = 0;
        let files = rng.random_range(0..5);
        for index in 0..files {
            let size = rng.random_range(0..2048usize);
            fs::write(dir.join(format!("f{index}")), "b".repeat(size)).unwrap();
            total += size as u64;
        }
        if depth > 0 {
            let dirs = rng.random_range(0..4);
            for index in 0..dirs {
                let child = dir.join(format!("d{index}"));
                fs::create_dir(&child).unwrap();
                total += grow_tree(rng, &child, depth - 1);
            }
        }
        total
    }

    #[test]
    fn folds_are_thread_count_independent() {
        let root = scratch_dir("random");
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let expected = grow_tree(&mut rng, &root, 4);

        for threads in [1usize, 2, 4, 16] {
            for file_tasks in [false, true] {
                let probe = Probe::new();
                let state = Arc::clone(&probe.state);
                let total = Walker::init(&root)
                    .threads(NonZeroUsize::new(threads))
                    .sorted(true)
                    .file_tasks(file_tasks)
                    .build()
                    .unwrap()
                    .traverse(probe)
                    .unwrap();
                assert_eq!(total, Some(expected), "threads={threads} file_tasks={file_tasks}");

                // Every entered directory exits exactly once.
                let log = state.log.lock();
                let enters = log.iter().filter(|(event, _)| *event == Event::Enter).count();
                let exits = log.iter().filter(|(event, _)| *event == Event::Exit).count();
                assert_eq!(enters, exits);
                drop(log);
                assert_clean(&state);
            }
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn tiny_queue_bound_still_completes() {
        let root = scratch_dir("saturated");
        let mut rng = StdRng::seed_from_u64(0xcafe);
        let expected = grow_tree(&mut rng, &root, 3);

        for file_tasks in [false, true] {
            let probe = Probe::new();
            let total = Walker::init(&root)
                .threads(NonZeroUsize::new(2))
                .queue_limit(NonZeroUsize::new(1))
                .sorted(true)
                .file_tasks(file_tasks)
                .build()
                .unwrap()
                .traverse(probe)
                .unwrap();
            assert_eq!(total, Some(expected), "file_tasks={file_tasks}");
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unsorted_walk_sees_the_same_children() {
        let root = scratch_dir("unsorted");
        for name in ["q", "a", "m", "z"] {
            fs::write(root.join(name), name).unwrap();
        }

        let probe = Probe::new();
        let state = Arc::clone(&probe.state);
        let total = Walker::init(&root)
            .threads(NonZeroUsize::new(2))
            .sorted(false)
            .build()
            .unwrap()
            .traverse(probe)
            .unwrap();
        assert_eq!(total, Some(4));

        let exits = state.exits.lock();
        let mut names: Vec<_> = exits[0].1.iter().map(|(name, _)| name.clone()).collect();
        names.sort_unstable();
        assert_eq!(names, ["a", "m", "q", "z"]);
        drop(exits);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn sorted_single_worker_dequeues_later_siblings_first() {
        let root = scratch_dir("priority");
        for name in ["a", "b", "c", "d"] {
            fs::create_dir(root.join(name)).unwrap();
        }

        // One worker makes the heap order directly observable: all four
        // sibling enters are queued before the first is popped, and each
        // childless directory exits inline as soon as it is entered, so
        // both sequences must come out later-path-first.
        let probe = Probe::new();
        let state = Arc::clone(&probe.state);
        let total = walk(&root, probe, 1);
        assert_eq!(total, Some(0));

        let expected: Vec<PathBuf> = ["d", "c", "b", "a"]
            .iter()
            .map(|name| root.join(name))
            .collect();
        let log = state.log.lock();
        let enters: Vec<PathBuf> = log
            .iter()
            .filter(|(event, path)| *event == Event::Enter && path != &root)
            .map(|(_, path)| path.clone())
            .collect();
        let exits: Vec<PathBuf> = log
            .iter()
            .filter(|(event, path)| *event == Event::Exit && path != &root)
            .map(|(_, path)| path.clone())
            .collect();
        assert_eq!(enters, expected);
        assert_eq!(exits, expected);
        drop(log);

        assert_clean(&state);
        let _ = fs::remove_dir_all(&root);
    }
}
