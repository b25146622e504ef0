use isoctx::alloc::{ManagedAlloc, ManagedHeap};
use isoctx::{ContextRegistry, IsoContext, NoReports, Task};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const TASKS_PER_THREAD: usize = 50;

#[test]
fn test_recording_from_many_threads() {
    let registry = ContextRegistry::new();
    let child = IsoContext::root().new_child();
    let runs = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        for _ in 0..THREADS {
            let (registry, child, runs) = (&registry, &child, runs.clone());
            s.spawn(move || {
                for _ in 0..TASKS_PER_THREAD {
                    let r = runs.clone();
                    child.run(registry, move || {
                        r.fetch_add(1, Ordering::SeqCst);
                    });
                }
                // Threads never see each other's establishment.
                assert!(!Task::is_established());
            });
        }
    });

    let total = THREADS * TASKS_PER_THREAD;
    assert_eq!(runs.load(Ordering::SeqCst), total);

    let tasks: HashSet<Task> = child.started_tasks().into_iter().collect();
    assert_eq!(tasks.len(), total);
    assert_eq!(registry.lookup(child.id()).map(|r| r.len()), Some(total));

    let summary = registry.resolve(&child.publish(), &NoReports).unwrap();
    assert_eq!(summary.tasks_replayed, total);
    assert_eq!(runs.load(Ordering::SeqCst), total * 2);
}

#[test]
fn test_resolving_independent_contexts_in_parallel() {
    let registry = ContextRegistry::new();
    let root = IsoContext::root();
    let children: Vec<IsoContext> = (0..THREADS).map(|_| root.new_child()).collect();
    let logs: Vec<Arc<Mutex<Vec<Task>>>> = (0..THREADS).map(|_| Arc::default()).collect();

    for (child, log) in children.iter().zip(&logs) {
        for _ in 0..TASKS_PER_THREAD {
            let log = log.clone();
            child.run(&registry, move || log.lock().push(Task::current()));
        }
        log.lock().clear();
    }

    thread::scope(|s| {
        for child in &children {
            let registry = &registry;
            s.spawn(move || {
                let summary = registry.resolve(&child.publish(), &NoReports).unwrap();
                assert_eq!(summary.tasks_replayed, TASKS_PER_THREAD);
            });
        }
    });

    for (child, log) in children.iter().zip(&logs) {
        assert_eq!(*log.lock(), child.started_tasks());
    }
}

#[test]
fn test_hook_registration_races_with_lookup() {
    let registry = ContextRegistry::new();
    let child = IsoContext::root().new_child();
    let task = child.run(&registry, || {});
    let calls = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        for _ in 0..THREADS {
            let (registry, calls) = (&registry, calls.clone());
            s.spawn(move || {
                for _ in 0..TASKS_PER_THREAD {
                    let c = calls.clone();
                    assert!(registry.on_prepare_for_redo(task, move |_| {
                        c.fetch_add(1, Ordering::SeqCst);
                        true
                    }));
                    assert!(registry.lookup_info(&task).is_some());
                }
            });
        }
    });

    registry.resolve(&child.publish(), &NoReports).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), THREADS * TASKS_PER_THREAD);
}

#[test]
fn test_shared_handles_across_threads() {
    let heap = ManagedHeap::new();
    let array = heap.alloc_array(vec![0u64; THREADS]).unwrap();

    thread::scope(|s| {
        for i in 0..THREADS {
            let array = array.clone();
            s.spawn(move || {
                array.set(i, i as u64 + 1).unwrap();
            });
        }
    });

    assert_eq!(array.iter().sum::<u64>(), (1..=THREADS as u64).sum::<u64>());
    assert_eq!(array.strong_count(), 1);
    assert_eq!(heap.stats().arrays, 1);
}
