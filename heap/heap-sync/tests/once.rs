use heap_sync::SyncOnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn empty_until_initialized() {
    let cell = SyncOnceCell::new();
    assert_eq!(cell.get(), None::<&u32>);
    assert_eq!(*cell.get_or_init(|| 5), 5);
    assert_eq!(cell.get(), Some(&5));
}

#[test]
fn later_initializers_are_ignored() {
    let cell = SyncOnceCell::new();
    assert_eq!(*cell.get_or_init(|| 1), 1);
    assert_eq!(*cell.get_or_init(|| 2), 1);
}

#[test]
fn racing_initializers_run_exactly_once() {
    let threads = 8;
    let cell = Arc::new(SyncOnceCell::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for tid in 0..threads {
        let cell = Arc::clone(&cell);
        let runs = Arc::clone(&runs);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            *cell.get_or_init(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                tid
            })
        }));
    }

    let winner = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    // One initializer ran, and every thread saw its value.
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(winner.iter().all(|&v| v == winner[0]));
    assert_eq!(cell.get(), Some(&winner[0]));
}

#[test]
fn static_cell_usable_across_threads() {
    static CELL: SyncOnceCell<String> = SyncOnceCell::new();

    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| CELL.get_or_init(|| "shared".to_owned()).len()))
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), 6);
    }
}
