// Lock serialization and re-entrancy across real threads.
use stanchion::core::lock::Lock;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// Deliberately unsynchronized; the lock is the only thing keeping the
// increments exact.
struct RacyCounter(UnsafeCell<u64>);

unsafe impl Sync for RacyCounter {}

#[test]
fn contended_increments_are_exact() {
    const THREADS: usize = 8;
    const INCREMENTS: u64 = 10_000;

    let lock = Arc::new(Lock::new().expect("lock"));
    let counter = Arc::new(RacyCounter(UnsafeCell::new(0)));

    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let lock = lock.clone();
        let counter = counter.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..INCREMENTS {
                let _guard = lock.acquire();
                unsafe {
                    *counter.0.get() += 1;
                }
            }
        }));
    }
    for worker in workers {
        worker.join().expect("join");
    }

    let total = unsafe { *counter.0.get() };
    assert_eq!(total, THREADS as u64 * INCREMENTS);
}

#[test]
fn second_acquire_waits_for_release() {
    let lock = Arc::new(Lock::new().expect("lock"));
    let entered = Arc::new(AtomicBool::new(false));

    let guard = lock.acquire();
    let waiter = {
        let lock = lock.clone();
        let entered = entered.clone();
        thread::spawn(move || {
            let _guard = lock.acquire();
            entered.store(true, Ordering::SeqCst);
        })
    };

    // The waiter must stay blocked while the guard is held.
    thread::sleep(Duration::from_millis(100));
    assert!(!entered.load(Ordering::SeqCst));

    drop(guard);
    waiter.join().expect("join");
    assert!(entered.load(Ordering::SeqCst));
}

#[test]
fn reentrant_acquire_releases_cleanly() {
    let lock = Arc::new(Lock::new().expect("lock"));

    let outer = lock.acquire();
    let inner = lock.acquire();
    drop(inner);
    drop(outer);

    // Both releases happened; another thread can take the lock.
    let other = {
        let lock = lock.clone();
        thread::spawn(move || {
            let _guard = lock.acquire();
        })
    };
    other.join().expect("join");
}

#[test]
fn guard_releases_on_early_return() {
    fn bail_early(lock: &Lock, bail: bool) -> u32 {
        let _guard = lock.acquire();
        if bail {
            return 1;
        }
        2
    }

    let lock = Lock::new().expect("lock");
    assert_eq!(bail_early(&lock, true), 1);
    assert_eq!(bail_early(&lock, false), 2);
    drop(lock.acquire());
}
