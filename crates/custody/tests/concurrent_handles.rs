//! Cross-thread tests: each thread owns its own handles on a shared block.

use custody::{ExclusiveOwner, SharedOwner, WeakObserver};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 200;

struct Tracked {
    id: usize,
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(id: usize, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            id,
            drops: Arc::clone(drops),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn concurrent_clones_keep_count_consistent() {
    let drops = Arc::new(AtomicUsize::new(0));
    let owner = SharedOwner::make(Tracked::new(7, &drops));

    thread::scope(|s| {
        for _ in 0..THREADS {
            let local = owner.clone();
            s.spawn(move || {
                for _ in 0..1_000 {
                    let copy = local.clone();
                    assert_eq!(copy.get().map(|t| t.id), Ok(7));
                    assert!(copy.use_count() >= 2);
                }
            });
        }
    });

    assert_eq!(owner.use_count(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(owner);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn last_owner_on_any_thread_drops_once() {
    for round in 0..ROUNDS {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = SharedOwner::make(Tracked::new(round, &drops));
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let local = owner.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    drop(local);
                });
            }
            drop(owner);
        });

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn lock_never_resurrects_a_dropped_value() {
    for round in 0..ROUNDS {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = SharedOwner::make(Tracked::new(round, &drops));
        let observers: Vec<WeakObserver<Tracked>> =
            (0..THREADS).map(|_| owner.downgrade()).collect();
        let barrier = Barrier::new(THREADS + 1);

        thread::scope(|s| {
            for observer in observers {
                let barrier = &barrier;
                let drops = &drops;
                s.spawn(move || {
                    barrier.wait();
                    let mut expired = false;
                    for _ in 0..100 {
                        match observer.lock() {
                            Some(locked) => {
                                assert!(!expired, "lock succeeded after expiry");
                                assert_eq!(drops.load(Ordering::SeqCst), 0);
                                assert_eq!(locked.get().map(|t| t.id), Ok(round));
                            }
                            None => expired = true,
                        }
                    }
                });
            }
            barrier.wait();
            drop(owner);
        });

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn observers_and_owners_released_concurrently() {
    for round in 0..ROUNDS {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = SharedOwner::make(Tracked::new(round, &drops));
        let barrier = Barrier::new(THREADS * 2);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let strong = owner.clone();
                let weak = owner.downgrade();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    drop(strong);
                });
                s.spawn(move || {
                    barrier.wait();
                    drop(weak.clone());
                    drop(weak);
                });
            }
            drop(owner);
        });

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn uniqueness_check_races_with_downgrade() {
    for _ in 0..ROUNDS {
        let mut owner = SharedOwner::make(0usize);
        let other = owner.clone();
        let other_released = AtomicBool::new(false);
        let barrier = Barrier::new(2);
        let mut writes = 0usize;

        thread::scope(|s| {
            let other_released = &other_released;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    let clone = other.clone();
                    let observer = clone.downgrade();
                    drop(clone);
                    assert!(observer.lock().is_some());
                    drop(observer);
                }
                // Set before the last strong release so a unique owner
                // always sees it.
                other_released.store(true, Ordering::SeqCst);
                drop(other);
            });

            barrier.wait();
            for _ in 0..200 {
                if let Some(value) = owner.try_get_mut() {
                    assert!(
                        other_released.load(Ordering::SeqCst),
                        "mutable access while another owner or observer exists"
                    );
                    *value += 1;
                    writes += 1;
                }
            }
        });

        assert_eq!(owner.use_count(), 1);
        assert_eq!(owner.weak_count(), 0);
        assert!(owner.try_get_mut().is_some());
        assert_eq!(owner.get().copied(), Ok(writes));

        let before = owner.as_ptr();
        *owner.make_mut().unwrap() += 1;
        assert_eq!(owner.as_ptr(), before);
        assert_eq!(owner.get().copied(), Ok(writes + 1));
    }
}

#[test]
fn make_mut_detaches_from_concurrent_observers() {
    let mut owner = SharedOwner::make(vec![0usize; 4]);
    let observer = owner.downgrade();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let barrier = &barrier;
        s.spawn(move || {
            barrier.wait();
            for _ in 0..1_000 {
                if let Some(locked) = observer.lock() {
                    assert_eq!(locked.get().map(Vec::len), Ok(4));
                    drop(locked.downgrade());
                }
            }
        });

        barrier.wait();
        let before = owner.as_ptr();
        owner.make_mut().unwrap()[0] = 1;
        assert_ne!(owner.as_ptr(), before);
    });

    assert_eq!(owner.use_count(), 1);
    assert_eq!(owner.weak_count(), 0);
    assert_eq!(owner.get().map(|v| v[0]), Ok(1));
}

#[test]
fn pointee_mutation_uses_its_own_lock() {
    let counter = SharedOwner::make(Mutex::new(0usize));

    thread::scope(|s| {
        for _ in 0..THREADS {
            let local = counter.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    if let Ok(mutex) = local.get() {
                        *mutex.lock().unwrap() += 1;
                    }
                }
            });
        }
    });

    let total = counter.get().map(|mutex| *mutex.lock().unwrap());
    assert_eq!(total, Ok(THREADS * 100));
}

#[test]
fn exclusive_owner_moves_across_threads() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut owner = ExclusiveOwner::make(Tracked::new(3, &drops));
    let moved = owner.take();

    let handle = thread::spawn(move || moved.get().map(|t| t.id));

    assert_eq!(handle.join().unwrap(), Ok(3));
    assert!(owner.is_empty());
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
