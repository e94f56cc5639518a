// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use arbor_core::{ObjectId, Observer, ObserverPtr, Ref, RefCountMode, RefCounted, Referenced};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

// --- TEST OBJECTS ---

/// A scene node that records how and when it was destroyed.
struct SceneNode {
    referenced: Referenced,
    alive: AtomicBool,
    drops: Arc<AtomicUsize>,
    dropped_while_owned: Arc<AtomicBool>,
}

// SAFETY: the record is a field of `SceneNode`.
unsafe impl RefCounted for SceneNode {
    fn referenced(&self) -> &Referenced {
        &self.referenced
    }
}

impl Drop for SceneNode {
    fn drop(&mut self) {
        if self.referenced.ref_count() != 0 {
            self.dropped_while_owned.store(true, Ordering::SeqCst);
        }
        self.alive.store(false, Ordering::SeqCst);
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

struct Probe {
    drops: Arc<AtomicUsize>,
    dropped_while_owned: Arc<AtomicBool>,
}

impl Probe {
    fn new() -> Self {
        Self {
            drops: Arc::new(AtomicUsize::new(0)),
            dropped_while_owned: Arc::new(AtomicBool::new(false)),
        }
    }

    fn node(&self, mode: RefCountMode) -> Ref<SceneNode> {
        Ref::new(SceneNode {
            referenced: Referenced::with_mode(mode),
            alive: AtomicBool::new(true),
            drops: Arc::clone(&self.drops),
            dropped_while_owned: Arc::clone(&self.dropped_while_owned),
        })
    }

    fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct DeletionLog {
    seen: Mutex<Vec<ObjectId>>,
}

impl Observer for DeletionLog {
    fn object_deleted(&self, id: ObjectId) {
        self.seen.lock().unwrap().push(id);
    }
}

// --- TESTS ---

#[test]
fn test_concurrent_acquire_release_destroys_once() {
    for mode in [RefCountMode::Atomic, RefCountMode::Locked] {
        // --- 1. ARRANGE ---
        let probe = Probe::new();
        let root = probe.node(mode);

        // --- 2. ACT ---
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let owned = root.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let extra = owned.clone();
                        assert!(extra.alive.load(Ordering::SeqCst));
                    }
                })
            })
            .collect();
        drop(root);
        for worker in workers {
            worker.join().expect("worker panicked");
        }

        // --- 3. ASSERT ---
        assert_eq!(probe.drops(), 1, "object must be destroyed exactly once");
        assert!(!probe.dropped_while_owned.load(Ordering::SeqCst));
    }
}

#[test]
fn test_upgrade_never_outlives_destruction() {
    for round in 0..200 {
        let mode = if round % 2 == 0 {
            RefCountMode::Atomic
        } else {
            RefCountMode::Locked
        };
        let probe = Probe::new();
        let strong = probe.node(mode);
        let weak = Ref::downgrade(&strong);
        let start = Arc::new(Barrier::new(5));
        let lost_races = Arc::new(AtomicUsize::new(0));

        let upgraders: Vec<_> = (0..4)
            .map(|_| {
                let weak = weak.clone();
                let start = Arc::clone(&start);
                let lost_races = Arc::clone(&lost_races);
                thread::spawn(move || {
                    start.wait();
                    for _ in 0..100 {
                        match weak.upgrade() {
                            Some(node) => assert!(
                                node.alive.load(Ordering::SeqCst),
                                "upgrade returned a destroyed object"
                            ),
                            None => {
                                lost_races.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        start.wait();
        drop(strong);
        for upgrader in upgraders {
            upgrader.join().expect("upgrader panicked");
        }

        assert_eq!(probe.drops(), 1);
        assert!(weak.upgrade().is_none());
        assert!(!weak.is_valid());
        assert!(lost_races.load(Ordering::SeqCst) <= 4);
    }
}

#[test]
fn test_observers_notified_exactly_once_on_release() {
    // --- 1. ARRANGE ---
    let probe = Probe::new();
    let node = probe.node(RefCountMode::Atomic);
    let id = Ref::object_id(&node);
    let first = Arc::new(DeletionLog::default());
    let second = Arc::new(DeletionLog::default());
    let first_dyn: Arc<dyn Observer> = first.clone();
    let second_dyn: Arc<dyn Observer> = second.clone();
    assert!(Ref::add_observer(&node, &first_dyn));
    assert!(Ref::add_observer(&node, &second_dyn));
    let weak = ObserverPtr::new(&node);

    // --- 2. ACT ---
    let handle = thread::spawn(move || drop(node));
    handle.join().expect("release thread panicked");

    // --- 3. ASSERT ---
    assert_eq!(*first.seen.lock().unwrap(), vec![id]);
    assert_eq!(*second.seen.lock().unwrap(), vec![id]);
    assert!(weak.upgrade().is_none());
    assert_eq!(weak.observer_set().observer_count(), 0);
    assert_eq!(probe.drops(), 1);
}

#[test]
fn test_removed_observer_is_not_notified() {
    let probe = Probe::new();
    let node = probe.node(RefCountMode::Locked);
    let log = Arc::new(DeletionLog::default());
    let log_dyn: Arc<dyn Observer> = log.clone();

    Ref::add_observer(&node, &log_dyn);
    Ref::remove_observer(&node, &log_dyn);
    Ref::remove_observer(&node, &log_dyn);
    drop(node);

    assert!(log.seen.lock().unwrap().is_empty());
}

#[test]
fn test_weak_handle_keeps_only_the_set_alive() {
    let probe = Probe::new();
    let node = probe.node(RefCountMode::Atomic);
    let weak = Ref::downgrade(&node);
    let set = Arc::clone(weak.observer_set());

    drop(node);

    assert_eq!(probe.drops(), 1);
    assert!(set.is_detached());
    assert_eq!(set.observed_id(), None);
}

#[test]
fn test_concurrent_set_creation_yields_one_set() {
    let probe = Probe::new();
    let node = probe.node(RefCountMode::Locked);
    let start = Arc::new(Barrier::new(8));

    let creators: Vec<_> = (0..8)
        .map(|_| {
            let node = node.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                node.referenced().get_or_create_observer_set()
            })
        })
        .collect();
    let sets: Vec<_> = creators
        .into_iter()
        .map(|handle| handle.join().expect("creator panicked"))
        .collect();

    assert!(sets.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_strong_handle_destroyed_on_upgrading_thread() {
    let probe = Probe::new();
    let node = probe.node(RefCountMode::Atomic);
    let weak = Ref::downgrade(&node);

    let upgraded = weak.upgrade().expect("object is alive");
    drop(node);
    assert_eq!(probe.drops(), 0, "the upgraded handle keeps the object alive");

    thread::spawn(move || drop(upgraded))
        .join()
        .expect("release thread panicked");
    assert_eq!(probe.drops(), 1);
}
