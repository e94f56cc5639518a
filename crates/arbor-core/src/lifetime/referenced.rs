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

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::mode::{default_ref_count_mode, RefCountMode};
use crate::observer::ObserverSet;
use crate::stats::{self, LIFECYCLE_VIOLATIONS, OBJECTS_CREATED, OBJECTS_DESTROYED};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identity for a counted object.
///
/// Assigned when the object's [`Referenced`] record is built and stable for
/// the object's whole life, including across moves. Observers receive it
/// when the object is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Implemented by every object that can be shared through a [`Ref`](super::Ref).
///
/// ```rust
/// use arbor_core::{Ref, RefCounted, Referenced};
///
/// struct Geode {
///     referenced: Referenced,
///     name: String,
/// }
///
/// // SAFETY: `referenced` returns the record stored inline in `Geode`.
/// unsafe impl RefCounted for Geode {
///     fn referenced(&self) -> &Referenced {
///         &self.referenced
///     }
/// }
///
/// let geode = Ref::new(Geode { referenced: Referenced::new(), name: "root".into() });
/// let shared = geode.clone();
/// assert_eq!(Ref::ref_count(&shared), 2);
/// assert_eq!(shared.name, "root");
/// ```
///
/// Counts can only move through [`Ref`](super::Ref) handles:
///
/// ```compile_fail
/// use arbor_core::Referenced;
///
/// let referenced = Referenced::new();
/// referenced.acquire();
/// referenced.release_no_destroy();
/// ```
///
/// # Safety
///
/// `referenced` must always return the same record, stored inside `self`
/// and owned by no other object. Handles free the object when that record's
/// count reaches zero.
pub unsafe trait RefCounted: Send + Sync + 'static {
    /// The object's embedded counting record.
    fn referenced(&self) -> &Referenced;
}

/// The counting record embedded in every shared object.
///
/// Holds the owner count, the counting mode, and a lazily created handle to
/// the object's [`ObserverSet`].
pub struct Referenced {
    id: ObjectId,
    count: AtomicI32,
    locked: AtomicBool,
    // Per-object lock: guards observer-set creation and, in locked mode,
    // every count transition.
    observers: Mutex<Option<Arc<ObserverSet>>>,
}

impl Referenced {
    /// Creates a record with a count of zero, using the process-wide
    /// default counting mode.
    pub fn new() -> Self {
        Self::with_mode(default_ref_count_mode())
    }

    /// Creates a record with a count of zero and an explicit counting mode.
    pub fn with_mode(mode: RefCountMode) -> Self {
        stats::record(&OBJECTS_CREATED);
        Self {
            id: ObjectId::next(),
            count: AtomicI32::new(0),
            locked: AtomicBool::new(mode == RefCountMode::Locked),
            observers: Mutex::new(None),
        }
    }

    /// The object's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The current counting mode.
    pub fn mode(&self) -> RefCountMode {
        if self.locked.load(Ordering::Relaxed) {
            RefCountMode::Locked
        } else {
            RefCountMode::Atomic
        }
    }

    /// Switches the counting mode. The counter itself is always atomic, so
    /// switching while other threads count keeps every transition exact.
    pub fn set_mode(&self, mode: RefCountMode) {
        self.locked
            .store(mode == RefCountMode::Locked, Ordering::Relaxed);
    }

    /// The current number of owners.
    pub fn ref_count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// Adds an owner and returns the new count.
    ///
    /// A `0 -> 1` transition is legal; the weak-upgrade path relies on it to
    /// detect an object whose destruction has already begun.
    pub(crate) fn acquire(&self) -> i32 {
        if self.locked.load(Ordering::Relaxed) {
            let _guard = self.observers.lock();
            self.count.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.count.fetch_add(1, Ordering::AcqRel) + 1
        }
    }

    /// Removes an owner without ever destroying the object, returning the
    /// new count.
    pub(crate) fn release_no_destroy(&self) -> i32 {
        self.decrement().unwrap_or(0)
    }

    /// Removes an owner. Returns `None` when the count was already zero, in
    /// which case nothing changes and the misuse is logged.
    pub(crate) fn decrement(&self) -> Option<i32> {
        let result = if self.locked.load(Ordering::Relaxed) {
            let _guard = self.observers.lock();
            self.try_decrement()
        } else {
            self.try_decrement()
        };

        match result {
            Ok(previous) => Some(previous - 1),
            Err(_) => {
                stats::record(&LIFECYCLE_VIOLATIONS);
                log::error!(
                    "Object {} released more times than it was acquired; ignoring the release",
                    self.id
                );
                None
            }
        }
    }

    fn try_decrement(&self) -> Result<i32, i32> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count > 0).then(|| count - 1)
            })
    }

    /// The object's observer set, if one has been created.
    pub fn observer_set(&self) -> Option<Arc<ObserverSet>> {
        self.observers.lock().clone()
    }

    /// Returns the object's observer set, creating it on first use.
    ///
    /// Creation happens under the object's lock, so concurrent callers
    /// always share a single set.
    pub fn get_or_create_observer_set(&self) -> Arc<ObserverSet> {
        let mut observers = self.observers.lock();
        Arc::clone(observers.get_or_insert_with(|| {
            log::trace!("Creating observer set for object {}", self.id);
            Arc::new(ObserverSet::new(self.id))
        }))
    }

    /// Takes the observer set off an object whose count reached zero and
    /// signals it.
    pub(crate) fn signal_observers(&self) {
        let set = self.observers.lock().take();
        if let Some(set) = set {
            set.signal_and_detach();
        }
    }
}

impl Default for Referenced {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning an object yields a new object: the clone starts unowned, with
/// its own identity and no observers.
impl Clone for Referenced {
    fn clone(&self) -> Self {
        Self::with_mode(self.mode())
    }
}

impl fmt::Debug for Referenced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Referenced")
            .field("id", &self.id)
            .field("count", &self.ref_count())
            .field("mode", &self.mode())
            .finish()
    }
}

impl Drop for Referenced {
    fn drop(&mut self) {
        let count = *self.count.get_mut();
        if count > 0 {
            stats::record(&LIFECYCLE_VIOLATIONS);
            log::error!(
                "Object {} destroyed while still holding {count} reference(s); a strong handle now dangles",
                self.id
            );
        }

        // Objects dropped without going through a `Ref` still owe their
        // observers a notification.
        if let Some(set) = self.observers.get_mut().take() {
            set.signal_and_detach();
        }

        stats::record(&OBJECTS_DESTROYED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Observer;
    use crate::stats::lifetime_stats;
    use std::sync::atomic::AtomicUsize;

    struct CountingObserver {
        calls: AtomicUsize,
    }

    impl Observer for CountingObserver {
        fn object_deleted(&self, _id: ObjectId) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_record_starts_at_zero() {
        let referenced = Referenced::with_mode(RefCountMode::Atomic);
        assert_eq!(referenced.ref_count(), 0);
        assert!(referenced.observer_set().is_none());
    }

    #[test]
    fn ids_are_unique() {
        let a = Referenced::new();
        let b = Referenced::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn acquire_and_release_in_both_modes() {
        for mode in [RefCountMode::Atomic, RefCountMode::Locked] {
            let referenced = Referenced::with_mode(mode);
            assert_eq!(referenced.acquire(), 1);
            assert_eq!(referenced.acquire(), 2);
            assert_eq!(referenced.release_no_destroy(), 1);
            assert_eq!(referenced.release_no_destroy(), 0);
        }
    }

    #[test]
    fn release_below_zero_is_refused() {
        let before = lifetime_stats().lifecycle_violations;

        let referenced = Referenced::new();
        assert_eq!(referenced.decrement(), None);
        assert_eq!(referenced.ref_count(), 0);
        assert!(lifetime_stats().lifecycle_violations > before);
    }

    #[test]
    fn destroying_an_owned_record_is_reported_and_proceeds() {
        // --- 1. ARRANGE ---
        let observer = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn Observer> = observer.clone();
        let referenced = Referenced::new();
        referenced.acquire();
        let set = referenced.get_or_create_observer_set();
        set.add_observer(&as_dyn);
        let before = lifetime_stats();

        // --- 2. ACT ---
        drop(referenced);

        // --- 3. ASSERT ---
        let after = lifetime_stats();
        assert!(after.lifecycle_violations > before.lifecycle_violations);
        assert!(after.objects_destroyed > before.objects_destroyed);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert!(set.is_detached());
    }

    #[test]
    fn mode_can_change_while_owned() {
        let referenced = Referenced::with_mode(RefCountMode::Atomic);
        referenced.acquire();
        referenced.set_mode(RefCountMode::Locked);
        assert_eq!(referenced.mode(), RefCountMode::Locked);
        assert_eq!(referenced.release_no_destroy(), 0);
    }

    #[test]
    fn observer_set_is_created_once() {
        let referenced = Referenced::new();
        let first = referenced.get_or_create_observer_set();
        let second = referenced.get_or_create_observer_set();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn clone_is_a_fresh_object() {
        let original = Referenced::with_mode(RefCountMode::Locked);
        original.acquire();
        original.get_or_create_observer_set();

        let copy = original.clone();
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.ref_count(), 0);
        assert_eq!(copy.mode(), RefCountMode::Locked);
        assert!(copy.observer_set().is_none());

        original.release_no_destroy();
    }

    #[test]
    fn dropping_record_signals_observers() {
        let observer = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn Observer> = observer.clone();

        let referenced = Referenced::new();
        let set = referenced.get_or_create_observer_set();
        set.add_observer(&as_dyn);
        drop(referenced);

        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert!(set.is_detached());
    }
}
