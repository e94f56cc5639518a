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
use std::mem;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Observer;
use crate::lifetime::{ObjectId, Ref, RefCounted};

struct SetState {
    // Cleared when the observed object starts its destruction.
    target: Option<ObjectId>,
    observers: Vec<Weak<dyn Observer>>,
}

/// The side record tracking the weak observers of one counted object.
///
/// Shared between the observed object and every weak handle. Its lock
/// serialises weak upgrades against the destruction signal, which is what
/// makes upgrading race-free.
pub struct ObserverSet {
    state: Mutex<SetState>,
}

impl ObserverSet {
    pub(crate) fn new(target: ObjectId) -> Self {
        Self {
            state: Mutex::new(SetState {
                target: Some(target),
                observers: Vec::new(),
            }),
        }
    }

    /// The observed object's identity, or `None` once it has been destroyed.
    pub fn observed_id(&self) -> Option<ObjectId> {
        self.state.lock().target
    }

    /// Returns `true` once the observed object has been destroyed.
    pub fn is_detached(&self) -> bool {
        self.state.lock().target.is_none()
    }

    /// Number of live registered observers.
    pub fn observer_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .iter()
            .filter(|observer| observer.strong_count() > 0)
            .count()
    }

    /// Registers `observer`. Registering the same observer twice is a no-op.
    /// Returns `false` if the observed object is already gone, in which case
    /// nothing is registered.
    pub fn add_observer(&self, observer: &Arc<dyn Observer>) -> bool {
        let mut state = self.state.lock();
        if state.target.is_none() {
            return false;
        }

        state.observers.retain(|entry| entry.strong_count() > 0);
        let candidate = Arc::as_ptr(observer);
        if !state
            .observers
            .iter()
            .any(|entry| std::ptr::addr_eq(entry.as_ptr(), candidate))
        {
            state.observers.push(Arc::downgrade(observer));
        }
        true
    }

    /// Unregisters `observer`. Removing an absent observer is a no-op.
    pub fn remove_observer(&self, observer: &Arc<dyn Observer>) {
        let candidate = Arc::as_ptr(observer);
        self.state.lock().observers.retain(|entry| {
            entry.strong_count() > 0 && !std::ptr::addr_eq(entry.as_ptr(), candidate)
        });
    }

    /// Tries to take a strong count on the observed object.
    ///
    /// Holding the set's lock across both the acquire and the check is what
    /// closes the race with destruction: if the acquire moved the count from
    /// zero to one, the object's last owner has already let go and is waiting
    /// on this lock to signal the set, so the count is handed back and no
    /// handle is produced.
    ///
    /// # Safety
    ///
    /// `ptr` must point to the `Ref`-allocated object this set observes.
    pub(crate) unsafe fn upgrade<T: RefCounted>(&self, ptr: NonNull<T>) -> Option<Ref<T>> {
        let state = self.state.lock();
        state.target?;

        // The object cannot be freed while `target` is set and we hold the lock.
        let referenced = ptr.as_ref().referenced();
        if referenced.acquire() == 1 {
            referenced.release_no_destroy();
            log::trace!(
                "Weak upgrade of object {} lost the race with its destruction",
                referenced.id()
            );
            return None;
        }

        Some(Ref::from_raw(ptr))
    }

    /// Notifies every registered observer that the object is gone, forgets
    /// them, and detaches the set from the object. Later upgrades return
    /// `None`. Calling it again is a no-op.
    pub fn signal_and_detach(&self) {
        let notified = {
            let mut state = self.state.lock();
            let Some(id) = state.target.take() else {
                return;
            };

            let notified: Vec<Arc<dyn Observer>> = mem::take(&mut state.observers)
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            for observer in &notified {
                observer.object_deleted(id);
            }
            log::trace!(
                "Object {id} destroyed, notified {} observer(s)",
                notified.len()
            );
            notified
        };
        // Observers whose last owner went away meanwhile are dropped here,
        // outside the lock.
        drop(notified);
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ObserverSet")
            .field("target", &state.target)
            .field("observers", &state.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::Referenced;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        last: Mutex<Option<ObjectId>>,
    }

    impl Observer for Recorder {
        fn object_deleted(&self, id: ObjectId) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some(id);
        }
    }

    fn set_with_target() -> (Referenced, Arc<ObserverSet>) {
        let referenced = Referenced::new();
        let set = referenced.get_or_create_observer_set();
        (referenced, set)
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let (_referenced, set) = set_with_target();
        let recorder: Arc<dyn Observer> = Arc::new(Recorder::default());
        assert!(set.add_observer(&recorder));
        assert!(set.add_observer(&recorder));
        assert_eq!(set.observer_count(), 1);
    }

    #[test]
    fn removing_absent_observer_is_noop() {
        let (_referenced, set) = set_with_target();
        let registered: Arc<dyn Observer> = Arc::new(Recorder::default());
        let stranger: Arc<dyn Observer> = Arc::new(Recorder::default());
        set.add_observer(&registered);
        set.remove_observer(&stranger);
        assert_eq!(set.observer_count(), 1);
        set.remove_observer(&registered);
        set.remove_observer(&registered);
        assert_eq!(set.observer_count(), 0);
    }

    #[test]
    fn signal_notifies_each_observer_once() {
        let (referenced, set) = set_with_target();
        let id = referenced.id();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let first_dyn: Arc<dyn Observer> = first.clone();
        let second_dyn: Arc<dyn Observer> = second.clone();
        set.add_observer(&first_dyn);
        set.add_observer(&second_dyn);

        set.signal_and_detach();
        set.signal_and_detach();

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first.last.lock(), Some(id));
        assert!(set.is_detached());
        assert_eq!(set.observer_count(), 0);
    }

    #[test]
    fn dropped_observers_are_skipped() {
        let (_referenced, set) = set_with_target();
        let recorder: Arc<dyn Observer> = Arc::new(Recorder::default());
        set.add_observer(&recorder);
        drop(recorder);
        assert_eq!(set.observer_count(), 0);
        set.signal_and_detach();
    }

    #[test]
    fn registration_after_detach_is_refused() {
        let (_referenced, set) = set_with_target();
        set.signal_and_detach();
        let recorder: Arc<dyn Observer> = Arc::new(Recorder::default());
        assert!(!set.add_observer(&recorder));
        assert_eq!(set.observed_id(), None);
    }
}
