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
use std::ptr::NonNull;
use std::sync::Arc;

use super::ObserverSet;
use crate::lifetime::{ObjectId, Ref, RefCounted};
use crate::stats::{self, UPGRADE_ATTEMPTS, UPGRADE_FAILURES};

/// A weak handle to a counted object.
///
/// Holding an `ObserverPtr` keeps the object's [`ObserverSet`] alive but
/// not the object itself. [`upgrade`](ObserverPtr::upgrade) returns a
/// strong [`Ref`] while the object lives and `None` from the moment its
/// destruction begins.
pub struct ObserverPtr<T: RefCounted> {
    set: Arc<ObserverSet>,
    ptr: NonNull<T>,
    id: ObjectId,
}

// SAFETY: the pointer is only dereferenced under the observer set's lock
// while the object is alive, and `T` is `Send + Sync`.
unsafe impl<T: RefCounted> Send for ObserverPtr<T> {}
unsafe impl<T: RefCounted> Sync for ObserverPtr<T> {}

impl<T: RefCounted> ObserverPtr<T> {
    /// Creates a weak handle to the object behind `target`.
    pub fn new(target: &Ref<T>) -> Self {
        let referenced = target.referenced();
        Self {
            set: referenced.get_or_create_observer_set(),
            ptr: NonNull::from(&**target),
            id: referenced.id(),
        }
    }

    /// Returns a strong handle if the object is still alive.
    pub fn upgrade(&self) -> Option<Ref<T>> {
        stats::record(&UPGRADE_ATTEMPTS);
        // SAFETY: `ptr` was taken from a `Ref` observed by `set`.
        let upgraded = unsafe { self.set.upgrade(self.ptr) };
        if upgraded.is_none() {
            stats::record(&UPGRADE_FAILURES);
        }
        upgraded
    }

    /// Returns `true` while the object has not started its destruction.
    pub fn is_valid(&self) -> bool {
        !self.set.is_detached()
    }

    /// The identity of the observed object.
    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    /// The observer set shared with the object.
    pub fn observer_set(&self) -> &Arc<ObserverSet> {
        &self.set
    }

    /// Returns `true` if this handle observes the object behind `target`.
    pub fn points_to(&self, target: &Ref<T>) -> bool {
        std::ptr::eq(self.ptr.as_ptr(), Ref::as_ptr(target))
    }
}

impl<T: RefCounted> Clone for ObserverPtr<T> {
    fn clone(&self) -> Self {
        Self {
            set: Arc::clone(&self.set),
            ptr: self.ptr,
            id: self.id,
        }
    }
}

impl<T: RefCounted> fmt::Debug for ObserverPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverPtr")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}
