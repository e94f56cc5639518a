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
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use super::referenced::{ObjectId, RefCounted};
use crate::delete;
use crate::observer::{Observer, ObserverPtr};
use crate::stats::{self, DELETES_DEFERRED};

/// A strong, counted handle to a heap-allocated [`RefCounted`] object.
///
/// Cloning acquires a count on the object; dropping releases one. The
/// release that takes the count to zero signals the object's observers and
/// then frees it, or hands it to the installed
/// [`DeleteHandler`](crate::delete::DeleteHandler).
pub struct Ref<T: RefCounted> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: `RefCounted` requires `Send + Sync`, and every count transition is
// atomic, so handles may move and be shared across threads.
unsafe impl<T: RefCounted> Send for Ref<T> {}
unsafe impl<T: RefCounted> Sync for Ref<T> {}

impl<T: RefCounted> Ref<T> {
    /// Moves `value` to the heap and returns the first owning handle.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: `ptr` was just leaked from a live box.
        unsafe { ptr.as_ref() }.referenced().acquire();
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Adopts a pointer that already carries one count.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Ref::into_raw`] (or otherwise point to a
    /// `Ref`-allocated object) and the caller must transfer ownership of one
    /// count to the returned handle.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Gives up the handle without releasing its count.
    pub fn into_raw(this: Self) -> NonNull<T> {
        let ptr = this.ptr;
        mem::forget(this);
        ptr
    }

    /// Releases this handle's count and returns the new count. Returns `0`
    /// when the object was destroyed (or handed to the delete handler).
    pub fn release(this: Self) -> i32 {
        let ptr = Self::into_raw(this);
        // SAFETY: the count owned by `this` is transferred to `release_raw`.
        unsafe { release_raw(ptr) }
    }

    /// The current number of owners.
    pub fn ref_count(this: &Self) -> i32 {
        this.referenced().ref_count()
    }

    /// The object's identity.
    pub fn object_id(this: &Self) -> ObjectId {
        this.referenced().id()
    }

    /// Returns `true` if both handles point to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// The raw address of the object.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// Creates a weak handle that does not keep the object alive.
    pub fn downgrade(this: &Self) -> ObserverPtr<T> {
        ObserverPtr::new(this)
    }

    /// Registers `observer` to be told when the object is destroyed.
    pub fn add_observer(this: &Self, observer: &Arc<dyn Observer>) -> bool {
        this.referenced()
            .get_or_create_observer_set()
            .add_observer(observer)
    }

    /// Unregisters `observer`; a no-op if it was never registered.
    pub fn remove_observer(this: &Self, observer: &Arc<dyn Observer>) {
        if let Some(set) = this.referenced().observer_set() {
            set.remove_observer(observer);
        }
    }
}

/// Releases one count on `ptr`, running the destruction protocol when the
/// count reaches zero.
///
/// # Safety
///
/// The caller must own one count on a `Ref`-allocated object.
unsafe fn release_raw<T: RefCounted>(ptr: NonNull<T>) -> i32 {
    match ptr.as_ref().referenced().decrement() {
        Some(0) => {
            destroy(ptr);
            0
        }
        Some(count) => count,
        None => 0,
    }
}

/// # Safety
///
/// The count of the object behind `ptr` must have just reached zero on this
/// thread.
unsafe fn destroy<T: RefCounted>(ptr: NonNull<T>) {
    // Observers are told first, while the object is still intact. A weak
    // upgrade racing with us sees the 0 -> 1 transition and backs off.
    ptr.as_ref().referenced().signal_observers();

    let object: Box<T> = Box::from_raw(ptr.as_ptr());
    match delete::delete_handler() {
        Some(handler) => {
            stats::record(&DELETES_DEFERRED);
            log::trace!(
                "Handing object {} to the delete handler",
                object.referenced().id()
            );
            handler.request_delete(object);
        }
        None => drop(object),
    }
}

impl<T: RefCounted> Clone for Ref<T> {
    fn clone(&self) -> Self {
        self.referenced().acquire();
        Self {
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for Ref<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one count.
        unsafe {
            release_raw(self.ptr);
        }
    }
}

impl<T: RefCounted> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the object lives at least as long as this handle's count.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: RefCounted> AsRef<T> for Ref<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: RefCounted + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &Ref::object_id(self))
            .field("count", &Ref::ref_count(self))
            .field("value", &**self)
            .finish()
    }
}
