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

//! Destruction observers and weak handles.
//!
//! An object's [`ObserverSet`] is created lazily the first time anything
//! wants to watch it. The set outlives the object if observers still hold
//! it, and once the object is destroyed every weak upgrade through the set
//! returns `None`.

mod ptr;
mod set;

pub use self::ptr::ObserverPtr;
pub use self::set::ObserverSet;

use crate::lifetime::ObjectId;

/// Notified when an observed object is destroyed.
///
/// Observers do not keep the observed object alive, and the observer set
/// only holds them weakly. The callback runs while the set is locked: it
/// must not register or unregister observers on the same object, nor
/// upgrade a weak handle to it.
pub trait Observer: Send + Sync {
    /// Called once, with the identity of the object being destroyed.
    fn object_deleted(&self, id: ObjectId);
}
