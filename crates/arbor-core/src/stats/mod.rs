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

//! Process-wide counters describing object lifetimes.
//!
//! The lifetime and observer modules bump these counters as objects are
//! created, destroyed, handed to a delete handler or upgraded from a weak
//! handle. Any thread can read them with [`lifetime_stats`] to spot leaks
//! (a `live_objects` count that never drops) or misuse.

use std::sync::atomic::{AtomicU64, Ordering};

// --- Global Lifetime Counters ---

/// Number of `Referenced` records ever constructed.
pub static OBJECTS_CREATED: AtomicU64 = AtomicU64::new(0);

/// Number of `Referenced` records dropped.
pub static OBJECTS_DESTROYED: AtomicU64 = AtomicU64::new(0);

/// Number of destructions handed to an installed delete handler.
pub static DELETES_DEFERRED: AtomicU64 = AtomicU64::new(0);

/// Number of weak-to-strong upgrade attempts.
pub static UPGRADE_ATTEMPTS: AtomicU64 = AtomicU64::new(0);

/// Number of upgrade attempts that found no live object.
pub static UPGRADE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Number of detected lifecycle violations (destroyed while still
/// referenced, released below zero).
pub static LIFECYCLE_VIOLATIONS: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// A snapshot of the lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifetimeStats {
    /// Records ever constructed.
    pub objects_created: u64,
    /// Records dropped.
    pub objects_destroyed: u64,
    /// `objects_created - objects_destroyed`.
    pub live_objects: u64,
    /// Destructions routed through a delete handler.
    pub deletes_deferred: u64,
    /// Weak upgrade attempts.
    pub upgrade_attempts: u64,
    /// Weak upgrades that returned no object.
    pub upgrade_failures: u64,
    /// Detected misuse of the counting discipline.
    pub lifecycle_violations: u64,
}

/// Reads every counter (`Ordering::Relaxed`) and derives `live_objects`.
pub fn lifetime_stats() -> LifetimeStats {
    let created = OBJECTS_CREATED.load(Ordering::Relaxed);
    let destroyed = OBJECTS_DESTROYED.load(Ordering::Relaxed);

    LifetimeStats {
        objects_created: created,
        objects_destroyed: destroyed,
        live_objects: created.saturating_sub(destroyed),
        deletes_deferred: DELETES_DEFERRED.load(Ordering::Relaxed),
        upgrade_attempts: UPGRADE_ATTEMPTS.load(Ordering::Relaxed),
        upgrade_failures: UPGRADE_FAILURES.load(Ordering::Relaxed),
        lifecycle_violations: LIFECYCLE_VIOLATIONS.load(Ordering::Relaxed),
    }
}
