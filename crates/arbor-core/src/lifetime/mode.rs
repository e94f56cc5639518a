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

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// How a [`Referenced`](super::Referenced) serialises its count transitions.
///
/// Both modes are thread-safe and observe the zero crossing identically;
/// `Locked` additionally takes the object's own mutex around every
/// transition, so counting is ordered with observer-set creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefCountMode {
    /// Lock-free counter.
    #[default]
    Atomic,
    /// Counter transitions happen under the per-object mutex.
    Locked,
}

impl RefCountMode {
    const fn as_u8(self) -> u8 {
        match self {
            RefCountMode::Atomic => 0,
            RefCountMode::Locked => 1,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => RefCountMode::Locked,
            _ => RefCountMode::Atomic,
        }
    }
}

static DEFAULT_MODE: AtomicU8 = AtomicU8::new(RefCountMode::Atomic.as_u8());

/// The mode given to objects built with `Referenced::new`.
pub fn default_ref_count_mode() -> RefCountMode {
    RefCountMode::from_u8(DEFAULT_MODE.load(Ordering::Relaxed))
}

/// Changes the mode given to objects built from now on. Existing objects
/// keep their mode.
pub fn set_default_ref_count_mode(mode: RefCountMode) {
    let previous = DEFAULT_MODE.swap(mode.as_u8(), Ordering::Relaxed);
    if previous != mode.as_u8() {
        log::debug!("Default reference count mode set to {mode:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_u8() {
        for mode in [RefCountMode::Atomic, RefCountMode::Locked] {
            assert_eq!(RefCountMode::from_u8(mode.as_u8()), mode);
        }
    }

    #[test]
    fn mode_deserializes_from_snake_case() {
        let mode: RefCountMode = serde_json::from_str("\"locked\"").unwrap();
        assert_eq!(mode, RefCountMode::Locked);
    }
}
