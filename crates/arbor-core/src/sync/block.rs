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

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A manual-reset event.
///
/// While the block is *released*, [`block`](Block::block) returns
/// immediately. While it is *reset*, callers park until another thread
/// calls [`release`](Block::release) (or `set(true)`). Releasing wakes every
/// parked thread at once, and the block stays released until it is reset.
#[derive(Debug, Default)]
pub struct Block {
    released: Mutex<bool>,
    cond: Condvar,
}

impl Block {
    /// Creates a block in the reset (blocking) state.
    pub fn new() -> Self {
        Self {
            released: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Creates a block that is already released.
    pub fn released() -> Self {
        Self {
            released: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Parks the calling thread until the block is released.
    pub fn block(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.cond.wait(&mut released);
        }
    }

    /// Parks the calling thread until the block is released or `timeout`
    /// elapses. Returns `true` if the block was released.
    pub fn block_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut released = self.released.lock();
        while !*released {
            if self.cond.wait_until(&mut released, deadline).timed_out() {
                return *released;
            }
        }
        true
    }

    /// Releases the block, waking every parked thread.
    pub fn release(&self) {
        let mut released = self.released.lock();
        if !*released {
            *released = true;
            self.cond.notify_all();
        }
    }

    /// Puts the block back in the blocking state.
    pub fn reset(&self) {
        *self.released.lock() = false;
    }

    /// Releases the block when `released` is `true`, resets it otherwise.
    pub fn set(&self, released: bool) {
        if released {
            self.release();
        } else {
            self.reset();
        }
    }

    /// Returns `true` if the block is currently released.
    pub fn is_released(&self) -> bool {
        *self.released.lock()
    }
}
