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

//! The blocking operation queue.

use crate::operation::{Operation, OperationContext};
use arbor_core::Block;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct QueueState {
    operations: Vec<Arc<dyn Operation>>,
    // Index of the next operation to hand out.
    cursor: usize,
}

impl QueueState {
    fn after_removal(&mut self, removed_before_cursor: usize) {
        self.cursor -= removed_before_cursor;
        if self.cursor >= self.operations.len() {
            self.cursor = 0;
        }
    }
}

/// An ordered, thread-safe queue of operations.
///
/// Operations come out in insertion order. One-shot operations leave the
/// queue when popped; `keep` operations stay in place and are revisited
/// round-robin. Consumers may park in [`pop`](Self::pop) until work
/// arrives; the internal signal is released whenever the queue holds
/// something.
pub struct OperationQueue {
    state: Mutex<QueueState>,
    signal: Block,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            signal: Block::new(),
        }
    }

    /// Appends `operation` and wakes parked consumers.
    pub fn push(&self, operation: Arc<dyn Operation>) {
        let mut state = self.state.lock();
        log::trace!("Queueing operation '{}'.", operation.name());
        state.operations.push(operation);
        self.signal.release();
    }

    /// Takes the operation at the cursor.
    ///
    /// With `block_if_empty`, an empty queue parks the caller until
    /// something is pushed or [`release_block`](Self::release_block) is
    /// called. Returns `None` when nothing is available, including when
    /// another consumer emptied the queue while this one was waking up.
    pub fn pop(&self, block_if_empty: bool) -> Option<Arc<dyn Operation>> {
        if block_if_empty {
            self.signal.block();
        }

        let mut state = self.state.lock();
        if state.operations.is_empty() {
            return None;
        }
        if state.cursor >= state.operations.len() {
            state.cursor = 0;
        }

        let cursor = state.cursor;
        let operation = Arc::clone(&state.operations[cursor]);
        if operation.keep() {
            state.cursor += 1;
        } else {
            state.operations.remove(cursor);
            if state.operations.is_empty() {
                self.signal.reset();
            }
        }
        if state.cursor >= state.operations.len() {
            state.cursor = 0;
        }
        Some(operation)
    }

    /// Removes every entry that is `operation` itself.
    pub fn remove(&self, operation: &Arc<dyn Operation>) {
        self.remove_where(|queued| Arc::ptr_eq(queued, operation));
    }

    /// Removes every entry named `name`.
    pub fn remove_named(&self, name: &str) {
        self.remove_where(|queued| queued.name() == name);
    }

    /// Empties the queue.
    pub fn remove_all(&self) {
        let mut state = self.state.lock();
        state.operations.clear();
        state.cursor = 0;
        self.signal.reset();
    }

    fn remove_where(&self, mut matches: impl FnMut(&Arc<dyn Operation>) -> bool) {
        let mut state = self.state.lock();
        let cursor = state.cursor;
        let mut index = 0;
        let mut removed_before_cursor = 0;
        state.operations.retain(|queued| {
            let remove = matches(queued);
            if remove && index < cursor {
                removed_before_cursor += 1;
            }
            index += 1;
            !remove
        });
        state.after_removal(removed_before_cursor);
        if state.operations.is_empty() {
            self.signal.reset();
        }
    }

    /// Executes every queued operation once on the calling thread.
    ///
    /// The pass covers what is queued when it starts; work pushed while it
    /// runs waits for the next call. Each step takes the lock on its own, so
    /// operations may push or remove work while executing. An operation
    /// removed, or popped by another consumer, before its turn is skipped.
    /// One-shot operations leave the queue just before they run. `keep`
    /// operations stay in place and remain visible to concurrent `pop`
    /// callers.
    pub fn run_all(&self, context: &OperationContext<'_>) {
        let pass = {
            let mut state = self.state.lock();
            state.cursor = 0;
            state.operations.clone()
        };

        for operation in pass {
            if !self.claim(&operation) {
                continue;
            }
            log::trace!("Running operation '{}'.", operation.name());
            operation.execute(context);
        }
    }

    /// Checks that `operation` is still queued and takes it out unless it
    /// is a `keep` operation. Returns `false` if it is gone.
    fn claim(&self, operation: &Arc<dyn Operation>) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state
            .operations
            .iter()
            .position(|queued| Arc::ptr_eq(queued, operation))
        else {
            return false;
        };

        if !operation.keep() {
            let before_cursor = usize::from(index < state.cursor);
            state.operations.remove(index);
            state.after_removal(before_cursor);
            if state.operations.is_empty() {
                self.signal.reset();
            }
        }
        true
    }

    /// Wakes every consumer parked in [`pop`](Self::pop) without handing
    /// out work. The signal stays released until the next push, a pop that
    /// empties the queue, or an idle operation thread resynchronises it.
    pub fn release_block(&self) {
        self.signal.release();
    }

    /// Re-derives the signal from the queue contents, parking consumers
    /// again after a [`release_block`](Self::release_block) on an empty
    /// queue.
    pub(crate) fn resync_signal(&self) {
        let state = self.state.lock();
        self.signal.set(!state.operations.is_empty());
    }

    /// Calls [`Operation::release`] on every queued operation.
    pub fn release_all_operations(&self) {
        for operation in self.snapshot() {
            operation.release();
        }
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.state.lock().operations.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().operations.is_empty()
    }

    /// The queued operations in order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Operation>> {
        self.state.lock().operations.clone()
    }
}

impl fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OperationQueue")
            .field("len", &state.operations.len())
            .field("cursor", &state.cursor)
            .field("signalled", &self.signal.is_released())
            .finish()
    }
}
