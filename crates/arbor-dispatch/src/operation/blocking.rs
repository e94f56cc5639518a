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

//! Operations that park the executing thread or the submitter.

use super::{Operation, OperationContext};
use arbor_core::{Block, ReleasableBarrier};
use std::fmt;
use std::time::Duration;

/// Parks the executing thread until someone releases it.
///
/// Useful to pause a worker at a known point, e.g. while the owner of a
/// graphics context tears down resources the worker would touch.
#[derive(Debug)]
pub struct BlockOperation {
    name: String,
    gate: Block,
}

impl BlockOperation {
    /// Creates a closed gate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gate: Block::new(),
        }
    }

    /// Closes the gate again so the operation can be queued once more.
    pub fn reset(&self) {
        self.gate.reset();
    }

    /// Returns `true` once the gate has been opened.
    pub fn is_released(&self) -> bool {
        self.gate.is_released()
    }
}

impl Operation for BlockOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep(&self) -> bool {
        false
    }

    fn execute(&self, _context: &OperationContext<'_>) {
        self.gate.block();
    }

    fn release(&self) {
        self.gate.release();
    }
}

/// A rendezvous between the executing thread and one or more submitters.
///
/// The worker arrives when it executes the operation; the other parties
/// arrive through [`wait`](BarrierOperation::wait). Nobody proceeds until
/// everyone has arrived or the barrier is released.
#[derive(Debug)]
pub struct BarrierOperation {
    name: String,
    keep: bool,
    barrier: ReleasableBarrier,
}

impl BarrierOperation {
    /// A one-shot barrier for `parties` threads, the worker included.
    pub fn new(name: impl Into<String>, parties: usize) -> Self {
        Self {
            name: name.into(),
            keep: false,
            barrier: ReleasableBarrier::new(parties),
        }
    }

    /// A barrier the worker meets on every pass of its queue, e.g. to
    /// lock-step a frame loop with the graphics thread.
    pub fn repeating(name: impl Into<String>, parties: usize) -> Self {
        Self {
            keep: true,
            ..Self::new(name, parties)
        }
    }

    /// Arrives from a non-worker thread.
    pub fn wait(&self) -> bool {
        self.barrier.wait()
    }

    /// Number of parties parked right now.
    pub fn waiting(&self) -> usize {
        self.barrier.waiting()
    }
}

impl Operation for BarrierOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep(&self) -> bool {
        self.keep
    }

    fn execute(&self, _context: &OperationContext<'_>) {
        self.barrier.wait();
    }

    fn release(&self) {
        self.barrier.release();
    }
}

type Task = Box<dyn Fn(&OperationContext<'_>) + Send + Sync>;

/// Runs a closure on the worker and lets the submitter wait for it.
///
/// The completion signal also fires if the operation is released or the
/// closure panics, so a waiter never outlives a cancelled worker.
pub struct CompletionOperation {
    name: String,
    task: Task,
    done: Block,
}

impl CompletionOperation {
    /// Wraps `task`.
    pub fn new<F>(name: impl Into<String>, task: F) -> Self
    where
        F: Fn(&OperationContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            task: Box::new(task),
            done: Block::new(),
        }
    }

    /// Parks until the operation has run or been released.
    pub fn wait(&self) {
        self.done.block();
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns `true` if the
    /// operation finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.block_timeout(timeout)
    }

    /// Returns `true` once the operation has run or been released.
    pub fn is_complete(&self) -> bool {
        self.done.is_released()
    }
}

struct ReleaseOnDrop<'a>(&'a Block);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl Operation for CompletionOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep(&self) -> bool {
        false
    }

    fn execute(&self, context: &OperationContext<'_>) {
        let _signal = ReleaseOnDrop(&self.done);
        (self.task)(context);
    }

    fn release(&self) {
        self.done.release();
    }
}

impl fmt::Debug for CompletionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionOperation")
            .field("name", &self.name)
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn block_operation_parks_until_released() {
        let op = Arc::new(BlockOperation::new("pause"));
        let worker = {
            let op = Arc::clone(&op);
            thread::spawn(move || op.execute(&OperationContext::detached()))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished());
        op.release();
        worker.join().unwrap();
        assert!(op.is_released());
    }

    #[test]
    fn barrier_operation_meets_submitter() {
        let op = Arc::new(BarrierOperation::new("sync", 2));
        let worker = {
            let op = Arc::clone(&op);
            thread::spawn(move || op.execute(&OperationContext::detached()))
        };
        op.wait();
        worker.join().unwrap();
    }

    #[test]
    fn completion_signals_after_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let op = {
            let hits = Arc::clone(&hits);
            CompletionOperation::new("upload", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(!op.wait_timeout(Duration::from_millis(5)));

        op.execute(&OperationContext::detached());
        op.wait();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completion_signals_even_if_task_panics() {
        let op = CompletionOperation::new("broken", |_| panic!("driver lost"));
        let result = catch_unwind(AssertUnwindSafe(|| {
            op.execute(&OperationContext::detached())
        }));
        assert!(result.is_err());
        assert!(op.is_complete());
    }
}
