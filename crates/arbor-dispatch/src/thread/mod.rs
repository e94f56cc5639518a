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

//! Dedicated worker threads draining an operation queue.

use crate::config::ThreadConfig;
use crate::error::DispatchError;
use crate::operation::{Operation, OperationContext};
use crate::queue::OperationQueue;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Parent = Arc<dyn Any + Send + Sync>;

/// State shared between the handle and the worker.
struct Shared {
    name: String,
    catch_panics: bool,
    done: AtomicBool,
    running: AtomicBool,
    queue: Mutex<Arc<OperationQueue>>,
    // Guarded separately from the queue so a canceller never waits on a
    // worker that is inside an operation.
    current: Mutex<Option<Arc<dyn Operation>>>,
    parent: RwLock<Option<Parent>>,
}

impl Shared {
    fn queue(&self) -> Arc<OperationQueue> {
        Arc::clone(&self.queue.lock())
    }

    fn release_current(&self) {
        let current = self.current.lock().clone();
        if let Some(operation) = current {
            log::debug!(
                "Releasing operation '{}' on thread '{}'.",
                operation.name(),
                self.name
            );
            operation.release();
        }
    }

    fn run(&self) {
        log::info!("Operation thread '{}' started.", self.name);

        loop {
            let queue = self.queue();
            let operation = queue.pop(true);
            if self.done.load(Ordering::SeqCst) {
                break;
            }
            let Some(operation) = operation else {
                // Woken without work: park again instead of spinning. A stop
                // request released before the resync is seen by this load;
                // one released after it leaves the signal open.
                queue.resync_signal();
                if self.done.load(Ordering::SeqCst) {
                    break;
                }
                continue;
            };

            *self.current.lock() = Some(Arc::clone(&operation));
            self.execute(operation.as_ref());
            *self.current.lock() = None;
        }

        log::info!("Operation thread '{}' stopped.", self.name);
    }

    fn execute(&self, operation: &dyn Operation) {
        let parent = self.parent.read().clone();
        let context = OperationContext {
            parent: parent.as_deref(),
            thread: Some(&self.name),
        };

        log::trace!(
            "Thread '{}' executing operation '{}'.",
            self.name,
            operation.name()
        );
        if !self.catch_panics {
            operation.execute(&context);
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| operation.execute(&context))) {
            log::error!(
                "Operation '{}' panicked on thread '{}': {}",
                operation.name(),
                self.name,
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Clears the running flag when the worker exits, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A dedicated OS thread that pops operations from a queue and runs them
/// until told to stop.
///
/// Several threads may share one queue; each one-shot operation is then
/// run by exactly one of them. Dropping the handle cancels the thread.
pub struct OperationThread {
    config: ThreadConfig,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl OperationThread {
    /// Creates an idle thread with its own empty queue.
    pub fn new(config: ThreadConfig) -> Self {
        Self::with_queue(config, Arc::new(OperationQueue::new()))
    }

    /// Creates an idle thread that will drain `queue`.
    pub fn with_queue(config: ThreadConfig, queue: Arc<OperationQueue>) -> Self {
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            catch_panics: config.catch_panics,
            done: AtomicBool::new(false),
            running: AtomicBool::new(false),
            queue: Mutex::new(queue),
            current: Mutex::new(None),
            parent: RwLock::new(None),
        });
        Self {
            config,
            shared,
            handle: Mutex::new(None),
        }
    }

    /// The thread's configuration.
    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    /// The thread's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Sets the object handed to operations as [`OperationContext::parent`].
    pub fn set_parent(&self, parent: Option<Arc<dyn Any + Send + Sync>>) {
        *self.shared.parent.write() = parent;
    }

    /// The object handed to operations, if any.
    pub fn parent(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.shared.parent.read().clone()
    }

    /// The queue this thread drains.
    pub fn queue(&self) -> Arc<OperationQueue> {
        self.shared.queue()
    }

    /// Switches to another queue. A worker parked on the old queue is woken
    /// so it picks up the new one.
    pub fn set_queue(&self, queue: Arc<OperationQueue>) {
        let previous = std::mem::replace(&mut *self.shared.queue.lock(), queue);
        previous.release_block();
    }

    /// Pushes `operation` onto the thread's queue.
    pub fn add(&self, operation: Arc<dyn Operation>) {
        self.queue().push(operation);
    }

    /// Removes `operation` from the thread's queue.
    pub fn remove(&self, operation: &Arc<dyn Operation>) {
        self.queue().remove(operation);
    }

    /// Removes every operation named `name` from the thread's queue.
    pub fn remove_named(&self, name: &str) {
        self.queue().remove_named(name);
    }

    /// Empties the thread's queue.
    pub fn remove_all(&self) {
        self.queue().remove_all();
    }

    /// The operation being executed right now, if any.
    pub fn current_operation(&self) -> Option<Arc<dyn Operation>> {
        self.shared.current.lock().clone()
    }

    /// Spawns the worker.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut handle = self.handle.lock();
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyRunning(self.shared.name.clone()));
        }
        if let Some(finished) = handle.take() {
            Self::join_handle(&self.shared.name, finished);
        }
        self.shared.done.store(false, Ordering::SeqCst);

        let mut builder = thread::Builder::new().name(self.shared.name.clone());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = builder.spawn(move || {
            let _running = RunningGuard(&shared.running);
            shared.run();
        });
        match spawned {
            Ok(worker) => {
                *handle = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    /// Returns `true` while the worker is alive.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Sets the stop flag. Raising it releases the current operation and
    /// wakes the worker if it is parked on an empty queue.
    pub fn set_done(&self, done: bool) {
        let previous = self.shared.done.swap(done, Ordering::SeqCst);
        if done && !previous {
            self.shared.release_current();
            self.queue().release_block();
        }
    }

    /// Returns `true` once the stop flag is raised.
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Keeps releasing the queue and the current operation until the worker
    /// is observed to stop, since it may pick up a new operation between
    /// two releases. Called from the worker itself, only raises the stop
    /// flag.
    pub fn cancel(&self) {
        self.set_done(true);
        if self.is_worker_thread() {
            return;
        }

        let interval = self.config.cancel_poll_interval();
        while self.is_running() {
            self.queue().release_block();
            self.shared.release_current();
            match interval {
                Some(interval) => thread::sleep(interval),
                None => thread::yield_now(),
            }
        }
        self.join();
    }

    /// Waits for the worker to exit without asking it to stop.
    pub fn join(&self) {
        if self.is_worker_thread() {
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            Self::join_handle(&self.shared.name, handle);
        }
    }

    fn is_worker_thread(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }

    fn join_handle(name: &str, handle: JoinHandle<()>) {
        if let Err(payload) = handle.join() {
            log::error!(
                "Operation thread '{}' terminated by a panic: {}",
                name,
                panic_message(payload.as_ref())
            );
        }
    }
}

impl Drop for OperationThread {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for OperationThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationThread")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::FnOperation;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn idle_thread_is_not_running() {
        let worker = OperationThread::new(ThreadConfig::named("idle"));
        assert!(!worker.is_running());
        assert!(!worker.is_done());
        worker.cancel();
    }

    #[test]
    fn starting_twice_is_rejected() {
        let worker = OperationThread::new(ThreadConfig::named("twice"));
        worker.start().unwrap();
        let err = worker.start().unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRunning(name) if name == "twice"));
        worker.cancel();
        assert!(!worker.is_running());
    }

    #[test]
    fn thread_can_restart_after_cancel() {
        let worker = OperationThread::new(ThreadConfig::named("restart"));
        worker.start().unwrap();
        worker.cancel();

        let hits = Arc::new(AtomicUsize::new(0));
        worker.start().unwrap();
        let counter = Arc::clone(&hits);
        worker.add(Arc::new(FnOperation::once("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        while hits.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        worker.cancel();
    }

    #[test]
    fn panicking_operation_does_not_stop_the_loop() {
        let worker = OperationThread::new(ThreadConfig::named("resilient"));
        let hits = Arc::new(AtomicUsize::new(0));
        worker.add(Arc::new(FnOperation::once("boom", |_| panic!("lost device"))));
        let counter = Arc::clone(&hits);
        worker.add(Arc::new(FnOperation::once("after", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        worker.start().unwrap();
        while hits.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.is_running());
        worker.cancel();
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let literal: Box<dyn Any + Send> = Box::new("literal");
        let other: Box<dyn Any + Send> = Box::new(3_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(literal.as_ref()), "literal");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
