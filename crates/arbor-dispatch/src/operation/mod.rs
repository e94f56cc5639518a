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

//! Units of work consumed by operation queues.
//!
//! An [`Operation`] is executed by whoever pops it: usually the
//! [`OperationThread`](crate::OperationThread) bound to a graphics context,
//! sometimes the application itself through
//! [`OperationQueue::run_all`](crate::OperationQueue::run_all).

mod blocking;
mod closure;

pub use blocking::{BarrierOperation, BlockOperation, CompletionOperation};
pub use closure::FnOperation;

use std::any::Any;
use std::fmt;

/// A unit of work held by an [`OperationQueue`](crate::OperationQueue).
pub trait Operation: Send + Sync {
    /// Name used for bulk removal with `remove_named`.
    fn name(&self) -> &str;

    /// `true` if the operation stays queued after it runs and is revisited
    /// on every pass of the queue.
    fn keep(&self) -> bool;

    /// Runs the operation.
    fn execute(&self, context: &OperationContext<'_>);

    /// Frees a thread blocked inside [`execute`](Operation::execute).
    ///
    /// Called when the executing thread is cancelled. Operations that never
    /// block can keep the default no-op.
    fn release(&self) {}
}

impl fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .field("keep", &self.keep())
            .finish()
    }
}

/// Everything an operation may look at while it runs.
#[derive(Clone, Copy, Default)]
pub struct OperationContext<'a> {
    /// The object the executing thread works for (typically the graphics
    /// context), type-erased.
    pub parent: Option<&'a (dyn Any + Send + Sync)>,

    /// Name of the executing thread, `None` when run outside an
    /// operation thread.
    pub thread: Option<&'a str>,
}

impl<'a> OperationContext<'a> {
    /// A context with neither parent nor thread.
    pub fn detached() -> Self {
        Self::default()
    }

    /// A context handing `parent` to the operations.
    pub fn with_parent(parent: &'a (dyn Any + Send + Sync)) -> Self {
        Self {
            parent: Some(parent),
            thread: None,
        }
    }

    /// Returns the parent downcast to `T`, if there is one of that type.
    pub fn parent_as<T: Any>(&self) -> Option<&'a T> {
        self.parent.and_then(|parent| parent.downcast_ref::<T>())
    }
}

impl fmt::Debug for OperationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("has_parent", &self.parent.is_some())
            .field("thread", &self.thread)
            .finish()
    }
}
