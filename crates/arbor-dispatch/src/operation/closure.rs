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

use super::{Operation, OperationContext};
use std::fmt;

type Callback = Box<dyn Fn(&OperationContext<'_>) + Send + Sync>;

/// An operation backed by a closure.
pub struct FnOperation {
    name: String,
    keep: bool,
    callback: Callback,
}

impl FnOperation {
    /// An operation that runs once and leaves the queue.
    pub fn once<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&OperationContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            keep: false,
            callback: Box::new(callback),
        }
    }

    /// An operation that stays queued and runs on every pass.
    pub fn repeating<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&OperationContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            keep: true,
            callback: Box::new(callback),
        }
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep(&self) -> bool {
        self.keep
    }

    fn execute(&self, context: &OperationContext<'_>) {
        (self.callback)(context);
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .field("keep", &self.keep)
            .finish_non_exhaustive()
    }
}
