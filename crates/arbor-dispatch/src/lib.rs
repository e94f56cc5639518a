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

//! # Arbor Dispatch
//!
//! Blocking operation queues and the dedicated worker threads that drain
//! them. A graphics context owns one [`OperationThread`]; the rest of the
//! application hands it work by pushing [`Operation`]s onto its
//! [`OperationQueue`].

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod operation;
pub mod queue;
pub mod thread;

pub use config::ThreadConfig;
pub use error::DispatchError;
pub use operation::{
    BarrierOperation, BlockOperation, CompletionOperation, FnOperation, Operation,
    OperationContext,
};
pub use queue::OperationQueue;
pub use thread::OperationThread;
