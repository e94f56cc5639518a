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

//! Error types for the dispatch crate.

use thiserror::Error;

/// Errors raised while configuring or starting an operation thread.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `start` was called on a thread that is already running.
    #[error("operation thread '{0}' is already running")]
    AlreadyRunning(String),

    /// The operating system refused to spawn the worker thread.
    #[error("failed to spawn operation thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A thread configuration document could not be parsed.
    #[error("invalid thread configuration: {0}")]
    Config(#[from] serde_json::Error),
}
