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

//! Error types for the fallible edges of the lifetime core.

use thiserror::Error;

/// Errors raised while configuring the lifetime core.
///
/// Counting, observing and deleting never fail; only configuration input
/// can be rejected.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The configuration document could not be parsed.
    #[error("invalid lifetime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
