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

//! Configuration for operation threads.

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an [`OperationThread`](crate::OperationThread).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Name given to the OS thread.
    pub name: String,
    /// Stack size of the OS thread in bytes. `None` keeps the platform default.
    pub stack_size: Option<usize>,
    /// Pause between release attempts while cancelling, in microseconds.
    /// Zero yields the CPU instead of sleeping.
    pub cancel_poll_interval_us: u64,
    /// Catch panics raised by operations and keep the loop running.
    /// When disabled, a panicking operation terminates the thread.
    pub catch_panics: bool,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name: "arbor-operation-thread".to_owned(),
            stack_size: None,
            cancel_poll_interval_us: 100,
            catch_panics: true,
        }
    }
}

impl ThreadConfig {
    /// Creates the default configuration with a custom thread name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from a JSON document. Missing fields take
    /// their default values.
    pub fn from_json_str(source: &str) -> Result<Self, DispatchError> {
        Ok(serde_json::from_str(source)?)
    }

    pub(crate) fn cancel_poll_interval(&self) -> Option<Duration> {
        match self.cancel_poll_interval_us {
            0 => None,
            us => Some(Duration::from_micros(us)),
        }
    }
}
