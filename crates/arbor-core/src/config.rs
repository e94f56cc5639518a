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

//! Process-wide lifetime configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::delete::{install_delete_handler, DeferredDeleteHandler, DeleteHandler};
use crate::error::CoreError;
use crate::lifetime::{set_default_ref_count_mode, RefCountMode};

/// Settings applied once at startup by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeConfig {
    /// Counting mode for objects built with `Referenced::new`.
    pub ref_count_mode: RefCountMode,
    /// When set, a [`DeferredDeleteHandler`] retaining objects for this many
    /// frames is installed.
    pub frames_to_retain: Option<u32>,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            ref_count_mode: RefCountMode::Atomic,
            frames_to_retain: None,
        }
    }
}

impl LifetimeConfig {
    /// Parses a JSON document; missing fields take their default value.
    pub fn from_json_str(source: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Applies the configuration to the process. Returns the deferred delete
    /// handler it installed, so the caller can drive its frame number and
    /// flushes.
    pub fn apply(&self) -> Option<Arc<DeferredDeleteHandler>> {
        set_default_ref_count_mode(self.ref_count_mode);

        let frames = self.frames_to_retain?;
        let handler = Arc::new(DeferredDeleteHandler::new(frames));
        install_delete_handler(Some(handler.clone() as Arc<dyn DeleteHandler>));
        log::info!("Deferred deletion enabled, retaining objects for {frames} frame(s)");
        Some(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = LifetimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, LifetimeConfig::default());
    }

    #[test]
    fn fields_are_parsed() {
        let config =
            LifetimeConfig::from_json_str(r#"{ "ref_count_mode": "locked", "frames_to_retain": 3 }"#)
                .unwrap();
        assert_eq!(config.ref_count_mode, RefCountMode::Locked);
        assert_eq!(config.frames_to_retain, Some(3));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = LifetimeConfig::from_json_str("{ \"frames_to_retain\": -1 }").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
