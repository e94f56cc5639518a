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

//! The process-wide delete handler slot.
//!
//! With no handler installed, an object whose count reaches zero is freed
//! on the spot by the thread that released it. Installing a
//! [`DeleteHandler`] reroutes that final step: the handler receives the
//! object (already detached from its observers) and decides when to free
//! it, for instance at a safe point at the end of a frame.

mod deferred;

pub use self::deferred::DeferredDeleteHandler;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::lifetime::RefCounted;

/// Intercepts the final destruction of counted objects.
pub trait DeleteHandler: Send + Sync {
    /// Takes ownership of an object whose count reached zero. Dropping the
    /// box frees the object.
    fn request_delete(&self, object: Box<dyn RefCounted>);

    /// Frees the objects whose retention period has elapsed.
    fn flush(&self) {}

    /// Frees every object the handler still holds.
    fn flush_all(&self) {}

    /// Advances the handler's notion of the current frame.
    fn set_frame_number(&self, _frame_number: u32) {}
}

static DELETE_HANDLER: RwLock<Option<Arc<dyn DeleteHandler>>> = RwLock::new(None);

/// Installs `handler` (or clears the slot with `None`) and returns the
/// handler that was installed before. Objects already handed to the previous
/// handler stay with it; dropping it is expected to free them.
pub fn install_delete_handler(
    handler: Option<Arc<dyn DeleteHandler>>,
) -> Option<Arc<dyn DeleteHandler>> {
    let installing = handler.is_some();
    let previous = std::mem::replace(&mut *DELETE_HANDLER.write(), handler);
    log::debug!(
        "Delete handler {} (previous handler: {})",
        if installing { "installed" } else { "cleared" },
        if previous.is_some() { "replaced" } else { "none" },
    );
    previous
}

/// The currently installed handler, if any.
pub fn delete_handler() -> Option<Arc<dyn DeleteHandler>> {
    DELETE_HANDLER.read().clone()
}

/// Installs a handler for the lifetime of the guard and restores the
/// previously installed one when dropped.
///
/// ```rust
/// use std::sync::Arc;
/// use arbor_core::{delete_handler, DeferredDeleteHandler, ScopedDeleteHandler};
///
/// {
///     let _guard = ScopedDeleteHandler::install(Arc::new(DeferredDeleteHandler::new(2)));
///     assert!(delete_handler().is_some());
/// }
/// ```
#[must_use = "the previous handler is restored when the guard is dropped"]
pub struct ScopedDeleteHandler {
    previous: Option<Option<Arc<dyn DeleteHandler>>>,
}

impl ScopedDeleteHandler {
    /// Installs `handler`, remembering the handler it replaces.
    pub fn install(handler: Arc<dyn DeleteHandler>) -> Self {
        Self {
            previous: Some(install_delete_handler(Some(handler))),
        }
    }
}

impl Drop for ScopedDeleteHandler {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            install_delete_handler(previous);
        }
    }
}
