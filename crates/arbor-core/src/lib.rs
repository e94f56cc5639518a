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

//! # Arbor Core
//!
//! Object lifetime core shared by every scene-graph and graphics object:
//! thread-safe intrusive reference counting, destruction observers with a
//! race-free weak upgrade, and a pluggable process-wide delete handler.

#![warn(missing_docs)]

pub mod config;
pub mod delete;
pub mod error;
pub mod lifetime;
pub mod observer;
pub mod stats;
pub mod sync;

pub use config::LifetimeConfig;
pub use delete::{
    delete_handler, install_delete_handler, DeferredDeleteHandler, DeleteHandler,
    ScopedDeleteHandler,
};
pub use error::CoreError;
pub use lifetime::{
    default_ref_count_mode, set_default_ref_count_mode, ObjectId, Ref, RefCountMode, RefCounted,
    Referenced,
};
pub use observer::{Observer, ObserverPtr, ObserverSet};
pub use sync::{Block, ReleasableBarrier};
