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

//! Intrusive, thread-safe reference counting.
//!
//! Every shared object embeds a [`Referenced`] record and exposes it through
//! the [`RefCounted`] trait. Ownership is expressed with [`Ref`] handles:
//! cloning a handle acquires a count, dropping it releases one, and the
//! release that reaches zero runs the destruction protocol:
//!
//! 1. the object gives up its handle to its observer set;
//! 2. every observer registered on that set is signalled, and the set is
//!    detached so later weak upgrades fail cleanly;
//! 3. the object is freed, either immediately or by the installed
//!    [`DeleteHandler`](crate::delete::DeleteHandler).

mod handle;
mod mode;
mod referenced;

pub use self::handle::Ref;
pub use self::mode::{default_ref_count_mode, set_default_ref_count_mode, RefCountMode};
pub use self::referenced::{ObjectId, RefCounted, Referenced};
