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

//! Blocking primitives shared by the lifetime and dispatch layers.
//!
//! [`Block`] is a manual-reset event: it is used both as the "queue is not
//! empty" signal of an operation queue and as a rendezvous point inside
//! operations. [`ReleasableBarrier`] is an N-party barrier that can be
//! broken from the outside so a cancelled thread never stays parked.

mod barrier;
mod block;

pub use self::barrier::ReleasableBarrier;
pub use self::block::Block;
