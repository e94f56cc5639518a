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

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::DeleteHandler;
use crate::lifetime::RefCounted;

/// A delete handler that keeps objects alive for a number of frames.
///
/// Objects released during frame `n` are freed by the first
/// [`flush`](DeleteHandler::flush) issued once the current frame reaches
/// `n + frames_to_retain`. GPU-bound objects can thus outlive the frames
/// that may still reference them. A retention of zero frees immediately.
pub struct DeferredDeleteHandler {
    frames_to_retain: AtomicU32,
    current_frame: AtomicU32,
    pending: Mutex<VecDeque<(u32, Box<dyn RefCounted>)>>,
}

impl DeferredDeleteHandler {
    /// Creates a handler retaining objects for `frames_to_retain` frames.
    pub fn new(frames_to_retain: u32) -> Self {
        Self {
            frames_to_retain: AtomicU32::new(frames_to_retain),
            current_frame: AtomicU32::new(0),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of frames an object is retained for.
    pub fn frames_to_retain(&self) -> u32 {
        self.frames_to_retain.load(Ordering::Relaxed)
    }

    /// Changes the retention period for objects requested from now on.
    pub fn set_frames_to_retain(&self, frames: u32) {
        self.frames_to_retain.store(frames, Ordering::Relaxed);
    }

    /// The frame number stamped on new requests.
    pub fn frame_number(&self) -> u32 {
        self.current_frame.load(Ordering::Relaxed)
    }

    /// Number of objects waiting to be freed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn take_expired(&self) -> Vec<Box<dyn RefCounted>> {
        let current = self.frame_number();
        let retain = self.frames_to_retain();
        let Some(clear_to) = current.checked_sub(retain) else {
            return Vec::new();
        };

        let mut pending = self.pending.lock();
        let expired = pending
            .iter()
            .take_while(|(frame, _)| *frame <= clear_to)
            .count();
        pending.drain(..expired).map(|(_, object)| object).collect()
    }
}

impl DeleteHandler for DeferredDeleteHandler {
    fn request_delete(&self, object: Box<dyn RefCounted>) {
        if self.frames_to_retain() == 0 {
            drop(object);
            return;
        }
        let frame = self.frame_number();
        self.pending.lock().push_back((frame, object));
    }

    fn flush(&self) {
        // Freed outside the lock: destructors may release more objects,
        // which land back in `request_delete`.
        let expired = self.take_expired();
        if !expired.is_empty() {
            log::trace!("Deferred delete handler freeing {} object(s)", expired.len());
        }
        drop(expired);
    }

    fn flush_all(&self) {
        loop {
            let all: Vec<_> = self
                .pending
                .lock()
                .drain(..)
                .map(|(_, object)| object)
                .collect();
            if all.is_empty() {
                break;
            }
            log::trace!("Deferred delete handler freeing all {} object(s)", all.len());
            drop(all);
        }
    }

    fn set_frame_number(&self, frame_number: u32) {
        self.current_frame.store(frame_number, Ordering::Relaxed);
    }
}

impl Default for DeferredDeleteHandler {
    fn default() -> Self {
        Self::new(2)
    }
}

impl fmt::Debug for DeferredDeleteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredDeleteHandler")
            .field("frames_to_retain", &self.frames_to_retain())
            .field("current_frame", &self.frame_number())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for DeferredDeleteHandler {
    fn drop(&mut self) {
        self.flush_all();
    }
}
