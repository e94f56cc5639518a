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

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// A reusable rendezvous for a fixed number of threads that can be broken
/// from the outside.
///
/// Each call to [`wait`](ReleasableBarrier::wait) parks until `parties`
/// threads have arrived, then all of them continue and the barrier resets
/// for the next round. [`release`](ReleasableBarrier::release) ends the
/// current round early, freeing whoever is parked.
#[derive(Debug)]
pub struct ReleasableBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl ReleasableBarrier {
    /// Creates a barrier for `parties` threads. A party count of zero is
    /// treated as one.
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Number of threads that make up one round.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of threads currently parked in the active round.
    pub fn waiting(&self) -> usize {
        self.state.lock().arrived
    }

    /// Arrives at the barrier and parks until the round completes or is
    /// released. Returns `true` for the thread that completed the round.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        state.arrived += 1;
        if state.arrived >= self.parties {
            Self::advance(&mut state);
            self.cond.notify_all();
            return true;
        }

        let generation = state.generation;
        while state.generation == generation {
            self.cond.wait(&mut state);
        }
        false
    }

    /// Ends the current round, freeing every parked thread.
    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.arrived > 0 {
            Self::advance(&mut state);
            self.cond.notify_all();
        }
    }

    fn advance(state: &mut BarrierState) {
        state.arrived = 0;
        state.generation = state.generation.wrapping_add(1);
    }
}
