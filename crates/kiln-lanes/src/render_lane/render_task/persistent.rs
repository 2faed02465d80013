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

//! Render task content that survives across frames.
//!
//! Elements whose GPU state rarely changes register their steps once under an owner. When
//! an owner changes or disappears its steps are dropped with [`PersistentRenderTask::remove_owner`];
//! the frame's [`RenderTask`] is materialised from the remaining owners on demand, so
//! groups left empty by a removal simply vanish.

use super::{RenderStep, RenderTask};
use ahash::AHashMap;

/// Identifies the scene element a set of persistent steps belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

#[derive(Debug, Clone, PartialEq)]
struct PersistentOwner {
    id: OwnerId,
    steps: Vec<RenderStep>,
}

/// Steps registered per owner, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PersistentRenderTask {
    owners: Vec<PersistentOwner>,
    lookup: AHashMap<OwnerId, usize>,
}

impl PersistentRenderTask {
    /// Creates an empty persistent task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner` without steps. Existing owners keep their position.
    pub fn add_owner(&mut self, owner: OwnerId) {
        if !self.lookup.contains_key(&owner) {
            self.lookup.insert(owner, self.owners.len());
            self.owners.push(PersistentOwner {
                id: owner,
                steps: Vec::new(),
            });
        }
    }

    /// Appends a step for `owner`, registering the owner if needed.
    pub fn add_step(&mut self, owner: OwnerId, step: RenderStep) {
        self.add_owner(owner);
        if let Some(&index) = self.lookup.get(&owner) {
            self.owners[index].steps.push(step);
        }
    }

    /// Replaces every step of `owner`, keeping its position.
    pub fn set_steps(&mut self, owner: OwnerId, steps: impl IntoIterator<Item = RenderStep>) {
        self.add_owner(owner);
        if let Some(&index) = self.lookup.get(&owner) {
            let target = &mut self.owners[index].steps;
            target.clear();
            target.extend(steps);
        }
    }

    /// Removes `owner` and all its steps.
    ///
    /// ## Returns
    ///
    /// `false` when the owner was not registered.
    pub fn remove_owner(&mut self, owner: OwnerId) -> bool {
        let Some(index) = self.lookup.remove(&owner) else {
            return false;
        };
        self.owners.remove(index);
        for slot in self.lookup.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        true
    }

    /// `true` when `owner` is registered.
    pub fn has_owner(&self, owner: OwnerId) -> bool {
        self.lookup.contains_key(&owner)
    }

    /// Registered owners.
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Steps over all owners.
    pub fn step_count(&self) -> usize {
        self.owners.iter().map(|o| o.steps.len()).sum()
    }

    /// Removes every owner.
    pub fn clear(&mut self) {
        self.owners.clear();
        self.lookup.clear();
    }

    /// Rebuilds `task` from the registered steps.
    pub fn fill_render_task(&self, task: &mut RenderTask) {
        task.clear();
        for step in self.owners.iter().flat_map(|o| o.steps.iter()) {
            task.add_step(step);
        }
    }

    /// Materialises the registered steps as a new render task.
    pub fn to_render_task(&self) -> RenderTask {
        let mut task = RenderTask::new();
        self.fill_render_task(&mut task);
        task
    }
}
