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

use std::sync::Mutex;
use std::thread::{self, ThreadId};

/// Records which thread is the render thread and checks calls against it.
///
/// Native GPU calls other than enqueueing a delayed destroy must happen on that thread.
/// Violations panic in debug builds and are logged as errors in release builds.
#[derive(Debug, Default)]
pub struct RenderThreadAffinity {
    owner: Mutex<Option<ThreadId>>,
}

impl RenderThreadAffinity {
    /// Creates an affinity with no render thread bound yet.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Creates an affinity bound to the calling thread.
    pub fn bound_to_current() -> Self {
        Self {
            owner: Mutex::new(Some(thread::current().id())),
        }
    }

    /// Makes the calling thread the render thread.
    pub fn bind_current(&self) {
        let id = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = owner.replace(id) {
            if previous != id {
                log::debug!("RenderThreadAffinity: rebound from {previous:?} to {id:?}");
            }
        }
    }

    /// `true` when called from the bound render thread.
    pub fn is_render_thread(&self) -> bool {
        let owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        *owner == Some(thread::current().id())
    }

    /// Checks that `operation` runs on the render thread.
    ///
    /// # Panics
    /// In debug builds, when called from any other thread.
    pub fn assert_render_thread(&self, operation: &str) {
        if self.is_render_thread() {
            return;
        }
        let current = thread::current();
        if cfg!(debug_assertions) {
            panic!(
                "{operation} must run on the render thread (called from {:?})",
                current.name().unwrap_or("<unnamed>")
            );
        }
        log::error!(
            "RenderThreadAffinity: {operation} called off the render thread ({:?})",
            current.name().unwrap_or("<unnamed>")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_bound_thread_passes() {
        let affinity = RenderThreadAffinity::bound_to_current();
        assert!(affinity.is_render_thread());
        affinity.assert_render_thread("test");
    }

    #[test]
    fn test_unbound_is_not_render_thread() {
        assert!(!RenderThreadAffinity::unbound().is_render_thread());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_other_thread_panics_in_debug() {
        let affinity = Arc::new(RenderThreadAffinity::bound_to_current());
        let remote = affinity.clone();
        let result = thread::spawn(move || remote.assert_render_thread("create_texture")).join();
        assert!(result.is_err());
    }

    #[test]
    fn test_rebind() {
        let affinity = Arc::new(RenderThreadAffinity::bound_to_current());
        let remote = affinity.clone();
        thread::spawn(move || remote.bind_current()).join().unwrap();
        assert!(!affinity.is_render_thread());
    }
}
