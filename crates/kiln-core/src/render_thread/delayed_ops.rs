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

use super::affinity::RenderThreadAffinity;
use super::context::{PrepareForRender, RenderContext};
use crate::renderer::api::NativeTextureId;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::TextureBackend;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// A release action run on the render thread during a drain.
pub type ReleaseAction = Box<dyn FnOnce() -> Result<(), ResourceError> + Send>;

/// A GPU-destructive operation deferred to the render thread.
pub enum DelayedOperation {
    /// Destroy a native texture.
    DeleteTexture(NativeTextureId),
    /// Release an arbitrary GPU object.
    Release {
        /// Shown in logs when the action fails.
        label: Cow<'static, str>,
        /// The release itself.
        action: ReleaseAction,
    },
}

impl fmt::Debug for DelayedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayedOperation::DeleteTexture(id) => f.debug_tuple("DeleteTexture").field(id).finish(),
            DelayedOperation::Release { label, .. } => {
                f.debug_struct("Release").field("label", label).finish()
            }
        }
    }
}

/// Outcome of one [`DelayedOperations::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations that completed.
    pub executed: usize,
    /// Operations that failed and were skipped.
    pub failed: usize,
}

/// The render thread's queue of deferred destroy operations, plus the list of objects
/// waiting for their first render-thread preparation.
///
/// Cloning yields another producer handle onto the same queue. Any thread may enqueue;
/// only the render thread drains.
#[derive(Clone)]
pub struct DelayedOperations {
    sender: flume::Sender<DelayedOperation>,
    receiver: flume::Receiver<DelayedOperation>,
    init: Arc<Mutex<Vec<Weak<dyn PrepareForRender>>>>,
    affinity: Arc<RenderThreadAffinity>,
}

impl fmt::Debug for DelayedOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedOperations")
            .field("pending", &self.pending_count())
            .field("init_pending", &self.init_pending_count())
            .finish()
    }
}

impl DelayedOperations {
    /// Creates an empty queue drained on the thread `affinity` is bound to.
    pub fn new(affinity: Arc<RenderThreadAffinity>) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            init: Arc::new(Mutex::new(Vec::new())),
            affinity,
        }
    }

    /// Queues an operation. Callable from any thread.
    pub fn enqueue(&self, operation: DelayedOperation) {
        if let DelayedOperation::DeleteTexture(id) = &operation {
            if id.is_null() {
                return;
            }
        }
        // The receiver lives in `self`, so the channel cannot be disconnected here.
        if let Err(e) = self.sender.send(operation) {
            log::error!("DelayedOperations: failed to enqueue {:?}", e.into_inner());
        }
    }

    /// Queues the destruction of a native texture. Null handles are ignored.
    pub fn delete_texture(&self, id: NativeTextureId) {
        log::debug!("DelayedOperations: queued delete of texture {}", id.0);
        self.enqueue(DelayedOperation::DeleteTexture(id));
    }

    /// Queues an arbitrary release action.
    pub fn release_object(
        &self,
        label: impl Into<Cow<'static, str>>,
        action: impl FnOnce() -> Result<(), ResourceError> + Send + 'static,
    ) {
        self.enqueue(DelayedOperation::Release {
            label: label.into(),
            action: Box::new(action),
        });
    }

    /// Number of operations waiting for the next drain.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Executes every queued operation in enqueue order, leaving the queue empty.
    ///
    /// A failing operation is logged and skipped; the drain always continues.
    pub fn drain(&self, backend: &dyn TextureBackend) -> DrainReport {
        self.affinity.assert_render_thread("DelayedOperations::drain");

        let mut report = DrainReport::default();
        while let Ok(operation) = self.receiver.try_recv() {
            let result = match operation {
                DelayedOperation::DeleteTexture(id) => backend
                    .destroy_texture(id)
                    .map_err(|e| (format!("delete texture {}", id.0), e)),
                DelayedOperation::Release { label, action } => {
                    action().map_err(|e| (format!("release '{label}'"), e))
                }
            };
            match result {
                Ok(()) => report.executed += 1,
                Err((what, e)) => {
                    log::warn!("DelayedOperations: {what} failed: {e}. Skipping.");
                    report.failed += 1;
                }
            }
        }

        if report.executed + report.failed > 0 {
            log::trace!(
                "DelayedOperations: drained {} ops ({} failed)",
                report.executed + report.failed,
                report.failed
            );
        }
        report
    }

    /// Registers an object for preparation at the next
    /// [`process_init_operations`](Self::process_init_operations). Duplicates are ignored.
    pub fn add_init(&self, object: Weak<dyn PrepareForRender>) {
        let mut init = self.init.lock().unwrap_or_else(|e| e.into_inner());
        if !init.iter().any(|o| Weak::ptr_eq(o, &object)) {
            init.push(object);
        }
    }

    /// Number of objects waiting for preparation.
    pub fn init_pending_count(&self) -> usize {
        self.init.lock().map(|init| init.len()).unwrap_or(0)
    }

    /// Prepares every registered object that is still alive, in registration order.
    ///
    /// Returns how many objects were prepared. Failures are logged; the object is not retried.
    pub fn process_init_operations(&self, context: &RenderContext) -> usize {
        self.affinity
            .assert_render_thread("DelayedOperations::process_init_operations");

        let pending = std::mem::take(&mut *self.init.lock().unwrap_or_else(|e| e.into_inner()));
        let mut prepared = 0;
        for object in pending.iter().filter_map(Weak::upgrade) {
            match object.prepare_for_render(context) {
                Ok(()) => prepared += 1,
                Err(e) => log::warn!("DelayedOperations: init operation failed: {e}"),
            }
        }
        prepared
    }

    /// Drains everything at render thread teardown and forgets pending init objects.
    pub fn shutdown(&self, backend: &dyn TextureBackend) -> DrainReport {
        self.init.lock().unwrap_or_else(|e| e.into_inner()).clear();
        let report = self.drain(backend);
        log::info!(
            "DelayedOperations: shutdown drained {} ops ({} failed)",
            report.executed + report.failed,
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{
        FormatTable, NativeTextureDescriptor, RenderSettings, SamplingParameters, TextureFormat,
        TextureKind,
    };
    use crate::renderer::error::TextureError;
    use crate::test_support::MockTextureBackend;
    use crate::math::Extent3D;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn queue() -> DelayedOperations {
        DelayedOperations::new(Arc::new(RenderThreadAffinity::bound_to_current()))
    }

    fn descriptor() -> NativeTextureDescriptor {
        let format = TextureFormat::from_native(crate::renderer::api::NativeFormat::Rgba8Unorm);
        NativeTextureDescriptor {
            label: None,
            kind: TextureKind::D2,
            size: Extent3D::new(4, 4, 1),
            mip_level_count: 1,
            format,
            sampling: SamplingParameters::for_format(&format),
        }
    }

    #[test]
    fn test_drain_preserves_enqueue_order_across_threads() {
        let ops = queue();
        let backend = MockTextureBackend::full();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let producer = ops.clone();
            let log = log.clone();
            // Joined in sequence so the enqueue order is O1, O2, O3.
            thread::spawn(move || {
                producer.release_object(format!("O{n}"), move || {
                    log.lock().unwrap().push(n);
                    Ok(())
                });
            })
            .join()
            .unwrap();
        }

        assert_eq!(ops.pending_count(), 3);
        let report = ops.drain(&backend);
        assert_eq!(report, DrainReport { executed: 3, failed: 0 });
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(ops.pending_count(), 0);
    }

    #[test]
    fn test_failure_does_not_abort_drain() {
        let ops = queue();
        let backend = MockTextureBackend::full();
        let live = backend.create_texture(&descriptor()).unwrap();

        ops.delete_texture(NativeTextureId(999));
        ops.release_object("broken", || Err(ResourceError::InvalidHandle));
        ops.delete_texture(live);

        let report = ops.drain(&backend);
        assert_eq!(report.failed, 2);
        assert_eq!(report.executed, 1);
        assert_eq!(*backend.destroyed.lock().unwrap(), vec![live]);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_null_handle_ignored() {
        let ops = queue();
        ops.delete_texture(NativeTextureId::NULL);
        assert_eq!(ops.pending_count(), 0);
    }

    #[derive(Debug, Default)]
    struct CountingInit {
        calls: AtomicUsize,
        fail: bool,
    }

    impl PrepareForRender for CountingInit {
        fn prepare_for_render(&self, _context: &RenderContext) -> Result<(), TextureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TextureError::invalid("refused"));
            }
            Ok(())
        }
    }

    fn context() -> RenderContext {
        RenderContext::new(
            Arc::new(MockTextureBackend::full()),
            Arc::new(FormatTable::default()),
            RenderSettings::default(),
        )
    }

    #[test]
    fn test_init_operations_dedupe_and_skip_dropped() {
        let ctx = context();
        let ops = ctx.delayed();
        let kept = Arc::new(CountingInit::default());
        let dropped = Arc::new(CountingInit::default());

        let kept_dyn: Arc<dyn PrepareForRender> = kept.clone();
        let dropped_dyn: Arc<dyn PrepareForRender> = dropped;
        ops.add_init(Arc::downgrade(&kept_dyn));
        ops.add_init(Arc::downgrade(&kept_dyn));
        ops.add_init(Arc::downgrade(&dropped_dyn));
        assert_eq!(ops.init_pending_count(), 2);
        drop(dropped_dyn);

        assert_eq!(ops.process_init_operations(&ctx), 1);
        assert_eq!(kept.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ops.init_pending_count(), 0);
        assert_eq!(ops.process_init_operations(&ctx), 0);
    }

    #[test]
    fn test_init_failure_is_logged_and_dropped() {
        let ctx = context();
        let failing: Arc<dyn PrepareForRender> = Arc::new(CountingInit {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        ctx.delayed().add_init(Arc::downgrade(&failing));
        assert_eq!(ctx.delayed().process_init_operations(&ctx), 0);
        assert_eq!(ctx.delayed().init_pending_count(), 0);
    }

    #[test]
    fn test_shutdown_drains_everything() {
        let ops = queue();
        let backend = MockTextureBackend::full();
        let a = backend.create_texture(&descriptor()).unwrap();
        let b = backend.create_texture(&descriptor()).unwrap();
        ops.delete_texture(a);
        ops.delete_texture(b);
        let report = ops.shutdown(&backend);
        assert_eq!(report.executed, 2);
        assert_eq!(*backend.destroyed.lock().unwrap(), vec![a, b]);
    }
}
