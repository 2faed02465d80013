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

//! Video decode worker with frame-request coalescing.
//!
//! The consumer asks for frames with [`VideoDecodeThread::request_frame`] and picks up the
//! result with [`VideoDecodeThread::wait_decoded`] or [`VideoDecodeThread::take_decoded`].
//! A decode in flight always runs to completion. Requests arriving meanwhile collapse into a
//! single pending "next" frame, the most recent one winning.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use kiln_core::renderer::PixelBuffer;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors surfaced by the decode worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VideoDecodeError {
    /// The decoder failed on a frame.
    #[error("failed to decode frame {frame}: {reason}")]
    Decode {
        /// The frame being decoded.
        frame: u64,
        /// Decoder-provided description.
        reason: String,
    },
    /// The worker thread could not be spawned.
    #[error("failed to spawn the decode thread: {0}")]
    Spawn(String),
    /// The worker has been stopped.
    #[error("the decode thread is stopped")]
    Stopped,
    /// The worker panicked.
    #[error("the decode thread panicked")]
    WorkerPanicked,
    /// A lock guarding the shared state was poisoned.
    #[error("decode state lock poisoned")]
    Poisoned,
}

/// Produces pixel buffers for video frames. Runs on the decode thread.
pub trait FrameDecoder: Send + 'static {
    /// Decodes `frame`.
    fn decode_frame(&mut self, frame: u64) -> Result<PixelBuffer, VideoDecodeError>;
}

/// A decoded frame handed to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Index of the decoded frame.
    pub frame: u64,
    /// The decoded pixels.
    pub pixels: PixelBuffer,
}

#[derive(Debug, Default)]
struct DecodeState {
    current_frame: Option<u64>,
    next_frame: Option<u64>,
    decoding: bool,
    has_decoded: bool,
    decoded: Option<Result<DecodedFrame, VideoDecodeError>>,
    stopping: bool,
}

impl DecodeState {
    fn idle(&self) -> bool {
        !self.decoding && self.next_frame.is_none()
    }
}

struct Shared {
    state: Mutex<DecodeState>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, DecodeState>, VideoDecodeError> {
        self.state.lock().map_err(|_| VideoDecodeError::Poisoned)
    }
}

/// Owns the decode thread and its handoff state.
///
/// Both semaphores are bounded channels of capacity one: a pending token means "signalled".
pub struct VideoDecodeThread {
    shared: Arc<Shared>,
    go_decode: Sender<()>,
    decode_finished: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for VideoDecodeThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecodeThread")
            .field("running", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl VideoDecodeThread {
    /// Spawns the worker around `decoder`.
    pub fn spawn<D: FrameDecoder>(decoder: D) -> Result<Self, VideoDecodeError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(DecodeState::default()),
        });
        let (go_tx, go_rx) = crossbeam_channel::bounded(1);
        let (finished_tx, finished_rx) = crossbeam_channel::bounded(1);

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("kiln-video-decode".to_string())
            .spawn(move || run_worker(decoder, worker_shared, go_rx, finished_tx))
            .map_err(|e| VideoDecodeError::Spawn(e.to_string()))?;

        Ok(Self {
            shared,
            go_decode: go_tx,
            decode_finished: finished_rx,
            handle: Some(handle),
        })
    }

    /// Asks for `frame` to be decoded.
    ///
    /// ## Returns
    ///
    /// `false` when the request was coalesced with the frame already decoding or pending.
    pub fn request_frame(&self, frame: u64) -> Result<bool, VideoDecodeError> {
        let mut state = self.shared.lock()?;
        if state.stopping {
            return Err(VideoDecodeError::Stopped);
        }
        if (state.decoding && state.current_frame == Some(frame))
            || state.next_frame == Some(frame)
        {
            log::trace!("VideoDecodeThread: frame {} already in flight", frame);
            return Ok(false);
        }
        if let Some(dropped) = state.next_frame.replace(frame) {
            log::trace!("VideoDecodeThread: frame {} superseded by {}", dropped, frame);
        }
        let wake = !state.decoding;
        drop(state);

        if wake {
            signal(&self.go_decode);
        }
        Ok(true)
    }

    /// `true` while a decode runs or a request is pending.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().map(|s| !s.idle()).unwrap_or(false)
    }

    /// `true` when a decoded frame is waiting to be taken.
    pub fn has_decoded(&self) -> bool {
        self.shared.lock().map(|s| s.has_decoded).unwrap_or(false)
    }

    /// Takes the decoded frame without blocking.
    pub fn take_decoded(&self) -> Result<Option<DecodedFrame>, VideoDecodeError> {
        let mut state = self.shared.lock()?;
        state.has_decoded = false;
        state.decoded.take().transpose()
    }

    /// Blocks until every requested decode has finished, then takes the result.
    ///
    /// ## Errors
    ///
    /// The decoder's error when the last decode failed, or [`VideoDecodeError::Stopped`] when
    /// the worker exits while work is outstanding.
    pub fn wait_decoded(&self) -> Result<Option<DecodedFrame>, VideoDecodeError> {
        loop {
            {
                let mut state = self.shared.lock()?;
                if state.idle() {
                    state.has_decoded = false;
                    return state.decoded.take().transpose();
                }
            }
            self.decode_finished
                .recv()
                .map_err(|_| VideoDecodeError::Stopped)?;
        }
    }

    /// Stops the worker after the in-flight decode and joins it.
    pub fn stop(&mut self) -> Result<(), VideoDecodeError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if let Ok(mut state) = self.shared.lock() {
            state.stopping = true;
            state.next_frame = None;
        }
        signal(&self.go_decode);
        handle.join().map_err(|_| VideoDecodeError::WorkerPanicked)?;
        log::debug!("VideoDecodeThread: stopped");
        Ok(())
    }
}

impl Drop for VideoDecodeThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("VideoDecodeThread: {}", e);
        }
    }
}

fn signal(semaphore: &Sender<()>) {
    // A full channel already carries the signal.
    if let Err(TrySendError::Disconnected(())) = semaphore.try_send(()) {
        log::debug!("VideoDecodeThread: signal after worker exit");
    }
}

fn run_worker<D: FrameDecoder>(
    mut decoder: D,
    shared: Arc<Shared>,
    go_decode: Receiver<()>,
    decode_finished: Sender<()>,
) {
    while go_decode.recv().is_ok() {
        loop {
            let frame = {
                let Ok(mut state) = shared.lock() else {
                    return;
                };
                if state.stopping {
                    return;
                }
                let Some(frame) = state.next_frame.take() else {
                    break;
                };
                state.current_frame = Some(frame);
                state.decoding = true;
                frame
            };

            let result = decoder.decode_frame(frame);
            if let Err(e) = &result {
                log::error!("VideoDecodeThread: {}", e);
            }

            let Ok(mut state) = shared.lock() else {
                return;
            };
            state.decoding = false;
            state.has_decoded = result.is_ok();
            state.decoded = Some(result.map(|pixels| DecodedFrame { frame, pixels }));
            drop(state);
            signal(&decode_finished);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::renderer::PixelFormat;
    use std::time::Duration;

    /// Decoder that announces each start and waits for the test to release it.
    struct GatedDecoder {
        started: Sender<u64>,
        gate: Receiver<()>,
    }

    impl FrameDecoder for GatedDecoder {
        fn decode_frame(&mut self, frame: u64) -> Result<PixelBuffer, VideoDecodeError> {
            let _ = self.started.send(frame);
            self.gate.recv().map_err(|_| VideoDecodeError::Stopped)?;
            if frame == 13 {
                return Err(VideoDecodeError::Decode {
                    frame,
                    reason: "corrupt".to_string(),
                });
            }
            let mut pixels = PixelBuffer::new(PixelFormat::Byte1, 1, 1, 1).unwrap();
            pixels.bytes_mut()[0] = frame as u8;
            Ok(pixels)
        }
    }

    fn gated() -> (VideoDecodeThread, Receiver<u64>, Sender<()>) {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let thread = VideoDecodeThread::spawn(GatedDecoder {
            started: started_tx,
            gate: gate_rx,
        })
        .unwrap();
        (thread, started_rx, gate_tx)
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_same_frame_while_decoding_is_coalesced() {
        let (mut thread, started, gate) = gated();
        assert!(thread.request_frame(7).unwrap());
        assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 7);

        assert!(!thread.request_frame(7).unwrap());
        gate.send(()).unwrap();
        let decoded = thread.wait_decoded().unwrap().unwrap();
        assert_eq!(decoded.frame, 7);
        assert!(started.try_recv().is_err());
        thread.stop().unwrap();
    }

    #[test]
    fn test_latest_request_wins_after_in_flight_decode() {
        let (mut thread, started, gate) = gated();
        thread.request_frame(1).unwrap();
        assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 1);

        assert!(thread.request_frame(2).unwrap());
        assert!(thread.request_frame(3).unwrap());
        assert!(thread.is_busy());

        gate.send(()).unwrap();
        assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 3);
        gate.send(()).unwrap();

        let decoded = thread.wait_decoded().unwrap().unwrap();
        assert_eq!(decoded.frame, 3);
        assert_eq!(decoded.pixels.bytes()[0], 3);
        assert!(started.try_recv().is_err());
        assert!(!thread.is_busy());
        thread.stop().unwrap();
    }

    #[test]
    fn test_take_decoded_is_non_blocking() {
        let (mut thread, started, gate) = gated();
        assert_eq!(thread.take_decoded().unwrap(), None);
        thread.request_frame(4).unwrap();
        started.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(thread.take_decoded().unwrap(), None);

        gate.send(()).unwrap();
        thread.wait_decoded().unwrap();
        assert!(!thread.has_decoded());
        assert_eq!(thread.take_decoded().unwrap(), None);
        thread.stop().unwrap();
    }

    #[test]
    fn test_decode_failure_surfaces_to_consumer() {
        let (mut thread, _started, gate) = gated();
        thread.request_frame(13).unwrap();
        gate.send(()).unwrap();
        assert!(matches!(
            thread.wait_decoded(),
            Err(VideoDecodeError::Decode { frame: 13, .. })
        ));
        thread.stop().unwrap();
    }

    #[test]
    fn test_stop_rejects_new_requests() {
        let (mut thread, _started, _gate) = gated();
        thread.stop().unwrap();
        thread.stop().unwrap();
        assert_eq!(thread.request_frame(1), Err(VideoDecodeError::Stopped));
    }
}
