// SPDX-License-Identifier: GPL-3.0-only

//! Capture thread driver
//!
//! Frames must reach [`FrameGate::process`] one at a time, in capture order,
//! from a single producer thread. [`CaptureLoopController`] owns that thread:
//! it pulls from a [`FrameSource`] until the source runs dry or a stop is
//! requested, and stops and joins it when dropped.

use crate::frame::Frame;
use crate::gate::{FrameGate, FrameSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Producer of captured frames
pub trait FrameSource: Send {
    /// Next frame in capture order, `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<Frame>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = Frame> + Send,
{
    fn next_frame(&mut self) -> Option<Frame> {
        self.next()
    }
}

/// Returned by a loop iteration to keep going or finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a running capture thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Feed `source` through `gate` into `sink` on a new thread
    pub fn start<S, K>(name: &str, mut source: S, gate: Arc<FrameGate>, mut sink: K) -> Self
    where
        S: FrameSource + 'static,
        K: FrameSink + Send + 'static,
    {
        let loop_name = name.to_string();
        Self::spawn(name, move || match source.next_frame() {
            Some(frame) => {
                let outcome = gate.process(frame, &mut sink);
                trace!(name = %loop_name, ?outcome, "Frame delivered");
                LoopAction::Continue
            }
            None => {
                debug!(name = %loop_name, "Frame source exhausted");
                LoopAction::Stop
            }
        })
    }

    /// Run `loop_fn` repeatedly on a new thread
    ///
    /// The stop signal is checked between iterations, never during one, so
    /// a frame in flight always completes.
    pub fn spawn<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            loop {
                if thread_stop.load(Ordering::SeqCst) {
                    debug!(name = %thread_name, "Stop signal received");
                    break;
                }
                if loop_fn() == LoopAction::Stop {
                    break;
                }
            }
            info!(name = %thread_name, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Shared flag that stops the loop when set (e.g. from a signal handler)
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Ask the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop to finish on its own
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take()
            && let Err(e) = handle.join()
        {
            warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "Capture loop dropped, stopping");
            self.stop();
        }
    }
}
