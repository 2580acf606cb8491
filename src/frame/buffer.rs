// SPDX-License-Identifier: GPL-3.0-only

//! Externally reference-counted pixel buffers
//!
//! Capture subsystems hand out buffers they own and recycle. Anything that
//! reads pixel data past the capture callback must take a reference first
//! and give it back exactly once. [`BufferGuard`] makes that pairing
//! structural: the release happens in `Drop`, so early returns and panics
//! unwinding through the gate cannot leak a reference.

use crate::errors::BufferError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

/// Pixel storage owned by the capture subsystem
///
/// Implementations wrap whatever native buffer the capturer produces. The
/// pipeline never frees the memory; it only brackets its reads with
/// [`retain`](NativeBuffer::retain) and [`release`](NativeBuffer::release).
pub trait NativeBuffer: Send + Sync {
    /// Raw bytes of all planes
    fn data(&self) -> &[u8];

    /// Take an additional reference
    fn retain(&self) -> Result<(), BufferError>;

    /// Drop a reference taken with `retain`
    fn release(&self) -> Result<(), BufferError>;

    /// Whether the owner still holds the buffer (pixel data is readable)
    fn is_valid(&self) -> bool;
}

/// In-process reference-counted buffer
///
/// Starts with one reference held by its creator (the "capturer"). Used for
/// frames the pipeline produces itself (blurred output) and for frames read
/// from files.
pub struct SharedBuffer {
    data: Arc<[u8]>,
    refs: AtomicUsize,
}

impl SharedBuffer {
    /// Wrap bytes in a buffer holding a single owner reference
    pub fn new(data: impl Into<Arc<[u8]>>) -> Arc<Self> {
        Arc::new(Self {
            data: data.into(),
            refs: AtomicUsize::new(1),
        })
    }

    /// Current number of outstanding references
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

impl NativeBuffer for SharedBuffer {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn retain(&self) -> Result<(), BufferError> {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| {
                (refs > 0).then_some(refs + 1)
            })
            .map(|_| ())
            .map_err(|_| BufferError::AlreadyReleased)
    }

    fn release(&self) -> Result<(), BufferError> {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_sub(1))
            .map(|_| ())
            .map_err(|_| BufferError::ReleaseUnderflow)
    }

    fn is_valid(&self) -> bool {
        self.ref_count() > 0
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SharedBuffer({} bytes, {} refs)",
            self.data.len(),
            self.ref_count()
        )
    }
}

/// Scoped reference on a [`NativeBuffer`]
///
/// Created by [`BufferGuard::acquire`]; releases on [`finish`](Self::finish)
/// or on drop, whichever comes first, and never twice.
pub struct BufferGuard<'a> {
    buffer: &'a dyn NativeBuffer,
    released: bool,
}

impl<'a> BufferGuard<'a> {
    /// Retain `buffer` for the lifetime of the guard
    ///
    /// When the retain outcome is uncertain a matching release is attempted
    /// before the error is returned, so the owner's count can't drift upward.
    pub fn acquire(buffer: &'a dyn NativeBuffer) -> Result<Self, BufferError> {
        match buffer.retain() {
            Ok(()) => {
                trace!("Buffer retained");
                Ok(Self {
                    buffer,
                    released: false,
                })
            }
            Err(BufferError::RetainUncertain(msg)) => {
                if let Err(e) = buffer.release() {
                    trace!(error = %e, "Compensating release after uncertain retain failed");
                }
                Err(BufferError::RetainUncertain(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Borrow the retained pixel data
    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    /// Release now and report the outcome
    pub fn finish(mut self) -> Result<(), BufferError> {
        self.released = true;
        self.buffer.release()
    }
}

impl Drop for BufferGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = self.buffer.release() {
                warn!(error = %e, "Buffer release on unwind failed");
            }
        }
    }
}
