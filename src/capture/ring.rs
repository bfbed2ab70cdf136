//! Bounded frame ring between the capture thread and the workers.
//!
//! Built on a crossbeam bounded channel, which gives MPMC semantics and a
//! blocking timed pop without a hand-rolled queue. When the ring is full
//! the producer drops the incoming frame and counts it; the capture path
//! never blocks behind slow consumers.

use crate::capture::decoder::PacketInfo;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Minimum ring capacity used by the agent.
pub const DEFAULT_RING_CAPACITY: usize = 1024;

pub struct FrameRing {
    tx:      Sender<PacketInfo>,
    rx:      Receiver<PacketInfo>,
    dropped: AtomicU64,
}

impl FrameRing {
    pub fn with_capacity(capacity: usize) -> FrameRing {
        let (tx, rx) = bounded(capacity);
        FrameRing { tx, rx, dropped: AtomicU64::new(0) }
    }

    /// Offers a frame to the ring.
    ///
    /// Returns `false` and counts the frame as dropped when the ring is
    /// full; the newest frame loses, existing queued frames are kept.
    pub fn push(&self, packet: PacketInfo) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Waits up to `timeout` for a frame.
    ///
    /// The timeout keeps consumers responsive to the shutdown flag; a
    /// `None` result means only that nothing arrived within the window.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<PacketInfo> {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => Some(packet),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Non-blocking pop, used when draining after shutdown.
    pub fn try_pop(&self) -> Option<PacketInfo> {
        self.rx.try_recv().ok()
    }

    /// Number of frames dropped because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
