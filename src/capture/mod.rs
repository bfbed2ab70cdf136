//! Live packet capture.
//!
//! [`PacketCapture`] owns the capture thread. The thread opens the
//! interface through libpcap with a 1000 ms read timeout, decodes each
//! frame, and pushes the result into the shared [`FrameRing`](ring::FrameRing).
//! Consumers never touch pcap; they pop decoded [`PacketInfo`](decoder::PacketInfo)
//! values from the ring.
//!
//! The read timeout doubles as the shutdown poll: the loop re-checks the
//! stop flag after every timeout expiry, so stopping the capture is
//! bounded by one pcap timeout.

pub mod decoder;
pub mod ring;

use crate::capture::ring::FrameRing;
use crate::error::CaptureError;
use crate::logger::{Event, SharedLogger};
use crate::metrics::Metric;
use crate::ShutdownFlag;
use pcap::Capture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Snapshot length passed to libpcap; large enough for full frames.
const SNAPLEN: i32 = 65536;

/// Blocking pcap reads wake at least this often, in milliseconds.
const READ_TIMEOUT_MS: i32 = 1000;

pub struct PacketCapture {
    ring:            Arc<FrameRing>,
    logger:          SharedLogger,
    shutdown:        ShutdownFlag,
    /// Counter metric bumped once per frame the ring refuses.
    dropped_metric:  Option<Arc<Metric>>,
    capturing:       Arc<AtomicBool>,
    packets_captured: Arc<AtomicU64>,
    bytes_captured:  Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    worker:          Option<thread::JoinHandle<()>>,
}

impl PacketCapture {
    pub fn new(
        ring: Arc<FrameRing>,
        logger: SharedLogger,
        shutdown: ShutdownFlag,
        dropped_metric: Option<Arc<Metric>>,
    ) -> PacketCapture {
        PacketCapture {
            ring,
            logger,
            shutdown,
            dropped_metric,
            capturing:        Arc::new(AtomicBool::new(false)),
            packets_captured: Arc::new(AtomicU64::new(0)),
            bytes_captured:   Arc::new(AtomicU64::new(0)),
            decode_failures:  Arc::new(AtomicU64::new(0)),
            worker:           None,
        }
    }

    /// Opens `interface` and spawns the capture thread.
    ///
    /// # Errors
    /// [`CaptureError::AlreadyRunning`] if a capture thread is live, or a
    /// classified open failure. On error the capture subsystem stays
    /// down; metrics and alerting are unaffected.
    pub fn start_capture(&mut self, interface: &str) -> Result<(), CaptureError> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        let cap = Capture::from_device(interface)
            .map_err(|e| classify_open_error(&e))?
            .promisc(true)
            .snaplen(SNAPLEN)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(|e| classify_open_error(&e))?;

        self.capturing.store(true, Ordering::SeqCst);
        self.packets_captured.store(0, Ordering::Relaxed);
        self.bytes_captured.store(0, Ordering::Relaxed);

        self.logger.log(&Event::CaptureStarted { interface });

        let ring = Arc::clone(&self.ring);
        let capturing = Arc::clone(&self.capturing);
        let shutdown = Arc::clone(&self.shutdown);
        let packets = Arc::clone(&self.packets_captured);
        let bytes = Arc::clone(&self.bytes_captured);
        let decode_failures = Arc::clone(&self.decode_failures);
        let dropped_metric = self.dropped_metric.clone();

        self.worker = Some(thread::spawn(move || {
            capture_loop(
                cap,
                ring,
                capturing,
                shutdown,
                packets,
                bytes,
                decode_failures,
                dropped_metric,
            );
        }));

        Ok(())
    }

    /// Requests termination and joins the capture thread.
    ///
    /// Returns within roughly one pcap read timeout.
    pub fn stop_capture(&mut self) {
        if !self.capturing.load(Ordering::SeqCst) {
            return;
        }

        self.capturing.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Relaxed)
    }

    pub fn packets_captured(&self) -> u64 {
        self.packets_captured.load(Ordering::Relaxed)
    }

    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

impl Drop for PacketCapture {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

#[allow(clippy::too_many_arguments)]
fn capture_loop(
    mut cap: Capture<pcap::Active>,
    ring: Arc<FrameRing>,
    capturing: Arc<AtomicBool>,
    shutdown: ShutdownFlag,
    packets: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    dropped_metric: Option<Arc<Metric>>,
) {
    while capturing.load(Ordering::Relaxed) && !shutdown.load(Ordering::Relaxed) {
        let pkt = match cap.next_packet() {
            Ok(pkt) => pkt,
            // Woke up to re-check the stop flags.
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(_) => break,
        };

        let timestamp = pkt.header.ts.tv_sec as u64 * 1_000_000 + pkt.header.ts.tv_usec as u64;
        let decoded = match decoder::decode_frame(pkt.data, pkt.header.len, timestamp) {
            Ok(decoded) => decoded,
            Err(_) => {
                // Malformed or non-IPv4 frames are counted and dropped.
                decode_failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        packets.fetch_add(1, Ordering::Relaxed);
        bytes.fetch_add(u64::from(decoded.wire_len), Ordering::Relaxed);

        if !ring.push(decoded) {
            if let Some(ref metric) = dropped_metric {
                let _ = metric.increment(1.0);
            }
        }
    }

    capturing.store(false, Ordering::SeqCst);
}

/// Maps a pcap open failure onto the capture error taxonomy.
///
/// libpcap reports open failures as free-form text, so classification is
/// by substring, the same way the error buffer is usually inspected.
fn classify_open_error(error: &pcap::Error) -> CaptureError {
    let text = error.to_string();
    let lowered = text.to_lowercase();

    if lowered.contains("permission") || lowered.contains("operation not permitted") {
        CaptureError::PermissionDenied
    } else if lowered.contains("no such device")
        || lowered.contains("exist")
        || lowered.contains("found")
    {
        CaptureError::InterfaceNotFound
    } else {
        CaptureError::SystemError(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, Logger};

    fn test_logger() -> SharedLogger {
        Arc::new(Logger::new(false, None, LogLevel::Error).unwrap())
    }

    #[test]
    fn open_error_classification() {
        let denied = pcap::Error::PcapError("socket: Operation not permitted".to_string());
        assert!(matches!(classify_open_error(&denied), CaptureError::PermissionDenied));

        let missing = pcap::Error::PcapError("No such device exists".to_string());
        assert!(matches!(classify_open_error(&missing), CaptureError::InterfaceNotFound));

        let other = pcap::Error::PcapError("something else broke".to_string());
        assert!(matches!(classify_open_error(&other), CaptureError::SystemError(_)));
    }

    #[test]
    fn start_on_missing_interface_fails_cleanly() {
        let ring = Arc::new(FrameRing::with_capacity(16));
        let shutdown: ShutdownFlag = Arc::new(AtomicBool::new(false));
        let mut capture = PacketCapture::new(ring, test_logger(), shutdown, None);

        let result = capture.start_capture("netsentry-no-such-iface0");
        assert!(result.is_err());
        assert!(!capture.is_capturing());
    }
}
