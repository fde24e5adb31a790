//! Connection state and the shared link context.
//!
//! Link state is mutated from event context and read from application
//! context, including in the middle of a blocking write. Every shared
//! field is a machine-word atomic so readers may observe a stale value
//! but never a torn one; the RX ring, the only multi-byte structure the
//! two contexts share, sits behind a mutex.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::ring::RingBuffer;

/// Connection handle assigned by the radio stack.
pub type ConnHandle = u16;

/// Sentinel for "no active connection".
pub const INVALID_HANDLE: ConnHandle = 0xFFFF;

/// Default ATT MTU every link starts from, per the protocol minimum.
pub const ATT_MTU_DEFAULT: u16 = 23;

/// ATT notification overhead: one opcode byte plus a two-byte handle.
pub const ATT_PAYLOAD_OVERHEAD: u16 = 3;

/// Largest notification payload before any MTU exchange has happened.
pub const DEFAULT_MAX_PAYLOAD: usize = (ATT_MTU_DEFAULT - ATT_PAYLOAD_OVERHEAD) as usize;

/// Live connection state: up/down, handle, negotiated payload ceiling.
///
/// The handle is `INVALID_HANDLE` exactly while disconnected; the payload
/// ceiling starts at [`DEFAULT_MAX_PAYLOAD`], only grows within one
/// connection (MTU exchanges never shrink it), and reverts to the default
/// when a new connection is established.
pub struct LinkStatus {
    connected: AtomicBool,
    handle: AtomicU16,
    max_payload: AtomicUsize,
}

impl LinkStatus {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            handle: AtomicU16::new(INVALID_HANDLE),
            max_payload: AtomicUsize::new(DEFAULT_MAX_PAYLOAD),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Handle of the active connection, `None` while disconnected.
    pub fn handle(&self) -> Option<ConnHandle> {
        if !self.is_connected() {
            return None;
        }
        match self.handle.load(Ordering::Acquire) {
            INVALID_HANDLE => None,
            handle => Some(handle),
        }
    }

    /// Current negotiated payload ceiling in bytes.
    pub fn max_payload(&self) -> usize {
        self.max_payload.load(Ordering::Acquire)
    }

    /// Link came up. Handle is published before the connected flag so a
    /// reader that observes `connected` also observes a valid handle.
    pub fn on_connected(&self, handle: ConnHandle) {
        self.handle.store(handle, Ordering::Release);
        self.max_payload
            .store(DEFAULT_MAX_PAYLOAD, Ordering::Release);
        self.connected.store(true, Ordering::Release);
    }

    /// Link went down. Flag first, handle second, for the same reason.
    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.handle.store(INVALID_HANDLE, Ordering::Release);
    }

    /// Raise the payload ceiling after an MTU exchange. Never lowers it.
    pub fn raise_max_payload(&self, payload: usize) {
        self.max_payload.fetch_max(payload, Ordering::AcqRel);
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared context owning everything both contexts touch: connection
/// status, the RX ring, the send-readiness flag the write path polls, and
/// the sticky RX-overflow diagnostic.
///
/// One instance per link, created at stream construction and shared via
/// `Arc` between the event dispatcher and the write scheduler.
pub struct LinkContext {
    pub status: LinkStatus,
    rx: Mutex<RingBuffer>,
    ready_to_send: AtomicBool,
    rx_overflow: AtomicBool,
}

impl LinkContext {
    pub fn new(rx_capacity: usize) -> Self {
        Self {
            status: LinkStatus::new(),
            rx: Mutex::new(RingBuffer::new(rx_capacity)),
            ready_to_send: AtomicBool::new(false),
            rx_overflow: AtomicBool::new(false),
        }
    }

    /// Buffer an inbound payload. On overflow the payload is dropped
    /// whole, the sticky overflow flag is raised, and `false` is
    /// returned; ring content is unchanged.
    pub fn push_rx(&self, data: &[u8]) -> bool {
        let accepted = self.rx.lock().write(data);
        if !accepted {
            self.rx_overflow.store(true, Ordering::Release);
        }
        accepted
    }

    pub fn rx_available(&self) -> usize {
        self.rx.lock().available()
    }

    pub fn rx_read(&self, out: &mut [u8]) -> usize {
        self.rx.lock().read(out)
    }

    pub fn rx_read_byte(&self) -> Option<u8> {
        self.rx.lock().read_byte()
    }

    pub fn rx_flush(&self) {
        self.rx.lock().flush();
    }

    /// Sticky: set on the first dropped payload, never auto-cleared.
    pub fn rx_overflowed(&self) -> bool {
        self.rx_overflow.load(Ordering::Acquire)
    }

    pub fn clear_send_ready(&self) {
        self.ready_to_send.store(false, Ordering::Release);
    }

    pub fn mark_send_ready(&self) {
        self.ready_to_send.store(true, Ordering::Release);
    }

    pub fn send_ready(&self) -> bool {
        self.ready_to_send.load(Ordering::Acquire)
    }
}
