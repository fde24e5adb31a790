//! The public byte-stream surface.
//!
//! [`BleStream`] wires the shared context, the event dispatcher, and the
//! chunked writer behind the blocking serial-port-like API: `init`,
//! `available`, `read`, `write`, `flush`. Every method takes `&self`;
//! wrap the stream in an `Arc` and hand a clone to whatever delivers
//! radio events, then call [`BleStream::handle_event`] from there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::clock::{Clock, SystemClock};
use super::event::{EventDispatcher, FaultHandler, Indicator, LinkEvent};
use super::init::{InitSequence, LinkConfig};
use super::radio::RadioStack;
use super::state::LinkContext;
use super::writer::ChunkedWriter;

/// Blocking byte stream over a radio link.
///
/// Reads drain the RX ring filled from event context; writes block per
/// chunk on the stack's send-slot signal. Data written while the link is
/// down is not buffered: `write` degrades to a no-op returning 0.
pub struct BleStream<R: RadioStack, C: Clock = SystemClock> {
    ctx: Arc<LinkContext>,
    radio: Arc<R>,
    dispatcher: EventDispatcher<R>,
    writer: ChunkedWriter<R, C>,
    config: LinkConfig,
    initialized: AtomicBool,
}

impl<R: RadioStack> BleStream<R> {
    /// Create a stream over `radio` using real time for send deadlines.
    ///
    /// # Panics
    ///
    /// Panics if `config.rx_capacity` is zero; `LinkConfig::validate`
    /// catches this ahead of time.
    pub fn new(radio: R, config: LinkConfig) -> Self {
        Self::with_clock(radio, config, SystemClock::new())
    }
}

impl<R: RadioStack, C: Clock> BleStream<R, C> {
    /// Same as [`BleStream::new`] with an explicit time source.
    pub fn with_clock(radio: R, config: LinkConfig, clock: C) -> Self {
        let ctx = Arc::new(LinkContext::new(config.rx_capacity));
        let radio = Arc::new(radio);
        let dispatcher = EventDispatcher::new(ctx.clone(), radio.clone());
        let writer = ChunkedWriter::new(ctx.clone(), radio.clone(), clock, config.send_timeout_ms);
        Self {
            ctx,
            radio,
            dispatcher,
            writer,
            config,
            initialized: AtomicBool::new(false),
        }
    }

    /// Install a link up/down indicator. Call before sharing the stream.
    pub fn with_indicator(mut self, indicator: Box<dyn Indicator>) -> Self {
        self.dispatcher.set_indicator(indicator);
        self
    }

    /// Install a fault handler. Call before sharing the stream.
    pub fn with_fault_handler(mut self, faults: Box<dyn FaultHandler>) -> Self {
        self.dispatcher.set_fault_handler(faults);
        self
    }

    /// Run the radio bring-up sequence. Returns `true` only when every
    /// step succeeded; on failure the stream stays unusable and `init`
    /// may be retried.
    pub fn init(&self) -> bool {
        if let Err(error) = self.config.validate() {
            warn!(%error, "invalid link configuration");
            return false;
        }

        let mut sequence = InitSequence::new(self.radio.as_ref(), &self.config);
        let ok = sequence.run();
        if !ok {
            warn!(error = ?sequence.last_error(), "radio bring-up failed");
        }
        self.initialized.store(ok, Ordering::Release);
        ok
    }

    /// Whether a previous [`BleStream::init`] completed successfully.
    pub fn is_init(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether a central is currently connected.
    pub fn is_connected(&self) -> bool {
        self.ctx.status.is_connected()
    }

    /// Number of received bytes waiting to be read.
    pub fn available(&self) -> usize {
        self.ctx.rx_available()
    }

    /// Discard all buffered received bytes.
    pub fn flush(&self) -> bool {
        self.ctx.rx_flush();
        true
    }

    /// Pop the oldest received byte, or `0` when nothing is buffered.
    /// Check [`BleStream::available`] first to tell a real `0` apart.
    pub fn read_byte(&self) -> u8 {
        self.ctx.rx_read_byte().unwrap_or(0)
    }

    /// Drain up to `out.len()` received bytes; returns how many.
    pub fn read(&self, out: &mut [u8]) -> usize {
        self.ctx.rx_read(out)
    }

    /// Send `data` over the link, blocking per chunk. Returns the number
    /// of bytes confirmed sent; `0` when disconnected.
    pub fn write(&self, data: &[u8]) -> usize {
        self.writer.write(data)
    }

    /// Deliver a radio event. This is the entry point for event context
    /// and may run concurrently with any of the methods above.
    pub fn handle_event(&self, event: LinkEvent) {
        self.dispatcher.dispatch(event);
    }

    /// Sticky diagnostic: whether any inbound payload has ever been
    /// dropped because the RX ring was full.
    pub fn rx_overflowed(&self) -> bool {
        self.ctx.rx_overflowed()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}
