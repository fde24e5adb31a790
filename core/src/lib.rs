//! blestream-core — blocking byte stream over an event-driven radio link.
//!
//! The radio stack owns the protocol: connections, advertising, payload
//! negotiation, attribute tables. This crate owns the awkward part in
//! between — turning that asynchronous, MTU-limited, connection-state-
//! dependent machinery into a serial port:
//!
//! ```no_run
//! use std::sync::Arc;
//! use blestream_core::{BleStream, LinkConfig, LinkEvent};
//! use blestream_core::sim::SimRadio;
//!
//! let stream = Arc::new(BleStream::new(SimRadio::new(), LinkConfig::default()));
//! assert!(stream.init());
//!
//! // Event context (radio callbacks, an interrupt shim, a test):
//! stream.handle_event(LinkEvent::Connected { handle: 1 });
//!
//! // Application context:
//! if stream.is_connected() {
//!     stream.write(b"hello");
//! }
//! while stream.available() > 0 {
//!     let _byte = stream.read_byte();
//! }
//! ```
//!
//! Inbound bytes land in a fixed ring buffer (oversized payloads are
//! dropped whole and flagged, never partially buffered); outbound writes
//! block per chunk on the stack's send-slot signal, bounded so a dead
//! link cannot hang the caller. Nothing is buffered across a disconnect:
//! `write` on a downed link is a no-op returning 0.

pub mod link;
pub mod sim;

pub use link::{
    AdvertisingConfig, BleStream, Clock, ConfigError, ConnParamConfig, Fault, FaultHandler,
    FaultSource, GapConfig, Indicator, LinkConfig, LinkEvent, RadioError, RadioStack, SendError,
    SystemClock,
};
