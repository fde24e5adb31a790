//! Byte-stream adapter over a connection-oriented radio link.
//!
//! The pieces, leaves first:
//!
//! - **ring**: fixed-capacity circular byte buffer backing the RX path
//! - **state**: connection status atomics and the shared link context
//! - **clock**: injectable monotonic time source for send deadlines
//! - **radio**: the command seam to the external radio stack
//! - **event**: inbound event enum and the dispatch function
//! - **writer**: blocking, MTU-chunked outbound path
//! - **init**: configuration and the ordered, fail-fast bring-up
//! - **stream**: the public serial-port-like surface
//!
//! Everything protocol-shaped (advertising encodings, attribute tables,
//! pairing) lives on the other side of the [`radio::RadioStack`] trait;
//! this module only bridges that event-driven world into a blocking
//! stream API.

pub mod clock;
pub mod event;
pub mod init;
pub mod radio;
pub mod ring;
pub mod state;
pub mod stream;
pub mod writer;

pub use clock::{Clock, SystemClock};
pub use event::{
    EventDispatcher, Fault, FaultHandler, FaultSource, Indicator, LinkEvent, LogFaults,
    NullIndicator,
};
pub use init::{
    AdvertisingConfig, ConfigError, ConnParamConfig, GapConfig, InitSequence, LinkConfig,
    DEFAULT_MAX_PAYLOAD_BOUND, DEFAULT_RX_CAPACITY, DEFAULT_SEND_TIMEOUT_MS, STREAM_SERVICE_UUID,
};
pub use radio::{
    AdvertisingMode, AdvertisingState, DisconnectReason, PhyPreference, RadioError, RadioStack,
    SecurityReply, SendError,
};
pub use ring::RingBuffer;
pub use state::{
    ConnHandle, LinkContext, LinkStatus, ATT_MTU_DEFAULT, ATT_PAYLOAD_OVERHEAD,
    DEFAULT_MAX_PAYLOAD, INVALID_HANDLE,
};
pub use stream::BleStream;
pub use writer::ChunkedWriter;
