//! Command seam to the external radio stack.
//!
//! The stream adapter never talks to radio hardware; it issues the narrow
//! command set below and consumes [`LinkEvent`](super::event::LinkEvent)s
//! in return. Platform implementations (vendor SDK bindings, an OS
//! Bluetooth service, or the in-crate simulator) provide the trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::init::{AdvertisingConfig, ConnParamConfig, GapConfig};
use super::state::ConnHandle;

/// Advertising mode requested from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertisingMode {
    /// Fast interval, bounded duration.
    Fast,
}

/// Advertising state as reported back by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertisingState {
    Fast,
    Idle,
}

/// PHY selection for a PHY-update reply. Only automatic selection is
/// used: the stack picks whatever both sides support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhyPreference {
    Auto,
}

/// Reply to a peer's security-parameter request. Pairing is rejected by
/// policy; there is no other answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityReply {
    PairingNotSupported,
}

/// Reason codes passed to [`RadioStack::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Local teardown of a timed-out link.
    RemoteUserTerminated,
    /// Connection-parameter negotiation failed beyond recovery.
    UnacceptableConnParams,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::RemoteUserTerminated => write!(f, "remote user terminated"),
            DisconnectReason::UnacceptableConnParams => write!(f, "unacceptable conn params"),
        }
    }
}

/// Failure of a [`RadioStack::send`] call.
///
/// The first three variants are transient: the chunk was not accepted
/// right now, but waiting for the next send slot and retrying is sound.
/// Anything else aborts the write loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Stack TX buffers are exhausted.
    #[error("send buffers exhausted")]
    Busy,
    /// Link not in a sendable state (e.g. notifications not enabled yet).
    #[error("link not in a sendable state")]
    InvalidState,
    /// The stream attribute is not present on this connection.
    #[error("stream attribute not found")]
    NotFound,
    /// Any other stack failure; not retried.
    #[error("send rejected: {0}")]
    Other(String),
}

impl SendError {
    /// Whether the write loop may wait for the next send slot and retry.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, SendError::Other(_))
    }
}

/// Failure of a non-send radio command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// The stack rejected the command.
    #[error("command rejected: {0}")]
    Rejected(String),
    /// The stack is not running or not reachable.
    #[error("radio stack unavailable")]
    Unavailable,
}

/// Commands the stream adapter issues to the radio stack.
///
/// Ordering expectations: the `init_*`/`enable`/`set_identity` commands
/// are issued once, in the fixed order driven by
/// [`InitSequence`](super::init::InitSequence); the remaining commands
/// may be issued at any time afterwards, from application context
/// (`send`) or from within event dispatch (replies, `disconnect`,
/// `start_advertising`).
pub trait RadioStack: Send + Sync {
    /// Bring the stack up.
    fn enable(&self) -> Result<(), RadioError>;

    /// Publish device name and preferred connection parameters.
    fn set_identity(&self, gap: &GapConfig) -> Result<(), RadioError>;

    /// Start the payload-size (MTU) negotiation module, bounding what
    /// this side will ever offer.
    fn init_payload_negotiation(&self, max_payload_bound: u16) -> Result<(), RadioError>;

    /// Initialize the queued-write module.
    fn init_write_queue(&self) -> Result<(), RadioError>;

    /// Register the byte-stream service attributes.
    fn init_stream_service(&self) -> Result<(), RadioError>;

    /// Configure advertising payload and timing.
    fn init_advertising(&self, adv: &AdvertisingConfig) -> Result<(), RadioError>;

    /// Configure connection-parameter negotiation.
    fn init_conn_params(&self, cfg: &ConnParamConfig) -> Result<(), RadioError>;

    /// Begin advertising in the given mode.
    fn start_advertising(&self, mode: AdvertisingMode) -> Result<(), RadioError>;

    /// Hand one chunk to the stack for transmission. Completion is
    /// signaled asynchronously through
    /// [`LinkEvent::SendReady`](super::event::LinkEvent::SendReady).
    fn send(&self, handle: ConnHandle, chunk: &[u8]) -> Result<(), SendError>;

    /// Tear down the given connection.
    fn disconnect(&self, handle: ConnHandle, reason: DisconnectReason) -> Result<(), RadioError>;

    /// Answer a PHY update request.
    fn reply_phy_update(
        &self,
        handle: ConnHandle,
        tx: PhyPreference,
        rx: PhyPreference,
    ) -> Result<(), RadioError>;

    /// Answer a security-parameter request.
    fn reply_security_params(
        &self,
        handle: ConnHandle,
        reply: SecurityReply,
    ) -> Result<(), RadioError>;

    /// Provide (empty) system attributes for a reconnecting peer.
    fn reply_system_attributes(&self, handle: ConnHandle) -> Result<(), RadioError>;
}
