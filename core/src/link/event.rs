//! Inbound link events and their mapping onto state transitions.
//!
//! The radio stack's callback zoo is flattened into one [`LinkEvent`]
//! enum consumed by a single dispatch function, so the state machine is
//! independent of any particular event-source API shape. Dispatch runs in
//! event context and may interleave with a blocking write at any point;
//! every effect below is either an atomic store or a command issued back
//! to the stack.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::radio::{
    AdvertisingMode, AdvertisingState, DisconnectReason, PhyPreference, RadioError, RadioStack,
    SecurityReply,
};
use super::state::{ConnHandle, LinkContext, ATT_PAYLOAD_OVERHEAD};

/// Notifications delivered by the radio stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkEvent {
    /// A central connected.
    Connected { handle: ConnHandle },
    /// The link dropped.
    Disconnected { handle: ConnHandle },
    /// ATT MTU exchange completed for the given connection.
    MtuUpdated { handle: ConnHandle, att_mtu: u16 },
    /// Inbound stream payload.
    DataReceived { data: Vec<u8> },
    /// A transmit slot was freed; the in-flight chunk is on the air.
    SendReady,
    /// Peer asked to change PHY.
    PhyUpdateRequested { handle: ConnHandle },
    /// Peer asked to pair.
    SecurityParamsRequested { handle: ConnHandle },
    /// Peer reconnected expecting stored system attributes.
    SystemAttributesMissing { handle: ConnHandle },
    /// Protocol client timed out.
    ClientTimeout { handle: ConnHandle },
    /// Protocol server timed out.
    ServerTimeout { handle: ConnHandle },
    /// Advertising switched state.
    AdvertisingChanged(AdvertisingState),
    /// Connection-parameter negotiation gave up.
    ConnParamsNegotiationFailed { handle: ConnHandle },
    /// A stack module reported an unrecoverable error.
    StackFault { source: FaultSource, code: u32 },
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connected { handle } => write!(f, "Connected {{ handle: {handle:#06x} }}"),
            LinkEvent::Disconnected { handle } => {
                write!(f, "Disconnected {{ handle: {handle:#06x} }}")
            }
            LinkEvent::MtuUpdated { handle, att_mtu } => {
                write!(f, "MtuUpdated {{ handle: {handle:#06x}, att_mtu: {att_mtu} }}")
            }
            LinkEvent::DataReceived { data } => {
                write!(f, "DataReceived {{ len: {} }}", data.len())
            }
            LinkEvent::SendReady => write!(f, "SendReady"),
            LinkEvent::PhyUpdateRequested { handle } => {
                write!(f, "PhyUpdateRequested {{ handle: {handle:#06x} }}")
            }
            LinkEvent::SecurityParamsRequested { handle } => {
                write!(f, "SecurityParamsRequested {{ handle: {handle:#06x} }}")
            }
            LinkEvent::SystemAttributesMissing { handle } => {
                write!(f, "SystemAttributesMissing {{ handle: {handle:#06x} }}")
            }
            LinkEvent::ClientTimeout { handle } => {
                write!(f, "ClientTimeout {{ handle: {handle:#06x} }}")
            }
            LinkEvent::ServerTimeout { handle } => {
                write!(f, "ServerTimeout {{ handle: {handle:#06x} }}")
            }
            LinkEvent::AdvertisingChanged(state) => {
                write!(f, "AdvertisingChanged {{ state: {state:?} }}")
            }
            LinkEvent::ConnParamsNegotiationFailed { handle } => {
                write!(f, "ConnParamsNegotiationFailed {{ handle: {handle:#06x} }}")
            }
            LinkEvent::StackFault { source, code } => {
                write!(f, "StackFault {{ source: {source:?}, code: {code} }}")
            }
        }
    }
}

/// Stack module a fault originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultSource {
    /// Queued-write module error handler.
    WriteQueue,
    /// Connection-parameter module error handler.
    ConnParams,
}

/// An unrecoverable failure escalated out of the event path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A numeric error surfaced by a stack module's error handler.
    Vendor { source: FaultSource, code: u32 },
    /// A reply or control command issued during dispatch was rejected.
    Control { error: RadioError },
}

/// Receiver for unrecoverable stack failures.
///
/// The stream recovers buffering and send-path errors locally; anything
/// reaching this trait is beyond local recovery. The default
/// implementation only logs — halting or resetting is an integrator
/// decision, not a library one.
pub trait FaultHandler: Send + Sync {
    fn on_fault(&self, fault: Fault);
}

/// Default fault handler: log at error level and carry on.
pub struct LogFaults;

impl FaultHandler for LogFaults {
    fn on_fault(&self, fault: Fault) {
        error!(?fault, "unrecoverable radio stack fault");
    }
}

/// Link up/down indicator hook (status LED on the original hardware).
pub trait Indicator: Send + Sync {
    fn link_up(&self) {}
    fn link_down(&self) {}
}

/// Indicator that does nothing.
pub struct NullIndicator;

impl Indicator for NullIndicator {}

/// Maps [`LinkEvent`]s onto context mutations and reply commands.
pub struct EventDispatcher<R: RadioStack> {
    ctx: Arc<LinkContext>,
    radio: Arc<R>,
    indicator: Box<dyn Indicator>,
    faults: Box<dyn FaultHandler>,
}

impl<R: RadioStack> EventDispatcher<R> {
    pub fn new(ctx: Arc<LinkContext>, radio: Arc<R>) -> Self {
        Self {
            ctx,
            radio,
            indicator: Box::new(NullIndicator),
            faults: Box::new(LogFaults),
        }
    }

    pub fn set_indicator(&mut self, indicator: Box<dyn Indicator>) {
        self.indicator = indicator;
    }

    pub fn set_fault_handler(&mut self, faults: Box<dyn FaultHandler>) {
        self.faults = faults;
    }

    /// Entry point for event context.
    pub fn dispatch(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { handle } => {
                info!(handle, "link connected");
                self.ctx.status.on_connected(handle);
                self.indicator.link_up();
            }

            LinkEvent::Disconnected { handle } => {
                info!(handle, "link disconnected");
                self.ctx.status.on_disconnected();
                self.indicator.link_down();
            }

            LinkEvent::MtuUpdated { handle, att_mtu } => {
                // Stale handles can show up around a reconnect; only the
                // active connection may move the ceiling.
                if self.ctx.status.handle() == Some(handle) {
                    let payload = att_mtu.saturating_sub(ATT_PAYLOAD_OVERHEAD) as usize;
                    self.ctx.status.raise_max_payload(payload);
                    debug!(att_mtu, payload, "payload ceiling updated");
                }
            }

            LinkEvent::DataReceived { data } => {
                if !self.ctx.push_rx(&data) {
                    warn!(len = data.len(), "rx ring full, inbound payload dropped");
                }
            }

            LinkEvent::SendReady => {
                self.ctx.mark_send_ready();
            }

            LinkEvent::PhyUpdateRequested { handle } => {
                debug!(handle, "phy update requested");
                self.control(self.radio.reply_phy_update(
                    handle,
                    PhyPreference::Auto,
                    PhyPreference::Auto,
                ));
            }

            LinkEvent::SecurityParamsRequested { handle } => {
                self.control(
                    self.radio
                        .reply_security_params(handle, SecurityReply::PairingNotSupported),
                );
            }

            LinkEvent::SystemAttributesMissing { handle } => {
                self.control(self.radio.reply_system_attributes(handle));
            }

            LinkEvent::ClientTimeout { handle } | LinkEvent::ServerTimeout { handle } => {
                info!(handle, "protocol timeout, dropping link");
                self.control(
                    self.radio
                        .disconnect(handle, DisconnectReason::RemoteUserTerminated),
                );
            }

            LinkEvent::AdvertisingChanged(AdvertisingState::Fast) => {}

            LinkEvent::AdvertisingChanged(AdvertisingState::Idle) => {
                // Never park in a silent state; resume fast advertising.
                self.control(self.radio.start_advertising(AdvertisingMode::Fast));
            }

            LinkEvent::ConnParamsNegotiationFailed { handle } => {
                self.control(
                    self.radio
                        .disconnect(handle, DisconnectReason::UnacceptableConnParams),
                );
            }

            LinkEvent::StackFault { source, code } => {
                self.faults.on_fault(Fault::Vendor { source, code });
            }
        }
    }

    fn control(&self, result: Result<(), RadioError>) {
        if let Err(error) = result {
            error!(%error, "control command failed during dispatch");
            self.faults.on_fault(Fault::Control { error });
        }
    }
}
