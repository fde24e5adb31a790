//! Deterministic stand-ins for the radio stack and the clock.
//!
//! [`SimRadio`] records every command it is issued, can be scripted to
//! reject named commands or individual sends, and exposes an `on_send`
//! hook that fires synchronously inside [`RadioStack::send`] — the place
//! where tests and the demo deliver readiness or disconnect events "from
//! event context" at an exact point inside a blocking write.
//! [`SimClock`] advances by a fixed step per reading, so a wait whose
//! readiness never arrives still terminates after a bounded number of
//! polls.
//!
//! Cloning either type shares its state with the clone.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::link::clock::Clock;
use crate::link::init::{AdvertisingConfig, ConnParamConfig, GapConfig};
use crate::link::radio::{
    AdvertisingMode, DisconnectReason, PhyPreference, RadioError, RadioStack, SecurityReply,
    SendError,
};
use crate::link::state::ConnHandle;

type SendHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct SimRadioInner {
    journal: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    sent: Mutex<Vec<Vec<u8>>>,
    send_outcomes: Mutex<VecDeque<Result<(), SendError>>>,
    on_send: Mutex<Option<SendHook>>,
}

/// Scriptable in-memory radio stack.
#[derive(Clone)]
pub struct SimRadio {
    inner: Arc<SimRadioInner>,
}

impl SimRadio {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SimRadioInner {
                journal: Mutex::new(Vec::new()),
                failures: Mutex::new(HashSet::new()),
                sent: Mutex::new(Vec::new()),
                send_outcomes: Mutex::new(VecDeque::new()),
                on_send: Mutex::new(None),
            }),
        }
    }

    /// Every command issued so far, oldest first, including rejected
    /// ones (an entry records the attempt, not the outcome).
    pub fn journal(&self) -> Vec<String> {
        self.inner.journal.lock().clone()
    }

    /// Make the named command fail with [`RadioError::Rejected`] from
    /// now on. The name is the journal entry without any `:argument`
    /// suffix, e.g. `"start_advertising"`.
    pub fn fail_command(&self, name: &str) {
        self.inner.failures.lock().insert(name.to_string());
    }

    /// Queue the outcome for the next unscripted `send`; defaults to
    /// `Ok` once the queue is drained.
    pub fn push_send_outcome(&self, outcome: Result<(), SendError>) {
        self.inner.send_outcomes.lock().push_back(outcome);
    }

    /// Payloads of every chunk the stack accepted.
    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        self.inner.sent.lock().clone()
    }

    /// Install a hook that runs synchronously after every `send`
    /// attempt, accepted or not. The hook must not call `set_on_send`.
    pub fn set_on_send<F>(&self, hook: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.inner.on_send.lock() = Some(Arc::new(hook));
    }

    fn command(&self, entry: &str) -> Result<(), RadioError> {
        self.inner.journal.lock().push(entry.to_string());
        let base = entry.split(':').next().unwrap_or(entry);
        if self.inner.failures.lock().contains(base) {
            return Err(RadioError::Rejected(format!("{base} scripted to fail")));
        }
        Ok(())
    }
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioStack for SimRadio {
    fn enable(&self) -> Result<(), RadioError> {
        self.command("enable")
    }

    fn set_identity(&self, _gap: &GapConfig) -> Result<(), RadioError> {
        self.command("set_identity")
    }

    fn init_payload_negotiation(&self, _max_payload_bound: u16) -> Result<(), RadioError> {
        self.command("init_payload_negotiation")
    }

    fn init_write_queue(&self) -> Result<(), RadioError> {
        self.command("init_write_queue")
    }

    fn init_stream_service(&self) -> Result<(), RadioError> {
        self.command("init_stream_service")
    }

    fn init_advertising(&self, _adv: &AdvertisingConfig) -> Result<(), RadioError> {
        self.command("init_advertising")
    }

    fn init_conn_params(&self, _cfg: &ConnParamConfig) -> Result<(), RadioError> {
        self.command("init_conn_params")
    }

    fn start_advertising(&self, mode: AdvertisingMode) -> Result<(), RadioError> {
        match mode {
            AdvertisingMode::Fast => self.command("start_advertising:fast"),
        }
    }

    fn send(&self, _handle: ConnHandle, chunk: &[u8]) -> Result<(), SendError> {
        self.inner.journal.lock().push(format!("send:{}", chunk.len()));

        let outcome = self
            .inner
            .send_outcomes
            .lock()
            .pop_front()
            .unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.inner.sent.lock().push(chunk.to_vec());
        }

        // Clone the hook out so it can re-enter the radio freely.
        let hook = self.inner.on_send.lock().clone();
        if let Some(hook) = hook {
            hook(chunk);
        }
        outcome
    }

    fn disconnect(&self, _handle: ConnHandle, reason: DisconnectReason) -> Result<(), RadioError> {
        self.command(&format!("disconnect:{reason}"))
    }

    fn reply_phy_update(
        &self,
        _handle: ConnHandle,
        tx: PhyPreference,
        rx: PhyPreference,
    ) -> Result<(), RadioError> {
        match (tx, rx) {
            (PhyPreference::Auto, PhyPreference::Auto) => {
                self.command("reply_phy_update:auto/auto")
            }
        }
    }

    fn reply_security_params(
        &self,
        _handle: ConnHandle,
        reply: SecurityReply,
    ) -> Result<(), RadioError> {
        match reply {
            SecurityReply::PairingNotSupported => {
                self.command("reply_security_params:not_supported")
            }
        }
    }

    fn reply_system_attributes(&self, _handle: ConnHandle) -> Result<(), RadioError> {
        self.command("reply_system_attributes:empty")
    }
}

/// Clock that advances by a fixed step every time it is read.
#[derive(Clone)]
pub struct SimClock {
    now: Arc<AtomicU64>,
    step: u64,
}

impl SimClock {
    /// Advance `step` milliseconds per [`Clock::now_ms`] call.
    pub fn with_step(step: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
            step,
        }
    }

    /// Jump forward without being read.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}
