//! One-time radio bring-up: configuration and the ordered init sequence.
//!
//! Setup is a strict pipeline; the first failing command poisons a
//! `last_error` slot that every later step checks before doing any work,
//! so a failure early in the sequence provably prevents the rest from
//! reaching the stack at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::radio::{AdvertisingMode, RadioError, RadioStack};

/// 128-bit UUID of the vendor-specific byte-stream service.
pub const STREAM_SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;

/// Default RX ring capacity in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 1024;

/// Default ATT MTU bound offered during payload negotiation.
pub const DEFAULT_MAX_PAYLOAD_BOUND: u16 = 64;

/// Bounded busy-wait budget for one outbound chunk, in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 100;

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("device name must not be empty")]
    EmptyDeviceName,
    #[error("connection interval range is inverted")]
    InvertedConnInterval,
    #[error("supervision timeout must be non-zero")]
    ZeroSupervisionTimeout,
    #[error("advertising interval must be non-zero")]
    ZeroAdvInterval,
    #[error("payload bound below the protocol minimum MTU")]
    PayloadBoundTooSmall,
    #[error("rx capacity must be non-zero")]
    ZeroRxCapacity,
    #[error("send timeout must be non-zero")]
    ZeroSendTimeout,
}

/// Device identity and preferred connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Name included in the advertising payload.
    pub device_name: String,
    /// Minimum connection interval, 1.25 ms units (6 = 7.5 ms).
    pub min_conn_interval: u16,
    /// Maximum connection interval, 1.25 ms units (60 = 75 ms).
    pub max_conn_interval: u16,
    /// Number of connection events the peripheral may skip.
    pub slave_latency: u16,
    /// Supervision timeout, 10 ms units (400 = 4 s).
    pub supervision_timeout: u16,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            device_name: "blestream".to_string(),
            min_conn_interval: 6,
            max_conn_interval: 60,
            slave_latency: 0,
            supervision_timeout: 400,
        }
    }
}

impl GapConfig {
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::EmptyDeviceName);
        }
        if self.min_conn_interval > self.max_conn_interval {
            return Err(ConfigError::InvertedConnInterval);
        }
        if self.supervision_timeout == 0 {
            return Err(ConfigError::ZeroSupervisionTimeout);
        }
        Ok(())
    }
}

/// Advertising payload and fast-mode timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertisingConfig {
    /// Service UUID advertised in the scan response.
    pub service_uuid: u128,
    /// LE-only limited discovery flags.
    pub limited_discovery: bool,
    /// Fast advertising interval, 0.625 ms units (64 = 40 ms).
    pub fast_interval: u16,
    /// Fast advertising duration, 10 ms units (18000 = 180 s).
    pub fast_duration: u16,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            service_uuid: STREAM_SERVICE_UUID,
            limited_discovery: true,
            fast_interval: 64,
            fast_duration: 18_000,
        }
    }
}

impl AdvertisingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_interval == 0 {
            return Err(ConfigError::ZeroAdvInterval);
        }
        Ok(())
    }
}

/// Connection-parameter negotiation timing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnParamConfig {
    /// Delay from connect to the first negotiation attempt.
    pub first_update_delay_ms: u32,
    /// Delay between subsequent attempts.
    pub next_update_delay_ms: u32,
    /// Attempts before negotiation is reported failed.
    pub max_update_attempts: u8,
    /// Whether the stack should drop the link itself on failure. Kept
    /// off: the failure event is handled by the dispatcher instead.
    pub disconnect_on_failure: bool,
}

impl Default for ConnParamConfig {
    fn default() -> Self {
        Self {
            first_update_delay_ms: 5_000,
            next_update_delay_ms: 30_000,
            max_update_attempts: 3,
            disconnect_on_failure: false,
        }
    }
}

/// Everything the stream needs to bring a link up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub gap: GapConfig,
    pub advertising: AdvertisingConfig,
    pub conn_params: ConnParamConfig,
    /// RX ring capacity in bytes.
    pub rx_capacity: usize,
    /// ATT MTU bound offered during payload negotiation.
    pub max_payload_bound: u16,
    /// Per-chunk send wait budget in milliseconds.
    pub send_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        Self {
            gap: GapConfig::default(),
            advertising: AdvertisingConfig::default(),
            conn_params: ConnParamConfig::default(),
            rx_capacity: DEFAULT_RX_CAPACITY,
            max_payload_bound: DEFAULT_MAX_PAYLOAD_BOUND,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }

    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    pub fn with_send_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.send_timeout_ms = timeout_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gap.validate()?;
        self.advertising.validate()?;
        if self.max_payload_bound < super::state::ATT_MTU_DEFAULT {
            return Err(ConfigError::PayloadBoundTooSmall);
        }
        if self.rx_capacity == 0 {
            return Err(ConfigError::ZeroRxCapacity);
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::ZeroSendTimeout);
        }
        Ok(())
    }
}

/// The ordered, fail-fast bring-up sequence.
///
/// Each step checks the `last_error` slot before issuing its command and
/// returns `false` without touching the radio once a previous step has
/// failed. The slot is observable through [`InitSequence::last_error`],
/// so callers (and tests) can tell "failed" apart from "skipped after a
/// failure".
pub struct InitSequence<'a, R: RadioStack> {
    radio: &'a R,
    config: &'a LinkConfig,
    last_error: Option<RadioError>,
}

impl<'a, R: RadioStack> InitSequence<'a, R> {
    pub fn new(radio: &'a R, config: &'a LinkConfig) -> Self {
        Self {
            radio,
            config,
            last_error: None,
        }
    }

    /// First command that failed, if any.
    pub fn last_error(&self) -> Option<&RadioError> {
        self.last_error.as_ref()
    }

    fn halted(&self) -> bool {
        self.last_error.is_some()
    }

    fn record(&mut self, result: Result<(), RadioError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.last_error = Some(err);
                false
            }
        }
    }

    /// Step 1: bring the stack up.
    pub fn enable_stack(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self.radio.enable();
        self.record(result)
    }

    /// Step 2: device identity and preferred connection parameters.
    pub fn configure_identity(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self.radio.set_identity(&self.config.gap);
        self.record(result)
    }

    /// Step 3: payload-size negotiation, bounded by configuration.
    pub fn init_payload_negotiation(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self
            .radio
            .init_payload_negotiation(self.config.max_payload_bound);
        self.record(result)
    }

    /// Step 4: queued-write module and the stream service itself.
    pub fn init_services(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let queue = self.radio.init_write_queue();
        if !self.record(queue) {
            return false;
        }
        let service = self.radio.init_stream_service();
        self.record(service)
    }

    /// Step 5: advertising payload and timing.
    pub fn init_advertising(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self.radio.init_advertising(&self.config.advertising);
        self.record(result)
    }

    /// Step 6: connection-parameter negotiation policy.
    pub fn init_conn_params(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self.radio.init_conn_params(&self.config.conn_params);
        self.record(result)
    }

    /// Step 7: start advertising in fast mode.
    pub fn start_advertising(&mut self) -> bool {
        if self.halted() {
            return false;
        }
        let result = self.radio.start_advertising(AdvertisingMode::Fast);
        self.record(result)
    }

    /// Run every step in order; `true` only if all of them succeeded.
    pub fn run(&mut self) -> bool {
        let mut ok = self.enable_stack();
        ok &= self.configure_identity();
        ok &= self.init_payload_negotiation();
        ok &= self.init_services();
        ok &= self.init_advertising();
        ok &= self.init_conn_params();
        ok &= self.start_advertising();
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRadio;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LinkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_inverted_interval() {
        let mut config = LinkConfig::default();
        config.gap.min_conn_interval = 100;
        config.gap.max_conn_interval = 6;
        assert_eq!(config.validate(), Err(ConfigError::InvertedConnInterval));
    }

    #[test]
    fn test_config_rejects_small_payload_bound() {
        let mut config = LinkConfig::default();
        config.max_payload_bound = 10;
        assert_eq!(config.validate(), Err(ConfigError::PayloadBoundTooSmall));
    }

    #[test]
    fn test_config_rejects_zero_rx_capacity() {
        let config = LinkConfig::default().with_rx_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRxCapacity));
    }

    #[test]
    fn test_full_sequence_issues_commands_in_order() {
        let radio = SimRadio::new();
        let config = LinkConfig::default();
        let mut seq = InitSequence::new(&radio, &config);

        assert!(seq.run());
        assert!(seq.last_error().is_none());
        assert_eq!(
            radio.journal(),
            vec![
                "enable",
                "set_identity",
                "init_payload_negotiation",
                "init_write_queue",
                "init_stream_service",
                "init_advertising",
                "init_conn_params",
                "start_advertising:fast",
            ]
        );
    }

    #[test]
    fn test_failure_skips_every_later_step() {
        let radio = SimRadio::new();
        radio.fail_command("init_payload_negotiation");
        let config = LinkConfig::default();
        let mut seq = InitSequence::new(&radio, &config);

        assert!(!seq.run());
        assert!(seq.last_error().is_some());

        // Steps after the failing one never reached the stack.
        let journal = radio.journal();
        assert_eq!(
            journal,
            vec!["enable", "set_identity", "init_payload_negotiation"]
        );
    }

    #[test]
    fn test_skipped_step_reports_false_without_command() {
        let radio = SimRadio::new();
        radio.fail_command("enable");
        let config = LinkConfig::default();
        let mut seq = InitSequence::new(&radio, &config);

        assert!(!seq.enable_stack());
        let poisoned = seq.last_error().cloned();
        assert!(poisoned.is_some());

        // The guard, not a fresh failure: no new command, same error.
        assert!(!seq.configure_identity());
        assert_eq!(seq.last_error().cloned(), poisoned);
        assert_eq!(radio.journal(), vec!["enable"]);
    }

    #[test]
    fn test_service_step_stops_between_its_two_commands() {
        let radio = SimRadio::new();
        radio.fail_command("init_write_queue");
        let config = LinkConfig::default();
        let mut seq = InitSequence::new(&radio, &config);

        assert!(!seq.run());
        let journal = radio.journal();
        assert!(journal.contains(&"init_write_queue".to_string()));
        assert!(!journal.contains(&"init_stream_service".to_string()));
    }
}
