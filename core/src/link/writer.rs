//! Blocking, MTU-chunked outbound path.
//!
//! The stack's send primitive is asynchronous: a chunk is handed over and
//! completion arrives later as a send-slot event. This module synthesizes
//! a blocking write on top of it with a bounded poll on the readiness
//! flag, so a stalled or dropped link can never hang the caller. The
//! payload ceiling is re-read for every chunk because an MTU exchange can
//! land mid-write.

use std::sync::Arc;

use tracing::debug;

use super::clock::Clock;
use super::radio::RadioStack;
use super::state::LinkContext;

/// Implements the public `write` contract: hand bytes to the stack chunk
/// by chunk, confirming each chunk against the send-slot event before
/// counting it.
pub struct ChunkedWriter<R: RadioStack, C: Clock> {
    ctx: Arc<LinkContext>,
    radio: Arc<R>,
    clock: C,
    timeout_ms: u64,
}

impl<R: RadioStack, C: Clock> ChunkedWriter<R, C> {
    pub fn new(ctx: Arc<LinkContext>, radio: Arc<R>, clock: C, timeout_ms: u64) -> Self {
        Self {
            ctx,
            radio,
            clock,
            timeout_ms,
        }
    }

    /// Send `data`, blocking until it is fully handed off, the link
    /// drops, a chunk times out, or the stack fails non-retriably.
    ///
    /// Returns the number of bytes confirmed sent, which is `0` when the
    /// link is down at call time and may be any prefix length on abort.
    /// The chunk in flight when the loop aborts is not counted. Timeout,
    /// disconnect, and non-retriable failure are indistinguishable in
    /// the return value by design.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut sent = 0;

        while sent < data.len() {
            // Also the initial connection gate: no handle, no send.
            let handle = match self.ctx.status.handle() {
                Some(handle) => handle,
                None => break,
            };

            let max_payload = self.ctx.status.max_payload();
            let end = (sent + max_payload).min(data.len());
            let chunk = &data[sent..end];

            self.ctx.clear_send_ready();
            match self.radio.send(handle, chunk) {
                Ok(()) => {}
                Err(err) if err.is_retriable() => {
                    debug!(%err, "send deferred, waiting for a slot");
                }
                Err(err) => {
                    debug!(%err, sent, "non-retriable send failure, aborting write");
                    break;
                }
            }

            if !self.wait_for_slot() {
                debug!(sent, "write aborted waiting for send slot");
                break;
            }

            sent += chunk.len();
        }

        sent
    }

    /// Poll until the slot frees, the link drops, or the budget runs out.
    fn wait_for_slot(&self) -> bool {
        let deadline = self.clock.now_ms().saturating_add(self.timeout_ms);
        loop {
            if self.ctx.send_ready() {
                return true;
            }
            if !self.ctx.status.is_connected() {
                return false;
            }
            if self.clock.now_ms() >= deadline {
                return false;
            }
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimRadio};
    use crate::link::radio::SendError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT_MS: u64 = 100;

    fn writer(
        ctx: Arc<LinkContext>,
        radio: SimRadio,
    ) -> ChunkedWriter<SimRadio, SimClock> {
        ChunkedWriter::new(ctx, Arc::new(radio), SimClock::with_step(1), TIMEOUT_MS)
    }

    fn connected_ctx() -> Arc<LinkContext> {
        let ctx = Arc::new(LinkContext::new(256));
        ctx.status.on_connected(1);
        ctx
    }

    #[test]
    fn test_write_while_disconnected_returns_zero() {
        let ctx = Arc::new(LinkContext::new(256));
        let radio = SimRadio::new();
        let w = writer(ctx, radio.clone());

        assert_eq!(w.write(&[0u8; 40]), 0);
        // The stack was never asked to send anything.
        assert!(radio.sent_chunks().is_empty());
    }

    #[test]
    fn test_chunking_respects_payload_ceiling() {
        let ctx = connected_ctx();
        ctx.status.raise_max_payload(64);

        let radio = SimRadio::new();
        let ready = ctx.clone();
        radio.set_on_send(move |_| ready.mark_send_ready());

        let w = writer(ctx, radio.clone());
        assert_eq!(w.write(&[0xA5; 200]), 200);

        let sizes: Vec<usize> = radio.sent_chunks().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![64, 64, 64, 8]);
    }

    #[test]
    fn test_evenly_divisible_write_has_full_final_chunk() {
        let ctx = connected_ctx();
        ctx.status.raise_max_payload(64);

        let radio = SimRadio::new();
        let ready = ctx.clone();
        radio.set_on_send(move |_| ready.mark_send_ready());

        let w = writer(ctx, radio.clone());
        assert_eq!(w.write(&[0x5A; 128]), 128);

        let sizes: Vec<usize> = radio.sent_chunks().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![64, 64]);
    }

    #[test]
    fn test_payload_ceiling_reread_between_chunks() {
        let ctx = connected_ctx();

        let radio = SimRadio::new();
        let shared = ctx.clone();
        let calls = AtomicUsize::new(0);
        radio.set_on_send(move |_| {
            // MTU renegotiation lands after the first chunk goes out.
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                shared.status.raise_max_payload(64);
            }
            shared.mark_send_ready();
        });

        let w = writer(ctx, radio.clone());
        assert_eq!(w.write(&[0u8; 100]), 100);

        let sizes: Vec<usize> = radio.sent_chunks().iter().map(|c| c.len()).collect();
        // Default 20-byte ceiling for the first chunk, 64 afterwards.
        assert_eq!(sizes, vec![20, 64, 16]);
    }

    #[test]
    fn test_timeout_without_readiness_returns_partial_count() {
        let ctx = connected_ctx();
        let radio = SimRadio::new(); // no readiness hook: slot never frees

        let w = writer(ctx, radio.clone());
        assert_eq!(w.write(&[1u8; 40]), 0);
        // The first chunk was handed over but never confirmed.
        assert_eq!(radio.sent_chunks().len(), 1);
    }

    #[test]
    fn test_disconnect_during_wait_aborts() {
        let ctx = connected_ctx();
        ctx.status.raise_max_payload(64);

        let radio = SimRadio::new();
        let shared = ctx.clone();
        let calls = AtomicUsize::new(0);
        radio.set_on_send(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                shared.mark_send_ready();
            } else {
                shared.status.on_disconnected();
            }
        });

        let w = writer(ctx.clone(), radio);
        assert_eq!(w.write(&[2u8; 200]), 128);
        assert!(!ctx.status.is_connected());
    }

    #[test]
    fn test_non_retriable_send_failure_aborts_immediately() {
        let ctx = connected_ctx();
        ctx.status.raise_max_payload(64);

        let radio = SimRadio::new();
        let ready = ctx.clone();
        radio.set_on_send(move |_| ready.mark_send_ready());
        radio.push_send_outcome(Ok(()));
        radio.push_send_outcome(Err(SendError::Other("internal fault".into())));

        let w = writer(ctx, radio.clone());
        // First chunk confirmed, second rejected outright.
        assert_eq!(w.write(&[3u8; 128]), 64);
        assert_eq!(radio.sent_chunks().len(), 1);
    }

    #[test]
    fn test_retriable_send_failure_still_waits_for_slot() {
        let ctx = connected_ctx();
        ctx.status.raise_max_payload(64);

        let radio = SimRadio::new();
        let ready = ctx.clone();
        radio.set_on_send(move |_| ready.mark_send_ready());
        radio.push_send_outcome(Err(SendError::Busy));

        let w = writer(ctx, radio);
        // Busy chunk is confirmed by the subsequent slot event.
        assert_eq!(w.write(&[4u8; 64]), 64);
    }

    #[test]
    fn test_empty_write_is_a_no_op() {
        let ctx = connected_ctx();
        let radio = SimRadio::new();
        let w = writer(ctx, radio.clone());

        assert_eq!(w.write(&[]), 0);
        assert!(radio.sent_chunks().is_empty());
    }
}
