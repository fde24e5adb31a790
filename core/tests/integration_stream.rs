// Integration tests for the full stream surface: init sequencing,
// connection lifecycle, chunked writes, and RX buffering, all driven
// through the simulated radio and the deterministic clock.

use std::sync::Arc;

use blestream_core::link::{AdvertisingState, DEFAULT_MAX_PAYLOAD};
use blestream_core::sim::{SimClock, SimRadio};
use blestream_core::{BleStream, LinkConfig, LinkEvent};

type SimStream = BleStream<SimRadio, SimClock>;

fn sim_stream(config: LinkConfig) -> (Arc<SimStream>, SimRadio) {
    let radio = SimRadio::new();
    let stream = Arc::new(BleStream::with_clock(
        radio.clone(),
        config,
        SimClock::with_step(1),
    ));
    (stream, radio)
}

/// Wire the radio so every accepted chunk is immediately confirmed by a
/// send-slot event, as a healthy link would.
fn confirm_sends_immediately(stream: &Arc<SimStream>, radio: &SimRadio) {
    let stream = stream.clone();
    radio.set_on_send(move |_| stream.handle_event(LinkEvent::SendReady));
}

#[test]
fn test_init_issues_the_full_bringup_sequence() {
    let (stream, radio) = sim_stream(LinkConfig::default());

    assert!(stream.init());
    assert!(stream.is_init());
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
    println!("✓ init sequence issued all commands in order");
}

#[test]
fn test_init_failure_short_circuits_later_steps() {
    let (stream, radio) = sim_stream(LinkConfig::default());
    radio.fail_command("init_advertising");

    assert!(!stream.init());
    assert!(!stream.is_init());

    let journal = radio.journal();
    assert_eq!(journal.last().map(String::as_str), Some("init_advertising"));
    assert!(
        !journal.iter().any(|c| c == "init_conn_params"),
        "steps after the failing one must not reach the stack"
    );
    assert!(!journal.iter().any(|c| c == "start_advertising:fast"));
}

#[test]
fn test_full_session_with_mtu_update_and_chunked_write() {
    let (stream, radio) = sim_stream(LinkConfig::default());
    confirm_sends_immediately(&stream, &radio);

    assert!(stream.init());
    assert!(!stream.is_connected());

    stream.handle_event(LinkEvent::Connected { handle: 1 });
    assert!(stream.is_connected());

    // MTU exchange raises the payload ceiling from 20 to 64.
    stream.handle_event(LinkEvent::MtuUpdated {
        handle: 1,
        att_mtu: 67,
    });

    assert_eq!(stream.write(&[0xC3; 200]), 200);

    let sizes: Vec<usize> = radio.sent_chunks().iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![64, 64, 64, 8]);
    println!("✓ 200 bytes went out as 64+64+64+8");
}

#[test]
fn test_write_while_disconnected_is_a_gated_no_op() {
    let (stream, radio) = sim_stream(LinkConfig::default());
    assert!(stream.init());

    assert_eq!(stream.write(b"never sent"), 0);
    assert!(
        !radio.journal().iter().any(|c| c.starts_with("send:")),
        "no send may be issued while disconnected"
    );
}

#[test]
fn test_disconnect_mid_write_returns_partial_count() {
    let (stream, radio) = sim_stream(LinkConfig::default());

    stream.handle_event(LinkEvent::Connected { handle: 1 });
    stream.handle_event(LinkEvent::MtuUpdated {
        handle: 1,
        att_mtu: 67,
    });

    // Confirm two chunks, then the central drops the link.
    let hook_stream = stream.clone();
    let confirmed = std::sync::atomic::AtomicUsize::new(0);
    radio.set_on_send(move |_| {
        use std::sync::atomic::Ordering;
        if confirmed.fetch_add(1, Ordering::SeqCst) < 2 {
            hook_stream.handle_event(LinkEvent::SendReady);
        } else {
            hook_stream.handle_event(LinkEvent::Disconnected { handle: 1 });
        }
    });

    let written = stream.write(&[0x11; 200]);
    assert_eq!(written, 128, "only confirmed chunks count");
    assert!(!stream.is_connected());
}

#[test]
fn test_write_times_out_when_readiness_never_arrives() {
    let (stream, radio) = sim_stream(LinkConfig::default());

    stream.handle_event(LinkEvent::Connected { handle: 1 });

    // No readiness hook: the slot never frees, the bounded wait expires.
    assert_eq!(stream.write(&[0x22; 40]), 0);

    // Exactly one chunk was attempted before giving up.
    let sends = radio
        .journal()
        .iter()
        .filter(|c| c.starts_with("send:"))
        .count();
    assert_eq!(sends, 1);
    println!("✓ write returned after the bounded wait instead of hanging");
}

#[test]
fn test_rx_overflow_drops_payload_whole_and_sets_flag() {
    let (stream, _radio) = sim_stream(LinkConfig::default().with_rx_capacity(30));

    stream.handle_event(LinkEvent::DataReceived {
        data: vec![b'x'; 24],
    });
    assert!(!stream.rx_overflowed());

    stream.handle_event(LinkEvent::DataReceived {
        data: vec![b'y'; 10],
    });
    assert!(stream.rx_overflowed());

    // The ring still holds exactly the first payload.
    assert_eq!(stream.available(), 24);
    let mut out = [0u8; 30];
    let got = stream.read(&mut out);
    assert_eq!(got, 24);
    assert!(out[..got].iter().all(|&b| b == b'x'));
}

#[test]
fn test_rx_bytes_come_out_in_arrival_order() {
    let (stream, _radio) = sim_stream(LinkConfig::default());

    stream.handle_event(LinkEvent::DataReceived {
        data: b"first ".to_vec(),
    });
    stream.handle_event(LinkEvent::DataReceived {
        data: b"second".to_vec(),
    });

    assert_eq!(stream.available(), 12);
    let mut out = vec![0u8; 12];
    assert_eq!(stream.read(&mut out), 12);
    assert_eq!(&out, b"first second");
    assert_eq!(stream.available(), 0);
}

#[test]
fn test_flush_discards_pending_rx() {
    let (stream, _radio) = sim_stream(LinkConfig::default());

    stream.handle_event(LinkEvent::DataReceived {
        data: b"stale".to_vec(),
    });
    assert!(stream.flush());
    assert_eq!(stream.available(), 0);
    assert_eq!(stream.read_byte(), 0);
}

#[test]
fn test_reconnect_resets_payload_ceiling() {
    let (stream, radio) = sim_stream(LinkConfig::default());
    confirm_sends_immediately(&stream, &radio);

    stream.handle_event(LinkEvent::Connected { handle: 1 });
    stream.handle_event(LinkEvent::MtuUpdated {
        handle: 1,
        att_mtu: 247,
    });
    assert_eq!(stream.write(&[1u8; 244]), 244);
    assert_eq!(radio.sent_chunks().last().unwrap().len(), 244);

    stream.handle_event(LinkEvent::Disconnected { handle: 1 });
    stream.handle_event(LinkEvent::Connected { handle: 2 });

    // Fresh link, fresh (default) ceiling until the next MTU exchange.
    assert_eq!(stream.write(&[2u8; 40]), 40);
    let sizes: Vec<usize> = radio.sent_chunks()[1..].iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![DEFAULT_MAX_PAYLOAD, 40 - DEFAULT_MAX_PAYLOAD]);
}

#[test]
fn test_link_maintenance_events_issue_commands() {
    let (stream, radio) = sim_stream(LinkConfig::default());

    stream.handle_event(LinkEvent::Connected { handle: 3 });
    stream.handle_event(LinkEvent::PhyUpdateRequested { handle: 3 });
    stream.handle_event(LinkEvent::SecurityParamsRequested { handle: 3 });
    stream.handle_event(LinkEvent::SystemAttributesMissing { handle: 3 });
    stream.handle_event(LinkEvent::ClientTimeout { handle: 3 });
    stream.handle_event(LinkEvent::AdvertisingChanged(AdvertisingState::Idle));

    assert_eq!(
        radio.journal(),
        vec![
            "reply_phy_update:auto/auto",
            "reply_security_params:not_supported",
            "reply_system_attributes:empty",
            "disconnect:remote user terminated",
            "start_advertising:fast",
        ]
    );
}

#[test]
fn test_mtu_event_for_foreign_handle_is_ignored() {
    let (stream, radio) = sim_stream(LinkConfig::default());
    confirm_sends_immediately(&stream, &radio);

    stream.handle_event(LinkEvent::Connected { handle: 1 });
    stream.handle_event(LinkEvent::MtuUpdated {
        handle: 2,
        att_mtu: 247,
    });

    assert_eq!(stream.write(&[3u8; 40]), 40);
    let sizes: Vec<usize> = radio.sent_chunks().iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![DEFAULT_MAX_PAYLOAD, 40 - DEFAULT_MAX_PAYLOAD]);
}
