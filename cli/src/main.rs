// blestream-cli — demo driver for the stream adapter
//
// Runs a scripted session against the simulated radio: bring-up, a
// central connecting, an MTU exchange, a chunked outbound write, some
// inbound traffic, and a disconnect. Useful for eyeballing the chunking
// and the event flow without radio hardware.

use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::Parser;
use tracing::debug;

use blestream_core::sim::SimRadio;
use blestream_core::{BleStream, Indicator, LinkConfig, LinkEvent};

#[derive(Parser)]
#[command(name = "blestream")]
#[command(about = "blestream — simulated radio stream session", long_about = None)]
#[command(version)]
struct Cli {
    /// ATT MTU the simulated central negotiates after connecting
    #[arg(long, default_value_t = 67)]
    att_mtu: u16,

    /// Size of the outbound demo payload in bytes
    #[arg(long, default_value_t = 200)]
    payload: usize,

    /// RX ring capacity in bytes
    #[arg(long, default_value_t = 1024)]
    rx_capacity: usize,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct ConsoleIndicator;

impl Indicator for ConsoleIndicator {
    fn link_up(&self) {
        println!("[indicator] link up");
    }

    fn link_down(&self) {
        println!("[indicator] link down");
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let radio = SimRadio::new();
    let config = LinkConfig::default().with_rx_capacity(cli.rx_capacity);
    let stream = Arc::new(
        BleStream::new(radio.clone(), config).with_indicator(Box::new(ConsoleIndicator)),
    );

    ensure!(stream.init(), "radio bring-up failed");
    println!("initialized; commands issued:");
    for command in radio.journal() {
        println!("  {command}");
    }

    // A healthy simulated link confirms every chunk immediately.
    let events = stream.clone();
    radio.set_on_send(move |chunk| {
        debug!(len = chunk.len(), "chunk handed to the stack");
        events.handle_event(LinkEvent::SendReady);
    });

    stream.handle_event(LinkEvent::Connected { handle: 1 });
    stream.handle_event(LinkEvent::MtuUpdated {
        handle: 1,
        att_mtu: cli.att_mtu,
    });
    println!(
        "connected, payload ceiling {} bytes",
        cli.att_mtu.saturating_sub(3)
    );

    let payload: Vec<u8> = (0..cli.payload).map(|i| (i % 251) as u8).collect();
    let sent = stream.write(&payload);
    println!("wrote {sent}/{} bytes:", payload.len());
    for (i, chunk) in radio.sent_chunks().iter().enumerate() {
        println!("  chunk {i}: {} bytes", chunk.len());
    }

    stream.handle_event(LinkEvent::DataReceived {
        data: b"pong".to_vec(),
    });
    stream.handle_event(LinkEvent::DataReceived {
        data: vec![0xDE, 0xAD, 0xBE, 0xEF],
    });

    let mut inbound = vec![0u8; stream.available()];
    let got = stream.read(&mut inbound);
    println!("received {got} bytes: {}", hex::encode(&inbound[..got]));

    stream.handle_event(LinkEvent::Disconnected { handle: 1 });
    println!(
        "session over; connected={} overflow={}",
        stream.is_connected(),
        stream.rx_overflowed()
    );

    Ok(())
}
