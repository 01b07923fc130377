//! Relay messages into a Redis-compatible server.
//!
//! Start a server first (`redis-server` or any RESP-compatible store), then:
//!
//! ```bash
//! SUPERCHANNEL_ADDR=127.0.0.1:6379 RUST_LOG=superchannel_core=debug \
//!     cargo run --example relay_demo
//! ```
//!
//! Watch the list fill up with `redis-cli LRANGE demo 0 -1`.

use std::thread;
use std::time::Duration;
use superchannel::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    superchannel::dev_tracing::init_tracing();

    let mut config = ChannelConfig::from_env()?;
    config.relay = config.relay.with_monitor(true);
    println!("=== Relay Demo ===");
    println!("Store: {}\n", config.address);

    let channel = create_channel_with("demo", 64, &config)?;

    if let Some(monitor) = channel.monitor() {
        thread::spawn(move || {
            for event in monitor.iter() {
                println!("  [event] {event}");
            }
        });
    }

    let producers: Vec<_> = (0..3)
        .map(|id| {
            let sender = channel.sender();
            thread::spawn(move || -> RelayResult<()> {
                for n in 0..10 {
                    sender.send(format!("producer-{id} message-{n}"))?;
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            })
        })
        .collect();

    for producer in producers {
        if let Ok(Err(e)) = producer.join() {
            eprintln!("Producer stopped: {e}");
        }
    }

    match channel.shutdown() {
        Ok(report) => println!(
            "\n✓ Delivered {} messages in {} batches ({} retries)",
            report.delivered, report.batches, report.retries
        ),
        Err(e) => {
            eprintln!("\n✗ Relay failed: {e}");
            let undelivered = e.into_undelivered();
            eprintln!("  {} messages handed back", undelivered.len());
        }
    }

    Ok(())
}
