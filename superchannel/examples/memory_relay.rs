//! Relay into the in-process store and consume from it.
//!
//! No server needed:
//!
//! ```bash
//! cargo run --example memory_relay
//! ```

use std::time::Duration;
use superchannel::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    superchannel::dev_tracing::init_tracing();

    let store = MemoryStore::new();
    let options = RelayOptions::new().with_flush_window(Duration::from_millis(20));
    let channel = RelayChannel::spawn("events", 16, store.clone(), options)?;

    for n in 0..5 {
        channel.send(format!("event-{n}"))?;
    }
    let report = channel.shutdown()?;
    println!("Delivered {} messages in {} batches", report.delivered, report.batches);

    // Consumer side: pop oldest first.
    let runtime = compio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut reader = store;
        for _ in 0..report.delivered {
            let msg = reader.pop_blocking("events").await?;
            println!("  popped {}", String::from_utf8_lossy(&msg));
        }
        Ok::<_, StoreError>(())
    })?;

    Ok(())
}
