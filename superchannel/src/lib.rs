//! # SuperChannel
//!
//! A named, bounded channel whose messages end up in a Redis-compatible
//! list, in order, in atomic batches.
//!
//! ## Architecture
//!
//! - **`superchannel-core`**: relay worker, window/timer, store traits,
//!   in-memory store, errors
//! - **`superchannel-resp`**: RESP codec and the Redis-compatible client
//! - **`superchannel`**: public API surface (this crate)
//!
//! Each channel runs one worker on its own thread with a single-threaded
//! `compio` runtime. Producers on any thread push into the bounded FIFO;
//! every flush window the worker pushes what accumulated as one
//! `MULTI`/`RPUSH`.../`EXEC` transaction, so a consumer popping the list
//! never sees half a batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "resp")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = superchannel::create_channel("jobs", 1024)?;
//!
//! channel.send("first")?;
//! channel.send("second")?;
//!
//! // Drain, flush the last window, release the connection.
//! let report = channel.shutdown()?;
//! println!("delivered {}", report.delivered);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom stores
//!
//! Anything implementing [`Connect`](prelude::Connect) can back a
//! channel; [`MemoryStore`](prelude::MemoryStore) is included:
//!
//! ```rust
//! use superchannel::prelude::*;
//!
//! let store = MemoryStore::new();
//! let channel = RelayChannel::spawn("jobs", 8, store.clone(), RelayOptions::default())?;
//! channel.send("hello")?;
//! channel.shutdown()?;
//!
//! assert_eq!(store.snapshot("jobs"), vec![bytes::Bytes::from("hello")]);
//! # Ok::<(), superchannel::RelayError>(())
//! ```

pub mod dev_tracing;

#[cfg(feature = "resp")]
pub mod config;

pub use superchannel_core::{
    Envelope, Message, RelayChannel, RelayError, RelayOptions, RelayReport, RelayResult,
    RelaySender, StoreError, StoreResult,
};

#[cfg(feature = "resp")]
pub use config::{ChannelConfig, ConfigError};
#[cfg(feature = "resp")]
pub use superchannel_resp as resp;
#[cfg(feature = "resp")]
pub use superchannel_resp::{RespClient, RespConnector, RespOptions};

/// Create a RESP-backed channel with default configuration.
///
/// Connects to `127.0.0.1:6379` on the worker thread; returns immediately,
/// so early sends queue locally.
///
/// # Errors
///
/// `Runtime` if the worker thread cannot be started. Store failures surface
/// through sends and [`RelayChannel::join`].
#[cfg(feature = "resp")]
pub fn create_channel(name: impl Into<String>, capacity: usize) -> RelayResult<RelayChannel> {
    create_channel_with(name, capacity, &ChannelConfig::default())
}

/// Create a RESP-backed channel with explicit configuration.
///
/// # Errors
///
/// Same as [`create_channel`].
#[cfg(feature = "resp")]
pub fn create_channel_with(
    name: impl Into<String>,
    capacity: usize,
    config: &ChannelConfig,
) -> RelayResult<RelayChannel> {
    let name = name.into();
    tracing::debug!(name = %name, address = %config.address, capacity, "[CHANNEL] Creating");
    let connector = RespConnector::new(config.address.clone(), config.resp.clone());
    RelayChannel::spawn(name, capacity, connector, config.relay.clone())
}

pub mod prelude {
    pub use superchannel_core::prelude::*;

    #[cfg(feature = "resp")]
    pub use crate::{create_channel, create_channel_with, ChannelConfig};
    #[cfg(feature = "resp")]
    pub use superchannel_resp::{RespConnector, RespOptions};
}
