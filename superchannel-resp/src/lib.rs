//! # SuperChannel RESP
//!
//! Redis-compatible backing store for SuperChannel relays.
//!
//! - `codec`: RESP2 request encoder and incremental reply decoder
//! - `client`: `RespClient`, a [`BackingStore`] over one TCP connection,
//!   and `RespConnector`, which builds it on the relay worker's thread
//! - `config`: `RespOptions` and buffer sizing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use superchannel_core::store::BackingStore;
//! use superchannel_resp::{RespClient, RespOptions};
//! use bytes::Bytes;
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RespClient::connect("127.0.0.1:6379", RespOptions::default()).await?;
//!
//!     client.push_all("jobs", &[Bytes::from("a"), Bytes::from("b")]).await?;
//!     let first = client.pop_blocking("jobs").await?;
//!     assert_eq!(first, Bytes::from("a"));
//!
//!     Ok(())
//! }
//! ```
//!
//! [`BackingStore`]: superchannel_core::store::BackingStore

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod codec;
pub mod config;

pub use client::{RespClient, RespConnector};
pub use codec::{encode_command, RespDecoder, RespError, RespValue};
pub use config::RespOptions;
