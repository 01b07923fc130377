//! SuperChannel Core
//!
//! Runtime pieces of a relay that batches messages from a local bounded
//! FIFO into a remote ordered list:
//! - Producer handles and the worker thread (`channel`)
//! - The relay control loop (`worker`)
//! - Window buffer and flush cadence (`window`)
//! - Backing-store traits and the in-memory store (`store`)
//! - Retry backoff (`retry`), deadlines (`timeout`), cancellation safety (`poison`)
//! - TCP tuning for network stores (`tcp`)
//! - Lifecycle events (`monitor`)
//! - Error types (`error`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

pub mod channel;
pub mod error;
pub mod message;
pub mod monitor;
pub mod options;
pub mod poison;
pub mod retry;
pub mod store;
pub mod tcp;
pub mod timeout;
pub mod window;
pub mod worker;

pub use channel::{RelayChannel, RelaySender};
pub use error::{RelayError, RelayResult, StoreError, StoreResult};
pub use message::{Envelope, Message};
pub use options::RelayOptions;
pub use worker::{RelayReport, WorkerState};

pub mod prelude {
    pub use crate::channel::{RelayChannel, RelaySender};
    pub use crate::error::{RelayError, RelayResult, StoreError, StoreResult};
    pub use crate::message::{Envelope, Message};
    pub use crate::monitor::{RelayEvent, RelayMonitor};
    pub use crate::options::RelayOptions;
    pub use crate::poison::PoisonGuard;
    pub use crate::retry::RetryState;
    pub use crate::store::{BackingStore, BatchTag, Connect, MemoryStore};
    pub use crate::tcp::{configure_tcp_keepalive, enable_tcp_nodelay};
    pub use crate::worker::{RelayReport, WorkerState};
}
