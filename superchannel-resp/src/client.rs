//! Redis-compatible backing-store client.
//!
//! One `RespClient` owns one TCP connection. Every operation is a single
//! request/reply exchange guarded by [`PoisonGuard`]: if the exchange is
//! cancelled or fails halfway, the connection refuses further use until
//! [`reconnect`](BackingStore::reconnect) replaces it.
//!
//! A batch push is one pipelined write:
//!
//! ```text
//! MULTI
//! RPUSH key v1
//! ...
//! RPUSH key vn
//! EXEC
//! ```
//!
//! followed by `n + 2` replies. Readers see either none or all of the
//! batch. The relay's tagged pushes add `SET key:relay-batch <tag>` just
//! before `EXEC`, so the batch and its tag commit together; `GET` on that
//! marker answers whether a batch whose reply was lost actually landed.

use crate::codec::{encode_command, RespDecoder, RespValue};
use crate::config::RespOptions;

use async_trait::async_trait;
use bytes::BytesMut;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use compio::net::TcpStream;
use std::io;
use superchannel_core::error::{StoreError, StoreResult};
use superchannel_core::message::Message;
use superchannel_core::poison::PoisonGuard;
use superchannel_core::store::{BackingStore, BatchTag, Connect};
use superchannel_core::tcp::{configure_tcp_keepalive, enable_tcp_nodelay};
use tracing::{debug, trace, warn};

/// Strip an optional `redis://` or `tcp://` scheme.
fn host_port(address: &str) -> &str {
    address
        .strip_prefix("redis://")
        .or_else(|| address.strip_prefix("tcp://"))
        .unwrap_or(address)
}

/// A live connection plus its buffers.
struct Connection {
    stream: TcpStream,
    decoder: RespDecoder,
    /// Encoded request awaiting write
    send: Vec<u8>,
    /// Scratch buffer handed to the kernel for reads
    read_buf: Vec<u8>,
    read_buf_size: usize,
    /// Bytes read but not yet decoded
    recv: BytesMut,
    poisoned: bool,
}

impl Connection {
    async fn open(address: &str, options: &RespOptions) -> StoreResult<Self> {
        let stream = TcpStream::connect(host_port(address))
            .await
            .map_err(StoreError::Connect)?;

        if options.nodelay {
            if let Err(e) = enable_tcp_nodelay(&stream) {
                warn!(address, error = %e, "[RESP] Could not set TCP_NODELAY");
            }
        }
        if let Some(idle) = options.keepalive {
            if let Err(e) = configure_tcp_keepalive(&stream, idle) {
                warn!(address, error = %e, "[RESP] Could not enable keepalive");
            }
        }

        Ok(Self {
            stream,
            decoder: RespDecoder::new()
                .with_max_bulk_len(options.max_bulk_len)
                .with_max_line_len(options.max_line_len),
            send: Vec::with_capacity(options.write_buf_size),
            read_buf: Vec::with_capacity(options.read_buf_size),
            read_buf_size: options.read_buf_size,
            recv: BytesMut::with_capacity(options.read_buf_size),
            poisoned: false,
        })
    }

    /// Write the encoded request and read exactly `replies` values.
    async fn exchange(&mut self, replies: usize) -> StoreResult<Vec<RespValue>> {
        let Self {
            stream,
            decoder,
            send,
            read_buf,
            read_buf_size,
            recv,
            poisoned,
        } = self;

        if *poisoned {
            send.clear();
            return Err(StoreError::not_connected());
        }

        let guard = PoisonGuard::new(poisoned);

        trace!("[RESP] Writing {} bytes", send.len());
        let BufResult(written, buf) = stream.write_all(std::mem::take(send)).await;
        *send = buf;
        send.clear();
        written.map_err(StoreError::Transport)?;

        let mut out = Vec::with_capacity(replies);
        while out.len() < replies {
            if let Some(value) = decoder.decode(recv)? {
                out.push(value);
                continue;
            }

            let mut buf = std::mem::take(read_buf);
            buf.clear();
            buf.reserve(*read_buf_size);
            let BufResult(read, buf) = stream.read(buf).await;
            let n = read.map_err(StoreError::Transport)?;
            if n == 0 {
                return Err(StoreError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "store closed the connection",
                )));
            }
            recv.extend_from_slice(&buf);
            *read_buf = buf;
        }

        guard.disarm();
        Ok(out)
    }

    fn push_command(&mut self, args: &[&[u8]]) {
        encode_command(args, &mut self.send);
    }
}

/// Client for a Redis-compatible list store.
pub struct RespClient {
    address: String,
    options: RespOptions,
    conn: Connection,
}

impl std::fmt::Debug for RespClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespClient")
            .field("address", &self.address)
            .field("poisoned", &self.conn.poisoned)
            .finish_non_exhaustive()
    }
}

impl RespClient {
    /// Connect to `address` (`host:port`, optionally `redis://host:port`).
    ///
    /// # Errors
    ///
    /// `Connect` if the TCP connection fails; `Protocol` if
    /// `ping_on_connect` is set and the peer does not answer `+PONG`.
    pub async fn connect(address: impl Into<String>, options: RespOptions) -> StoreResult<Self> {
        let address = address.into();
        let conn = Connection::open(&address, &options).await?;
        let mut client = Self {
            address,
            options,
            conn,
        };
        if client.options.ping_on_connect {
            client.ping().await?;
        }
        debug!(address = %client.address, "[RESP] Connected");
        Ok(client)
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether an exchange was interrupted; only `reconnect` clears this.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.conn.poisoned
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// `Protocol` for any reply other than `+PONG`.
    pub async fn ping(&mut self) -> StoreResult<()> {
        let reply = self.command(&[b"PING"]).await?;
        if reply.is_simple("PONG") {
            Ok(())
        } else {
            Err(StoreError::protocol(format!(
                "expected +PONG, got {reply:?}"
            )))
        }
    }

    /// Send one command and return its reply. Error replies become
    /// `StoreError::Rejected`.
    async fn command(&mut self, args: &[&[u8]]) -> StoreResult<RespValue> {
        self.conn.push_command(args);
        let reply = self
            .conn
            .exchange(1)
            .await?
            .pop()
            .ok_or_else(|| StoreError::protocol("missing reply"))?;
        match reply.error_text() {
            Some(msg) => Err(StoreError::Rejected(msg)),
            None => Ok(reply),
        }
    }
}

impl RespClient {
    /// `MULTI`, one `RPUSH` per value, the optional tag `SET`, `EXEC`.
    async fn transaction(
        &mut self,
        key: &str,
        tag: Option<BatchTag>,
        values: &[Message],
    ) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }

        self.conn.push_command(&[b"MULTI"]);
        for value in values {
            self.conn.push_command(&[b"RPUSH", key.as_bytes(), &value[..]]);
        }
        let mut queued = values.len();
        if let Some(tag) = tag {
            let marker = BatchTag::marker_key(key);
            let tag = tag.to_string();
            self.conn.push_command(&[b"SET", marker.as_bytes(), tag.as_bytes()]);
            queued += 1;
        }
        self.conn.push_command(&[b"EXEC"]);

        let replies = self.conn.exchange(queued + 2).await?;
        check_transaction(&replies, queued)?;
        trace!(key, count = values.len(), tagged = tag.is_some(), "[RESP] Batch committed");
        Ok(())
    }
}

/// Check the `queued + 2` replies of a MULTI/.../EXEC exchange.
fn check_transaction(replies: &[RespValue], queued: usize) -> StoreResult<()> {
    let (first, rest) = replies
        .split_first()
        .ok_or_else(|| StoreError::protocol("missing MULTI reply"))?;
    if let Some(msg) = first.error_text() {
        return Err(StoreError::Rejected(msg));
    }
    if !first.is_simple("OK") {
        return Err(StoreError::protocol(format!("unexpected MULTI reply {first:?}")));
    }

    let (exec, acks) = rest
        .split_last()
        .ok_or_else(|| StoreError::protocol("missing EXEC reply"))?;
    // A queueing error makes the server discard the transaction; report
    // the first cause rather than EXECABORT.
    if let Some(msg) = acks.iter().find_map(RespValue::error_text) {
        return Err(StoreError::Rejected(msg));
    }

    match exec {
        RespValue::Array(Some(results)) if results.len() == queued => {
            match results.iter().find_map(RespValue::error_text) {
                Some(msg) => Err(StoreError::Rejected(msg)),
                None => Ok(()),
            }
        }
        RespValue::Array(None) => Err(StoreError::rejected("transaction discarded")),
        other => match other.error_text() {
            Some(msg) => Err(StoreError::Rejected(msg)),
            None => Err(StoreError::protocol(format!("unexpected EXEC reply {other:?}"))),
        },
    }
}

#[async_trait(?Send)]
impl BackingStore for RespClient {
    async fn push_all(&mut self, key: &str, values: &[Message]) -> StoreResult<()> {
        self.transaction(key, None, values).await
    }

    async fn push_batch(&mut self, key: &str, tag: BatchTag, values: &[Message]) -> StoreResult<()> {
        self.transaction(key, Some(tag), values).await
    }

    async fn last_batch(&mut self, key: &str) -> StoreResult<Option<BatchTag>> {
        let marker = BatchTag::marker_key(key);
        match self.command(&[b"GET", marker.as_bytes()]).await? {
            RespValue::Bulk(None) => Ok(None),
            RespValue::Bulk(Some(raw)) => BatchTag::parse(&raw).map(Some).ok_or_else(|| {
                StoreError::protocol(format!("{marker} does not hold a batch tag"))
            }),
            other => Err(StoreError::protocol(format!(
                "unexpected GET reply {other:?}"
            ))),
        }
    }

    async fn pop_blocking(&mut self, key: &str) -> StoreResult<Message> {
        loop {
            match self.command(&[b"BLPOP", key.as_bytes(), b"0"]).await? {
                RespValue::Array(Some(mut pair)) if pair.len() == 2 => match pair.pop() {
                    Some(RespValue::Bulk(Some(value))) => return Ok(value),
                    other => {
                        return Err(StoreError::protocol(format!(
                            "unexpected BLPOP value {other:?}"
                        )))
                    }
                },
                // Only a server-side timeout yields null; with 0 that means retry.
                RespValue::Array(None) | RespValue::Bulk(None) => continue,
                other => {
                    return Err(StoreError::protocol(format!(
                        "unexpected BLPOP reply {other:?}"
                    )))
                }
            }
        }
    }

    async fn delete_key(&mut self, key: &str) -> StoreResult<()> {
        match self.command(&[b"DEL", key.as_bytes()]).await? {
            RespValue::Integer(_) => Ok(()),
            other => Err(StoreError::protocol(format!(
                "unexpected DEL reply {other:?}"
            ))),
        }
    }

    async fn reconnect(&mut self) -> StoreResult<()> {
        debug!(address = %self.address, poisoned = self.conn.poisoned, "[RESP] Reconnecting");
        self.conn = Connection::open(&self.address, &self.options).await?;
        if self.options.ping_on_connect {
            self.ping().await?;
        }
        Ok(())
    }
}

/// Builds a [`RespClient`] on the relay worker's thread.
#[derive(Debug, Clone)]
pub struct RespConnector {
    address: String,
    options: RespOptions,
}

impl RespConnector {
    #[must_use]
    pub fn new(address: impl Into<String>, options: RespOptions) -> Self {
        Self {
            address: address.into(),
            options,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait(?Send)]
impl Connect for RespConnector {
    type Store = RespClient;

    async fn connect(self) -> StoreResult<RespClient> {
        RespClient::connect(self.address, self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn simple(s: &'static str) -> RespValue {
        RespValue::Simple(Bytes::from_static(s.as_bytes()))
    }

    fn error(s: &'static str) -> RespValue {
        RespValue::Error(Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn strips_scheme() {
        assert_eq!(host_port("redis://127.0.0.1:6379"), "127.0.0.1:6379");
        assert_eq!(host_port("tcp://localhost:1"), "localhost:1");
        assert_eq!(host_port("localhost:6379"), "localhost:6379");
    }

    #[test]
    fn committed_transaction() {
        let replies = vec![
            simple("OK"),
            simple("QUEUED"),
            simple("QUEUED"),
            RespValue::Array(Some(vec![RespValue::Integer(1), RespValue::Integer(2)])),
        ];
        assert!(check_transaction(&replies, 2).is_ok());
    }

    #[test]
    fn tagged_transaction_counts_the_set() {
        let replies = vec![
            simple("OK"),
            simple("QUEUED"),
            simple("QUEUED"),
            RespValue::Array(Some(vec![RespValue::Integer(1), simple("OK")])),
        ];
        assert!(check_transaction(&replies, 2).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let replies = vec![
            simple("OK"),
            simple("QUEUED"),
            RespValue::Array(Some(vec![error("WRONGTYPE Operation against a key")])),
        ];
        match check_transaction(&replies, 1) {
            Err(StoreError::Rejected(msg)) => assert!(msg.starts_with("WRONGTYPE")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn queueing_error_reports_cause() {
        let replies = vec![
            simple("OK"),
            error("ERR unknown command"),
            error("EXECABORT Transaction discarded"),
        ];
        match check_transaction(&replies, 1) {
            Err(StoreError::Rejected(msg)) => assert_eq!(msg, "ERR unknown command"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn short_exec_reply_is_protocol_error() {
        let replies = vec![
            simple("OK"),
            simple("QUEUED"),
            simple("QUEUED"),
            RespValue::Array(Some(vec![RespValue::Integer(1)])),
        ];
        assert!(matches!(
            check_transaction(&replies, 2),
            Err(StoreError::Protocol(_))
        ));
    }

    #[compio::test]
    async fn connect_refused_is_connect_error() {
        // Bind then drop to get a port with no listener.
        let port = {
            let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = RespClient::connect(format!("127.0.0.1:{port}"), RespOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connect(_)));
        assert!(err.is_retryable());
    }
}
