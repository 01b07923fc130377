//! Messages and the envelope that carries them through the relay FIFO.
//!
//! Payloads are opaque `Bytes`. Control is signalled out of band of the
//! payload space: the FIFO carries `Envelope::Data` or `Envelope::Close`,
//! so no application value can be mistaken for the close signal.

use bytes::Bytes;

/// An opaque payload. Equality carries no meaning to the relay.
pub type Message = Bytes;

/// Items travelling from producers to the relay worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Application payload, forwarded in send order
    Data(Message),
    /// Close handshake: drain, flush, stop
    Close,
}

impl Envelope {
    /// Wrap anything convertible into `Bytes` as a data envelope.
    ///
    /// # Examples
    ///
    /// ```
    /// use superchannel_core::message::Envelope;
    ///
    /// let env = Envelope::data("hello");
    /// assert_eq!(env.payload().map(|b| &b[..]), Some(&b"hello"[..]));
    /// assert!(!env.is_close());
    /// ```
    #[must_use]
    pub fn data(payload: impl Into<Message>) -> Self {
        Self::Data(payload.into())
    }

    #[inline]
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }

    /// Borrow the payload of a data envelope.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> Option<&Message> {
        match self {
            Self::Data(msg) => Some(msg),
            Self::Close => None,
        }
    }

    /// Take the payload of a data envelope.
    #[inline]
    #[must_use]
    pub fn into_payload(self) -> Option<Message> {
        match self {
            Self::Data(msg) => Some(msg),
            Self::Close => None,
        }
    }
}
