//! TCP socket tuning for store connections.
//!
//! compio owns the socket; these helpers borrow its raw handle through a
//! `socket2::Socket` that is never closed.
//!
//! # Safety
//!
//! The borrowed `Socket` is wrapped in `ManuallyDrop`, so the descriptor
//! stays owned by the compio stream.

#![allow(unsafe_code)]

use std::io;
use std::mem::ManuallyDrop;
use std::time::Duration;

fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    #[cfg(unix)]
    let sock = {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        ManuallyDrop::new(unsafe { socket2::Socket::from_raw_fd(stream.as_raw_fd()) })
    };

    #[cfg(windows)]
    let sock = {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        ManuallyDrop::new(unsafe { socket2::Socket::from_raw_socket(stream.as_raw_socket()) })
    };

    f(&sock)
}

/// Disable Nagle's algorithm.
///
/// A batch is written in one go and then the client waits for replies, so
/// there is nothing to coalesce.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    with_socket(stream, |sock| sock.set_nodelay(true))
}

/// Enable TCP keepalive probes after `idle` without traffic.
///
/// A relay can sit idle for long stretches; keepalive lets a dead peer
/// surface as a transport error on the next flush instead of a hang.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
pub fn configure_tcp_keepalive(stream: &compio::net::TcpStream, idle: Duration) -> io::Result<()> {
    let keepalive = socket2::TcpKeepalive::new().with_time(idle);
    with_socket(stream, |sock| sock.set_tcp_keepalive(&keepalive))
}
