// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{ErrorKind, MetricError, MetricResult};

/// Attempt to convert anything implementing the `ToSocketAddrs` trait
/// into a concrete `SocketAddr` instance, returning a `Transport` error
/// if the address could not be resolved.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn get_addr<A: ToSocketAddrs>(addr: A) -> MetricResult<SocketAddr> {
    match addr.to_socket_addrs().map_err(MetricError::transport)?.next() {
        Some(addr) => Ok(addr),
        None => Err(MetricError::from((
            ErrorKind::Transport,
            "No socket addresses yielded",
        ))),
    }
}

/// Snapshot of I/O telemetry for a transport.
#[derive(Clone, Debug, Default)]
pub struct TransportStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

/// Shared counters updated as datagrams are sent or fail to send.
#[derive(Debug, Clone, Default)]
pub(crate) struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    pub(crate) fn update(&self, res: io::Result<usize>, len: usize) -> io::Result<usize> {
        match res {
            Ok(written) => {
                self.bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(written)
            }
            Err(e) => {
                self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

impl From<&SocketStats> for TransportStats {
    fn from(stats: &SocketStats) -> Self {
        TransportStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Trait for backends that transmit rendered metric payloads somewhere.
///
/// A payload is the complete content of a single datagram: one metric
/// line in immediate mode, or multiple newline-suffixed lines packed
/// together in buffered mode. Transports never wait for acknowledgement,
/// delivery is fire-and-forget.
pub trait Transport {
    /// Send one datagram payload, returning the number of bytes written
    /// or an I/O error.
    fn send(&self, payload: &str) -> io::Result<usize>;

    /// Return I/O telemetry like bytes / packets sent or dropped.
    ///
    /// Not all transports track telemetry, the default implementation
    /// returns zeros.
    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Implementation of a `Transport` that sends each payload as one UDP
/// datagram to a fixed destination address.
#[derive(Debug)]
pub struct UdpTransport {
    addr: SocketAddr,
    socket: UdpSocket,
    stats: SocketStats,
}

impl UdpTransport {
    /// Resolve the destination address and bind a local ephemeral UDP
    /// socket for sending to it.
    ///
    /// # Failures
    ///
    /// This method fails with a `Transport` error if the hostname cannot
    /// be resolved, the address cannot be parsed, or the local socket
    /// cannot be bound.
    pub fn new<A>(to_addr: A) -> MetricResult<UdpTransport>
    where
        A: ToSocketAddrs,
    {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(MetricError::transport)?;
        Self::from_socket(to_addr, socket)
    }

    /// Construct a transport from an already bound socket. The socket
    /// should have any desired configuration applied (blocking vs
    /// non-blocking, timeouts, etc.).
    pub fn from_socket<A>(to_addr: A, socket: UdpSocket) -> MetricResult<UdpTransport>
    where
        A: ToSocketAddrs,
    {
        let addr = get_addr(to_addr)?;
        let stats = SocketStats::default();
        Ok(UdpTransport { addr, socket, stats })
    }
}

impl Transport for UdpTransport {
    fn send(&self, payload: &str) -> io::Result<usize> {
        self.stats
            .update(self.socket.send_to(payload.as_bytes(), self.addr), payload.len())
    }

    fn stats(&self) -> TransportStats {
        (&self.stats).into()
    }
}

/// Implementation of a `Transport` that discards all payloads.
///
/// Useful for disabling metric collection or unit tests.
#[derive(Debug, Clone)]
pub struct NopTransport;

impl Transport for NopTransport {
    fn send(&self, _payload: &str) -> io::Result<usize> {
        Ok(0)
    }
}

/// `Transport` implementation that writes all payloads to the `Sender`
/// half of a channel while callers are given ownership of the `Receiver`
/// half.
///
/// This is not a general purpose transport, rather it's meant for
/// verifying datagram payloads during the course of integration tests.
/// By default the channel used is unbounded; the channel size can be
/// limited with the `with_capacity` method.
#[derive(Debug)]
pub struct SpyTransport {
    sender: Sender<Vec<u8>>,
    stats: SocketStats,
}

impl SpyTransport {
    pub fn new() -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(None)
    }

    pub fn with_capacity(queue: usize) -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(Some(queue))
    }

    fn with_queue_capacity(queue: Option<usize>) -> (Receiver<Vec<u8>>, Self) {
        let (tx, rx) = match queue {
            Some(sz) => bounded(sz),
            None => unbounded(),
        };
        let transport = SpyTransport {
            sender: tx,
            stats: SocketStats::default(),
        };
        (rx, transport)
    }
}

impl Transport for SpyTransport {
    fn send(&self, payload: &str) -> io::Result<usize> {
        let res = match self.sender.try_send(payload.as_bytes().to_vec()) {
            Err(TrySendError::Disconnected(_)) => {
                Err(io::Error::new(io::ErrorKind::Other, "channel disconnected"))
            }
            Err(TrySendError::Full(_)) => Err(io::Error::new(io::ErrorKind::Other, "channel full")),
            Ok(_) => Ok(payload.len()),
        };

        self.stats.update(res, payload.len())
    }

    fn stats(&self) -> TransportStats {
        TransportStats::from(&self.stats)
    }
}
