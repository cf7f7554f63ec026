// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A minimal Statsd client for Rust!
//!
//! Tempo emits application metrics (counters, timers, gauges, and sets)
//! to a [Statsd](https://github.com/etsy/statsd) server over UDP.
//!
//! ## Features
//!
//! * Support for emitting counters, timers, gauges, and sets to Statsd
//!   over UDP, with optional sampling.
//! * A choice between immediate emission (one synchronous datagram per
//!   metric) and buffered emission (metrics batched into as few
//!   datagrams as possible, flushed periodically from a background
//!   thread).
//! * Thread safe clients that can be shared between threads behind an
//!   `Arc`.
//! * Simple, pluggable transports for testing or non-UDP delivery.
//!
//! ## Usage
//!
//! A simple client that sends each metric right away:
//!
//! ```no_run
//! use tempo::prelude::*;
//!
//! let client = Client::udp("localhost:8125")
//!     .unwrap()
//!     .with_prefix("my.service.")
//!     .build();
//!
//! client.incr("requests").unwrap();
//! client.time("request.latency", 153_u64).unwrap();
//! client.gauge("connections", 42_u64).unwrap();
//! ```
//!
//! A buffered client that batches metrics and flushes them every 100ms
//! or whenever a datagram fills up:
//!
//! ```no_run
//! use std::time::Duration;
//! use tempo::prelude::*;
//!
//! let client = Client::udp("localhost:8125")
//!     .unwrap()
//!     .with_prefix("my.service.")
//!     .with_flush_period(Duration::from_millis(100))
//!     .buffered()
//!     .with_error_handler(|e| eprintln!("metric flush error: {}", e))
//!     .build();
//!
//! client.incr("requests").unwrap();
//! // Residual metrics are flushed when the client is closed or dropped.
//! client.close().unwrap();
//! ```
//!
//! ## Buffering and errors
//!
//! In immediate mode every emitting call performs a send and any error
//! is returned to the caller. In buffered mode emitting calls only do an
//! in-memory append; transmission happens later, on a background thread,
//! so send errors are passed to the handler registered with
//! `ClientBuilder::with_error_handler` instead. Emitting calls still
//! return encoding errors (invalid keys, invalid sample rates) and a
//! `ClosedClient` error once the client has been closed.
//!
//! Metrics and their delivery are best effort: UDP is fire-and-forget
//! and a failed datagram never interrupts a flush.

#![forbid(unsafe_code)]

pub const DEFAULT_PORT: u16 = 8125;

/// Interval between background flushes of a buffered client.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_millis(100);

/// Maximum payload size of datagrams assembled by a buffered client.
/// Picked to fit in a single Ethernet frame after IP and UDP headers.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1432;

use std::time::Duration;

pub mod prelude;

mod client;
mod encoder;
mod flush;
mod sampler;
mod transport;
mod types;

pub use crate::client::{
    Client, ClientBuilder, Counted, CountedExt, Gauged, MetricClient, Setted, Timed,
    ToCounterValue, ToGaugeValue, ToSetValue, ToTimerValue,
};
pub use crate::encoder::MetricValue;
pub use crate::transport::{NopTransport, SpyTransport, Transport, TransportStats, UdpTransport};
pub use crate::types::{
    Counter, ErrorKind, Gauge, Metric, MetricError, MetricResult, Set, Timer,
};
