// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error;
use std::fmt;
use std::io;

/// Trait for metrics that have been rendered to the Statsd wire format.
///
/// The string representation is the full line as it would appear in a UDP
/// datagram, without a trailing newline (framing is the transport's job).
pub trait Metric {
    fn as_metric_str(&self) -> &str;
}

/// Counter metric, rendered with the `c` type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    repr: String,
}

impl Counter {
    pub fn new(prefix: &str, key: &str, count: i64) -> Counter {
        Counter {
            repr: format!("{}{}:{}|c", prefix, key, count),
        }
    }
}

impl From<String> for Counter {
    fn from(line: String) -> Self {
        Counter { repr: line }
    }
}

impl Metric for Counter {
    fn as_metric_str(&self) -> &str {
        &self.repr
    }
}

/// Timer metric in milliseconds, rendered with the `ms` type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    repr: String,
}

impl Timer {
    pub fn new(prefix: &str, key: &str, time: u64) -> Timer {
        Timer {
            repr: format!("{}{}:{}|ms", prefix, key, time),
        }
    }
}

impl From<String> for Timer {
    fn from(line: String) -> Self {
        Timer { repr: line }
    }
}

impl Metric for Timer {
    fn as_metric_str(&self) -> &str {
        &self.repr
    }
}

/// Gauge metric, rendered with the `g` type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    repr: String,
}

impl Gauge {
    pub fn new(prefix: &str, key: &str, value: u64) -> Gauge {
        Gauge {
            repr: format!("{}{}:{}|g", prefix, key, value),
        }
    }

    pub fn new_f64(prefix: &str, key: &str, value: f64) -> Gauge {
        Gauge {
            repr: format!("{}{}:{}|g", prefix, key, value),
        }
    }
}

impl From<String> for Gauge {
    fn from(line: String) -> Self {
        Gauge { repr: line }
    }
}

impl Metric for Gauge {
    fn as_metric_str(&self) -> &str {
        &self.repr
    }
}

/// Set metric, rendered with the `s` type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set {
    repr: String,
}

impl Set {
    pub fn new(prefix: &str, key: &str, value: i64) -> Set {
        Set {
            repr: format!("{}{}:{}|s", prefix, key, value),
        }
    }
}

impl From<String> for Set {
    fn from(line: String) -> Self {
        Set { repr: line }
    }
}

impl Metric for Set {
    fn as_metric_str(&self) -> &str {
        &self.repr
    }
}

/// Category of error encountered while constructing a client or emitting
/// a metric.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Metric name or sample rate cannot be rendered to the wire format.
    /// Fatal to the single call, the client is unaffected.
    Encoding,
    /// Address resolution or socket bind failed at construction time. No
    /// usable client is produced.
    Transport,
    /// A datagram could not be transmitted. Best-effort: returned to the
    /// caller in immediate mode, routed to the error handler during
    /// background flushes.
    Send,
    /// An operation was attempted after `close()`.
    ClosedClient,
}

/// Error generated by this library.
#[derive(Debug)]
pub struct MetricError {
    repr: ErrorRepr,
}

#[derive(Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    Io(ErrorKind, io::Error),
}

impl MetricError {
    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _) => kind,
            ErrorRepr::Io(kind, _) => kind,
        }
    }

    /// Wrap an I/O error from address resolution or socket setup.
    pub(crate) fn transport(err: io::Error) -> MetricError {
        MetricError {
            repr: ErrorRepr::Io(ErrorKind::Transport, err),
        }
    }
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
            ErrorRepr::Io(_, ref err) => err.fmt(f),
        }
    }
}

impl error::Error for MetricError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::Io(_, ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> MetricError {
        MetricError {
            repr: ErrorRepr::Io(ErrorKind::Send, err),
        }
    }
}

impl From<(ErrorKind, &'static str)> for MetricError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MetricError {
        MetricError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

pub type MetricResult<T> = Result<T, MetricError>;
