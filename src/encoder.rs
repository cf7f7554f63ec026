// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Rendering of metrics into the Statsd line format.
//!
//! This is a pure function layer: no I/O, no state. A rendered line has
//! the form `<prefix><key>:<value>|<type>` with an optional `|@<rate>`
//! suffix when the metric is sampled at a rate below 1.0. No trailing
//! newline is appended, framing is the transport layer's responsibility.

use crate::types::{ErrorKind, MetricError, MetricResult};
use std::fmt::{self, Write};

/// Type of metric that knows how to display its wire tag
#[derive(Debug, Clone, Copy)]
pub(crate) enum MetricType {
    Counter,
    Timer,
    Gauge,
    Set,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricType::Counter => "c".fmt(f),
            MetricType::Timer => "ms".fmt(f),
            MetricType::Gauge => "g".fmt(f),
            MetricType::Set => "s".fmt(f),
        }
    }
}

/// Holder for primitive metric values that knows how to display itself
///
/// This type is internal to how the values accepted by each metric
/// operation (via the `To*Value` traits) are rendered but is exposed
/// publicly for documentation purposes.
#[derive(Debug, Clone, Copy)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Signed(v) => v.fmt(f),
            MetricValue::Unsigned(v) => v.fmt(f),
            MetricValue::Float(v) => v.fmt(f),
        }
    }
}

/// Ensure a metric name can be rendered without corrupting the line
/// format. `:` and `|` are field delimiters and `\n` separates lines
/// within a buffered datagram, so none may appear in a name.
pub(crate) fn validate_key(key: &str) -> MetricResult<()> {
    if key.is_empty() {
        return Err(MetricError::from((
            ErrorKind::Encoding,
            "metric names must not be empty",
        )));
    }

    if key.chars().any(|c| matches!(c, ':' | '|' | '\n')) {
        return Err(MetricError::from((
            ErrorKind::Encoding,
            "metric names must not contain ':', '|', or newlines",
        )));
    }

    Ok(())
}

/// Ensure a sample rate is in the half-open interval (0, 1].
pub(crate) fn validate_rate(rate: f32) -> MetricResult<f32> {
    if rate > 0.0 && rate <= 1.0 {
        Ok(rate)
    } else {
        Err(MetricError::from((
            ErrorKind::Encoding,
            "sample rates must be greater than 0.0 and at most 1.0",
        )))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MetricFormatter<'a> {
    prefix: &'a str,
    key: &'a str,
    val: MetricValue,
    type_: MetricType,
    sample_rate: Option<f32>,
}

impl<'a> MetricFormatter<'a> {
    pub(crate) fn counter(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Counter)
    }

    pub(crate) fn timer(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Timer)
    }

    pub(crate) fn gauge(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Gauge)
    }

    pub(crate) fn set(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Set)
    }

    fn from_val(prefix: &'a str, key: &'a str, val: MetricValue, type_: MetricType) -> Self {
        MetricFormatter {
            prefix,
            key,
            val,
            type_,
            sample_rate: None,
        }
    }

    pub(crate) fn with_sample_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }

    /// Render the complete metric line, validating the name first. The
    /// prefix is written as given: no separator is inserted between it
    /// and the key.
    pub(crate) fn format(&self) -> MetricResult<String> {
        validate_key(self.key)?;

        let size_hint = self.prefix.len() + self.key.len() + 16;
        let mut line = String::with_capacity(size_hint);
        let _ = write!(line, "{}{}:{}|{}", self.prefix, self.key, self.val, self.type_);

        // A rate of exactly 1.0 means "always sent" which is the default
        // the server assumes, so the suffix is omitted.
        if let Some(rate) = self.sample_rate {
            if rate < 1.0 {
                let _ = write!(line, "|@{}", rate);
            }
        }

        Ok(line)
    }
}
