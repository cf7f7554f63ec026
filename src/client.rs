// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::net::ToSocketAddrs;
use std::panic::RefUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::{validate_rate, MetricFormatter, MetricValue};
use crate::flush::{ErrorHandler, FlushWorker};
use crate::sampler::Sampler;
use crate::transport::{Transport, TransportStats, UdpTransport};
use crate::types::{Counter, ErrorKind, Gauge, Metric, MetricError, MetricResult, Set, Timer};
use crate::{DEFAULT_FLUSH_PERIOD, DEFAULT_MAX_DATAGRAM_SIZE};

/// Conversion trait for valid values for counters
pub trait ToCounterValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToCounterValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Signed(self))
    }
}

/// Conversion trait for valid values for timers
pub trait ToTimerValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToTimerValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToTimerValue for Duration {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        let millis = self.as_millis();
        if millis > u64::MAX as u128 {
            Err(MetricError::from((
                ErrorKind::Encoding,
                "timer value out of range",
            )))
        } else {
            Ok(MetricValue::Unsigned(millis as u64))
        }
    }
}

/// Conversion trait for valid values for gauges
pub trait ToGaugeValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToGaugeValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToGaugeValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Float(self))
    }
}

/// Conversion trait for valid values for sets
pub trait ToSetValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToSetValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Signed(self))
    }
}

/// Trait for incrementing and decrementing counters.
///
/// Counters are simple values incremented or decremented by the client.
/// The rates at which these events occur or average values will be
/// determined by the server receiving them. Examples of counter uses
/// include number of logins to a system or requests received.
///
/// The sampled variant applies a sample rate in the range `(0.0, 1.0]`:
/// the counter is transmitted for roughly that fraction of calls and the
/// rate is included in the wire format so the server can scale the value
/// back up.
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait Counted<T>
where
    T: ToCounterValue,
{
    /// Increment or decrement the counter by the given amount
    fn count(&self, key: &str, count: T) -> MetricResult<Counter>;

    /// Increment or decrement the counter by the given amount, at the
    /// given sample rate
    fn count_sampled(&self, key: &str, count: T, rate: f32) -> MetricResult<Counter>;
}

/// Trait for convenience methods for counters
///
/// This trait specifically implements increment and decrement by one.
pub trait CountedExt: Counted<i64> {
    /// Increment the counter by 1
    fn incr(&self, key: &str) -> MetricResult<Counter> {
        self.count(key, 1)
    }

    /// Decrement the counter by 1
    fn decr(&self, key: &str) -> MetricResult<Counter> {
        self.count(key, -1)
    }
}

/// Trait for recording timings in milliseconds.
///
/// Timings are a positive number of milliseconds between a start and end
/// time. Examples include time taken to render a web page or time taken
/// for a database call to return. `Duration` values are converted to
/// milliseconds, losing any sub-millisecond precision.
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait Timed<T>
where
    T: ToTimerValue,
{
    /// Record a timing in milliseconds with the given key
    fn time(&self, key: &str, time: T) -> MetricResult<Timer>;

    /// Record a timing in milliseconds with the given key, at the given
    /// sample rate
    fn time_sampled(&self, key: &str, time: T, rate: f32) -> MetricResult<Timer>;
}

/// Trait for recording gauge values.
///
/// Gauge values are an instantaneous measurement of a value determined
/// by the client. They do not change unless changed by the client.
/// Examples include things like load average or how many connections are
/// active.
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait Gauged<T>
where
    T: ToGaugeValue,
{
    /// Record a gauge value with the given key
    fn gauge(&self, key: &str, value: T) -> MetricResult<Gauge>;
}

/// Trait for recording set values.
///
/// Sets count the number of unique elements in a group. You can use them
/// to, for example, count the unique visitors to your site.
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait Setted<T>
where
    T: ToSetValue,
{
    /// Record a single set value with the given key
    fn set(&self, key: &str, value: T) -> MetricResult<Set>;
}

/// Trait that encompasses all other traits for emitting metrics.
///
/// If you wish to use the client for any metric type without caring
/// about the exact implementation you can use this trait object:
///
/// ```no_run
/// use tempo::{Client, MetricClient};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let client: Arc<dyn MetricClient + Send + Sync> =
///     Arc::new(Client::udp("localhost:8125").unwrap().build());
/// client.incr("some.counter").unwrap();
/// client.time("some.timer", Duration::from_millis(42)).unwrap();
/// ```
pub trait MetricClient:
    Counted<i64> + CountedExt + Timed<u64> + Timed<Duration> + Gauged<u64> + Gauged<f64> + Setted<i64>
{
}

fn nop_error_handler(_err: MetricError) {}

/// Builder for creating and customizing `Client` instances.
///
/// Instances of the builder should be created by calling `Client::udp`
/// or `Client::from_transport`. By default the resulting client emits
/// each metric immediately, as its own datagram, on the caller's thread.
/// Calling `.buffered()` instead gives a client that accumulates metrics
/// and sends them in batches from a background thread on a fixed period.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tempo::Client;
///
/// let client = Client::udp("localhost:8125")
///     .unwrap()
///     .with_prefix("my.service.")
///     .with_flush_period(Duration::from_millis(100))
///     .buffered()
///     .build();
/// ```
pub struct ClientBuilder {
    prefix: String,
    transport: Arc<dyn Transport + Sync + Send + RefUnwindSafe>,
    buffered: bool,
    flush_period: Duration,
    max_datagram_size: usize,
    errors: Arc<ErrorHandler>,
}

impl ClientBuilder {
    fn new(transport: Arc<dyn Transport + Sync + Send + RefUnwindSafe>) -> Self {
        ClientBuilder {
            prefix: String::new(),
            transport,
            buffered: false,
            flush_period: DEFAULT_FLUSH_PERIOD,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            errors: Arc::new(nop_error_handler),
        }
    }

    /// Set a prefix prepended verbatim to every metric key.
    ///
    /// No separator is added: pass `"my.service."` rather than
    /// `"my.service"` if you want dotted names.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Emit metrics in batches from a background thread instead of one
    /// datagram per metric on the caller's thread.
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Set the interval between background flushes in buffered mode.
    /// Ignored in immediate mode.
    pub fn with_flush_period(mut self, period: Duration) -> Self {
        self.flush_period = period;
        self
    }

    /// Set the maximum payload size, in bytes, of datagrams assembled in
    /// buffered mode. Ignored in immediate mode.
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Set a handler for errors that have no caller to return to, such
    /// as transmission failures during a background flush.
    ///
    /// In immediate mode every error is returned from the emitting call
    /// and the handler is never invoked.
    pub fn with_error_handler<F>(mut self, errors: F) -> Self
    where
        F: Fn(MetricError) + Sync + Send + RefUnwindSafe + 'static,
    {
        self.errors = Arc::new(errors);
        self
    }

    /// Construct the client. In buffered mode this starts the background
    /// flush thread.
    pub fn build(self) -> Client {
        let mode = if self.buffered {
            Mode::Buffered(FlushWorker::spawn(
                Arc::clone(&self.transport),
                self.flush_period,
                self.max_datagram_size,
                self.errors,
            ))
        } else {
            Mode::Immediate
        };

        Client {
            prefix: self.prefix,
            transport: self.transport,
            mode,
            closed: AtomicBool::new(false),
        }
    }
}

enum Mode {
    Immediate,
    Buffered(FlushWorker),
}

/// Client for Statsd metrics over UDP.
///
/// The client supports:
///
/// * Counters, or incrementing and decrementing values
/// * Timers, or the duration taken by an operation in milliseconds
/// * Gauges, or instantaneous point-in-time values
/// * Sets, or the count of unique values seen
///
/// Each of the methods for emitting a metric returns the metric that was
/// recorded, or an error if it could not be encoded or sent.
///
/// In the default immediate mode, every call sends the metric as its own
/// UDP datagram before returning. In buffered mode (see
/// `ClientBuilder::buffered`) calls only append the encoded metric to an
/// in-memory buffer; a background thread drains the buffer on a fixed
/// period, packing the accumulated metrics into as few datagrams as
/// possible. Buffered callers that need errors from the background
/// flushes should install a handler with
/// `ClientBuilder::with_error_handler`.
///
/// The client is thread safe: emitting methods take `&self` and may be
/// called concurrently, typically via an `Arc`.
pub struct Client {
    prefix: String,
    transport: Arc<dyn Transport + Sync + Send + RefUnwindSafe>,
    mode: Mode,
    closed: AtomicBool,
}

impl Client {
    /// Create a builder for a client sending metrics to the given
    /// address over UDP.
    ///
    /// Resolves the address and binds a local socket, failing with a
    /// `Transport` error if either cannot be done.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tempo::Client;
    ///
    /// let client = Client::udp(("metrics.example.com", 8125))
    ///     .unwrap()
    ///     .with_prefix("my.service.")
    ///     .build();
    /// ```
    pub fn udp<A>(addr: A) -> MetricResult<ClientBuilder>
    where
        A: ToSocketAddrs,
    {
        let transport = UdpTransport::new(addr)?;
        Ok(Self::from_transport(transport))
    }

    /// Create a builder for a client sending metrics via the given
    /// transport implementation. Useful for testing.
    pub fn from_transport<T>(transport: T) -> ClientBuilder
    where
        T: Transport + Sync + Send + RefUnwindSafe + 'static,
    {
        ClientBuilder::new(Arc::new(transport))
    }

    /// Send any buffered metrics now, from the calling thread, without
    /// waiting for the next periodic flush. A no-op in immediate mode.
    pub fn flush(&self) -> MetricResult<()> {
        self.check_closed()?;
        if let Mode::Buffered(worker) = &self.mode {
            worker.flush_now();
        }
        Ok(())
    }

    /// Close the client. In buffered mode this flushes any remaining
    /// buffered metrics and stops the background thread, not returning
    /// until both are done.
    ///
    /// Emitting methods called after `close()` fail with a
    /// `ClosedClient` error. Closing an already closed client is a
    /// no-op. The client also closes itself when dropped.
    pub fn close(&self) -> MetricResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Mode::Buffered(worker) = &self.mode {
            worker.stop();
        }

        Ok(())
    }

    /// Telemetry counters for the underlying transport.
    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }

    fn check_closed(&self) -> MetricResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(MetricError::from((
                ErrorKind::ClosedClient,
                "client has been closed",
            )))
        } else {
            Ok(())
        }
    }

    fn emit<T>(&self, line: String) -> MetricResult<T>
    where
        T: Metric + From<String>,
    {
        self.check_closed()?;

        match &self.mode {
            Mode::Immediate => {
                let metric = T::from(line);
                self.transport.send(metric.as_metric_str())?;
                Ok(metric)
            }
            Mode::Buffered(worker) => {
                worker.append(line.clone())?;
                Ok(T::from(line))
            }
        }
    }

    fn emit_sampled<T>(&self, mut formatter: MetricFormatter<'_>, rate: f32) -> MetricResult<T>
    where
        T: Metric + From<String>,
    {
        self.check_closed()?;
        let rate = validate_rate(rate)?;
        formatter.with_sample_rate(rate);
        let line = formatter.format()?;

        if Sampler::new(rate).roll() {
            self.emit(line)
        } else {
            // Not picked for this sample: the metric is still returned
            // to the caller, it just isn't transmitted.
            Ok(T::from(line))
        }
    }
}

impl<T> Counted<T> for Client
where
    T: ToCounterValue,
{
    fn count(&self, key: &str, count: T) -> MetricResult<Counter> {
        let line = MetricFormatter::counter(&self.prefix, key, count.try_to_value()?).format()?;
        self.emit(line)
    }

    fn count_sampled(&self, key: &str, count: T, rate: f32) -> MetricResult<Counter> {
        let formatter = MetricFormatter::counter(&self.prefix, key, count.try_to_value()?);
        self.emit_sampled(formatter, rate)
    }
}

impl CountedExt for Client {}

impl<T> Timed<T> for Client
where
    T: ToTimerValue,
{
    fn time(&self, key: &str, time: T) -> MetricResult<Timer> {
        let line = MetricFormatter::timer(&self.prefix, key, time.try_to_value()?).format()?;
        self.emit(line)
    }

    fn time_sampled(&self, key: &str, time: T, rate: f32) -> MetricResult<Timer> {
        let formatter = MetricFormatter::timer(&self.prefix, key, time.try_to_value()?);
        self.emit_sampled(formatter, rate)
    }
}

impl<T> Gauged<T> for Client
where
    T: ToGaugeValue,
{
    fn gauge(&self, key: &str, value: T) -> MetricResult<Gauge> {
        let line = MetricFormatter::gauge(&self.prefix, key, value.try_to_value()?).format()?;
        self.emit(line)
    }
}

impl<T> Setted<T> for Client
where
    T: ToSetValue,
{
    fn set(&self, key: &str, value: T) -> MetricResult<Set> {
        let line = MetricFormatter::set(&self.prefix, key, value.try_to_value()?).format()?;
        self.emit(line)
    }
}

impl MetricClient for Client {}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Client {{ prefix: {:?}, mode: {}, closed: {} }}",
            self.prefix,
            match self.mode {
                Mode::Immediate => "immediate",
                Mode::Buffered(_) => "buffered",
            },
            self.closed.load(Ordering::Acquire),
        )
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
