// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crossbeam_channel::{bounded, select, tick, Sender};
use std::mem;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::transport::Transport;
use crate::types::{ErrorKind, MetricError, MetricResult};

/// Handler invoked for errors that have no caller to return to, such as
/// transmission failures during a background flush.
pub(crate) type ErrorHandler = dyn Fn(MetricError) + Sync + Send + RefUnwindSafe;

/// Lines waiting for the next flush.
///
/// The `stopped` flag is flipped under the same lock as the final drain
/// so that an append racing `close()` either lands in the final set of
/// datagrams or fails, never silently after the last flush.
#[derive(Debug, Default)]
struct PendingBuffer {
    lines: Vec<String>,
    stopped: bool,
}

/// Buffered-mode manager: accumulates encoded metric lines and drains
/// them to a transport from a background thread on a fixed period.
///
/// The flush thread is created when the worker is spawned and runs until
/// `stop()` is called. Each tick atomically swaps the pending buffer for
/// an empty one and transmits the swapped-out lines as one or more
/// datagrams, none larger than the configured maximum size (except for a
/// single line that alone exceeds it, which is sent on its own rather
/// than truncated). Transmission failures are routed to the error
/// handler and do not stop the drain or the timer loop.
///
/// `stop()` is synchronous: it signals the thread, which performs one
/// final drain of any residual lines, and then joins it. Once `stop()`
/// returns no further flush will occur.
pub(crate) struct FlushWorker {
    pending: Arc<Mutex<PendingBuffer>>,
    transport: Arc<dyn Transport + Sync + Send + RefUnwindSafe>,
    max_datagram_size: usize,
    errors: Arc<ErrorHandler>,
    stop_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushWorker {
    pub(crate) fn spawn(
        transport: Arc<dyn Transport + Sync + Send + RefUnwindSafe>,
        flush_period: Duration,
        max_datagram_size: usize,
        errors: Arc<ErrorHandler>,
    ) -> FlushWorker {
        let pending = Arc::new(Mutex::new(PendingBuffer::default()));
        let (stop_tx, stop_rx) = bounded(1);

        let thread_pending = Arc::clone(&pending);
        let thread_transport = Arc::clone(&transport);
        let thread_errors = Arc::clone(&errors);

        let handle = thread::spawn(move || {
            let ticker = tick(flush_period);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        drain(&thread_pending, false, &*thread_transport, max_datagram_size, &*thread_errors);
                    }
                    recv(stop_rx) -> _ => break,
                }
            }

            // Final drain: residual lines are transmitted before the
            // thread exits so close() never drops buffered metrics.
            drain(&thread_pending, true, &*thread_transport, max_datagram_size, &*thread_errors);
        });

        FlushWorker {
            pending,
            transport,
            max_datagram_size,
            errors,
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Append one encoded line, to be sent on the next flush. Fails with
    /// a `ClosedClient` error once the final drain has run.
    pub(crate) fn append(&self, line: String) -> MetricResult<()> {
        let mut pending = self.pending.lock().unwrap();
        if pending.stopped {
            return Err(MetricError::from((
                ErrorKind::ClosedClient,
                "client has been closed",
            )));
        }

        pending.lines.push(line);
        Ok(())
    }

    /// Drain the pending buffer now, from the calling thread.
    pub(crate) fn flush_now(&self) {
        drain(
            &self.pending,
            false,
            &*self.transport,
            self.max_datagram_size,
            &*self.errors,
        );
    }

    /// Stop the timer loop and wait for the flush thread to finish its
    /// final drain. Does not return until the thread has fully stopped.
    pub(crate) fn stop(&self) {
        let _ = self.stop_tx.try_send(());
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn drain(
    pending: &Mutex<PendingBuffer>,
    finalize: bool,
    transport: &dyn Transport,
    max_datagram_size: usize,
    errors: &ErrorHandler,
) {
    let lines = {
        let mut pending = pending.lock().unwrap();
        if finalize {
            pending.stopped = true;
        }
        mem::take(&mut pending.lines)
    };

    if lines.is_empty() {
        return;
    }

    for datagram in pack(&lines, max_datagram_size) {
        if let Err(e) = transport.send(&datagram) {
            // Best-effort delivery: a failed datagram must not prevent
            // the rest of the drain or subsequent flushes.
            errors(MetricError::from(e));
        }
    }
}

/// Pack newline-suffixed lines into datagram payloads no larger than
/// `max_datagram_size` bytes. A single line that cannot fit even in an
/// empty datagram becomes its own oversized payload.
fn pack(lines: &[String], max_datagram_size: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();

    for line in lines {
        let needed = line.len() + 1;
        if !current.is_empty() && current.len() + needed > max_datagram_size {
            datagrams.push(mem::take(&mut current));
        }

        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        datagrams.push(current);
    }

    datagrams
}
