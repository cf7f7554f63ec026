use crossbeam_channel::Receiver;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempo::prelude::*;
use tempo::{Client, ErrorKind, SpyTransport};

mod utils;
use utils::{run_arc_threaded_test, NUM_ITERATIONS, NUM_THREADS};

// Flushing is driven by flush() and close() in these tests, so the
// periodic timer is set far enough out that it never fires.
const NO_TIMER: Duration = Duration::from_secs(3600);

fn new_spy_client(prefix: &str) -> (Receiver<Vec<u8>>, Client) {
    let (rx, transport) = SpyTransport::new();
    let client = Client::from_transport(transport).with_prefix(prefix).build();
    (rx, client)
}

fn new_buffered_spy_client(prefix: &str) -> (Receiver<Vec<u8>>, Client) {
    let (rx, transport) = SpyTransport::new();
    let client = Client::from_transport(transport)
        .with_prefix(prefix)
        .with_flush_period(NO_TIMER)
        .buffered()
        .build();
    (rx, client)
}

fn drain_lines(rx: &Receiver<Vec<u8>>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(datagram) = rx.try_recv() {
        let payload = String::from_utf8(datagram).unwrap();
        for line in payload.lines() {
            lines.push(line.to_string());
        }
    }
    lines
}

#[test]
fn test_spy_client_single_threaded() {
    let (_rx, client) = new_spy_client("tempo.");
    run_arc_threaded_test(client, 1, 1);
}

#[test]
fn test_buffered_spy_client_single_threaded() {
    let (_rx, client) = new_buffered_spy_client("tempo.");
    run_arc_threaded_test(client, 1, 1);
}

#[test]
fn test_immediate_client_one_datagram_per_metric() {
    let (rx, client) = new_spy_client("tempo.");

    client.incr("some.counter").unwrap();
    client.gauge("some.gauge", 42_u64).unwrap();

    assert_eq!("tempo.some.counter:1|c".as_bytes(), rx.try_recv().unwrap().as_slice());
    assert_eq!("tempo.some.gauge:42|g".as_bytes(), rx.try_recv().unwrap().as_slice());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_buffered_client_batches_into_single_datagram() {
    let (rx, client) = new_buffered_spy_client("tempo.");

    client.incr("some.counter").unwrap();
    client.gauge("some.gauge", 42_u64).unwrap();
    client.time("some.timer", 153_u64).unwrap();

    // Nothing is sent until a flush.
    assert!(rx.try_recv().is_err());
    client.flush().unwrap();

    let payload = String::from_utf8(rx.try_recv().unwrap()).unwrap();
    assert_eq!(
        "tempo.some.counter:1|c\ntempo.some.gauge:42|g\ntempo.some.timer:153|ms\n",
        payload
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_buffered_client_close_drains_residual() {
    let (rx, client) = new_buffered_spy_client("tempo.");

    client.incr("some.counter").unwrap();
    client.close().unwrap();

    let payload = String::from_utf8(rx.try_recv().unwrap()).unwrap();
    assert_eq!("tempo.some.counter:1|c\n", payload);
}

#[test]
fn test_buffered_client_drop_drains_residual() {
    let (rx, client) = new_buffered_spy_client("tempo.");

    client.incr("some.counter").unwrap();
    drop(client);

    let payload = String::from_utf8(rx.try_recv().unwrap()).unwrap();
    assert_eq!("tempo.some.counter:1|c\n", payload);
}

#[test]
fn test_buffered_client_periodic_flush() {
    let (rx, transport) = SpyTransport::new();
    let client = Client::from_transport(transport)
        .with_prefix("tempo.")
        .with_flush_period(Duration::from_millis(10))
        .buffered()
        .build();

    client.incr("some.counter").unwrap();

    let datagram = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!("tempo.some.counter:1|c\n".as_bytes(), datagram.as_slice());
}

#[test]
fn test_buffered_client_respects_datagram_size_limit() {
    let (rx, transport) = SpyTransport::new();
    let client = Client::from_transport(transport)
        .with_prefix("tempo.")
        .with_flush_period(NO_TIMER)
        .with_max_datagram_size(64)
        .buffered()
        .build();

    let mut expected = BTreeMap::new();
    for i in 0..100_i64 {
        let counter = client.count("some.counter", i).unwrap();
        *expected.entry(counter.as_metric_str().to_string()).or_insert(0_u64) += 1;
    }
    client.close().unwrap();

    let mut received = BTreeMap::new();
    let mut datagrams = 0;
    while let Ok(datagram) = rx.try_recv() {
        assert!(datagram.len() <= 64, "datagram of {} bytes", datagram.len());
        datagrams += 1;
        let payload = String::from_utf8(datagram).unwrap();
        for line in payload.lines() {
            *received.entry(line.to_string()).or_insert(0_u64) += 1;
        }
    }

    // Every metric arrived exactly once, and batching actually happened.
    assert_eq!(expected, received);
    assert!(datagrams < 100);
}

#[test]
fn test_buffered_client_send_errors_go_to_handler() {
    // A zero-capacity channel rejects every send.
    let (_rx, transport) = SpyTransport::with_capacity(0);
    let failures = Arc::new(AtomicUsize::new(0));
    let failures_ref = Arc::clone(&failures);

    let client = Client::from_transport(transport)
        .with_flush_period(NO_TIMER)
        .with_max_datagram_size(16)
        .buffered()
        .with_error_handler(move |err| {
            assert_eq!(ErrorKind::Send, err.kind());
            failures_ref.fetch_add(1, Ordering::Release);
        })
        .build();

    // Small datagram limit forces one datagram per metric, so each of
    // these fails separately and the drain keeps going after the first.
    client.incr("some.counter").unwrap();
    client.incr("other.counter").unwrap();
    client.close().unwrap();

    assert_eq!(2, failures.load(Ordering::Acquire));
}

#[test]
fn test_closed_client_rejects_metrics() {
    let (_rx, client) = new_buffered_spy_client("tempo.");
    client.close().unwrap();

    let err = client.incr("some.counter").unwrap_err();
    assert_eq!(ErrorKind::ClosedClient, err.kind());
}

#[test]
fn test_concurrent_buffered_emission_preserves_lines() {
    let (rx, client) = new_buffered_spy_client("tempo.");
    let client = Arc::new(client);

    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let local_client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..NUM_ITERATIONS {
                    local_client.count("some.counter", (t * 1000 + i) as i64).unwrap();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
    client.close().unwrap();

    // Every line must come through whole, never interleaved or split.
    let lines = drain_lines(&rx);
    assert_eq!((NUM_THREADS * NUM_ITERATIONS) as usize, lines.len());
    for line in lines {
        assert!(line.starts_with("tempo.some.counter:"), "bad line {:?}", line);
        assert!(line.ends_with("|c"), "bad line {:?}", line);
    }
}
