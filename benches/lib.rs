use criterion::{criterion_group, criterion_main, Criterion};
use std::net::UdpSocket;
use std::time::Duration;
use tempo::prelude::*;
use tempo::{Client, NopTransport, UdpTransport, DEFAULT_PORT};

const TARGET_HOST: (&str, u16) = ("127.0.0.1", DEFAULT_PORT);
const TIMING: Duration = Duration::from_millis(153);

fn new_nop_client() -> Client {
    Client::from_transport(NopTransport)
        .with_prefix("prefix.")
        .build()
}

fn new_udp_client() -> Client {
    Client::udp(TARGET_HOST)
        .unwrap()
        .with_prefix("prefix.")
        .build()
}

fn new_buffered_udp_client() -> Client {
    let socket = UdpSocket::bind("0.0.0.0:0").unwrap();
    let transport = UdpTransport::from_socket(TARGET_HOST, socket).unwrap();
    Client::from_transport(transport)
        .with_prefix("prefix.")
        .with_flush_period(Duration::from_millis(100))
        .buffered()
        .build()
}

// One counter, one gauge, and one timing per iteration, the typical mix
// emitted per unit of work in an instrumented request path.
fn emit_mix(client: &Client) {
    client.incr("foo.bar.counter").unwrap();
    client.gauge("foo.bar.gauge", 42_u64).unwrap();
    client.time("foo.bar.timing", TIMING).unwrap();
}

fn benchmark_client_nop(c: &mut Criterion) {
    let client = new_nop_client();
    c.bench_function("client_nop", |b| b.iter(|| emit_mix(&client)));
}

fn benchmark_client_udp(c: &mut Criterion) {
    let client = new_udp_client();
    c.bench_function("client_udp", |b| b.iter(|| emit_mix(&client)));
}

fn benchmark_client_buffered_udp(c: &mut Criterion) {
    let client = new_buffered_udp_client();
    c.bench_function("client_buffered_udp", |b| b.iter(|| emit_mix(&client)));
    client.close().unwrap();
}

criterion_group!(
    benches,
    benchmark_client_nop,
    benchmark_client_udp,
    benchmark_client_buffered_udp,
);

criterion_main!(benches);
