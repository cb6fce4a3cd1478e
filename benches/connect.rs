//! Manual (non-criterion) timing of the TCP connect/accept path over
//! loopback. `harness = false` in `Cargo.toml`: this crate dropped
//! `criterion` along with the rest of the prior heavyweight research
//! benchmark stack (see `DESIGN.md`), so this is a small hand-rolled loop
//! timer.

use polyconn::connection::{create_accepted_tcp, create_socket_tcp};
use polyconn::event_loop::EventLoop;
use polyconn::socket;
use std::time::{Duration, Instant};

const ITERATIONS: usize = 2000;

fn main() {
    let mut el = EventLoop::new(64).expect("event loop");
    let listener = socket::bind_listener("127.0.0.1:0".parse().unwrap(), true, false, 128).expect("bind");
    let addr = listener.local_addr().unwrap();
    let std_listener = std::net::TcpListener::from(listener);
    std_listener.set_nonblocking(true).unwrap();

    let start = Instant::now();
    let mut completed = 0usize;

    for _ in 0..ITERATIONS {
        let token = el.next_token();
        let registry = el.registry();
        let mut client = create_socket_tcp(token, registry);
        client.connect(addr, None, Box::new(|_| {})).expect("connect");

        let mut tries = 0;
        let accepted = loop {
            match std_listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock && tries < 10_000 => {
                    tries += 1;
                    continue;
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        };
        accepted.set_nonblocking(true).unwrap();

        let server_token = el.next_token();
        let server_registry = el.registry();
        let mut server = create_accepted_tcp(server_token, server_registry, mio::net::TcpStream::from_std(accepted));
        server.accept(Box::new(|_| {}));

        completed += 1;
        client.close(false);
        server.close(false);
    }

    let elapsed = start.elapsed();
    println!("connect+accept x{completed}: {elapsed:?} total, {:?} per iteration", elapsed / completed.max(1) as u32);
    assert!(elapsed < Duration::from_secs(60), "unexpectedly slow loopback connect loop");
}
