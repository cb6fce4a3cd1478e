//! End-to-end connection scenarios driven through a real `EventLoop`,
//! exercising the TCP variant's state machine the way a host application
//! actually would: register, poll, dispatch.

use polyconn::connection::{create_accepted_tcp, create_socket_tcp};
use polyconn::event_loop::EventLoop;
use polyconn::socket;
use polyconn::ConnState;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn poll_until(el: &mut EventLoop, mut tick: impl FnMut(&mut EventLoop) -> bool, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if tick(el) {
            return;
        }
    }
    panic!("condition not met within {timeout:?}");
}

#[test]
fn tcp_connect_success_fires_handler_exactly_once_and_clears_write_slot() {
    let mut el = EventLoop::new(64).unwrap();
    let listener = socket::bind_listener("127.0.0.1:0".parse().unwrap(), true, false, 128).unwrap();
    let addr = listener.local_addr().unwrap();
    let std_listener = std::net::TcpListener::from(listener);
    std_listener.set_nonblocking(true).unwrap();

    let token = el.next_token();
    let registry = el.registry();
    let mut client = create_socket_tcp(token, registry);

    let fire_count = Arc::new(Mutex::new(0));
    let fire_count_handle = fire_count.clone();
    client
        .connect(addr, None, Box::new(move |c| {
            *fire_count_handle.lock().unwrap() += 1;
            assert_eq!(c.get_state(), ConnState::Connected);
        }))
        .unwrap();

    // Drive the accept side directly (no event loop needed for a listener
    // in this test — we only care about the client's state machine).
    let mut tries = 0;
    loop {
        match std_listener.accept() {
            Ok(_) => break,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock && tries < 10_000 => {
                tries += 1;
                std::thread::sleep(Duration::from_micros(100));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    }

    poll_until(
        &mut el,
        |el| {
            let ready = el.poll_once(Some(Duration::from_millis(50))).unwrap();
            for (_, readiness) in ready {
                client.handle_event(readiness);
            }
            client.get_state() == ConnState::Connected
        },
        Duration::from_secs(5),
    );

    assert_eq!(*fire_count.lock().unwrap(), 1);
    assert!(!client.has_write_handler());
}

#[test]
fn tcp_connect_refused_surfaces_econnrefused() {
    // Bind, grab the address, then drop the listener so the port refuses.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut el = EventLoop::new(64).unwrap();
    let token = el.next_token();
    let registry = el.registry();
    let mut client = create_socket_tcp(token, registry);

    let errored = Arc::new(Mutex::new(false));
    let errored_handle = errored.clone();
    client
        .connect(addr, None, Box::new(move |c| {
            *errored_handle.lock().unwrap() = true;
            assert_eq!(c.get_state(), ConnState::Error);
        }))
        .unwrap();

    poll_until(
        &mut el,
        |el| {
            let ready = el.poll_once(Some(Duration::from_millis(50))).unwrap();
            for (_, readiness) in ready {
                client.handle_event(readiness);
            }
            *errored.lock().unwrap()
        },
        Duration::from_secs(5),
    );

    assert_eq!(client.get_state(), ConnState::Error);
    assert!(client.get_last_error().is_some());
}

#[test]
fn accepted_tcp_connection_echoes_over_a_real_socket() {
    let mut el = EventLoop::new(64).unwrap();
    let listener = socket::bind_listener("127.0.0.1:0".parse().unwrap(), true, false, 128).unwrap();
    let addr = listener.local_addr().unwrap();
    let std_listener = std::net::TcpListener::from(listener);
    std_listener.set_nonblocking(true).unwrap();

    let mut dialer = std::net::TcpStream::connect(addr).unwrap();
    dialer.set_nonblocking(true).unwrap();

    let mut tries = 0;
    let accepted = loop {
        match std_listener.accept() {
            Ok((s, _)) => break s,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock && tries < 10_000 => {
                tries += 1;
                std::thread::sleep(Duration::from_micros(100));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    };
    accepted.set_nonblocking(true).unwrap();

    let token = el.next_token();
    let registry = el.registry();
    let mut server = create_accepted_tcp(token, registry, mio::net::TcpStream::from_std(accepted));
    server.accept(Box::new(|_| {}));
    assert_eq!(server.get_state(), ConnState::Connected);

    use std::io::{Read, Write};
    let mut tries = 0;
    loop {
        match dialer.write(b"ping") {
            Ok(_) => break,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock && tries < 1000 => {
                tries += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("write failed: {e}"),
        }
    }

    let mut buf = [0u8; 16];
    let mut n = -1;
    let deadline = Instant::now() + Duration::from_secs(5);
    while n < 0 && Instant::now() < deadline {
        n = server.read(&mut buf);
        if n < 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    assert_eq!(&buf[..n as usize], b"ping");

    let written = server.write(&buf[..n as usize]);
    assert_eq!(written, n);

    let mut echoed = [0u8; 16];
    let read = dialer.read(&mut echoed).unwrap();
    assert_eq!(&echoed[..read], b"ping");
}
