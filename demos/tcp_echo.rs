//! Minimal echo server built directly on the uniform connection operation
//! set — no application-protocol framing, just byte-granular read/write,
//! matching this crate's "caller owns buffers" non-goal.

use polyconn::connection::create_accepted_tcp;
use polyconn::event_loop::{EventLoop, Readiness};
use polyconn::socket;
use polyconn::Connection;
use std::collections::HashMap;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut el = EventLoop::new(1024)?;
    let listener = socket::bind_listener("127.0.0.1:7878".parse()?, true, false, 128)?;
    let std_listener = std::net::TcpListener::from(listener);
    std_listener.set_nonblocking(true)?;
    let mut mio_listener = mio::net::TcpListener::from_std(std_listener);
    let listener_token = el.next_token();
    el.register(&mut mio_listener, listener_token, mio::Interest::READABLE)?;

    let mut connections: HashMap<usize, Connection> = HashMap::new();

    println!("echoing on 127.0.0.1:7878");
    loop {
        let ready = el.poll_once(Some(Duration::from_millis(200)))?;
        for (token, readiness) in ready {
            if token == listener_token {
                accept_all(&mut el, &mio_listener, &mut connections);
                continue;
            }
            if readiness == Readiness::Error || readiness == Readiness::Hangup {
                connections.remove(&token.0);
                continue;
            }
            if let Some(conn) = connections.get_mut(&token.0) {
                conn.handle_event(readiness);
                if conn.get_state() == polyconn::ConnState::Closed {
                    connections.remove(&token.0);
                }
            }
        }
    }
}

fn accept_all(el: &mut EventLoop, listener: &mio::net::TcpListener, connections: &mut HashMap<usize, Connection>) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                let token = el.next_token();
                let registry = el.registry();
                let mut conn = create_accepted_tcp(token, registry, stream);
                conn.accept(Box::new(|_| {}));
                conn.set_read_handler(Some(Box::new(echo_on_readable))).unwrap();
                println!("accepted {peer}");
                connections.insert(token.0, conn);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => {
                eprintln!("accept error: {e}");
                break;
            }
        }
    }
}

fn echo_on_readable(conn: &mut Connection) {
    let mut buf = [0u8; 4096];
    match conn.read(&mut buf) {
        0 => conn.close(true),
        n if n > 0 => {
            let _ = conn.write(&buf[..n as usize]);
        }
        _ => {} // EAGAIN: wait for the next readable event.
    }
}
