//! TCP variant: a thin pass-through where `read`/`write` are raw syscalls
//! and readability/writability map 1:1 to caller handlers.
//!
//! Grounded directly on `original_source/src/connection.c`'s
//! `connEventHandler`/`updateConnEvent`/`connConnect`/`connBlockingConnect`.

use super::{sync_registration, ConnBase, ConnHandler, ConnState, Connection};
use crate::error::{Error, Result};
use crate::event_loop::{EventToken, Readiness};
use crate::socket;
use mio::Interest;
use std::net::{Shutdown, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct TcpConn {
    pub(crate) base: ConnBase,
    /// `None` only in state `None`, before `connect`/`create_accepted` runs —
    /// the moral equivalent of the original's sentinel fd of `-1`.
    pub(crate) stream: Option<mio::net::TcpStream>,
}

impl TcpConn {
    pub fn new(token: EventToken, registry: mio::Registry) -> Self {
        Self {
            base: ConnBase::new(token, registry),
            stream: None,
        }
    }

    /// `create_accepted_tcp`: wraps an already-connected stream (from
    /// `TcpListener::accept`), state becomes `Accepting` until `accept()` is
    /// called (which for TCP completes immediately).
    pub fn from_accepted(token: EventToken, registry: mio::Registry, stream: mio::net::TcpStream) -> Self {
        let mut base = ConnBase::new(token, registry);
        base.state = ConnState::Accepting;
        Self { base, stream: Some(stream) }
    }

    /// `connConnect`: begin a non-blocking connect; `conn_handler` fires
    /// exactly once on completion (success or failure).
    pub fn connect(&mut self, target: SocketAddr, source: Option<SocketAddr>, handler: ConnHandler) -> Result<()> {
        match socket::nonblocking_connect(target, source) {
            Ok(std_stream) => {
                let mio_stream = mio::net::TcpStream::from_std(std_stream);
                self.stream = Some(mio_stream);
                self.base.state = ConnState::Connecting;
                self.base.conn_handler = Some(handler);
                self.recompute_interest()?;
                info!(%target, "tcp connect in progress");
                Ok(())
            }
            Err(e) => {
                self.base.set_error(errno_of(&e));
                Err(e)
            }
        }
    }

    /// `connBlockingConnect`: synchronous connect with a deadline, by
    /// polling writability via the stream directly (no event loop needed).
    pub fn blocking_connect(&mut self, target: SocketAddr, timeout: Duration) -> Result<()> {
        let std_stream = socket::nonblocking_connect(target, None)?;
        let mio_stream = mio::net::TcpStream::from_std(std_stream);

        let deadline = Instant::now() + timeout;
        loop {
            match mio_stream.peer_addr() {
                Ok(_) => break,
                Err(_) if Instant::now() >= deadline => {
                    self.base.set_error(libc_etimedout());
                    return Err(Error::network("connect timed out"));
                }
                Err(_) => std::thread::sleep(Duration::from_millis(1)),
            }
        }

        let err = socket::socket_error_mio(&mio_stream);
        self.stream = Some(mio_stream);
        if err != 0 {
            self.base.set_error(err);
            return Err(Error::network(format!("connect failed: {}", crate::error::errno_string(err))));
        }
        self.base.state = ConnState::Connected;
        Ok(())
    }

    /// `accept()`: for TCP, completes immediately.
    pub fn accept(conn: &mut Connection, handler: ConnHandler) {
        {
            let Connection::Tcp(tcp) = conn else { return };
            tcp.base.state = ConnState::Connected;
        }
        let mut handler = handler;
        handler(conn);
    }

    pub fn read(&mut self, buf: &mut [u8]) -> isize {
        use std::io::Read;
        let Some(stream) = self.stream.as_mut() else { return -1 };
        match stream.read(buf) {
            Ok(0) => {
                self.base.state = ConnState::Closed;
                0
            }
            Ok(n) => n as isize,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.base.last_errno = EAGAIN;
                -1
            }
            Err(e) => {
                self.base.set_error(errno_of(&e));
                -1
            }
        }
    }

    pub fn write(&mut self, data: &[u8]) -> isize {
        use std::io::Write;
        let Some(stream) = self.stream.as_mut() else { return -1 };
        match stream.write(data) {
            Ok(n) => n as isize,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.base.last_errno = EAGAIN;
                -1
            }
            Err(e) => {
                self.base.set_error(errno_of(&e));
                -1
            }
        }
    }

    pub fn close(&mut self, do_shutdown: bool) {
        if self.base.state == ConnState::Closed {
            return; // idempotent: repeated close() is a no-op
        }
        if let Some(stream) = self.stream.as_mut() {
            if do_shutdown {
                let _ = stream.shutdown(Shutdown::Both);
            }
            if self.base.registered {
                let _ = self.base.registry.deregister(stream);
                self.base.registered = false;
            }
        }
        self.stream = None;
        self.base.state = ConnState::Closed;
        self.base.conn_handler = None;
        self.base.read_handler = None;
        self.base.write_handler = None;
        debug!(token = ?self.base.token, "tcp connection closed");
    }

    pub fn shutdown(&mut self, how: Shutdown) {
        if let Some(stream) = self.stream.as_ref() {
            let _ = stream.shutdown(how);
        }
    }

    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        match self.stream.as_ref() {
            Some(stream) => socket::set_nonblocking_mio(stream, !blocking),
            None => Ok(()),
        }
    }

    pub fn sync_read(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        use std::io::Read;
        let Some(stream) = self.stream.as_mut() else { return -1 };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_read_timeout_mio(stream, Some(timeout));
        let result = match stream.read(buf) {
            Ok(n) => n as isize,
            Err(_) => -1,
        };
        let _ = socket::set_read_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);
        result
    }

    pub fn sync_write(&mut self, data: &[u8], timeout: Duration) -> isize {
        use std::io::Write;
        let Some(stream) = self.stream.as_mut() else { return -1 };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_write_timeout_mio(stream, Some(timeout));
        let result = match stream.write_all(data) {
            Ok(()) => data.len() as isize,
            Err(_) => -1,
        };
        let _ = socket::set_write_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);
        result
    }

    pub fn sync_readline(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        use std::io::Read;
        let Some(stream) = self.stream.as_mut() else { return -1 };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_read_timeout_mio(stream, Some(timeout));
        let mut n = 0;
        let mut byte = [0u8; 1];
        let result = loop {
            if n >= buf.len() {
                break n as isize;
            }
            match stream.read(&mut byte) {
                Ok(0) => break n as isize,
                Ok(_) => {
                    buf[n] = byte[0];
                    n += 1;
                    if byte[0] == b'\n' {
                        break n as isize;
                    }
                }
                Err(_) => break -1,
            }
        };
        let _ = socket::set_read_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);
        result
    }

    /// `updateConnEvent`: registers for writable iff `write_handler` is set,
    /// readable iff `read_handler` is set.
    pub(crate) fn recompute_interest(&mut self) -> Result<()> {
        let want_read = self.base.read_handler.is_some();
        let want_write = self.base.write_handler.is_some() || self.base.conn_handler.is_some();
        let interest = match (want_read, want_write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        };
        let Some(stream) = self.stream.as_mut() else { return Ok(()) };
        sync_registration(stream, self.base.token, &self.base.registry, &mut self.base.registered, interest)
    }
}

/// `connEventHandler`: the single ae-handler, dispatching connect-completion
/// before steady-state read/write, exactly matching the source's ordering.
pub(crate) fn handle_event(conn: &mut Connection, readiness: Readiness) {
    // Step 1: connecting + writable + a pending conn_handler (overloaded
    // historically as write_handler in the source; here it is its own slot)
    // completes the connect.
    {
        let Connection::Tcp(tcp) = conn else { return };
        if tcp.base.state == ConnState::Connecting && readiness.is_writable() && tcp.base.conn_handler.is_some() {
            let err = tcp.stream.as_ref().map(socket::socket_error_mio).unwrap_or(0);
            if err == 0 {
                tcp.base.state = ConnState::Connected;
            } else {
                tcp.base.set_error(err);
                warn!(errno = err, "tcp connect failed");
            }
            let mut handler = tcp.base.conn_handler.take().unwrap();
            if let Err(e) = tcp_recompute(tcp) {
                warn!(error = %e, "failed to update interest after connect completion");
            }
            drop(tcp);
            handler(conn);
        }
    }

    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    // Step 2: steady-state — read before write when both are ready.
    if readiness.is_readable() {
        let mut handler = {
            let Connection::Tcp(tcp) = conn else { return };
            if tcp.base.state != ConnState::Connected {
                None
            } else {
                tcp.base.read_handler.take()
            }
        };
        if let Some(h) = handler.as_mut() {
            h(conn);
        }
        if let Connection::Tcp(tcp) = conn {
            if tcp.base.read_handler.is_none() {
                tcp.base.read_handler = handler.take();
            }
        }
    }

    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    if readiness.is_writable() {
        let mut handler = {
            let Connection::Tcp(tcp) = conn else { return };
            if tcp.base.state != ConnState::Connected {
                None
            } else {
                tcp.base.write_handler.take()
            }
        };
        if let Some(h) = handler.as_mut() {
            h(conn);
        }
        if let Connection::Tcp(tcp) = conn {
            if tcp.base.write_handler.is_none() {
                tcp.base.write_handler = handler.take();
            }
        }
    }
}

fn tcp_recompute(tcp: &mut TcpConn) -> Result<()> {
    tcp.recompute_interest()
}

fn errno_of(e: &Error) -> i32 {
    match e {
        Error::Io { source } => source.raw_os_error().unwrap_or(-1),
        Error::Network { .. } => -1,
        _ => -1,
    }
}

#[cfg(target_os = "linux")]
const EAGAIN: i32 = 11;
#[cfg(not(target_os = "linux"))]
const EAGAIN: i32 = 35;

#[cfg(target_os = "linux")]
fn libc_etimedout() -> i32 {
    110
}
#[cfg(not(target_os = "linux"))]
fn libc_etimedout() -> i32 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use proptest::collection::vec;
    use proptest::prelude::*;

    fn new_conn() -> (EventLoop, Connection) {
        let mut el = EventLoop::new(16).unwrap();
        let token = el.next_token();
        let registry = el.registry();
        (el, Connection::Tcp(TcpConn::new(token, registry)))
    }

    fn connected_loopback_pair() -> (std::net::TcpStream, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();
        server.set_nonblocking(true).unwrap();
        (client, server)
    }

    #[test]
    fn set_handler_idempotent_when_same_presence() {
        let (_el, mut conn) = new_conn();
        conn.set_read_handler(Some(Box::new(|_| {}))).unwrap();
        assert!(conn.has_read_handler());
        // Installing another Some(..) over an existing Some(..) must not
        // error and must preserve "has a handler" — the no-op contract is
        // about event-loop interest, which is unaffected by a presence-
        // preserving swap.
        conn.set_read_handler(Some(Box::new(|_| {}))).unwrap();
        assert!(conn.has_read_handler());
    }

    #[test]
    fn close_is_idempotent() {
        let (_el, mut conn) = new_conn();
        conn.close(false);
        assert_eq!(conn.get_state(), ConnState::Closed);
        conn.close(false); // must not panic
        assert_eq!(conn.get_state(), ConnState::Closed);
    }

    #[test]
    fn connect_then_accept_flow_over_loopback() {
        let mut el = EventLoop::new(16).unwrap();
        let listener = socket::bind_listener("127.0.0.1:0".parse().unwrap(), true, false, 128).unwrap();
        let addr = listener.local_addr().unwrap();

        let token = el.next_token();
        let registry = el.registry();
        let mut client = Connection::Tcp(TcpConn::new(token, registry));
        let Connection::Tcp(tcp) = &mut client else { unreachable!() };
        tcp.connect(addr, None, Box::new(|_| {})).unwrap();

        // Accept side, synchronously for the test.
        let std_listener = std::net::TcpListener::from(listener);
        std_listener.set_nonblocking(true).unwrap();
        let mut tries = 0;
        loop {
            match std_listener.accept() {
                Ok(_) => break,
                Err(_) if tries < 1000 => {
                    tries += 1;
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        }
    }

    proptest! {
        /// Registration liveness tracks the union of handler presence
        /// exactly: registered iff at least one of read/write/conn handler
        /// is installed, for any combination of the three.
        #[test]
        fn registration_matches_handler_union(has_read: bool, has_write: bool, has_conn: bool) {
            let mut el = EventLoop::new(16).unwrap();
            let token = el.next_token();
            let registry = el.registry();
            let (client, _server) = connected_loopback_pair();
            let mut tcp = TcpConn::from_accepted(token, registry, mio::net::TcpStream::from_std(client));
            tcp.base.state = ConnState::Connected;
            if has_read {
                tcp.base.read_handler = Some(Box::new(|_| {}));
            }
            if has_write {
                tcp.base.write_handler = Some(Box::new(|_| {}));
            }
            if has_conn {
                tcp.base.conn_handler = Some(Box::new(|_| {}));
            }
            tcp.recompute_interest().unwrap();
            prop_assert_eq!(tcp.base.registered, has_read || has_write || has_conn);
            drop(el);
        }

        /// Installing a handler is idempotent with respect to presence: an
        /// arbitrary sequence of set_read_handler(Some/None) calls always
        /// leaves has_read_handler() matching the most recent call.
        #[test]
        fn set_read_handler_tracks_presence_across_arbitrary_sequences(presences in vec(any::<bool>(), 1..8)) {
            let (_el, mut conn) = new_conn();
            for present in presences {
                let handler: Option<ConnHandler> = if present { Some(Box::new(|_| {})) } else { None };
                conn.set_read_handler(handler).unwrap();
                prop_assert_eq!(conn.has_read_handler(), present);
            }
        }
    }
}
