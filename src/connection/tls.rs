//! TLS variant: wraps a [`TlsSession`] over a non-blocking TCP socket,
//! translating "want read"/"want write" into fd-interest changes
//! and implementing the cross-wired wait mechanism so a logical read that
//! needs writable readiness (and vice versa) doesn't leak to callers.
//!
//! Grounded on `original_source/src/tls.c`'s `registerSSLEvent`/
//! `updateSSLEvent`/`tlsEventHandler`/`connTLSRead`/`connTLSWrite`.

use super::{sync_registration, ConnBase, ConnHandler, ConnState, Connection};
use crate::error::{Error, Result};
use crate::event_loop::{EventToken, Readiness};
use crate::socket;
use crate::tls_session::{SessionBuilder, TlsSession, WantIo};
use mio::Interest;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};

/// The two sticky cross-wired bits, plus whether the handshake has been
/// started (distinguishing "waiting for the underlying TCP connect" from
/// "mid-handshake") for the `Connecting` state.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TlsFlags {
    pub read_want_write: bool,
    pub write_want_read: bool,
    pub handshake_started: bool,
}

pub struct TlsConn {
    pub(crate) base: ConnBase,
    /// `None` only in state `None`, before `connect` has dialed out — the
    /// moral equivalent of the original's sentinel fd (`create_socket_tls`
    /// builds the connection with no socket and no session yet).
    pub(crate) stream: Option<mio::net::TcpStream>,
    pub(crate) session: Option<Box<dyn TlsSession>>,
    /// Deferred client-session constructor, consumed by `connect()` once the
    /// dial target is known (a `rustls::ClientConnection` needs the peer's
    /// `ServerName`, which `create_socket_tls` doesn't have yet) —
    /// `connTLSConnect`'s `sslCreateSession` called right after the socket
    /// connect begins, not at connection-object-creation time.
    session_builder: Option<SessionBuilder>,
    pub(crate) flags: TlsFlags,
    pub(crate) max_plaintext_per_write: usize,
    pub(crate) partial_write_disabled: bool,
}

enum ErrorOutcome {
    WouldBlock,
    PeerClosed,
    OsFatal(i32),
    TlsFatal(String),
}

fn classify(e: &io::Error) -> ErrorOutcome {
    if e.kind() == io::ErrorKind::WouldBlock {
        ErrorOutcome::WouldBlock
    } else if e.kind() == io::ErrorKind::UnexpectedEof {
        ErrorOutcome::PeerClosed
    } else if let Some(errno) = e.raw_os_error() {
        ErrorOutcome::OsFatal(errno)
    } else {
        ErrorOutcome::TlsFatal(e.to_string())
    }
}

impl TlsConn {
    /// `create_socket_tls`: no socket, no session yet — state `None`.
    pub fn new_unconnected(
        token: EventToken,
        registry: mio::Registry,
        session_builder: SessionBuilder,
        max_plaintext_per_write: usize,
    ) -> Self {
        Self {
            base: ConnBase::new(token, registry),
            stream: None,
            session: None,
            session_builder: Some(session_builder),
            flags: TlsFlags::default(),
            max_plaintext_per_write,
            partial_write_disabled: false,
        }
    }

    /// `connCreateAcceptedTLS`: `session` is already in server-accept state
    /// (with `require_auth`'s verify override already baked in by whoever
    /// built it).
    pub fn from_accepted(
        token: EventToken,
        registry: mio::Registry,
        stream: mio::net::TcpStream,
        session: Box<dyn TlsSession>,
        max_plaintext_per_write: usize,
    ) -> Self {
        let mut base = ConnBase::new(token, registry);
        base.state = ConnState::Accepting;
        Self {
            base,
            stream: Some(stream),
            session: Some(session),
            session_builder: None,
            flags: TlsFlags { handshake_started: true, ..Default::default() },
            max_plaintext_per_write,
            partial_write_disabled: false,
        }
    }

    /// `connTLSConnect`: begins the non-blocking TCP connect and builds the
    /// client session immediately afterward (the original calls
    /// `sslCreateSession` right after kicking off `connect()`, not waiting
    /// for it to complete).
    pub fn connect(&mut self, target: SocketAddr, source: Option<SocketAddr>, handler: ConnHandler) -> Result<()> {
        let builder = self.session_builder.take().ok_or_else(|| Error::network("connect already called on this connection"))?;
        let std_stream = match socket::nonblocking_connect(target, source) {
            Ok(s) => s,
            Err(e) => {
                self.base.set_error(-1);
                return Err(e);
            }
        };
        let session = match builder(target) {
            Ok(s) => s,
            Err(e) => {
                self.base.set_tls_error(e.to_string());
                return Err(e);
            }
        };
        self.stream = Some(mio::net::TcpStream::from_std(std_stream));
        self.session = Some(session);
        self.base.state = ConnState::Connecting;
        self.base.conn_handler = Some(handler);
        self.flags.handshake_started = false;
        self.set_connecting_interest()
    }

    /// `SSL_accept` driven immediately on `accept()`.
    pub fn accept(conn: &mut Connection, handler: ConnHandler) {
        {
            let Connection::Tls(tls) = conn else { return };
            tls.base.conn_handler = Some(handler);
        }
        drive_handshake_and_dispatch(conn);
    }

    fn set_connecting_interest(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else { return Ok(()) };
        sync_registration(stream, self.base.token, &self.base.registry, &mut self.base.registered, Some(Interest::WRITABLE))
    }

    /// `registerSSLEvent`: during the handshake phase, exactly one of
    /// readable/writable interest is active, driven purely by the session's
    /// stated want — handler presence is irrelevant until the handshake
    /// completes.
    pub(crate) fn set_handshake_interest(&mut self) -> Result<()> {
        let want = self.session.as_ref().map(|s| s.last_want()).unwrap_or(WantIo::Read);
        let interest = match want {
            WantIo::Read => Some(Interest::READABLE),
            WantIo::Write => Some(Interest::WRITABLE),
            WantIo::None => Some(Interest::READABLE),
        };
        let Some(stream) = self.stream.as_mut() else { return Ok(()) };
        sync_registration(stream, self.base.token, &self.base.registry, &mut self.base.registered, interest)
    }

    /// `updateSSLEvent`: steady-state interest is the union of read-handler
    /// presence, write-handler presence, and either sticky cross-wired bit.
    pub(crate) fn recompute_interest(&mut self) -> Result<()> {
        if self.base.state != ConnState::Connected {
            return self.set_handshake_interest();
        }
        let want_read = self.base.read_handler.is_some() || self.flags.write_want_read;
        let want_write = self.base.write_handler.is_some() || self.flags.read_want_write;
        let interest = match (want_read, want_write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        };
        let Some(stream) = self.stream.as_mut() else { return Ok(()) };
        sync_registration(stream, self.base.token, &self.base.registry, &mut self.base.registered, interest)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> isize {
        if self.base.state != ConnState::Connected {
            return -1;
        }
        let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) else { return -1 };
        match session.read_plaintext(stream, buf) {
            Ok(0) => {
                self.base.state = ConnState::Closed;
                0
            }
            Ok(n) => n as isize,
            Err(e) => match classify(&e) {
                ErrorOutcome::WouldBlock => {
                    if session.last_want() == WantIo::Write {
                        self.flags.read_want_write = true;
                        let _ = self.recompute_interest();
                    }
                    self.base.last_errno = EAGAIN;
                    -1
                }
                ErrorOutcome::PeerClosed => {
                    self.base.state = ConnState::Closed;
                    0
                }
                ErrorOutcome::OsFatal(errno) => {
                    self.base.set_error(errno);
                    -1
                }
                ErrorOutcome::TlsFatal(msg) => {
                    self.base.set_tls_error(msg);
                    -1
                }
            },
        }
    }

    pub fn write(&mut self, data: &[u8]) -> isize {
        if self.base.state != ConnState::Connected {
            return -1;
        }
        let cap = if self.partial_write_disabled { data.len() } else { data.len().min(self.max_plaintext_per_write) };
        let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) else { return -1 };
        match session.write_plaintext(stream, &data[..cap]) {
            Ok(n) => n as isize,
            Err(e) => match classify(&e) {
                ErrorOutcome::WouldBlock => {
                    if session.last_want() == WantIo::Read {
                        self.flags.write_want_read = true;
                        let _ = self.recompute_interest();
                    }
                    self.base.last_errno = EAGAIN;
                    -1
                }
                ErrorOutcome::PeerClosed => {
                    self.base.state = ConnState::Closed;
                    0
                }
                ErrorOutcome::OsFatal(errno) => {
                    self.base.set_error(errno);
                    -1
                }
                ErrorOutcome::TlsFatal(msg) => {
                    self.base.set_tls_error(msg);
                    -1
                }
            },
        }
    }

    pub fn close(&mut self, do_shutdown: bool) {
        if self.base.state == ConnState::Closed {
            return;
        }
        if let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) {
            if do_shutdown && self.base.state == ConnState::Connected {
                session.send_close_notify(stream);
            }
            if self.base.registered {
                let _ = self.base.registry.deregister(stream);
                self.base.registered = false;
            }
        }
        self.stream = None;
        self.session = None;
        self.base.state = ConnState::Closed;
        self.base.conn_handler = None;
        self.base.read_handler = None;
        self.base.write_handler = None;
        debug!(token = ?self.base.token, "tls connection closed");
    }

    pub fn shutdown(&mut self, how: Shutdown) {
        if let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) {
            if how != Shutdown::Read {
                session.send_close_notify(stream);
            }
            let _ = stream.shutdown(how);
        }
    }

    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        match self.stream.as_ref() {
            Some(stream) => socket::set_nonblocking_mio(stream, !blocking),
            None => Ok(()),
        }
    }

    /// Drops to blocking mode with a deadline, drives the handshake/I/O to
    /// completion, then restores non-blocking mode. Exact timeout precision
    /// is not guaranteed — the per-iteration socket timeout bounds each
    /// syscall, not the overall handshake.
    pub fn blocking_connect(&mut self, target: SocketAddr, timeout: Duration) -> Result<()> {
        let builder = self.session_builder.take().ok_or_else(|| Error::network("connect already called on this connection"))?;
        let std_stream = socket::nonblocking_connect(target, None)?;
        let session = builder(target)?;
        self.stream = Some(mio::net::TcpStream::from_std(std_stream));
        self.session = Some(session);

        let Some(stream) = self.stream.as_mut() else { unreachable!() };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_write_timeout_mio(stream, Some(timeout));
        let _ = socket::set_read_timeout_mio(stream, Some(timeout));

        let session = self.session.as_mut().unwrap();
        let stream = self.stream.as_mut().unwrap();
        let mut handshake_result = Ok(true);
        for _ in 0..10_000 {
            match session.drive_handshake(stream) {
                Ok(true) => break,
                Ok(false) => continue,
                Err(e) => {
                    handshake_result = Err(e);
                    break;
                }
            }
        }

        let stream = self.stream.as_mut().unwrap();
        let _ = socket::set_write_timeout_mio(stream, None);
        let _ = socket::set_read_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);

        match handshake_result {
            Ok(_) if !self.session.as_ref().unwrap().is_handshaking() => {
                self.base.state = ConnState::Connected;
                Ok(())
            }
            Ok(_) => {
                self.base.set_error(ETIMEDOUT);
                Err(crate::error::Error::network("TLS handshake timed out"))
            }
            Err(e) => {
                let msg = e.to_string();
                self.base.set_tls_error(msg.clone());
                Err(crate::error::Error::network(format!("TLS handshake failed: {msg}")))
            }
        }
    }

    /// `sync_write` clears partial-write mode for the duration of the call
    /// so the whole buffer is written in one logical operation.
    pub fn sync_write(&mut self, data: &[u8], timeout: Duration) -> isize {
        let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) else { return -1 };
        self.partial_write_disabled = true;
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_write_timeout_mio(stream, Some(timeout));

        let mut written = 0;
        let result = loop {
            if written >= data.len() {
                break data.len() as isize;
            }
            match session.write_plaintext(stream, &data[written..]) {
                Ok(n) => written += n,
                Err(_) => break -1,
            }
        };

        let _ = socket::set_write_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);
        self.partial_write_disabled = false;
        result
    }

    pub fn sync_read(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) else { return -1 };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_read_timeout_mio(stream, Some(timeout));
        let result = match session.read_plaintext(stream, buf) {
            Ok(n) => n as isize,
            Err(_) => -1,
        };
        let _ = socket::set_read_timeout_mio(stream, None);
        let _ = socket::set_nonblocking_mio(stream, true);
        result
    }

    pub fn sync_readline(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        let (Some(stream), Some(session)) = (self.stream.as_mut(), self.session.as_mut()) else { return -1 };
        let _ = socket::set_nonblocking_mio(stream, false);
        let _ = socket::set_read_timeout_mio(stream, Some(timeout));
        let mut n = 0;
        let mut byte = [0u8; 1];
        let result = loop {
            if n >= buf.len() {
                break n as isize;
            }
            match session.read_plaintext(stream, &mut byte) {
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
}

/// Drives one handshake step, and on completion fires the one-shot
/// `conn_handler` exactly once.
fn drive_handshake_and_dispatch(conn: &mut Connection) {
    let outcome = {
        let Connection::Tls(tls) = conn else { return };
        tls.flags.handshake_started = true;
        let (Some(stream), Some(session)) = (tls.stream.as_mut(), tls.session.as_mut()) else { return };
        match session.drive_handshake(stream) {
            Ok(true) => Ok(true),
            Ok(false) => {
                let _ = tls.set_handshake_interest();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    };

    match outcome {
        Ok(true) => {
            let mut handler = {
                let Connection::Tls(tls) = conn else { return };
                tls.base.state = ConnState::Connected;
                let _ = tls.recompute_interest();
                tls.base.conn_handler.take()
            };
            if let Some(h) = handler.as_mut() {
                h(conn);
            }
        }
        Ok(false) => {}
        Err(e) => {
            let mut handler = {
                let Connection::Tls(tls) = conn else { return };
                match classify(&e) {
                    ErrorOutcome::OsFatal(errno) => tls.base.set_error(errno),
                    ErrorOutcome::TlsFatal(msg) => tls.base.set_tls_error(msg),
                    ErrorOutcome::PeerClosed => tls.base.set_error(0),
                    ErrorOutcome::WouldBlock => {
                        let _ = tls.set_handshake_interest();
                        return;
                    }
                }
                warn!("TLS handshake failed");
                tls.base.conn_handler.take()
            };
            if let Some(h) = handler.as_mut() {
                h(conn);
            }
        }
    }
}

/// `tlsEventHandler`: handshake-phase dispatch while `Connecting`/
/// `Accepting`, the five-step cross-wired dispatch once `Connected`.
pub(crate) fn handle_event(conn: &mut Connection, readiness: Readiness) {
    let in_handshake = matches!(conn.get_state(), ConnState::Connecting | ConnState::Accepting);

    if in_handshake {
        let tcp_connect_pending = {
            let Connection::Tls(tls) = conn else { return };
            tls.base.state == ConnState::Connecting && !tls.flags.handshake_started
        };
        if tcp_connect_pending {
            if !readiness.is_writable() {
                return;
            }
            let err = {
                let Connection::Tls(tls) = conn else { return };
                let Some(stream) = tls.stream.as_ref() else { return };
                socket::socket_error_mio(stream)
            };
            if err != 0 {
                let mut handler = {
                    let Connection::Tls(tls) = conn else { return };
                    tls.base.set_error(err);
                    tls.base.conn_handler.take()
                };
                if let Some(h) = handler.as_mut() {
                    h(conn);
                }
                return;
            }
        }
        drive_handshake_and_dispatch(conn);
        return;
    }

    if !matches!(conn.get_state(), ConnState::Connected) {
        return;
    }

    // Step 1: readable clears WRITE_WANT_READ and fires write_handler.
    if readiness.is_readable() {
        let fire = {
            let Connection::Tls(tls) = conn else { return };
            if tls.flags.write_want_read {
                tls.flags.write_want_read = false;
                true
            } else {
                false
            }
        };
        if fire {
            let mut handler = {
                let Connection::Tls(tls) = conn else { return };
                tls.base.write_handler.take()
            };
            if let Some(h) = handler.as_mut() {
                h(conn);
            }
            if let Connection::Tls(tls) = conn {
                if tls.base.write_handler.is_none() {
                    tls.base.write_handler = handler.take();
                }
            }
        }
    }
    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    // Step 2: writable clears READ_WANT_WRITE and fires read_handler.
    if readiness.is_writable() {
        let fire = {
            let Connection::Tls(tls) = conn else { return };
            if tls.flags.read_want_write {
                tls.flags.read_want_write = false;
                true
            } else {
                false
            }
        };
        if fire {
            let mut handler = {
                let Connection::Tls(tls) = conn else { return };
                tls.base.read_handler.take()
            };
            if let Some(h) = handler.as_mut() {
                h(conn);
            }
            if let Connection::Tls(tls) = conn {
                if tls.base.read_handler.is_none() {
                    tls.base.read_handler = handler.take();
                }
            }
        }
    }
    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    // Step 3: ordinary readable dispatch.
    if readiness.is_readable() {
        let mut handler = {
            let Connection::Tls(tls) = conn else { return };
            tls.base.read_handler.take()
        };
        if let Some(h) = handler.as_mut() {
            h(conn);
        }
        if let Connection::Tls(tls) = conn {
            if tls.base.read_handler.is_none() {
                tls.base.read_handler = handler.take();
            }
        }
    }
    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    // Step 4: ordinary writable dispatch.
    if readiness.is_writable() {
        let mut handler = {
            let Connection::Tls(tls) = conn else { return };
            tls.base.write_handler.take()
        };
        if let Some(h) = handler.as_mut() {
            h(conn);
        }
        if let Connection::Tls(tls) = conn {
            if tls.base.write_handler.is_none() {
                tls.base.write_handler = handler.take();
            }
        }
    }
    if matches!(conn.get_state(), ConnState::Closed) {
        return;
    }

    // Step 5: recompute interest as the union.
    if let Connection::Tls(tls) = conn {
        if let Err(e) = tls.recompute_interest() {
            warn!(error = %e, "failed to recompute TLS interest");
        }
    }
}

#[cfg(target_os = "linux")]
const EAGAIN: i32 = 11;
#[cfg(not(target_os = "linux"))]
const EAGAIN: i32 = 35;

#[cfg(target_os = "linux")]
const ETIMEDOUT: i32 = 110;
#[cfg(not(target_os = "linux"))]
const ETIMEDOUT: i32 = 60;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::tls_session::mock::MockSession;
    use proptest::prelude::*;

    fn new_tls_conn(el: &mut EventLoop, stream: mio::net::TcpStream, session: MockSession) -> Connection {
        let token = el.next_token();
        let registry = el.registry();
        Connection::Tls(TlsConn::from_accepted(token, registry, stream, Box::new(session), 16 * 1024))
    }

    fn loopback_pair() -> (mio::net::TcpStream, mio::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();
        server.set_nonblocking(true).unwrap();
        (mio::net::TcpStream::from_std(client), mio::net::TcpStream::from_std(server))
    }

    #[test]
    fn write_want_read_sets_flag_and_fires_write_handler_on_readable() {
        let mut el = EventLoop::new(16).unwrap();
        let (client, _server) = loopback_pair();
        let mut session = MockSession::new();
        session.want = WantIo::Read;
        let mut conn = new_tls_conn(&mut el, client, session);
        if let Connection::Tls(tls) = &mut conn {
            tls.base.state = ConnState::Connected;
        }

        // Simulate a write() call that would-block wanting a read.
        let wrote = conn.write(b"hello");
        assert_eq!(wrote, -1);
        if let Connection::Tls(tls) = &conn {
            assert!(tls.flags.write_want_read);
        } else {
            panic!("expected tls connection");
        }

        let fired = std::sync::Arc::new(std::sync::Mutex::new(false));
        let fired_handle = fired.clone();
        conn.set_write_handler(Some(Box::new(move |_c: &mut Connection| {
            *fired_handle.lock().unwrap() = true;
        })))
        .unwrap();

        conn.handle_event(Readiness::Readable);
        assert!(*fired.lock().unwrap());
        if let Connection::Tls(tls) = &conn {
            assert!(!tls.flags.write_want_read);
        }
    }

    #[test]
    fn handshake_interest_is_exclusive() {
        let mut el = EventLoop::new(16).unwrap();
        let (client, _server) = loopback_pair();
        let mut session = MockSession::new();
        session.handshaking = true;
        session.want = WantIo::Read;
        let mut conn = new_tls_conn(&mut el, client, session);
        if let Connection::Tls(tls) = &mut conn {
            tls.set_handshake_interest().unwrap();
        }
        // No panic / error is itself the assertion here: registering a
        // single-direction interest during handshake must succeed.
    }

    #[test]
    fn connect_consumes_session_builder_exactly_once() {
        let mut el = EventLoop::new(16).unwrap();
        let token = el.next_token();
        let registry = el.registry();
        let builder: SessionBuilder = Box::new(|_target| Ok(Box::new(MockSession::new()) as Box<dyn TlsSession>));
        let mut conn = Connection::Tls(TlsConn::new_unconnected(token, registry, builder, 16 * 1024));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        conn.connect(addr, None, Box::new(|_| {})).unwrap();
        assert_eq!(conn.get_state(), ConnState::Connecting);
        // A second connect must fail: the builder was already consumed.
        assert!(conn.connect(addr, None, Box::new(|_| {})).is_err());
    }

    proptest! {
        /// Steady-state registration liveness tracks the union of
        /// read-handler presence, write-handler presence, and either sticky
        /// cross-wired bit exactly, for any combination of the four.
        #[test]
        fn registration_matches_handler_and_flag_union(
            has_read: bool,
            has_write: bool,
            read_want_write: bool,
            write_want_read: bool,
        ) {
            let mut el = EventLoop::new(16).unwrap();
            let (client, _server) = loopback_pair();
            let mut conn = new_tls_conn(&mut el, client, MockSession::new());
            if let Connection::Tls(tls) = &mut conn {
                tls.base.state = ConnState::Connected;
                if has_read {
                    tls.base.read_handler = Some(Box::new(|_| {}));
                }
                if has_write {
                    tls.base.write_handler = Some(Box::new(|_| {}));
                }
                tls.flags.read_want_write = read_want_write;
                tls.flags.write_want_read = write_want_read;
                tls.recompute_interest().unwrap();
                let expected = has_read || has_write || read_want_write || write_want_read;
                prop_assert_eq!(tls.base.registered, expected);
            }
        }
    }
}
