//! The polymorphic connection abstraction: a uniform operation set over a
//! TCP variant ([`tcp`]) and a TLS variant ([`tls`]).
//!
//! Rather than the source's struct-of-function-pointers vtable, variants are
//! a sealed tagged enum (`Connection`) carrying their kind-specific state
//! inline; there is no inheritance and no shared ownership between the
//! event loop and the connection — the caller registers the connection's
//! token in its own map and drives `handle_event` itself.

pub mod tcp;
pub mod tls;

use crate::error::Result;
use crate::event_loop::{EventToken, Readiness};
use mio::Interest;
use std::any::Any;
use std::time::Duration;

pub use tcp::TcpConn;
pub use tls::TlsConn;

/// A fresh TCP connection, no socket yet (state `None`). Call
/// [`Connection::connect`] to dial out.
pub fn create_socket_tcp(token: EventToken, registry: mio::Registry) -> Connection {
    Connection::Tcp(TcpConn::new(token, registry))
}

/// `create_accepted_tcp`: wrap a stream handed back by a listener's
/// `accept()`. State `Accepting` until [`Connection::accept`] completes it
/// (immediate, for TCP).
pub fn create_accepted_tcp(token: EventToken, registry: mio::Registry, stream: mio::net::TcpStream) -> Connection {
    Connection::Tcp(TcpConn::from_accepted(token, registry, stream))
}

/// `create_socket_tls`: a fresh TLS connection, no socket and no session yet
/// (state `None`). `session_builder` is consumed by [`Connection::connect`]
/// or [`Connection::blocking_connect`], once the dial target is known.
pub fn create_socket_tls(
    token: EventToken,
    registry: mio::Registry,
    session_builder: crate::tls_session::SessionBuilder,
    max_plaintext_per_write: usize,
) -> Connection {
    Connection::Tls(TlsConn::new_unconnected(token, registry, session_builder, max_plaintext_per_write))
}

/// `create_accepted_tls(fd, require_auth)`: wrap a freshly accepted stream
/// with a server-side session already built for it. The `require_auth`
/// verify-mode decision lives in building `session` (see
/// `tls_config::TlsContext::accept_session`) rather than being re-taken
/// here, since a `Connection` has no notion of a TLS context.
pub fn create_accepted_tls(
    token: EventToken,
    registry: mio::Registry,
    stream: mio::net::TcpStream,
    session: Box<dyn crate::tls_session::TlsSession>,
    max_plaintext_per_write: usize,
) -> Connection {
    Connection::Tls(TlsConn::from_accepted(token, registry, stream, session, max_plaintext_per_write))
}

/// A callback fired on readiness or on one-shot completion. Takes the whole
/// [`Connection`] (not just the variant) so a handler can call back into
/// `set_*_handler`, `read`/`write`, or `close` the way the original
/// `ConnectionCallbackFunc(conn)` does.
pub type ConnHandler = Box<dyn FnMut(&mut Connection) + Send>;

/// Connection state. A sealed enum with distinct discriminants — the
/// source's `CONN_STATE_ACCEPTING`/`CONN_STATE_CONNECTED` duplicate-value
/// ambiguity cannot occur here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    None,
    Connecting,
    Accepting,
    Connected,
    Closed,
    Error,
}

/// Fields common to both variants: state, last error, the handler slots,
/// private data, and the event-loop registration the connection manages for
/// itself via a cloned `mio::Registry` handle (no back-pointer from the loop
/// into the connection, avoiding a cyclic reference between the two).
pub(crate) struct ConnBase {
    pub state: ConnState,
    pub last_errno: i32,
    pub private_data: Option<Box<dyn Any + Send>>,
    pub read_handler: Option<ConnHandler>,
    pub write_handler: Option<ConnHandler>,
    pub conn_handler: Option<ConnHandler>,
    pub token: EventToken,
    pub registry: mio::Registry,
    pub registered: bool,
    /// Overrides the errno-derived message (used for TLS-fatal errors, which
    /// carry a library error string rather than an OS errno).
    pub error_message: Option<String>,
}

impl ConnBase {
    pub fn new(token: EventToken, registry: mio::Registry) -> Self {
        Self {
            state: ConnState::None,
            last_errno: 0,
            private_data: None,
            read_handler: None,
            write_handler: None,
            conn_handler: None,
            token,
            registry,
            registered: false,
            error_message: None,
        }
    }

    pub fn get_last_error(&self) -> Option<String> {
        if self.state != ConnState::Error {
            return None;
        }
        match &self.error_message {
            Some(msg) => Some(msg.clone()),
            None => Some(crate::error::errno_string(self.last_errno)),
        }
    }

    pub fn set_error(&mut self, errno: i32) {
        self.state = ConnState::Error;
        self.last_errno = errno;
        self.error_message = None;
    }

    pub fn set_tls_error(&mut self, message: String) {
        self.state = ConnState::Error;
        self.last_errno = crate::error::TLS_FATAL_ERRNO;
        self.error_message = Some(message);
    }
}

/// Apply a desired combined interest to a source, lazily registering on the
/// first nonempty interest and deregistering when interest becomes empty.
/// `registered` tracks whether a live registration exists.
pub(crate) fn sync_registration<S: mio::event::Source + ?Sized>(
    source: &mut S,
    token: EventToken,
    registry: &mio::Registry,
    registered: &mut bool,
    interest: Option<Interest>,
) -> Result<()> {
    match (interest, *registered) {
        (Some(i), false) => {
            registry
                .register(source, token.into(), i)
                .map_err(|e| crate::error::Error::reactor(format!("register failed: {e}")))?;
            *registered = true;
        }
        (Some(i), true) => {
            registry
                .reregister(source, token.into(), i)
                .map_err(|e| crate::error::Error::reactor(format!("reregister failed: {e}")))?;
        }
        (None, true) => {
            registry
                .deregister(source)
                .map_err(|e| crate::error::Error::reactor(format!("deregister failed: {e}")))?;
            *registered = false;
        }
        (None, false) => {}
    }
    Ok(())
}

/// The polymorphic connection: a sealed tagged enum over the TCP and TLS
/// variants, exposing one uniform operation set regardless of which the
/// caller holds.
pub enum Connection {
    Tcp(TcpConn),
    Tls(TlsConn),
}

impl Connection {
    fn base(&self) -> &ConnBase {
        match self {
            Connection::Tcp(c) => &c.base,
            Connection::Tls(c) => &c.base,
        }
    }

    fn base_mut(&mut self) -> &mut ConnBase {
        match self {
            Connection::Tcp(c) => &mut c.base,
            Connection::Tls(c) => &mut c.base,
        }
    }

    pub fn get_state(&self) -> ConnState {
        self.base().state
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.base().get_last_error()
    }

    pub fn last_errno(&self) -> i32 {
        self.base().last_errno
    }

    pub fn set_private_data(&mut self, data: Box<dyn Any + Send>) {
        self.base_mut().private_data = Some(data);
    }

    pub fn get_private_data(&self) -> Option<&(dyn Any + Send)> {
        self.base().private_data.as_deref()
    }

    pub fn has_read_handler(&self) -> bool {
        self.base().read_handler.is_some()
    }

    pub fn has_write_handler(&self) -> bool {
        self.base().write_handler.is_some()
    }

    pub fn token(&self) -> EventToken {
        self.base().token
    }

    pub fn get_fd(&self) -> i32 {
        use std::os::unix::io::AsRawFd;
        match self {
            Connection::Tcp(c) => c.stream.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1),
            Connection::Tls(c) => c.stream.as_raw_fd(),
        }
    }

    pub fn peer_to_string(&self) -> String {
        match self {
            Connection::Tcp(c) => c
                .stream
                .as_ref()
                .and_then(|s| s.peer_addr().ok())
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            Connection::Tls(c) => c
                .stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    /// Installs or clears the read handler; a no-op (no interest update) if
    /// the new handler slot has the same presence as before — the source
    /// compares function pointers, we compare "is some vs none" since Rust
    /// closures carry no stable identity; re-installing the *same* callback
    /// value is still a presence-preserving no-op change.
    pub fn set_read_handler(&mut self, handler: Option<ConnHandler>) -> Result<()> {
        let was_some = self.base().read_handler.is_some();
        let is_some = handler.is_some();
        self.base_mut().read_handler = handler;
        if was_some != is_some {
            self.update_interest()?;
        }
        Ok(())
    }

    pub fn set_write_handler(&mut self, handler: Option<ConnHandler>) -> Result<()> {
        let was_some = self.base().write_handler.is_some();
        let is_some = handler.is_some();
        self.base_mut().write_handler = handler;
        if was_some != is_some {
            self.update_interest()?;
        }
        Ok(())
    }

    /// `connConnect`: begin a non-blocking connect. `handler` fires exactly
    /// once when the connect (and, for TLS, the handshake) completes —
    /// successfully or not.
    pub fn connect(&mut self, target: std::net::SocketAddr, source: Option<std::net::SocketAddr>, handler: ConnHandler) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.connect(target, source, handler),
            Connection::Tls(c) => c.connect(target, source, handler),
        }
    }

    /// `connBlockingConnect`: synchronous connect (and, for TLS, handshake)
    /// with a deadline.
    pub fn blocking_connect(&mut self, target: std::net::SocketAddr, timeout: Duration) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.blocking_connect(target, timeout),
            Connection::Tls(c) => c.blocking_connect(target, timeout),
        }
    }

    /// `connAccept`: complete the accept side. Immediate for TCP; drives
    /// `SSL_accept` to completion (possibly across several event-loop ticks)
    /// for TLS.
    pub fn accept(&mut self, handler: ConnHandler) {
        match self {
            Connection::Tcp(_) => tcp::TcpConn::accept(self, handler),
            Connection::Tls(_) => tls::TlsConn::accept(self, handler),
        }
    }

    fn update_interest(&mut self) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.recompute_interest(),
            Connection::Tls(c) => c.recompute_interest(),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> isize {
        match self {
            Connection::Tcp(c) => c.read(buf),
            Connection::Tls(c) => c.read(buf),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> isize {
        match self {
            Connection::Tcp(c) => c.write(data),
            Connection::Tls(c) => c.write(data),
        }
    }

    /// Destroys the connection's OS resources and marks it `Closed`. The
    /// `Connection` value itself is not deallocated here — Rust's ownership
    /// model has the caller drop it from its own token→connection map,
    /// which avoids any use-after-free risk without needing a back-pointer
    /// from the event loop; `handle_event` rechecks `state != Closed` between
    /// every dispatch step so a handler that closes mid-tick halts further
    /// delivery.
    pub fn close(&mut self, do_shutdown: bool) {
        match self {
            Connection::Tcp(c) => c.close(do_shutdown),
            Connection::Tls(c) => c.close(do_shutdown),
        }
    }

    pub fn shutdown(&mut self, how: std::net::Shutdown) {
        match self {
            Connection::Tcp(c) => c.shutdown(how),
            Connection::Tls(c) => c.shutdown(how),
        }
    }

    pub fn get_socket_error(&self) -> i32 {
        match self {
            Connection::Tcp(c) => c.stream.as_ref().map(crate::socket::socket_error_mio).unwrap_or(0),
            Connection::Tls(c) => crate::socket::socket_error_mio(&c.stream),
        }
    }

    pub fn block(&mut self) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.set_blocking(true),
            Connection::Tls(c) => c.set_blocking(true),
        }
    }

    pub fn nonblock(&mut self) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.set_blocking(false),
            Connection::Tls(c) => c.set_blocking(false),
        }
    }

    pub fn enable_tcp_nodelay(&mut self) -> Result<()> {
        self.set_nodelay(true)
    }

    pub fn disable_tcp_nodelay(&mut self) -> Result<()> {
        self.set_nodelay(false)
    }

    fn set_nodelay(&mut self, nodelay: bool) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.stream.as_ref().map(|s| crate::socket::set_nodelay_mio(s, nodelay)).unwrap_or(Ok(())),
            Connection::Tls(c) => crate::socket::set_nodelay_mio(&c.stream, nodelay),
        }
    }

    pub fn keepalive(&mut self, interval: Duration) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.stream.as_ref().map(|s| crate::socket::set_keepalive_mio(s, interval)).unwrap_or(Ok(())),
            Connection::Tls(c) => crate::socket::set_keepalive_mio(&c.stream, interval),
        }
    }

    pub fn send_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Connection::Tcp(c) => c.stream.as_ref().map(|s| crate::socket::set_write_timeout_mio(s, timeout)).unwrap_or(Ok(())),
            Connection::Tls(c) => crate::socket::set_write_timeout_mio(&c.stream, timeout),
        }
    }

    /// Dispatches a readiness notification from the event loop to the
    /// variant-specific state machine.
    pub fn handle_event(&mut self, readiness: Readiness) {
        match self {
            Connection::Tcp(_) => tcp::handle_event(self, readiness),
            Connection::Tls(_) => tls::handle_event(self, readiness),
        }
    }

    pub fn sync_read(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        match self {
            Connection::Tcp(c) => c.sync_read(buf, timeout),
            Connection::Tls(c) => c.sync_read(buf, timeout),
        }
    }

    pub fn sync_write(&mut self, data: &[u8], timeout: Duration) -> isize {
        match self {
            Connection::Tcp(c) => c.sync_write(data, timeout),
            Connection::Tls(c) => c.sync_write(data, timeout),
        }
    }

    pub fn sync_readline(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        match self {
            Connection::Tcp(c) => c.sync_readline(buf, timeout),
            Connection::Tls(c) => c.sync_readline(buf, timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_has_distinct_discriminants() {
        let states = [
            ConnState::None,
            ConnState::Connecting,
            ConnState::Accepting,
            ConnState::Connected,
            ConnState::Closed,
            ConnState::Error,
        ];
        for (i, a) in states.iter().enumerate() {
            for (j, b) in states.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }
}
