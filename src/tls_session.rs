//! A TLS provider seam, abstracted behind a small object-safe trait so the
//! cross-wired want-read/want-write bookkeeping in
//! [`crate::connection::tls`] is unit-testable without driving a real
//! handshake. `RustlsSession` is the production implementation; tests supply
//! a mock (`tls_session::mock::MockSession`).

use std::io;

/// Builds a client-side [`TlsSession`] once the dial target is known.
/// `connection::tls::TlsConn::connect` consumes one of these — real
/// implementations close over an `Arc<rustls::ClientConfig>` and construct
/// the session with the peer's `ServerName` for SNI; mirrors
/// `connTLSConnect`'s `sslCreateSession`, called right after the socket
/// connect begins rather than at connection-object-creation time (so
/// `create_socket_tls` itself stays socket- and session-free, matching the
/// "no socket yet" state for a freshly created connection).
pub type SessionBuilder = Box<dyn FnOnce(std::net::SocketAddr) -> crate::error::Result<Box<dyn TlsSession>> + Send>;

/// Outcome of pumping a `TlsSession` against its underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantIo {
    /// No further I/O needed right now.
    None,
    /// The session needs the transport to become readable before it can
    /// make progress.
    Read,
    /// The session needs the transport to become writable.
    Write,
}

/// A TLS session object bound to a `mio::net::TcpStream` transport.
/// `accept`/`connect` are implicit in which concrete session was
/// constructed; `drive_handshake`/`read_plaintext`/`write_plaintext` are the
/// non-blocking operations the TLS connection variant drives from event
/// dispatch.
pub trait TlsSession: Send {
    /// Advance handshake I/O. Returns `Ok(true)` once the handshake has
    /// completed, `Ok(false)` if more I/O is needed (check `last_want`).
    fn drive_handshake(&mut self, transport: &mut mio::net::TcpStream) -> io::Result<bool>;

    /// `true` until the handshake has completed and application data can
    /// flow.
    fn is_handshaking(&self) -> bool;

    /// The I/O direction the last fallible operation reported wanting.
    fn last_want(&self) -> WantIo;

    /// Read decrypted application data, pumping the underlying transport as
    /// needed. Returns `Ok(0)` on orderly close.
    fn read_plaintext(&mut self, transport: &mut mio::net::TcpStream, buf: &mut [u8]) -> io::Result<usize>;

    /// Write plaintext, pumping the underlying transport as needed. Callers
    /// cap `buf`'s length themselves to emulate partial-write mode; this
    /// trait does not impose a cap.
    fn write_plaintext(&mut self, transport: &mut mio::net::TcpStream, buf: &[u8]) -> io::Result<usize>;

    /// Send a close_notify and flush it.
    fn send_close_notify(&mut self, transport: &mut mio::net::TcpStream);

    /// Human-readable last error, if the session is in a fatal state.
    fn last_error(&self) -> Option<String>;
}

#[cfg(feature = "tls")]
pub mod rustls_session {
    use super::*;
    use rustls::{ClientConnection, ServerConnection};
    use std::io::{Read, Write};

    /// Wraps a `rustls::ClientConnection`/`ServerConnection`. `complete_io`
    /// is the actual pump; `WantIo` is derived from `wants_read()`/
    /// `wants_write()`, mirroring `tls.c`'s `handleSSLReturnCode` mapping of
    /// `SSL_ERROR_WANT_READ`/`WRITE` onto fd-interest changes.
    pub enum RustlsSession {
        Client(Box<ClientConnection>),
        Server(Box<ServerConnection>),
    }

    impl RustlsSession {
        fn wants_read(&self) -> bool {
            match self {
                Self::Client(c) => c.wants_read(),
                Self::Server(c) => c.wants_read(),
            }
        }

        fn wants_write(&self) -> bool {
            match self {
                Self::Client(c) => c.wants_write(),
                Self::Server(c) => c.wants_write(),
            }
        }

        fn is_handshaking_inner(&self) -> bool {
            match self {
                Self::Client(c) => c.is_handshaking(),
                Self::Server(c) => c.is_handshaking(),
            }
        }

        fn complete_io(&mut self, transport: &mut mio::net::TcpStream) -> io::Result<(usize, usize)> {
            match self {
                Self::Client(c) => c.complete_io(transport),
                Self::Server(c) => c.complete_io(transport),
            }
        }
    }

    impl TlsSession for RustlsSession {
        fn drive_handshake(&mut self, transport: &mut mio::net::TcpStream) -> io::Result<bool> {
            if !self.is_handshaking_inner() {
                return Ok(true);
            }
            self.complete_io(transport)?;
            Ok(!self.is_handshaking_inner())
        }

        fn is_handshaking(&self) -> bool {
            self.is_handshaking_inner()
        }

        fn last_want(&self) -> WantIo {
            if self.wants_write() {
                WantIo::Write
            } else if self.wants_read() {
                WantIo::Read
            } else {
                WantIo::None
            }
        }

        fn read_plaintext(&mut self, transport: &mut mio::net::TcpStream, buf: &mut [u8]) -> io::Result<usize> {
            self.complete_io(transport)?;
            match self {
                Self::Client(c) => c.reader().read(buf),
                Self::Server(c) => c.reader().read(buf),
            }
        }

        fn write_plaintext(&mut self, transport: &mut mio::net::TcpStream, buf: &[u8]) -> io::Result<usize> {
            let n = match self {
                Self::Client(c) => c.writer().write(buf)?,
                Self::Server(c) => c.writer().write(buf)?,
            };
            self.complete_io(transport)?;
            Ok(n)
        }

        fn send_close_notify(&mut self, transport: &mut mio::net::TcpStream) {
            match self {
                Self::Client(c) => c.send_close_notify(),
                Self::Server(c) => c.send_close_notify(),
            }
            let _ = self.complete_io(transport);
        }

        fn last_error(&self) -> Option<String> {
            None
        }
    }
}

#[cfg(feature = "tls")]
pub use rustls_session::RustlsSession;

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// An in-memory mock used to exercise the cross-wired want-read/
    /// want-write state machine in `connection::tls` without a real
    /// handshake or real crypto.
    pub struct MockSession {
        pub handshaking: bool,
        pub want: WantIo,
        pub pending_reads: VecDeque<Vec<u8>>,
        pub fatal: Option<String>,
    }

    impl MockSession {
        pub fn new() -> Self {
            Self {
                handshaking: false,
                want: WantIo::None,
                pending_reads: VecDeque::new(),
                fatal: None,
            }
        }
    }

    impl TlsSession for MockSession {
        fn drive_handshake(&mut self, _transport: &mut mio::net::TcpStream) -> io::Result<bool> {
            Ok(!self.handshaking)
        }

        fn is_handshaking(&self) -> bool {
            self.handshaking
        }

        fn last_want(&self) -> WantIo {
            self.want
        }

        fn read_plaintext(&mut self, _transport: &mut mio::net::TcpStream, buf: &mut [u8]) -> io::Result<usize> {
            match self.pending_reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no data")),
            }
        }

        fn write_plaintext(&mut self, _transport: &mut mio::net::TcpStream, buf: &[u8]) -> io::Result<usize> {
            if self.want != WantIo::None {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "mock would-block"));
            }
            Ok(buf.len())
        }

        fn send_close_notify(&mut self, _transport: &mut mio::net::TcpStream) {}

        fn last_error(&self) -> Option<String> {
            self.fatal.clone()
        }
    }
}
