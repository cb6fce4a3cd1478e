//! A polymorphic connection abstraction unifying plain TCP and TLS sockets
//! behind one uniform interface over a non-blocking, single-threaded event
//! loop.
//!
//! The hard part this crate solves is TLS's renegotiation quirk: a logical
//! `read` can require the underlying socket to become *writable* before it
//! can make progress, and a logical `write` can require it to become
//! *readable* — without leaking that complication to callers. See
//! [`connection`] for the uniform operation set and the two variants
//! ([`connection::tcp`], [`connection::tls`]) that implement it.
//!
//! Two smaller pieces round out the crate:
//! - [`tls_config`] — an atomic TLS context swap (certificate/key/CA/DH).
//! - [`embedded`] — drives a command dispatcher without any real socket.
//!
//! Out of scope: listen/accept socket *management*, address resolution,
//! output-buffer assembly and flow control, application-protocol parsing,
//! and the event loop itself ([`event_loop`] is a thin `mio` wrapper this
//! crate consumes, not a reactor it owns).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![allow(clippy::type_complexity)]

pub mod config;
pub mod connection;
pub mod embedded;
pub mod error;
pub mod event_loop;
pub mod socket;
#[cfg(feature = "tls")]
pub mod tls_config;
pub mod tls_session;

pub use connection::{create_accepted_tcp, create_accepted_tls, create_socket_tcp, create_socket_tls, Connection, ConnState};
pub use error::{Error, Result};
pub use event_loop::EventLoop;
