//! Thin wrapper over `mio::Poll`/`Registry`.
//!
//! This crate is a *consumer* of an event loop, not a provider of one — the
//! host drives `poll_once` and dispatches readiness to whichever `Connection`
//! owns each token. There is no timer wheel, scheduler, or io_uring backend
//! here; those belong to the host, if it wants them at all.

use crate::error::{Error, Result};
use mio::{Events, Poll, Token};
use tracing::debug;

/// Opaque registration handle, wrapping a `mio::Token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(pub usize);

impl From<Token> for EventToken {
    fn from(token: Token) -> Self {
        Self(token.0)
    }
}

impl From<EventToken> for Token {
    fn from(token: EventToken) -> Self {
        Token(token.0)
    }
}

/// The readiness kind a poll iteration reported for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    Writable,
    ReadWritable,
    Error,
    Hangup,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Readable | Self::ReadWritable)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Writable | Self::ReadWritable)
    }
}

/// Minimal `mio::Poll` wrapper. Tokens are allocated monotonically; there is
/// no handler table here — the host owns its own token -> `Connection` map
/// and is the one calling `Connection::handle_event`; the loop holds no
/// back-pointer into any connection it serves.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    next_token: usize,
}

impl EventLoop {
    pub fn new(events_capacity: usize) -> Result<Self> {
        let poll = Poll::new().map_err(|e| Error::reactor(format!("failed to create poll: {e}")))?;
        Ok(Self {
            poll,
            events: Events::with_capacity(events_capacity),
            next_token: 0,
        })
    }

    /// Hand out a fresh token. Callers register sources against it via
    /// [`EventLoop::registry`] (or, for self-managing connections, clone the
    /// registry directly).
    pub fn next_token(&mut self) -> EventToken {
        let token = EventToken(self.next_token);
        self.next_token += 1;
        token
    }

    /// A cloneable handle connections can hold onto to (re)register
    /// themselves without borrowing the `EventLoop` mutably.
    pub fn registry(&self) -> mio::Registry {
        self.poll
            .registry()
            .try_clone()
            .expect("registry clone should never fail")
    }

    pub fn register<S: mio::event::Source + ?Sized>(
        &mut self,
        source: &mut S,
        token: EventToken,
        interests: mio::Interest,
    ) -> Result<()> {
        self.poll
            .registry()
            .register(source, token.into(), interests)
            .map_err(|e| Error::reactor(format!("failed to register source: {e}")))
    }

    pub fn reregister<S: mio::event::Source + ?Sized>(
        &mut self,
        source: &mut S,
        token: EventToken,
        interests: mio::Interest,
    ) -> Result<()> {
        self.poll
            .registry()
            .reregister(source, token.into(), interests)
            .map_err(|e| Error::reactor(format!("failed to reregister source: {e}")))
    }

    pub fn deregister<S: mio::event::Source + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        self.poll
            .registry()
            .deregister(source)
            .map_err(|e| Error::reactor(format!("failed to deregister source: {e}")))
    }

    /// Poll once, returning the tokens that became ready paired with their
    /// readiness kind. The host is responsible for mapping tokens back to
    /// connections and invoking the right handlers.
    pub fn poll_once(&mut self, timeout: Option<std::time::Duration>) -> Result<Vec<(EventToken, Readiness)>> {
        self.poll
            .poll(&mut self.events, timeout)
            .map_err(|e| Error::reactor(format!("poll failed: {e}")))?;

        let mut ready = Vec::new();
        for event in self.events.iter() {
            let token = EventToken::from(event.token());
            let readiness = if event.is_readable() && event.is_writable() {
                Readiness::ReadWritable
            } else if event.is_readable() {
                Readiness::Readable
            } else if event.is_writable() {
                Readiness::Writable
            } else if event.is_read_closed() || event.is_write_closed() {
                Readiness::Hangup
            } else if event.is_error() {
                Readiness::Error
            } else {
                continue;
            };
            ready.push((token, readiness));
        }
        if !ready.is_empty() {
            debug!(count = ready.len(), "poll_once: events ready");
        }
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_monotonic() {
        let mut ev = EventLoop::new(16).unwrap();
        let a = ev.next_token();
        let b = ev.next_token();
        assert_ne!(a, b);
        assert_eq!(a.0 + 1, b.0);
    }

    #[test]
    fn readiness_read_write_classification() {
        assert!(Readiness::ReadWritable.is_readable());
        assert!(Readiness::ReadWritable.is_writable());
        assert!(Readiness::Readable.is_readable());
        assert!(!Readiness::Readable.is_writable());
        assert!(!Readiness::Writable.is_readable());
        assert!(Readiness::Writable.is_writable());
    }
}
