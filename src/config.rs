//! Plain configuration structs for the reactor and the two connection variants.
//!
//! No file-based loading, hot reload, or validator machinery: this crate is a
//! library, not a server, so configuration is handed in by the embedding host
//! as plain `Default`-implementing structs, one per concern, rather than one
//! monolithic config object.

use std::time::Duration;

/// Reactor polling behavior.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Maximum number of events drained per `poll()` call.
    pub events_capacity: usize,
    /// Poll timeout; `None` blocks until an event or explicit wake.
    pub poll_timeout: Option<Duration>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            events_capacity: 1024,
            poll_timeout: Some(Duration::from_millis(100)),
        }
    }
}

/// Socket-level options applied to a TCP connection at connect/accept time.
#[derive(Debug, Clone)]
pub struct TcpStreamConfig {
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
    /// TCP keepalive probe interval; `None` leaves the OS default.
    pub keepalive: Option<Duration>,
    /// `SO_SNDBUF` override; `None` leaves the OS default.
    pub send_buffer_size: Option<usize>,
    /// `SO_RCVBUF` override; `None` leaves the OS default.
    pub recv_buffer_size: Option<usize>,
}

impl Default for TcpStreamConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive: None,
            send_buffer_size: None,
            recv_buffer_size: None,
        }
    }
}

/// TLS variant behavior not already implied by the `rustls::Connection` itself.
#[derive(Debug, Clone)]
pub struct TlsStreamConfig {
    /// Caps the amount of plaintext handed to `writer().write()` per
    /// `write()` call, emulating OpenSSL's partial-write mode against a
    /// provider that otherwise buffers unboundedly.
    pub max_plaintext_per_write: usize,
}

impl Default for TlsStreamConfig {
    fn default() -> Self {
        Self {
            max_plaintext_per_write: 16 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert!(ReactorConfig::default().events_capacity > 0);
        assert!(TcpStreamConfig::default().nodelay);
        assert!(TlsStreamConfig::default().max_plaintext_per_write > 0);
    }
}
