//! Error types for the ambient setup/teardown plumbing around a connection.
//!
//! Distinct from the in-band, per-connection error surface (`ConnState::Error`,
//! `Conn::last_errno`) which is part of the uniform operation set's own contract
//! and is never propagated as a `Result`. `Error` covers everything that contract
//! doesn't already define a return value for: binding a listener, building a TLS
//! context, registering with the reactor, driving the embedded adapter.

/// Result type alias for polyconn setup/teardown operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error types for polyconn operations outside the per-connection
/// error surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation errors (binding, accepting, registering with the reactor).
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Reactor registration/poll errors.
    #[error("reactor error: {message}")]
    Reactor {
        /// Descriptive error message
        message: String,
    },

    /// Address parse/resolution/connect-setup errors.
    #[error("network error: {message}")]
    Network {
        /// Descriptive error message
        message: String,
    },

    /// TLS configurator errors (certificate/key/CA/DH loading, context build).
    #[error("TLS configuration error: {message}")]
    Config {
        /// Descriptive error message
        message: String,
    },

    /// rustls handshake/session errors, surfaced where they aren't already
    /// captured in-band via `Conn::last_errno`.
    #[cfg(feature = "tls")]
    #[error("TLS error: {source}")]
    Tls {
        /// The underlying TLS error
        #[from]
        source: rustls::Error,
    },

    /// Embedded command adapter errors.
    #[error("embedded adapter error: {message}")]
    Embedded {
        /// Descriptive error message
        message: String,
    },
}

impl Error {
    /// Create a reactor-related error
    pub fn reactor<S: Into<String>>(message: S) -> Self {
        Self::Reactor { message: message.into() }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a TLS configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an embedded adapter error
    pub fn embedded<S: Into<String>>(message: S) -> Self {
        Self::Embedded { message: message.into() }
    }

    /// Error category for logging and monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Reactor { .. } => "reactor",
            Self::Network { .. } => "network",
            Self::Config { .. } => "config",
            #[cfg(feature = "tls")]
            Self::Tls { .. } => "tls",
            Self::Embedded { .. } => "embedded",
        }
    }
}

/// Human-readable rendering of an errno, for the in-band `Conn::last_errno`
/// surface — equivalent to `strerror(conn->last_errno)`.
pub fn errno_string(errno: i32) -> String {
    std::io::Error::from_raw_os_error(errno).to_string()
}

/// Sentinel used for `last_errno` on TLS-fatal (non-OS) errors, where the
/// source instead stores a library error string; `Conn::tls_error` carries
/// that string, this marks "see tls_error, not strerror" in `last_errno`.
pub const TLS_FATAL_ERRNO: i32 = -1;
