//! TLS configurator: builds `rustls` client/server configs from
//! certificate/key/CA material and swaps them in atomically on success,
//! leaving the previous config untouched on failure.
//!
//! Grounded on `original_source/src/tls.c`'s `tlsConfigure`: certificate,
//! private key and CA file are mandatory (three `goto error` guards), DH
//! params are optional, and the whole context is built into a fresh object
//! before being published — never mutated in place.

#![cfg(feature = "tls")]

use crate::error::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

/// Inputs to [`configure`], mirroring `tlsConfigure`'s file-path fields.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert_file: std::path::PathBuf,
    pub key_file: std::path::PathBuf,
    pub ca_cert_file: std::path::PathBuf,
    /// DH params are validated for presence only; rustls negotiates its own
    /// curve/group selection and has no DH-params-file concept, so this is
    /// accepted-but-unused beyond the original's optionality guard (noted in
    /// DESIGN.md as a dropped concern).
    pub dh_params_file: Option<std::path::PathBuf>,
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = std::fs::read(path).map_err(|e| Error::config(format!("failed to read cert file {}: {e}", path.display())))?;
    rustls_pemfile::certs(&mut bytes.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::config(format!("failed to parse cert file {}: {e}", path.display())))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path).map_err(|e| Error::config(format!("failed to read key file {}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut bytes.as_slice())
        .map_err(|e| Error::config(format!("failed to parse key file {}: {e}", path.display())))?
        .ok_or_else(|| Error::config(format!("no private key found in {}", path.display())))
}

fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let certs = load_certs(path)?;
    let mut store = RootCertStore::empty();
    for cert in certs {
        store.add(cert).map_err(|e| Error::config(format!("failed to add CA cert: {e}")))?;
    }
    Ok(store)
}

/// The live, swappable TLS context: one server config and one client
/// config, both built from the same certificate/key/CA material — matching
/// `tlsConfigure`'s single `SSL_CTX` serving both accept and connect paths.
pub struct TlsContext {
    server: Arc<ServerConfig>,
    client: Arc<ClientConfig>,
    root_store: Arc<RootCertStore>,
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsContext {
    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server.clone()
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client.clone()
    }

    /// Per-accepted-connection verify override: `require_auth = false`
    /// downgrades to an unauthenticated server
    /// config built fresh from the same root store, without
    /// `fail_if_no_peer_cert` semantics — matching the original's per-`SSL*`
    /// override rather than a context-wide setting. A whole new
    /// `ServerConfig` is built rather than mutated in place since rustls
    /// does not expose the client verifier as a settable field.
    pub fn server_config_for_accept(&self, require_auth: bool) -> Result<Arc<ServerConfig>> {
        if require_auth {
            return Ok(self.server.clone());
        }
        let verifier = WebPkiClientVerifier::builder(self.root_store.clone())
            .allow_unauthenticated()
            .build()
            .map_err(|e| Error::config(format!("failed to build relaxed client verifier: {e}")))?;
        let cfg = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.certs.clone(), self.key.clone_key())
            .map_err(|e| Error::config(format!("failed to build relaxed server config: {e}")))?;
        Ok(Arc::new(cfg))
    }

    /// `connCreateAcceptedTLS`: build the server-side session for a freshly
    /// accepted socket, with `require_auth`'s per-connection verify override
    /// already applied.
    pub fn accept_session(&self, require_auth: bool) -> Result<Box<dyn crate::tls_session::TlsSession>> {
        let server_config = self.server_config_for_accept(require_auth)?;
        let conn = rustls::ServerConnection::new(server_config)
            .map_err(|e| Error::config(format!("failed to create TLS server session: {e}")))?;
        Ok(Box::new(crate::tls_session::RustlsSession::Server(Box::new(conn))))
    }

    /// A [`crate::tls_session::SessionBuilder`] that defers client-session
    /// construction to `connect()` time, once the dial target (and thus the
    /// `ServerName` rustls needs for SNI) is known.
    pub fn client_session_builder(self: &Arc<Self>) -> crate::tls_session::SessionBuilder {
        let ctx = self.clone();
        Box::new(move |target: std::net::SocketAddr| {
            let server_name = rustls::pki_types::ServerName::try_from(target.ip())
                .map_err(|e| Error::config(format!("invalid server name for {target}: {e}")))?;
            let conn = rustls::ClientConnection::new(ctx.client_config(), server_name)
                .map_err(|e| Error::config(format!("failed to create TLS client session: {e}")))?;
            Ok(Box::new(crate::tls_session::RustlsSession::Client(Box::new(conn))) as Box<dyn crate::tls_session::TlsSession>)
        })
    }
}

/// A client-only [`crate::tls_session::SessionBuilder`] that trusts the
/// public Web PKI root store instead of a custom CA file, for dialing
/// ordinary public TLS servers rather than peers inside a private CA's
/// trust domain. Needs no [`TlsConfigurator`]/[`TlsFiles`] at all, unlike
/// [`TlsContext::client_session_builder`].
pub fn public_client_session_builder() -> crate::tls_session::SessionBuilder {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = Arc::new(ClientConfig::builder().with_root_certificates(root_store).with_no_client_auth());
    Box::new(move |target: std::net::SocketAddr| {
        let server_name = rustls::pki_types::ServerName::try_from(target.ip())
            .map_err(|e| Error::config(format!("invalid server name for {target}: {e}")))?;
        let conn = rustls::ClientConnection::new(config.clone(), server_name)
            .map_err(|e| Error::config(format!("failed to create TLS client session: {e}")))?;
        Ok(Box::new(crate::tls_session::RustlsSession::Client(Box::new(conn))) as Box<dyn crate::tls_session::TlsSession>)
    })
}

/// Holds the currently-published [`TlsContext`] behind a lock, swapped only
/// on a successful [`configure`] call — a failed reconfigure leaves readers
/// observing the previous, still-valid context.
pub struct TlsConfigurator {
    current: RwLock<Option<Arc<TlsContext>>>,
}

impl TlsConfigurator {
    pub fn new() -> Self {
        Self { current: RwLock::new(None) }
    }

    pub fn current(&self) -> Option<Arc<TlsContext>> {
        self.current.read().unwrap().clone()
    }

    /// `tlsConfigure`: build a brand-new context from scratch and publish it
    /// only if every step succeeds. Certificate, key and CA file are
    /// mandatory; DH params are optional and only presence-checked.
    pub fn configure(&self, files: &TlsFiles) -> Result<()> {
        if !files.cert_file.as_os_str().is_empty() {
            debug!(path = %files.cert_file.display(), "loading TLS certificate");
        } else {
            error!("TLS certificate file not configured");
            return Err(Error::config("certificate file is required"));
        }
        if files.key_file.as_os_str().is_empty() {
            error!("TLS private key file not configured");
            return Err(Error::config("private key file is required"));
        }
        if files.ca_cert_file.as_os_str().is_empty() {
            error!("TLS CA certificate file not configured");
            return Err(Error::config("CA certificate file is required"));
        }
        if let Some(dh) = &files.dh_params_file {
            if !dh.exists() {
                error!(path = %dh.display(), "configured DH params file does not exist");
                return Err(Error::config(format!("DH params file not found: {}", dh.display())));
            }
            debug!(path = %dh.display(), "DH params file present (accepted, unused by rustls)");
        }

        let certs = load_certs(&files.cert_file)?;
        let key = load_key(&files.key_file)?;
        let root_store = load_root_store(&files.ca_cert_file)?;
        let root_store = Arc::new(root_store);

        let client_verifier = WebPkiClientVerifier::builder(root_store.clone())
            .build()
            .map_err(|e| Error::config(format!("failed to build client verifier: {e}")))?;

        let server = ServerConfig::builder()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(certs.clone(), key.clone_key())
            .map_err(|e| Error::config(format!("failed to build server config: {e}")))?;

        let client = ClientConfig::builder()
            .with_root_certificates(root_store.as_ref().clone())
            .with_client_auth_cert(certs.clone(), key.clone_key())
            .map_err(|e| Error::config(format!("failed to build client config: {e}")))?;

        let ctx = TlsContext {
            server: Arc::new(server),
            client: Arc::new(client),
            root_store,
            certs,
            key,
        };

        *self.current.write().unwrap() = Some(Arc::new(ctx));
        info!("TLS context reconfigured");
        Ok(())
    }
}

impl Default for TlsConfigurator {
    fn default() -> Self {
        Self::new()
    }
}
