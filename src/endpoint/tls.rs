//! Derivation of a rustls client configuration from stored TLS material.

use std::sync::Arc;
use std::time::SystemTime;

use pkcs8::der::pem::PemLabel;
use pkcs8::{EncryptedPrivateKeyInfo, SecretDocument};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerName};
use rustls_pemfile::Item;
use tracing::{debug, warn};

use crate::error::TlsError;

use super::TlsData;

const LEGACY_ENCRYPTION_HEADER: &str = "Proc-Type: 4,ENCRYPTED";

/// Transport-level TLS settings for a client connecting to an endpoint.
#[derive(Clone)]
pub struct ClientTls {
    pub config: Arc<ClientConfig>,
    pub insecure_skip_verify: bool,
    pub has_client_identity: bool,
    /// Roots taken from the endpoint's CA; zero when the platform roots are used.
    pub custom_roots: usize,
}

impl std::fmt::Debug for ClientTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTls")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("has_client_identity", &self.has_client_identity)
            .field("custom_roots", &self.custom_roots)
            .finish_non_exhaustive()
    }
}

/// Build the client TLS configuration for an endpoint.
///
/// Returns `None` when there is no TLS material and verification is not skipped,
/// which is the plaintext case. A client identity is only configured when both the
/// certificate and the key are present. An encrypted key without `password` fails
/// with [`TlsError::EncryptedKeyNeedsPassphrase`]; exactly one decryption attempt is
/// made when a password is given.
pub fn client_tls(
    tls: Option<&TlsData>,
    skip_verify: bool,
    password: Option<&str>,
) -> Result<Option<ClientTls>, TlsError> {
    let tls = tls.filter(|t| !t.is_empty());
    if tls.is_none() && !skip_verify {
        return Ok(None);
    }

    let (roots, custom_roots) = match tls.and_then(|t| t.ca.as_deref()) {
        Some(ca) => {
            let roots = ca_roots(ca)?;
            let count = roots.len();
            (roots, count)
        }
        None => (native_roots(), 0),
    };

    let builder = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots);

    let identity = match tls {
        Some(TlsData {
            cert: Some(cert),
            key: Some(key),
            ..
        }) => Some((certificates(cert)?, private_key(key, password)?)),
        _ => None,
    };
    let has_client_identity = identity.is_some();

    let mut config = match identity {
        Some((chain, key)) => builder.with_client_auth_cert(chain, key)?,
        None => builder.with_no_client_auth(),
    };

    if skip_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(SkipServerVerification));
    }

    debug!(
        custom_roots,
        has_client_identity,
        insecure_skip_verify = skip_verify,
        "derived client TLS configuration"
    );

    Ok(Some(ClientTls {
        config: Arc::new(config),
        insecure_skip_verify: skip_verify,
        has_client_identity,
        custom_roots,
    }))
}

fn ca_roots(ca: &[u8]) -> Result<RootCertStore, TlsError> {
    let ders = rustls_pemfile::certs(&mut &ca[..]).map_err(|e| TlsError::InvalidCa(e.to_string()))?;
    if ders.is_empty() {
        return Err(TlsError::InvalidCa("no PEM certificates found".to_string()));
    }
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(&ders);
    if added == 0 {
        return Err(TlsError::InvalidCa(format!(
            "none of {} certificates could be parsed",
            ignored
        )));
    }
    Ok(roots)
}

fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let ders: Vec<Vec<u8>> = certs.into_iter().map(|c| c.0).collect();
            roots.add_parsable_certificates(&ders);
        }
        Err(e) => warn!(error = %e, "could not load platform root certificates"),
    }
    roots
}

fn certificates(pem: &[u8]) -> Result<Vec<Certificate>, TlsError> {
    let ders = rustls_pemfile::certs(&mut &pem[..])
        .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
    if ders.is_empty() {
        return Err(TlsError::InvalidCertificate(
            "no PEM certificates found".to_string(),
        ));
    }
    Ok(ders.into_iter().map(Certificate).collect())
}

fn private_key(pem: &[u8], password: Option<&str>) -> Result<PrivateKey, TlsError> {
    let text = String::from_utf8_lossy(pem);

    if text.contains(LEGACY_ENCRYPTION_HEADER) {
        return match password {
            None => Err(TlsError::EncryptedKeyNeedsPassphrase),
            Some(_) => Err(TlsError::UnsupportedKeyEncryption),
        };
    }

    if let Some(block) = encrypted_pkcs8_block(&text) {
        let Some(password) = password else {
            return Err(TlsError::EncryptedKeyNeedsPassphrase);
        };
        let (label, document) =
            SecretDocument::from_pem(block).map_err(|e| TlsError::Decrypt(e.to_string()))?;
        if label != EncryptedPrivateKeyInfo::PEM_LABEL {
            return Err(TlsError::InvalidKey(format!("unexpected PEM label {}", label)));
        }
        let info = EncryptedPrivateKeyInfo::try_from(document.as_bytes())
            .map_err(|e| TlsError::Decrypt(e.to_string()))?;
        let decrypted = info
            .decrypt(password.as_bytes())
            .map_err(|e| TlsError::Decrypt(e.to_string()))?;
        return Ok(PrivateKey(decrypted.as_bytes().to_vec()));
    }

    let items = rustls_pemfile::read_all(&mut &pem[..]).map_err(|e| TlsError::InvalidKey(e.to_string()))?;
    items
        .into_iter()
        .find_map(|item| match item {
            Item::PKCS8Key(der) | Item::RSAKey(der) | Item::ECKey(der) => Some(PrivateKey(der)),
            _ => None,
        })
        .ok_or_else(|| TlsError::InvalidKey("no PEM private key found".to_string()))
}

/// The `ENCRYPTED PRIVATE KEY` block of `text`, boundaries included. Other blocks
/// in the same file are left out so pkcs8 sees a single document.
fn encrypted_pkcs8_block(text: &str) -> Option<&str> {
    let begin = format!("-----BEGIN {}-----", EncryptedPrivateKeyInfo::PEM_LABEL);
    let end = format!("-----END {}-----", EncryptedPrivateKeyInfo::PEM_LABEL);
    let start = text.find(&begin)?;
    // an unterminated block is still handed to pkcs8, which reports it
    let stop = text[start..]
        .find(&end)
        .map_or(text.len(), |i| start + i + end.len());
    Some(&text[start..stop])
}

/// Accepts any server certificate. Installed only when the endpoint asks to skip
/// verification.
struct SkipServerVerification;

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
