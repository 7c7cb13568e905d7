use std::sync::Arc;

use log::warn;
use rumqttc::tokio_rustls::rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{self, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, Error, RootCertStore, SignatureScheme,
};

/// Accepts any server certificate chain and name, but still checks the
/// handshake signatures against the presented certificate.
///
/// Printers ship self-signed certificates, so there is nothing to chain to.
#[derive(Debug)]
pub struct SelfSignedServerCertVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SelfSignedServerCertVerifier {
    pub fn new() -> Self {
        Self { algorithms: crypto::ring::default_provider().signature_verification_algorithms }
    }
}

impl Default for SelfSignedServerCertVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerCertVerifier for SelfSignedServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

pub fn get_system_certs() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for error in &loaded.errors {
        warn!("Could not load a platform certificate: {error}");
    }
    for cert in loaded.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Skipping unusable platform certificate: {e}");
        }
    }
    roots
}

pub fn client_config(ignore_tls_errors: bool) -> ClientConfig {
    match ignore_tls_errors {
        // TLS without certificate verification.
        true => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SelfSignedServerCertVerifier::new()))
            .with_no_client_auth(),
        // TLS with certificate verification.
        false => ClientConfig::builder().with_root_certificates(get_system_certs()).with_no_client_auth(),
    }
}
