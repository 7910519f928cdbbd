//! TLS certificate chain inspection: handshake with validation disabled,
//! then decode every certificate in the chain for display.

use crate::error::ScannerError;
use chrono::{DateTime, TimeZone, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, SignatureScheme};
use sha2::{Digest, Sha256};
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::ED25519,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub thumbprint: String,
    pub serial: String,
    pub subject_alt_names: Vec<String>,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub key_size: Option<u32>,
    pub is_self_signed: bool,
}

#[derive(Debug, Clone)]
pub struct InspectCertificateResult {
    pub chain: Vec<CertificateInfo>,
    pub leaf_days_remaining: i64,
    pub leaf_is_valid_now: bool,
}

fn sha256_hex(der: &[u8]) -> String {
    Sha256::digest(der).iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_cert(der: &[u8]) -> Option<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    let not_before = Utc.timestamp_opt(cert.validity().not_before.timestamp(), 0).single()?;
    let not_after = Utc.timestamp_opt(cert.validity().not_after.timestamp(), 0).single()?;
    let sans = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .map(|gn| gn.to_string())
                .collect()
        })
        .unwrap_or_default();

    Some(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before,
        not_after,
        thumbprint: sha256_hex(der),
        serial: cert.serial.to_str_radix(16),
        subject_alt_names: sans,
        signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
        public_key_algorithm: cert.public_key().algorithm.algorithm.to_id_string(),
        key_size: cert.public_key().subject_public_key.data.len().checked_mul(8).map(|b| b as u32),
        is_self_signed: cert.subject() == cert.issuer(),
    })
}

/// Connects to `host:port`, performs a TLS handshake with certificate
/// validation disabled, and decodes the presented chain.
pub async fn inspect_certificate(host: &str, port: u16) -> Result<InspectCertificateResult, ScannerError> {
    let addr = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|e| ScannerError::Tls(e.to_string()))?
        .next()
        .ok_or_else(|| ScannerError::Tls("could not resolve host".to_string()))?;

    let tcp = time::timeout(Duration::from_secs(7), TcpStream::connect(addr))
        .await
        .map_err(|_| ScannerError::Timeout)?
        .map_err(|e| ScannerError::Tls(e.to_string()))?;

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name =
        ServerName::try_from(host.to_string()).map_err(|_| ScannerError::Tls("invalid SNI hostname".to_string()))?;

    let tls_stream = time::timeout(Duration::from_secs(7), connector.connect(server_name, tcp))
        .await
        .map_err(|_| ScannerError::Timeout)?
        .map_err(|e| ScannerError::Tls(e.to_string()))?;

    let (_, session) = tls_stream.get_ref();
    let certs = session
        .peer_certificates()
        .ok_or_else(|| ScannerError::Tls("no certificates presented".to_string()))?;

    let chain: Vec<CertificateInfo> = certs.iter().filter_map(|c| decode_cert(c.as_ref())).collect();
    let leaf = chain.first().ok_or_else(|| ScannerError::Tls("empty certificate chain".to_string()))?;
    let now = Utc::now();
    let leaf_days_remaining = (leaf.not_after - now).num_days();
    let leaf_is_valid_now = now >= leaf.not_before && now <= leaf.not_after;

    Ok(InspectCertificateResult { chain, leaf_days_remaining, leaf_is_valid_now })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_certificate_is_flagged_via_subject_issuer_equality() {
        let rcgen::CertifiedKey { cert, .. } = rcgen::generate_simple_self_signed(vec!["example.test".to_string()]).unwrap();
        let info = decode_cert(cert.der().as_ref()).expect("decodes the synthetic certificate");
        assert!(info.is_self_signed);
        assert_eq!(info.subject, info.issuer);
    }
}
