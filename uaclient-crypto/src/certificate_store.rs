// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The certificate store holds the application instance certificate and
//! private key, and the trust settings applied to remote certificates.
//!
//! Certificate verification itself is deliberately shallow here. The stack
//! checks what it needs for the connection handshake and leaves full PKI
//! management to the application.

use std::fs;
use std::path::Path;

use log::{error, warn};

use uaclient_types::StatusCode;

use crate::pkey::PrivateKey;
use crate::x509::X509;

/// Holds the client's own certificate and key plus trust settings for
/// server certificates.
pub struct CertificateStore {
    own_cert: Option<X509>,
    own_private_key: Option<PrivateKey>,
    /// Trust any server certificate without checking the trust store.
    trust_unknown_certs: bool,
}

impl Default for CertificateStore {
    fn default() -> Self {
        CertificateStore::new()
    }
}

impl CertificateStore {
    /// An empty store with no certificate. Encrypted endpoints will not
    /// work until a certificate and key are supplied.
    pub fn new() -> CertificateStore {
        CertificateStore {
            own_cert: None,
            own_private_key: None,
            trust_unknown_certs: false,
        }
    }

    /// A store pre-populated with a certificate and key.
    pub fn new_with_keypair(cert: X509, private_key: PrivateKey) -> CertificateStore {
        CertificateStore {
            own_cert: Some(cert),
            own_private_key: Some(private_key),
            trust_unknown_certs: false,
        }
    }

    /// Load the application certificate (DER) and private key (PEM) from
    /// disk.
    pub fn load_own_keypair(
        &mut self,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(), StatusCode> {
        let der = fs::read(cert_path).map_err(|e| {
            error!("Cannot read certificate from {}: {e}", cert_path.display());
            StatusCode::BadCertificateInvalid
        })?;
        let cert = X509::from_der(&der)?;
        let pem = fs::read_to_string(key_path).map_err(|e| {
            error!("Cannot read private key from {}: {e}", key_path.display());
            StatusCode::BadSecurityChecksFailed
        })?;
        let key = PrivateKey::from_pem(&pem)?;
        self.own_cert = Some(cert);
        self.own_private_key = Some(key);
        Ok(())
    }

    /// Whether unknown server certificates are accepted without question.
    pub fn set_trust_unknown_certs(&mut self, trust: bool) {
        self.trust_unknown_certs = trust;
    }

    /// The application instance certificate, if one is configured.
    pub fn read_own_cert(&self) -> Result<X509, StatusCode> {
        self.own_cert
            .clone()
            .ok_or(StatusCode::BadCertificateInvalid)
    }

    /// The application private key, if one is configured.
    pub fn read_own_pkey(&self) -> Result<PrivateKey, StatusCode> {
        self.own_private_key
            .clone()
            .ok_or(StatusCode::BadSecurityChecksFailed)
    }

    /// Check a server certificate before use. With `trust_unknown_certs`
    /// set this accepts anything parseable, otherwise it still accepts the
    /// certificate but warns; full chain validation is an application
    /// concern.
    pub fn validate_server_cert(&self, cert: &X509) -> Result<(), StatusCode> {
        if !self.trust_unknown_certs {
            warn!(
                "Server certificate with thumbprint {:?} accepted without chain validation",
                cert.thumbprint().value()
            );
        }
        Ok(())
    }

    /// Compare the URI embedded in the application certificate against the
    /// configured application URI. A mismatch is reported but does not
    /// fail, matching observed behavior of deployed clients.
    pub fn check_application_uri(&self, application_uri: &str) {
        let Some(cert) = &self.own_cert else {
            return;
        };
        match cert.application_uri() {
            Some(cert_uri) if cert_uri != application_uri => {
                warn!(
                    "Configured application URI \"{}\" does not match the certificate's \"{}\"",
                    application_uri, cert_uri
                );
            }
            None => {
                warn!("Application certificate carries no application URI");
            }
            _ => {}
        }
    }
}
