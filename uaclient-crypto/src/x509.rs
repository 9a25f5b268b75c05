// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! X509 certificate handling. Certificates travel as DER byte strings in
//! security headers and endpoint descriptions; this wrapper keeps the raw
//! DER alongside the parsed form.

use log::error;
use sha1::{Digest, Sha1};
use x509_cert::{
    der::{Decode, Encode},
    ext::pkix::{name::GeneralName, SubjectAltName},
    Certificate,
};

use uaclient_types::{ByteString, StatusCode};

use crate::pkey::PublicKey;

/// The SHA-1 thumbprint of a certificate, used in asymmetric security
/// headers to identify the receiver's certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbprint {
    value: [u8; Thumbprint::THUMBPRINT_SIZE],
}

impl Thumbprint {
    /// A thumbprint is always the size of a SHA-1 digest.
    pub const THUMBPRINT_SIZE: usize = 20;

    /// Compute the thumbprint of DER encoded certificate data.
    pub fn new(der: &[u8]) -> Thumbprint {
        let digest = Sha1::digest(der);
        let mut value = [0u8; Self::THUMBPRINT_SIZE];
        value.copy_from_slice(&digest);
        Thumbprint { value }
    }

    /// The thumbprint bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The thumbprint as a byte string for a security header.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.value.to_vec())
    }
}

/// A parsed X509v3 certificate plus its original DER bytes.
#[derive(Debug, Clone)]
pub struct X509 {
    der: Vec<u8>,
    cert: Certificate,
}

impl X509 {
    /// Parse a certificate from DER bytes.
    pub fn from_der(der: &[u8]) -> Result<X509, StatusCode> {
        let cert = Certificate::from_der(der).map_err(|e| {
            error!("Cannot parse certificate: {e}");
            StatusCode::BadCertificateInvalid
        })?;
        Ok(X509 {
            der: der.to_vec(),
            cert,
        })
    }

    /// Parse a certificate from a byte string, as carried in messages.
    pub fn from_byte_string(data: &ByteString) -> Result<X509, StatusCode> {
        if data.is_null() {
            Err(StatusCode::BadCertificateInvalid)
        } else {
            X509::from_der(data.as_ref())
        }
    }

    /// The certificate as a byte string for messages.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(&self.der)
    }

    /// The raw DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The SHA-1 thumbprint of the certificate.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::new(&self.der)
    }

    /// Extract the RSA public key from the certificate.
    pub fn public_key(&self) -> Result<PublicKey, StatusCode> {
        let spki_der = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| {
                error!("Cannot re-encode subject public key info: {e}");
                StatusCode::BadCertificateInvalid
            })?;
        PublicKey::from_der(&spki_der)
    }

    /// The application URI embedded in the certificate's subject alternative
    /// name, if any. Used to cross check the configured application URI.
    pub fn application_uri(&self) -> Option<String> {
        let extensions = self.cert.tbs_certificate.extensions.as_ref()?;
        let san = extensions
            .iter()
            .find(|e| e.extn_id == const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME)?;
        let san = SubjectAltName::from_der(san.extn_value.as_bytes()).ok()?;
        san.0.iter().find_map(|name| match name {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.as_str().to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbprint_is_sha1() {
        let t = Thumbprint::new(b"certificate data");
        assert_eq!(t.value().len(), Thumbprint::THUMBPRINT_SIZE);
        // Same input, same thumbprint.
        assert_eq!(t, Thumbprint::new(b"certificate data"));
        assert_ne!(t, Thumbprint::new(b"other data"));
    }

    #[test]
    fn null_byte_string_is_rejected() {
        assert_eq!(
            X509::from_byte_string(&ByteString::null()).err(),
            Some(StatusCode::BadCertificateInvalid)
        );
    }
}
