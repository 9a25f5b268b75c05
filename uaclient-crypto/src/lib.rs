// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Cryptography used by the connection stack: security policies, nonce
//! generation, key derivation, symmetric and asymmetric operations,
//! certificates and user identity token encryption.

pub mod aeskey;
pub mod certificate_store;
pub mod pkey;
pub mod random;
pub mod security_policy;
pub mod user_identity;
pub mod x509;

pub use certificate_store::CertificateStore;
pub use pkey::{KeySize, PrivateKey, PublicKey, RsaPadding};
pub use security_policy::SecurityPolicy;
pub use user_identity::make_user_name_identity_token;
pub use x509::{Thumbprint, X509};

use uaclient_types::{ByteString, StatusCode, UAString};

/// Create a `SignatureData` proving possession of the private key by
/// signing the remote certificate concatenated with the remote nonce.
pub fn create_signature_data(
    signing_key: &PrivateKey,
    security_policy: SecurityPolicy,
    contained_cert: &ByteString,
    nonce: &ByteString,
) -> Result<uaclient_types::SignatureData, StatusCode> {
    let data = [contained_cert.as_ref(), nonce.as_ref()].concat();
    let mut signature = vec![0u8; signing_key.size()];
    security_policy.asymmetric_sign(signing_key, &data, &mut signature)?;
    Ok(uaclient_types::SignatureData {
        algorithm: UAString::from(security_policy.asymmetric_signature_algorithm()),
        signature: ByteString::from(signature),
    })
}
