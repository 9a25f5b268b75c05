// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Security policies and the cryptographic operations they parameterize:
//! key derivation from nonces, symmetric signing and encryption, and the
//! asymmetric operations used to protect OpenSecureChannel.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use log::error;
use sha1::Sha1;
use sha2::Sha256;

use uaclient_types::StatusCode;

use crate::aeskey::{AesKey, AES_BLOCK_SIZE};
use crate::pkey::{PrivateKey, PublicKey, RsaPadding};

/// The length in bytes of the nonce each side contributes to key
/// derivation, one fresh nonce per OpenSecureChannel.
pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 32;

// Policy URIs
const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
const SECURITY_POLICY_BASIC_128_RSA_15_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
const SECURITY_POLICY_BASIC_256_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
const SECURITY_POLICY_BASIC_256_SHA_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

// Short names used in config files
const SECURITY_POLICY_NONE: &str = "None";
const SECURITY_POLICY_BASIC_128_RSA_15: &str = "Basic128Rsa15";
const SECURITY_POLICY_BASIC_256: &str = "Basic256";
const SECURITY_POLICY_BASIC_256_SHA_256: &str = "Basic256Sha256";
const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP: &str = "Aes128-Sha256-RsaOaep";
const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS: &str = "Aes256-Sha256-RsaPss";

/// The digest family a policy uses for symmetric signatures and key
/// derivation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DigestFamily {
    Sha1,
    Sha256,
}

/// A security policy determines the algorithms used on a secure channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecurityPolicy {
    /// An unrecognized policy, rejected everywhere.
    Unknown,
    /// No security at all. Messages travel in the clear.
    None,
    /// Legacy policy, deprecated by the specification.
    Basic128Rsa15,
    /// Legacy policy, deprecated by the specification.
    Basic256,
    /// The most widely deployed secure policy.
    Basic256Sha256,
    /// AES-128 with RSA-OAEP key transport.
    Aes128Sha256RsaOaep,
    /// AES-256 with RSA-PSS signatures.
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            SECURITY_POLICY_NONE | SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15 | SECURITY_POLICY_BASIC_128_RSA_15_URI => {
                SecurityPolicy::Basic128Rsa15
            }
            SECURITY_POLICY_BASIC_256 | SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256 | SECURITY_POLICY_BASIC_256_SHA_256_URI => {
                SecurityPolicy::Basic256Sha256
            }
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP
            | SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS
            | SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy \"{}\" is not recognized", s);
                SecurityPolicy::Unknown
            }
        })
    }
}

impl SecurityPolicy {
    /// Look a policy up from its URI. Unrecognized URIs yield `Unknown`.
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15_URI => SecurityPolicy::Basic128Rsa15,
            SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256_URI => SecurityPolicy::Basic256Sha256,
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!(
                    "Specified security policy uri \"{}\" is not recognized",
                    uri
                );
                SecurityPolicy::Unknown
            }
        }
    }

    /// The URI of the policy. Panics on `Unknown`, which must be filtered
    /// out before this point.
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15_URI,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256_URI,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256_URI,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI,
            SecurityPolicy::Unknown => {
                panic!("Can't turn an unknown policy into a URI")
            }
        }
    }

    /// The short name of the policy as used in configuration files.
    pub fn to_str(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => "Unknown",
        }
    }

    /// `true` for every policy this stack can actually operate.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SecurityPolicy::Unknown)
    }

    /// `true` for policies the specification has deprecated. They still
    /// work, servers still offer them.
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256
        )
    }

    fn digest_family(&self) -> DigestFamily {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => DigestFamily::Sha1,
            _ => DigestFamily::Sha256,
        }
    }

    /// The length of the nonce each peer generates for key derivation.
    pub fn secure_channel_nonce_length(&self) -> usize {
        SECURE_CHANNEL_NONCE_LENGTH
    }

    /// The length in bytes of a symmetric signature under this policy.
    pub fn symmetric_signature_size(&self) -> usize {
        match self.digest_family() {
            DigestFamily::Sha1 => 20,
            DigestFamily::Sha256 => 32,
        }
    }

    /// The derived symmetric signing key length in bytes.
    pub fn derived_signature_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => 16,
            SecurityPolicy::Basic256 => 24,
            _ => 32,
        }
    }

    /// The derived symmetric encryption key length in bytes.
    pub fn derived_encryption_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => 16,
            _ => 32,
        }
    }

    /// The symmetric plain text block size in bytes.
    pub fn plain_block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// The padding scheme used for asymmetric encryption under this policy.
    pub fn asymmetric_encryption_padding(&self) -> RsaPadding {
        match self {
            SecurityPolicy::Basic128Rsa15 => RsaPadding::Pkcs1,
            SecurityPolicy::Aes256Sha256RsaPss => RsaPadding::OaepSha256,
            _ => RsaPadding::OaepSha1,
        }
    }

    /// URI of the asymmetric signature algorithm, for `SignatureData`.
    pub fn asymmetric_signature_algorithm(&self) -> &'static str {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                "http://www.w3.org/2000/09/xmldsig#rsa-sha1"
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/security/rsa-pss-sha2-256"
            }
            _ => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        }
    }

    /// Pseudo random function which uses a hash iteratively over a secret
    /// and seed to produce a key of the requested length, per part 6.
    pub fn prf(&self, secret: &[u8], seed: &[u8], length: usize, offset: usize) -> Vec<u8> {
        let out = match self.digest_family() {
            DigestFamily::Sha1 => p_hash(hmac_sha1, secret, seed, length + offset),
            DigestFamily::Sha256 => p_hash(hmac_sha256, secret, seed, length + offset),
        };
        out[offset..].to_vec()
    }

    /// Derive the (signing key, encryption key, iv) triple from the two
    /// nonces. Called once per side after a successful OPN.
    pub fn make_secure_channel_keys(
        &self,
        secret: &[u8],
        seed: &[u8],
    ) -> (Vec<u8>, AesKey, Vec<u8>) {
        let signing_key_length = self.derived_signature_key_size();
        let encrypting_key_length = self.derived_encryption_key_size();
        let encrypting_block_size = self.plain_block_size();

        let signing_key = self.prf(secret, seed, signing_key_length, 0);
        let encrypting_key = self.prf(secret, seed, encrypting_key_length, signing_key_length);
        let iv = self.prf(
            secret,
            seed,
            encrypting_block_size,
            signing_key_length + encrypting_key_length,
        );

        (signing_key, AesKey::new(&encrypting_key), iv)
    }

    /// Produce a symmetric signature over `data` into `signature`.
    pub fn symmetric_sign(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let computed = match self.digest_family() {
            DigestFamily::Sha1 => hmac_sha1(key, data),
            DigestFamily::Sha256 => hmac_sha256(key, data),
        };
        if signature.len() != computed.len() {
            error!(
                "Signature buffer has length {}, expected {}",
                signature.len(),
                computed.len()
            );
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        signature.copy_from_slice(&computed);
        Ok(())
    }

    /// Verify a symmetric signature over `data`.
    pub fn symmetric_verify_signature(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), StatusCode> {
        let computed = match self.digest_family() {
            DigestFamily::Sha1 => hmac_sha1(key, data),
            DigestFamily::Sha256 => hmac_sha256(key, data),
        };
        // Constant time comparison is not required here, the signature is
        // over public message data.
        if computed.as_slice() == signature {
            Ok(())
        } else {
            error!("Signature mismatch");
            Err(StatusCode::BadSecurityChecksFailed)
        }
    }

    /// Symmetric encryption of whole blocks.
    pub fn symmetric_encrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.encrypt(src, iv, dst)
    }

    /// Symmetric decryption of whole blocks.
    pub fn symmetric_decrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.decrypt(src, iv, dst)
    }

    /// Produce an asymmetric signature over `data` into `signature` with
    /// the policy's signature scheme.
    pub fn asymmetric_sign(
        &self,
        signing_key: &PrivateKey,
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let computed = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                signing_key.sign_sha1(data)?
            }
            SecurityPolicy::Aes256Sha256RsaPss => signing_key.sign_sha256_pss(data)?,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                signing_key.sign_sha256(data)?
            }
            _ => {
                error!("Cannot sign with policy {}", self);
                return Err(StatusCode::BadSecurityPolicyRejected);
            }
        };
        if signature.len() != computed.len() {
            error!(
                "Signature buffer has length {}, expected {}",
                signature.len(),
                computed.len()
            );
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        signature.copy_from_slice(&computed);
        Ok(())
    }

    /// Verify an asymmetric signature over `data`.
    pub fn asymmetric_verify_signature(
        &self,
        verification_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), StatusCode> {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                verification_key.verify_sha1(data, signature)
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                verification_key.verify_sha256_pss(data, signature)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                verification_key.verify_sha256(data, signature)
            }
            _ => {
                error!("Cannot verify with policy {}", self);
                Err(StatusCode::BadSecurityPolicyRejected)
            }
        }
    }

    /// Asymmetric encryption with the policy's padding scheme.
    pub fn asymmetric_encrypt(
        &self,
        encryption_key: &PublicKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        encryption_key.encrypt(src, dst, self.asymmetric_encryption_padding())
    }

    /// Asymmetric decryption with the policy's padding scheme.
    pub fn asymmetric_decrypt(
        &self,
        decryption_key: &PrivateKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        decryption_key.decrypt(src, dst, self.asymmetric_encryption_padding())
    }
}

/// P_HASH as defined in TLS and referenced by OPC UA part 6 for key
/// derivation.
fn p_hash(
    hmac: fn(&[u8], &[u8]) -> Vec<u8>,
    secret: &[u8],
    seed: &[u8],
    length: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(length);
    // A(1) = HMAC(secret, seed), A(n) = HMAC(secret, A(n-1))
    let mut a = hmac(secret, seed);
    while out.len() < length {
        let input = [a.as_slice(), seed].concat();
        out.extend_from_slice(&hmac(secret, &input));
        a = hmac(secret, &a);
    }
    out.truncate(length);
    out
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length so this cannot fail.
    let mut mac = Hmac::<Sha1>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_uri_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.to_uri()), policy);
            assert_eq!(SecurityPolicy::from_str(policy.to_str()).unwrap(), policy);
        }
        assert_eq!(
            SecurityPolicy::from_uri("http://example.org/Nonsense"),
            SecurityPolicy::Unknown
        );
    }

    #[test]
    fn prf_is_deterministic_and_sized() {
        let policy = SecurityPolicy::Basic256Sha256;
        let secret = [1u8; 32];
        let seed = [2u8; 32];
        let a = policy.prf(&secret, &seed, 64, 0);
        let b = policy.prf(&secret, &seed, 64, 0);
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        // The offset view must match the tail of the longer output.
        let c = policy.prf(&secret, &seed, 32, 32);
        assert_eq!(&a[32..], c.as_slice());
    }

    #[test]
    fn derived_keys_are_asymmetric_between_peers() {
        let policy = SecurityPolicy::Basic256Sha256;
        let local_nonce = [3u8; 32];
        let remote_nonce = [4u8; 32];
        let (sign1, _, iv1) = policy.make_secure_channel_keys(&local_nonce, &remote_nonce);
        let (sign2, _, iv2) = policy.make_secure_channel_keys(&remote_nonce, &local_nonce);
        assert_eq!(sign1.len(), 32);
        assert_eq!(iv1.len(), 16);
        assert_ne!(sign1, sign2);
        assert_ne!(iv1, iv2);
    }

    #[test]
    fn symmetric_sign_verify() {
        let policy = SecurityPolicy::Basic256Sha256;
        let key = [7u8; 32];
        let data = b"message";
        let mut signature = vec![0u8; policy.symmetric_signature_size()];
        policy.symmetric_sign(&key, data, &mut signature).unwrap();
        policy
            .symmetric_verify_signature(&key, data, &signature)
            .unwrap();
        assert!(policy
            .symmetric_verify_signature(&key, b"other", &signature)
            .is_err());
    }
}
