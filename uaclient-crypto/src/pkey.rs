// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Asymmetric key wrappers over the `rsa` crate, providing the sign /
//! verify / encrypt / decrypt operations the security policies are built
//! from.

use log::error;
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    pss::Pss,
    traits::PublicKeyParts,
    Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey,
};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use uaclient_types::StatusCode;

/// The padding scheme applied to RSA encryption, determined by the
/// security policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5.
    Pkcs1,
    /// OAEP with SHA-1.
    OaepSha1,
    /// OAEP with SHA-256.
    OaepSha256,
}

/// Padding overhead in bytes for each scheme.
impl RsaPadding {
    fn overhead(&self) -> usize {
        match self {
            RsaPadding::Pkcs1 => 11,
            RsaPadding::OaepSha1 => 42,
            RsaPadding::OaepSha256 => 66,
        }
    }
}

/// Sizing operations common to public and private keys.
pub trait KeySize {
    /// The key size in bytes, which is also the cipher block size.
    fn size(&self) -> usize;

    /// The number of plain text bytes that fit into one cipher block under
    /// the given padding.
    fn plain_text_block_size(&self, padding: RsaPadding) -> usize {
        self.size() - padding.overhead()
    }

    /// The total cipher text size for `data_size` bytes of plain text under
    /// the given padding.
    fn calculate_cipher_text_size(&self, data_size: usize, padding: RsaPadding) -> usize {
        let plain_block_size = self.plain_text_block_size(padding);
        let blocks = data_size.div_ceil(plain_block_size);
        blocks * self.size()
    }
}

/// An RSA private key.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl KeySize for PrivateKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PrivateKey {
    /// Wrap an existing RSA private key.
    pub fn new(key: RsaPrivateKey) -> PrivateKey {
        PrivateKey { key }
    }

    /// Generate a fresh key of `bit_length` bits.
    pub fn new_rsa(bit_length: usize) -> Result<PrivateKey, StatusCode> {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, bit_length)
            .map(|key| PrivateKey { key })
            .map_err(|e| {
                error!("Cannot generate RSA key: {e}");
                StatusCode::BadUnexpectedError
            })
    }

    /// Parse a private key from PEM, accepting both PKCS#8 and PKCS#1
    /// containers.
    pub fn from_pem(pem: &str) -> Result<PrivateKey, StatusCode> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(|key| PrivateKey { key })
            .map_err(|e| {
                error!("Cannot parse private key: {e}");
                StatusCode::BadSecurityChecksFailed
            })
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: self.key.to_public_key(),
        }
    }

    /// Sign a SHA-1 digest of `data` with PKCS#1 v1.5 padding.
    pub fn sign_sha1(&self, data: &[u8]) -> Result<Vec<u8>, StatusCode> {
        let digest = Sha1::digest(data);
        self.key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| {
                error!("Signing failed: {e}");
                StatusCode::BadSecurityChecksFailed
            })
    }

    /// Sign a SHA-256 digest of `data` with PKCS#1 v1.5 padding.
    pub fn sign_sha256(&self, data: &[u8]) -> Result<Vec<u8>, StatusCode> {
        let digest = Sha256::digest(data);
        self.key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| {
                error!("Signing failed: {e}");
                StatusCode::BadSecurityChecksFailed
            })
    }

    /// Sign a SHA-256 digest of `data` with PSS padding.
    pub fn sign_sha256_pss(&self, data: &[u8]) -> Result<Vec<u8>, StatusCode> {
        let digest = Sha256::digest(data);
        let mut rng = rand::thread_rng();
        self.key
            .sign_with_rng(&mut rng, Pss::new::<Sha256>(), &digest)
            .map_err(|e| {
                error!("Signing failed: {e}");
                StatusCode::BadSecurityChecksFailed
            })
    }

    /// Decrypt `src`, a sequence of whole cipher blocks, into `dst`.
    /// Returns the number of plain text bytes written.
    pub fn decrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, StatusCode> {
        let cipher_block_size = self.size();
        if src.len() % cipher_block_size != 0 {
            error!(
                "Encrypted data length {} is not a multiple of the cipher block size {}",
                src.len(),
                cipher_block_size
            );
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        let mut dst_offset = 0;
        for block in src.chunks(cipher_block_size) {
            let plain = match padding {
                RsaPadding::Pkcs1 => self.key.decrypt(Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => self.key.decrypt(Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => self.key.decrypt(Oaep::new::<Sha256>(), block),
            }
            .map_err(|e| {
                error!("Decryption failed: {e}");
                StatusCode::BadSecurityChecksFailed
            })?;
            dst[dst_offset..dst_offset + plain.len()].copy_from_slice(&plain);
            dst_offset += plain.len();
        }
        Ok(dst_offset)
    }
}

/// An RSA public key, typically extracted from an X509 certificate.
#[derive(Debug, Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
}

impl KeySize for PublicKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PublicKey {
    /// Wrap an existing RSA public key.
    pub fn new(key: RsaPublicKey) -> PublicKey {
        PublicKey { key }
    }

    /// Parse a public key from a DER encoded SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<PublicKey, StatusCode> {
        RsaPublicKey::from_public_key_der(der)
            .map(|key| PublicKey { key })
            .map_err(|e| {
                error!("Cannot parse public key: {e}");
                StatusCode::BadCertificateInvalid
            })
    }

    /// Verify a PKCS#1 v1.5 signature over the SHA-1 digest of `data`.
    pub fn verify_sha1(&self, data: &[u8], signature: &[u8]) -> Result<(), StatusCode> {
        let digest = Sha1::digest(data);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, signature)
            .map_err(|_| StatusCode::BadSecurityChecksFailed)
    }

    /// Verify a PKCS#1 v1.5 signature over the SHA-256 digest of `data`.
    pub fn verify_sha256(&self, data: &[u8], signature: &[u8]) -> Result<(), StatusCode> {
        let digest = Sha256::digest(data);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|_| StatusCode::BadSecurityChecksFailed)
    }

    /// Verify a PSS signature over the SHA-256 digest of `data`.
    pub fn verify_sha256_pss(&self, data: &[u8], signature: &[u8]) -> Result<(), StatusCode> {
        let digest = Sha256::digest(data);
        self.key
            .verify(Pss::new::<Sha256>(), &digest, signature)
            .map_err(|_| StatusCode::BadSecurityChecksFailed)
    }

    /// Encrypt `src` into `dst` block by block. Returns the number of
    /// cipher text bytes written.
    pub fn encrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, StatusCode> {
        let plain_block_size = self.plain_text_block_size(padding);
        let mut rng = rand::thread_rng();
        let mut dst_offset = 0;
        for block in src.chunks(plain_block_size) {
            let cipher = match padding {
                RsaPadding::Pkcs1 => self.key.encrypt(&mut rng, Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => self.key.encrypt(&mut rng, Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => {
                    self.key.encrypt(&mut rng, Oaep::new::<Sha256>(), block)
                }
            }
            .map_err(|e| {
                error!("Encryption failed: {e}");
                StatusCode::BadSecurityChecksFailed
            })?;
            if dst_offset + cipher.len() > dst.len() {
                error!("Encryption output does not fit the destination buffer");
                return Err(StatusCode::BadSecurityChecksFailed);
            }
            dst[dst_offset..dst_offset + cipher.len()].copy_from_slice(&cipher);
            dst_offset += cipher.len();
        }
        Ok(dst_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let private = PrivateKey::new_rsa(2048).unwrap();
        let public = private.public_key();
        assert_eq!(public.size(), 256);

        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        for padding in [RsaPadding::Pkcs1, RsaPadding::OaepSha1, RsaPadding::OaepSha256] {
            let cipher_size = public.calculate_cipher_text_size(data.len(), padding);
            let mut cipher = vec![0u8; cipher_size];
            let written = public.encrypt(&data, &mut cipher, padding).unwrap();
            assert_eq!(written, cipher_size);

            let mut plain = vec![0u8; cipher_size];
            let len = private.decrypt(&cipher, &mut plain, padding).unwrap();
            assert_eq!(&plain[..len], &data[..]);
        }
    }

    #[test]
    fn sign_verify_round_trip() {
        let private = PrivateKey::new_rsa(2048).unwrap();
        let public = private.public_key();
        let data = b"some signed data";

        let sig = private.sign_sha256(data).unwrap();
        assert_eq!(sig.len(), private.size());
        public.verify_sha256(data, &sig).unwrap();
        assert!(public.verify_sha256(b"other data", &sig).is_err());

        let sig = private.sign_sha1(data).unwrap();
        public.verify_sha1(data, &sig).unwrap();

        let sig = private.sign_sha256_pss(data).unwrap();
        public.verify_sha256_pss(data, &sig).unwrap();
    }
}
