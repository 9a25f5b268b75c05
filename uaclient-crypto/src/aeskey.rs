// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Symmetric encryption / decryption wrapper.

use aes::cipher::{
    block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    KeyIvInit,
};
use log::error;

use uaclient_types::StatusCode;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES operates on 16 byte blocks regardless of key size.
pub const AES_BLOCK_SIZE: usize = 16;

/// An AES-CBC key of either 128 or 256 bits, derived from the channel
/// nonces. The initialization vector is derived alongside the key.
#[derive(Debug, Clone)]
pub struct AesKey {
    value: Vec<u8>,
}

impl AesKey {
    /// Wrap raw key material. The length decides the cipher, 16 bytes for
    /// AES-128 and 32 bytes for AES-256.
    pub fn new(value: &[u8]) -> AesKey {
        AesKey {
            value: value.to_vec(),
        }
    }

    /// The raw key material.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The key length in bytes.
    pub fn key_length(&self) -> usize {
        self.value.len()
    }

    /// The cipher block size in bytes.
    pub fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn validate_args(&self, src: &[u8], iv: &[u8], dst: &[u8]) -> Result<(), StatusCode> {
        if src.len() % AES_BLOCK_SIZE != 0 {
            error!(
                "Data length {} is not a multiple of the AES block size",
                src.len()
            );
            Err(StatusCode::BadUnexpectedError)
        } else if dst.len() < src.len() {
            error!(
                "Destination buffer {} is smaller than the data {}",
                dst.len(),
                src.len()
            );
            Err(StatusCode::BadUnexpectedError)
        } else if iv.len() != AES_BLOCK_SIZE {
            error!("IV is not an expected size, len = {}", iv.len());
            Err(StatusCode::BadUnexpectedError)
        } else {
            Ok(())
        }
    }

    /// Encrypt whole blocks of `src` into `dst`. Returns the number of
    /// bytes written.
    pub fn encrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, StatusCode> {
        self.validate_args(src, iv, dst)?;
        let iv = GenericArray::from_slice(iv);
        let result = match self.value.len() {
            16 => Aes128CbcEnc::new(GenericArray::from_slice(&self.value), iv)
                .encrypt_padded_b2b_mut::<NoPadding>(src, dst),
            32 => Aes256CbcEnc::new(GenericArray::from_slice(&self.value), iv)
                .encrypt_padded_b2b_mut::<NoPadding>(src, dst),
            other => {
                error!("Unsupported AES key length {}", other);
                return Err(StatusCode::BadUnexpectedError);
            }
        };
        result.map_err(|e| {
            error!("AES encryption failed: {e}");
            StatusCode::BadUnexpectedError
        })?;
        Ok(src.len())
    }

    /// Decrypt whole blocks of `src` into `dst`. Returns the number of
    /// bytes written.
    pub fn decrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, StatusCode> {
        self.validate_args(src, iv, dst)?;
        let iv = GenericArray::from_slice(iv);
        let result = match self.value.len() {
            16 => Aes128CbcDec::new(GenericArray::from_slice(&self.value), iv)
                .decrypt_padded_b2b_mut::<NoPadding>(src, dst),
            32 => Aes256CbcDec::new(GenericArray::from_slice(&self.value), iv)
                .decrypt_padded_b2b_mut::<NoPadding>(src, dst),
            other => {
                error!("Unsupported AES key length {}", other);
                return Err(StatusCode::BadUnexpectedError);
            }
        };
        result.map_err(|e| {
            error!("AES decryption failed: {e}");
            StatusCode::BadUnexpectedError
        })?;
        Ok(src.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_round_trip() {
        for key_len in [16usize, 32] {
            let mut key = vec![0u8; key_len];
            crate::random::bytes(&mut key);
            let mut iv = vec![0u8; AES_BLOCK_SIZE];
            crate::random::bytes(&mut iv);

            let key = AesKey::new(&key);
            let src = vec![0xa5u8; 64];
            let mut cipher = vec![0u8; 64];
            assert_eq!(key.encrypt(&src, &iv, &mut cipher).unwrap(), 64);
            assert_ne!(cipher, src);

            let mut plain = vec![0u8; 64];
            assert_eq!(key.decrypt(&cipher, &iv, &mut plain).unwrap(), 64);
            assert_eq!(plain, src);
        }
    }

    #[test]
    fn aes_rejects_partial_blocks() {
        let key = AesKey::new(&[0u8; 16]);
        let iv = [0u8; 16];
        let src = [0u8; 15];
        let mut dst = [0u8; 16];
        assert!(key.encrypt(&src, &iv, &mut dst).is_err());
    }
}
