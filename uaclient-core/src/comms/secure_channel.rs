// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The secure channel handles security on an OPC-UA connection: it owns the
//! token state, the nonces, the derived keys, and applies or removes
//! security on message chunks.

use std::{
    collections::HashMap,
    io::{Cursor, Write},
    ops::Range,
    sync::Arc,
};

use bytes::Buf;
use log::{error, trace, warn};
use parking_lot::RwLock;

use uaclient_crypto::{
    aeskey::AesKey, CertificateStore, KeySize, PrivateKey, PublicKey, SecurityPolicy, X509,
};
use uaclient_types::{
    encoding::{write_bytes, write_u32, write_u8},
    ByteString, ChannelSecurityToken, DateTime, DecodingOptions, Error, MessageSecurityMode,
    SimpleBinaryDecodable, StatusCode,
};

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader, MessageChunkType, MESSAGE_SIZE_OFFSET},
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};

/// Role of an application in OPC-UA communication.
#[derive(Debug, PartialEq)]
pub enum Role {
    /// Role is unknown.
    Unknown,
    /// Role is client.
    Client,
    /// Role is server.
    Server,
}

#[derive(Debug)]
struct RemoteKeys {
    keys: (Vec<u8>, AesKey, Vec<u8>),
    expires_at: DateTime,
}

/// Holds all of the security information related to a connection: the
/// negotiated policy and mode, the certificates, the nonces and the keys
/// derived from them.
pub struct SecureChannel {
    /// The side of the secure channel that this role belongs to, client or server.
    role: Role,
    /// The security policy for the connection, None or Encryption/Signing settings.
    security_policy: SecurityPolicy,
    /// The security mode for the connection, None, Sign, SignAndEncrypt.
    security_mode: MessageSecurityMode,
    /// Secure channel id, 0 until the server assigns one.
    secure_channel_id: u32,
    /// Token creation time.
    token_created_at: DateTime,
    /// Token lifetime in milliseconds.
    token_lifetime: u32,
    /// Token identifier.
    token_id: u32,
    /// Our certificate.
    cert: Option<X509>,
    /// Our private key.
    private_key: Option<PrivateKey>,
    /// Their certificate.
    remote_cert: Option<X509>,
    /// Their nonce provided by open secure channel.
    remote_nonce: Vec<u8>,
    /// Our nonce generated while handling open secure channel.
    local_nonce: Vec<u8>,
    /// The other end's derived keys, by token id. Keys for expired tokens
    /// are kept around because the peer may keep securing messages with an
    /// expired token for up to 25% of its lifetime after renewal.
    remote_keys: HashMap<u32, RemoteKeys>,
    /// Our end's derived signing key, encryption key and IV.
    local_keys: Option<(Vec<u8>, AesKey, Vec<u8>)>,
    /// Decoding options applied to incoming data.
    decoding_options: DecodingOptions,
}

impl SecureChannel {
    /// Create a new secure channel for the given role, reading the
    /// application keypair from the certificate store.
    pub fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        role: Role,
        decoding_options: DecodingOptions,
    ) -> SecureChannel {
        let (cert, private_key) = {
            let certificate_store = certificate_store.read();
            (
                certificate_store.read_own_cert().ok(),
                certificate_store.read_own_pkey().ok(),
            )
        };
        SecureChannel {
            role,
            security_mode: MessageSecurityMode::None,
            security_policy: SecurityPolicy::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert,
            private_key,
            remote_cert: None,
            local_keys: None,
            remote_keys: HashMap::new(),
            decoding_options,
        }
    }

    /// For testing purposes only.
    pub fn new_no_certificate_store() -> SecureChannel {
        SecureChannel {
            role: Role::Unknown,
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert: None,
            private_key: None,
            remote_cert: None,
            local_keys: None,
            remote_keys: HashMap::new(),
            decoding_options: DecodingOptions::default(),
        }
    }

    /// Return `true` if this channel is for a client.
    pub fn is_client_role(&self) -> bool {
        self.role == Role::Client
    }

    /// Set the application certificate.
    pub fn set_cert(&mut self, cert: Option<X509>) {
        self.cert = cert;
    }

    /// Get the application certificate.
    pub fn cert(&self) -> Option<X509> {
        self.cert.clone()
    }

    /// Set the application private key.
    pub fn set_private_key(&mut self, private_key: Option<PrivateKey>) {
        self.private_key = private_key;
    }

    /// Set the remote certificate.
    pub fn set_remote_cert(&mut self, remote_cert: Option<X509>) {
        self.remote_cert = remote_cert;
    }

    /// Get the remote certificate.
    pub fn remote_cert(&self) -> Option<X509> {
        self.remote_cert.clone()
    }

    /// Get the application security mode.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Set the application security mode.
    pub fn set_security_mode(&mut self, security_mode: MessageSecurityMode) {
        self.security_mode = security_mode;
    }

    /// Get the application security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Set the application security policy.
    pub fn set_security_policy(&mut self, security_policy: SecurityPolicy) {
        self.security_policy = security_policy;
    }

    /// Clear the configured security token.
    pub fn clear_security_token(&mut self) {
        self.secure_channel_id = 0;
        self.token_id = 0;
        self.token_created_at = DateTime::now();
        self.token_lifetime = 0;
    }

    /// Set the channel security token from an OPN response.
    pub fn set_security_token(&mut self, channel_token: ChannelSecurityToken) {
        self.secure_channel_id = channel_token.channel_id;
        self.token_id = channel_token.token_id;
        self.token_created_at = channel_token.created_at;
        self.token_lifetime = channel_token.revised_lifetime;
    }

    /// Get the ID of the secure channel on the server.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// Get the time the currently active token was created.
    pub fn token_created_at(&self) -> DateTime {
        self.token_created_at
    }

    /// Get the lifetime of the active token in milliseconds.
    pub fn token_lifetime(&self) -> u32 {
        self.token_lifetime
    }

    /// Get the ID of the active token.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// Get the decoding options.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.decoding_options.clone()
    }

    /// Makes a security header according to the type of message being sent, symmetric or asymmetric.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                let asymmetric_security_header = if self.security_policy == SecurityPolicy::None {
                    AsymmetricSecurityHeader::none()
                } else {
                    let receiver_certificate_thumbprint = match &self.remote_cert {
                        Some(remote_cert) => remote_cert.thumbprint().as_byte_string(),
                        None => ByteString::null(),
                    };
                    match &self.cert {
                        Some(cert) => AsymmetricSecurityHeader::new(
                            self.security_policy,
                            cert,
                            receiver_certificate_thumbprint,
                        ),
                        None => {
                            error!("Channel has no application certificate, sending an empty security header");
                            AsymmetricSecurityHeader::none()
                        }
                    }
                };
                SecurityHeader::Asymmetric(asymmetric_security_header)
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            }),
        }
    }

    /// Creates a nonce for the connection. The nonce should be the same size as the symmetric key.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce
            .resize(self.security_policy.secure_channel_nonce_length(), 0);
        uaclient_crypto::random::bytes(&mut self.local_nonce);
    }

    /// Sets the remote certificate from a byte string.
    pub fn set_remote_cert_from_byte_string(
        &mut self,
        remote_cert: &ByteString,
    ) -> Result<(), StatusCode> {
        self.remote_cert = if remote_cert.is_null() {
            None
        } else {
            Some(X509::from_byte_string(remote_cert)?)
        };
        Ok(())
    }

    /// Set their nonce which should be the same as the symmetric key.
    pub fn set_remote_nonce_from_byte_string(
        &mut self,
        remote_nonce: &ByteString,
    ) -> Result<(), StatusCode> {
        if let Some(ref remote_nonce) = remote_nonce.value {
            if self.security_policy != SecurityPolicy::None
                && remote_nonce.len() != self.security_policy.secure_channel_nonce_length()
            {
                error!(
                    "Remote nonce is invalid length {}, expecting {}",
                    remote_nonce.len(),
                    self.security_policy.secure_channel_nonce_length()
                );
                Err(StatusCode::BadNonceInvalid)
            } else {
                self.remote_nonce = remote_nonce.to_vec();
                Ok(())
            }
        } else if self.security_policy != SecurityPolicy::None {
            error!("Remote nonce is invalid {:?}", remote_nonce);
            Err(StatusCode::BadNonceInvalid)
        } else {
            Ok(())
        }
    }

    /// Get the local nonce.
    pub fn local_nonce(&self) -> &[u8] {
        &self.local_nonce
    }

    /// Get the local nonce as a byte string.
    pub fn local_nonce_as_byte_string(&self) -> ByteString {
        if self.local_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(&self.local_nonce)
        }
    }

    /// Set the remote nonce.
    pub fn set_remote_nonce(&mut self, remote_nonce: &[u8]) {
        self.remote_nonce.clear();
        self.remote_nonce.extend_from_slice(remote_nonce);
    }

    /// Get the remote nonce.
    pub fn remote_nonce(&self) -> &[u8] {
        &self.remote_nonce
    }

    /// Get the remote nonce as a byte string.
    pub fn remote_nonce_as_byte_string(&self) -> ByteString {
        if self.remote_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(&self.remote_nonce)
        }
    }

    /// Derive the symmetric keys for both directions from the nonces
    /// exchanged in the OpenSecureChannel call, per part 6, 6.7.5.
    pub fn derive_keys(&mut self) {
        self.insert_remote_keys(
            self.security_policy
                .make_secure_channel_keys(&self.local_nonce, &self.remote_nonce),
        );
        self.local_keys = Some(
            self.security_policy
                .make_secure_channel_keys(&self.remote_nonce, &self.local_nonce),
        );
    }

    /// Wipe the channel's cryptographic state: nonces, derived keys and the
    /// token. Called on teardown so key material does not outlive the
    /// connection.
    pub fn wipe_security_state(&mut self) {
        self.local_nonce.iter_mut().for_each(|b| *b = 0);
        self.local_nonce.clear();
        self.remote_nonce.iter_mut().for_each(|b| *b = 0);
        self.remote_nonce.clear();
        self.local_keys = None;
        self.remote_keys.clear();
        self.clear_security_token();
    }

    /// Calculates the signature size for a message depending on the supplied security header.
    pub fn signature_size(&self, security_header: &SecurityHeader) -> usize {
        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if !security_header.sender_certificate.is_null() {
                    X509::from_byte_string(&security_header.sender_certificate)
                        .and_then(|x509| x509.public_key())
                        .map(|pk| pk.size())
                        .unwrap_or(0)
                } else {
                    0
                }
            }
            SecurityHeader::Symmetric(_) => {
                if self.security_mode != MessageSecurityMode::None {
                    self.security_policy.symmetric_signature_size()
                } else {
                    0
                }
            }
        }
    }

    // Extra padding required for keysize > 2048 bits (256 bytes)
    fn minimum_padding(key_length: usize) -> usize {
        if key_length <= 256 {
            1
        } else {
            2
        }
    }

    /// Get the plain text block size and minimum padding for this channel.
    /// Only applies when the security policy is not None, and the message
    /// is encrypted.
    pub fn get_padding_block_sizes(
        &self,
        security_header: &SecurityHeader,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        if self.security_policy == SecurityPolicy::None
            || self.security_mode != MessageSecurityMode::SignAndEncrypt
                && !message_type.is_open_secure_channel()
        {
            return (0, 0);
        }

        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if security_header.sender_certificate.is_null() {
                    (self.security_policy.plain_block_size(), signature_size)
                } else {
                    // Padding requires we look at the remote certificate and security policy
                    let padding = self.security_policy.asymmetric_encryption_padding();
                    match self.remote_cert.as_ref().and_then(|c| c.public_key().ok()) {
                        Some(pk) => (
                            pk.plain_text_block_size(padding),
                            Self::minimum_padding(pk.size()),
                        ),
                        None => (self.security_policy.plain_block_size(), signature_size),
                    }
                }
            }
            SecurityHeader::Symmetric(_) => (
                self.security_policy.plain_block_size(),
                Self::minimum_padding(signature_size),
            ),
        }
    }

    /// Calculate the padding size.
    ///
    /// Padding adds bytes to the body to make it a multiple of the block size so it can be encrypted.
    pub fn padding_size(
        &self,
        security_header: &SecurityHeader,
        body_size: usize,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        let (plain_text_block_size, minimum_padding) =
            self.get_padding_block_sizes(security_header, signature_size, message_type);

        if plain_text_block_size == 0 {
            return (0, 0);
        }

        // PaddingSize = PlainTextBlockSize – ((BytesToWrite + SignatureSize + 1) % PlainTextBlockSize);
        let encrypt_size = 8 + body_size + signature_size + minimum_padding;
        let padding_size = if encrypt_size % plain_text_block_size != 0 {
            plain_text_block_size - (encrypt_size % plain_text_block_size)
        } else {
            0
        };
        (minimum_padding + padding_size, minimum_padding)
    }

    // Takes an unpadded message chunk and adds padding as well as space to the end to accommodate
    // a signature. Also modifies the message size to include the new padding/signature.
    fn add_space_for_padding_and_signature(
        &self,
        message_chunk: &MessageChunk,
    ) -> Result<Vec<u8>, Error> {
        let chunk_info = message_chunk.chunk_info(self)?;
        let data = &message_chunk.data[..];

        let security_header = chunk_info.security_header;
        let signature_size = self.signature_size(&security_header);
        let body_size = chunk_info.body_length;

        let (padding_size, minimum_padding) = self.padding_size(
            &security_header,
            body_size,
            signature_size,
            chunk_info.message_header.message_type,
        );

        let buffer = Vec::with_capacity(message_chunk.data.len() + padding_size + signature_size);
        let mut stream = Cursor::new(buffer);

        // The message header, security header, sequence header and payload.
        stream.write_all(data).map_err(Error::encoding)?;

        if padding_size > 0 {
            // Each padding byte holds the padding size, so if the padding
            // size is 15 there are 15 bytes all with the value 15.
            if minimum_padding == 1 {
                let padding_byte = ((padding_size - 1) & 0xff) as u8;
                let _ = write_bytes(&mut stream, padding_byte, padding_size)?;
            } else if minimum_padding == 2 {
                // Padding and then extra padding
                let padding_byte = ((padding_size - 2) & 0xff) as u8;
                let extra_padding_byte = ((padding_size - 2) >> 8) as u8;
                let _ = write_bytes(&mut stream, padding_byte, padding_size - 1)?;
                write_u8(&mut stream, extra_padding_byte)?;
            }
        }

        // Write zeros for the signature.
        let _ = write_bytes(&mut stream, 0u8, signature_size)?;

        let message_size = data.len() + padding_size + signature_size;
        Self::update_message_size_and_truncate(stream.into_inner(), message_size)
    }

    fn update_message_size(data: &mut [u8], message_size: usize) -> Result<(), Error> {
        // Read and rewrite the message_size in the header
        let mut stream = Cursor::new(data);
        stream.advance(MESSAGE_SIZE_OFFSET);
        write_u32(&mut stream, message_size as u32)
    }

    /// Writes message size and truncates the message to fit.
    pub fn update_message_size_and_truncate(
        mut data: Vec<u8>,
        message_size: usize,
    ) -> Result<Vec<u8>, Error> {
        Self::update_message_size(&mut data[..], message_size)?;
        data.truncate(message_size);
        Ok(data)
    }

    /// Applies security to a message chunk and yields a encrypted/signed block to be streamed.
    pub fn apply_security(
        &self,
        message_chunk: &MessageChunk,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let size = if self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::Sign
                || self.security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            let encrypted_data_offset =
                message_chunk.encrypted_data_offset(&self.decoding_options)?;

            // S - Message Header
            // S - Security Header
            // S - Sequence Header - E
            // S - Body            - E
            // S - Padding         - E
            //     Signature       - E
            let mut data = self.add_space_for_padding_and_signature(message_chunk)?;
            let encrypted_range = encrypted_data_offset..data.len();

            if message_chunk.is_open_secure_channel(&self.decoding_options) {
                self.asymmetric_sign_and_encrypt(
                    self.security_policy,
                    &mut data,
                    encrypted_range,
                    dst,
                )?
            } else {
                let signed_range =
                    0..(data.len() - self.security_policy.symmetric_signature_size());
                self.symmetric_sign_and_encrypt(&mut data, signed_range, encrypted_range, dst)?
            }
        } else {
            let size = message_chunk.data.len();
            if size > dst.len() {
                error!(
                    "The size of the message chunk {} exceeds the size of the destination buffer {}",
                    size,
                    dst.len()
                );
                return Err(StatusCode::BadEncodingLimitsExceeded);
            }
            dst[..size].copy_from_slice(&message_chunk.data[..]);
            size
        };
        Ok(size)
    }

    /// Decrypts and verifies the body data if the mode / policy requires it.
    pub fn verify_and_remove_security(&mut self, src: &[u8]) -> Result<MessageChunk, Error> {
        let decoding_options = self.decoding_options();
        let (message_header, security_header, encrypted_data_offset) = {
            let mut stream = Cursor::new(&src);
            let message_header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;
            let security_header = SecurityHeader::decode_from_stream(
                &mut stream,
                message_header.message_type.is_open_secure_channel(),
                &decoding_options,
            )?;
            let encrypted_data_offset = stream.position() as usize;
            (message_header, security_header, encrypted_data_offset)
        };

        let message_size = message_header.message_size as usize;
        if message_size != src.len() {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!(
                    "The message size {} is not the same as the supplied buffer {}",
                    message_size,
                    src.len()
                ),
            ));
        }

        let data = if message_header.message_type.is_open_secure_channel() {
            // The OpenSecureChannel is the first thing we receive so we must examine
            // the security policy and use it to determine if the packet must be decrypted.
            let encrypted_range = encrypted_data_offset..message_size;

            let SecurityHeader::Asymmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    "OpenSecureChannel chunk must have an asymmetric security header",
                ));
            };

            let security_policy_uri = security_header.security_policy_uri.as_ref();
            let security_policy = SecurityPolicy::from_uri(security_policy_uri);
            match security_policy {
                SecurityPolicy::Unknown => {
                    return Err(Error::new(
                        StatusCode::BadSecurityPolicyRejected,
                        format!("Security policy \"{security_policy_uri}\" is unknown"),
                    ));
                }
                SecurityPolicy::None => {
                    return Ok(MessageChunk { data: src.to_vec() });
                }
                _ => {}
            }
            self.security_policy = security_policy;

            // The OpenSecureChannel messages are always signed and encrypted
            // if the security mode is not None, even for mode Sign.
            if security_header.sender_certificate.is_null() {
                return Err(Error::new(
                    StatusCode::BadCertificateInvalid,
                    "Sender certificate is null",
                ));
            }
            let sender_certificate = X509::from_byte_string(&security_header.sender_certificate)?;
            let verification_key = sender_certificate.public_key()?;
            let receiver_thumbprint = security_header.receiver_certificate_thumbprint;

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.asymmetric_decrypt_and_verify(
                security_policy,
                &verification_key,
                receiver_thumbprint,
                src,
                encrypted_range,
                &mut decrypted_data,
            )?;

            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else if self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::Sign
                || self.security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            // Symmetric decrypt and verify
            let signature_size = self.security_policy.symmetric_signature_size();
            let encrypted_range = encrypted_data_offset..message_size;
            let signed_range = 0..(message_size - signature_size);

            let SecurityHeader::Symmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    format!(
                        "Expected symmetric security header, got {:?}",
                        security_header
                    ),
                ));
            };

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.symmetric_decrypt_and_verify(
                src,
                signed_range,
                encrypted_range,
                security_header.token_id,
                &mut decrypted_data,
            )?;

            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else {
            src.to_vec()
        };

        Ok(MessageChunk { data })
    }

    /// Use the security policy to asymmetric encrypt and sign the specified chunk of data.
    /// Signs the source data in place.
    fn asymmetric_sign_and_encrypt(
        &self,
        security_policy: SecurityPolicy,
        src: &mut [u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let header_size = encrypted_range.start;

        let signing_key = self
            .private_key
            .as_ref()
            .ok_or(StatusCode::BadSecurityChecksFailed)?;
        let signing_key_size = signing_key.size();

        let signed_range = 0..(encrypted_range.end - signing_key_size);
        let signature_range = signed_range.end..encrypted_range.end;

        let encryption_key = self
            .remote_cert
            .as_ref()
            .ok_or(StatusCode::BadCertificateInvalid)?
            .public_key()?;

        // Encryption changes the size of the chunk. Since the signature is
        // computed before encrypting, the new size has to be written into
        // the header first.
        let cipher_text_size = {
            let padding = security_policy.asymmetric_encryption_padding();
            let plain_text_size = encrypted_range.end - encrypted_range.start;
            encryption_key.calculate_cipher_text_size(plain_text_size, padding)
        };
        Self::update_message_size(src, header_size + cipher_text_size)?;
        dst[0..encrypted_range.start].copy_from_slice(&src[0..encrypted_range.start]);

        // Sign the message header, security header, sequence header, body, padding
        let (l, r) = src.split_at_mut(signed_range.end);
        security_policy.asymmetric_sign(signing_key, l, &mut r[0..signing_key_size])?;

        debug_assert_eq!(encrypted_range.end, signature_range.end);

        // Encrypt the sequence header, payload, signature portion into dst
        let encrypted_size = security_policy.asymmetric_encrypt(
            &encryption_key,
            &src[encrypted_range.clone()],
            &mut dst[encrypted_range.start..],
        )?;

        if encrypted_size != cipher_text_size {
            error!(
                "Encrypted block size {} is not the same as calculated cipher text size {}",
                encrypted_size, cipher_text_size
            );
            return Err(StatusCode::BadUnexpectedError);
        }

        Ok(header_size + encrypted_size)
    }

    fn check_padding_bytes(
        padding_bytes: &[u8],
        expected_padding_byte: u8,
        padding_range_start: usize,
    ) -> Result<(), Error> {
        for (i, b) in padding_bytes.iter().enumerate() {
            if *b != expected_padding_byte {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!(
                        "Expected padding byte {}, got {} at index {}",
                        expected_padding_byte,
                        *b,
                        padding_range_start + i
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Verify that the padding is correct. Padding is expected to be before the supplied padding
    /// end index. Returns the padding range so the caller can strip it.
    fn verify_padding(
        &self,
        src: &[u8],
        key_size: usize,
        padding_end: usize,
    ) -> Result<Range<usize>, Error> {
        let padding_range = if key_size > 256 {
            let padding_byte = src[padding_end - 2];
            let extra_padding_byte = src[padding_end - 1];
            let padding_size = ((extra_padding_byte as usize) << 8) + (padding_byte as usize);
            let padding_range = (padding_end - padding_size - 2)..padding_end;

            Self::check_padding_bytes(
                &src[padding_range.start..(padding_range.end - 1)],
                padding_byte,
                padding_range.start,
            )?;
            if src[padding_range.end - 1] != extra_padding_byte {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!(
                        "Expected extra padding byte {}, at index {}",
                        extra_padding_byte, padding_range.start
                    ),
                ));
            }
            padding_range
        } else {
            let padding_byte = src[padding_end - 1];
            let padding_size = padding_byte as usize;
            let padding_range = (padding_end - padding_size - 1)..padding_end;
            Self::check_padding_bytes(
                &src[padding_range.clone()],
                padding_byte,
                padding_range.start,
            )?;
            padding_range
        };
        Ok(padding_range)
    }

    fn asymmetric_decrypt_and_verify(
        &self,
        security_policy: SecurityPolicy,
        verification_key: &PublicKey,
        receiver_thumbprint: ByteString,
        src: &[u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        if !security_policy.is_supported() {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                format!("Security policy {security_policy} is not supported"),
            ));
        }

        // The receiver certificate thumbprint identifies which of our certs was used by the
        // remote to encrypt the message.
        let our_cert = self.cert.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadNoValidCertificates,
                "Channel has no application certificate",
            )
        })?;
        if our_cert.thumbprint().value() != receiver_thumbprint.as_ref() {
            return Err(Error::new(
                StatusCode::BadNoValidCertificates,
                "Supplied thumbprint does not match application certificate's thumbprint",
            ));
        }

        // Copy message and security headers
        dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

        // Decrypt and copy the encrypted block. The plain text is shorter
        // than the cipher text, the ranges must compensate.
        let encrypted_size = encrypted_range.end - encrypted_range.start;
        let mut decrypted_tmp = vec![0u8; encrypted_size];
        let private_key = self.private_key.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Channel has no private key",
            )
        })?;
        let decrypted_size = security_policy.asymmetric_decrypt(
            private_key,
            &src[encrypted_range.clone()],
            &mut decrypted_tmp,
        )?;
        dst[encrypted_range.start..(encrypted_range.start + decrypted_size)]
            .copy_from_slice(&decrypted_tmp[0..decrypted_size]);

        // The signature is at the end of the decrypted block.
        let verification_key_signature_size = verification_key.size();
        let signature_dst_offset =
            encrypted_range.start + decrypted_size - verification_key_signature_size;
        let signature_range_dst =
            signature_dst_offset..(signature_dst_offset + verification_key_signature_size);
        let signed_range_dst = 0..signature_dst_offset;

        security_policy.asymmetric_verify_signature(
            verification_key,
            &dst[signed_range_dst],
            &dst[signature_range_dst.clone()],
        )?;

        // Key size for padding checks comes from our own public key when available.
        let key_size = self
            .cert
            .as_ref()
            .and_then(|cert| cert.public_key().ok())
            .map(|pk| pk.size())
            .unwrap_or_else(|| verification_key.size());

        let padding_range = self.verify_padding(dst, key_size, signature_range_dst.start)?;

        // Decrypted and verified into dst
        Ok(padding_range.start)
    }

    fn local_keys(&self) -> Result<&(Vec<u8>, AesKey, Vec<u8>), StatusCode> {
        self.local_keys.as_ref().ok_or_else(|| {
            error!("Channel has no derived local keys");
            StatusCode::BadSecureChannelClosed
        })
    }

    fn insert_remote_keys(&mut self, keys: (Vec<u8>, AesKey, Vec<u8>)) {
        // First remove any expired keys.
        self.remote_keys
            .retain(|_, v| DateTime::now() < v.expires_at);

        let expires_at = (self.token_lifetime as f32 * 1.25).ceil();
        let expires_at = chrono::Duration::milliseconds(expires_at as i64);

        // Then insert the new keys to ensure there is
        // always at least one set of keys available.
        self.remote_keys.insert(
            self.token_id,
            RemoteKeys {
                keys,
                expires_at: self.token_created_at + expires_at,
            },
        );
    }

    fn get_remote_keys(&self, token_id: u32) -> Option<&(Vec<u8>, AesKey, Vec<u8>)> {
        self.remote_keys.get(&token_id).map(|k| &k.keys)
    }

    fn encryption_keys(&self) -> Result<(&AesKey, &[u8]), StatusCode> {
        let keys = self.local_keys()?;
        Ok((&keys.1, &keys.2))
    }

    fn signing_key(&self) -> Result<&[u8], StatusCode> {
        Ok(&self.local_keys()?.0)
    }

    fn decryption_keys(&self, token_id: u32) -> Option<(&AesKey, &[u8])> {
        let keys = self.get_remote_keys(token_id)?;
        Some((&keys.1, &keys.2))
    }

    fn verification_key(&self, token_id: u32) -> Option<&[u8]> {
        Some(&(self.get_remote_keys(token_id))?.0)
    }

    /// Encode data using security. The destination buffer must have space
    /// for the signature if one is to be appended.
    ///
    /// Signing is done first and then encryption.
    ///
    /// S - Message Header
    /// S - Security Header
    /// S - Sequence Header - E
    /// S - Body            - E
    /// S - Padding         - E
    ///     Signature       - E
    pub fn symmetric_sign_and_encrypt(
        &self,
        src: &mut [u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let encrypted_size = match self.security_mode {
            MessageSecurityMode::None => {
                trace!("encrypt_and_sign is doing nothing because security mode == None");
                dst[..src.len()].copy_from_slice(src);
                src.len()
            }
            MessageSecurityMode::Sign => {
                let size = self.symmetric_sign_in_place(src, signed_range)?;
                dst[0..size].copy_from_slice(&src[0..size]);
                size
            }
            MessageSecurityMode::SignAndEncrypt => {
                // Sign the block
                self.symmetric_sign_in_place(src, signed_range)?;

                // Encrypt the sequence header, payload, signature
                let (key, iv) = self.encryption_keys()?;
                let encrypted_size = self.security_policy.symmetric_encrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut dst[encrypted_range.start..],
                )?;
                // Copy the message header / security header
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

                encrypted_range.start + encrypted_size
            }
            MessageSecurityMode::Invalid => {
                error!("Message security mode is invalid");
                return Err(StatusCode::BadSecurityModeRejected);
            }
        };
        Ok(encrypted_size)
    }

    fn symmetric_sign_in_place(
        &self,
        buf: &mut [u8],
        signed_range: Range<usize>,
    ) -> Result<usize, StatusCode> {
        let signature_size = self.security_policy.symmetric_signature_size();
        let signing_key = self.signing_key()?;
        let (l, r) = buf.split_at_mut(signed_range.end);
        self.security_policy
            .symmetric_sign(signing_key, l, &mut r[0..signature_size])?;
        Ok(signed_range.end + signature_size)
    }

    /// Decrypts and verifies data. Returns the size of the decrypted data.
    ///
    /// S - Message Header
    /// S - Security Header
    /// S - Sequence Header - E
    /// S - Body            - E
    /// S - Padding         - E
    ///     Signature       - E
    pub fn symmetric_decrypt_and_verify(
        &self,
        src: &[u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        token_id: u32,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        match self.security_mode {
            MessageSecurityMode::None => {
                dst[..src.len()].copy_from_slice(src);
                Ok(src.len())
            }
            MessageSecurityMode::Sign => {
                dst[..src.len()].copy_from_slice(src);
                let signature_range = signed_range.end..src.len();
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecureChannelClosed,
                        "Missing verification key",
                    )
                })?;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range.clone()],
                    &dst[signature_range],
                )?;
                Ok(signed_range.end)
            }
            MessageSecurityMode::SignAndEncrypt => {
                let ciphertext_size = encrypted_range.end - encrypted_range.start;

                // Copy message and security headers
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

                // Decrypt encrypted portion. Tmp includes one extra block.
                let mut decrypted_tmp = vec![0u8; ciphertext_size + 16];
                let (key, iv) = self.decryption_keys(token_id).ok_or_else(|| {
                    Error::new(StatusCode::BadSecureChannelClosed, "Missing decryption keys")
                })?;
                let decrypted_size = self.security_policy.symmetric_decrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut decrypted_tmp[..],
                )?;

                let encrypted_range =
                    encrypted_range.start..(encrypted_range.start + decrypted_size);
                dst[encrypted_range.clone()].copy_from_slice(&decrypted_tmp[..decrypted_size]);

                // Verify signature (after encrypted portion)
                let signature_range = (encrypted_range.end
                    - self.security_policy.symmetric_signature_size())
                    ..encrypted_range.end;
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecureChannelClosed,
                        "Missing verification key",
                    )
                })?;
                let signature_start = signature_range.start;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range],
                    &dst[signature_range],
                )?;

                let key_size = key.key_length();
                let padding_range = self.verify_padding(dst, key_size, signature_start)?;

                // Decrypted range minus padding and signature.
                Ok(padding_range.start)
            }
            MessageSecurityMode::Invalid => {
                warn!("Message security mode is invalid");
                Err(Error::new(
                    StatusCode::BadSecurityModeRejected,
                    "Message security mode is invalid",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::message_chunk::MessageIsFinalType;

    #[test]
    fn wipe_clears_key_material() {
        let mut channel = SecureChannel::new_no_certificate_store();
        channel.set_security_policy(SecurityPolicy::Basic256Sha256);
        channel.create_random_nonce();
        channel.set_remote_nonce(&[1u8; 32]);
        channel.set_security_token(ChannelSecurityToken {
            channel_id: 1,
            token_id: 2,
            created_at: DateTime::now(),
            revised_lifetime: 60_000,
        });
        channel.derive_keys();
        assert!(!channel.local_nonce().is_empty());

        channel.wipe_security_state();
        assert!(channel.local_nonce().is_empty());
        assert!(channel.remote_nonce().is_empty());
        assert_eq!(channel.token_id(), 0);
        assert_eq!(channel.secure_channel_id(), 0);
        assert!(channel.local_keys.is_none());
        assert!(channel.remote_keys.is_empty());
    }

    #[test]
    fn none_policy_chunk_passes_through() {
        let mut channel = SecureChannel::new_no_certificate_store();
        let chunk = MessageChunk::new(
            1,
            1,
            MessageChunkType::Message,
            MessageIsFinalType::Final,
            &channel,
            b"payload",
        )
        .unwrap();
        let mut dst = vec![0u8; chunk.data.len()];
        let size = channel.apply_security(&chunk, &mut dst).unwrap();
        assert_eq!(size, chunk.data.len());
        assert_eq!(&dst[..size], &chunk.data[..]);

        let decoded = channel.verify_and_remove_security(&dst[..size]).unwrap();
        assert_eq!(decoded.data, chunk.data);
    }

    #[test]
    fn symmetric_sign_and_encrypt_round_trip() {
        // Set up two channels sharing nonces, like client and server after OPN.
        let mut client = SecureChannel::new_no_certificate_store();
        client.set_security_policy(SecurityPolicy::Basic256Sha256);
        client.set_security_mode(MessageSecurityMode::SignAndEncrypt);
        client.create_random_nonce();

        let mut server = SecureChannel::new_no_certificate_store();
        server.set_security_policy(SecurityPolicy::Basic256Sha256);
        server.set_security_mode(MessageSecurityMode::SignAndEncrypt);
        server.create_random_nonce();

        let token = ChannelSecurityToken {
            channel_id: 1,
            token_id: 7,
            created_at: DateTime::now(),
            revised_lifetime: 60_000,
        };
        client.set_security_token(token.clone());
        server.set_security_token(token);

        client.set_remote_nonce(server.local_nonce());
        server.set_remote_nonce(client.local_nonce());
        client.derive_keys();
        server.derive_keys();

        let chunk = MessageChunk::new(
            1,
            1,
            MessageChunkType::Message,
            MessageIsFinalType::Final,
            &client,
            b"secret payload",
        )
        .unwrap();

        let mut wire = vec![0u8; chunk.data.len() + 1024];
        let size = client.apply_security(&chunk, &mut wire).unwrap();
        assert_ne!(&wire[..size], &chunk.data[..]);

        let decoded = server.verify_and_remove_security(&wire[..size]).unwrap();
        // The decrypted chunk has the same header and body as the padded
        // original, so the original payload must be a prefix.
        assert_eq!(&decoded.data[..chunk.data.len()], &chunk.data[..]);
    }
}
