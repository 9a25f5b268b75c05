// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Creation of user identity tokens, notably the password encryption for
//! UserName tokens defined in part 4, 7.36.

use std::io::{Cursor, Write};

use log::{error, warn};

use uaclient_types::{
    encoding::{read_u32, write_u32},
    ByteString, StatusCode, UAString, UserNameIdentityToken, UserTokenPolicy,
};

use crate::pkey::{KeySize, PrivateKey, PublicKey, RsaPadding};
use crate::security_policy::SecurityPolicy;
use crate::x509::X509;

// Algorithm URIs for the legacy password encryption schemes.
const ENCRYPTION_ALGORITHM_RSA_15: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
const ENCRYPTION_ALGORITHM_RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep";
const ENCRYPTION_ALGORITHM_RSA_OAEP_SHA256: &str =
    "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256";

/// Create a `UserNameIdentityToken` for the given user and password,
/// encrypting the password with the server's certificate unless the
/// applicable security policy is None.
///
/// The applicable policy is the token policy's own, falling back to the
/// channel's policy when the token policy does not name one.
pub fn make_user_name_identity_token(
    channel_security_policy: SecurityPolicy,
    user_token_policy: &UserTokenPolicy,
    nonce: &[u8],
    cert: &Option<X509>,
    user: &str,
    pass: &str,
) -> Result<UserNameIdentityToken, StatusCode> {
    let token_security_policy = if user_token_policy.security_policy_uri.is_empty() {
        channel_security_policy
    } else {
        SecurityPolicy::from_uri(user_token_policy.security_policy_uri.as_ref())
    };

    let (password, encryption_algorithm) = match token_security_policy {
        SecurityPolicy::None => {
            if channel_security_policy == SecurityPolicy::None {
                warn!("Password is being sent in plain text over an unencrypted channel");
            }
            (
                ByteString::from(pass.as_bytes().to_vec()),
                UAString::null(),
            )
        }
        SecurityPolicy::Unknown => {
            error!(
                "Token security policy \"{}\" is unknown",
                user_token_policy.security_policy_uri
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }
        policy => {
            let Some(cert) = cert else {
                error!("Cannot encrypt the password, the server certificate is missing");
                return Err(StatusCode::BadCertificateInvalid);
            };
            let public_key = cert.public_key()?;
            let (padding, algorithm) = match policy {
                SecurityPolicy::Basic128Rsa15 => (RsaPadding::Pkcs1, ENCRYPTION_ALGORITHM_RSA_15),
                SecurityPolicy::Aes256Sha256RsaPss => {
                    (RsaPadding::OaepSha256, ENCRYPTION_ALGORITHM_RSA_OAEP_SHA256)
                }
                _ => (RsaPadding::OaepSha1, ENCRYPTION_ALGORITHM_RSA_OAEP),
            };
            (
                legacy_password_encrypt(pass, nonce, &public_key, padding)?,
                UAString::from(algorithm),
            )
        }
    };

    Ok(UserNameIdentityToken {
        policy_id: user_token_policy.policy_id.clone(),
        user_name: UAString::from(user),
        password,
        encryption_algorithm,
    })
}

/// Encrypt a password with the server nonce appended, per the legacy
/// scheme of part 4: a length prefixed block of password bytes followed by
/// the nonce, encrypted with the server's public key.
pub fn legacy_password_encrypt(
    password: &str,
    server_nonce: &[u8],
    server_key: &PublicKey,
    padding: RsaPadding,
) -> Result<ByteString, StatusCode> {
    let plaintext_len = password.len() + server_nonce.len();
    let mut plaintext = Cursor::new(Vec::with_capacity(4 + plaintext_len));
    write_u32(&mut plaintext, plaintext_len as u32).map_err(|_| StatusCode::BadEncodingError)?;
    plaintext
        .write_all(password.as_bytes())
        .and_then(|_| plaintext.write_all(server_nonce))
        .map_err(|_| StatusCode::BadEncodingError)?;
    let plaintext = plaintext.into_inner();

    let mut ciphertext = vec![0u8; server_key.calculate_cipher_text_size(plaintext.len(), padding)];
    let size = server_key.encrypt(&plaintext, &mut ciphertext, padding)?;
    ciphertext.truncate(size);
    Ok(ByteString::from(ciphertext))
}

/// Reverse of [`legacy_password_encrypt`], used by servers and tests.
pub fn legacy_password_decrypt(
    secret: &ByteString,
    server_nonce: &[u8],
    private_key: &PrivateKey,
    padding: RsaPadding,
) -> Result<String, StatusCode> {
    let ciphertext = secret.as_ref();
    let mut plaintext = vec![0u8; ciphertext.len()];
    let size = private_key.decrypt(ciphertext, &mut plaintext, padding)?;
    plaintext.truncate(size);

    let mut stream = Cursor::new(&plaintext);
    let secret_len = read_u32(&mut stream).map_err(|_| StatusCode::BadDecodingError)? as usize;
    if secret_len + 4 > plaintext.len() || secret_len < server_nonce.len() {
        error!("Decrypted password block has an invalid length");
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    let password_len = secret_len - server_nonce.len();
    let password = &plaintext[4..4 + password_len];
    let nonce = &plaintext[4 + password_len..4 + secret_len];
    if nonce != server_nonce {
        error!("Decrypted password block does not contain the server nonce");
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    String::from_utf8(password.to_vec()).map_err(|_| StatusCode::BadIdentityTokenInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_encrypt_decrypt_round_trip() {
        let private = PrivateKey::new_rsa(2048).unwrap();
        let public = private.public_key();
        let nonce = crate::random::byte_string(32);

        for padding in [RsaPadding::Pkcs1, RsaPadding::OaepSha1, RsaPadding::OaepSha256] {
            let secret =
                legacy_password_encrypt("hunter2", nonce.as_ref(), &public, padding).unwrap();
            let password =
                legacy_password_decrypt(&secret, nonce.as_ref(), &private, padding).unwrap();
            assert_eq!(password, "hunter2");
        }
    }

    #[test]
    fn plaintext_password_on_none_policy() {
        let policy = UserTokenPolicy {
            policy_id: UAString::from("username"),
            token_type: uaclient_types::UserTokenType::UserName,
            ..Default::default()
        };
        let token = make_user_name_identity_token(
            SecurityPolicy::None,
            &policy,
            &[],
            &None,
            "user",
            "pass",
        )
        .unwrap();
        assert_eq!(token.user_name.as_ref(), "user");
        assert_eq!(token.password.as_ref(), b"pass");
        assert!(token.encryption_algorithm.is_null());
    }
}
