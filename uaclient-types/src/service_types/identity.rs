// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! User identity tokens passed in ActivateSession. Each one is wrapped in
//! an extension object tagged with its binary encoding id.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    DecodingOptions, EncodingResult, SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::extension_object::MessageInfo;
use crate::node_ids::ObjectId;
use crate::string::UAString;

/// A token asserting no identity at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnonymousIdentityToken {
    /// The id of the user token policy this token conforms to.
    pub policy_id: UAString,
}

impl MessageInfo for AnonymousIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::AnonymousIdentityTokenEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for AnonymousIdentityToken {
    fn byte_len(&self) -> usize {
        self.policy_id.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.policy_id.encode(stream)
    }
}

impl SimpleBinaryDecodable for AnonymousIdentityToken {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(AnonymousIdentityToken {
            policy_id: UAString::decode(stream, decoding_options)?,
        })
    }
}

/// A user name and password. The password is encrypted with the server's
/// public key unless the negotiated security policy is None.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserNameIdentityToken {
    /// The id of the user token policy this token conforms to.
    pub policy_id: UAString,
    /// The user name.
    pub user_name: UAString,
    /// The password, possibly encrypted.
    pub password: ByteString,
    /// URI of the algorithm the password is encrypted with, null for
    /// plaintext.
    pub encryption_algorithm: UAString,
}

impl MessageInfo for UserNameIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::UserNameIdentityTokenEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for UserNameIdentityToken {
    fn byte_len(&self) -> usize {
        self.policy_id.byte_len()
            + self.user_name.byte_len()
            + self.password.byte_len()
            + self.encryption_algorithm.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.policy_id.encode(stream)?;
        self.user_name.encode(stream)?;
        self.password.encode(stream)?;
        self.encryption_algorithm.encode(stream)
    }
}

impl SimpleBinaryDecodable for UserNameIdentityToken {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(UserNameIdentityToken {
            policy_id: UAString::decode(stream, decoding_options)?,
            user_name: UAString::decode(stream, decoding_options)?,
            password: ByteString::decode(stream, decoding_options)?,
            encryption_algorithm: UAString::decode(stream, decoding_options)?,
        })
    }
}

/// An X509v3 certificate identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct X509IdentityToken {
    /// The id of the user token policy this token conforms to.
    pub policy_id: UAString,
    /// The DER encoded certificate.
    pub certificate_data: ByteString,
}

impl MessageInfo for X509IdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::X509IdentityTokenEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for X509IdentityToken {
    fn byte_len(&self) -> usize {
        self.policy_id.byte_len() + self.certificate_data.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.policy_id.encode(stream)?;
        self.certificate_data.encode(stream)
    }
}

impl SimpleBinaryDecodable for X509IdentityToken {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(X509IdentityToken {
            policy_id: UAString::decode(stream, decoding_options)?,
            certificate_data: ByteString::decode(stream, decoding_options)?,
        })
    }
}

/// A token issued by an external authority, e.g. a JSON web token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IssuedIdentityToken {
    /// The id of the user token policy this token conforms to.
    pub policy_id: UAString,
    /// The issued token, possibly encrypted.
    pub token_data: ByteString,
    /// URI of the algorithm the token is encrypted with, null for
    /// plaintext.
    pub encryption_algorithm: UAString,
}

impl MessageInfo for IssuedIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::IssuedIdentityTokenEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for IssuedIdentityToken {
    fn byte_len(&self) -> usize {
        self.policy_id.byte_len() + self.token_data.byte_len() + self.encryption_algorithm.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.policy_id.encode(stream)?;
        self.token_data.encode(stream)?;
        self.encryption_algorithm.encode(stream)
    }
}

impl SimpleBinaryDecodable for IssuedIdentityToken {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(IssuedIdentityToken {
            policy_id: UAString::decode(stream, decoding_options)?,
            token_data: ByteString::decode(stream, decoding_options)?,
            encryption_algorithm: UAString::decode(stream, decoding_options)?,
        })
    }
}
