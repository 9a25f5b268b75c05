// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The secure channel services and their supporting structures.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::date_time::DateTime;
use crate::encoding::{
    read_u32, write_u32, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::extension_object::MessageInfo;
use crate::node_ids::ObjectId;
use crate::request_header::RequestHeader;
use crate::response_header::ResponseHeader;
use crate::string::UAString;

use super::enums::{MessageSecurityMode, SecurityTokenRequestType};

/// A digital signature together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureData {
    /// URI of the signature algorithm.
    pub algorithm: UAString,
    /// The signature itself.
    pub signature: ByteString,
}

impl SimpleBinaryEncodable for SignatureData {
    fn byte_len(&self) -> usize {
        self.algorithm.byte_len() + self.signature.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.algorithm.encode(stream)?;
        self.signature.encode(stream)
    }
}

impl SimpleBinaryDecodable for SignatureData {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(SignatureData {
            algorithm: UAString::decode(stream, decoding_options)?,
            signature: ByteString::decode(stream, decoding_options)?,
        })
    }
}

impl SignatureData {
    /// An absent signature.
    pub fn null() -> SignatureData {
        SignatureData::default()
    }
}

/// A software certificate signed by an authority, unused by most servers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignedSoftwareCertificate {
    /// The certificate data.
    pub certificate_data: ByteString,
    /// Signature over the certificate data.
    pub signature: ByteString,
}

impl SimpleBinaryEncodable for SignedSoftwareCertificate {
    fn byte_len(&self) -> usize {
        self.certificate_data.byte_len() + self.signature.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.certificate_data.encode(stream)?;
        self.signature.encode(stream)
    }
}

impl SimpleBinaryDecodable for SignedSoftwareCertificate {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(SignedSoftwareCertificate {
            certificate_data: ByteString::decode(stream, decoding_options)?,
            signature: ByteString::decode(stream, decoding_options)?,
        })
    }
}

/// The token identifying an open secure channel, handed out by the server
/// in the OpenSecureChannel response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSecurityToken {
    /// Server assigned identifier of the channel.
    pub channel_id: u32,
    /// Server assigned identifier of the current token.
    pub token_id: u32,
    /// When the token was created, server wall-clock.
    pub created_at: DateTime,
    /// Lifetime of the token in milliseconds. Renewal is due when 75% of
    /// this has elapsed.
    pub revised_lifetime: u32,
}

impl Default for ChannelSecurityToken {
    fn default() -> Self {
        ChannelSecurityToken {
            channel_id: 0,
            token_id: 0,
            created_at: DateTime::null(),
            revised_lifetime: 0,
        }
    }
}

impl SimpleBinaryEncodable for ChannelSecurityToken {
    fn byte_len(&self) -> usize {
        4 + 4 + self.created_at.byte_len() + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.channel_id)?;
        write_u32(stream, self.token_id)?;
        self.created_at.encode(stream)?;
        write_u32(stream, self.revised_lifetime)
    }
}

impl SimpleBinaryDecodable for ChannelSecurityToken {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(ChannelSecurityToken {
            channel_id: read_u32(stream)?,
            token_id: read_u32(stream)?,
            created_at: DateTime::decode(stream, decoding_options)?,
            revised_lifetime: read_u32(stream)?,
        })
    }
}

/// Asks the server to issue or renew a secure channel token. This message
/// is always protected asymmetrically.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Protocol version, always 0.
    pub client_protocol_version: u32,
    /// Issue a fresh token or renew the current one.
    pub request_type: SecurityTokenRequestType,
    /// The security mode to apply to the channel.
    pub security_mode: MessageSecurityMode,
    /// Fresh client random used in key derivation. Regenerated for every
    /// request, issue or renew.
    pub client_nonce: ByteString,
    /// Requested token lifetime in milliseconds.
    pub requested_lifetime: u32,
}

impl MessageInfo for OpenSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for OpenSecureChannelRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + 4
            + self.request_type.byte_len()
            + self.security_mode.byte_len()
            + self.client_nonce.byte_len()
            + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        write_u32(stream, self.client_protocol_version)?;
        self.request_type.encode(stream)?;
        self.security_mode.encode(stream)?;
        self.client_nonce.encode(stream)?;
        write_u32(stream, self.requested_lifetime)
    }
}

impl SimpleBinaryDecodable for OpenSecureChannelRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(OpenSecureChannelRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
            client_protocol_version: read_u32(stream)?,
            request_type: SecurityTokenRequestType::decode(stream, decoding_options)?,
            security_mode: MessageSecurityMode::decode(stream, decoding_options)?,
            client_nonce: ByteString::decode(stream, decoding_options)?,
            requested_lifetime: read_u32(stream)?,
        })
    }
}

/// The server's answer to OpenSecureChannel: the channel token and the
/// server's own nonce for key derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// Protocol version, always 0.
    pub server_protocol_version: u32,
    /// The issued or renewed token.
    pub security_token: ChannelSecurityToken,
    /// Server random used in key derivation.
    pub server_nonce: ByteString,
}

impl MessageInfo for OpenSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for OpenSecureChannelResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
            + 4
            + self.security_token.byte_len()
            + self.server_nonce.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)?;
        write_u32(stream, self.server_protocol_version)?;
        self.security_token.encode(stream)?;
        self.server_nonce.encode(stream)
    }
}

impl SimpleBinaryDecodable for OpenSecureChannelResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(OpenSecureChannelResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
            server_protocol_version: read_u32(stream)?,
            security_token: ChannelSecurityToken::decode(stream, decoding_options)?,
            server_nonce: ByteString::decode(stream, decoding_options)?,
        })
    }
}

/// Tells the server the channel is going away. Sent as a courtesy during
/// teardown, the server does not respond.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSecureChannelRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
}

impl MessageInfo for CloseSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CloseSecureChannelRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for CloseSecureChannelRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CloseSecureChannelRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
        })
    }
}

/// Response to CloseSecureChannel. Defined by the protocol but never
/// actually sent by servers.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSecureChannelResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
}

impl MessageInfo for CloseSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CloseSecureChannelResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for CloseSecureChannelResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CloseSecureChannelResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
        })
    }
}
