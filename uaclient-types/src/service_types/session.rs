// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The session services: CreateSession, ActivateSession and CloseSession.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_f64, read_u32, write_f64, write_u32, DecodingOptions, EncodingResult,
    SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::extension_object::{ExtensionObject, MessageInfo};
use crate::node_id::NodeId;
use crate::node_ids::ObjectId;
use crate::request_header::RequestHeader;
use crate::response_header::ResponseHeader;
use crate::status_code::StatusCode;
use crate::string::UAString;

use super::endpoints::{ApplicationDescription, EndpointDescription};
use super::security::{SignatureData, SignedSoftwareCertificate};
use crate::diagnostic_info::DiagnosticInfo;

/// Asks the server to create a session. The response carries the
/// authentication token used on all subsequent requests.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Description of the client application.
    pub client_description: ApplicationDescription,
    /// URI of the server the client expects to talk to.
    pub server_uri: UAString,
    /// The network address the client used to reach the server.
    pub endpoint_url: UAString,
    /// Human readable session name.
    pub session_name: UAString,
    /// Client random for the session, distinct from the channel nonce.
    pub client_nonce: ByteString,
    /// The client application instance certificate.
    pub client_certificate: ByteString,
    /// Requested session timeout in milliseconds.
    pub requested_session_timeout: f64,
    /// Largest response the client will accept, 0 for no limit.
    pub max_response_message_size: u32,
}

impl MessageInfo for CreateSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSessionRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CreateSessionRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + self.client_description.byte_len()
            + self.server_uri.byte_len()
            + self.endpoint_url.byte_len()
            + self.session_name.byte_len()
            + self.client_nonce.byte_len()
            + self.client_certificate.byte_len()
            + 8
            + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        self.client_description.encode(stream)?;
        self.server_uri.encode(stream)?;
        self.endpoint_url.encode(stream)?;
        self.session_name.encode(stream)?;
        self.client_nonce.encode(stream)?;
        self.client_certificate.encode(stream)?;
        write_f64(stream, self.requested_session_timeout)?;
        write_u32(stream, self.max_response_message_size)
    }
}

impl SimpleBinaryDecodable for CreateSessionRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CreateSessionRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
            client_description: ApplicationDescription::decode(stream, decoding_options)?,
            server_uri: UAString::decode(stream, decoding_options)?,
            endpoint_url: UAString::decode(stream, decoding_options)?,
            session_name: UAString::decode(stream, decoding_options)?,
            client_nonce: ByteString::decode(stream, decoding_options)?,
            client_certificate: ByteString::decode(stream, decoding_options)?,
            requested_session_timeout: read_f64(stream)?,
            max_response_message_size: read_u32(stream)?,
        })
    }
}

/// The created session: its ids, the server nonce and certificate, and the
/// endpoints the server offers for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// Public identifier of the session.
    pub session_id: NodeId,
    /// Secret identifier the client must send with every request.
    pub authentication_token: NodeId,
    /// The session timeout the server actually applies, milliseconds.
    pub revised_session_timeout: f64,
    /// Server random used in signatures and password encryption.
    pub server_nonce: ByteString,
    /// The server application instance certificate.
    pub server_certificate: ByteString,
    /// The endpoints of the server, for cross-checking discovery results.
    pub server_endpoints: Option<Vec<EndpointDescription>>,
    /// Software certificates, unused in practice.
    pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
    /// Server's proof of possession of its certificate's key.
    pub server_signature: SignatureData,
    /// Largest request the server accepts, 0 for no limit.
    pub max_request_message_size: u32,
}

impl MessageInfo for CreateSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSessionResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CreateSessionResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
            + self.session_id.byte_len()
            + self.authentication_token.byte_len()
            + 8
            + self.server_nonce.byte_len()
            + self.server_certificate.byte_len()
            + self.server_endpoints.byte_len()
            + self.server_software_certificates.byte_len()
            + self.server_signature.byte_len()
            + 4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)?;
        self.session_id.encode(stream)?;
        self.authentication_token.encode(stream)?;
        write_f64(stream, self.revised_session_timeout)?;
        self.server_nonce.encode(stream)?;
        self.server_certificate.encode(stream)?;
        self.server_endpoints.encode(stream)?;
        self.server_software_certificates.encode(stream)?;
        self.server_signature.encode(stream)?;
        write_u32(stream, self.max_request_message_size)
    }
}

impl SimpleBinaryDecodable for CreateSessionResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CreateSessionResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
            session_id: NodeId::decode(stream, decoding_options)?,
            authentication_token: NodeId::decode(stream, decoding_options)?,
            revised_session_timeout: read_f64(stream)?,
            server_nonce: ByteString::decode(stream, decoding_options)?,
            server_certificate: ByteString::decode(stream, decoding_options)?,
            server_endpoints: Option::<Vec<EndpointDescription>>::decode(
                stream,
                decoding_options,
            )?,
            server_software_certificates: Option::<Vec<SignedSoftwareCertificate>>::decode(
                stream,
                decoding_options,
            )?,
            server_signature: SignatureData::decode(stream, decoding_options)?,
            max_request_message_size: read_u32(stream)?,
        })
    }
}

/// Activates a created session by presenting the user identity, or
/// re-activates a dormant session on a fresh secure channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Client's proof of possession of its certificate's key.
    pub client_signature: SignatureData,
    /// Software certificates, unused in practice.
    pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
    /// Locales to use for localized strings, in preference order.
    pub locale_ids: Option<Vec<UAString>>,
    /// The user identity token, wrapped in an extension object.
    pub user_identity_token: ExtensionObject,
    /// Signature produced with the identity token's key, if any.
    pub user_token_signature: SignatureData,
}

impl MessageInfo for ActivateSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::ActivateSessionRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for ActivateSessionRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + self.client_signature.byte_len()
            + self.client_software_certificates.byte_len()
            + self.locale_ids.byte_len()
            + self.user_identity_token.byte_len()
            + self.user_token_signature.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        self.client_signature.encode(stream)?;
        self.client_software_certificates.encode(stream)?;
        self.locale_ids.encode(stream)?;
        self.user_identity_token.encode(stream)?;
        self.user_token_signature.encode(stream)
    }
}

impl SimpleBinaryDecodable for ActivateSessionRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(ActivateSessionRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
            client_signature: SignatureData::decode(stream, decoding_options)?,
            client_software_certificates: Option::<Vec<SignedSoftwareCertificate>>::decode(
                stream,
                decoding_options,
            )?,
            locale_ids: Option::<Vec<UAString>>::decode(stream, decoding_options)?,
            user_identity_token: ExtensionObject::decode(stream, decoding_options)?,
            user_token_signature: SignatureData::decode(stream, decoding_options)?,
        })
    }
}

/// Confirms activation. The session is usable once this arrives with a
/// good service result.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// Fresh server random for the next signature.
    pub server_nonce: ByteString,
    /// Results for the software certificates.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the software certificates.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for ActivateSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::ActivateSessionResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for ActivateSessionResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
            + self.server_nonce.byte_len()
            + self.results.byte_len()
            + self.diagnostic_infos.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)?;
        self.server_nonce.encode(stream)?;
        self.results.encode(stream)?;
        self.diagnostic_infos.encode(stream)
    }
}

impl SimpleBinaryDecodable for ActivateSessionResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(ActivateSessionResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
            server_nonce: ByteString::decode(stream, decoding_options)?,
            results: Option::<Vec<StatusCode>>::decode(stream, decoding_options)?,
            diagnostic_infos: Option::<Vec<DiagnosticInfo>>::decode(stream, decoding_options)?,
        })
    }
}

/// Ends a session. `delete_subscriptions` tells the server to drop
/// subscriptions immediately instead of letting them expire.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Delete the session's subscriptions as well.
    pub delete_subscriptions: bool,
}

impl MessageInfo for CloseSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSessionRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CloseSessionRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len() + 1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        self.delete_subscriptions.encode(stream)
    }
}

impl SimpleBinaryDecodable for CloseSessionRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CloseSessionRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
            delete_subscriptions: bool::decode(stream, decoding_options)?,
        })
    }
}

/// Confirms the session is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
}

impl MessageInfo for CloseSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSessionResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for CloseSessionResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for CloseSessionResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(CloseSessionResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
        })
    }
}
