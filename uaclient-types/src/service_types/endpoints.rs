// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Endpoint and application descriptions, the data GetEndpoints returns and
//! endpoint selection consumes.

use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_u8, write_u8, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::localized_text::LocalizedText;
use crate::string::UAString;

use super::enums::{ApplicationType, MessageSecurityMode, UserTokenType};

/// Describes an OPC UA application, client or server.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ApplicationDescription {
    /// Globally unique identifier of the application instance.
    pub application_uri: UAString,
    /// Globally unique identifier of the product.
    pub product_uri: UAString,
    /// Human readable name of the application.
    pub application_name: LocalizedText,
    /// The kind of application.
    pub application_type: ApplicationType,
    /// URI of the gateway server, if any.
    pub gateway_server_uri: UAString,
    /// URI of the discovery profile supported.
    pub discovery_profile_uri: UAString,
    /// URLs for discovery of this application.
    pub discovery_urls: Option<Vec<UAString>>,
}

impl SimpleBinaryEncodable for ApplicationDescription {
    fn byte_len(&self) -> usize {
        self.application_uri.byte_len()
            + self.product_uri.byte_len()
            + self.application_name.byte_len()
            + self.application_type.byte_len()
            + self.gateway_server_uri.byte_len()
            + self.discovery_profile_uri.byte_len()
            + self.discovery_urls.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.application_uri.encode(stream)?;
        self.product_uri.encode(stream)?;
        self.application_name.encode(stream)?;
        self.application_type.encode(stream)?;
        self.gateway_server_uri.encode(stream)?;
        self.discovery_profile_uri.encode(stream)?;
        self.discovery_urls.encode(stream)
    }
}

impl SimpleBinaryDecodable for ApplicationDescription {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(ApplicationDescription {
            application_uri: UAString::decode(stream, decoding_options)?,
            product_uri: UAString::decode(stream, decoding_options)?,
            application_name: LocalizedText::decode(stream, decoding_options)?,
            application_type: ApplicationType::decode(stream, decoding_options)?,
            gateway_server_uri: UAString::decode(stream, decoding_options)?,
            discovery_profile_uri: UAString::decode(stream, decoding_options)?,
            discovery_urls: Option::<Vec<UAString>>::decode(stream, decoding_options)?,
        })
    }
}

/// A server declared rule for how clients may authenticate on an endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserTokenPolicy {
    /// Identifier the client echoes back in its identity token.
    pub policy_id: UAString,
    /// The kind of token this policy accepts.
    pub token_type: UserTokenType,
    /// For issued tokens, the type of token.
    pub issued_token_type: UAString,
    /// For issued tokens, the endpoint of the issuing authority.
    pub issuer_endpoint_url: UAString,
    /// Security policy to apply to the token, empty means the endpoint's
    /// own policy.
    pub security_policy_uri: UAString,
}

impl Default for UserTokenPolicy {
    fn default() -> Self {
        UserTokenPolicy {
            policy_id: UAString::null(),
            token_type: UserTokenType::Anonymous,
            issued_token_type: UAString::null(),
            issuer_endpoint_url: UAString::null(),
            security_policy_uri: UAString::null(),
        }
    }
}

impl SimpleBinaryEncodable for UserTokenPolicy {
    fn byte_len(&self) -> usize {
        self.policy_id.byte_len()
            + self.token_type.byte_len()
            + self.issued_token_type.byte_len()
            + self.issuer_endpoint_url.byte_len()
            + self.security_policy_uri.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.policy_id.encode(stream)?;
        self.token_type.encode(stream)?;
        self.issued_token_type.encode(stream)?;
        self.issuer_endpoint_url.encode(stream)?;
        self.security_policy_uri.encode(stream)
    }
}

impl SimpleBinaryDecodable for UserTokenPolicy {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(UserTokenPolicy {
            policy_id: UAString::decode(stream, decoding_options)?,
            token_type: UserTokenType::decode(stream, decoding_options)?,
            issued_token_type: UAString::decode(stream, decoding_options)?,
            issuer_endpoint_url: UAString::decode(stream, decoding_options)?,
            security_policy_uri: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl UserTokenPolicy {
    /// The anonymous policy most test servers advertise.
    pub fn anonymous() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: UAString::from("anonymous"),
            token_type: UserTokenType::Anonymous,
            ..Default::default()
        }
    }
}

/// The description of an endpoint advertised by a server: where to connect,
/// what security to apply and which user tokens are accepted.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct EndpointDescription {
    /// The URL to connect to.
    pub endpoint_url: UAString,
    /// Description of the server offering the endpoint.
    pub server: ApplicationDescription,
    /// The server's application instance certificate, DER encoded.
    pub server_certificate: ByteString,
    /// The security mode required on this endpoint.
    pub security_mode: MessageSecurityMode,
    /// The security policy required on this endpoint.
    pub security_policy_uri: UAString,
    /// The user token policies accepted on this endpoint.
    pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
    /// The transport profile. Empty is treated as the binary profile for
    /// compatibility with servers that leave it blank.
    pub transport_profile_uri: UAString,
    /// Server assigned relative security strength.
    pub security_level: u8,
}

impl SimpleBinaryEncodable for EndpointDescription {
    fn byte_len(&self) -> usize {
        self.endpoint_url.byte_len()
            + self.server.byte_len()
            + self.server_certificate.byte_len()
            + self.security_mode.byte_len()
            + self.security_policy_uri.byte_len()
            + self.user_identity_tokens.byte_len()
            + self.transport_profile_uri.byte_len()
            + 1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.endpoint_url.encode(stream)?;
        self.server.encode(stream)?;
        self.server_certificate.encode(stream)?;
        self.security_mode.encode(stream)?;
        self.security_policy_uri.encode(stream)?;
        self.user_identity_tokens.encode(stream)?;
        self.transport_profile_uri.encode(stream)?;
        write_u8(stream, self.security_level)
    }
}

impl SimpleBinaryDecodable for EndpointDescription {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(EndpointDescription {
            endpoint_url: UAString::decode(stream, decoding_options)?,
            server: ApplicationDescription::decode(stream, decoding_options)?,
            server_certificate: ByteString::decode(stream, decoding_options)?,
            security_mode: MessageSecurityMode::decode(stream, decoding_options)?,
            security_policy_uri: UAString::decode(stream, decoding_options)?,
            user_identity_tokens: Option::<Vec<UserTokenPolicy>>::decode(
                stream,
                decoding_options,
            )?,
            transport_profile_uri: UAString::decode(stream, decoding_options)?,
            security_level: read_u8(stream)?,
        })
    }
}

impl From<&str> for EndpointDescription {
    fn from(value: &str) -> Self {
        EndpointDescription {
            endpoint_url: UAString::from(value),
            ..Default::default()
        }
    }
}

impl EndpointDescription {
    /// Find the first user token policy of the given type, if any.
    pub fn find_policy(&self, token_type: UserTokenType) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .as_ref()
            .and_then(|tokens| tokens.iter().find(|t| t.token_type == token_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_endpoint() -> EndpointDescription {
        EndpointDescription {
            endpoint_url: UAString::from("opc.tcp://localhost:4855/"),
            server: ApplicationDescription {
                application_uri: UAString::from("urn:localhost:test-server"),
                application_name: LocalizedText::new("en", "test server"),
                application_type: ApplicationType::Server,
                ..Default::default()
            },
            server_certificate: ByteString::null(),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: UAString::from(
                "http://opcfoundation.org/UA/SecurityPolicy#None",
            ),
            user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
            transport_profile_uri: UAString::null(),
            security_level: 0,
        }
    }

    #[test]
    fn endpoint_description_round_trip() {
        let e = sample_endpoint();
        let buf = e.encode_to_vec();
        assert_eq!(buf.len(), e.byte_len());
        let mut stream = Cursor::new(buf);
        let e2 = EndpointDescription::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(e, e2);
    }

    #[test]
    fn endpoint_description_copy_is_deep() {
        let original = sample_endpoint();
        let mut copy = original.clone();
        copy.endpoint_url = UAString::from("opc.tcp://elsewhere:4855/");
        copy.user_identity_tokens
            .as_mut()
            .unwrap()
            .push(UserTokenPolicy::default());
        assert_eq!(original.endpoint_url.as_ref(), "opc.tcp://localhost:4855/");
        assert_eq!(original.user_identity_tokens.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn unknown_security_mode_decodes_to_invalid() {
        let mut e = sample_endpoint();
        e.security_mode = MessageSecurityMode::None;
        let mut buf = e.encode_to_vec();
        // Corrupt the security mode on the wire to a nonsense value. It sits
        // right after the null server certificate (4 bytes of -1).
        let url_len = e.endpoint_url.byte_len() + e.server.byte_len() + 4;
        buf[url_len] = 99;
        let mut stream = Cursor::new(buf);
        let e2 = EndpointDescription::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(e2.security_mode, MessageSecurityMode::Invalid);
    }
}
