// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The GetEndpoints discovery service.

use std::io::{Read, Write};

use crate::encoding::{
    DecodingOptions, EncodingResult, SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::extension_object::MessageInfo;
use crate::node_ids::ObjectId;
use crate::request_header::RequestHeader;
use crate::response_header::ResponseHeader;
use crate::string::UAString;

use super::endpoints::EndpointDescription;

/// Asks a server for the endpoints it offers. May be sent on a channel with
/// no session.
#[derive(Debug, Clone, PartialEq)]
pub struct GetEndpointsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The network address the client used to reach the server.
    pub endpoint_url: UAString,
    /// Locales to use for localized strings, in preference order.
    pub locale_ids: Option<Vec<UAString>>,
    /// Restrict the response to endpoints of these transport profiles.
    pub profile_uris: Option<Vec<UAString>>,
}

impl MessageInfo for GetEndpointsRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::GetEndpointsRequestEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for GetEndpointsRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + self.endpoint_url.byte_len()
            + self.locale_ids.byte_len()
            + self.profile_uris.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.request_header.encode(stream)?;
        self.endpoint_url.encode(stream)?;
        self.locale_ids.encode(stream)?;
        self.profile_uris.encode(stream)
    }
}

impl SimpleBinaryDecodable for GetEndpointsRequest {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(GetEndpointsRequest {
            request_header: RequestHeader::decode(stream, decoding_options)?,
            endpoint_url: UAString::decode(stream, decoding_options)?,
            locale_ids: Option::<Vec<UAString>>::decode(stream, decoding_options)?,
            profile_uris: Option::<Vec<UAString>>::decode(stream, decoding_options)?,
        })
    }
}

/// The endpoints a server offers, in the server's own preference order.
#[derive(Debug, Clone, PartialEq)]
pub struct GetEndpointsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// The advertised endpoints.
    pub endpoints: Option<Vec<EndpointDescription>>,
}

impl MessageInfo for GetEndpointsResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::GetEndpointsResponseEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for GetEndpointsResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len() + self.endpoints.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)?;
        self.endpoints.encode(stream)
    }
}

impl SimpleBinaryDecodable for GetEndpointsResponse {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(GetEndpointsResponse {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
            endpoints: Option::<Vec<EndpointDescription>>::decode(stream, decoding_options)?,
        })
    }
}
