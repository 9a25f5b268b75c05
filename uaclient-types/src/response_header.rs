// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The header common to every service response.

use std::io::{Read, Write};

use crate::date_time::DateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_u32, write_u32, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::extension_object::ExtensionObject;
use crate::status_code::StatusCode;
use crate::string::UAString;
use crate::IntegerId;

/// Common parameters of every service response. `service_result` carries
/// the overall outcome of the service call; operation level results are in
/// the response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    /// Wall-clock time the response was sent.
    pub timestamp: DateTime,
    /// The handle copied from the matching request.
    pub request_handle: IntegerId,
    /// Overall result of the service call.
    pub service_result: StatusCode,
    /// Diagnostics associated with the service result.
    pub service_diagnostics: DiagnosticInfo,
    /// Strings referenced by index from the diagnostics.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved for protocol extensions.
    pub additional_header: ExtensionObject,
}

impl SimpleBinaryEncodable for ResponseHeader {
    fn byte_len(&self) -> usize {
        self.timestamp.byte_len()
            + 4
            + self.service_result.byte_len()
            + self.service_diagnostics.byte_len()
            + self.string_table.byte_len()
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.timestamp.encode(stream)?;
        write_u32(stream, self.request_handle)?;
        self.service_result.encode(stream)?;
        self.service_diagnostics.encode(stream)?;
        self.string_table.encode(stream)?;
        self.additional_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for ResponseHeader {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let timestamp = DateTime::decode(stream, decoding_options)?;
        let request_handle = read_u32(stream)?;
        let service_result = StatusCode::decode(stream, decoding_options)?;
        let service_diagnostics = DiagnosticInfo::decode(stream, decoding_options)?;
        let string_table = Option::<Vec<UAString>>::decode(stream, decoding_options)?;
        let additional_header = ExtensionObject::decode(stream, decoding_options)?;
        Ok(ResponseHeader {
            timestamp,
            request_handle,
            service_result,
            service_diagnostics,
            string_table,
            additional_header,
        })
    }
}

impl ResponseHeader {
    /// A good response header for the request with the given handle.
    pub fn new_good(request_handle: IntegerId) -> ResponseHeader {
        ResponseHeader::new_service_result(request_handle, StatusCode::Good)
    }

    /// A response header with the given handle and service result.
    pub fn new_service_result(
        request_handle: IntegerId,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::null(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }
}
