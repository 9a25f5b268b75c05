// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The header common to every service request.

use std::io::{Read, Write};

use crate::date_time::DateTime;
use crate::encoding::{
    read_u32, write_u32, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::extension_object::ExtensionObject;
use crate::node_id::NodeId;
use crate::string::UAString;
use crate::IntegerId;

/// Common parameters of every service request. The authentication token is
/// the opaque session identifier handed out by CreateSession, null before a
/// session exists.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    /// The secret session identifier, null on session-less requests.
    pub authentication_token: NodeId,
    /// Wall-clock time the request was sent. Deadlines never consult this.
    pub timestamp: DateTime,
    /// Client assigned identifier, copied back in the matching response.
    pub request_handle: IntegerId,
    /// Bit mask of requested diagnostics, 0 for none.
    pub return_diagnostics: u32,
    /// Audit log entry correlation, rarely used by clients.
    pub audit_entry_id: UAString,
    /// Hint in milliseconds for how long the server should bother trying.
    pub timeout_hint: u32,
    /// Reserved for protocol extensions.
    pub additional_header: ExtensionObject,
}

impl SimpleBinaryEncodable for RequestHeader {
    fn byte_len(&self) -> usize {
        self.authentication_token.byte_len()
            + self.timestamp.byte_len()
            + 4
            + 4
            + self.audit_entry_id.byte_len()
            + 4
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.authentication_token.encode(stream)?;
        self.timestamp.encode(stream)?;
        write_u32(stream, self.request_handle)?;
        write_u32(stream, self.return_diagnostics)?;
        self.audit_entry_id.encode(stream)?;
        write_u32(stream, self.timeout_hint)?;
        self.additional_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for RequestHeader {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let authentication_token = NodeId::decode(stream, decoding_options)?;
        let timestamp = DateTime::decode(stream, decoding_options)?;
        let request_handle = read_u32(stream)?;
        let return_diagnostics = read_u32(stream)?;
        let audit_entry_id = UAString::decode(stream, decoding_options)?;
        let timeout_hint = read_u32(stream)?;
        let additional_header = ExtensionObject::decode(stream, decoding_options)?;
        Ok(RequestHeader {
            authentication_token,
            timestamp,
            request_handle,
            return_diagnostics,
            audit_entry_id,
            timeout_hint,
            additional_header,
        })
    }
}

impl RequestHeader {
    /// Create a request header with the given token, handle and timeout
    /// hint. The timestamp is the current wall-clock time.
    pub fn new(
        authentication_token: NodeId,
        request_handle: IntegerId,
        timeout_hint: u32,
    ) -> RequestHeader {
        RequestHeader {
            authentication_token,
            timestamp: DateTime::now(),
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: UAString::null(),
            timeout_hint,
            additional_header: ExtensionObject::null(),
        }
    }

    /// A header with no content, useful in tests.
    pub fn dummy() -> RequestHeader {
        RequestHeader::new(NodeId::null(), 1, 0)
    }
}
