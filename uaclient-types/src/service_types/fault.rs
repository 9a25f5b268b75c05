// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The ServiceFault response, returned in place of any service specific
//! response when a request fails outright.

use std::io::{Read, Write};

use crate::encoding::{
    DecodingOptions, EncodingResult, SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::extension_object::MessageInfo;
use crate::node_ids::ObjectId;
use crate::response_header::ResponseHeader;

/// A response carrying nothing but the failing service result.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFault {
    /// Common response parameters, including the failing status.
    pub response_header: ResponseHeader,
}

impl MessageInfo for ServiceFault {
    fn type_id(&self) -> ObjectId {
        ObjectId::ServiceFaultEncodingDefaultBinary
    }
}

impl SimpleBinaryEncodable for ServiceFault {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.response_header.encode(stream)
    }
}

impl SimpleBinaryDecodable for ServiceFault {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(ServiceFault {
            response_header: ResponseHeader::decode(stream, decoding_options)?,
        })
    }
}
