// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Types used by the OPC UA client connection stack. This crate holds the
//! binary encoding traits and the subset of built-in and service types
//! exchanged while establishing a connection: the transport handshake,
//! secure channel, discovery and session services.

pub mod byte_string;
pub mod constants;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod extension_object;
pub mod guid;
pub mod localized_text;
pub mod node_id;
pub mod node_ids;
pub mod request_header;
pub mod response_header;
pub mod service_types;
pub mod status_code;
pub mod string;

mod basic_types;

pub use byte_string::ByteString;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, read_i64, read_u16, read_u32,
    read_u8, write_bytes, write_i32, write_i64, write_u16, write_u32, write_u8, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable,
};
pub use extension_object::{ExtensionObject, MessageInfo};
pub use guid::Guid;
pub use localized_text::LocalizedText;
pub use node_id::{Identifier, NodeId};
pub use node_ids::ObjectId;
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use service_types::*;
pub use status_code::StatusCode;
pub use string::UAString;

/// Request ID or request handle type.
pub type IntegerId = u32;
