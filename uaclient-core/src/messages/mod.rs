// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The enums of every request and response message the stack can exchange.

use std::io::Read;

use uaclient_types::{
    DecodingOptions, EncodingResult, NodeId, ObjectId, SimpleBinaryEncodable,
};

mod request;
mod response;

pub use request::RequestMessage;
pub use response::ResponseMessage;

use crate::comms::message_chunk::MessageChunkType;

/// Trait for messages that know which kind of chunk carries them.
pub trait MessageType {
    /// The chunk type of the message, OPN, CLO or MSG.
    fn message_type(&self) -> MessageChunkType;
}

/// A message that can be encoded into a chunk body and decoded back by its
/// encoding id.
pub trait Message: SimpleBinaryEncodable + MessageType {
    /// The request handle from the message's header, 0 if not set.
    fn request_handle(&self) -> u32;

    /// Decode a message body of the type identified by `object_id`.
    fn decode_by_object_id<S: Read>(
        stream: &mut S,
        object_id: ObjectId,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self>
    where
        Self: Sized;

    /// The node id of the message's binary encoding, written ahead of the
    /// body.
    fn type_id(&self) -> NodeId;
}
