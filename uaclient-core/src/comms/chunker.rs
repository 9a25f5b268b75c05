// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains code for turning messages into chunks and chunks into messages.

use std::io::Cursor;

use log::{debug, error};

use uaclient_crypto::SecurityPolicy;
use uaclient_types::{
    Error, NodeId, ObjectId, SimpleBinaryDecodable, SimpleBinaryEncodable, StatusCode,
};

use crate::Message;

use super::{
    message_chunk::{MessageChunk, MessageIsFinalType},
    secure_channel::SecureChannel,
};

/// The Chunker is responsible for turning messages into chunks and chunks
/// back into messages.
pub struct Chunker;

impl Chunker {
    /// Ensure all of the supplied chunks have a valid secure channel id, and sequence numbers
    /// greater than the input sequence number and the preceding chunk.
    ///
    /// The function returns the last sequence number in the series for success, or
    /// `BadSequenceNumberInvalid` or `BadSecureChannelIdInvalid` for failure.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        secure_channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> Result<u32, Error> {
        let first_sequence_number = {
            let chunk_info = chunks[0].chunk_info(secure_channel)?;
            chunk_info.sequence_header.sequence_number
        };
        if first_sequence_number < starting_sequence_number {
            return Err(Error::new(
                StatusCode::BadSequenceNumberInvalid,
                format!(
                    "First sequence number of {} is less than last value {}",
                    first_sequence_number, starting_sequence_number
                ),
            ));
        }

        let secure_channel_id = secure_channel.secure_channel_id();
        let mut expected_request_id: u32 = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(secure_channel)?;

            // Check the channel id of each chunk
            if secure_channel_id != 0
                && chunk_info.message_header.secure_channel_id != secure_channel_id
            {
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    format!(
                        "Secure channel id {} does not match expected id {}",
                        chunk_info.message_header.secure_channel_id, secure_channel_id
                    ),
                ));
            }

            // Sequence numbers must be contiguous
            let sequence_number = chunk_info.sequence_header.sequence_number;
            let expected_sequence_number = first_sequence_number + i as u32;
            if sequence_number != expected_sequence_number {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk sequence number of {} is not the expected value of {}, idx {}",
                        sequence_number, expected_sequence_number, i
                    ),
                ));
            }

            // Every chunk must belong to the same request
            if i == 0 {
                expected_request_id = chunk_info.sequence_header.request_id;
            } else if chunk_info.sequence_header.request_id != expected_request_id {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk {} has a request id {} which is not the expected value of {}",
                        i, chunk_info.sequence_header.request_id, expected_request_id
                    ),
                ));
            }
        }
        Ok(first_sequence_number + chunks.len() as u32 - 1)
    }

    /// Encodes a message using the supplied sequence number and secure channel info and emits
    /// the corresponding chunks.
    ///
    /// `max_chunk_size` is the maximum byte length a chunk may have, or 0 for no limit.
    /// `max_message_size` is the maximum byte length of a whole message, or 0 for no limit.
    pub fn encode(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        secure_channel: &SecureChannel,
        message: &impl Message,
    ) -> Result<Vec<MessageChunk>, Error> {
        let security_policy = secure_channel.security_policy();
        if security_policy == SecurityPolicy::Unknown {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Cannot encode chunks for an unknown security policy",
            ));
        }

        let ctx_id = Some(request_id);
        let handle = message.request_handle();
        let ctx_handle = if handle > 0 { Some(handle) } else { None };

        // Validate the message length before sending.
        let node_id = message.type_id();
        let message_size = node_id.byte_len() + message.byte_len();
        if max_message_size > 0 && message_size > max_message_size {
            // A client reports BadRequestTooLarge, a server BadResponseTooLarge.
            return Err(Error::new(
                if secure_channel.is_client_role() {
                    StatusCode::BadRequestTooLarge
                } else {
                    StatusCode::BadResponseTooLarge
                },
                format!(
                    "Max message size is {} and message {} exceeds that",
                    max_message_size, message_size
                ),
            )
            .with_context(ctx_id, ctx_handle));
        }

        // The message body is the encoding id followed by the message itself.
        let mut body = Vec::with_capacity(message_size);
        node_id.encode(&mut body)?;
        message
            .encode(&mut body)
            .map_err(|e| e.with_context(ctx_id, ctx_handle))?;

        let message_type = message.message_type();
        let max_body_per_chunk = if max_chunk_size > 0 {
            MessageChunk::body_size_from_message_size(message_type, secure_channel, max_chunk_size)
                .map_err(|_| {
                    Error::new(
                        StatusCode::BadTcpInternalError,
                        format!(
                            "body_size_from_message_size error for max_chunk_size = {}",
                            max_chunk_size
                        ),
                    )
                    .with_context(ctx_id, ctx_handle)
                })?
        } else {
            body.len()
        };

        let num_chunks = if body.is_empty() {
            1
        } else {
            body.len().div_ceil(max_body_per_chunk)
        };
        let mut chunks = Vec::with_capacity(num_chunks);
        for (i, piece) in body.chunks(max_body_per_chunk.max(1)).enumerate() {
            let is_final = if i == num_chunks - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            let chunk = MessageChunk::new(
                sequence_number + i as u32,
                request_id,
                message_type,
                is_final,
                secure_channel,
                piece,
            )?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Decodes a series of chunks to create a message. The message must be a supported
    /// message type, otherwise an error will occur.
    pub fn decode<T: Message>(
        chunks: &[MessageChunk],
        secure_channel: &SecureChannel,
        expected_node_id: Option<NodeId>,
    ) -> Result<T, Error> {
        // Gather the whole message body, checking the final flags as we go.
        let mut body = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(secure_channel)?;
            let expected_is_final = if i == chunks.len() - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            if chunk_info.message_header.is_final != expected_is_final {
                return Err(Error::decoding(
                    "Last message in sequence is not marked as final",
                ));
            }
            let body_start = chunk_info.body_offset;
            let body_end = body_start + chunk_info.body_length;
            body.extend_from_slice(&chunk.data[body_start..body_end]);
        }

        let decoding_options = secure_channel.decoding_options();
        let mut stream = Cursor::new(&body);

        // The message body is prefixed with the node id of its encoding.
        let node_id = NodeId::decode(&mut stream, &decoding_options)?;
        let object_id = Self::object_id_from_node_id(node_id, expected_node_id)?;

        T::decode_by_object_id(&mut stream, object_id, &decoding_options).inspect_err(|err| {
            debug!("Cannot decode message {:?}, err = {:?}", object_id, err);
        })
    }

    fn object_id_from_node_id(
        node_id: NodeId,
        expected_node_id: Option<NodeId>,
    ) -> Result<ObjectId, Error> {
        if let Some(id) = expected_node_id {
            if node_id != id {
                return Err(Error::decoding(format!(
                    "The message ID {node_id} is not the expected value {id}"
                )));
            }
        }
        node_id.as_object_id().map_err(|_| {
            error!("The message id {node_id} is not an object id");
            Error::decoding(format!("The message id {node_id} is not an object id"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestMessage;
    use uaclient_types::{GetEndpointsRequest, RequestHeader, UAString};

    fn sample_request() -> RequestMessage {
        GetEndpointsRequest {
            request_header: RequestHeader::dummy(),
            endpoint_url: UAString::from("opc.tcp://localhost:4855/"),
            locale_ids: None,
            profile_uris: None,
        }
        .into()
    }

    #[test]
    fn encode_decode_single_chunk() {
        let channel = SecureChannel::new_no_certificate_store();
        let request = sample_request();
        let chunks = Chunker::encode(1, 1, 0, 0, &channel, &request).unwrap();
        assert_eq!(chunks.len(), 1);

        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn encode_splits_into_chunks_and_reassembles() {
        let channel = SecureChannel::new_no_certificate_store();
        // A request padded out with a long URL still has to survive a small
        // chunk size.
        let request: RequestMessage = GetEndpointsRequest {
            request_header: RequestHeader::dummy(),
            endpoint_url: UAString::from(format!(
                "opc.tcp://localhost:4855/{}",
                "x".repeat(20000)
            )),
            locale_ids: None,
            profile_uris: None,
        }
        .into();

        let chunks = Chunker::encode(1, 1, 0, 8192, &channel, &request).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(Chunker::validate_chunks(1, &channel, &chunks).unwrap(), chunks.len() as u32);

        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn message_too_large_is_rejected() {
        let channel = SecureChannel::new_no_certificate_store();
        let request = sample_request();
        let err = Chunker::encode(1, 1, 16, 0, &channel, &request).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequestTooLarge);
    }

    #[test]
    fn out_of_order_chunks_are_rejected() {
        let channel = SecureChannel::new_no_certificate_store();
        let request: RequestMessage = GetEndpointsRequest {
            request_header: RequestHeader::dummy(),
            endpoint_url: UAString::from(format!(
                "opc.tcp://localhost:4855/{}",
                "x".repeat(20000)
            )),
            locale_ids: None,
            profile_uris: None,
        }
        .into();
        let mut chunks = Chunker::encode(1, 1, 0, 8192, &channel, &request).unwrap();
        chunks.swap(0, 1);
        assert!(Chunker::validate_chunks(1, &channel, &chunks).is_err());
    }
}
