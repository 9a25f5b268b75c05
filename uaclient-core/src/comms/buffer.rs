// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The send buffer queues outgoing messages as chunks, applies channel
//! security to one chunk at a time and streams the result to the wire.

use std::collections::VecDeque;

use log::trace;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use uaclient_types::{EncodingResult, Error};

use crate::Message;

use super::{chunker::Chunker, message_chunk::MessageChunk, secure_channel::SecureChannel};

/// Queues chunks of outgoing messages and owns the scratch buffer security
/// is applied into. Its limits start from local configuration and are
/// revised down by the server's ACKNOWLEDGE.
pub struct SendBuffer {
    /// The send buffer
    buffer: Vec<u8>,
    /// Next read position in the buffer.
    read_pos: usize,
    /// End of written data in the buffer.
    write_pos: usize,
    /// The maximum size of a chunk on the wire.
    send_buffer_size: usize,
    /// The maximum size of a whole message, 0 for no limit.
    max_message_size: usize,
    /// The maximum number of chunks in a message, 0 for no limit.
    max_chunk_count: usize,
    /// Chunks waiting to have security applied and be sent.
    chunks: VecDeque<MessageChunk>,
    /// The sequence number of the next chunk. Strictly increasing for the
    /// lifetime of the channel.
    last_sent_sequence_number: u32,
}

impl SendBuffer {
    /// Create a send buffer with the given local limits.
    pub fn new(
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> SendBuffer {
        SendBuffer {
            // Allow for padding and signature beyond the chunk size.
            buffer: vec![0u8; send_buffer_size + 1024],
            read_pos: 0,
            write_pos: 0,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
            chunks: VecDeque::new(),
            last_sent_sequence_number: 0,
        }
    }

    /// Revise the limits downwards from the server's ACKNOWLEDGE. A remote
    /// limit of 0 means unbounded, which never lowers a local limit.
    pub fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        if send_buffer_size > 0 && send_buffer_size < self.send_buffer_size {
            self.send_buffer_size = send_buffer_size;
            self.buffer.resize(send_buffer_size + 1024, 0);
        }
        if max_message_size > 0 && max_message_size < self.max_message_size {
            self.max_message_size = max_message_size;
        }
        if max_chunk_count > 0
            && (self.max_chunk_count == 0 || max_chunk_count < self.max_chunk_count)
        {
            self.max_chunk_count = max_chunk_count;
        }
    }

    /// The revised maximum chunk size.
    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }

    /// Encode a message into chunks and queue them. Returns the request id
    /// on success.
    pub fn write(
        &mut self,
        request_id: u32,
        message: impl Into<crate::RequestMessage>,
        secure_channel: &SecureChannel,
    ) -> Result<u32, Error> {
        let message = message.into();
        trace!("Writing request to buffer, request id {request_id}");
        let chunks = Chunker::encode(
            self.last_sent_sequence_number + 1,
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            secure_channel,
            &message,
        )?;
        if self.max_chunk_count > 0 && chunks.len() > self.max_chunk_count {
            return Err(Error::new(
                uaclient_types::StatusCode::BadCommunicationError,
                format!(
                    "Message requires {} chunks but the limit is {}",
                    chunks.len(),
                    self.max_chunk_count
                ),
            )
            .with_context(Some(request_id), Some(message.request_handle())));
        }
        self.last_sent_sequence_number += chunks.len() as u32;
        self.chunks.extend(chunks);
        Ok(request_id)
    }

    /// `true` when a queued chunk is ready to have security applied and
    /// there is no data waiting to be sent.
    pub fn should_encode_chunks(&self) -> bool {
        !self.chunks.is_empty() && !self.can_read()
    }

    /// Apply security to the next queued chunk, making its bytes readable.
    pub fn encode_next_chunk(&mut self, secure_channel: &SecureChannel) -> EncodingResult<()> {
        debug_assert!(!self.can_read());
        let Some(chunk) = self.chunks.pop_front() else {
            return Ok(());
        };
        let size = secure_channel.apply_security(&chunk, &mut self.buffer)?;
        self.read_pos = 0;
        self.write_pos = size;
        Ok(())
    }

    /// `true` when there are bytes waiting to go out on the wire.
    pub fn can_read(&self) -> bool {
        self.read_pos < self.write_pos
    }

    /// Write pending bytes to the stream. Cancel safe: a partial write
    /// advances the read position and the remainder goes out next call.
    pub async fn read_into_async<W: AsyncWrite + Unpin>(
        &mut self,
        write: &mut W,
    ) -> std::io::Result<usize> {
        let written = write.write(&self.buffer[self.read_pos..self.write_pos]).await?;
        self.read_pos += written;
        if !self.can_read() {
            self.read_pos = 0;
            self.write_pos = 0;
            write.flush().await?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uaclient_types::{GetEndpointsRequest, RequestHeader, UAString};

    fn request() -> GetEndpointsRequest {
        GetEndpointsRequest {
            request_header: RequestHeader::dummy(),
            endpoint_url: UAString::from("opc.tcp://localhost:4855/"),
            locale_ids: None,
            profile_uris: None,
        }
    }

    #[tokio::test]
    async fn queued_message_reaches_the_wire() {
        let channel = SecureChannel::new_no_certificate_store();
        let mut buffer = SendBuffer::new(8192, 0, 0);

        buffer.write(1, request(), &channel).unwrap();
        assert!(buffer.should_encode_chunks());
        buffer.encode_next_chunk(&channel).unwrap();
        assert!(buffer.can_read());

        let mut wire = Vec::new();
        buffer.read_into_async(&mut wire).await.unwrap();
        assert!(!buffer.can_read());
        assert_eq!(&wire[0..3], b"MSG");
    }

    #[test]
    fn sequence_numbers_increase_across_writes() {
        let channel = SecureChannel::new_no_certificate_store();
        let mut buffer = SendBuffer::new(8192, 0, 0);
        buffer.write(1, request(), &channel).unwrap();
        buffer.write(2, request(), &channel).unwrap();
        assert_eq!(buffer.last_sent_sequence_number, 2);
    }

    #[test]
    fn revise_only_lowers_limits() {
        let mut buffer = SendBuffer::new(65536, 1 << 20, 0);
        buffer.revise(8192, 1 << 21, 4);
        assert_eq!(buffer.send_buffer_size, 8192);
        assert_eq!(buffer.max_message_size, 1 << 20);
        assert_eq!(buffer.max_chunk_count, 4);
        // 0 means unbounded and never lowers anything.
        buffer.revise(0, 0, 0);
        assert_eq!(buffer.send_buffer_size, 8192);
    }
}
