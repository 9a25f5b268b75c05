// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The codec for reading OPC UA TCP messages off a stream: it waits for
//! whole messages and classifies them as handshake messages or secure
//! conversation chunks.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use log::error;
use tokio_util::codec::Decoder;

use uaclient_types::{DecodingOptions, SimpleBinaryDecodable, StatusCode};

use super::{
    message_chunk::MessageChunk,
    tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, MessageType, TcpMessageHeader,
        MESSAGE_HEADER_LEN,
    },
};

/// A whole message read off the wire.
#[derive(Debug)]
pub enum Message {
    /// A HELLO handshake message.
    Hello(HelloMessage),
    /// An ACKNOWLEDGE handshake message.
    Acknowledge(AcknowledgeMessage),
    /// A transport level error.
    Error(ErrorMessage),
    /// An OPN / MSG / CLO chunk, still secured.
    Chunk(MessageChunk),
}

/// The codec decodes one whole `Message` at a time. Incomplete messages
/// stay in the buffer until the rest arrives.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
}

impl TcpCodec {
    /// Create a codec with the given decoding limits.
    pub fn new(decoding_options: DecodingOptions) -> TcpCodec {
        TcpCodec { decoding_options }
    }
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < MESSAGE_HEADER_LEN {
            return Ok(None);
        }

        let header = {
            let mut stream = Cursor::new(&buf[..MESSAGE_HEADER_LEN]);
            TcpMessageHeader::decode(&mut stream, &self.decoding_options)
                .map_err(std::io::Error::from)?
        };

        let message_size = header.message_size as usize;
        if message_size < MESSAGE_HEADER_LEN {
            error!("Message size {} is less than the header size", message_size);
            return Err(StatusCode::BadTcpInternalError.into());
        }
        if self.decoding_options.max_message_size > 0
            && message_size > self.decoding_options.max_message_size
        {
            error!(
                "Message size {} exceeds max message size {}",
                message_size, self.decoding_options.max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge.into());
        }
        if buf.len() < message_size {
            // Wait for the rest of the message.
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let data = buf.copy_to_bytes(message_size);
        let mut stream = Cursor::new(&data[..]);
        let message = match header.message_type {
            MessageType::Hello => Message::Hello(
                HelloMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            MessageType::Acknowledge => Message::Acknowledge(
                AcknowledgeMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            MessageType::Error => Message::Error(
                ErrorMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            MessageType::Chunk => Message::Chunk(
                MessageChunk::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
        };
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uaclient_types::SimpleBinaryEncodable;

    #[test]
    fn decodes_a_split_hello() {
        let hello = HelloMessage::new("opc.tcp://localhost:4855/", 8192, 8192, 0, 0);
        let bytes = hello.encode_to_vec();

        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut buf = BytesMut::new();

        // Nothing decodes from half a message.
        buf.extend_from_slice(&bytes[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[10..]);
        match codec.decode(&mut buf).unwrap() {
            Some(Message::Hello(h)) => assert_eq!(h, hello),
            other => panic!("Expected a hello, got {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_garbage_message_type() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"XXXF\x08\x00\x00\x00");
        assert!(codec.decode(&mut buf).is_err());
    }
}
