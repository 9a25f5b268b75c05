// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The transport layer handshake messages: HELLO, ACKNOWLEDGE and ERROR,
//! plus the constants shared with chunked messages.

use std::io::{Read, Write};

use log::error;

use uaclient_types::{
    encoding::{
        process_decode_io_result, process_encode_io_result, read_u32, read_u8, write_u32,
        write_u8, DecodingOptions, EncodingResult, Error, SimpleBinaryDecodable,
        SimpleBinaryEncodable,
    },
    StatusCode, UAString,
};

/// Every TCP message starts with a header this long: a 3 byte ASCII type,
/// a 1 byte chunk type and a 4 byte total size.
pub const MESSAGE_HEADER_LEN: usize = 8;

/// Minimum size in bytes that a receive buffer may be, imposed by part 6.
pub const MIN_CHUNK_SIZE: usize = 8192;

/// Maximum length in bytes of the endpoint URL in a HELLO.
pub const MAX_ENDPOINT_URL_LENGTH: usize = 4096;

/// 3 byte message type of a HELLO.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// 3 byte message type of an ACKNOWLEDGE.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// 3 byte message type of an ERROR.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// 3 byte message type of a service message chunk.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// 3 byte message type of an OpenSecureChannel chunk.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// 3 byte message type of a CloseSecureChannel chunk.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// Chunk type byte of an intermediate chunk.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Chunk type byte of the final chunk of a message.
pub const CHUNK_FINAL: u8 = b'F';
/// Chunk type byte of a final chunk that aborts a message.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// The coarse type of an incoming TCP message, from the first 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageType {
    /// A HELLO handshake message.
    Hello,
    /// An ACKNOWLEDGE handshake message.
    Acknowledge,
    /// A transport level error.
    Error,
    /// An OPN / MSG / CLO chunk on the secure conversation.
    Chunk,
}

/// The 8 byte header at the start of every TCP message. The message size
/// includes the header itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpMessageHeader {
    /// The coarse message type.
    pub message_type: MessageType,
    /// Total size of the message including this header.
    pub message_size: u32,
}

impl SimpleBinaryEncodable for TcpMessageHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let message_type = match self.message_type {
            MessageType::Hello => HELLO_MESSAGE,
            MessageType::Acknowledge => ACKNOWLEDGE_MESSAGE,
            MessageType::Error => ERROR_MESSAGE,
            MessageType::Chunk => {
                return Err(Error::encoding(
                    "Chunk headers are written by the chunk itself",
                ));
            }
        };
        process_encode_io_result(stream.write_all(message_type))?;
        // Handshake messages are never chunked, the chunk type is always F.
        write_u8(stream, CHUNK_FINAL)?;
        write_u32(stream, self.message_size)
    }
}

impl SimpleBinaryDecodable for TcpMessageHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type_code))?;
        let message_type = match &message_type_code as &[u8] {
            HELLO_MESSAGE => MessageType::Hello,
            ACKNOWLEDGE_MESSAGE => MessageType::Acknowledge,
            ERROR_MESSAGE => MessageType::Error,
            CHUNK_MESSAGE | OPEN_SECURE_CHANNEL_MESSAGE | CLOSE_SECURE_CHANNEL_MESSAGE => {
                MessageType::Chunk
            }
            r => {
                return Err(Error::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    format!("Message type {r:?} is invalid"),
                ));
            }
        };
        let chunk_type = read_u8(stream)?;
        if message_type != MessageType::Chunk && chunk_type != CHUNK_FINAL {
            return Err(Error::new(
                StatusCode::BadTcpMessageTypeInvalid,
                format!("Chunk type {chunk_type} is invalid for a handshake message"),
            ));
        }
        let message_size = read_u32(stream)?;
        Ok(TcpMessageHeader {
            message_type,
            message_size,
        })
    }
}

/// The HELLO the client sends immediately after the TCP connection opens,
/// proposing transport limits.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// Message header, size filled in on creation.
    pub message_header: TcpMessageHeader,
    /// Protocol version, always 0.
    pub protocol_version: u32,
    /// Largest chunk the client is able to receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the client will send.
    pub send_buffer_size: u32,
    /// Largest whole message the client will accept, 0 for no limit.
    pub max_message_size: u32,
    /// Most chunks per message the client will accept, 0 for no limit.
    pub max_chunk_count: u32,
    /// The URL the client believes it is connecting to.
    pub endpoint_url: UAString,
}

impl SimpleBinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        self.endpoint_url.encode(stream)
    }
}

impl SimpleBinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = TcpMessageHeader::decode(stream, decoding_options)?;
        Ok(HelloMessage {
            message_header,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
            endpoint_url: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl HelloMessage {
    /// Create a HELLO for the given endpoint url and transport limits. The
    /// message size in the header is computed from the content.
    pub fn new(
        endpoint_url: &str,
        send_buffer_size: usize,
        receive_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        let mut msg = HelloMessage {
            message_header: TcpMessageHeader {
                message_type: MessageType::Hello,
                message_size: 0,
            },
            protocol_version: 0,
            receive_buffer_size: receive_buffer_size as u32,
            send_buffer_size: send_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url: UAString::from(endpoint_url),
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }

    /// The endpoint url must be present and not absurdly long.
    pub fn is_endpoint_url_valid(&self) -> bool {
        if self.endpoint_url.is_empty() {
            error!("HELLO contains no endpoint url");
            false
        } else if self.endpoint_url.len() > MAX_ENDPOINT_URL_LENGTH as isize {
            error!("HELLO endpoint url is too long");
            false
        } else {
            true
        }
    }

    /// Buffer sizes below the part 6 minimum are invalid.
    pub fn is_valid_buffer_sizes(&self) -> bool {
        if (self.receive_buffer_size as usize) < MIN_CHUNK_SIZE {
            error!("HELLO receive buffer size is less than minimum {MIN_CHUNK_SIZE}");
            false
        } else if (self.send_buffer_size as usize) < MIN_CHUNK_SIZE {
            error!("HELLO send buffer size is less than minimum {MIN_CHUNK_SIZE}");
            false
        } else {
            true
        }
    }
}

/// The server's ACKNOWLEDGE, revising the limits proposed in the HELLO.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// Message header, size filled in on creation.
    pub message_header: TcpMessageHeader,
    /// Protocol version the server speaks.
    pub protocol_version: u32,
    /// Largest chunk the server is able to receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the server will send.
    pub send_buffer_size: u32,
    /// Largest whole message the server will accept, 0 for no limit.
    pub max_message_size: u32,
    /// Most chunks per message the server will accept, 0 for no limit.
    pub max_chunk_count: u32,
}

impl SimpleBinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 20
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)
    }
}

impl SimpleBinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = TcpMessageHeader::decode(stream, decoding_options)?;
        Ok(AcknowledgeMessage {
            message_header,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
        })
    }
}

impl AcknowledgeMessage {
    /// Create an ACKNOWLEDGE with the given limits.
    pub fn new(
        protocol_version: u32,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> AcknowledgeMessage {
        let mut msg = AcknowledgeMessage {
            message_header: TcpMessageHeader {
                message_type: MessageType::Acknowledge,
                message_size: 0,
            },
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }
}

/// A transport level error. Either side may send one before dropping the
/// connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// Message header, size filled in on creation.
    pub message_header: TcpMessageHeader,
    /// The raw status code bits.
    pub error: u32,
    /// Human readable reason.
    pub reason: UAString,
}

impl SimpleBinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.error)?;
        self.reason.encode(stream)
    }
}

impl SimpleBinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = TcpMessageHeader::decode(stream, decoding_options)?;
        Ok(ErrorMessage {
            message_header,
            error: read_u32(stream)?,
            reason: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl ErrorMessage {
    /// Create an error message from a status code.
    pub fn from_status_code(status_code: StatusCode) -> ErrorMessage {
        let mut msg = ErrorMessage {
            message_header: TcpMessageHeader {
                message_type: MessageType::Error,
                message_size: 0,
            },
            error: status_code.bits(),
            reason: UAString::from(status_code.name()),
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }

    /// The error as a status code.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u32(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use uaclient_types::DecodingOptions;

    #[test]
    fn hello_round_trip_is_identity() {
        let hello = HelloMessage::new("opc.tcp://localhost:4855/", 65536, 65536, 0, 0);
        let buf = hello.encode_to_vec();
        // The header's message size must be the total number of bytes written.
        assert_eq!(buf.len(), hello.message_header.message_size as usize);
        assert_eq!(&buf[0..3], HELLO_MESSAGE);
        assert_eq!(buf[3], CHUNK_FINAL);

        let mut stream = Cursor::new(buf);
        let hello2 = HelloMessage::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(hello, hello2);
    }

    #[test]
    fn hello_buffer_sizes() {
        let mut hello = HelloMessage::new("opc.tcp://localhost:4855/", 8192, 8192, 0, 0);
        assert!(hello.is_valid_buffer_sizes());
        hello.receive_buffer_size = 8191;
        assert!(!hello.is_valid_buffer_sizes());
    }

    #[test]
    fn hello_endpoint_url() {
        let mut hello = HelloMessage::new("opc.tcp://localhost:4855/", 8192, 8192, 0, 0);
        assert!(hello.is_endpoint_url_valid());
        hello.endpoint_url = UAString::null();
        assert!(!hello.is_endpoint_url_valid());
        hello.endpoint_url = UAString::from("x".repeat(MAX_ENDPOINT_URL_LENGTH + 1));
        assert!(!hello.is_endpoint_url_valid());
    }

    #[test]
    fn acknowledge_round_trip() {
        let ack = AcknowledgeMessage::new(0, 16384, 16384, 65536, 5);
        let buf = ack.encode_to_vec();
        assert_eq!(buf.len(), ack.message_header.message_size as usize);
        let mut stream = Cursor::new(buf);
        let ack2 = AcknowledgeMessage::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(ack, ack2);
    }

    #[test]
    fn error_message_carries_status() {
        let err = ErrorMessage::from_status_code(StatusCode::BadTcpMessageTooLarge);
        assert_eq!(err.status_code(), StatusCode::BadTcpMessageTooLarge);
    }
}
