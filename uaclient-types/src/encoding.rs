// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the binary encoding traits and helpers for reading and writing
//! scalar values and other primitives.

use std::{
    error::Error as StdError,
    fmt::{Debug, Display},
    io::{Cursor, Read, Result, Write},
};

use byteorder::{ByteOrder, LittleEndian};
use log::error;

use crate::{constants, status_code::StatusCode};

/// Result of an encoding or decoding operation.
pub type EncodingResult<T> = std::result::Result<T, Error>;

/// General OPC UA error.
///
/// Contains context about the request this error occurred as part of, if that
/// is possible to retrieve, as well as details about the error that caused
/// this, and a status code.
#[derive(Debug)]
pub struct Error {
    status: StatusCode,
    request_id: Option<u32>,
    request_handle: Option<u32>,
    context: Box<dyn StdError + Send + Sync>,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status(), self.context)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.context)
    }
}

impl Error {
    /// Create a new error with the specified `status` code and
    /// `context` as a dynamic error source.
    pub fn new(status: StatusCode, context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            status,
            request_handle: None,
            request_id: None,
            context: context.into(),
        }
    }

    /// Create a new error with status code `BadDecodingError` and
    /// `context` as a dynamic error source.
    pub fn decoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadDecodingError, context)
    }

    /// Create a new error with status code `BadEncodingError` and
    /// `context` as a dynamic error source.
    pub fn encoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadEncodingError, context)
    }

    /// Add request ID and request handle to this error.
    pub fn with_context(mut self, request_id: Option<u32>, request_handle: Option<u32>) -> Self {
        self.request_id = request_id;
        self.request_handle = request_handle;
        self
    }

    /// Add request ID to this error.
    pub fn with_request_id(mut self, id: u32) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Add request handle to this error.
    pub fn with_request_handle(mut self, handle: u32) -> Self {
        self.request_handle = Some(handle);
        self
    }

    /// Get the inner status code of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the full context of this error, if both fields are present.
    pub fn full_context(&self) -> Option<(u32, u32)> {
        if let (Some(id), Some(handle)) = (self.request_id, self.request_handle) {
            Some((id, handle))
        } else {
            None
        }
    }
}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        error!("{}", value);
        value.status()
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        value.status().into()
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::decoding(value)
    }
}

impl From<StatusCode> for Error {
    fn from(value: StatusCode) -> Self {
        Self::new(value, value.to_string())
    }
}

/// General decoding options.
#[derive(Clone, Debug)]
pub struct DecodingOptions {
    /// Time offset between the client and the server, only used by the client
    /// when it's configured to ignore time skew.
    pub client_offset: chrono::Duration,
    /// Maximum size of a message in bytes. 0 means no limit.
    pub max_message_size: usize,
    /// Maximum number of chunks. 0 means no limit.
    pub max_chunk_count: usize,
    /// Maximum length in bytes (not chars!) of a string. 0 actually means 0,
    /// i.e. no string permitted.
    pub max_string_length: usize,
    /// Maximum length in bytes of a byte string.
    pub max_byte_string_length: usize,
    /// Maximum number of array elements.
    pub max_array_length: usize,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        DecodingOptions {
            client_offset: chrono::Duration::zero(),
            max_message_size: constants::MAX_MESSAGE_SIZE,
            max_chunk_count: constants::MAX_CHUNK_COUNT,
            max_string_length: constants::MAX_STRING_LENGTH,
            max_byte_string_length: constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: constants::MAX_ARRAY_LENGTH,
        }
    }
}

impl DecodingOptions {
    /// This can be useful for decoding extension objects where the payload
    /// is not expected to contain a large value.
    pub fn minimal() -> Self {
        DecodingOptions {
            max_string_length: 8192,
            max_byte_string_length: 8192,
            max_array_length: 8192,
            ..Default::default()
        }
    }

    /// For test only. Having a separate function makes it easier to control
    /// calls to DecodingOptions::default().
    pub fn test() -> Self {
        Self::default()
    }
}

/// OPC UA binary encoding interface. Anything that encodes to binary must
/// implement this. It provides functions to calculate the size in bytes of
/// the struct (for allocating memory), and encoding to a stream.
///
/// `byte_len` must return a length exactly equal to what `encode` will
/// write, or `encode` must be guaranteed to fail.
pub trait SimpleBinaryEncodable {
    /// Returns the exact byte length of the structure as it would be if
    /// `encode` were called.
    fn byte_len(&self) -> usize;

    /// Encodes the instance to the write stream.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()>;

    /// Convenience method for encoding a message straight into an array of
    /// bytes. It is preferable to reuse buffers than to call this so it
    /// should be reserved for tests and trivial code.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::with_capacity(self.byte_len()));
        let _ = self.encode(&mut buffer);
        buffer.into_inner()
    }
}

/// Trait for decoding a type from OPC UA binary.
pub trait SimpleBinaryDecodable: Sized {
    /// Decodes an instance from the read stream. The decoding options
    /// contains restrictions set by the server / client on the length of
    /// strings, arrays etc. If these limits are exceeded the implementation
    /// should return a `BadDecodingError` as soon as possible.
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self>;
}

/// Converts an IO encoding error into an EncodingResult.
pub fn process_encode_io_result(result: Result<()>) -> EncodingResult<()> {
    result.map_err(Error::encoding)
}

/// Converts an IO decoding error into an EncodingResult.
pub fn process_decode_io_result<T>(result: Result<T>) -> EncodingResult<T>
where
    T: Debug,
{
    result.map_err(Error::decoding)
}

impl<T> SimpleBinaryEncodable for Option<Vec<T>>
where
    T: SimpleBinaryEncodable,
{
    fn byte_len(&self) -> usize {
        let mut size = 4;
        if let Some(ref values) = self {
            size += values.iter().map(|v| v.byte_len()).sum::<usize>();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        if let Some(ref values) = self {
            write_i32(stream, values.len() as i32)?;
            for value in values.iter() {
                value.encode(stream)?;
            }
        } else {
            write_i32(stream, -1)?;
        }
        Ok(())
    }
}

impl<T> SimpleBinaryDecodable for Option<Vec<T>>
where
    T: SimpleBinaryDecodable,
{
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Option<Vec<T>>> {
        let len = read_i32(stream)?;
        if len == -1 {
            Ok(None)
        } else if len < -1 {
            Err(Error::decoding(
                "Array length is negative value and invalid",
            ))
        } else if len as usize > decoding_options.max_array_length {
            Err(Error::decoding(format!(
                "Array length {} exceeds decoding limit {}",
                len, decoding_options.max_array_length
            )))
        } else {
            let mut values: Vec<T> = Vec::with_capacity(len as usize);
            for _ in 0..len {
                values.push(T::decode(stream, decoding_options)?);
            }
            Ok(Some(values))
        }
    }
}

/// Writes a series of identical bytes to the stream.
pub fn write_bytes<W: Write + ?Sized>(
    stream: &mut W,
    value: u8,
    count: usize,
) -> EncodingResult<usize> {
    for _ in 0..count {
        write_u8(stream, value)?;
    }
    Ok(count)
}

/// Writes an unsigned byte to the stream.
pub fn write_u8<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<u8>,
{
    let buf: [u8; 1] = [value.into()];
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes a signed 16-bit value to the stream.
pub fn write_i16<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<i16>,
{
    let mut buf = [0u8; 2];
    LittleEndian::write_i16(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes an unsigned 16-bit value to the stream.
pub fn write_u16<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<u16>,
{
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes a signed 32-bit value to the stream.
pub fn write_i32<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<i32>,
{
    let mut buf = [0u8; 4];
    LittleEndian::write_i32(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes an unsigned 32-bit value to the stream.
pub fn write_u32<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<u32>,
{
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes a signed 64-bit value to the stream.
pub fn write_i64<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<i64>,
{
    let mut buf = [0u8; 8];
    LittleEndian::write_i64(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes an unsigned 64-bit value to the stream.
pub fn write_u64<T, W: Write + ?Sized>(stream: &mut W, value: T) -> EncodingResult<()>
where
    T: Into<u64>,
{
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, value.into());
    process_encode_io_result(stream.write_all(&buf))
}

/// Writes a 64-bit float to the stream.
pub fn write_f64<W: Write + ?Sized>(stream: &mut W, value: f64) -> EncodingResult<()> {
    let mut buf = [0u8; 8];
    LittleEndian::write_f64(&mut buf, value);
    process_encode_io_result(stream.write_all(&buf))
}

/// Reads an array of bytes from the stream.
pub fn read_bytes<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> EncodingResult<usize> {
    process_decode_io_result(stream.read_exact(buf))?;
    Ok(buf.len())
}

/// Reads a single byte from the stream.
pub fn read_u8<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<u8> {
    let mut buf = [0u8];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(buf[0])
}

/// Reads a signed 16-bit value from the stream.
pub fn read_i16<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<i16> {
    let mut buf = [0u8; 2];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_i16(&buf))
}

/// Reads an unsigned 16-bit value from the stream.
pub fn read_u16<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<u16> {
    let mut buf = [0u8; 2];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_u16(&buf))
}

/// Reads a signed 32-bit value from the stream.
pub fn read_i32<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<i32> {
    let mut buf = [0u8; 4];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_i32(&buf))
}

/// Reads an unsigned 32-bit value from the stream.
pub fn read_u32<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<u32> {
    let mut buf = [0u8; 4];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_u32(&buf))
}

/// Reads a signed 64-bit value from the stream.
pub fn read_i64<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<i64> {
    let mut buf = [0u8; 8];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_i64(&buf))
}

/// Reads an unsigned 64-bit value from the stream.
pub fn read_u64<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<u64> {
    let mut buf = [0u8; 8];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_u64(&buf))
}

/// Reads a 64-bit float from the stream.
pub fn read_f64<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<f64> {
    let mut buf = [0u8; 8];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(LittleEndian::read_f64(&buf))
}
