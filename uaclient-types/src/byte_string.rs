// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `ByteString`, an arbitrary sequence of octets or null.

use std::io::{Read, Write};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// A sequence of octets. Unlike a string, the contents need not be valid
/// UTF-8, and like a string the value can be null.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct ByteString {
    /// The raw octets, `None` is the null byte string.
    pub value: Option<Vec<u8>>,
}

impl SimpleBinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + match self.value {
            Some(ref v) => v.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self.value {
            None => write_i32(stream, -1),
            Some(ref v) => {
                write_i32(stream, v.len() as i32)?;
                process_encode_io_result(stream.write_all(v))
            }
        }
    }
}

impl SimpleBinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            Ok(ByteString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "ByteString length is a negative number {len}"
            )))
        } else if len as usize > decoding_options.max_byte_string_length {
            Err(Error::decoding(format!(
                "ByteString length {} exceeds decoding limit {}",
                len, decoding_options.max_byte_string_length
            )))
        } else {
            let mut data: Vec<u8> = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut data))?;
            Ok(ByteString { value: Some(data) })
        }
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        if self.value.is_none() {
            &[]
        } else {
            self.value.as_ref().unwrap()
        }
    }
}

impl<'a> From<&'a [u8]> for ByteString {
    fn from(value: &'a [u8]) -> Self {
        ByteString {
            value: Some(value.to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

impl From<&Vec<u8>> for ByteString {
    fn from(value: &Vec<u8>) -> Self {
        ByteString {
            value: Some(value.clone()),
        }
    }
}

impl ByteString {
    /// Create a null byte string (not the same as an empty byte string).
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    /// Test if the byte string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Test if the byte string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() || self.value.as_ref().is_some_and(|v| v.is_empty())
    }

    /// Copy the contents into a plain `Vec<u8>`, empty for null.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn byte_string_round_trip() {
        let b = ByteString::from(vec![0x01u8, 0x02, 0x03, 0xff]);
        let buf = b.encode_to_vec();
        assert_eq!(buf.len(), b.byte_len());
        let mut stream = Cursor::new(buf);
        let b2 = ByteString::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(b, b2);
    }

    #[test]
    fn byte_string_null() {
        let b = ByteString::null();
        assert!(b.is_null());
        assert!(b.is_empty());
        assert_eq!(b.byte_len(), 4);
    }
}
