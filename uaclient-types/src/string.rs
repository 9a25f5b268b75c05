// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `String`, which is either null or a UTF-8 string.

use std::fmt;
use std::io::{Read, Write};

use crate::encoding::{
    process_decode_io_result, read_i32, write_i32, DecodingOptions, EncodingResult, Error,
    SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// To avoid naming conflicts with the Rust `String` this type is named
/// `UAString`. An OPC UA string can be null, which is distinct from empty.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct UAString {
    /// The string value. `None` is the null string.
    pub value: Option<String>,
}

impl SimpleBinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        // Length plus the actual string length in bytes
        4 + match self.value {
            Some(ref v) => v.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // Strings are uint32 length followed by utf8-encoded characters.
        match self.value {
            None => write_i32(stream, -1),
            Some(ref v) => {
                write_i32(stream, v.len() as i32)?;
                crate::encoding::process_encode_io_result(stream.write_all(v.as_bytes()))
            }
        }
    }
}

impl SimpleBinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        // Null string?
        if len == -1 {
            Ok(UAString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "String buf length is a negative number {len}"
            )))
        } else if len as usize > decoding_options.max_string_length {
            Err(Error::decoding(format!(
                "String buf length {} exceeds decoding limit {}",
                len, decoding_options.max_string_length
            )))
        } else {
            // Create the actual UTF8 string
            let mut string_buf: Vec<u8> = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut string_buf))?;
            let value = String::from_utf8(string_buf)
                .map_err(|e| Error::decoding(format!("String buf is not valid UTF-8: {e}")))?;
            Ok(UAString::from(value))
        }
    }
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref value) = self.value {
            write!(f, "{}", value)
        } else {
            write!(f, "[null]")
        }
    }
}

impl From<UAString> for String {
    fn from(value: UAString) -> Self {
        value.as_ref().to_string()
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        if self.is_null() {
            ""
        } else {
            self.value.as_ref().unwrap()
        }
    }
}

impl<'a> From<&'a str> for UAString {
    fn from(value: &'a str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        Self {
            value: Some(value.clone()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl From<Option<String>> for UAString {
    fn from(value: Option<String>) -> Self {
        Self { value }
    }
}

impl UAString {
    /// Get the inner value.
    pub fn value(&self) -> &Option<String> {
        &self.value
    }

    /// Returns true if the string is null or empty, false otherwise.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() || self.value.as_ref().is_some_and(|v| v.is_empty())
    }

    /// Returns the length of the string in bytes or -1 for null.
    pub fn len(&self) -> isize {
        if self.value.is_none() {
            -1
        } else {
            self.value.as_ref().unwrap().len() as isize
        }
    }

    /// Create a null string (not the same as an empty string).
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// Test if the string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn string_null() {
        let s = UAString::null();
        assert!(s.is_null());
        assert!(s.is_empty());
        assert_eq!(s.len(), -1);
        assert_eq!(s.as_ref(), "");
    }

    #[test]
    fn string_round_trip() {
        let s = UAString::from("opc.tcp://localhost:4855/");
        let buf = s.encode_to_vec();
        assert_eq!(buf.len(), s.byte_len());
        let mut stream = Cursor::new(buf);
        let s2 = UAString::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn string_exceeds_limits() {
        let options = DecodingOptions {
            max_string_length: 4,
            ..DecodingOptions::test()
        };
        let buf = UAString::from("too long").encode_to_vec();
        let mut stream = Cursor::new(buf);
        assert!(UAString::decode(&mut stream, &options).is_err());
    }
}
