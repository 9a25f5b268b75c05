// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `LocalizedText`, human readable text with an optional locale.

use std::fmt;
use std::io::{Read, Write};

use crate::encoding::{
    read_u8, write_u8, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::string::UAString;

/// A human readable qualified with a locale.
#[derive(PartialEq, Eq, Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LocalizedText {
    /// The locale, e.g. "en-US".
    pub locale: UAString,
    /// The text in the given locale.
    pub text: UAString,
}

impl SimpleBinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if !self.locale.is_null() {
            size += self.locale.byte_len();
        }
        if !self.text.is_null() {
            size += self.text.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // An encoding mask tells the receiver which of the fields follow.
        let mut encoding_mask: u8 = 0;
        if !self.locale.is_null() {
            encoding_mask |= 0x1;
        }
        if !self.text.is_null() {
            encoding_mask |= 0x2;
        }
        write_u8(stream, encoding_mask)?;
        if !self.locale.is_null() {
            self.locale.encode(stream)?;
        }
        if !self.text.is_null() {
            self.text.encode(stream)?;
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for LocalizedText {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let locale = if encoding_mask & 0x1 != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        let text = if encoding_mask & 0x2 != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl<'a> From<&'a str> for LocalizedText {
    fn from(value: &'a str) -> Self {
        Self {
            locale: UAString::null(),
            text: UAString::from(value),
        }
    }
}

impl LocalizedText {
    /// Create a localized text from a locale and a text.
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText {
            locale: UAString::from(locale),
            text: UAString::from(text),
        }
    }

    /// The null localized text.
    pub fn null() -> LocalizedText {
        LocalizedText {
            locale: UAString::null(),
            text: UAString::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn localized_text_round_trip() {
        for lt in [
            LocalizedText::new("en", "A simple OPC UA client"),
            LocalizedText::from("no locale"),
            LocalizedText::null(),
        ] {
            let buf = lt.encode_to_vec();
            assert_eq!(buf.len(), lt.byte_len());
            let mut stream = Cursor::new(buf);
            let lt2 = LocalizedText::decode(&mut stream, &DecodingOptions::test()).unwrap();
            assert_eq!(lt, lt2);
        }
    }
}
