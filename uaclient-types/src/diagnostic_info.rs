// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `DiagnosticInfo` carried alongside service results.

use std::io::{Read, Write};

use crate::encoding::{
    read_i32, read_u8, write_i32, write_u8, DecodingOptions, EncodingResult,
    SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::status_code::StatusCode;
use crate::string::UAString;

mod mask {
    pub const SYMBOLIC_ID: u8 = 0x01;
    pub const NAMESPACE: u8 = 0x02;
    pub const LOCALIZED_TEXT: u8 = 0x04;
    pub const LOCALE: u8 = 0x08;
    pub const ADDITIONAL_INFO: u8 = 0x10;
    pub const INNER_STATUS_CODE: u8 = 0x20;
    pub const INNER_DIAGNOSTIC_INFO: u8 = 0x40;
}

/// Vendor specific diagnostics returned in response headers and operation
/// results. Every field is optional and its presence is signalled by an
/// encoding mask byte. The indexes refer into the response string table.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DiagnosticInfo {
    /// Index into the string table for the symbolic id.
    pub symbolic_id: Option<i32>,
    /// Index into the string table for the namespace uri.
    pub namespace_uri: Option<i32>,
    /// Index into the string table for the locale.
    pub locale: Option<i32>,
    /// Index into the string table for the localized text.
    pub localized_text: Option<i32>,
    /// Detailed vendor specific diagnostic information.
    pub additional_info: Option<UAString>,
    /// Status code from an underlying system.
    pub inner_status_code: Option<StatusCode>,
    /// Diagnostics from an underlying system.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl SimpleBinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.symbolic_id.map_or(0, |_| 4);
        size += self.namespace_uri.map_or(0, |_| 4);
        size += self.locale.map_or(0, |_| 4);
        size += self.localized_text.map_or(0, |_| 4);
        if let Some(ref info) = self.additional_info {
            size += info.byte_len();
        }
        size += self.inner_status_code.map_or(0, |_| 4);
        if let Some(ref inner) = self.inner_diagnostic_info {
            size += inner.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        if let Some(v) = self.symbolic_id {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.namespace_uri {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.locale {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.localized_text {
            write_i32(stream, v)?;
        }
        if let Some(ref v) = self.additional_info {
            v.encode(stream)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(stream)?;
        }
        if let Some(ref v) = self.inner_diagnostic_info {
            v.encode(stream)?;
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let mut diagnostic_info = DiagnosticInfo::null();
        if encoding_mask & mask::SYMBOLIC_ID != 0 {
            diagnostic_info.symbolic_id = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::NAMESPACE != 0 {
            diagnostic_info.namespace_uri = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::LOCALE != 0 {
            diagnostic_info.locale = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::LOCALIZED_TEXT != 0 {
            diagnostic_info.localized_text = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::ADDITIONAL_INFO != 0 {
            diagnostic_info.additional_info = Some(UAString::decode(stream, decoding_options)?);
        }
        if encoding_mask & mask::INNER_STATUS_CODE != 0 {
            diagnostic_info.inner_status_code =
                Some(StatusCode::decode(stream, decoding_options)?);
        }
        if encoding_mask & mask::INNER_DIAGNOSTIC_INFO != 0 {
            diagnostic_info.inner_diagnostic_info =
                Some(Box::new(DiagnosticInfo::decode(stream, decoding_options)?));
        }
        Ok(diagnostic_info)
    }
}

impl DiagnosticInfo {
    /// A diagnostic info with no content at all.
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }

    fn encoding_mask(&self) -> u8 {
        let mut encoding_mask = 0;
        if self.symbolic_id.is_some() {
            encoding_mask |= mask::SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            encoding_mask |= mask::NAMESPACE;
        }
        if self.locale.is_some() {
            encoding_mask |= mask::LOCALE;
        }
        if self.localized_text.is_some() {
            encoding_mask |= mask::LOCALIZED_TEXT;
        }
        if self.additional_info.is_some() {
            encoding_mask |= mask::ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            encoding_mask |= mask::INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            encoding_mask |= mask::INNER_DIAGNOSTIC_INFO;
        }
        encoding_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn diagnostic_info_round_trip() {
        let d = DiagnosticInfo {
            symbolic_id: Some(3),
            additional_info: Some(UAString::from("it broke")),
            inner_status_code: Some(StatusCode::BadInternalError),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                locale: Some(1),
                ..Default::default()
            })),
            ..Default::default()
        };
        let buf = d.encode_to_vec();
        assert_eq!(buf.len(), d.byte_len());
        let mut stream = Cursor::new(buf);
        let d2 = DiagnosticInfo::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn diagnostic_info_null_is_one_byte() {
        assert_eq!(DiagnosticInfo::null().encode_to_vec(), vec![0u8]);
    }
}
