// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `Guid`, a 16 byte universally unique identifier.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use uuid::Uuid;

use crate::encoding::{
    process_decode_io_result, read_u16, read_u32, write_u16, write_u32, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// A 16 byte value that can be used as a globally unique identifier.
#[derive(Eq, PartialEq, Clone, Hash, Default)]
pub struct Guid {
    uuid: Uuid,
}

impl SimpleBinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The first three fields are little-endian, the last eight bytes raw.
        let (data1, data2, data3, data4) = self.uuid.as_fields();
        write_u32(stream, data1)?;
        write_u16(stream, data2)?;
        write_u16(stream, data3)?;
        crate::encoding::process_encode_io_result(stream.write_all(data4))
    }
}

impl SimpleBinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let data1 = read_u32(stream)?;
        let data2 = read_u16(stream)?;
        let data3 = read_u16(stream)?;
        let mut data4 = [0u8; 8];
        process_decode_io_result(stream.read_exact(&mut data4))?;
        Ok(Guid {
            uuid: Uuid::from_fields(data1, data2, data3, &data4),
        })
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(|uuid| Guid { uuid })
            .map_err(|e| Error::decoding(format!("Cannot parse uuid: {e}")))
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid { uuid }
    }
}

impl Guid {
    /// Return a null guid, i.e. 00000000-0000-0000-0000-000000000000.
    pub fn null() -> Guid {
        Guid { uuid: Uuid::nil() }
    }

    /// Test if the guid is null.
    pub fn is_null(&self) -> bool {
        self.uuid.is_nil()
    }

    /// Return a new random guid.
    pub fn new() -> Guid {
        Guid {
            uuid: Uuid::new_v4(),
        }
    }

    /// Return the bytes of the guid.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.uuid.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn guid_round_trip() {
        let g = Guid::new();
        let buf = g.encode_to_vec();
        assert_eq!(buf.len(), 16);
        let mut stream = Cursor::new(buf);
        let g2 = Guid::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(g, g2);
    }
}
