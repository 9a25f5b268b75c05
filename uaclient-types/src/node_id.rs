// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `NodeId`, the identifier of a node in a server's address
//! space. The connection core uses node ids for authentication tokens,
//! session ids and message type ids.

use std::fmt;
use std::io::{Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, DecodingOptions, EncodingResult,
    Error, SimpleBinaryDecodable, SimpleBinaryEncodable,
};
use crate::guid::Guid;
use crate::node_ids::ObjectId;
use crate::string::UAString;

/// The kind of identifier within a node id.
#[derive(Eq, PartialEq, Clone, Debug, Hash)]
pub enum Identifier {
    /// An unsigned numeric identifier.
    Numeric(u32),
    /// A string identifier.
    String(UAString),
    /// A 16 byte guid identifier.
    Guid(Guid),
    /// An opaque byte string identifier.
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::ByteString(v) => write!(f, "b={:?}", v.value),
        }
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Numeric(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::String(UAString::from(value))
    }
}

impl From<UAString> for Identifier {
    fn from(value: UAString) -> Self {
        Identifier::String(value)
    }
}

impl From<Guid> for Identifier {
    fn from(value: Guid) -> Self {
        Identifier::Guid(value)
    }
}

impl From<ByteString> for Identifier {
    fn from(value: ByteString) -> Self {
        Identifier::ByteString(value)
    }
}

/// An identifier of a node in the address space, a namespace index plus an
/// identifier of one of four kinds.
#[derive(Eq, PartialEq, Clone, Debug, Hash)]
pub struct NodeId {
    /// The index of the namespace the identifier belongs to.
    pub namespace: u16,
    /// The identifier itself.
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

// Values of the node id encoding byte.
const ENCODING_TWO_BYTE: u8 = 0x00;
const ENCODING_FOUR_BYTE: u8 = 0x01;
const ENCODING_NUMERIC: u8 = 0x02;
const ENCODING_STRING: u8 = 0x03;
const ENCODING_GUID: u8 = 0x04;
const ENCODING_BYTE_STRING: u8 = 0x05;

impl SimpleBinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        // Type determines the byte length
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    2
                } else if self.namespace <= 255 && *value <= 65535 {
                    4
                } else {
                    7
                }
            }
            Identifier::String(value) => 3 + value.byte_len(),
            Identifier::Guid(value) => 3 + value.byte_len(),
            Identifier::ByteString(value) => 3 + value.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    write_u8(stream, ENCODING_TWO_BYTE)?;
                    write_u8(stream, *value as u8)?;
                } else if self.namespace <= 255 && *value <= 65535 {
                    write_u8(stream, ENCODING_FOUR_BYTE)?;
                    write_u8(stream, self.namespace as u8)?;
                    write_u16(stream, *value as u16)?;
                } else {
                    write_u8(stream, ENCODING_NUMERIC)?;
                    write_u16(stream, self.namespace)?;
                    write_u32(stream, *value)?;
                }
            }
            Identifier::String(value) => {
                write_u8(stream, ENCODING_STRING)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)?;
            }
            Identifier::Guid(value) => {
                write_u8(stream, ENCODING_GUID)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)?;
            }
            Identifier::ByteString(value) => {
                write_u8(stream, ENCODING_BYTE_STRING)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)?;
            }
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let identifier = read_u8(stream)?;
        let node_id = match identifier {
            ENCODING_TWO_BYTE => {
                let value = read_u8(stream)?;
                NodeId::new(0, u32::from(value))
            }
            ENCODING_FOUR_BYTE => {
                let namespace = read_u8(stream)?;
                let value = read_u16(stream)?;
                NodeId::new(u16::from(namespace), u32::from(value))
            }
            ENCODING_NUMERIC => {
                let namespace = read_u16(stream)?;
                let value = read_u32(stream)?;
                NodeId::new(namespace, value)
            }
            ENCODING_STRING => {
                let namespace = read_u16(stream)?;
                let value = UAString::decode(stream, decoding_options)?;
                NodeId::new(namespace, value)
            }
            ENCODING_GUID => {
                let namespace = read_u16(stream)?;
                let value = Guid::decode(stream, decoding_options)?;
                NodeId::new(namespace, value)
            }
            ENCODING_BYTE_STRING => {
                let namespace = read_u16(stream)?;
                let value = ByteString::decode(stream, decoding_options)?;
                NodeId::new(namespace, value)
            }
            _ => {
                return Err(Error::decoding(format!(
                    "Unrecognized node id encoding {identifier}"
                )));
            }
        };
        Ok(node_id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl From<ObjectId> for NodeId {
    fn from(value: ObjectId) -> Self {
        NodeId::new(0, value as u32)
    }
}

impl NodeId {
    /// Construct a node id from a namespace index and anything that can be
    /// turned into an identifier.
    pub fn new<T: Into<Identifier>>(namespace: u16, value: T) -> NodeId {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// The null node id, `ns=0;i=0`.
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// Test if the node id is null. A null authentication token means no
    /// session has been created yet.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Interpret the node id as a well-known object id, e.g. the encoding
    /// id prefixed to a message body.
    pub fn as_object_id(&self) -> Result<ObjectId, ()> {
        match &self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => ObjectId::try_from(*id),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(id: NodeId) {
        let buf = id.encode_to_vec();
        assert_eq!(buf.len(), id.byte_len());
        let mut stream = Cursor::new(buf);
        let id2 = NodeId::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn node_id_round_trips() {
        round_trip(NodeId::null());
        round_trip(NodeId::new(0, 72u32));
        round_trip(NodeId::new(2, 300u32));
        round_trip(NodeId::new(30000, 800_000u32));
        round_trip(NodeId::new(1, "session-1"));
        round_trip(NodeId::new(1, Guid::new()));
        round_trip(NodeId::new(1, ByteString::from(vec![1u8, 2, 3])));
    }

    #[test]
    fn node_id_compact_encodings() {
        // Two byte and four byte forms are picked when the values fit.
        assert_eq!(NodeId::new(0, 255u32).byte_len(), 2);
        assert_eq!(NodeId::new(0, 256u32).byte_len(), 4);
        assert_eq!(NodeId::new(255, 65535u32).byte_len(), 4);
        assert_eq!(NodeId::new(256, 1u32).byte_len(), 7);
    }

    #[test]
    fn object_id_from_node_id() {
        let id: NodeId = ObjectId::GetEndpointsRequestEncodingDefaultBinary.into();
        assert_eq!(
            id.as_object_id().unwrap(),
            ObjectId::GetEndpointsRequestEncodingDefaultBinary
        );
        assert!(NodeId::new(1, "x").as_object_id().is_err());
    }
}
