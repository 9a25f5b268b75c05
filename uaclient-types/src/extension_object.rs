// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `ExtensionObject`, a container for any structured value
//! together with the node id identifying its type and encoding.

use std::io::{Cursor, Read, Write};

use crate::byte_string::ByteString;
use crate::encoding::{
    read_u8, write_u8, DecodingOptions, EncodingResult, Error, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};
use crate::node_id::NodeId;
use crate::node_ids::ObjectId;

/// Trait for structures that know their default binary encoding id. Used to
/// wrap values into extension objects.
pub trait MessageInfo {
    /// The default binary encoding id of this type.
    fn type_id(&self) -> ObjectId;
}

/// A structure carried with the node id of its encoding. The body is kept as
/// raw bytes until the receiver decides how to decode it.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ExtensionObject {
    /// Node id of the body's encoding, null when there is no body.
    pub node_id: NodeId,
    /// The encoded body, `None` when absent.
    pub body: Option<ByteString>,
}

impl SimpleBinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len() + 1;
        if let Some(ref body) = self.body {
            size += body.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.node_id.encode(stream)?;
        match &self.body {
            Some(body) => {
                // 0x01 indicates a byte string body follows.
                write_u8(stream, 0x01u8)?;
                body.encode(stream)?;
            }
            None => write_u8(stream, 0x00u8)?,
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let node_id = NodeId::decode(stream, decoding_options)?;
        let encoding = read_u8(stream)?;
        let body = match encoding {
            0x00 => None,
            0x01 => Some(ByteString::decode(stream, decoding_options)?),
            other => {
                // XML bodies (0x02) are not spoken on the binary transport.
                return Err(Error::decoding(format!(
                    "Unsupported extension object encoding {other}"
                )));
            }
        };
        Ok(ExtensionObject { node_id, body })
    }
}

impl ExtensionObject {
    /// An extension object with no body.
    pub fn null() -> ExtensionObject {
        ExtensionObject::default()
    }

    /// Test if the extension object has no body.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.body.is_none()
    }

    /// Wrap an encodable value into an extension object, tagging it with its
    /// binary encoding id.
    pub fn from_message<T>(value: &T) -> ExtensionObject
    where
        T: SimpleBinaryEncodable + MessageInfo,
    {
        ExtensionObject {
            node_id: value.type_id().into(),
            body: Some(ByteString::from(value.encode_to_vec())),
        }
    }

    /// Decode the body as the given type. Fails if there is no body.
    pub fn decode_inner<T>(&self, decoding_options: &DecodingOptions) -> EncodingResult<T>
    where
        T: SimpleBinaryDecodable,
    {
        let Some(ref body) = self.body else {
            return Err(Error::decoding("Extension object has no body"));
        };
        let mut stream = Cursor::new(body.as_ref());
        T::decode(&mut stream, decoding_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn extension_object_round_trip() {
        for eo in [
            ExtensionObject::null(),
            ExtensionObject {
                node_id: NodeId::new(0, 321u32),
                body: Some(ByteString::from(vec![0xff, 0xff, 0xff, 0xff])),
            },
        ] {
            let buf = eo.encode_to_vec();
            assert_eq!(buf.len(), eo.byte_len());
            let mut stream = Cursor::new(buf);
            let eo2 = ExtensionObject::decode(&mut stream, &DecodingOptions::test()).unwrap();
            assert_eq!(eo, eo2);
        }
    }
}
