// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::io::{Read, Write};

use log::debug;
use uaclient_types::*;

use crate::comms::message_chunk::MessageChunkType;

use super::{Message, MessageType};

macro_rules! response_enum {
    ($($name:ident: $value:ident; $enc:ident),*,) => {
        /// A response message the client can receive.
        #[derive(Debug, PartialEq, Clone)]
        pub enum ResponseMessage {
            $(
                #[allow(missing_docs)]
                $name(Box<$value>),
            )*
        }
        $(
            impl From<$value> for ResponseMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*
        impl SimpleBinaryEncodable for ResponseMessage {
            fn byte_len(&self) -> usize {
                match self {
                    $( Self::$name(value) => value.byte_len(), )*
                }
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                match self {
                    $( Self::$name(value) => value.encode(stream), )*
                }
            }
        }

        impl ResponseMessage {
            /// The common response header.
            pub fn response_header(&self) -> &ResponseHeader {
                match self {
                    $( Self::$name(value) => &value.response_header, )*
                }
            }
        }

        impl Message for ResponseMessage {
            fn request_handle(&self) -> u32 {
                self.response_header().request_handle
            }

            fn decode_by_object_id<S: Read>(
                stream: &mut S,
                object_id: ObjectId,
                decoding_options: &DecodingOptions,
            ) -> EncodingResult<Self> {
                match object_id {
                    $( ObjectId::$enc => {
                        Ok($value::decode(stream, decoding_options)?.into())
                    }, )*
                    _ => {
                        debug!("decoding unsupported for object id {:?}", object_id);
                        Err(Error::decoding(format!(
                            "decoding unsupported for object id {:?}",
                            object_id
                        )))
                    }
                }
            }

            fn type_id(&self) -> NodeId {
                match self {
                    $( Self::$name(value) => value.type_id().into(), )*
                }
            }
        }
    };
}

impl MessageType for ResponseMessage {
    fn message_type(&self) -> MessageChunkType {
        match self {
            Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
            Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
            _ => MessageChunkType::Message,
        }
    }
}

response_enum! {
    OpenSecureChannel: OpenSecureChannelResponse; OpenSecureChannelResponseEncodingDefaultBinary,
    CloseSecureChannel: CloseSecureChannelResponse; CloseSecureChannelResponseEncodingDefaultBinary,
    GetEndpoints: GetEndpointsResponse; GetEndpointsResponseEncodingDefaultBinary,
    CreateSession: CreateSessionResponse; CreateSessionResponseEncodingDefaultBinary,
    ActivateSession: ActivateSessionResponse; ActivateSessionResponseEncodingDefaultBinary,
    CloseSession: CloseSessionResponse; CloseSessionResponseEncodingDefaultBinary,
    ServiceFault: ServiceFault; ServiceFaultEncodingDefaultBinary,
}
