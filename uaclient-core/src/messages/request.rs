// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::io::{Read, Write};

use log::debug;
use uaclient_types::*;

use crate::comms::message_chunk::MessageChunkType;

use super::{Message, MessageType};

macro_rules! request_enum {
    ($($name:ident: $value:ident; $enc:ident),*,) => {
        /// A request message the client can send.
        #[derive(Debug, PartialEq, Clone)]
        pub enum RequestMessage {
            $(
                #[allow(missing_docs)]
                $name(Box<$value>),
            )*
        }
        $(
            impl From<$value> for RequestMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*
        impl SimpleBinaryEncodable for RequestMessage {
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

        impl RequestMessage {
            /// The common request header.
            pub fn request_header(&self) -> &RequestHeader {
                match self {
                    $( Self::$name(value) => &value.request_header, )*
                }
            }
        }

        impl Message for RequestMessage {
            fn request_handle(&self) -> u32 {
                self.request_header().request_handle
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

impl MessageType for RequestMessage {
    fn message_type(&self) -> MessageChunkType {
        match self {
            Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
            Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
            _ => MessageChunkType::Message,
        }
    }
}

request_enum! {
    OpenSecureChannel: OpenSecureChannelRequest; OpenSecureChannelRequestEncodingDefaultBinary,
    CloseSecureChannel: CloseSecureChannelRequest; CloseSecureChannelRequestEncodingDefaultBinary,
    GetEndpoints: GetEndpointsRequest; GetEndpointsRequestEncodingDefaultBinary,
    CreateSession: CreateSessionRequest; CreateSessionRequestEncodingDefaultBinary,
    ActivateSession: ActivateSessionRequest; ActivateSessionRequestEncodingDefaultBinary,
    CloseSession: CloseSessionRequest; CloseSessionRequestEncodingDefaultBinary,
}
