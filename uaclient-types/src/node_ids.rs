// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Well-known numeric node ids in namespace 0. Only the ids the connection
//! stack actually exchanges are listed.

macro_rules! object_ids {
    ($($name:ident = $value:expr),*,) => {
        /// The default binary encoding ids of the messages and structures
        /// this stack can send or receive.
        #[allow(clippy::enum_variant_names)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum ObjectId {
            $(
                #[allow(missing_docs)]
                $name = $value,
            )*
        }

        impl TryFrom<u32> for ObjectId {
            type Error = ();

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$name), )*
                    _ => Err(()),
                }
            }
        }
    };
}

object_ids! {
    AnonymousIdentityTokenEncodingDefaultBinary = 321,
    UserNameIdentityTokenEncodingDefaultBinary = 324,
    X509IdentityTokenEncodingDefaultBinary = 327,
    IssuedIdentityTokenEncodingDefaultBinary = 940,
    ServiceFaultEncodingDefaultBinary = 397,
    GetEndpointsRequestEncodingDefaultBinary = 428,
    GetEndpointsResponseEncodingDefaultBinary = 431,
    OpenSecureChannelRequestEncodingDefaultBinary = 446,
    OpenSecureChannelResponseEncodingDefaultBinary = 449,
    CloseSecureChannelRequestEncodingDefaultBinary = 452,
    CloseSecureChannelResponseEncodingDefaultBinary = 455,
    CreateSessionRequestEncodingDefaultBinary = 461,
    CreateSessionResponseEncodingDefaultBinary = 464,
    ActivateSessionRequestEncodingDefaultBinary = 467,
    ActivateSessionResponseEncodingDefaultBinary = 470,
    CloseSessionRequestEncodingDefaultBinary = 473,
    CloseSessionResponseEncodingDefaultBinary = 476,
}

impl TryFrom<&crate::node_id::NodeId> for ObjectId {
    type Error = ();

    fn try_from(value: &crate::node_id::NodeId) -> Result<Self, Self::Error> {
        value.as_object_id()
    }
}
