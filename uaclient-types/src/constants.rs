// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Constants governing decoding limits and well known protocol values.

/// Maximum size of a message in bytes accepted by default.
pub const MAX_MESSAGE_SIZE: usize = 2 << 20;
/// Maximum number of chunks in a message accepted by default. 0 means no limit.
pub const MAX_CHUNK_COUNT: usize = 5;
/// Default maximum string length in bytes.
pub const MAX_STRING_LENGTH: usize = 65535;
/// Default maximum byte string length in bytes.
pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
/// Default maximum number of array elements.
pub const MAX_ARRAY_LENGTH: usize = 1000;
/// Maximum size of a certificate in a security header.
pub const MAX_CERTIFICATE_LENGTH: usize = 32768;
/// URI of the binary transport profile, the only one this stack speaks.
pub const PROFILE_TRANSPORT_BINARY: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";
