// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Enumerations used by the connection services. On the wire OPC UA
//! enumerations are 32 bit signed integers.

use std::fmt;
use std::io::{Read, Write};

use log::warn;

use crate::encoding::{
    read_i32, write_i32, DecodingOptions, EncodingResult, Error, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};

/// The security to apply to messages on a secure channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum MessageSecurityMode {
    /// An invalid or unrecognized mode. Endpoints advertising this are
    /// skipped during selection.
    #[default]
    Invalid = 0,
    /// Messages are neither signed nor encrypted.
    None = 1,
    /// Messages are signed but not encrypted.
    Sign = 2,
    /// Messages are signed and encrypted.
    SignAndEncrypt = 3,
}

impl fmt::Display for MessageSecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageSecurityMode::Invalid => "Invalid",
            MessageSecurityMode::None => "None",
            MessageSecurityMode::Sign => "Sign",
            MessageSecurityMode::SignAndEncrypt => "SignAndEncrypt",
        };
        write!(f, "{}", name)
    }
}

impl From<MessageSecurityMode> for i32 {
    fn from(value: MessageSecurityMode) -> Self {
        value as i32
    }
}

impl From<i32> for MessageSecurityMode {
    fn from(value: i32) -> Self {
        match value {
            1 => MessageSecurityMode::None,
            2 => MessageSecurityMode::Sign,
            3 => MessageSecurityMode::SignAndEncrypt,
            other => {
                // Servers have been observed to advertise garbage here.
                // Treat it as invalid so endpoint selection can skip it.
                warn!("Unrecognized message security mode {}", other);
                MessageSecurityMode::Invalid
            }
        }
    }
}

impl SimpleBinaryEncodable for MessageSecurityMode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl SimpleBinaryDecodable for MessageSecurityMode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(MessageSecurityMode::from(read_i32(stream)?))
    }
}

/// The kind of OPC UA application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ApplicationType {
    /// The application is a server.
    Server = 0,
    /// The application is a client.
    #[default]
    Client = 1,
    /// The application is both.
    ClientAndServer = 2,
    /// The application is a discovery server.
    DiscoveryServer = 3,
}

impl SimpleBinaryEncodable for ApplicationType {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl SimpleBinaryDecodable for ApplicationType {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        match read_i32(stream)? {
            0 => Ok(ApplicationType::Server),
            1 => Ok(ApplicationType::Client),
            2 => Ok(ApplicationType::ClientAndServer),
            3 => Ok(ApplicationType::DiscoveryServer),
            other => Err(Error::decoding(format!(
                "Unrecognized application type {other}"
            ))),
        }
    }
}

/// Whether an OpenSecureChannel request creates a new token or refreshes an
/// existing one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecurityTokenRequestType {
    /// Request a new security token.
    Issue = 0,
    /// Renew the token on an established channel.
    Renew = 1,
}

impl SimpleBinaryEncodable for SecurityTokenRequestType {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl SimpleBinaryDecodable for SecurityTokenRequestType {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        match read_i32(stream)? {
            0 => Ok(SecurityTokenRequestType::Issue),
            1 => Ok(SecurityTokenRequestType::Renew),
            other => Err(Error::decoding(format!(
                "Unrecognized security token request type {other}"
            ))),
        }
    }
}

/// The kind of user identity token a server accepts on an endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UserTokenType {
    /// No credentials at all.
    Anonymous = 0,
    /// User name and password.
    UserName = 1,
    /// An X509v3 certificate.
    Certificate = 2,
    /// A token issued by an external authority.
    IssuedToken = 3,
}

impl SimpleBinaryEncodable for UserTokenType {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i32(stream, *self as i32)
    }
}

impl SimpleBinaryDecodable for UserTokenType {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        match read_i32(stream)? {
            0 => Ok(UserTokenType::Anonymous),
            1 => Ok(UserTokenType::UserName),
            2 => Ok(UserTokenType::Certificate),
            3 => Ok(UserTokenType::IssuedToken),
            other => Err(Error::decoding(format!(
                "Unrecognized user token type {other}"
            ))),
        }
    }
}
