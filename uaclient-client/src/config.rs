use std::path::PathBuf;
use std::time::Duration;

use uaclient_core::config::Config;
use uaclient_types::{
    ApplicationType, EndpointDescription, MessageSecurityMode, UAString, UserTokenPolicy,
};

/// The user identity a session is activated with.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum IdentityToken {
    /// No identity at all.
    Anonymous,
    /// User name and password.
    UserName(String, String),
    /// Paths to an X509 certificate and the matching private key.
    X509(PathBuf, PathBuf),
    /// A token issued by an external authority.
    IssuedToken(Vec<u8>),
}

impl Default for IdentityToken {
    fn default() -> Self {
        IdentityToken::Anonymous
    }
}

/// Sizes and counts bounding what the transport will accept or send.
/// These are the client's opening position in the HELLO, the server's
/// ACKNOWLEDGE revises them down.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransportLimits {
    /// Largest chunk sent to the server.
    pub max_chunk_size: usize,
    /// Largest chunk accepted from the server.
    pub max_incoming_chunk_size: usize,
    /// Largest whole message, either direction. 0 means no limit.
    pub max_message_size: usize,
    /// Most chunks per message. 0 means no limit.
    pub max_chunk_count: usize,
    /// Most decoded-but-unassembled incoming chunks held at once.
    pub max_pending_incoming: usize,
}

impl Default for TransportLimits {
    fn default() -> Self {
        TransportLimits {
            max_chunk_size: 65535,
            max_incoming_chunk_size: 65535,
            max_message_size: 2 << 20,
            max_chunk_count: 64,
            max_pending_incoming: 5,
        }
    }
}

/// Client configuration. This is what `connect` consults to decide whether
/// to run endpoint discovery, which endpoints qualify and how long each
/// phase of connection establishment may take.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientConfig {
    /// Name of the client application.
    pub application_name: String,
    /// URI of the client application. Should match the URI in the
    /// application certificate, a mismatch is logged.
    pub application_uri: String,
    /// URI of the product.
    pub product_uri: String,
    /// Human readable name for created sessions.
    pub session_name: String,
    /// Preferred locales in priority order.
    pub preferred_locales: Vec<String>,
    /// Desired security policy URI. Empty accepts any policy the client
    /// has locally available.
    pub security_policy_uri: String,
    /// Desired security mode. `Invalid` accepts any valid mode.
    pub security_mode: MessageSecurityMode,
    /// The user identity to activate sessions with.
    pub user_identity_token: IdentityToken,
    /// Pre-selected endpoint. When absent, endpoint discovery runs during
    /// connect and fills this in.
    pub endpoint: Option<EndpointDescription>,
    /// Pre-selected user token policy, filled in by discovery when absent.
    pub user_token_policy: Option<UserTokenPolicy>,
    /// Requested secure channel token lifetime in milliseconds.
    pub secure_channel_lifetime: u32,
    /// Deadline applied to each connection phase: the ACK wait, the OPN
    /// response wait and session establishment each get this budget anew.
    pub request_timeout: Duration,
    /// Requested session timeout in milliseconds.
    pub session_timeout: u32,
    /// Transport limits proposed in the HELLO.
    pub transport_limits: TransportLimits,
    /// Path to the DER encoded application certificate, if any.
    pub certificate_path: Option<PathBuf>,
    /// Path to the PEM encoded application private key, if any.
    pub private_key_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            application_name: "UAClient".to_string(),
            application_uri: "urn:UAClient".to_string(),
            product_uri: "urn:UAClient".to_string(),
            session_name: "UAClient session".to_string(),
            preferred_locales: Vec::new(),
            security_policy_uri: String::new(),
            security_mode: MessageSecurityMode::Invalid,
            user_identity_token: IdentityToken::Anonymous,
            endpoint: None,
            user_token_policy: None,
            secure_channel_lifetime: 60_000,
            request_timeout: Duration::from_secs(5),
            session_timeout: 60_000,
            transport_limits: TransportLimits::default(),
            certificate_path: None,
            private_key_path: None,
        }
    }
}

impl Config for ClientConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.application_name.is_empty() {
            errors.push("Application name is empty".to_string());
        }
        if self.application_uri.is_empty() {
            errors.push("Application uri is empty".to_string());
        }
        if self.session_name.is_empty() {
            errors.push("Session name is empty".to_string());
        }
        if self.secure_channel_lifetime == 0 {
            errors.push("Secure channel lifetime is 0".to_string());
        }
        if self.request_timeout.is_zero() {
            errors.push("Request timeout is 0".to_string());
        }
        if !self.security_policy_uri.is_empty()
            && uaclient_crypto::SecurityPolicy::from_uri(&self.security_policy_uri)
                == uaclient_crypto::SecurityPolicy::Unknown
        {
            errors.push(format!(
                "Security policy uri \"{}\" is unrecognized",
                self.security_policy_uri
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn application_name(&self) -> UAString {
        UAString::from(&self.application_name)
    }

    fn application_uri(&self) -> UAString {
        UAString::from(&self.application_uri)
    }

    fn product_uri(&self) -> UAString {
        UAString::from(&self.product_uri)
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_policy_uri_is_rejected() {
        let config = ClientConfig {
            security_policy_uri: "http://example.org/NotAPolicy".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
