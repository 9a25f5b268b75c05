use std::path::PathBuf;
use std::time::Duration;

use log::error;
use uaclient_core::config::{Config, ConfigError};
use uaclient_types::{EndpointDescription, MessageSecurityMode, UserTokenPolicy};

use crate::{Client, ClientConfig, IdentityToken};

/// Client builder.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a `ClientBuilder`.
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a `ClientBuilder` using a configuration file as the initial state.
    pub fn from_config(path: impl Into<PathBuf>) -> Result<ClientBuilder, ConfigError> {
        Ok(ClientBuilder {
            config: ClientConfig::load(&path.into())?,
        })
    }

    /// Yields a [`Client`] from the values set by the builder. If the
    /// builder is not in a valid state it will return a list of errors.
    pub fn client(self) -> Result<Client, Vec<String>> {
        if let Err(e) = self.config.validate() {
            for err in &e {
                error!("{err}");
            }
            Err(e)
        } else {
            Ok(Client::new(self.config))
        }
    }

    /// Yields the [`ClientConfig`] from the values set by the builder.
    pub fn config(self) -> ClientConfig {
        self.config
    }

    /// Tests if the builder is in a valid state to be able to yield a `Client`.
    pub fn is_valid(&self) -> bool {
        self.config.validate().is_ok()
    }

    /// Sets the application name.
    pub fn application_name(mut self, application_name: impl Into<String>) -> Self {
        self.config.application_name = application_name.into();
        self
    }

    /// Sets the application uri.
    pub fn application_uri(mut self, application_uri: impl Into<String>) -> Self {
        self.config.application_uri = application_uri.into();
        self
    }

    /// Sets the product uri.
    pub fn product_uri(mut self, product_uri: impl Into<String>) -> Self {
        self.config.product_uri = product_uri.into();
        self
    }

    /// Sets the name given to created sessions.
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.config.session_name = session_name.into();
        self
    }

    /// Require the given security policy URI. An empty string accepts any
    /// policy the client supports.
    pub fn security_policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.security_policy_uri = uri.into();
        self
    }

    /// Require the given security mode. `MessageSecurityMode::Invalid`
    /// accepts any valid mode.
    pub fn security_mode(mut self, mode: MessageSecurityMode) -> Self {
        self.config.security_mode = mode;
        self
    }

    /// Sets the user identity token sessions are activated with.
    pub fn user_identity_token(mut self, token: IdentityToken) -> Self {
        self.config.user_identity_token = token;
        self
    }

    /// Pre-select an endpoint, skipping discovery. The token policy should
    /// be set as well, otherwise discovery still runs to find one.
    pub fn endpoint(mut self, endpoint: EndpointDescription) -> Self {
        self.config.endpoint = Some(endpoint);
        self
    }

    /// Pre-select a user token policy.
    pub fn user_token_policy(mut self, policy: UserTokenPolicy) -> Self {
        self.config.user_token_policy = Some(policy);
        self
    }

    /// Sets the requested secure channel token lifetime in milliseconds.
    pub fn secure_channel_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.config.secure_channel_lifetime = lifetime_ms;
        self
    }

    /// Sets the per-phase deadline applied during connection establishment.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the requested session timeout in milliseconds.
    pub fn session_timeout(mut self, timeout_ms: u32) -> Self {
        self.config.session_timeout = timeout_ms;
        self
    }

    /// Sets the path to the DER encoded application certificate.
    pub fn certificate_path(mut self, certificate_path: impl Into<PathBuf>) -> Self {
        self.config.certificate_path = Some(certificate_path.into());
        self
    }

    /// Sets the path to the PEM encoded application private key.
    pub fn private_key_path(mut self, private_key_path: impl Into<PathBuf>) -> Self {
        self.config.private_key_path = Some(private_key_path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_a_client() {
        let builder = ClientBuilder::new()
            .application_name("test")
            .application_uri("urn:test")
            .session_name("test session")
            .security_mode(MessageSecurityMode::None);
        assert!(builder.is_valid());
        builder.client().unwrap();
    }

    #[test]
    fn builder_rejects_empty_application_name() {
        let builder = ClientBuilder::new().application_name("");
        assert!(!builder.is_valid());
        assert!(builder.client().is_err());
    }
}
