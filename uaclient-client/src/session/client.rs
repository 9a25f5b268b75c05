use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{debug, error, warn};
use tokio::time::Instant;

use uaclient_core::{
    comms::url::is_opc_ua_binary_url, config::Config, sync::RwLock, ResponseMessage,
};
use uaclient_crypto::{CertificateStore, SecurityPolicy};
use uaclient_types::{
    DecodingOptions, EndpointDescription, GetEndpointsRequest, NodeId, StatusCode, UAString,
};

use crate::{
    session::{
        connect::{establish_session, request_with_deadline, SessionConnectMode},
        endpoints::select_endpoint_and_token_policy,
        process_service_result, process_unexpected_response,
        services::session::{build_close_session_request, CLEANUP_TIMEOUT_HINT_MS},
        state::StateRegister,
        ClientState, SessionInfo, StateCallback,
    },
    transport::{
        tcp::{TcpConnector, TransportConfiguration},
        AsyncSecureChannel, SecureChannelEventLoop, TransportPollResult,
    },
    ClientConfig, IdentityToken,
};

/// What happened during one call to [`Client::poll`].
#[derive(Debug)]
pub enum PollResult {
    /// The transport made progress.
    Transport(TransportPollResult),
    /// The secure channel token was renewed.
    ChannelRenewed,
    /// The connection is gone, with the reason.
    ConnectionLost(StatusCode),
    /// There is no connection to drive.
    Idle,
}

struct ClientConnection {
    channel: AsyncSecureChannel,
    event_loop: SecureChannelEventLoop,
}

/// An OPC UA client: owns the configuration, the connection state and the
/// secure channel, and drives connection establishment from disconnected
/// all the way to an active session.
///
/// The client is single threaded and cooperative: `connect` and
/// `disconnect` run to completion, and once connected the caller must call
/// [`Client::poll`] for anything to happen at all.
pub struct Client {
    config: ClientConfig,
    certificate_store: Arc<RwLock<CertificateStore>>,
    state: StateRegister,
    auth_token: Arc<ArcSwap<NodeId>>,
    session_id: NodeId,
    connection: Option<ClientConnection>,
}

impl Client {
    /// Create a new client from config.
    ///
    /// Note that this does not make any connection to the server.
    pub fn new(config: ClientConfig) -> Client {
        let mut certificate_store = CertificateStore::new();
        if let (Some(cert_path), Some(key_path)) =
            (&config.certificate_path, &config.private_key_path)
        {
            if let Err(e) = certificate_store.load_own_keypair(cert_path, key_path) {
                error!("Client is missing its application instance certificate and/or its private key ({e}). Encrypted endpoints will not function correctly.");
            }
        }
        Client {
            config,
            certificate_store: Arc::new(RwLock::new(certificate_store)),
            state: StateRegister::new(),
            auth_token: Arc::default(),
            session_id: NodeId::null(),
            connection: None,
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ClientState {
        self.state.state()
    }

    /// The server assigned session id, null when no session exists.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The client configuration. Discovery installs the selected endpoint
    /// and user token policy in here.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Install an observer invoked on every state change.
    pub fn set_state_callback(&mut self, callback: Option<StateCallback>) {
        self.state.set_callback(callback);
    }

    /// Connect to the server at `endpoint_url` and establish a session:
    /// TCP, HELLO/ACKNOWLEDGE, OpenSecureChannel, endpoint discovery when
    /// no endpoint is configured, then CreateSession and ActivateSession.
    ///
    /// Calling this while already connected returns success immediately.
    /// On any failure the client tears the connection down and returns the
    /// first failing status.
    pub async fn connect(&mut self, endpoint_url: &str) -> Result<(), StatusCode> {
        self.connect_inner(endpoint_url, true).await
    }

    /// Like [`Client::connect`] but stops once the secure channel is open,
    /// without creating a session.
    pub async fn connect_no_session(&mut self, endpoint_url: &str) -> Result<(), StatusCode> {
        self.connect_inner(endpoint_url, false).await
    }

    /// Install a user name identity token, then connect.
    pub async fn connect_username(
        &mut self,
        endpoint_url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), StatusCode> {
        self.config.user_identity_token =
            IdentityToken::UserName(username.to_string(), password.to_string());
        self.connect(endpoint_url).await
    }

    async fn connect_inner(
        &mut self,
        endpoint_url: &str,
        with_session: bool,
    ) -> Result<(), StatusCode> {
        // Re-entry: an established connection is left alone.
        if self.connection.is_some() && self.state.state() >= ClientState::Connected {
            debug!("connect is a no-op, the client is already connected");
            return Ok(());
        }

        // A mismatch between the configured application URI and the one in
        // the certificate is reported but does not fail the connect.
        self.certificate_store
            .read()
            .check_application_uri(&self.config.application_uri);

        // Discovery runs when no endpoint and token policy have been
        // configured; it then fills them in.
        let mut run_discovery =
            self.config.endpoint.is_none() || self.config.user_token_policy.is_none();
        let mut policy_switched = false;

        loop {
            if let Err(e) = self.connect_channel(endpoint_url).await {
                let _ = self.disconnect().await;
                return Err(e);
            }

            if run_discovery {
                let endpoints = match self.get_endpoints_on_channel(endpoint_url).await {
                    Ok(endpoints) => endpoints,
                    Err(e) => {
                        let _ = self.disconnect().await;
                        return Err(e);
                    }
                };
                let selected = {
                    let selection = select_endpoint_and_token_policy(
                        &endpoints,
                        self.config.security_mode,
                        &self.config.security_policy_uri,
                        &self.config.user_identity_token,
                        |uri| self.has_local_policy(uri),
                    );
                    match selection {
                        Ok((endpoint, token_policy)) => {
                            // Deep copy, minus the endpoint's token list.
                            let mut endpoint = endpoint.clone();
                            endpoint.user_identity_tokens = None;
                            (endpoint, token_policy.clone())
                        }
                        Err(e) => {
                            let _ = self.disconnect().await;
                            return Err(e);
                        }
                    }
                };

                let bound_policy = self
                    .connection
                    .as_ref()
                    .map(|c| c.channel.security_policy())
                    .unwrap_or(SecurityPolicy::None);
                let selected_policy =
                    SecurityPolicy::from_uri(selected.0.security_policy_uri.as_ref());

                self.config.endpoint = Some(selected.0);
                self.config.user_token_policy = Some(selected.1);
                run_discovery = false;

                if selected_policy != bound_policy {
                    // The channel was opened with the wrong policy. Tear it
                    // down and start over, now with the endpoint configured.
                    // One pass suffices since discovery will not run again.
                    if policy_switched {
                        error!("Endpoint selection switched the security policy twice");
                        let _ = self.disconnect().await;
                        return Err(StatusCode::BadInternalError);
                    }
                    policy_switched = true;
                    debug!(
                        "Selected endpoint requires policy {selected_policy}, reconnecting"
                    );
                    let _ = self.disconnect().await;
                    continue;
                }
            }

            if with_session {
                if let Err(e) = self.establish_session_inner(endpoint_url).await {
                    let _ = self.disconnect().await;
                    return Err(e);
                }
            }
            return Ok(());
        }
    }

    /// Open TCP, exchange HELLO/ACKNOWLEDGE and issue the secure channel
    /// token, advancing the state through `Connected` to `SecureChannel`.
    async fn connect_channel(&mut self, endpoint_url: &str) -> Result<(), StatusCode> {
        let endpoint = self.config.endpoint.clone().unwrap_or_else(|| {
            // No endpoint configured: bootstrap with an unsecured channel,
            // good enough for discovery.
            EndpointDescription {
                endpoint_url: UAString::from(endpoint_url),
                ..Default::default()
            }
        });
        let session_info = SessionInfo {
            endpoint,
            user_identity_token: self.config.user_identity_token.clone(),
            preferred_locales: self.config.preferred_locales.clone(),
        };
        let channel = self.make_channel(session_info);

        // The ACK must arrive within the phase deadline or the attempt is
        // abandoned.
        let transport = tokio::time::timeout(
            self.config.request_timeout,
            channel.connect_transport(),
        )
        .await
        .map_err(|_| {
            error!("Timed out waiting for the server's ACK");
            StatusCode::BadConnectionClosed
        })??;
        self.state.set(ClientState::Connected);

        let event_loop = channel.open_secure_channel(transport).await?;
        self.state.set(ClientState::SecureChannel);

        self.connection = Some(ClientConnection {
            channel,
            event_loop,
        });
        Ok(())
    }

    fn make_channel(&self, session_info: SessionInfo) -> AsyncSecureChannel {
        let limits = &self.config.transport_limits;
        AsyncSecureChannel::new(
            self.certificate_store.clone(),
            session_info,
            self.auth_token.clone(),
            TransportConfiguration {
                max_pending_incoming: limits.max_pending_incoming,
                send_buffer_size: limits.max_chunk_size,
                recv_buffer_size: limits.max_incoming_chunk_size,
                max_message_size: limits.max_message_size,
                max_chunk_count: limits.max_chunk_count,
            },
            Box::new(TcpConnector),
            self.config.secure_channel_lifetime,
            self.config.request_timeout,
            self.decoding_options(),
        )
    }

    fn decoding_options(&self) -> DecodingOptions {
        let limits = &self.config.transport_limits;
        DecodingOptions {
            max_message_size: limits.max_message_size,
            max_chunk_count: limits.max_chunk_count,
            ..Default::default()
        }
    }

    /// Whether the client can operate the given security policy: the
    /// policy must be known, and anything but None needs an application
    /// certificate and key.
    fn has_local_policy(&self, security_policy_uri: &str) -> bool {
        let policy = if security_policy_uri.is_empty() {
            SecurityPolicy::None
        } else {
            SecurityPolicy::from_uri(security_policy_uri)
        };
        match policy {
            SecurityPolicy::Unknown => false,
            SecurityPolicy::None => true,
            _ => {
                let store = self.certificate_store.read();
                store.read_own_cert().is_ok() && store.read_own_pkey().is_ok()
            }
        }
    }

    /// Fetch the server's endpoints on the already open channel.
    async fn get_endpoints_on_channel(
        &mut self,
        endpoint_url: &str,
    ) -> Result<Vec<EndpointDescription>, StatusCode> {
        let deadline = Instant::now() + self.config.request_timeout;
        let Some(connection) = self.connection.as_mut() else {
            error!("Cannot fetch endpoints, there is no open channel");
            return Err(StatusCode::BadInternalError);
        };
        let request = GetEndpointsRequest {
            request_header: connection.channel.make_request_header(Duration::from_millis(
                CLEANUP_TIMEOUT_HINT_MS as u64,
            )),
            endpoint_url: UAString::from(endpoint_url),
            locale_ids: None,
            profile_uris: None,
        };
        let response = request_with_deadline(
            &connection.channel,
            &mut connection.event_loop,
            request,
            deadline,
        )
        .await?;
        if let ResponseMessage::GetEndpoints(response) = response {
            process_service_result(&response.response_header)?;
            Ok(response.endpoints.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }

    async fn establish_session_inner(&mut self, endpoint_url: &str) -> Result<(), StatusCode> {
        if self.state.state() < ClientState::SecureChannel {
            error!("Cannot establish a session before the secure channel is open");
            return Err(StatusCode::BadInternalError);
        }
        let endpoint = self
            .config
            .endpoint
            .clone()
            .unwrap_or_else(|| EndpointDescription::from(endpoint_url));
        let client_description = self.config.application_description();
        let Some(connection) = self.connection.as_mut() else {
            return Err(StatusCode::BadInternalError);
        };
        let mode = establish_session(
            &connection.channel,
            &mut connection.event_loop,
            &self.config,
            client_description,
            &self.certificate_store,
            &self.auth_token,
            &endpoint,
        )
        .await?;
        match mode {
            SessionConnectMode::NewSession(session_id) => {
                self.session_id = session_id;
                self.state.set(ClientState::Session);
            }
            SessionConnectMode::ReactivatedSession => {
                self.state.set(ClientState::SessionRenewed);
            }
        }
        Ok(())
    }

    /// Orderly teardown, the reverse of `connect`: CloseSession (best
    /// effort), drop the authentication token, CloseSecureChannel, wipe
    /// the channel's key material, fail anything still in flight with
    /// `BadShutdown` and close TCP. Safe to call from any state, and
    /// always returns `Good`.
    pub async fn disconnect(&mut self) -> StatusCode {
        if let Some(mut connection) = self.connection.take() {
            if self.state.state() >= ClientState::Session {
                self.state.set(ClientState::SecureChannel);
                let deadline = Instant::now() + self.config.request_timeout;
                let request = build_close_session_request(&connection.channel);
                // The session may already be gone along with the server,
                // a failure changes nothing about the remaining teardown.
                if let Err(e) = request_with_deadline(
                    &connection.channel,
                    &mut connection.event_loop,
                    request,
                    deadline,
                )
                .await
                {
                    warn!("CloseSession failed during disconnect: {e}");
                }
            }

            self.auth_token.store(Arc::new(NodeId::null()));
            self.session_id = NodeId::null();
            connection.channel.reset_request_handle();

            if self.state.state() >= ClientState::SecureChannel {
                self.state.set(ClientState::Connected);
                connection.channel.close_channel().await;
                // Poll until the CLO has been flushed and the transport
                // winds down, without hanging on a dead link.
                let deadline = Instant::now() + self.config.request_timeout;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        r = connection.event_loop.poll() => {
                            if matches!(r, TransportPollResult::Closed(_)) {
                                break;
                            }
                        }
                    }
                }
                connection.channel.wipe_security_state();
            }

            // Fail anything still waiting for a response; dropping the
            // connection closes the socket.
            connection.event_loop.close(StatusCode::BadShutdown);
        } else {
            self.auth_token.store(Arc::new(NodeId::null()));
            self.session_id = NodeId::null();
        }
        self.state.set(ClientState::Disconnected);
        StatusCode::Good
    }

    /// Drive the connection one step: send and receive pending messages,
    /// and renew the channel token when its renewal deadline passes. The
    /// single suspension point of an idle client; the renewal deadline
    /// wakes it even when the wire is silent.
    pub async fn poll(&mut self) -> PollResult {
        loop {
            let Some(connection) = self.connection.as_mut() else {
                return PollResult::Idle;
            };

            if !connection.channel.should_renew_security_token() {
                let renewal_deadline = connection.channel.renewal_deadline();
                tokio::select! {
                    r = connection.event_loop.poll() => {
                        return match r {
                            TransportPollResult::Closed(status) => {
                                self.connection_lost();
                                PollResult::ConnectionLost(status)
                            }
                            r => PollResult::Transport(r),
                        };
                    }
                    _ = tokio::time::sleep_until(renewal_deadline) => {
                        // Renewal fell due while waiting, go around.
                        continue;
                    }
                }
            }

            return match connection
                .channel
                .renew_security_token(&mut connection.event_loop)
                .await
            {
                Ok(_) => PollResult::ChannelRenewed,
                Err(e) => {
                    error!("Secure channel renewal failed: {e}");
                    self.connection_lost();
                    PollResult::ConnectionLost(e)
                }
            };
        }
    }

    // The transport died underneath us. The session may still exist on the
    // server; reconnecting re-activates it, though subscription continuity
    // is lost.
    fn connection_lost(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.channel.wipe_security_state();
        }
        if self.state.state() >= ClientState::Session {
            self.state.set(ClientState::SessionDisconnected);
        } else {
            self.state.set(ClientState::Disconnected);
        }
    }

    /// One-shot discovery: open a throwaway unsecured connection to the
    /// given URL, fetch the endpoint list and close the connection again.
    /// The client's own state is untouched.
    pub async fn get_endpoints(
        &mut self,
        endpoint_url: &str,
    ) -> Result<Vec<EndpointDescription>, StatusCode> {
        if !is_opc_ua_binary_url(endpoint_url) {
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        let session_info = SessionInfo {
            endpoint: EndpointDescription::from(endpoint_url),
            user_identity_token: IdentityToken::Anonymous,
            preferred_locales: Vec::new(),
        };
        let channel = self.make_channel(session_info);
        let mut event_loop =
            tokio::time::timeout(self.config.request_timeout, channel.connect())
                .await
                .map_err(|_| StatusCode::BadConnectionClosed)??;

        let deadline = Instant::now() + self.config.request_timeout;
        let request = GetEndpointsRequest {
            request_header: channel
                .make_request_header(Duration::from_millis(CLEANUP_TIMEOUT_HINT_MS as u64)),
            endpoint_url: UAString::from(endpoint_url),
            locale_ids: None,
            profile_uris: None,
        };
        let result = request_with_deadline(&channel, &mut event_loop, request, deadline).await;

        // Courtesy CLO, then let the transport wind down.
        channel.close_channel().await;
        let deadline = Instant::now() + self.config.request_timeout;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                r = event_loop.poll() => {
                    if matches!(r, TransportPollResult::Closed(_)) {
                        break;
                    }
                }
            }
        }
        channel.wipe_security_state();

        match result? {
            ResponseMessage::GetEndpoints(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.endpoints.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }
}
