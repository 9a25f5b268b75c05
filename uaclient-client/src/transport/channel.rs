use std::{sync::Arc, time::Duration};

use arc_swap::{ArcSwap, ArcSwapOption};
use log::{debug, error};
use tokio::time::Instant;

use uaclient_core::{
    comms::secure_channel::{Role, SecureChannel},
    sync::RwLock,
    trace_read_lock, trace_write_lock, RequestMessage, ResponseMessage,
};
use uaclient_crypto::{CertificateStore, SecurityPolicy};
use uaclient_types::{
    ByteString, CloseSecureChannelRequest, DecodingOptions, IntegerId, MessageSecurityMode,
    NodeId, RequestHeader, SecurityTokenRequestType, StatusCode,
};

use super::{
    connect::{Connector, Transport},
    state::{Request, RequestSend, SecureChannelState},
    tcp::{TcpTransport, TransportConfiguration},
    OutgoingMessage, TransportPollResult,
};

use crate::session::SessionInfo;

// This is an arbitrary limit which should never be reached in practice,
// it's just a safety net to prevent the client from consuming too much
// memory if it gets into an unexpected (bad) state.
const MAX_INFLIGHT_MESSAGES: usize = 1_000_000;

/// Wrapper around an open secure channel: owns the channel state, the
/// request id counters and the means of creating transports.
pub struct AsyncSecureChannel {
    session_info: SessionInfo,
    pub(crate) secure_channel: Arc<RwLock<SecureChannel>>,
    certificate_store: Arc<RwLock<CertificateStore>>,
    transport_config: TransportConfiguration,
    state: SecureChannelState,
    connector: Box<dyn Connector>,
    channel_lifetime: u32,
    request_timeout: Duration,

    request_send: ArcSwapOption<RequestSend>,
}

/// The polling half of an established connection. The channel does nothing
/// unless this is polled.
pub struct SecureChannelEventLoop {
    transport: TcpTransport,
}

impl SecureChannelEventLoop {
    /// Drive the transport one step: send pending data or receive and
    /// dispatch one message.
    pub async fn poll(&mut self) -> TransportPollResult {
        self.transport.poll().await
    }

    /// Tear the transport down, failing everything in flight.
    pub(crate) fn close(&mut self, status: StatusCode) {
        self.transport.close(status);
    }
}

impl AsyncSecureChannel {
    /// Create a new client secure channel.
    pub fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        session_info: SessionInfo,
        auth_token: Arc<ArcSwap<NodeId>>,
        transport_config: TransportConfiguration,
        connector: Box<dyn Connector>,
        channel_lifetime: u32,
        request_timeout: Duration,
        decoding_options: DecodingOptions,
    ) -> Self {
        let secure_channel = Arc::new(RwLock::new(SecureChannel::new(
            certificate_store.clone(),
            Role::Client,
            decoding_options,
        )));

        Self {
            transport_config,
            state: SecureChannelState::new(secure_channel.clone(), auth_token),
            session_info,
            secure_channel,
            certificate_store,
            request_send: Default::default(),
            connector,
            channel_lifetime,
            request_timeout,
        }
    }

    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        self.state.make_request_header(timeout)
    }

    /// Get the next request handle on the channel.
    pub fn request_handle(&self) -> IntegerId {
        self.state.request_handle()
    }

    /// Reset the request handle counter, done when a session is dropped.
    pub(crate) fn reset_request_handle(&self) {
        self.state.reset_request_handle()
    }

    pub(crate) fn client_nonce(&self) -> ByteString {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.local_nonce_as_byte_string()
    }

    /// The security policy bound to this channel.
    pub fn security_policy(&self) -> SecurityPolicy {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.security_policy()
    }

    pub(crate) fn update_from_created_session(
        &self,
        nonce: &ByteString,
        certificate: &ByteString,
    ) -> Result<(), StatusCode> {
        let mut secure_channel = trace_write_lock!(self.secure_channel);
        secure_channel.set_remote_nonce_from_byte_string(nonce)?;
        if !certificate.is_null() {
            secure_channel.set_remote_cert_from_byte_string(certificate)?;
        }
        Ok(())
    }

    /// The monotonic instant at which token renewal is next due.
    pub fn renewal_deadline(&self) -> Instant {
        self.state.renewal_deadline()
    }

    /// `true` once the token renewal deadline has passed.
    pub fn should_renew_security_token(&self) -> bool {
        self.state.should_renew_security_token()
    }

    /// Send a message on the secure channel and wait for the response.
    pub async fn send(
        &self,
        request: impl Into<RequestMessage>,
        timeout: Duration,
    ) -> Result<ResponseMessage, StatusCode> {
        let Some(send) = self.request_send.load().as_deref().cloned() else {
            return Err(StatusCode::BadServerNotConnected);
        };
        Request::new(request, send, self.state.next_request_id(), timeout)
            .send()
            .await
    }

    /// Renew the channel token if its renewal deadline has passed, polling
    /// the given event loop while the exchange is in flight. A renewal that
    /// is not yet due returns success immediately.
    pub async fn renew_security_token(
        &self,
        event_loop: &mut SecureChannelEventLoop,
    ) -> Result<bool, StatusCode> {
        // Still valid, nothing to do.
        if !self.state.should_renew_security_token() {
            return Ok(false);
        }
        let Some(send) = self.request_send.load().as_deref().cloned() else {
            return Err(StatusCode::BadServerNotConnected);
        };

        let request = self.state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Renew,
            self.channel_lifetime,
            self.request_timeout,
            send,
        );
        let response = Self::drive_request(event_loop, request).await?;
        self.state.end_issue_or_renew_secure_channel(response)?;
        debug!("Secure channel token renewed");
        Ok(true)
    }

    /// Attempt to establish a connection using this channel: TCP and
    /// HELLO/ACKNOWLEDGE. The secure channel itself is opened with
    /// [`AsyncSecureChannel::open_secure_channel`] afterwards.
    pub(crate) async fn connect_transport(&self) -> Result<TcpTransport, StatusCode> {
        self.request_send.store(None);
        self.state.reset_request_id();
        {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.clear_security_token();
        }
        let (transport, send) = self.create_transport().await?;
        self.request_send.store(Some(Arc::new(send)));
        Ok(transport)
    }

    /// Open the secure channel on an established transport by issuing an
    /// OPN request and waiting for the token, bounded by the request
    /// timeout. An expired deadline yields `BadConnectionClosed`: the
    /// channel cannot be used without a token.
    pub(crate) async fn open_secure_channel(
        &self,
        transport: TcpTransport,
    ) -> Result<SecureChannelEventLoop, StatusCode> {
        let Some(send) = self.request_send.load().as_deref().cloned() else {
            return Err(StatusCode::BadServerNotConnected);
        };
        let mut event_loop = SecureChannelEventLoop { transport };

        let request = self.state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Issue,
            self.channel_lifetime,
            self.request_timeout,
            send,
        );
        let response = Self::drive_request(&mut event_loop, request)
            .await
            .map_err(|e| {
                if e == StatusCode::BadTimeout {
                    StatusCode::BadConnectionClosed
                } else {
                    e
                }
            })?;
        self.state.end_issue_or_renew_secure_channel(response)?;

        Ok(event_loop)
    }

    /// Establish transport and secure channel in one step.
    pub async fn connect(&self) -> Result<SecureChannelEventLoop, StatusCode> {
        let transport = self.connect_transport().await?;
        self.open_secure_channel(transport).await
    }

    // Poll the transport while a request is in flight. The request future
    // owns its own timeout.
    async fn drive_request(
        event_loop: &mut SecureChannelEventLoop,
        request: Request,
    ) -> Result<ResponseMessage, StatusCode> {
        let request_fut = request.send();
        tokio::pin!(request_fut);
        loop {
            tokio::select! {
                r = &mut request_fut => break r,
                r = event_loop.poll() => {
                    if let TransportPollResult::Closed(e) = r {
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn create_transport(
        &self,
    ) -> Result<(TcpTransport, tokio::sync::mpsc::Sender<OutgoingMessage>), StatusCode> {
        let endpoint_url = self.session_info.endpoint.endpoint_url.clone();
        debug!("Connect");
        let security_policy = if self.session_info.endpoint.security_policy_uri.is_empty() {
            SecurityPolicy::None
        } else {
            SecurityPolicy::from_uri(self.session_info.endpoint.security_policy_uri.as_ref())
        };

        if security_policy == SecurityPolicy::Unknown {
            error!(
                "connect, security policy \"{}\" is unknown",
                self.session_info.endpoint.security_policy_uri.as_ref()
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }

        let (cert, key) = {
            let certificate_store = trace_read_lock!(self.certificate_store);
            (
                certificate_store.read_own_cert().ok(),
                certificate_store.read_own_pkey().ok(),
            )
        };

        {
            // Bind the policy and the server certificate to the channel.
            // The mode falls back to None when the configuration left it
            // unset.
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.set_private_key(key);
            secure_channel.set_cert(cert);
            secure_channel.set_security_policy(security_policy);
            let mode = match self.session_info.endpoint.security_mode {
                MessageSecurityMode::Invalid => MessageSecurityMode::None,
                mode => mode,
            };
            secure_channel.set_security_mode(mode);
            let _ = secure_channel.set_remote_cert_from_byte_string(
                &self.session_info.endpoint.server_certificate,
            );
            debug!("Security policy = {:?}", security_policy);
            debug!("Security mode = {:?}", mode);
        }

        let (send, recv) = tokio::sync::mpsc::channel(MAX_INFLIGHT_MESSAGES);
        let transport = self
            .connector
            .connect(
                self.secure_channel.clone(),
                recv,
                self.transport_config.clone(),
                endpoint_url.as_ref(),
            )
            .await?;

        Ok((transport, send))
    }

    /// Queue a CloseSecureChannel message. The server does not respond, the
    /// transport closes itself after the message is written.
    pub async fn close_channel(&self) {
        let msg = CloseSecureChannelRequest {
            request_header: self.state.make_request_header(self.request_timeout),
        };

        let sender = self.request_send.load().as_deref().cloned();
        let request =
            sender.map(|s| Request::new(msg, s, self.state.next_request_id(), self.request_timeout));

        if let Some(request) = request {
            if let Err(e) = request.send_no_response().await {
                error!("Failed to send disconnect message: {e}");
            }
        }
    }

    /// Wipe the channel's cryptographic state. Done during teardown, after
    /// the CLO message has gone out.
    pub(crate) fn wipe_security_state(&self) {
        let mut secure_channel = trace_write_lock!(self.secure_channel);
        secure_channel.wipe_security_state();
        self.request_send.store(None);
    }
}
