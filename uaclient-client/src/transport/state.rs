use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{debug, error};
use tokio::time::Instant;

use uaclient_core::{
    comms::secure_channel::SecureChannel, sync::RwLock, trace_write_lock, RequestMessage,
    ResponseMessage,
};
use uaclient_crypto::SecurityPolicy;
use uaclient_types::{
    IntegerId, NodeId, OpenSecureChannelRequest, RequestHeader, SecurityTokenRequestType,
    StatusCode,
};

use super::OutgoingMessage;

/// Sender half of the outgoing message queue, cloned into anything that
/// wants to submit requests on the channel.
pub(crate) type RequestSend = tokio::sync::mpsc::Sender<OutgoingMessage>;

/// A single request in flight: the message, its id, and how long to wait
/// for the response.
pub(crate) struct Request {
    payload: RequestMessage,
    sender: RequestSend,
    request_id: u32,
    timeout: Duration,
}

impl Request {
    pub(crate) fn new(
        payload: impl Into<RequestMessage>,
        sender: RequestSend,
        request_id: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            payload: payload.into(),
            sender,
            request_id,
            timeout,
        }
    }

    /// Submit the request and wait for its response or the timeout.
    pub(crate) async fn send(self) -> Result<ResponseMessage, StatusCode> {
        let (callback_send, callback_recv) = tokio::sync::oneshot::channel();
        let deadline = Instant::now() + self.timeout;
        self.sender
            .send(OutgoingMessage {
                request: self.payload,
                callback: Some(callback_send),
                request_id: self.request_id,
            })
            .await
            .map_err(|_| StatusCode::BadConnectionClosed)?;

        match tokio::time::timeout_at(deadline, callback_recv).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StatusCode::BadConnectionClosed),
            Err(_) => Err(StatusCode::BadTimeout),
        }
    }

    /// Submit the request without expecting any response.
    pub(crate) async fn send_no_response(self) -> Result<(), StatusCode> {
        self.sender
            .send(OutgoingMessage {
                request: self.payload,
                callback: None,
                request_id: self.request_id,
            })
            .await
            .map_err(|_| StatusCode::BadConnectionClosed)
    }
}

/// State tracked per secure channel: the monotonically increasing request
/// ids and handles, the authentication token, and the renewal deadline.
pub(crate) struct SecureChannelState {
    /// The channel whose token this state manages.
    secure_channel: Arc<RwLock<SecureChannel>>,
    /// The authentication token of the session, null before CreateSession.
    auth_token: Arc<ArcSwap<NodeId>>,
    /// The next request id. Strictly increasing for the channel's lifetime.
    request_id: AtomicU32,
    /// The next request handle. Strictly increasing per request.
    request_handle: AtomicU32,
    /// The monotonic deadline at which the channel token should be renewed.
    /// Updated twice per OPN: conservatively before the request goes out to
    /// suppress re-entry, and properly once the response arrives.
    next_channel_renewal: parking_lot::Mutex<Instant>,
}

const FIRST_REQUEST_ID: u32 = 1;
const FIRST_REQUEST_HANDLE: u32 = 1;

impl SecureChannelState {
    pub(crate) fn new(
        secure_channel: Arc<RwLock<SecureChannel>>,
        auth_token: Arc<ArcSwap<NodeId>>,
    ) -> Self {
        SecureChannelState {
            secure_channel,
            auth_token,
            request_id: AtomicU32::new(FIRST_REQUEST_ID),
            request_handle: AtomicU32::new(FIRST_REQUEST_HANDLE),
            next_channel_renewal: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Make a request header for a service call with the given timeout.
    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        RequestHeader::new(
            (**self.auth_token.load()).clone(),
            self.request_handle(),
            timeout.as_millis() as u32,
        )
    }

    /// The next request handle, strictly increasing.
    pub(crate) fn request_handle(&self) -> IntegerId {
        self.request_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Reset the request handle counter, done when the session goes away.
    pub(crate) fn reset_request_handle(&self) {
        self.request_handle
            .store(FIRST_REQUEST_HANDLE, Ordering::Relaxed);
    }

    /// The next request id, strictly increasing within the channel.
    pub(crate) fn next_request_id(&self) -> u32 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Restart the request id sequence, done when a new channel is opened.
    pub(crate) fn reset_request_id(&self) {
        self.request_id.store(FIRST_REQUEST_ID, Ordering::Relaxed);
    }

    /// `true` once the renewal deadline has passed.
    pub(crate) fn should_renew_security_token(&self) -> bool {
        Instant::now() >= *self.next_channel_renewal.lock()
    }

    /// The monotonic instant at which renewal is next due.
    pub(crate) fn renewal_deadline(&self) -> Instant {
        *self.next_channel_renewal.lock()
    }

    /// Build an OpenSecureChannel request for issue or renewal.
    ///
    /// A fresh local nonce is generated for every attempt. Before the
    /// response is awaited the renewal deadline is pushed out to
    /// `now + 2 * timeout` so racing traffic cannot re-trigger renewal
    /// while this one is in flight.
    pub(crate) fn begin_issue_or_renew_secure_channel(
        &self,
        request_type: SecurityTokenRequestType,
        requested_lifetime: u32,
        timeout: Duration,
        sender: RequestSend,
    ) -> Request {
        let request = {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.create_random_nonce();
            OpenSecureChannelRequest {
                request_header: self.make_request_header(timeout),
                client_protocol_version: 0,
                request_type,
                security_mode: secure_channel.security_mode(),
                client_nonce: secure_channel.local_nonce_as_byte_string(),
                requested_lifetime,
            }
        };
        debug!("Making secure channel request of type {request_type:?}");

        *self.next_channel_renewal.lock() = Instant::now() + timeout * 2;

        Request::new(request, sender, self.next_request_id(), timeout)
    }

    /// Digest the OpenSecureChannel response: install the token, derive the
    /// symmetric keys and schedule renewal at 75% of the token lifetime.
    pub(crate) fn end_issue_or_renew_secure_channel(
        &self,
        response: ResponseMessage,
    ) -> Result<(), StatusCode> {
        let ResponseMessage::OpenSecureChannel(response) = response else {
            error!("Expected an OpenSecureChannelResponse, got something else");
            return Err(StatusCode::BadUnknownResponse);
        };
        if response.response_header.service_result.is_bad() {
            return Err(response.response_header.service_result);
        }

        let token = response.security_token;
        debug!(
            "Secure channel {} token {} issued, revised lifetime {} ms",
            token.channel_id, token.token_id, token.revised_lifetime
        );

        *self.next_channel_renewal.lock() =
            Instant::now() + Duration::from_millis((token.revised_lifetime as u64) * 3 / 4);

        let mut secure_channel = trace_write_lock!(self.secure_channel);
        secure_channel.set_security_token(token);
        secure_channel.set_remote_nonce_from_byte_string(&response.server_nonce)?;
        if secure_channel.security_policy() != SecurityPolicy::None {
            secure_channel.derive_keys();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_state() -> SecureChannelState {
        let secure_channel = Arc::new(RwLock::new(SecureChannel::new_no_certificate_store()));
        SecureChannelState::new(secure_channel, Arc::default())
    }

    #[test]
    fn request_ids_and_handles_are_strictly_increasing() {
        let state = make_state();
        let ids: Vec<u32> = (0..5).map(|_| state.next_request_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        let handles: Vec<u32> = (0..5).map(|_| state.request_handle()).collect();
        assert_eq!(handles, vec![1, 2, 3, 4, 5]);
        state.reset_request_handle();
        assert_eq!(state.request_handle(), 1);
    }

    #[tokio::test]
    async fn renewal_deadline_is_two_phase() {
        let state = make_state();
        // A fresh state is immediately due for renewal.
        assert!(state.should_renew_security_token());

        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let timeout = Duration::from_secs(2);
        let _request = state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Issue,
            60_000,
            timeout,
            tx,
        );
        // Phase one: pushed out to now + 2 * timeout before the response.
        assert!(!state.should_renew_security_token());
        let conservative = state.renewal_deadline();
        assert!(conservative <= Instant::now() + timeout * 2);

        // Phase two: on response, 75% of the revised lifetime.
        let response: ResponseMessage = uaclient_types::OpenSecureChannelResponse {
            response_header: uaclient_types::ResponseHeader::new_good(1),
            server_protocol_version: 0,
            security_token: uaclient_types::ChannelSecurityToken {
                channel_id: 1,
                token_id: 1,
                created_at: uaclient_types::DateTime::now(),
                revised_lifetime: 60_000,
            },
            server_nonce: uaclient_types::ByteString::null(),
        }
        .into();
        state.end_issue_or_renew_secure_channel(response).unwrap();

        let renewal = state.renewal_deadline();
        // nextChannelRenewal - now <= revisedLifetime
        assert!(renewal <= Instant::now() + Duration::from_millis(60_000));
        assert!(renewal >= Instant::now() + Duration::from_millis(30_000));
    }

    #[test]
    fn nonce_is_regenerated_per_open_request() {
        let state = make_state();
        let (tx, _rx) = tokio::sync::mpsc::channel(2);
        let channel = state.secure_channel.clone();
        {
            let mut c = channel.write();
            c.set_security_policy(SecurityPolicy::Basic256Sha256);
        }
        let _ = state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Issue,
            60_000,
            Duration::from_secs(1),
            tx.clone(),
        );
        let nonce1 = channel.read().local_nonce().to_vec();
        let _ = state.begin_issue_or_renew_secure_channel(
            SecurityTokenRequestType::Renew,
            60_000,
            Duration::from_secs(1),
            tx,
        );
        let nonce2 = channel.read().local_nonce().to_vec();
        assert_eq!(nonce1.len(), 32);
        assert_eq!(nonce2.len(), 32);
        assert_ne!(nonce1, nonce2);
    }
}
