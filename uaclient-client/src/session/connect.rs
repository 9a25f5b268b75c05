use std::sync::Arc;

use arc_swap::ArcSwap;
use log::debug;
use tokio::time::Instant;

use uaclient_core::{sync::RwLock, RequestMessage, ResponseMessage};
use uaclient_crypto::CertificateStore;
use uaclient_types::{ApplicationDescription, EndpointDescription, NodeId, StatusCode};

use crate::{
    session::services::session::{
        build_activate_session_request, build_create_session_request,
        process_activate_session_response, process_create_session_response,
    },
    transport::{AsyncSecureChannel, SecureChannelEventLoop, TransportPollResult},
    ClientConfig,
};

/// How a session came to be usable: freshly created, or an existing one
/// re-activated on a new secure channel.
#[derive(Debug, Clone)]
pub(crate) enum SessionConnectMode {
    /// A session with the given id was created and activated.
    NewSession(NodeId),
    /// An existing session was re-activated. Any subscription state it had
    /// is not recovered; publishes missed while disconnected are lost.
    ReactivatedSession,
}

/// Submit a request on the channel and poll the event loop until the
/// response arrives, the transport dies, or the deadline passes. This is
/// the single suspension point of connection establishment: nothing makes
/// progress unless the transport is polled.
pub(crate) async fn request_with_deadline(
    channel: &AsyncSecureChannel,
    event_loop: &mut SecureChannelEventLoop,
    request: impl Into<RequestMessage>,
    deadline: Instant,
) -> Result<ResponseMessage, StatusCode> {
    let timeout = deadline.saturating_duration_since(Instant::now());
    let request_fut = channel.send(request, timeout);
    tokio::pin!(request_fut);
    loop {
        tokio::select! {
            r = &mut request_fut => break r,
            r = event_loop.poll() => {
                if let TransportPollResult::Closed(e) = r {
                    break Err(e);
                }
            }
        }
    }
}

/// Drive the client from an open secure channel to an active session.
///
/// With a null authentication token this is CreateSession followed by
/// ActivateSession; with a token left over from an earlier connection it
/// goes straight to ActivateSession to re-activate the dormant session.
/// The whole exchange shares one deadline; once it passes the result is
/// `BadTimeout`.
pub(crate) async fn establish_session(
    channel: &AsyncSecureChannel,
    event_loop: &mut SecureChannelEventLoop,
    config: &ClientConfig,
    client_description: ApplicationDescription,
    certificate_store: &Arc<RwLock<CertificateStore>>,
    auth_token: &Arc<ArcSwap<NodeId>>,
    endpoint: &EndpointDescription,
) -> Result<SessionConnectMode, StatusCode> {
    let deadline = Instant::now() + config.request_timeout;
    let reactivate = !auth_token.load().is_null();

    let session_id = if reactivate {
        debug!("Re-activating an existing session");
        None
    } else {
        let request = build_create_session_request(
            channel,
            config,
            client_description,
            &endpoint.endpoint_url,
            &certificate_store.read(),
        );
        let response = request_with_deadline(channel, event_loop, request, deadline).await?;
        let (session_id, token) =
            process_create_session_response(response, channel, &certificate_store.read())?;
        auth_token.store(Arc::new(token));
        Some(session_id)
    };

    let request =
        build_activate_session_request(channel, config, endpoint, &certificate_store.read())?;
    let response = request_with_deadline(channel, event_loop, request, deadline).await?;
    process_activate_session_response(response)?;

    Ok(match session_id {
        Some(id) => SessionConnectMode::NewSession(id),
        None => SessionConnectMode::ReactivatedSession,
    })
}
