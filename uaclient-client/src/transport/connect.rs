use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use uaclient_core::{comms::secure_channel::SecureChannel, sync::RwLock};
use uaclient_types::StatusCode;

use super::{
    tcp::{TcpTransport, TransportConfiguration},
    OutgoingMessage, TransportPollResult,
};

/// Trait implemented by simple wrapper types that create a connection to an
/// OPC-UA server.
///
/// Notes for implementors:
///
///  - This deals with connection establishment up to after the exchange of
///    HELLO/ACKNOWLEDGE or equivalent.
///  - This should not do any retries, that's handled on a higher level.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt to establish a connection to the OPC UA endpoint given by
    /// `endpoint_url`. On success this returns a [`TcpTransport`] whose
    /// limits have been revised by the server's ACKNOWLEDGE. The caller is
    /// responsible for polling the returned transport in order to actually
    /// send and receive messages.
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode>;
}

/// Trait for client transport channels.
///
/// Note for implementors:
///
/// The [`Transport::poll`] method _must_ be cancellation safe, meaning that
/// it cannot keep internal state across await points that is lost when the
/// future is dropped.
pub trait Transport: Send + Sync + 'static {
    /// Drive the transport one step: send pending data, or receive and
    /// dispatch one incoming message.
    fn poll(&mut self) -> impl Future<Output = TransportPollResult> + Send + Sync;
}
