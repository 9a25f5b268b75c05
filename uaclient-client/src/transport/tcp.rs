use std::sync::Arc;

use super::connect::{Connector, Transport};
use super::core::{OutgoingMessage, TransportPollResult, TransportState};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error};
use uaclient_core::comms::buffer::SendBuffer;
use uaclient_core::comms::tcp_types::AcknowledgeMessage;
use uaclient_core::RequestMessage;
use uaclient_core::{
    comms::{
        secure_channel::SecureChannel,
        tcp_codec::{Message, TcpCodec},
        tcp_types::HelloMessage,
        url::hostname_port_from_url,
    },
    trace_read_lock,
};
use uaclient_types::{SimpleBinaryEncodable, StatusCode};
use parking_lot::RwLock;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

#[derive(Debug, Clone, Copy)]
enum TransportCloseState {
    Open,
    Closed(StatusCode),
}

/// Transport limits proposed to the server. The server's ACKNOWLEDGE
/// revises the effective values downwards.
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    /// Most decoded-but-unassembled incoming chunks held at once.
    pub max_pending_incoming: usize,
    /// Largest chunk sent to the server.
    pub send_buffer_size: usize,
    /// Largest chunk accepted from the server.
    pub recv_buffer_size: usize,
    /// Largest whole message, 0 for no limit.
    pub max_message_size: usize,
    /// Most chunks per message, 0 for no limit.
    pub max_chunk_count: usize,
}

/// The TCP transport: a framed reader, a writer and a send buffer, driven
/// by [`TcpTransport::poll`].
pub struct TcpTransport {
    state: TransportState,
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    should_close: bool,
    closed: TransportCloseState,
}

/// Connector establishing a plain TCP connection: resolve, connect, then
/// exchange HELLO and ACKNOWLEDGE.
pub struct TcpConnector;

impl TcpConnector {
    async fn connect_inner(
        secure_channel: &RwLock<SecureChannel>,
        config: &TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<
        (
            FramedRead<ReadHalf<TcpStream>, TcpCodec>,
            WriteHalf<TcpStream>,
            AcknowledgeMessage,
        ),
        StatusCode,
    > {
        let (host, port) = hostname_port_from_url(
            endpoint_url,
            uaclient_core::constants::DEFAULT_OPC_UA_SERVER_PORT,
        )?;

        let addr = {
            let addr = format!("{}:{}", host, port);
            match tokio::net::lookup_host(addr).await {
                Ok(mut addrs) => {
                    if let Some(addr) = addrs.next() {
                        addr
                    } else {
                        error!(
                            "Invalid address {}, does not resolve to any socket",
                            endpoint_url
                        );
                        return Err(StatusCode::BadTcpEndpointUrlInvalid);
                    }
                }
                Err(e) => {
                    error!("Invalid address {}, cannot be parsed {:?}", endpoint_url, e);
                    return Err(StatusCode::BadTcpEndpointUrlInvalid);
                }
            }
        };

        debug!("Connecting to {} with url {}", addr, endpoint_url);

        let socket = TcpStream::connect(&addr).await.map_err(|err| {
            error!("Could not connect to host {}, {:?}", addr, err);
            StatusCode::BadCommunicationError
        })?;

        let (reader, mut writer) = tokio::io::split(socket);

        let hello = HelloMessage::new(
            endpoint_url,
            config.send_buffer_size,
            config.recv_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        if !hello.is_valid_buffer_sizes() || !hello.is_endpoint_url_valid() {
            return Err(StatusCode::BadCommunicationError);
        }
        log::trace!("Send hello message: {hello:?}");
        let mut framed_read = {
            let secure_channel = trace_read_lock!(secure_channel);
            FramedRead::new(reader, TcpCodec::new(secure_channel.decoding_options()))
        };

        writer
            .write_all(&hello.encode_to_vec())
            .await
            .map_err(|err| {
                error!("Cannot send hello to server, err = {}", err);
                StatusCode::BadCommunicationError
            })?;
        let ack = match framed_read.next().await {
            Some(Ok(Message::Acknowledge(ack))) => {
                if ack.send_buffer_size > hello.receive_buffer_size {
                    log::warn!("Acknowledged send buffer size is greater than receive buffer size in hello message!")
                }
                if ack.receive_buffer_size > hello.send_buffer_size {
                    log::warn!("Acknowledged receive buffer size is greater than send buffer size in hello message!")
                }
                log::trace!("Received acknowledgement: {:?}", ack);
                ack
            }
            Some(Ok(Message::Error(error))) => {
                error!(
                    "Server rejected the connection with {}",
                    error.status_code()
                );
                return Err(error.status_code());
            }
            other => {
                error!(
                    "Unexpected error while waiting for server ACK. Expected ACK, got {:?}",
                    other
                );
                return Err(StatusCode::BadConnectionClosed);
            }
        };

        Ok((framed_read, writer, ack))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode> {
        let (framed_read, writer, ack) =
            Self::connect_inner(&channel, &config, endpoint_url).await?;

        // Effective limits become the minimum of what either side offers,
        // 0 meaning unbounded.
        let mut buffer = SendBuffer::new(
            config.send_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        buffer.revise(
            ack.receive_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );

        Ok(TcpTransport {
            state: TransportState::new(channel, outgoing_recv, config.max_pending_incoming),
            read: framed_read,
            write: writer,
            send_buffer: buffer,
            should_close: false,
            closed: TransportCloseState::Open,
        })
    }
}

impl TcpTransport {
    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<Message, std::io::Error>>,
    ) -> TransportPollResult {
        let Some(incoming) = incoming else {
            return TransportPollResult::Closed(StatusCode::BadConnectionClosed);
        };
        match incoming {
            Ok(message) => {
                if let Err(e) = self.state.handle_incoming_message(message) {
                    TransportPollResult::Closed(e)
                } else {
                    TransportPollResult::IncomingMessage
                }
            }
            Err(err) => {
                error!("Error reading from stream {}", err);
                TransportPollResult::Closed(StatusCode::BadConnectionClosed)
            }
        }
    }

    /// Fail everything in flight with the given status. Further polls
    /// return `Closed`.
    pub(crate) fn close(&mut self, status: StatusCode) {
        self.state.close(status);
        self.closed = TransportCloseState::Closed(status);
    }

    async fn poll_inner(&mut self) -> TransportPollResult {
        // If there's nothing in the send buffer, but there are chunks
        // available, apply security and move them to the send buffer first.
        if self.send_buffer.should_encode_chunks() {
            let secure_channel = trace_read_lock!(self.state.secure_channel);
            if let Err(e) = self.send_buffer.encode_next_chunk(&secure_channel) {
                return TransportPollResult::Closed(e.into());
            }
        }

        // If there is something in the send buffer, write it to the stream.
        // If not, wait for outgoing messages. Either way, listen for
        // incoming messages while doing so.
        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    if let Err(e) = r {
                        error!("write bytes task failed: {}", e);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    TransportPollResult::OutgoingMessageSent
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming)
                }
            }
        } else {
            if self.should_close {
                debug!("Writer is setting the connection state to finished(good)");
                return TransportPollResult::Closed(StatusCode::Good);
            }
            tokio::select! {
                outgoing = self.state.wait_for_outgoing_message() => {
                    let Some((outgoing, request_id)) = outgoing else {
                        return TransportPollResult::Closed(StatusCode::Good);
                    };
                    if matches!(outgoing, RequestMessage::CloseSecureChannel(_)) {
                        // CLO is the last thing the client says on a channel.
                        self.should_close = true;
                        debug!("Writer is about to send a CloseSecureChannelRequest which means it should close in a moment");
                    }
                    let secure_channel = trace_read_lock!(self.state.secure_channel);
                    match self.send_buffer.write(request_id, outgoing, &secure_channel) {
                        Err(e) => {
                            drop(secure_channel);
                            if let Some((request_id, request_handle)) = e.full_context() {
                                error!("Failed to send message with request handle {}: {}", request_handle, e.status());
                                let status = e.status();
                                self.state.message_send_failed(request_id, status);
                                TransportPollResult::RecoverableError(status)
                            } else {
                                TransportPollResult::Closed(e.status())
                            }
                        }
                        Ok(_) => TransportPollResult::OutgoingMessage,
                    }
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming)
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    async fn poll(&mut self) -> TransportPollResult {
        // `poll_inner` is cancel safe because every async operation it
        // awaits is itself cancel safe, and it completes at most one of
        // them per call.
        if let TransportCloseState::Closed(c) = self.closed {
            return TransportPollResult::Closed(c);
        }

        let r = self.poll_inner().await;
        if let TransportPollResult::Closed(status) = &r {
            self.close(*status);
        }
        r
    }
}
