use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, warn};

use uaclient_core::{
    comms::{
        chunker::Chunker,
        message_chunk::{MessageChunk, MessageIsFinalType},
        secure_channel::SecureChannel,
        tcp_codec::Message,
    },
    sync::RwLock,
    trace_read_lock, trace_write_lock, RequestMessage, ResponseMessage,
};
use uaclient_types::StatusCode;

/// The result of polling the transport once.
#[derive(Debug, Clone, Copy)]
pub enum TransportPollResult {
    /// An outgoing message was moved into the send buffer.
    OutgoingMessage,
    /// Bytes of an outgoing message were written to the stream.
    OutgoingMessageSent,
    /// An incoming message was received and dispatched.
    IncomingMessage,
    /// Sending a single request failed, the transport survives.
    RecoverableError(StatusCode),
    /// The transport is closed, with the reason.
    Closed(StatusCode),
}

/// A message queued for transmission, together with the callback the
/// response is routed to.
pub struct OutgoingMessage {
    /// The request itself.
    pub request: RequestMessage,
    /// Where the response goes. `None` for fire-and-forget messages like
    /// CloseSecureChannel.
    pub callback: Option<tokio::sync::oneshot::Sender<Result<ResponseMessage, StatusCode>>>,
    /// The request id assigned by the channel, strictly increasing.
    pub request_id: u32,
}

/// Shared bookkeeping of an open transport: the secure channel, the queue
/// of outgoing messages and the callbacks of requests in flight.
pub(crate) struct TransportState {
    /// The secure channel, shared with whoever needs to encode and decode.
    pub(crate) secure_channel: Arc<RwLock<SecureChannel>>,
    /// Incoming queue of messages to send.
    outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    /// Callbacks of requests awaiting their response, by request id.
    callbacks: HashMap<u32, tokio::sync::oneshot::Sender<Result<ResponseMessage, StatusCode>>>,
    /// Chunks of a partially received message.
    pending_chunks: Vec<MessageChunk>,
    /// Sequence number validation state.
    last_received_sequence_number: u32,
    /// Limit on the number of chunks held in `pending_chunks`.
    max_pending_incoming: usize,
}

impl TransportState {
    pub(crate) fn new(
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        max_pending_incoming: usize,
    ) -> Self {
        Self {
            secure_channel,
            outgoing_recv,
            callbacks: HashMap::new(),
            pending_chunks: Vec::new(),
            last_received_sequence_number: 0,
            max_pending_incoming,
        }
    }

    /// Wait for the next message to send. Returns `None` when the sender
    /// side is dropped, which closes the transport cleanly.
    pub(crate) async fn wait_for_outgoing_message(&mut self) -> Option<(RequestMessage, u32)> {
        let message = self.outgoing_recv.recv().await?;
        if let Some(callback) = message.callback {
            self.callbacks.insert(message.request_id, callback);
        }
        Some((message.request, message.request_id))
    }

    /// Dispatch one incoming message. Chunks accumulate until the final
    /// chunk arrives, then the whole message is decoded and routed to the
    /// callback registered for its request id.
    pub(crate) fn handle_incoming_message(&mut self, message: Message) -> Result<(), StatusCode> {
        match message {
            Message::Chunk(chunk) => self.process_chunk(chunk),
            Message::Error(error) => {
                let status = error.status_code();
                error!("Received an error message from the server: {status}");
                Err(status)
            }
            unexpected => {
                error!("Received an unexpected message: {unexpected:?}");
                Err(StatusCode::BadUnexpectedError)
            }
        }
    }

    /// A message could not be written to the wire. The transport survives,
    /// only this request fails.
    pub(crate) fn message_send_failed(&mut self, request_id: u32, status: StatusCode) {
        if let Some(callback) = self.callbacks.remove(&request_id) {
            let _ = callback.send(Err(status));
        }
    }

    /// Fail every request in flight. Called when the transport closes so
    /// nothing waits forever.
    pub(crate) fn close(&mut self, status: StatusCode) {
        let status = if status.is_good() {
            StatusCode::BadConnectionClosed
        } else {
            status
        };
        for (_, callback) in self.callbacks.drain() {
            let _ = callback.send(Err(status));
        }
        self.pending_chunks.clear();
    }

    fn process_chunk(&mut self, chunk: MessageChunk) -> Result<(), StatusCode> {
        let chunk = {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.verify_and_remove_security(&chunk.data)?
        };
        let secure_channel = trace_read_lock!(self.secure_channel);
        let header = chunk.message_header(&secure_channel.decoding_options())?;
        match header.is_final {
            MessageIsFinalType::Intermediate => {
                if self.pending_chunks.len() >= self.max_pending_incoming {
                    error!(
                        "Too many pending incoming chunks, the limit is {}",
                        self.max_pending_incoming
                    );
                    return Err(StatusCode::BadEncodingLimitsExceeded);
                }
                self.pending_chunks.push(chunk);
                Ok(())
            }
            MessageIsFinalType::FinalError => {
                warn!("Message has been aborted by the server");
                self.pending_chunks.clear();
                Ok(())
            }
            MessageIsFinalType::Final => {
                self.pending_chunks.push(chunk);
                let chunks = std::mem::take(&mut self.pending_chunks);
                self.last_received_sequence_number = Chunker::validate_chunks(
                    self.last_received_sequence_number + 1,
                    &secure_channel,
                    &chunks,
                )?;
                let request_id = chunks[0]
                    .chunk_info(&secure_channel)?
                    .sequence_header
                    .request_id;
                let message: ResponseMessage = Chunker::decode(&chunks, &secure_channel, None)?;
                drop(secure_channel);
                self.dispatch_response(request_id, message);
                Ok(())
            }
        }
    }

    fn dispatch_response(&mut self, request_id: u32, message: ResponseMessage) {
        match self.callbacks.remove(&request_id) {
            Some(callback) => {
                let _ = callback.send(Ok(message));
            }
            None => {
                // A response nobody asked for, e.g. for a request that
                // already timed out.
                debug!("No callback registered for request id {request_id}");
            }
        }
    }
}
