//! A minimal in-process OPC UA server speaking the None security policy,
//! enough to exercise connection establishment end to end.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures::StreamExt;
use tokio::{
    io::{AsyncWriteExt, WriteHalf},
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::FramedRead;

use uaclient_core::{
    comms::{
        chunker::Chunker,
        secure_channel::SecureChannel,
        tcp_codec::{Message, TcpCodec},
        tcp_types::AcknowledgeMessage,
    },
    RequestMessage, ResponseMessage,
};
use uaclient_types::{
    ByteString, ChannelSecurityToken, DateTime, DecodingOptions, EndpointDescription,
    MessageSecurityMode, NodeId, ResponseHeader, SimpleBinaryEncodable, StatusCode, UAString,
    UserTokenPolicy, UserTokenType,
};

pub const NONE_POLICY_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
pub const BASIC256SHA256_POLICY_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";

/// What the mock server should offer and how it should behave.
#[derive(Clone)]
pub struct MockBehavior {
    /// Endpoint templates. The endpoint url is filled in with the actual
    /// listen address when serving GetEndpoints.
    pub endpoints: Vec<EndpointDescription>,
    /// Accept TCP connections but never answer anything.
    pub silent: bool,
    /// The revised token lifetime handed out in OPN responses.
    pub revised_lifetime: u32,
    /// Service result for ActivateSession.
    pub activate_result: StatusCode,
}

impl Default for MockBehavior {
    fn default() -> Self {
        MockBehavior {
            endpoints: vec![none_anonymous_endpoint()],
            silent: false,
            revised_lifetime: 600_000,
            activate_result: StatusCode::Good,
        }
    }
}

/// An endpoint with security None, an empty transport profile (as seen in
/// the wild) and a single anonymous token policy.
pub fn none_anonymous_endpoint() -> EndpointDescription {
    EndpointDescription {
        security_mode: MessageSecurityMode::None,
        security_policy_uri: UAString::from(NONE_POLICY_URI),
        user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
        transport_profile_uri: UAString::null(),
        ..Default::default()
    }
}

/// An endpoint requiring Basic256Sha256 with sign and encrypt.
pub fn secure_endpoint() -> EndpointDescription {
    EndpointDescription {
        security_mode: MessageSecurityMode::SignAndEncrypt,
        security_policy_uri: UAString::from(BASIC256SHA256_POLICY_URI),
        user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
        transport_profile_uri: UAString::null(),
        ..Default::default()
    }
}

/// An anonymous-only endpoint offering a user name policy as well.
pub fn username_endpoint() -> EndpointDescription {
    EndpointDescription {
        user_identity_tokens: Some(vec![
            UserTokenPolicy::anonymous(),
            UserTokenPolicy {
                policy_id: UAString::from("username"),
                token_type: UserTokenType::UserName,
                ..Default::default()
            },
        ]),
        ..none_anonymous_endpoint()
    }
}

pub struct MockServer {
    pub url: String,
    accepts: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockServer {
    /// Bind to an ephemeral port and start serving connections.
    pub async fn start(behavior: MockBehavior) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("opc.tcp://{}", addr);
        let accepts = Arc::new(AtomicUsize::new(0));

        let handle = {
            let accepts = accepts.clone();
            let url = url.clone();
            tokio::spawn(async move {
                // Sockets of silent connections are parked here so the
                // client sees an open but mute peer.
                let mut parked = Vec::new();
                loop {
                    let Ok((socket, _)) = listener.accept().await else {
                        break;
                    };
                    accepts.fetch_add(1, Ordering::SeqCst);
                    if behavior.silent {
                        parked.push(socket);
                    } else {
                        tokio::spawn(serve_connection(socket, behavior.clone(), url.clone()));
                    }
                }
            })
        };

        MockServer {
            url,
            accepts,
            handle,
        }
    }

    /// Number of TCP connections accepted so far.
    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

struct ServedConnection {
    write: WriteHalf<TcpStream>,
    channel: SecureChannel,
    sequence_number: u32,
    token_id: u32,
    auth_token: NodeId,
    behavior: MockBehavior,
    url: String,
}

async fn serve_connection(socket: TcpStream, behavior: MockBehavior, url: String) {
    let (read, write) = tokio::io::split(socket);
    let mut framed = FramedRead::new(read, TcpCodec::new(DecodingOptions::test()));
    let mut conn = ServedConnection {
        write,
        channel: SecureChannel::new_no_certificate_store(),
        sequence_number: 0,
        token_id: 0,
        auth_token: NodeId::null(),
        behavior,
        url,
    };

    while let Some(Ok(message)) = framed.next().await {
        match message {
            Message::Hello(hello) => {
                let ack = AcknowledgeMessage::new(
                    0,
                    hello.send_buffer_size,
                    hello.receive_buffer_size,
                    hello.max_message_size,
                    hello.max_chunk_count,
                );
                conn.write.write_all(&ack.encode_to_vec()).await.unwrap();
            }
            Message::Chunk(chunk) => {
                let chunk = conn.channel.verify_and_remove_security(&chunk.data).unwrap();
                let request_id = chunk
                    .chunk_info(&conn.channel)
                    .unwrap()
                    .sequence_header
                    .request_id;
                let request: RequestMessage =
                    Chunker::decode(std::slice::from_ref(&chunk), &conn.channel, None).unwrap();
                if !handle_request(&mut conn, request_id, request).await {
                    return;
                }
            }
            other => panic!("Mock server received an unexpected message {other:?}"),
        }
    }
}

async fn handle_request(
    conn: &mut ServedConnection,
    request_id: u32,
    request: RequestMessage,
) -> bool {
    let response: ResponseMessage = match request {
        RequestMessage::OpenSecureChannel(request) => {
            conn.token_id += 1;
            let token = ChannelSecurityToken {
                channel_id: 1,
                token_id: conn.token_id,
                created_at: DateTime::now(),
                revised_lifetime: conn.behavior.revised_lifetime,
            };
            conn.channel.set_security_token(token.clone());
            uaclient_types::OpenSecureChannelResponse {
                response_header: ResponseHeader::new_good(request.request_header.request_handle),
                server_protocol_version: 0,
                security_token: token,
                server_nonce: uaclient_crypto::random::byte_string(32),
            }
            .into()
        }
        RequestMessage::GetEndpoints(request) => {
            let endpoints = conn
                .behavior
                .endpoints
                .iter()
                .cloned()
                .map(|mut e| {
                    e.endpoint_url = UAString::from(&conn.url);
                    e
                })
                .collect();
            uaclient_types::GetEndpointsResponse {
                response_header: ResponseHeader::new_good(request.request_header.request_handle),
                endpoints: Some(endpoints),
            }
            .into()
        }
        RequestMessage::CreateSession(request) => {
            conn.auth_token = NodeId::new(1, uaclient_types::Guid::new());
            uaclient_types::CreateSessionResponse {
                response_header: ResponseHeader::new_good(request.request_header.request_handle),
                session_id: NodeId::new(1, 1000u32),
                authentication_token: conn.auth_token.clone(),
                revised_session_timeout: request.requested_session_timeout,
                server_nonce: uaclient_crypto::random::byte_string(32),
                server_certificate: ByteString::null(),
                server_endpoints: None,
                server_software_certificates: None,
                server_signature: uaclient_types::SignatureData::null(),
                max_request_message_size: 0,
            }
            .into()
        }
        RequestMessage::ActivateSession(request) => {
            let service_result =
                if request.request_header.authentication_token != conn.auth_token {
                    StatusCode::BadSessionIdInvalid
                } else {
                    conn.behavior.activate_result
                };
            uaclient_types::ActivateSessionResponse {
                response_header: ResponseHeader::new_service_result(
                    request.request_header.request_handle,
                    service_result,
                ),
                server_nonce: uaclient_crypto::random::byte_string(32),
                results: None,
                diagnostic_infos: None,
            }
            .into()
        }
        RequestMessage::CloseSession(request) => uaclient_types::CloseSessionResponse {
            response_header: ResponseHeader::new_good(request.request_header.request_handle),
        }
        .into(),
        RequestMessage::CloseSecureChannel(_) => {
            // No response is defined, the connection just goes away.
            return false;
        }
    };

    let chunks = Chunker::encode(
        conn.sequence_number + 1,
        request_id,
        0,
        8192,
        &conn.channel,
        &response,
    )
    .unwrap();
    conn.sequence_number += chunks.len() as u32;
    for chunk in chunks {
        // Security policy None, chunks pass through untouched.
        conn.write.write_all(&chunk.data).await.unwrap();
    }
    true
}
