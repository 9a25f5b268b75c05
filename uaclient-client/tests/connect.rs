//! End to end connection establishment against an in-process mock server.

mod utils;

use std::time::Duration;

use uaclient::{Client, ClientBuilder, ClientState, PollResult};
use uaclient_types::{MessageSecurityMode, StatusCode};

use utils::{none_anonymous_endpoint, secure_endpoint, username_endpoint, MockBehavior, MockServer};

fn test_client() -> Client {
    ClientBuilder::new()
        .application_name("connect-tests")
        .application_uri("urn:connect-tests")
        .session_name("connect test session")
        .request_timeout(Duration::from_millis(2000))
        .client()
        .unwrap()
}

#[tokio::test]
async fn happy_none_connect_reaches_session() {
    let server = MockServer::start(MockBehavior::default()).await;

    let mut client = ClientBuilder::new()
        .application_name("connect-tests")
        .application_uri("urn:connect-tests")
        .security_mode(MessageSecurityMode::None)
        .request_timeout(Duration::from_millis(2000))
        .client()
        .unwrap();

    client.connect(&server.url).await.unwrap();
    assert_eq!(client.state(), ClientState::Session);
    assert!(!client.session_id().is_null());

    // Discovery ran and installed the selected endpoint, minus its token
    // list, plus the anonymous token policy.
    let endpoint = client.config().endpoint.as_ref().unwrap();
    assert_eq!(endpoint.endpoint_url.as_ref(), server.url);
    assert!(endpoint.user_identity_tokens.is_none());
    assert!(client.config().user_token_policy.is_some());

    // The policy was already None, so a single connection sufficed.
    assert_eq!(server.accept_count(), 1);

    assert_eq!(client.disconnect().await, StatusCode::Good);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn connect_no_session_stops_at_secure_channel() {
    let server = MockServer::start(MockBehavior::default()).await;

    let mut client = test_client();
    client.connect_no_session(&server.url).await.unwrap();
    assert_eq!(client.state(), ClientState::SecureChannel);
    assert!(client.session_id().is_null());

    assert_eq!(client.disconnect().await, StatusCode::Good);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn reentry_is_a_no_op() {
    let server = MockServer::start(MockBehavior::default()).await;

    let mut client = test_client();
    client.connect(&server.url).await.unwrap();
    assert_eq!(server.accept_count(), 1);

    // A second connect while active returns Good without any network IO.
    client.connect(&server.url).await.unwrap();
    assert_eq!(client.state(), ClientState::Session);
    assert_eq!(server.accept_count(), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn username_with_anonymous_only_server_fails() {
    // The server only offers anonymous token policies, the client demands
    // user name authentication.
    let server = MockServer::start(MockBehavior::default()).await;

    let mut client = test_client();
    let err = client
        .connect_username(&server.url, "user", "password4")
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::BadInternalError);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn username_connect_with_username_policy() {
    let server = MockServer::start(MockBehavior {
        endpoints: vec![username_endpoint()],
        ..Default::default()
    })
    .await;

    let mut client = test_client();
    client
        .connect_username(&server.url, "user", "password4")
        .await
        .unwrap();
    assert_eq!(client.state(), ClientState::Session);
    assert_eq!(
        client.config().user_token_policy.as_ref().unwrap().policy_id.as_ref(),
        "username"
    );
    client.disconnect().await;
}

#[tokio::test]
async fn secure_only_server_without_certificate_fails() {
    // The server offers only an encrypted endpoint. The client has no
    // certificate, so no endpoint qualifies.
    let server = MockServer::start(MockBehavior {
        endpoints: vec![secure_endpoint()],
        ..Default::default()
    })
    .await;

    let mut client = test_client();
    let err = client.connect(&server.url).await.unwrap_err();
    assert_eq!(err, StatusCode::BadInternalError);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn ack_timeout_yields_connection_closed() {
    let server = MockServer::start(MockBehavior {
        silent: true,
        ..Default::default()
    })
    .await;

    let mut client = ClientBuilder::new()
        .application_name("connect-tests")
        .application_uri("urn:connect-tests")
        .request_timeout(Duration::from_millis(500))
        .client()
        .unwrap();

    let start = std::time::Instant::now();
    let err = client.connect(&server.url).await.unwrap_err();
    assert_eq!(err, StatusCode::BadConnectionClosed);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn channel_renewal_fires_and_session_survives() {
    // A token lifetime of 1200ms makes renewal due after 900ms.
    let server = MockServer::start(MockBehavior {
        revised_lifetime: 1200,
        ..Default::default()
    })
    .await;

    let mut client = test_client();
    client.connect(&server.url).await.unwrap();
    assert_eq!(client.state(), ClientState::Session);

    // Drive the client until the renewal happens; the renewal deadline
    // itself wakes the poll on an otherwise silent connection.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match client.poll().await {
                PollResult::ChannelRenewed => break,
                PollResult::ConnectionLost(e) => panic!("Connection lost: {e}"),
                _ => {}
            }
        }
    })
    .await
    .expect("The channel token was never renewed");
    // Renewal is invisible to the session.
    assert_eq!(client.state(), ClientState::Session);

    client.disconnect().await;
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn get_endpoints_helper_is_one_shot() {
    let server = MockServer::start(MockBehavior {
        endpoints: vec![none_anonymous_endpoint(), secure_endpoint()],
        ..Default::default()
    })
    .await;

    let mut client = test_client();
    let endpoints = client.get_endpoints(&server.url).await.unwrap();
    assert_eq!(endpoints.len(), 2);
    // The helper does not change the client's own state.
    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(client.config().endpoint.is_none());

    assert!(client
        .get_endpoints("http://not-an-opc-url")
        .await
        .is_err());
}

#[tokio::test]
async fn rejected_activation_disconnects() {
    let server = MockServer::start(MockBehavior {
        activate_result: StatusCode::BadIdentityTokenRejected,
        ..Default::default()
    })
    .await;

    let mut client = test_client();
    let err = client.connect(&server.url).await.unwrap_err();
    assert_eq!(err, StatusCode::BadIdentityTokenRejected);
    assert_eq!(client.state(), ClientState::Disconnected);
}
