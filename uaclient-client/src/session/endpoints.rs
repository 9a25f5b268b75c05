use log::{debug, error, warn};

use uaclient_types::{
    constants::PROFILE_TRANSPORT_BINARY, EndpointDescription, MessageSecurityMode,
    UserTokenPolicy, UserTokenType,
};

use crate::IdentityToken;

/// Pick the first endpoint and user token policy, in the server's order,
/// that the client can actually use. `security_mode` and
/// `security_policy_uri` narrow the candidates when configured
/// (`MessageSecurityMode::Invalid` and an empty string accept anything).
/// `have_local_policy` reports whether the client can operate a given
/// security policy URI.
///
/// There is no scoring, the first match wins, both for the endpoint and
/// for the token policy within it.
pub(crate) fn select_endpoint_and_token_policy<'a>(
    endpoints: &'a [EndpointDescription],
    security_mode: MessageSecurityMode,
    security_policy_uri: &str,
    identity: &IdentityToken,
    have_local_policy: impl Fn(&str) -> bool,
) -> Result<(&'a EndpointDescription, &'a UserTokenPolicy), uaclient_types::StatusCode> {
    let endpoint = endpoints.iter().find(|endpoint| {
        endpoint_qualifies(
            endpoint,
            security_mode,
            security_policy_uri,
            &have_local_policy,
        )
    });
    let Some(endpoint) = endpoint else {
        error!("No suitable endpoint found");
        return Err(uaclient_types::StatusCode::BadInternalError);
    };
    debug!(
        "Selected endpoint {} with policy {} and mode {}",
        endpoint.endpoint_url, endpoint.security_policy_uri, endpoint.security_mode
    );

    let token_policy = endpoint
        .user_identity_tokens
        .iter()
        .flatten()
        .find(|policy| token_policy_qualifies(policy, identity, &have_local_policy));
    let Some(token_policy) = token_policy else {
        error!("No suitable UserTokenPolicy");
        return Err(uaclient_types::StatusCode::BadInternalError);
    };

    Ok((endpoint, token_policy))
}

fn endpoint_qualifies(
    endpoint: &EndpointDescription,
    security_mode: MessageSecurityMode,
    security_policy_uri: &str,
    have_local_policy: &impl Fn(&str) -> bool,
) -> bool {
    // Some servers leave the transport profile blank, accept that as the
    // binary profile.
    if !endpoint.transport_profile_uri.is_empty()
        && endpoint.transport_profile_uri.as_ref() != PROFILE_TRANSPORT_BINARY
    {
        debug!(
            "Rejecting endpoint {}, transport profile {} is not the binary profile",
            endpoint.endpoint_url, endpoint.transport_profile_uri
        );
        return false;
    }
    if endpoint.security_mode == MessageSecurityMode::Invalid {
        warn!(
            "Skipping endpoint {}, its security mode is not valid",
            endpoint.endpoint_url
        );
        return false;
    }
    if security_mode != MessageSecurityMode::Invalid && endpoint.security_mode != security_mode {
        return false;
    }
    if !security_policy_uri.is_empty()
        && endpoint.security_policy_uri.as_ref() != security_policy_uri
    {
        return false;
    }
    if !have_local_policy(endpoint.security_policy_uri.as_ref()) {
        debug!(
            "Rejecting endpoint {}, no local security policy for {}",
            endpoint.endpoint_url, endpoint.security_policy_uri
        );
        return false;
    }
    true
}

fn token_policy_qualifies(
    policy: &UserTokenPolicy,
    identity: &IdentityToken,
    have_local_policy: &impl Fn(&str) -> bool,
) -> bool {
    // A token policy may name its own security policy, which the client
    // must then be able to operate.
    if !policy.security_policy_uri.is_empty()
        && !have_local_policy(policy.security_policy_uri.as_ref())
    {
        return false;
    }
    match identity {
        IdentityToken::Anonymous => policy.token_type == UserTokenType::Anonymous,
        IdentityToken::UserName(_, _) => policy.token_type == UserTokenType::UserName,
        IdentityToken::X509(_, _) => policy.token_type == UserTokenType::Certificate,
        IdentityToken::IssuedToken(_) => policy.token_type == UserTokenType::IssuedToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uaclient_crypto::SecurityPolicy;
    use uaclient_types::{StatusCode, UAString};

    fn none_endpoint() -> EndpointDescription {
        EndpointDescription {
            endpoint_url: UAString::from("opc.tcp://localhost:4855/"),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: UAString::from(SecurityPolicy::None.to_uri()),
            user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
            transport_profile_uri: UAString::from(PROFILE_TRANSPORT_BINARY),
            ..Default::default()
        }
    }

    fn secure_endpoint() -> EndpointDescription {
        EndpointDescription {
            security_mode: MessageSecurityMode::SignAndEncrypt,
            security_policy_uri: UAString::from(SecurityPolicy::Basic256Sha256.to_uri()),
            ..none_endpoint()
        }
    }

    fn any_local_policy(_: &str) -> bool {
        true
    }

    fn none_only(uri: &str) -> bool {
        SecurityPolicy::from_uri(uri) == SecurityPolicy::None
    }

    #[test]
    fn first_match_wins_in_server_order() {
        let endpoints = vec![secure_endpoint(), none_endpoint()];
        let (endpoint, _) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::Anonymous,
            any_local_policy,
        )
        .unwrap();
        assert_eq!(endpoint, &endpoints[0]);
    }

    #[test]
    fn empty_transport_profile_is_accepted() {
        let endpoints = vec![EndpointDescription {
            transport_profile_uri: UAString::null(),
            ..none_endpoint()
        }];
        assert!(select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::Anonymous,
            any_local_policy,
        )
        .is_ok());
    }

    #[test]
    fn foreign_transport_profile_is_rejected() {
        let endpoints = vec![EndpointDescription {
            transport_profile_uri: UAString::from(
                "http://opcfoundation.org/UA-Profile/Transport/https-uabinary",
            ),
            ..none_endpoint()
        }];
        assert_eq!(
            select_endpoint_and_token_policy(
                &endpoints,
                MessageSecurityMode::Invalid,
                "",
                &IdentityToken::Anonymous,
                any_local_policy,
            )
            .unwrap_err(),
            StatusCode::BadInternalError
        );
    }

    #[test]
    fn invalid_security_mode_is_skipped() {
        // The first endpoint has a garbage mode, iteration continues to the
        // second.
        let endpoints = vec![
            EndpointDescription {
                security_mode: MessageSecurityMode::Invalid,
                ..none_endpoint()
            },
            none_endpoint(),
        ];
        let (endpoint, _) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::Anonymous,
            any_local_policy,
        )
        .unwrap();
        assert_eq!(endpoint, &endpoints[1]);
    }

    #[test]
    fn configured_mode_and_policy_filter() {
        let endpoints = vec![none_endpoint(), secure_endpoint()];
        let (endpoint, _) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::SignAndEncrypt,
            "",
            &IdentityToken::Anonymous,
            any_local_policy,
        )
        .unwrap();
        assert_eq!(endpoint.security_mode, MessageSecurityMode::SignAndEncrypt);

        let (endpoint, _) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            SecurityPolicy::Basic256Sha256.to_uri(),
            &IdentityToken::Anonymous,
            any_local_policy,
        )
        .unwrap();
        assert_eq!(
            endpoint.security_policy_uri.as_ref(),
            SecurityPolicy::Basic256Sha256.to_uri()
        );
    }

    #[test]
    fn endpoint_without_local_policy_is_skipped() {
        let endpoints = vec![secure_endpoint(), none_endpoint()];
        let (endpoint, _) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::Anonymous,
            none_only,
        )
        .unwrap();
        assert_eq!(
            endpoint.security_policy_uri.as_ref(),
            SecurityPolicy::None.to_uri()
        );
    }

    #[test]
    fn username_identity_needs_a_username_policy() {
        // Scenario: the client wants user name auth, the server only offers
        // anonymous.
        let endpoints = vec![none_endpoint()];
        assert_eq!(
            select_endpoint_and_token_policy(
                &endpoints,
                MessageSecurityMode::Invalid,
                "",
                &IdentityToken::UserName("user".into(), "pass".into()),
                any_local_policy,
            )
            .unwrap_err(),
            StatusCode::BadInternalError
        );

        // Add a user name policy and it qualifies.
        let endpoints = vec![EndpointDescription {
            user_identity_tokens: Some(vec![
                UserTokenPolicy::anonymous(),
                UserTokenPolicy {
                    policy_id: UAString::from("username"),
                    token_type: UserTokenType::UserName,
                    ..Default::default()
                },
            ]),
            ..none_endpoint()
        }];
        let (_, policy) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::UserName("user".into(), "pass".into()),
            any_local_policy,
        )
        .unwrap();
        assert_eq!(policy.token_type, UserTokenType::UserName);
    }

    #[test]
    fn token_policy_with_unavailable_policy_uri_is_skipped() {
        let endpoints = vec![EndpointDescription {
            user_identity_tokens: Some(vec![
                UserTokenPolicy {
                    policy_id: UAString::from("anonymous-encrypted"),
                    token_type: UserTokenType::Anonymous,
                    security_policy_uri: UAString::from(
                        SecurityPolicy::Basic256Sha256.to_uri(),
                    ),
                    ..Default::default()
                },
                UserTokenPolicy::anonymous(),
            ]),
            ..none_endpoint()
        }];
        let (_, policy) = select_endpoint_and_token_policy(
            &endpoints,
            MessageSecurityMode::Invalid,
            "",
            &IdentityToken::Anonymous,
            none_only,
        )
        .unwrap();
        assert_eq!(policy.policy_id.as_ref(), "anonymous");
    }
}
