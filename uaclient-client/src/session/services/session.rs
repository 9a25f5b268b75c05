use log::error;

use uaclient_core::{trace_read_lock, ResponseMessage};
use uaclient_crypto::{self, CertificateStore, SecurityPolicy};
use uaclient_types::{
    ActivateSessionRequest, AnonymousIdentityToken, ApplicationDescription, ByteString,
    CloseSessionRequest, CreateSessionRequest, EndpointDescription, ExtensionObject,
    IssuedIdentityToken, NodeId, SignatureData, StatusCode, UAString, UserTokenPolicy,
    UserTokenType, X509IdentityToken,
};

use crate::{
    session::{process_service_result, process_unexpected_response},
    transport::AsyncSecureChannel,
    ClientConfig, IdentityToken,
};

// Per part 4, the timeout hint servers are given for session housekeeping
// requests like CloseSession and GetEndpoints.
pub(crate) const CLEANUP_TIMEOUT_HINT_MS: u32 = 10_000;

/// Build a CreateSessionRequest from the client configuration.
pub(crate) fn build_create_session_request(
    channel: &AsyncSecureChannel,
    config: &ClientConfig,
    client_description: ApplicationDescription,
    endpoint_url: &UAString,
    certificate_store: &CertificateStore,
) -> CreateSessionRequest {
    let client_certificate = certificate_store
        .read_own_cert()
        .map(|cert| cert.as_byte_string())
        .unwrap_or_default();
    CreateSessionRequest {
        request_header: channel.make_request_header(config.request_timeout),
        client_description,
        server_uri: UAString::null(),
        endpoint_url: endpoint_url.clone(),
        session_name: UAString::from(&config.session_name),
        client_nonce: channel.client_nonce(),
        client_certificate,
        requested_session_timeout: config.session_timeout as f64,
        max_response_message_size: 0,
    }
}

/// Digest a CreateSession response: validate the server certificate when
/// the channel is secured, install the server nonce, and hand back the
/// session id and authentication token.
pub(crate) fn process_create_session_response(
    response: ResponseMessage,
    channel: &AsyncSecureChannel,
    certificate_store: &CertificateStore,
) -> Result<(NodeId, NodeId), StatusCode> {
    let ResponseMessage::CreateSession(response) = response else {
        error!("create_session failed");
        return Err(process_unexpected_response(response));
    };
    log::debug!("create_session, success");
    process_service_result(&response.response_header)?;

    if channel.security_policy() != SecurityPolicy::None {
        let server_certificate =
            uaclient_crypto::X509::from_byte_string(&response.server_certificate)?;
        certificate_store.validate_server_cert(&server_certificate)?;
    }

    channel.update_from_created_session(&response.server_nonce, &response.server_certificate)?;

    Ok((response.session_id, response.authentication_token))
}

/// Build an ActivateSessionRequest carrying the configured user identity.
///
/// The token policy is the one selected during endpoint discovery, falling
/// back to the first policy of the right type on the endpoint.
pub(crate) fn build_activate_session_request(
    channel: &AsyncSecureChannel,
    config: &ClientConfig,
    endpoint: &EndpointDescription,
    certificate_store: &CertificateStore,
) -> Result<ActivateSessionRequest, StatusCode> {
    let user_token_type = match &config.user_identity_token {
        IdentityToken::Anonymous => UserTokenType::Anonymous,
        IdentityToken::UserName(_, _) => UserTokenType::UserName,
        IdentityToken::X509(_, _) => UserTokenType::Certificate,
        IdentityToken::IssuedToken(_) => UserTokenType::IssuedToken,
    };
    let policy = match config.user_token_policy.as_ref() {
        Some(policy) => policy.clone(),
        None => match endpoint.find_policy(user_token_type) {
            Some(policy) => policy.clone(),
            None => {
                error!(
                    "Cannot find user token type {:?} for this endpoint, cannot connect",
                    user_token_type
                );
                return Err(StatusCode::BadSecurityPolicyRejected);
            }
        },
    };

    let (user_identity_token, user_token_signature) =
        user_identity_token(channel, config, &policy)?;

    let security_policy = channel.security_policy();
    let client_signature = match security_policy {
        SecurityPolicy::None => SignatureData::null(),
        _ => {
            let client_pkey = certificate_store.read_own_pkey().map_err(|_| {
                error!("Cannot create client signature - no pkey!");
                StatusCode::BadUnexpectedError
            })?;
            let secure_channel = trace_read_lock!(channel.secure_channel);
            let Some(server_cert) = secure_channel.remote_cert() else {
                error!("Cannot sign server certificate because server cert is null");
                return Err(StatusCode::BadUnexpectedError);
            };
            let server_nonce = secure_channel.remote_nonce_as_byte_string();
            if server_nonce.is_empty() {
                error!("Cannot sign server certificate because server nonce is empty");
                return Err(StatusCode::BadUnexpectedError);
            }
            uaclient_crypto::create_signature_data(
                &client_pkey,
                security_policy,
                &server_cert.as_byte_string(),
                &server_nonce,
            )?
        }
    };

    let locale_ids = if config.preferred_locales.is_empty() {
        None
    } else {
        Some(
            config
                .preferred_locales
                .iter()
                .map(UAString::from)
                .collect(),
        )
    };

    Ok(ActivateSessionRequest {
        request_header: channel.make_request_header(config.request_timeout),
        client_signature,
        client_software_certificates: None,
        locale_ids,
        user_identity_token,
        user_token_signature,
    })
}

fn user_identity_token(
    channel: &AsyncSecureChannel,
    config: &ClientConfig,
    policy: &UserTokenPolicy,
) -> Result<(ExtensionObject, SignatureData), StatusCode> {
    match &config.user_identity_token {
        IdentityToken::Anonymous => {
            let identity_token = AnonymousIdentityToken {
                policy_id: policy.policy_id.clone(),
            };
            Ok((
                ExtensionObject::from_message(&identity_token),
                SignatureData::null(),
            ))
        }
        IdentityToken::UserName(user, pass) => {
            let secure_channel = trace_read_lock!(channel.secure_channel);
            let identity_token = uaclient_crypto::make_user_name_identity_token(
                secure_channel.security_policy(),
                policy,
                secure_channel.remote_nonce(),
                &secure_channel.remote_cert(),
                user,
                pass,
            )?;
            Ok((
                ExtensionObject::from_message(&identity_token),
                SignatureData::null(),
            ))
        }
        IdentityToken::X509(cert_path, private_key_path) => {
            let secure_channel = trace_read_lock!(channel.secure_channel);
            let Some(server_cert) = secure_channel.remote_cert() else {
                error!("Cannot create an X509IdentityToken because the remote server has no cert with which to create a signature");
                return Err(StatusCode::BadCertificateInvalid);
            };
            let mut user_store = CertificateStore::new();
            user_store.load_own_keypair(cert_path, private_key_path)?;
            let certificate_data = user_store.read_own_cert()?;
            let private_key = user_store.read_own_pkey()?;

            let token_policy = if policy.security_policy_uri.is_empty() {
                secure_channel.security_policy()
            } else {
                SecurityPolicy::from_uri(policy.security_policy_uri.as_ref())
            };
            let signing_policy = if token_policy == SecurityPolicy::None {
                // A signature still has to be produced, use the channel's
                // policy algorithms.
                secure_channel.security_policy()
            } else {
                token_policy
            };
            let user_token_signature = uaclient_crypto::create_signature_data(
                &private_key,
                signing_policy,
                &server_cert.as_byte_string(),
                &secure_channel.remote_nonce_as_byte_string(),
            )?;

            let identity_token = X509IdentityToken {
                policy_id: policy.policy_id.clone(),
                certificate_data: certificate_data.as_byte_string(),
            };
            Ok((
                ExtensionObject::from_message(&identity_token),
                user_token_signature,
            ))
        }
        IdentityToken::IssuedToken(token_data) => {
            // Encrypting issued tokens is not supported, they are passed
            // through as-is.
            let identity_token = IssuedIdentityToken {
                policy_id: policy.policy_id.clone(),
                token_data: ByteString::from(token_data.clone()),
                encryption_algorithm: UAString::null(),
            };
            Ok((
                ExtensionObject::from_message(&identity_token),
                SignatureData::null(),
            ))
        }
    }
}

/// Digest an ActivateSession response.
pub(crate) fn process_activate_session_response(
    response: ResponseMessage,
) -> Result<(), StatusCode> {
    let ResponseMessage::ActivateSession(response) = response else {
        error!("activate_session failed");
        return Err(process_unexpected_response(response));
    };
    log::debug!("activate_session success");
    process_service_result(&response.response_header)
}

/// Build a CloseSessionRequest. Subscriptions are always deleted; the
/// client has no way to pick them up again.
pub(crate) fn build_close_session_request(channel: &AsyncSecureChannel) -> CloseSessionRequest {
    CloseSessionRequest {
        request_header: channel.make_request_header(std::time::Duration::from_millis(
            CLEANUP_TIMEOUT_HINT_MS as u64,
        )),
        delete_subscriptions: true,
    }
}
