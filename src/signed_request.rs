use crate::api::ApiClient;
use crate::time::Time;
use crate::token::{scalar_i64, scalar_string, Token};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_REQUEST_ALGORITHM: &str = "HMAC-SHA256";

/// Verified content of a signed request
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    /// User the request was signed for (`user_id`)
    pub uid: Option<String>,
    /// Access token granted to the app (`oauth_token`), absent before authorization
    pub access_token: Option<String>,
    /// Absolute expiry of the access token
    pub expires_at: Option<Time>,
    /// Full decoded payload
    pub payload: Value,
}

impl SignedRequest {
    /// Token carried by the request, if the user has authorized the app
    pub fn token(&self) -> Option<Token> {
        let access_token = self.access_token.clone()?;
        Some(Token {
            access_token,
            secret: None,
            expires_at: self.expires_at,
            uid: self.uid.clone(),
            refresh_token: None,
        })
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

/// Verify and decode `signed_request` with `secret`.
///
/// Returns `None` for malformed input, for any algorithm other than
/// HMAC-SHA256, and when the signature does not match.
pub fn parse_signed_request(secret: &str, signed_request: &str, now: Time) -> Option<SignedRequest> {
    let (encoded_signature, encoded_payload) = signed_request.trim().split_once('.')?;
    let signature = decode_segment(encoded_signature)?;
    let payload: Value = serde_json::from_slice(&decode_segment(encoded_payload)?).ok()?;

    if payload.get("algorithm").and_then(Value::as_str) != Some(SIGNED_REQUEST_ALGORITHM) {
        tracing::debug!("signed request rejected: unsupported algorithm");
        return None;
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(encoded_payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::debug!("signed request rejected: signature mismatch");
        return None;
    }

    let expires_at = payload
        .get("expires")
        .and_then(scalar_i64)
        .filter(|&expires| expires != 0)
        .map(|expires| now.plus_seconds(expires));

    Some(SignedRequest {
        uid: payload.get("user_id").and_then(scalar_string),
        access_token: payload.get("oauth_token").and_then(scalar_string),
        expires_at,
        payload,
    })
}

impl ApiClient {
    /// Verify a signed request with the app secret
    pub fn parse_signed_request(&self, signed_request: &str) -> Option<SignedRequest> {
        parse_signed_request(&self.config.app_secret, signed_request, Time::now())
    }
}
