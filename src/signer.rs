use crate::params::{percent_encode, Params};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

const OAUTH_PREFIX: &str = "oauth_";
const OAUTH_SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Which OAuth protocol a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuthVersion {
    OAuth1,
    OAuth2,
}

/// Where an OAuth 2.0 access token travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPlacement {
    /// `Authorization: OAuth2 <token>`
    Header,
    /// `access_token` and `oauth_consumer_key` query parameters
    Query,
}

/// Authentication material to attach to one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAuth {
    /// Value of the `Authorization` header, if any
    pub authorization: Option<String>,
    /// Parameters to merge into the request parameters
    pub params: Vec<(String, String)>,
}

/// Fresh unique nonce
pub fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Build the OAuth 1.0a signature base string.
///
/// Keys and values are percent-encoded first and the encoded pairs are then
/// sorted, by key and then by value.
pub fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&joined)
    )
}

/// `percent-encode(consumer_secret)&percent-encode(token_secret)`
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or(""))
    )
}

/// Base64(HMAC-SHA1(key, base_string)), not yet percent-encoded
pub fn hmac_sha1_signature(key: &str, base_string: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `Authorization` header value listing only the `oauth_*` parameters.
///
/// Values are percent-encoded; `signature` is the raw base64 signature.
pub fn authorization_header(params: &[(String, String)], signature: &str) -> String {
    let mut fields: Vec<String> = params
        .iter()
        .filter(|(k, _)| k.starts_with(OAUTH_PREFIX))
        .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", percent_encode(signature)));
    fields.sort();
    format!("OAuth {}", fields.join(", "))
}

/// Consumer credentials plus the optional token pair used for OAuth 1.0a
#[derive(Debug, Clone)]
pub struct OAuth1Signer<'a> {
    consumer_key: &'a str,
    consumer_secret: &'a str,
    token: Option<&'a str>,
    token_secret: Option<&'a str>,
    callback: Option<&'a str>,
    verifier: Option<&'a str>,
    nonce: Option<String>,
    timestamp: Option<u64>,
}

impl<'a> OAuth1Signer<'a> {
    pub fn new(consumer_key: &'a str, consumer_secret: &'a str) -> Self {
        OAuth1Signer {
            consumer_key,
            consumer_secret,
            token: None,
            token_secret: None,
            callback: None,
            verifier: None,
            nonce: None,
            timestamp: None,
        }
    }

    /// Set the oauth_token and its secret
    pub fn token(self, token: &'a str, secret: Option<&'a str>) -> Self {
        OAuth1Signer {
            token: Some(token),
            token_secret: secret,
            ..self
        }
    }

    /// Set the oauth_callback value
    pub fn callback(self, callback: &'a str) -> Self {
        OAuth1Signer {
            callback: Some(callback),
            ..self
        }
    }

    /// Set the oauth_verifier value
    pub fn verifier(self, verifier: &'a str) -> Self {
        OAuth1Signer {
            verifier: Some(verifier),
            ..self
        }
    }

    /// Pin the oauth_nonce value instead of generating one
    pub fn nonce(self, nonce: impl Into<String>) -> Self {
        OAuth1Signer {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// Pin the oauth_timestamp value instead of reading the clock
    pub fn timestamp(self, timestamp: u64) -> Self {
        OAuth1Signer {
            timestamp: Some(timestamp),
            ..self
        }
    }

    fn oauth_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.to_string()),
            (
                "oauth_nonce".to_string(),
                self.nonce.clone().unwrap_or_else(generate_nonce),
            ),
            (
                "oauth_signature_method".to_string(),
                OAUTH_SIGNATURE_METHOD.to_string(),
            ),
            (
                "oauth_timestamp".to_string(),
                self.timestamp.unwrap_or_else(unix_timestamp).to_string(),
            ),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = self.token {
            params.push(("oauth_token".to_string(), token.to_string()));
        }
        if let Some(callback) = self.callback {
            params.push(("oauth_callback".to_string(), callback.to_string()));
        }
        if let Some(verifier) = self.verifier {
            params.push(("oauth_verifier".to_string(), verifier.to_string()));
        }
        params
    }

    /// Sign a request and return its `Authorization` header value.
    ///
    /// `request_params` are the non-OAuth parameters that take part in the
    /// signature (query or form parameters; never multipart parts).
    pub fn sign(&self, method: &str, url: &str, request_params: &[(String, String)]) -> String {
        let oauth = self.oauth_params();
        let mut all = oauth.clone();
        all.extend(request_params.iter().cloned());

        let base = base_string(method, url, &all);
        let key = signing_key(self.consumer_secret, self.token_secret);
        let signature = hmac_sha1_signature(&key, &base);
        tracing::debug!(method, url, "signed OAuth 1.0a request");

        authorization_header(&oauth, &signature)
    }
}

/// OAuth 2.0 authentication for one request
pub fn bearer(access_token: &str, placement: TokenPlacement, client_id: &str) -> RequestAuth {
    match placement {
        TokenPlacement::Header => RequestAuth {
            authorization: Some(format!("OAuth2 {}", access_token)),
            params: Vec::new(),
        },
        TokenPlacement::Query => RequestAuth {
            authorization: None,
            params: vec![
                ("access_token".to_string(), access_token.to_string()),
                ("oauth_consumer_key".to_string(), client_id.to_string()),
            ],
        },
    }
}

impl RequestAuth {
    /// Merge the query-borne parts into `params`
    pub fn apply_params(&self, params: &mut Params) {
        for (k, v) in &self.params {
            params.insert(k.clone(), v.clone());
        }
    }
}
