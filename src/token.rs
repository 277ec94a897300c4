use crate::error::{Result, SnsError};
use crate::time::Time;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Token represents an access token granted by the provider.
///
/// `expires_at` is always an absolute timestamp, never a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token for API requests (the oauth_token under OAuth 1.0a)
    pub access_token: String,

    /// Token secret, used only for OAuth 1.0a signing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Absolute expiry; `None` for tokens the provider never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Time>,

    /// User the token was granted for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Refresh token, when the provider returns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Token {
    /// Create a new OAuth 2.0 token expiring at `expires_at`
    pub fn new(access_token: impl Into<String>, expires_at: Time) -> Self {
        Token {
            access_token: access_token.into(),
            secret: None,
            expires_at: Some(expires_at),
            uid: None,
            refresh_token: None,
        }
    }

    /// Create a new OAuth 1.0a token pair, which carries no expiry
    pub fn oauth1(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Token {
            access_token: token.into(),
            secret: Some(secret.into()),
            expires_at: None,
            uid: None,
            refresh_token: None,
        }
    }

    /// Set the user id
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Check whether the token is stale at `now`
    pub fn is_expired_at(&self, now: Time) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Build a token from a token-endpoint grant.
    ///
    /// The expiry is the earlier of `now + expires_in` and, when present,
    /// `now + remind_in`.
    pub fn from_grant(grant: &Value, now: Time) -> Result<Self> {
        let access_token = grant
            .get("access_token")
            .and_then(scalar_string)
            .ok_or_else(|| {
                SnsError::transport(None, "token response carries no access_token", None)
            })?;

        let expires_in = grant
            .get("expires_in")
            .and_then(scalar_i64)
            .ok_or_else(|| {
                SnsError::transport(None, "token response carries no expires_in", None)
            })?;

        let mut expires_at = now.plus_seconds(expires_in);
        if let Some(remind_in) = grant.get("remind_in").and_then(scalar_i64) {
            let remind_at = now.plus_seconds(remind_in);
            if remind_at < expires_at {
                expires_at = remind_at;
            }
        }

        Ok(Token {
            access_token,
            secret: None,
            expires_at: Some(expires_at),
            uid: grant.get("uid").and_then(scalar_string),
            refresh_token: grant.get("refresh_token").and_then(scalar_string),
        })
    }
}

/// Read a string or number field as text
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer that may arrive as a number or a numeric string
pub(crate) fn scalar_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Lifecycle of the held token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unset,
    Valid,
    Expired,
}

/// Holds the current token. Reads and writes go through a mutex, so a client
/// shared between threads never observes a half-updated token.
#[derive(Debug, Default)]
pub struct TokenManager {
    token: Mutex<Option<Token>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Token>> {
        // A panic while holding the lock cannot leave a token half-written.
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the held token
    pub fn set(&self, token: Token) {
        *self.lock() = Some(token);
    }

    /// Set an access token with an absolute expiry, keeping the user id and
    /// refresh token when the access token is unchanged
    pub fn set_access_token(&self, access_token: &str, expires_at: Time) {
        let mut guard = self.lock();
        let mut token = Token::new(access_token, expires_at);
        if let Some(previous) = guard.take() {
            if previous.access_token == access_token {
                token.uid = previous.uid;
                token.refresh_token = previous.refresh_token;
            }
        }
        *guard = Some(token);
    }

    /// Forget the held token
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Snapshot of the held token
    pub fn current(&self) -> Option<Token> {
        self.lock().clone()
    }

    /// State of the held token at `now`
    pub fn state_at(&self, now: Time) -> TokenState {
        match self.lock().as_ref() {
            None => TokenState::Unset,
            Some(token) if token.is_expired_at(now) => TokenState::Expired,
            Some(_) => TokenState::Valid,
        }
    }

    pub fn state(&self) -> TokenState {
        self.state_at(Time::now())
    }

    /// True unless a token is held and still fresh
    pub fn is_expired(&self) -> bool {
        self.state() != TokenState::Valid
    }

    /// Token to authenticate `request` with. Fails fast when the held token
    /// is stale; yields `None` when no token is held.
    pub fn for_request(&self, request: &str) -> Result<Option<Token>> {
        let now = Time::now();
        let guard = self.lock();
        match guard.as_ref() {
            Some(token) if token.is_expired_at(now) => Err(SnsError::ExpiredToken {
                request: request.to_string(),
            }),
            other => Ok(other.cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_creation() {
        let token = Token::new("access123", Time::from_unix(4_000_000_000)).with_uid("42");
        assert_eq!(token.access_token, "access123");
        assert_eq!(token.uid.as_deref(), Some("42"));
        assert!(token.secret.is_none());
    }

    #[test]
    fn test_token_serialization() {
        let token = Token::new("access123", Time::from_unix(1_400_000_000));
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, r#"{"access_token":"access123","expires_at":1400000000}"#);

        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Time::now();
        assert!(Token::new("t", now.plus_seconds(-1)).is_expired_at(now));
        assert!(!Token::new("t", now.plus_seconds(1)).is_expired_at(now));
        assert!(!Token::oauth1("t", "s").is_expired_at(now));
    }

    #[test]
    fn test_grant_uses_primary_horizon_alone() {
        let now = Time::from_unix(1_000_000);
        let grant = json!({"access_token": "abc", "expires_in": 3600, "uid": 1234});
        let token = Token::from_grant(&grant, now).unwrap();
        assert_eq!(token.expires_at, Some(Time::from_unix(1_003_600)));
        assert_eq!(token.uid.as_deref(), Some("1234"));
    }

    #[test]
    fn test_grant_takes_earlier_remind_horizon() {
        let now = Time::from_unix(1_000_000);
        let grant = json!({"access_token": "abc", "expires_in": 157679999, "remind_in": "1800"});
        let token = Token::from_grant(&grant, now).unwrap();
        assert_eq!(token.expires_at, Some(Time::from_unix(1_001_800)));

        let grant = json!({"access_token": "abc", "expires_in": "600", "remind_in": 1800});
        let token = Token::from_grant(&grant, now).unwrap();
        assert_eq!(token.expires_at, Some(Time::from_unix(1_000_600)));
    }

    #[test]
    fn test_grant_requires_access_token() {
        let err = Token::from_grant(&json!({"expires_in": 10}), Time::now()).unwrap_err();
        assert!(matches!(err, SnsError::Transport { .. }));
    }

    #[test]
    fn test_manager_states() {
        let manager = TokenManager::new();
        let now = Time::from_unix(2_000_000);
        assert_eq!(manager.state_at(now), TokenState::Unset);
        assert!(manager.is_expired());

        manager.set_access_token("abc", now.plus_seconds(1));
        assert_eq!(manager.state_at(now), TokenState::Valid);
        assert_eq!(manager.state_at(now.plus_seconds(1)), TokenState::Expired);

        manager.clear();
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_for_request_fails_fast_when_expired() {
        let manager = TokenManager::new();
        assert!(manager.for_request("statuses/update").unwrap().is_none());

        manager.set_access_token("abc", Time::now().plus_seconds(-1));
        match manager.for_request("statuses/update") {
            Err(SnsError::ExpiredToken { request }) => assert_eq!(request, "statuses/update"),
            other => panic!("expected expired token error, got {:?}", other),
        }

        manager.set_access_token("abc", Time::now().plus_seconds(3600));
        assert_eq!(manager.for_request("x").unwrap().unwrap().access_token, "abc");
    }

    #[test]
    fn test_set_access_token_keeps_uid_for_same_token() {
        let manager = TokenManager::new();
        manager.set(Token::new("abc", Time::from_unix(10)).with_uid("7"));
        manager.set_access_token("abc", Time::from_unix(20));
        assert_eq!(manager.current().unwrap().uid.as_deref(), Some("7"));

        manager.set_access_token("other", Time::from_unix(20));
        assert!(manager.current().unwrap().uid.is_none());
    }
}
