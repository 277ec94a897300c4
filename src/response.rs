use crate::error::{Result, SnsError};
use crate::token::scalar_string;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Index;

/// ApiResult is the decoded body of a successful API call.
/// It offers key access, slash-path access and typed accessors over the JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiResult(Value);

static NULL: Value = Value::Null;

impl ApiResult {
    pub fn new(value: Value) -> Self {
        ApiResult(value)
    }

    /// Get the raw JSON value
    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Top-level fields, when the payload is an object
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Get a value by a slash-separated path.
    /// For example, "user/name" would access the "name" field inside the "user" object.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;

        for part in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }

    /// Get a string value by path; numbers are rendered as text
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get_path(path).and_then(scalar_string)
    }

    /// Get an integer value by path
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_path(path).and_then(Value::as_i64)
    }

    /// Get a boolean value by path
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_path(path).and_then(Value::as_bool)
    }

    /// Apply unmarshals the payload into the provided type
    pub fn apply<T>(&self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.0.clone()).map_err(SnsError::from)
    }
}

impl Index<&str> for ApiResult {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

/// Convert a parsed body carrying `error_code` into the structured error
fn error_envelope(value: &Value) -> Option<SnsError> {
    let obj = value.as_object()?;
    let code = obj.get("error_code")?;
    let text = |key: &str| obj.get(key).and_then(scalar_string).unwrap_or_default();
    Some(SnsError::Api {
        code: scalar_string(code).unwrap_or_else(|| code.to_string()),
        message: text("error"),
        request: text("request"),
    })
}

/// Turn a parsed body into a result, raising the provider's envelope
pub fn from_value(value: Value) -> Result<ApiResult> {
    match error_envelope(&value) {
        Some(err) => Err(err),
        None => Ok(ApiResult(value)),
    }
}

/// Decode the body of a 2xx response.
/// A body that is not JSON is a transport failure carrying the body text.
pub fn decode(status: u16, body: &[u8]) -> Result<ApiResult> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => from_value(value),
        Err(e) => {
            tracing::warn!(status, error = %e, "response body is not JSON");
            Err(SnsError::transport(
                Some(status),
                String::from_utf8_lossy(body).into_owned(),
                Some(Box::new(e)),
            ))
        }
    }
}

/// Turn a non-2xx response into an error, preferring the provider's envelope.
/// A body that does not decode never masks the HTTP status.
pub fn decode_failure(status: u16, body: &[u8]) -> SnsError {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            if let Some(err) = error_envelope(&value) {
                return err;
            }
        }
        Err(e) => {
            tracing::warn!(status, error = %e, "error body is not JSON");
        }
    }
    SnsError::transport(
        Some(status),
        String::from_utf8_lossy(body).into_owned(),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_raises() {
        let body = br#"{"error_code":"21327","error":"x","request":"y"}"#;
        match decode(200, body) {
            Err(SnsError::Api { code, message, request }) => {
                assert_eq!(code, "21327");
                assert_eq!(message, "x");
                assert_eq!(request, "y");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_error_code_and_missing_fields() {
        match decode(200, br#"{"error_code":20003}"#) {
            Err(SnsError::Api { code, message, request }) => {
                assert_eq!(code, "20003");
                assert!(message.is_empty());
                assert!(request.is_empty());
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_result() {
        let result = decode(200, br#"{"id": 7, "user": {"name": "test", "verified": true}}"#).unwrap();
        assert_eq!(result["id"], 7);
        assert_eq!(result.get_str("user/name"), Some("test".to_string()));
        assert_eq!(result.get_bool("user/verified"), Some(true));
        assert_eq!(result.get_i64("id"), Some(7));
        assert_eq!(result["missing"], Value::Null);
    }

    #[test]
    fn test_array_payload_path() {
        let result = decode(200, br#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert!(result.fields().is_none());
        assert_eq!(result.get_i64("1/id"), Some(2));
    }

    #[test]
    fn test_apply() {
        #[derive(Deserialize)]
        struct User {
            name: String,
        }

        let result = decode(200, br#"{"name": "test"}"#).unwrap();
        let user: User = result.apply().unwrap();
        assert_eq!(user.name, "test");
    }

    #[test]
    fn test_malformed_success_body() {
        let err = decode(200, b"<html>maintenance</html>").unwrap_err();
        match err {
            SnsError::Transport { status, message, source } => {
                assert_eq!(status, Some(200));
                assert_eq!(message, "<html>maintenance</html>");
                assert!(source.is_some());
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_failure_prefers_envelope() {
        let err = decode_failure(400, br#"{"error_code":21301,"error":"auth faild!","request":"/2/x.json"}"#);
        assert_eq!(err.code(), Some("21301"));

        let err = decode_failure(502, b"Bad Gateway");
        match err {
            SnsError::Transport { status, message, .. } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected transport error, got {:?}", other),
        }

        let err = decode_failure(500, br#"{"message":"oops"}"#);
        assert_eq!(err.status_code(), Some(500));
    }
}
