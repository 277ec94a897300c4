use crate::error::Result;
use crate::params::{encode_multipart, encode_pairs, Params};
use crate::resolver::Verb;
use crate::response::{self, ApiResult};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use std::time::Instant;
use url::Url;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Fully-formed request, ready to send
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: Method,
    /// Absolute URL, query string included for GETs
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Log label: GET, POST or MULTIPART POST
    label: &'static str,
}

impl ResolvedRequest {
    /// Encode `params` for `verb` and attach `authorization`.
    ///
    /// GET parameters go into the query string, POST parameters into a
    /// form-encoded body, and uploads into a multipart body.
    pub fn build(verb: Verb, mut url: Url, params: &Params, authorization: Option<String>) -> Result<Self> {
        let mut headers = Vec::new();
        if let Some(auth) = authorization {
            headers.push((AUTHORIZATION.as_str().to_string(), auth));
        }

        let (method, body, label) = match verb {
            Verb::Get => {
                let query = encode_pairs(&params.pairs()?);
                if !query.is_empty() {
                    url.set_query(Some(&query));
                }
                (Method::GET, None, "GET")
            }
            Verb::Post => {
                let body = encode_pairs(&params.pairs()?);
                headers.push((CONTENT_TYPE.as_str().to_string(), FORM_URLENCODED.to_string()));
                (Method::POST, Some(body.into_bytes()), "POST")
            }
            Verb::Upload => {
                let multipart = encode_multipart(params);
                headers.push((CONTENT_TYPE.as_str().to_string(), multipart.content_type()));
                (Method::POST, Some(multipart.body), "MULTIPART POST")
            }
        };

        Ok(ResolvedRequest {
            method,
            url,
            headers,
            body,
            label,
        })
    }

    /// Value of a header set on this request
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and decompressed body of a 2xx response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Send the request and return the raw response when it succeeded.
/// Non-2xx responses are turned into errors, using the provider's envelope when the body has one.
pub fn execute_raw(client: &Client, request: ResolvedRequest) -> Result<RawResponse> {
    tracing::info!("{} {}", request.label, request.url);

    let mut builder = client
        .request(request.method, request.url.as_str())
        .header(ACCEPT_ENCODING, "gzip");
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let start = Instant::now();
    // The client decodes gzip bodies and drops the Content-Encoding header.
    let http_response = builder.send()?;
    let status = http_response.status();
    let body = http_response.bytes()?;

    tracing::debug!(
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes = body.len(),
        "response received"
    );

    if !status.is_success() {
        return Err(response::decode_failure(status.as_u16(), &body));
    }

    Ok(RawResponse {
        status: status.as_u16(),
        body: body.to_vec(),
    })
}

/// Send the request and decode the JSON result
pub fn execute(client: &Client, request: ResolvedRequest) -> Result<ApiResult> {
    let raw = execute_raw(client, request)?;
    response::decode(raw.status, &raw.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FileParam;

    fn url() -> Url {
        Url::parse("https://api.weibo.com/2/statuses/update.json").unwrap()
    }

    #[test]
    fn test_get_places_params_in_query() {
        let params = Params::new().set("count", 5).set("q", "a b/c");
        let request = ResolvedRequest::build(Verb::Get, url(), &params, None).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url.as_str(),
            "https://api.weibo.com/2/statuses/update.json?count=5&q=a%20b%2Fc"
        );
        assert!(request.body.is_none());
        assert!(request.header("authorization").is_none());
    }

    #[test]
    fn test_get_without_params_has_no_query() {
        let request = ResolvedRequest::build(Verb::Get, url(), &Params::new(), None).unwrap();
        assert!(request.url.query().is_none());
    }

    #[test]
    fn test_post_places_params_in_body() {
        let params = Params::new().set("status", "R&D");
        let request =
            ResolvedRequest::build(Verb::Post, url(), &params, Some("OAuth2 abc".to_string())).unwrap();
        assert_eq!(request.method, Method::POST);
        assert!(request.url.query().is_none());
        assert_eq!(request.body.as_deref(), Some(&b"status=R%26D"[..]));
        assert_eq!(request.header("Content-Type"), Some(FORM_URLENCODED));
        assert_eq!(request.header("Authorization"), Some("OAuth2 abc"));
    }

    #[test]
    fn test_upload_uses_multipart_boundary() {
        let params = Params::new().set("pic", FileParam::from_bytes(Some("x.gif"), b"GIF89a".to_vec()));
        let request = ResolvedRequest::build(Verb::Upload, url(), &params, None).unwrap();
        assert_eq!(request.method, Method::POST);

        let content_type = request.header("content-type").unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let body = request.body.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(&format!("--{}\r\n", boundary)));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary)));
        assert!(text.contains("Content-Type: image/gif"));
    }
}
