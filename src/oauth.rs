use crate::api::ApiClient;
use crate::error::{Result, SnsError};
use crate::params::{encode_query, parse_query, Params};
use crate::resolver::Verb;
use crate::response::{self, ApiResult};
use crate::signer::OAuth1Signer;
use crate::time::Time;
use crate::token::Token;
use crate::transport::{self, ResolvedRequest};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::Url;

/// Request or access token pair of the OAuth 1.0a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub oauth_verifier: Option<String>,
    /// Any other fields the provider returned (user_id, screen_name, ...)
    pub extra: IndexMap<String, String>,
}

impl OAuth1Token {
    /// Parse a `k=v&k=v` token response
    pub fn parse(body: &str) -> Result<Self> {
        let mut fields = parse_query(body);
        let mut take = |key: &str| fields.shift_remove(key).filter(|v| !v.is_empty());

        let oauth_token = take("oauth_token");
        let oauth_token_secret = take("oauth_token_secret");
        let oauth_verifier = take("oauth_verifier");
        match (oauth_token, oauth_token_secret) {
            (Some(oauth_token), Some(oauth_token_secret)) => Ok(OAuth1Token {
                oauth_token,
                oauth_token_secret,
                oauth_verifier,
                extra: fields,
            }),
            _ => Err(SnsError::transport(
                None,
                format!("unrecognized token response: {}", body.trim()),
                None,
            )),
        }
    }
}

/// Append an encoded query to a URL that may already carry one
fn with_query(base: &str, query: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query)
}

/// Read a token-endpoint body, JSON or form-encoded
fn grant_from_body(status: u16, body: &[u8]) -> Result<Value> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return response::from_value(value).map(ApiResult::into_inner);
    }

    let text = String::from_utf8_lossy(body);
    let fields = parse_query(&text);
    if fields.is_empty() {
        return Err(SnsError::transport(
            Some(status),
            format!("unrecognized token response: {}", text.trim()),
            None,
        ));
    }
    Ok(Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<String, Value>>(),
    ))
}

impl ApiClient {
    fn redirect_uri<'a>(&'a self, redirect_uri: Option<&'a str>) -> Result<&'a str> {
        redirect_uri
            .or(self.config.redirect_uri.as_deref())
            .filter(|r| !r.is_empty())
            .ok_or_else(SnsError::missing_redirect_uri)
    }

    /// URL the user should be redirected to for authorization.
    ///
    /// `extra` may override `response_type` (default `code`) and adds any
    /// further parameters, such as `state` or `display`.
    pub fn get_authorize_url(&self, redirect_uri: Option<&str>, extra: &Params) -> Result<String> {
        let redirect = self.redirect_uri(redirect_uri)?;

        let mut params = Params::new()
            .set("client_id", &self.config.app_key)
            .set("response_type", "code")
            .set("redirect_uri", redirect);
        params.extend(extra.clone());

        Ok(with_query(&self.config.provider.authorize_url, &encode_query(&params)?))
    }

    /// Trade an authorization code for an access token.
    /// The token is held by the client and returned.
    pub fn request_access_token(&self, code: &str, redirect_uri: Option<&str>) -> Result<Token> {
        let redirect = self.redirect_uri(redirect_uri)?;
        let params = Params::new()
            .set("client_id", &self.config.app_key)
            .set("client_secret", &self.config.app_secret)
            .set("redirect_uri", redirect)
            .set("code", code)
            .set("grant_type", "authorization_code");

        let token = self.grant(params, None)?;
        tracing::info!(uid = token.uid.as_deref().unwrap_or(""), "access token granted");
        Ok(token)
    }

    /// Trade a refresh token for a new access token.
    /// The refresh token is kept when the provider does not rotate it, and the
    /// configured redirect URI is sent along when there is one.
    pub fn refresh_token(&self, refresh_token: &str) -> Result<Token> {
        let mut params = Params::new()
            .set("client_id", &self.config.app_key)
            .set("client_secret", &self.config.app_secret)
            .set("refresh_token", refresh_token)
            .set("grant_type", "refresh_token");
        if let Some(redirect) = self.config.redirect_uri.as_deref().filter(|r| !r.is_empty()) {
            params.insert("redirect_uri", redirect);
        }

        let token = self.grant(params, Some(refresh_token))?;
        tracing::info!("access token refreshed");
        Ok(token)
    }

    /// POST to the token endpoint, then normalize and hold the grant.
    /// `refresh_token` fills in a grant that carries none; the token is stored once, complete.
    fn grant(&self, params: Params, refresh_token: Option<&str>) -> Result<Token> {
        let url = Url::parse(&self.config.provider.token_url)?;
        let request = ResolvedRequest::build(Verb::Post, url, &params, None)?;
        let raw = transport::execute_raw(&self.http, request)?;

        let mut token = Token::from_grant(&grant_from_body(raw.status, &raw.body)?, Time::now())?;
        if token.refresh_token.is_none() {
            token.refresh_token = refresh_token.map(str::to_string);
        }
        self.tokens.set(token.clone());
        Ok(token)
    }

    /// Resolve an access token to the user's openid (QQ Connect)
    pub fn get_openid(&self, access_token: &str) -> Result<String> {
        let url = self.config.provider.openid_url.as_deref().ok_or_else(|| {
            SnsError::configuration("Parameter absent: openid_url", "OAuth2 request")
        })?;
        let params = Params::new().set("access_token", access_token);
        let request = ResolvedRequest::build(Verb::Get, Url::parse(url)?, &params, None)?;
        let raw = transport::execute_raw(&self.http, request)?;

        let text = String::from_utf8_lossy(&raw.body);
        parse_query(&text)
            .shift_remove("openid")
            .filter(|openid| !openid.is_empty())
            .ok_or_else(|| {
                SnsError::transport(
                    Some(raw.status),
                    format!("unrecognized openid response: {}", text.trim()),
                    None,
                )
            })
    }

    /// Step 1 of OAuth 1.0a: obtain an unauthorized request token.
    /// `callback` falls back to the configured redirect URI.
    pub fn get_request_token(&self, callback: Option<&str>) -> Result<OAuth1Token> {
        let url = self.request_token_url()?;
        let mut signer = OAuth1Signer::new(&self.config.app_key, &self.config.app_secret);
        if let Some(callback) = callback.or(self.config.redirect_uri.as_deref()) {
            signer = signer.callback(callback);
        }
        let authorization = signer.sign("GET", url.as_str(), &[]);
        self.oauth1_exchange(url, authorization)
    }

    /// Step 2 of OAuth 1.0a: URL the user authorizes the request token at
    pub fn get_oauth1_authorize_url(&self, oauth_token: &str) -> Result<String> {
        let query = encode_query(&Params::new().set("oauth_token", oauth_token))?;
        Ok(with_query(&self.config.provider.authorize_url, &query))
    }

    /// Step 3 of OAuth 1.0a: trade the authorized request token and its
    /// verifier for an access token pair, which the client then holds
    pub fn get_oauth1_access_token(&self, request_token: &OAuth1Token, verifier: &str) -> Result<Token> {
        let url = Url::parse(&self.config.provider.token_url)?;
        let authorization = OAuth1Signer::new(&self.config.app_key, &self.config.app_secret)
            .token(&request_token.oauth_token, Some(request_token.oauth_token_secret.as_str()))
            .verifier(verifier)
            .sign("GET", url.as_str(), &[]);
        let access = self.oauth1_exchange(url, authorization)?;

        let mut token = Token::oauth1(access.oauth_token, access.oauth_token_secret);
        token.uid = access.extra.get("user_id").cloned();
        self.tokens.set(token.clone());
        tracing::info!(uid = token.uid.as_deref().unwrap_or(""), "OAuth 1.0a access token granted");
        Ok(token)
    }

    fn request_token_url(&self) -> Result<Url> {
        let url = self.config.provider.request_token_url.as_deref().ok_or_else(|| {
            SnsError::configuration("Parameter absent: request_token_url", "OAuth1 request")
        })?;
        Ok(Url::parse(url)?)
    }

    fn oauth1_exchange(&self, url: Url, authorization: String) -> Result<OAuth1Token> {
        let request = ResolvedRequest::build(Verb::Get, url, &Params::new(), Some(authorization))?;
        let raw = transport::execute_raw(&self.http, request)?;
        OAuth1Token::parse(&String::from_utf8_lossy(&raw.body))
    }
}
