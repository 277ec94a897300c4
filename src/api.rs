use crate::client::{create_http_client, Config};
use crate::error::Result;
use crate::params::Params;
use crate::resolver::{self, split_path, CallDescriptor, Route, Verb};
use crate::response::ApiResult;
use crate::signer::{self, OAuth1Signer, OAuthVersion, RequestAuth};
use crate::time::Time;
use crate::token::{Token, TokenManager, TokenState};
use crate::transport::{self, ResolvedRequest};
use reqwest::blocking::Client;
use std::fmt;

/// Client for one application against one provider.
///
/// The held token sits behind a mutex, so a client can be shared between
/// threads; every call is a single blocking round trip.
pub struct ApiClient {
    /// HTTP client
    pub(crate) http: Client,
    /// Configuration
    pub(crate) config: Config,
    /// Current access token
    pub(crate) tokens: TokenManager,
}

impl ApiClient {
    /// Create a new client from an explicit configuration
    pub fn new(config: Config) -> Result<Self> {
        Ok(ApiClient {
            http: create_http_client(config.timeout)?,
            config,
            tokens: TokenManager::new(),
        })
    }

    /// Start with an already granted token
    pub fn with_token(self, token: Token) -> Self {
        self.tokens.set(token);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set the access token and its absolute expiry
    pub fn set_access_token(&self, access_token: &str, expires_at: Time) {
        self.tokens.set_access_token(access_token, expires_at);
    }

    /// Replace the held token
    pub fn set_token(&self, token: Token) {
        self.tokens.set(token);
    }

    /// Snapshot of the held token
    pub fn token(&self) -> Option<Token> {
        self.tokens.current()
    }

    pub fn token_state(&self) -> TokenState {
        self.tokens.state()
    }

    /// True unless a fresh token is held
    pub fn is_expired(&self) -> bool {
        self.tokens.is_expired()
    }

    /// Start a call at the given namespace or path
    ///
    /// ```no_run
    /// # use snsapi::{ApiClient, Config, Params};
    /// # fn main() -> snsapi::Result<()> {
    /// let client = ApiClient::new(Config::new("key", "secret"))?;
    /// let timeline = client
    ///     .api("statuses")
    ///     .at("home_timeline")
    ///     .get(Params::new().set("count", 10))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn api(&self, path: &str) -> Call<'_> {
        Call {
            client: self,
            segments: split_path(path),
        }
    }

    /// GET `path` with `params`
    pub fn get(&self, path: &str, params: Params) -> Result<ApiResult> {
        self.execute(CallDescriptor::new(Verb::Get, path, params))
    }

    /// POST `path` with `params`; promoted to an upload when it carries a file
    pub fn post(&self, path: &str, params: Params) -> Result<ApiResult> {
        self.execute(CallDescriptor::new(Verb::Post, path, params))
    }

    /// Multipart POST `path` with `params`
    pub fn upload(&self, path: &str, params: Params) -> Result<ApiResult> {
        self.execute(CallDescriptor::new(Verb::Upload, path, params))
    }

    /// Execute one logical call: token check, routing, signing, exchange, decoding
    pub fn execute(&self, call: CallDescriptor) -> Result<ApiResult> {
        let token = self.tokens.for_request(&call.path())?;
        let mut route = resolver::resolve(&self.config.provider, call)?;
        let auth = self.authorize(&route, token.as_ref())?;
        auth.apply_params(&mut route.params);

        tracing::debug!(verb = %route.verb, path = %route.path, "calling API");
        let request = ResolvedRequest::build(route.verb, route.url, &route.params, auth.authorization)?;
        transport::execute(&self.http, request)
    }

    /// Authentication material for a routed call
    fn authorize(&self, route: &Route, token: Option<&Token>) -> Result<RequestAuth> {
        let Some(token) = token else {
            return Ok(RequestAuth::default());
        };

        match self.config.provider.oauth_version {
            OAuthVersion::OAuth2 => Ok(signer::bearer(
                &token.access_token,
                self.config.provider.token_placement,
                &self.config.app_key,
            )),
            OAuthVersion::OAuth1 => {
                // Multipart parts never take part in the signature.
                let signed = match route.verb {
                    Verb::Upload => Vec::new(),
                    _ => route.params.pairs()?,
                };
                let header = OAuth1Signer::new(&self.config.app_key, &self.config.app_secret)
                    .token(&token.access_token, token.secret.as_deref())
                    .sign(route.verb.http_method(), route.url.as_str(), &signed);
                Ok(RequestAuth {
                    authorization: Some(header),
                    params: Vec::new(),
                })
            }
        }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("app_key", &self.config.app_key)
            .field("provider", &self.config.provider.api_host)
            .field("token_state", &self.tokens.state())
            .finish()
    }
}

/// Path under construction. Each [`Call::at`] appends segments; a terminal
/// [`Call::get`], [`Call::post`] or [`Call::upload`] sends it.
#[derive(Clone)]
pub struct Call<'c> {
    client: &'c ApiClient,
    segments: Vec<String>,
}

impl<'c> Call<'c> {
    /// Append one or more segments (`/`, `.` and `__` separate)
    pub fn at(mut self, segment: &str) -> Self {
        self.segments.extend(split_path(segment));
        self
    }

    /// Slash-joined path built so far
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Freeze the path into a descriptor for `verb`
    pub fn descriptor(self, verb: Verb, params: Params) -> CallDescriptor {
        CallDescriptor {
            verb,
            segments: self.segments,
            params,
        }
    }

    pub fn get(self, params: Params) -> Result<ApiResult> {
        self.send(Verb::Get, params)
    }

    pub fn post(self, params: Params) -> Result<ApiResult> {
        self.send(Verb::Post, params)
    }

    pub fn upload(self, params: Params) -> Result<ApiResult> {
        self.send(Verb::Upload, params)
    }

    fn send(self, verb: Verb, params: Params) -> Result<ApiResult> {
        let client = self.client;
        client.execute(self.descriptor(verb, params))
    }
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Call({})", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Provider;
    use crate::error::SnsError;

    fn client(provider: Provider) -> ApiClient {
        ApiClient::new(Config::new("app", "secret").with_provider(provider)).unwrap()
    }

    #[test]
    fn test_call_builder_accumulates_segments() {
        let client = client(Provider::weibo());
        let call = client.api("statuses").at("user_timeline").at("ids");
        assert_eq!(call.path(), "statuses/user_timeline/ids");

        let descriptor = client.api("remind.unread_count").descriptor(Verb::Get, Params::new());
        assert_eq!(descriptor.segments, vec!["remind", "unread_count"]);
        assert_eq!(descriptor.verb, Verb::Get);
    }

    #[test]
    fn test_expired_token_blocks_before_network() {
        // Unroutable host: reaching the network would yield a transport error instead.
        let provider = Provider::weibo().with_host("http", "203.0.113.1:9");
        let client = client(provider);
        client.set_access_token("abc", Time::now().plus_seconds(-1));

        match client.api("statuses").at("update").post(Params::new().set("status", "hi")) {
            Err(SnsError::ExpiredToken { request }) => assert_eq!(request, "statuses/update"),
            other => panic!("expected expired token error, got {:?}", other),
        }
    }

    #[test]
    fn test_oauth2_header_auth() {
        let client = client(Provider::weibo());
        let route = resolver::resolve(
            &client.config.provider,
            CallDescriptor::new(Verb::Get, "statuses/home_timeline", Params::new()),
        )
        .unwrap();
        let token = Token::new("abc", Time::now().plus_seconds(60));
        let auth = client.authorize(&route, Some(&token)).unwrap();
        assert_eq!(auth.authorization.as_deref(), Some("OAuth2 abc"));

        let anonymous = client.authorize(&route, None).unwrap();
        assert_eq!(anonymous, RequestAuth::default());
    }

    #[test]
    fn test_oauth1_upload_signs_only_oauth_params() {
        let client = client(Provider::weibo_oauth1());
        let params = Params::new().set("status", "hi").set("pic", crate::params::FileParam::from_bytes(None, vec![1u8]));
        let route = resolver::resolve(
            &client.config.provider,
            CallDescriptor::new(Verb::Post, "statuses/upload", params),
        )
        .unwrap();
        assert_eq!(route.verb, Verb::Upload);

        let token = Token::oauth1("tok", "sec");
        let auth = client.authorize(&route, Some(&token)).unwrap();
        let header = auth.authorization.unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_token=\"tok\""));
        assert!(auth.params.is_empty());
    }
}
