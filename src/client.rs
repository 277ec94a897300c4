use crate::error::{Result, SnsError};
use crate::signer::{OAuthVersion, TokenPlacement};
use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;

/// Per-call connect and read timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the HTTP client for API requests.
/// Both the connect and the overall timeout are bounded by `timeout`.
pub fn create_http_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .build()
        .map_err(SnsError::from)
}

/// Routing and protocol description of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// URL scheme (http or https)
    pub scheme: String,
    /// API host
    pub api_host: String,
    /// Version segment placed before the endpoint path
    pub api_version: Option<String>,
    /// Host serving multipart uploads
    pub upload_host: Option<String>,
    /// Host serving the `remind` namespace
    pub remind_host: Option<String>,
    /// Suffix appended to the endpoint path
    pub suffix: String,
    /// Authorization page users are redirected to
    pub authorize_url: String,
    /// Endpoint exchanging codes (OAuth 2.0) or verifiers (OAuth 1.0a) for tokens
    pub token_url: String,
    /// OAuth 1.0a request-token endpoint
    pub request_token_url: Option<String>,
    /// Endpoint resolving an access token to the user's openid
    pub openid_url: Option<String>,
    pub oauth_version: OAuthVersion,
    pub token_placement: TokenPlacement,
    /// Parameter name that turns a POST into a multipart upload
    pub upload_param: String,
}

impl Provider {
    /// Sina Weibo API v2 over OAuth 2.0
    pub fn weibo() -> Self {
        Provider {
            scheme: "https".to_string(),
            api_host: "api.weibo.com".to_string(),
            api_version: Some("2".to_string()),
            upload_host: Some("upload.api.weibo.com".to_string()),
            remind_host: Some("rm.api.weibo.com".to_string()),
            suffix: ".json".to_string(),
            authorize_url: "https://api.weibo.com/oauth2/authorize".to_string(),
            token_url: "https://api.weibo.com/oauth2/access_token".to_string(),
            request_token_url: None,
            openid_url: None,
            oauth_version: OAuthVersion::OAuth2,
            token_placement: TokenPlacement::Header,
            upload_param: "pic".to_string(),
        }
    }

    /// Legacy Sina Weibo API over OAuth 1.0a
    pub fn weibo_oauth1() -> Self {
        Provider {
            scheme: "http".to_string(),
            api_host: "api.t.sina.com.cn".to_string(),
            api_version: None,
            upload_host: None,
            remind_host: None,
            suffix: ".json".to_string(),
            authorize_url: "http://api.t.sina.com.cn/oauth/authorize".to_string(),
            token_url: "http://api.t.sina.com.cn/oauth/access_token".to_string(),
            request_token_url: Some("http://api.t.sina.com.cn/oauth/request_token".to_string()),
            openid_url: None,
            oauth_version: OAuthVersion::OAuth1,
            token_placement: TokenPlacement::Header,
            upload_param: "pic".to_string(),
        }
    }

    /// QQ Connect graph API, which takes the token as query parameters
    pub fn qq() -> Self {
        Provider {
            scheme: "https".to_string(),
            api_host: "graph.qq.com".to_string(),
            api_version: None,
            upload_host: None,
            remind_host: None,
            suffix: String::new(),
            authorize_url: "https://graph.qq.com/oauth2.0/authorize".to_string(),
            token_url: "https://graph.qq.com/oauth2.0/token".to_string(),
            request_token_url: None,
            openid_url: Some("https://graph.z.qq.com/moc2/me".to_string()),
            oauth_version: OAuthVersion::OAuth2,
            token_placement: TokenPlacement::Query,
            upload_param: "pic".to_string(),
        }
    }

    /// Look up a preset by name (`weibo`, `weibo-oauth1`, `qq`)
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "weibo" => Some(Self::weibo()),
            "weibo-oauth1" | "weibo1" => Some(Self::weibo_oauth1()),
            "qq" => Some(Self::qq()),
            _ => None,
        }
    }

    /// Point every API host at `host`, keeping the other settings.
    /// Handy for staging deployments and local mock servers.
    pub fn with_host(mut self, scheme: &str, host: &str) -> Self {
        self.scheme = scheme.to_string();
        self.api_host = host.to_string();
        if self.upload_host.is_some() {
            self.upload_host = Some(host.to_string());
        }
        if self.remind_host.is_some() {
            self.remind_host = Some(host.to_string());
        }
        self
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::weibo()
    }
}

/// Configuration for the API client, owned by the caller
#[derive(Debug, Clone)]
pub struct Config {
    /// Application key (OAuth 2.0 client_id / OAuth 1.0a consumer key)
    pub app_key: String,
    /// Application secret
    pub app_secret: String,
    /// Default redirect URI (OAuth 2.0) or callback (OAuth 1.0a)
    pub redirect_uri: Option<String>,
    /// Provider routing
    pub provider: Provider,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Config {
    /// Create a new configuration for the default provider
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Config {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            redirect_uri: None,
            provider: Provider::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the default redirect URI
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load the configuration from `SNS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SnsError::configuration(format!("Parameter absent: {}", key), "environment"))
        };

        let mut config = Config::new(required("SNS_APP_KEY")?, required("SNS_APP_SECRET")?);
        config.redirect_uri = lookup("SNS_REDIRECT_URI").filter(|v| !v.is_empty());

        if let Some(name) = lookup("SNS_PROVIDER") {
            config.provider = Provider::by_name(&name).ok_or_else(|| {
                SnsError::configuration(format!("unknown provider: {}", name), "SNS_PROVIDER")
            })?;
        }

        if let Some(secs) = lookup("SNS_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                SnsError::configuration(format!("invalid timeout: {}", secs), "SNS_TIMEOUT_SECS")
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::new("key", "secret");
        assert_eq!(config.provider, Provider::weibo());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.redirect_uri.is_none());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("SNS_APP_KEY", "k"),
            ("SNS_APP_SECRET", "s"),
            ("SNS_REDIRECT_URI", "http://example.com/cb"),
            ("SNS_PROVIDER", "QQ"),
            ("SNS_TIMEOUT_SECS", "9"),
        ]))
        .unwrap();

        assert_eq!(config.app_key, "k");
        assert_eq!(config.redirect_uri.as_deref(), Some("http://example.com/cb"));
        assert_eq!(config.provider.token_placement, TokenPlacement::Query);
        assert_eq!(config.timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_config_missing_secret() {
        let err = Config::from_lookup(lookup(&[("SNS_APP_KEY", "k")])).unwrap_err();
        assert!(matches!(err, SnsError::Configuration { .. }));
        assert!(err.to_string().contains("SNS_APP_SECRET"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = Config::from_lookup(lookup(&[
            ("SNS_APP_KEY", "k"),
            ("SNS_APP_SECRET", "s"),
            ("SNS_PROVIDER", "myspace"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn test_openid_endpoint_only_for_qq() {
        assert_eq!(
            Provider::qq().openid_url.as_deref(),
            Some("https://graph.z.qq.com/moc2/me")
        );
        assert!(Provider::weibo().openid_url.is_none());
        assert!(Provider::weibo_oauth1().openid_url.is_none());
    }

    #[test]
    fn test_with_host_rewrites_all_hosts() {
        let provider = Provider::weibo().with_host("http", "127.0.0.1:8080");
        assert_eq!(provider.api_host, "127.0.0.1:8080");
        assert_eq!(provider.upload_host.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(provider.remind_host.as_deref(), Some("127.0.0.1:8080"));

        let provider = Provider::qq().with_host("http", "localhost");
        assert!(provider.upload_host.is_none());
    }
}
