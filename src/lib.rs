//! # snsapi - Social network REST API client for Rust
//!
//! A blocking client for OAuth-secured social network APIs (Sina Weibo and
//! compatible providers). Endpoints are not bound one by one: a call is a
//! logical path plus a verb, and the client takes care of routing, signing,
//! encoding and decoding.
//!
//! ## Features
//!
//! - Dynamic endpoint calls built from path segments
//! - OAuth 2.0 bearer tokens (header or query placement) and OAuth 1.0a
//!   HMAC-SHA1 request signing
//! - Authorization flows for both OAuth versions, plus in-site signed
//!   request verification
//! - Multipart uploads with automatic promotion of POSTs carrying files
//! - Gzip-compressed responses
//! - Structured errors for provider, transport, token and configuration failures
//!
//! ## Basic Usage
//!
//! ```no_run
//! use snsapi::{ApiClient, Config, Params};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("app_key", "app_secret")
//!         .with_redirect_uri("https://example.com/callback");
//!     let client = ApiClient::new(config)?;
//!
//!     // Send the user here, then trade the returned code for a token
//!     println!("{}", client.get_authorize_url(None, &Params::new())?);
//!     client.request_access_token("code-from-callback", None)?;
//!
//!     let timeline = client
//!         .api("statuses")
//!         .at("home_timeline")
//!         .get(Params::new().set("count", 20))?;
//!     println!("{:?}", timeline.get_path("statuses/0/text"));
//!     Ok(())
//! }
//! ```
//!
//! ## Uploads
//!
//! ```no_run
//! use snsapi::{ApiClient, Config, FileParam, Params, Time};
//!
//! let client = ApiClient::new(Config::new("app_key", "app_secret"))?;
//! client.set_access_token("access_token", Time::now().plus_seconds(3600));
//!
//! // A POST carrying a file goes out as a multipart upload
//! client.post(
//!     "statuses/upload",
//!     Params::new()
//!         .set("status", "hello")
//!         .set("pic", FileParam::open("photo.png")?),
//! )?;
//! # Ok::<(), snsapi::SnsError>(())
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod oauth;
pub mod params;
pub mod resolver;
pub mod response;
pub mod signed_request;
pub mod signer;
pub mod time;
pub mod token;
pub mod transport;

// Re-export main types for convenience
pub use api::{ApiClient, Call};
pub use client::{Config, Provider};
pub use error::{Result, SnsError};
pub use oauth::OAuth1Token;
pub use params::{FileParam, ParamValue, Params};
pub use resolver::{CallDescriptor, Verb};
pub use response::ApiResult;
pub use signed_request::SignedRequest;
pub use signer::{OAuthVersion, TokenPlacement};
pub use time::Time;
pub use token::{Token, TokenState};

// Re-export serde_json for convenience
pub use serde_json::json;
