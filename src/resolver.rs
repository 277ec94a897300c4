use crate::client::Provider;
use crate::error::{Result, SnsError};
use crate::params::Params;
use std::fmt;
use url::Url;

/// Namespace served from the provider's remind host
const REMIND_NAMESPACE: &str = "remind";

/// Verb selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Upload,
}

impl Verb {
    /// HTTP method on the wire; uploads are POSTs
    pub fn http_method(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post | Verb::Upload => "POST",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Upload => "UPLOAD",
        })
    }
}

/// Split a logical path into segments. `/`, `.` and `__` all separate.
pub fn split_path(path: &str) -> Vec<String> {
    path.replace("__", "/")
        .split(['/', '.'])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One logical API call, consumed by [`resolve`]
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    pub verb: Verb,
    pub segments: Vec<String>,
    pub params: Params,
}

impl CallDescriptor {
    pub fn new(verb: Verb, path: &str, params: Params) -> Self {
        CallDescriptor {
            verb,
            segments: split_path(path),
            params,
        }
    }

    /// Slash-joined path, as echoed in errors and logs
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

/// Endpoint chosen for a call, before encoding and signing
#[derive(Debug, Clone)]
pub struct Route {
    /// Verb after upload promotion
    pub verb: Verb,
    /// Absolute URL without query string
    pub url: Url,
    /// Slash-joined logical path
    pub path: String,
    pub params: Params,
}

fn in_remind_namespace(segments: &[String]) -> bool {
    match segments.split_last() {
        Some((_, namespaces)) => namespaces.iter().any(|s| s == REMIND_NAMESPACE),
        None => false,
    }
}

/// Resolve a call against the provider's routing rules.
///
/// A POST carrying a file, or the provider's reserved upload parameter, is
/// promoted to an upload. Uploads go to the upload host and the `remind`
/// namespace goes to the remind host, when the provider has them.
pub fn resolve(provider: &Provider, call: CallDescriptor) -> Result<Route> {
    let CallDescriptor {
        verb,
        segments,
        params,
    } = call;
    let path = segments.join("/");

    if segments.is_empty() {
        return Err(SnsError::configuration("Parameter absent: endpoint path", path));
    }

    let verb = match verb {
        Verb::Post if params.has_file() || params.contains_key(&provider.upload_param) => Verb::Upload,
        Verb::Get if params.has_file() => {
            return Err(SnsError::configuration(
                "file parameters require a POST call",
                path,
            ))
        }
        other => other,
    };

    let host = match verb {
        Verb::Upload => provider.upload_host.as_deref(),
        _ if in_remind_namespace(&segments) => provider.remind_host.as_deref(),
        _ => None,
    }
    .unwrap_or(provider.api_host.as_str());

    let mut url = format!("{}://{}/", provider.scheme, host);
    if let Some(version) = provider.api_version.as_deref().filter(|v| !v.is_empty()) {
        url.push_str(version);
        url.push('/');
    }
    url.push_str(&path);
    url.push_str(&provider.suffix);

    Ok(Route {
        verb,
        url: Url::parse(&url)?,
        path,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FileParam;

    fn call(verb: Verb, path: &str, params: Params) -> Route {
        resolve(&Provider::weibo(), CallDescriptor::new(verb, path, params)).unwrap()
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("statuses/update"), vec!["statuses", "update"]);
        assert_eq!(split_path("statuses.home_timeline"), vec!["statuses", "home_timeline"]);
        assert_eq!(split_path("remind__unread_count"), vec!["remind", "unread_count"]);
        assert_eq!(split_path("/a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn test_plain_url() {
        let route = call(Verb::Get, "statuses/home_timeline", Params::new().set("count", 5));
        assert_eq!(route.verb, Verb::Get);
        assert_eq!(
            route.url.as_str(),
            "https://api.weibo.com/2/statuses/home_timeline.json"
        );
        assert_eq!(route.path, "statuses/home_timeline");
    }

    #[test]
    fn test_remind_namespace_host() {
        let route = call(Verb::Get, "remind/unread_count", Params::new());
        assert_eq!(
            route.url.as_str(),
            "https://rm.api.weibo.com/2/remind/unread_count.json"
        );

        // A terminal segment named remind is an endpoint, not the namespace.
        let route = call(Verb::Get, "users/remind", Params::new());
        assert_eq!(route.url.host_str(), Some("api.weibo.com"));
    }

    #[test]
    fn test_post_with_file_is_promoted() {
        let params = Params::new()
            .set("status", "pic")
            .set("pic", FileParam::from_bytes(Some("a.png"), vec![0u8; 4]));
        let route = call(Verb::Post, "statuses/upload", params);
        assert_eq!(route.verb, Verb::Upload);
        assert_eq!(
            route.url.as_str(),
            "https://upload.api.weibo.com/2/statuses/upload.json"
        );

        let params = Params::new().set("avatar", FileParam::from_bytes(None, vec![1u8]));
        assert_eq!(call(Verb::Post, "account/avatar", params).verb, Verb::Upload);
    }

    #[test]
    fn test_post_without_file_stays_post() {
        let route = call(Verb::Post, "statuses/update", Params::new().set("status", "hi"));
        assert_eq!(route.verb, Verb::Post);
        assert_eq!(route.url.host_str(), Some("api.weibo.com"));
    }

    #[test]
    fn test_get_with_file_rejected() {
        let params = Params::new().set("pic", FileParam::from_bytes(None, vec![1u8]));
        let err = resolve(&Provider::weibo(), CallDescriptor::new(Verb::Get, "x/y", params)).unwrap_err();
        assert!(matches!(err, SnsError::Configuration { .. }));
    }

    #[test]
    fn test_provider_without_version_or_suffix() {
        let route = resolve(
            &Provider::qq(),
            CallDescriptor::new(Verb::Get, "user/get_user_info", Params::new()),
        )
        .unwrap();
        assert_eq!(route.url.as_str(), "https://graph.qq.com/user/get_user_info");
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = resolve(&Provider::weibo(), CallDescriptor::new(Verb::Get, "//", Params::new())).unwrap_err();
        assert!(matches!(err, SnsError::Configuration { .. }));
    }
}
