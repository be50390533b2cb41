use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attrs {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Principal {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self { user_id: user_id.into(), attrs: Attrs::default() }
    }
}

/// Principal asserted by the fronting proxy in `auth_header`. Blank values mean anonymous.
pub fn principal_from_headers(headers: &HeaderMap, auth_header: &str) -> Option<Principal> {
    let user = headers.get(auth_header)?.to_str().ok()?.trim();
    if user.is_empty() {
        return None;
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty());
    let ip = header("x-forwarded-for").and_then(|v| v.split(',').next()).map(|v| v.trim().to_string());
    let email = header("x-remote-email").map(str::to_string);
    Some(Principal { user_id: user.to_string(), attrs: Attrs { email, ip } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_proxy_headers() {
        let mut h = HeaderMap::new();
        h.insert("x-remote-user", HeaderValue::from_static(" ana "));
        h.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        let p = principal_from_headers(&h, "x-remote-user").unwrap();
        assert_eq!(p.user_id, "ana");
        assert_eq!(p.attrs.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(p.attrs.email, None);
    }

    #[test]
    fn blank_or_missing_header_is_anonymous() {
        let mut h = HeaderMap::new();
        assert!(principal_from_headers(&h, "x-remote-user").is_none());
        h.insert("x-remote-user", HeaderValue::from_static("   "));
        assert!(principal_from_headers(&h, "x-remote-user").is_none());
    }
}
