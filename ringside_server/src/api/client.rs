//! Extractors describing the calling client.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::USER_AGENT, request::Parts},
};
use sha2::{Digest, Sha256};
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use super::AppState;

/// Header a client may send to identify its device
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Client address, used as the login throttle key
///
/// The socket peer address, unless the peer is a trusted proxy. Then the
/// right-most `X-Forwarded-For` hop that is not itself a trusted proxy is used,
/// falling back to `X-Real-IP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolve the client address seen through zero or more trusted proxies
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    if hops.is_empty() {
        return headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
            .or(Some(peer));
    }

    // Walk towards the client; everything left of an untrusted hop is client-supplied
    let mut nearest = peer;
    for hop in hops.iter().rev() {
        let Ok(ip) = hop.parse::<IpAddr>() else {
            break;
        };
        if !trusted.contains(&ip) {
            return Some(ip);
        }
        nearest = ip;
    }
    Some(nearest)
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = resolve_client_ip(peer, &parts.headers, &state.trusted_proxies)
            .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
        Ok(ClientIp(ip))
    }
}

/// Hashed device identity that refresh tokens are bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint(pub String);

impl DeviceFingerprint {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let source = [DEVICE_ID_HEADER, USER_AGENT.as_str()]
            .iter()
            .find_map(|name| {
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or("unknown");

        Self(hex::encode(Sha256::digest(source.as_bytes())))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl<S> FromRequestParts<S> for DeviceFingerprint
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const PROXY: &str = "10.0.0.1";

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn forwarded(list: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(list));
        headers
    }

    #[test]
    fn test_headers_ignored_from_untrusted_peer() {
        let mut headers = forwarded("198.51.100.77");
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.78"));
        let resolved = resolve_client_ip(Some(ip("203.0.113.9")), &headers, &[ip(PROXY)]);
        assert_eq!(resolved, Some(ip("203.0.113.9")));
    }

    #[test]
    fn test_trusted_proxy_uses_rightmost_untrusted_hop() {
        // The client prepended a fake address; the proxy appended the real one
        let headers = forwarded("1.2.3.4, 203.0.113.9, 10.0.0.2");
        let trusted = [ip(PROXY), ip("10.0.0.2")];
        let resolved = resolve_client_ip(Some(ip(PROXY)), &headers, &trusted);
        assert_eq!(resolved, Some(ip("203.0.113.9")));
    }

    #[test]
    fn test_trusted_proxy_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        let resolved = resolve_client_ip(Some(ip(PROXY)), &headers, &[ip(PROXY)]);
        assert_eq!(resolved, Some(ip("198.51.100.4")));

        let bare = resolve_client_ip(Some(ip(PROXY)), &HeaderMap::new(), &[ip(PROXY)]);
        assert_eq!(bare, Some(ip(PROXY)));
    }

    #[test]
    fn test_garbage_hop_stops_the_walk() {
        let headers = forwarded("not-an-ip, 10.0.0.2");
        let trusted = [ip(PROXY), ip("10.0.0.2")];
        let resolved = resolve_client_ip(Some(ip(PROXY)), &headers, &trusted);
        assert_eq!(resolved, Some(ip("10.0.0.2")));
    }

    #[test]
    fn test_no_peer_is_unknown() {
        assert_eq!(resolve_client_ip(None, &forwarded("203.0.113.9"), &[]), None);
    }

    #[test]
    fn test_device_id_preferred_over_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        let by_agent = DeviceFingerprint::from_headers(&headers);

        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("phone-1"));
        let by_device = DeviceFingerprint::from_headers(&headers);

        assert_ne!(by_agent, by_device);
        assert_eq!(by_device.0.len(), 64);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = DeviceFingerprint::from_headers(&HeaderMap::new());
        let b = DeviceFingerprint::from_headers(&HeaderMap::new());
        assert_eq!(a, b);
    }
}
