//! Client address extraction from HTTP requests.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Resolves the client IP address for a request.
///
/// When `behind_proxy` is set, the first address of `X-Forwarded-For` wins,
/// then `X-Real-IP`. Otherwise, and when those headers are absent or
/// malformed, the socket peer address is used.
///
/// # Examples
///
/// ```ignore
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
///
/// let ip = client_ip(&headers, Some(peer), true);
/// assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
/// ```
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, behind_proxy: bool) -> Option<IpAddr> {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer.map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.1:5555".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

        let ip = client_ip(&headers, peer(), false);
        assert_eq!(ip, Some("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        let ip = client_ip(&headers, peer(), true);
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));

        let ip = client_ip(&headers, peer(), true);
        assert_eq!(ip, Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_no_source_at_all() {
        assert_eq!(client_ip(&HeaderMap::new(), None, true), None);
    }
}
