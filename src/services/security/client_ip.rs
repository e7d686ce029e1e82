use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, Request},
};

pub const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const PROXY_CLIENT_IP: HeaderName = HeaderName::from_static("cf-connecting-ip");

/// Resolve the client address in priority order:
/// `x-forwarded-for` (first hop) → `x-real-ip` → `cf-connecting-ip` → peer address.
///
/// Unparsable candidates are skipped rather than trusted.
pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let forwarded = header_str(headers, &FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .and_then(parse_ip);

    forwarded
        .or_else(|| header_str(headers, &REAL_IP).and_then(parse_ip))
        .or_else(|| header_str(headers, &PROXY_CLIENT_IP).and_then(parse_ip))
        .or(peer)
        .map(|ip| ip.to_canonical())
}

/// Same as [`resolve`], reading the peer address from axum's `ConnectInfo` when present.
pub fn from_request<B>(req: &Request<B>) -> Option<IpAddr> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    resolve(req.headers(), peer)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|s| s.ip()))
}
