use std::{net::IpAddr, str::FromStr};

use actix_web::{http::header::AUTHORIZATION, HttpRequest};
use log::{debug, trace};

/// Get the remote IP address from the request. The first address in the `X-Forwarded-For` header is used iif
/// `use_x_forwarded_for` is set to true in the configuration; otherwise the peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr();
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.map(|a| a.ip())
    })
}

/// Extracts the credential from an `Authorization: Bearer <credential>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| credential.trim())
}
