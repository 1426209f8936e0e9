//! Client network metadata extraction.

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Caller network identity, available to rate limiting and audit entries.
#[derive(Clone, Debug)]
pub struct ClientMeta {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Resolve the client IP and user agent.
///
/// IP priority:
/// 1. first entry of `X-Forwarded-For` (requests through proxies)
/// 2. `X-Real-IP`
/// 3. the socket address of the connection
pub async fn extract_client_meta(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let ip = if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        forwarded
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    } else if let Some(real_ip) = request.headers().get("x-real-ip") {
        real_ip.to_str().ok().and_then(|s| s.parse::<IpAddr>().ok())
    } else {
        Some(addr.ip())
    };

    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    request.extensions_mut().insert(ClientMeta { ip, user_agent });
    next.run(request).await
}
