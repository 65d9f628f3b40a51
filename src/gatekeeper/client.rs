// Client identity derived from request headers

use axum::http::{header, HeaderMap};

pub const UNKNOWN_CLIENT: &str = "unknown";

const SCANNER_SIGNATURES: [&str; 4] = ["sqlmap", "nikto", "masscan", "nmap"];

/// Who is calling, as far as the headers tell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: String,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: client_ip(headers),
            user_agent: user_agent(headers),
        }
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(ip) = value.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    UNKNOWN_CLIENT.to_string()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Known scanning tools; logged, never blocked
pub fn is_suspicious_user_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_ascii_lowercase();
    SCANNER_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}
