use std::fmt;

/// Classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// 401/403: bad or missing API key.
    Auth,
    /// 429: rate limited or out of quota.
    RateLimit,
    /// 404: unknown model or endpoint.
    NotFound,
    /// 5xx from the upstream service.
    ServerError,
    /// Request timed out.
    Timeout,
    /// Connection-level failure (DNS, refused, TLS).
    Network,
    /// The response arrived but could not be understood.
    BadResponse,
    /// Anything else.
    Unknown,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::Auth => "auth",
            GatewayErrorKind::RateLimit => "rate_limit",
            GatewayErrorKind::NotFound => "not_found",
            GatewayErrorKind::ServerError => "server_error",
            GatewayErrorKind::Timeout => "timeout",
            GatewayErrorKind::Network => "network",
            GatewayErrorKind::BadResponse => "bad_response",
            GatewayErrorKind::Unknown => "unknown",
        }
    }
}

/// A classified failure from the AI gateway. The engine never lets these
/// reach callers: every gateway call site has a deterministic fallback.
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => GatewayErrorKind::Auth,
            404 => GatewayErrorKind::NotFound,
            429 => GatewayErrorKind::RateLimit,
            500..=599 => GatewayErrorKind::ServerError,
            _ => GatewayErrorKind::Unknown,
        };
        // Keep the body short; upstream errors can echo entire requests.
        let mut message = body.trim().to_string();
        if message.len() > 500 {
            let mut end = 500;
            while end > 0 && !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Self {
            kind,
            status: Some(status),
            message,
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            GatewayErrorKind::Timeout
        } else {
            GatewayErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::BadResponse,
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "gateway {} (HTTP {}): {}",
                self.kind.as_str(),
                status,
                self.message
            ),
            None => write!(f, "gateway {}: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for GatewayError {}
