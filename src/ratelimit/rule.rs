//! Rate limit rules and decision values.

use std::fmt;
use std::time::Duration;

/// A request budget counted over a fixed time window.
///
/// The window is anchored at an identifier's first request and the budget
/// resets when it elapses, so a rule admits at most `requests` within any
/// single window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Maximum requests allowed within the window
    pub requests: u32,
    /// Length of the counting window
    pub window: Duration,
    /// How long an identifier stays blocked once it exceeds the budget.
    /// Zero means "clear any existing block" rather than "block forever".
    pub block_duration: Duration,
}

impl RateLimitRule {
    /// Create a new rule.
    pub fn new(requests: u32, window: Duration, block_duration: Duration) -> Self {
        Self {
            requests,
            window,
            block_duration,
        }
    }

    /// A rule can only be applied with a positive budget and window.
    pub fn is_usable(&self) -> bool {
        self.requests > 0 && self.window > Duration::ZERO
    }
}

/// Whether a request is limited by IP address or by API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityCategory {
    /// Limited by client IP address
    Ip,
    /// Limited by API token
    Token,
}

impl IdentityCategory {
    /// The category tag used in store key namespacing.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityCategory::Ip => "ip",
            IdentityCategory::Token => "token",
        }
    }
}

impl fmt::Display for IdentityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client identity extracted from an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RateLimitRequest {
    /// Best-effort client IP; may be empty only when a token is present
    pub ip: String,
    /// API token from the request, if any
    pub token: String,
}

/// Outcome of evaluating one request against the configured rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The normalized identifier the decision applies to
    pub identifier: String,
    /// The rule that was evaluated
    pub applied_rule: RateLimitRule,
    /// Counter value observed after increment. `None` when the budget
    /// check never ran because the identifier was already blocked.
    pub current_count: Option<i64>,
}
