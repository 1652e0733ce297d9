//! Core admission decision logic.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};

use super::rule::{Decision, IdentityCategory, RateLimitRequest, RateLimitRule};
use super::store::CounterStore;

/// Key namespace shared by all limiter state in the counter store.
const KEY_PREFIX: &str = "ratelimit";

/// Rules the limiter evaluates requests against.
///
/// Built once at startup and never mutated afterwards; the limiter takes
/// it by value so tests can inject any rule set alongside a fake store.
#[derive(Debug, Clone, Default)]
pub struct LimiterConfig {
    /// Rule applied to requests limited by IP address. Must be usable:
    /// every request without a token rule falls back to it.
    pub default_ip_rule: RateLimitRule,
    /// Rule applied to tokens without an explicit override. An unusable
    /// rule here behaves as "not configured".
    pub default_token_rule: Option<RateLimitRule>,
    /// Per-token rule overrides, keyed by the whitespace-trimmed token
    pub token_rules: HashMap<String, RateLimitRule>,
}

/// Counter and block keys derived for one request.
///
/// Pure function of category and identifier; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKeys {
    /// Key of the fixed-window counter
    pub counter_key: String,
    /// Key of the block marker
    pub block_key: String,
    /// Trimmed, lowercased identifier
    pub identifier: String,
}

impl ResolvedKeys {
    /// Derive the store keys for an identifier within a category.
    ///
    /// The identifier is trimmed and lowercased so requests differing
    /// only in case or surrounding whitespace share one budget.
    pub fn build(category: IdentityCategory, identifier: &str) -> Self {
        let identifier = identifier.trim().to_lowercase();
        let counter_key = format!("{}:{}:{}", KEY_PREFIX, category, identifier);
        let block_key = format!("{}:block", counter_key);
        Self {
            counter_key,
            block_key,
            identifier,
        }
    }
}

/// The core rate limiter.
///
/// Holds no per-client state: counters and block markers live entirely in
/// the shared counter store, so any number of instances can enforce one
/// budget against one store. Safe for concurrent use without internal
/// locking.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: LimiterConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new limiter over `store`.
    ///
    /// Fails when the default IP rule has a non-positive budget or
    /// window: it is the one rule every request may fall back to, so it
    /// must always be usable.
    pub fn new(store: Arc<dyn CounterStore>, config: LimiterConfig) -> Result<Self> {
        if !config.default_ip_rule.is_usable() {
            return Err(TurnstileError::Validation(
                "default IP rule must have positive requests and window".to_string(),
            ));
        }
        Ok(Self { store, config })
    }

    /// Evaluate one request against the configured rules.
    ///
    /// Returns the allow decision, [`TurnstileError::Blocked`] carrying
    /// the deny decision when the identifier is rejected,
    /// [`TurnstileError::Validation`] when the request has no usable
    /// identity, or [`TurnstileError::Store`] when the counter store
    /// fails.
    pub async fn allow(&self, request: &RateLimitRequest) -> Result<Decision> {
        let (rule, keys) = self.resolve_rule(request)?;

        trace!(
            identifier = %keys.identifier,
            limit = rule.requests,
            "Evaluating request"
        );

        // The block is authoritative: a blocked identifier never touches
        // its counter, which would otherwise re-anchor an expired window.
        if self.store.is_blocked(&keys.block_key).await? {
            debug!(identifier = %keys.identifier, "Identifier is blocked");
            return Err(TurnstileError::Blocked {
                decision: Decision {
                    allowed: false,
                    identifier: keys.identifier,
                    applied_rule: rule,
                    current_count: None,
                },
            });
        }

        let current_count = self.store.increment(&keys.counter_key, rule.window).await?;

        if current_count > i64::from(rule.requests) {
            debug!(
                identifier = %keys.identifier,
                current_count,
                limit = rule.requests,
                "Budget exceeded, blocking identifier"
            );
            // A failed block write surfaces as a store error rather than
            // silently admitting the request.
            self.store
                .set_block(&keys.block_key, rule.block_duration)
                .await?;
            return Err(TurnstileError::Blocked {
                decision: Decision {
                    allowed: false,
                    identifier: keys.identifier,
                    applied_rule: rule,
                    current_count: Some(current_count),
                },
            });
        }

        Ok(Decision {
            allowed: true,
            identifier: keys.identifier,
            applied_rule: rule,
            current_count: Some(current_count),
        })
    }

    /// Pick the rule and identity for a request.
    ///
    /// Precedence: explicit token override, then the default token rule,
    /// then the default IP rule. A token without an override falls
    /// through to IP limiting when no usable default token rule is
    /// configured, so carrying a token alone does not guarantee
    /// token-based limiting.
    fn resolve_rule(&self, request: &RateLimitRequest) -> Result<(RateLimitRule, ResolvedKeys)> {
        let token = request.token.trim();
        if !token.is_empty() {
            if let Some(rule) = self.config.token_rules.get(token) {
                return Ok((*rule, ResolvedKeys::build(IdentityCategory::Token, token)));
            }
            if let Some(rule) = self.config.default_token_rule.filter(|r| r.is_usable()) {
                return Ok((rule, ResolvedKeys::build(IdentityCategory::Token, token)));
            }
        }

        let ip = request.ip.trim();
        if ip.is_empty() {
            return Err(TurnstileError::Validation(
                "ip address is required when the token has no rule".to_string(),
            ));
        }

        Ok((
            self.config.default_ip_rule,
            ResolvedKeys::build(IdentityCategory::Ip, ip),
        ))
    }
}
