//! Rate limiting rules, the counter store contract, and the admission core.

mod limiter;
mod rule;
mod store;

pub use limiter::{LimiterConfig, RateLimiter, ResolvedKeys};
pub use rule::{Decision, IdentityCategory, RateLimitRequest, RateLimitRule};
pub use store::CounterStore;
