//! Turnstile - Admission-Control Rate Limiting Service
//!
//! Turnstile decides, per incoming request, whether to allow or reject it
//! based on a request-count budget tracked over a fixed time window,
//! keyed by client identity (IP address or API token). Counters and
//! block markers live in a shared counter store, so any number of
//! service instances can enforce one budget against one store.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod storage;
