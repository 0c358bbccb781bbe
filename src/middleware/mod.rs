//! Middleware module
//!
//! Contains Tower middleware for rate limiting.

pub mod rate_limiter;
