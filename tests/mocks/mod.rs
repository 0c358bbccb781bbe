//! Mock infrastructure for testing external services
//!
//! - Recipe repository (in-memory stand-in for Postgres)
//! - Redis (real server when available, skipped otherwise)

pub mod redis;
