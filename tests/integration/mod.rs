//! Integration tests for the recipe service
//!
//! These tests run the full router over an in-memory store and a mock
//! repository, covering rate limiting, the recipe cache and health checks.

mod health;
