//! Cache key builders

/// Cached recipe hash key
pub fn recipe(recipe_id: i64) -> String {
    format!("RECIPE|{}", recipe_id)
}

/// Sliding-window set key for one client on one endpoint
pub fn rate_limit(prefix: &str, client_id: &str, endpoint_id: &str) -> String {
    format!("{}:{}:{}", prefix, client_id, endpoint_id)
}
