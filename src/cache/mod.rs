//! Cache module
//!
//! Provides the cache-aside recipe cache on top of the key-value store.

pub mod codec;
pub mod keys;
pub mod recipe;

pub use self::codec::DeserializationError;
pub use self::recipe::RecipeCache;
