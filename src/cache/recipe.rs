//! Recipe cache service
//!
//! Cache-aside layer in front of the recipe repository. Reads are served from
//! the key-value store when possible and populate it on a miss; writes go to
//! the repository first and then invalidate or refresh the cached copy.
//!
//! A miss reads the row and populates the cache in two separate steps, with
//! no version check in between. If an update commits and invalidates the key
//! after the miss has read the old row but before it populates, the old row is
//! written back and served until the entry's TTL runs out. The TTL is
//! therefore the upper bound on staleness.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    cache::{codec, keys},
    config::CacheWritePolicy,
    error::{AppError, AppResult},
    recipes::{NewRecipe, Recipe, RecipeRepository, RecipeUpdate},
    routes::metrics::record_cache_operation,
    store::KeyValueStore,
};

/// Recipe cache service
///
/// Cached recipes live under `RECIPE|{id}` as a flat hash (see
/// [`codec`]) and expire after `ttl_seconds`.
pub struct RecipeCache {
    store: Arc<dyn KeyValueStore>,
    repository: Arc<dyn RecipeRepository>,
    ttl_seconds: u64,
    write_policy: CacheWritePolicy,
}

impl RecipeCache {
    /// Create a new recipe cache
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        repository: Arc<dyn RecipeRepository>,
        ttl_seconds: u64,
        write_policy: CacheWritePolicy,
    ) -> Self {
        Self {
            store,
            repository,
            ttl_seconds,
            write_policy,
        }
    }

    /// Get a recipe, using cache if available
    ///
    /// On a miss the row is read from the repository and written back with
    /// the configured TTL. Ids with no row yield `NotFound` and leave the
    /// cache untouched.
    #[instrument(skip(self))]
    pub async fn get_recipe(&self, recipe_id: i64) -> AppResult<Recipe> {
        if let Some(recipe) = self.get_cached(recipe_id).await? {
            debug!("Cache hit for recipe");
            record_cache_operation("get", "hit");
            return Ok(recipe);
        }

        debug!("Cache miss for recipe, querying database");
        record_cache_operation("get", "miss");

        let recipe = self
            .repository
            .find_by_id(recipe_id)
            .await?
            .ok_or_else(|| not_found(recipe_id))?;

        self.populate(&recipe).await?;
        Ok(recipe)
    }

    /// Cached copy only; never touches the repository
    ///
    /// A hash with no fields counts as a miss. A hash that does not decode is
    /// evicted and reported as a deserialization error.
    pub async fn get_cached(&self, recipe_id: i64) -> AppResult<Option<Recipe>> {
        let key = keys::recipe(recipe_id);
        let fields = self.store.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        match codec::decode_recipe(&fields) {
            Ok(recipe) => Ok(Some(recipe)),
            Err(source) => {
                record_cache_operation("get", "corrupt");
                if let Err(e) = self.store.del(&key).await {
                    warn!(key = %key, error = %e, "Failed to evict corrupt cache entry");
                }
                Err(AppError::Deserialization { key, source })
            }
        }
    }

    /// Write a recipe into the cache, replacing any previous entry
    #[instrument(skip(self, recipe), fields(recipe_id = recipe.recipe_id))]
    pub async fn populate(&self, recipe: &Recipe) -> AppResult<()> {
        let key = keys::recipe(recipe.recipe_id);
        self.store
            .hset_with_expire(&key, &codec::encode_recipe(recipe), self.ttl_seconds)
            .await?;
        record_cache_operation("populate", "ok");
        Ok(())
    }

    /// Invalidate a cached recipe
    ///
    /// Call this after modifying or deleting the row so the next read sees it.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, recipe_id: i64) -> AppResult<()> {
        debug!("Invalidating recipe cache");
        self.store.del(&keys::recipe(recipe_id)).await?;
        record_cache_operation("invalidate", "ok");
        Ok(())
    }

    /// Insert a recipe and write it through to the cache
    #[instrument(skip(self, recipe))]
    pub async fn create_recipe(&self, recipe: &NewRecipe) -> AppResult<Recipe> {
        let created = self.repository.insert(recipe).await?;

        // The row is committed; a cold cache only costs one extra miss.
        if let Err(e) = self.populate(&created).await {
            warn!(recipe_id = created.recipe_id, error = %e, "Write-through after insert failed");
        }

        Ok(created)
    }

    /// Update a recipe and invalidate or refresh its cached copy
    #[instrument(skip(self, update))]
    pub async fn update_recipe(&self, recipe_id: i64, update: &RecipeUpdate) -> AppResult<Recipe> {
        let updated = self
            .repository
            .update(recipe_id, update)
            .await?
            .ok_or_else(|| not_found(recipe_id))?;

        match self.write_policy {
            CacheWritePolicy::Invalidate => self.invalidate(recipe_id).await?,
            CacheWritePolicy::Refresh => self.populate(&updated).await?,
        }

        Ok(updated)
    }

    /// Delete a recipe and its cached copy
    #[instrument(skip(self))]
    pub async fn delete_recipe(&self, recipe_id: i64) -> AppResult<()> {
        if !self.repository.delete(recipe_id).await? {
            return Err(not_found(recipe_id));
        }
        self.invalidate(recipe_id).await
    }
}

fn not_found(recipe_id: i64) -> AppError {
    AppError::NotFound(format!("Recipe {} not found", recipe_id))
}
