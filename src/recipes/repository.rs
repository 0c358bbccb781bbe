//! Relational access to the `recipes` table
//!
//! All statements are parameterized. Multi-statement work runs inside a
//! `sqlx::Transaction`, which rolls back and returns its pooled connection
//! when dropped without `commit`, so every early return and `?` releases the
//! connection.
//!
//! The schema lives in `migrations/` and is applied at startup by [`MIGRATOR`].

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::model::{NewRecipe, Recipe, RecipeUpdate};
use crate::error::{AppError, AppResult};

/// Schema migrations embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const RECIPE_COLUMNS: &str = "recipe_id, recipe_description, recipe_ingredients, \
    recipe_equipment, recipe_steps, preparation_time, serving_size, created_at, updated_at";

/// Source of truth for recipes
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn find_by_id(&self, recipe_id: i64) -> AppResult<Option<Recipe>>;

    async fn insert(&self, recipe: &NewRecipe) -> AppResult<Recipe>;

    /// Update an existing row; `None` when no row has this id
    async fn update(&self, recipe_id: i64, update: &RecipeUpdate) -> AppResult<Option<Recipe>>;

    /// Delete a row; returns whether it existed
    async fn delete(&self, recipe_id: i64) -> AppResult<bool>;

    async fn ping(&self) -> AppResult<()>;
}

/// Postgres-backed recipe repository
#[derive(Clone)]
pub struct PgRecipeRepository {
    pool: PgPool,
}

impl PgRecipeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecipeRepository for PgRecipeRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, recipe_id: i64) -> AppResult<Option<Recipe>> {
        let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE recipe_id = $1");
        sqlx::query_as::<_, Recipe>(&sql)
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::database("select recipe"))
    }

    #[instrument(skip(self, recipe))]
    async fn insert(&self, recipe: &NewRecipe) -> AppResult<Recipe> {
        let sql = format!(
            "INSERT INTO recipes (recipe_description, recipe_ingredients, recipe_equipment, \
             recipe_steps, preparation_time, serving_size, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) \
             RETURNING {RECIPE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Recipe>(&sql)
            .bind(&recipe.recipe_description)
            .bind(&recipe.recipe_ingredients)
            .bind(&recipe.recipe_equipment)
            .bind(&recipe.recipe_steps)
            .bind(recipe.preparation_time)
            .bind(recipe.serving_size)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::database("insert recipe"))?;

        debug!(recipe_id = created.recipe_id, "Inserted recipe");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    async fn update(&self, recipe_id: i64, update: &RecipeUpdate) -> AppResult<Option<Recipe>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(AppError::database("begin recipe update"))?;

        // Lock the row so the existence check and the write see the same version.
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT recipe_id FROM recipes WHERE recipe_id = $1 FOR UPDATE")
                .bind(recipe_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::database("lock recipe"))?;

        if exists.is_none() {
            debug!("Recipe not found, nothing to update");
            return Ok(None);
        }

        let sql = format!(
            "UPDATE recipes SET \
                recipe_description = COALESCE($2, recipe_description), \
                recipe_ingredients = COALESCE($3, recipe_ingredients), \
                recipe_equipment = COALESCE($4, recipe_equipment), \
                recipe_steps = COALESCE($5, recipe_steps), \
                preparation_time = COALESCE($6, preparation_time), \
                serving_size = COALESCE($7, serving_size), \
                updated_at = NOW() \
             WHERE recipe_id = $1 \
             RETURNING {RECIPE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Recipe>(&sql)
            .bind(recipe_id)
            .bind(update.recipe_description.clone())
            .bind(update.recipe_ingredients.clone())
            .bind(update.recipe_equipment.clone())
            .bind(update.recipe_steps.clone())
            .bind(update.preparation_time)
            .bind(update.serving_size)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::database("update recipe"))?;

        tx.commit()
            .await
            .map_err(AppError::database("commit recipe update"))?;

        Ok(Some(updated))
    }

    #[instrument(skip(self))]
    async fn delete(&self, recipe_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::database("delete recipe"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::database("ping"))?;
        Ok(())
    }
}
