//! Recipe data types
//!
//! Field names mirror the `recipes` table columns so a row, its cached form
//! and its JSON payload all use the same vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, FieldError};

/// A row of the `recipes` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub recipe_id: i64,
    pub recipe_description: String,
    pub recipe_ingredients: Vec<String>,
    pub recipe_equipment: Vec<String>,
    pub recipe_steps: Vec<String>,
    /// Minutes
    pub preparation_time: i32,
    pub serving_size: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub recipe_description: String,
    #[serde(default)]
    pub recipe_ingredients: Vec<String>,
    #[serde(default)]
    pub recipe_equipment: Vec<String>,
    #[serde(default)]
    pub recipe_steps: Vec<String>,
    pub preparation_time: i32,
    pub serving_size: i32,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeUpdate {
    pub recipe_description: Option<String>,
    pub recipe_ingredients: Option<Vec<String>>,
    pub recipe_equipment: Option<Vec<String>>,
    pub recipe_steps: Option<Vec<String>>,
    pub preparation_time: Option<i32>,
    pub serving_size: Option<i32>,
}

/// Response envelope for single-recipe endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeEnvelope {
    pub recipe: Recipe,
}

/// Parse a path segment into a recipe id
pub fn parse_recipe_id(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        Ok(_) => Err(AppError::invalid("recipe_id", "must be a positive integer")),
        Err(_) => Err(AppError::invalid("recipe_id", "must be an integer")),
    }
}

fn check_description(value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new("recipe_description", "must not be empty"));
    }
}

fn check_list(field: &str, items: &[String], errors: &mut Vec<FieldError>) {
    if let Some(index) = items.iter().position(|item| item.trim().is_empty()) {
        errors.push(FieldError::new(
            field,
            format!("entry {} must not be empty", index),
        ));
    }
}

fn check_positive(field: &str, value: i32, errors: &mut Vec<FieldError>) {
    if value <= 0 {
        errors.push(FieldError::new(field, "must be a positive integer"));
    }
}

impl NewRecipe {
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        check_description(&self.recipe_description, &mut errors);
        check_list("recipe_ingredients", &self.recipe_ingredients, &mut errors);
        check_list("recipe_equipment", &self.recipe_equipment, &mut errors);
        check_list("recipe_steps", &self.recipe_steps, &mut errors);
        check_positive("preparation_time", self.preparation_time, &mut errors);
        check_positive("serving_size", self.serving_size, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

impl RecipeUpdate {
    pub fn is_empty(&self) -> bool {
        self == &RecipeUpdate::default()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::invalid("body", "at least one field must be provided"));
        }

        let mut errors = Vec::new();
        if let Some(description) = &self.recipe_description {
            check_description(description, &mut errors);
        }
        if let Some(items) = &self.recipe_ingredients {
            check_list("recipe_ingredients", items, &mut errors);
        }
        if let Some(items) = &self.recipe_equipment {
            check_list("recipe_equipment", items, &mut errors);
        }
        if let Some(items) = &self.recipe_steps {
            check_list("recipe_steps", items, &mut errors);
        }
        if let Some(minutes) = self.preparation_time {
            check_positive("preparation_time", minutes, &mut errors);
        }
        if let Some(servings) = self.serving_size {
            check_positive("serving_size", servings, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Apply this update to a recipe, stamping `updated_at`
    pub fn apply_to(&self, recipe: &mut Recipe, now: DateTime<Utc>) {
        if let Some(v) = &self.recipe_description {
            recipe.recipe_description = v.clone();
        }
        if let Some(v) = &self.recipe_ingredients {
            recipe.recipe_ingredients = v.clone();
        }
        if let Some(v) = &self.recipe_equipment {
            recipe.recipe_equipment = v.clone();
        }
        if let Some(v) = &self.recipe_steps {
            recipe.recipe_steps = v.clone();
        }
        if let Some(v) = self.preparation_time {
            recipe.preparation_time = v;
        }
        if let Some(v) = self.serving_size {
            recipe.serving_size = v;
        }
        recipe.updated_at = now;
    }
}
