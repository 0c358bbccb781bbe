//! Recipe domain
//!
//! The model, request validation and the relational repository.

pub mod model;
pub mod repository;

pub use self::model::{parse_recipe_id, NewRecipe, Recipe, RecipeEnvelope, RecipeUpdate};
pub use self::repository::{PgRecipeRepository, RecipeRepository};
