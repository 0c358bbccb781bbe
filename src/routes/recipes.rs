//! Recipe endpoints
//!
//! Thin handlers: validate the request, call the recipe cache, wrap the
//! result in `{ "recipe": ... }`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    recipes::{parse_recipe_id, NewRecipe, RecipeEnvelope, RecipeUpdate},
    AppState,
};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid("body", &rejection.body_text()))
}

/// `GET /recipes/:id`
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<RecipeEnvelope>> {
    let recipe_id = parse_recipe_id(&raw_id)?;
    let recipe = state.recipe_cache.get_recipe(recipe_id).await?;
    Ok(Json(RecipeEnvelope { recipe }))
}

/// `POST /recipes`
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewRecipe>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RecipeEnvelope>)> {
    let new_recipe = body(payload)?;
    new_recipe.validate()?;

    let recipe = state.recipe_cache.create_recipe(&new_recipe).await?;
    Ok((StatusCode::CREATED, Json(RecipeEnvelope { recipe })))
}

/// `PUT /recipes/:id`
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<RecipeUpdate>, JsonRejection>,
) -> AppResult<Json<RecipeEnvelope>> {
    let recipe_id = parse_recipe_id(&raw_id)?;
    let update = body(payload)?;
    update.validate()?;

    let recipe = state.recipe_cache.update_recipe(recipe_id, &update).await?;
    Ok(Json(RecipeEnvelope { recipe }))
}

/// `DELETE /recipes/:id`
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> AppResult<StatusCode> {
    let recipe_id = parse_recipe_id(&raw_id)?;
    state.recipe_cache.delete_recipe(recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
