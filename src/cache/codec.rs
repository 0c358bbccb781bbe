//! Recipe <-> hash field codec
//!
//! The store only holds string field values. Integers are written in decimal,
//! list fields as JSON arrays and timestamps as RFC 3339, and [`decode_recipe`]
//! inverts exactly that encoding. Anything else in a cached hash is rejected
//! with a [`DeserializationError`] naming the offending field.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::recipes::Recipe;

/// A cached hash that does not decode into a recipe
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("field '{field}' is not a JSON string array: {source}")]
    InvalidList {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("field '{field}' is not an RFC 3339 timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

fn encode_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Flatten a recipe into hash fields
pub fn encode_recipe(recipe: &Recipe) -> Vec<(String, String)> {
    vec![
        ("recipe_id".into(), recipe.recipe_id.to_string()),
        ("recipe_description".into(), recipe.recipe_description.clone()),
        ("recipe_ingredients".into(), encode_list(&recipe.recipe_ingredients)),
        ("recipe_equipment".into(), encode_list(&recipe.recipe_equipment)),
        ("recipe_steps".into(), encode_list(&recipe.recipe_steps)),
        ("preparation_time".into(), recipe.preparation_time.to_string()),
        ("serving_size".into(), recipe.serving_size.to_string()),
        ("created_at".into(), encode_timestamp(&recipe.created_at)),
        ("updated_at".into(), encode_timestamp(&recipe.updated_at)),
    ]
}

struct Fields<'a>(&'a HashMap<String, String>);

impl<'a> Fields<'a> {
    fn raw(&self, field: &'static str) -> Result<&'a str, DeserializationError> {
        self.0
            .get(field)
            .map(String::as_str)
            .ok_or(DeserializationError::MissingField(field))
    }

    fn integer<T: std::str::FromStr>(&self, field: &'static str) -> Result<T, DeserializationError> {
        let raw = self.raw(field)?;
        raw.parse().map_err(|_| DeserializationError::InvalidInteger {
            field,
            value: raw.to_string(),
        })
    }

    fn list(&self, field: &'static str) -> Result<Vec<String>, DeserializationError> {
        serde_json::from_str(self.raw(field)?)
            .map_err(|source| DeserializationError::InvalidList { field, source })
    }

    fn timestamp(&self, field: &'static str) -> Result<DateTime<Utc>, DeserializationError> {
        let raw = self.raw(field)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| DeserializationError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            })
    }
}

/// Rebuild a recipe from hash fields written by [`encode_recipe`]
pub fn decode_recipe(fields: &HashMap<String, String>) -> Result<Recipe, DeserializationError> {
    let fields = Fields(fields);

    Ok(Recipe {
        recipe_id: fields.integer("recipe_id")?,
        recipe_description: fields.raw("recipe_description")?.to_string(),
        recipe_ingredients: fields.list("recipe_ingredients")?,
        recipe_equipment: fields.list("recipe_equipment")?,
        recipe_steps: fields.list("recipe_steps")?,
        preparation_time: fields.integer("preparation_time")?,
        serving_size: fields.integer("serving_size")?,
        created_at: fields.timestamp("created_at")?,
        updated_at: fields.timestamp("updated_at")?,
    })
}
