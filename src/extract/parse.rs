//! Recovering a recipe object from free-form model output.
//!
//! Models sometimes wrap the JSON in prose or code fences. Each strategy is
//! a pure function over the raw answer; [`STRATEGIES`] are tried in order
//! and the first recipe found wins.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Deserializer, Value};

use crate::model::RecipeDocument;

pub type ParseStrategy = fn(&str) -> Option<RecipeDocument>;

/// Ordered strategy chain: whole answer, fenced block, embedded object
pub const STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("whole_response", parse_whole_response),
    ("fenced_block", parse_fenced_block),
    ("embedded_object", parse_embedded_object),
];

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").unwrap());

static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)`(\{.*?\})`").unwrap());

/// Run the strategy chain over a model answer
pub fn parse_recipe_response(text: &str) -> Option<RecipeDocument> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let parsed = strategy(text);
        if parsed.is_some() {
            debug!("Recipe JSON recovered with strategy '{}'", name);
        }
        parsed
    })
}

/// The whole answer is one JSON object
pub fn parse_whole_response(text: &str) -> Option<RecipeDocument> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) if value.is_object() => Some(RecipeDocument::normalize(&value)),
        _ => None,
    }
}

/// A fenced (```json) or inline-backtick code block holds the object
pub fn parse_fenced_block(text: &str) -> Option<RecipeDocument> {
    let block = FENCED_BLOCK
        .captures(text)
        .or_else(|| INLINE_CODE.captures(text))?;

    serde_json::from_str::<Value>(&block[1])
        .ok()
        .filter(Value::is_object)
        .map(|value| RecipeDocument::normalize(&value))
}

/// Any `{...}` inside the answer that parses and looks like a recipe
///
/// Every opening brace is tried as the start of a JSON value; trailing text
/// after a complete object is ignored.
pub fn parse_embedded_object(text: &str) -> Option<RecipeDocument> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if looks_like_recipe(&value) => Some(RecipeDocument::normalize(&value)),
            _ => None,
        }
    })
}

fn looks_like_recipe(value: &Value) -> bool {
    let has_name = value
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());

    has_name
        && ["ingredients", "directions", "instructions"]
            .iter()
            .any(|key| value.get(key).is_some_and(|v| !v.is_null()))
}
