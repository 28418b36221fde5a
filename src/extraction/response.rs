use serde_json::Value;

use crate::error::ImportError;
use crate::model::{Ingredient, Recipe, NO_RECIPE_FOUND};
use crate::providers::truncate_body;

/// What a single completion said about its chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAnswer {
    Recipe(Recipe),
    NoRecipe,
}

/// Interpret the model's answer for one chunk.
///
/// Reasoning blocks and code fences are stripped first. The sentinel text,
/// an explicit `no_recipe_found`/`error` field, or a recipe without any
/// ingredients and instructions all mean [`ChunkAnswer::NoRecipe`]. Anything
/// that is not JSON shaped like a recipe is an [`ImportError::ExtractionParse`].
pub fn parse_completion(content: &str) -> Result<ChunkAnswer, ImportError> {
    let cleaned = strip_code_fences(&strip_reasoning(content));
    let cleaned = cleaned.trim();

    let values = json_values(cleaned);
    if values.is_empty() {
        if is_sentinel(cleaned) {
            return Ok(ChunkAnswer::NoRecipe);
        }
        return Err(ImportError::ExtractionParse(format!(
            "no JSON in model output: {}",
            truncate_body(cleaned)
        )));
    }

    // prose around the answer may hold bracketed text that also parses
    let mut no_recipe = false;
    let mut first_error = None;
    for value in values {
        match answer_from_value(value) {
            Ok(ChunkAnswer::Recipe(recipe)) => return Ok(ChunkAnswer::Recipe(recipe)),
            Ok(ChunkAnswer::NoRecipe) => no_recipe = true,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(_) if no_recipe || is_sentinel(cleaned) => Ok(ChunkAnswer::NoRecipe),
        Some(e) => Err(e),
        None => Ok(ChunkAnswer::NoRecipe),
    }
}

fn answer_from_value(value: Value) -> Result<ChunkAnswer, ImportError> {
    let recipes = match value {
        Value::Array(items) => items
            .iter()
            .map(recipe_from_value)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect(),
        other => recipe_from_value(&other)?.into_iter().collect::<Vec<_>>(),
    };

    let recipe = super::merge_recipes(recipes);
    if recipe.is_empty() {
        Ok(ChunkAnswer::NoRecipe)
    } else {
        Ok(ChunkAnswer::Recipe(recipe))
    }
}

/// `None` when the object explicitly says there is no recipe.
fn recipe_from_value(value: &Value) -> Result<Option<Recipe>, ImportError> {
    let Some(object) = value.as_object() else {
        return Err(ImportError::ExtractionParse(format!(
            "expected a recipe object, got {}",
            truncate_body(&value.to_string())
        )));
    };

    if object
        .get("no_recipe_found")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(None);
    }
    if let Some(error) = object.get("error").and_then(Value::as_str) {
        if !error.trim().is_empty() {
            return Ok(None);
        }
    }

    let has_fields = ["name", "ingredients", "instructions"]
        .iter()
        .any(|key| object.contains_key(*key));
    if !has_fields {
        return Err(ImportError::ExtractionParse(format!(
            "object has no recipe fields: {}",
            truncate_body(&value.to_string())
        )));
    }

    let name = object
        .get("name")
        .or_else(|| object.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let ingredients = match object.get("ingredients") {
        Some(Value::Array(items)) => items.iter().filter_map(ingredient_from_value).collect(),
        _ => Vec::new(),
    };

    let instructions = match object.get("instructions") {
        Some(Value::Array(items)) => items.iter().filter_map(step_from_value).collect(),
        Some(Value::String(text)) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Some(Recipe {
        name,
        ingredients,
        instructions,
    }))
}

fn ingredient_from_value(value: &Value) -> Option<Ingredient> {
    let (name, amount) = match value {
        Value::String(text) => (text.trim().to_string(), String::new()),
        Value::Object(object) => {
            let name = object
                .get("name")
                .or_else(|| object.get("ingredient"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            let amount = ["amount", "count", "quantity"]
                .iter()
                .find_map(|key| object.get(*key).and_then(scalar_text))
                .unwrap_or_default();
            (name, amount)
        }
        _ => return None,
    };

    if name.is_empty() {
        None
    } else {
        Some(Ingredient { name, amount })
    }
}

fn step_from_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Object(object) => object
            .get("text")
            .or_else(|| object.get("step"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn is_sentinel(text: &str) -> bool {
    text.to_lowercase().contains(&NO_RECIPE_FOUND.to_lowercase())
}

/// Drop `<think>...</think>` blocks emitted by reasoning models.
pub(crate) fn strip_reasoning(content: &str) -> String {
    let mut rest = content;
    let mut out = String::with_capacity(content.len());
    while let Some(open) = rest.find("<think>") {
        out.push_str(&rest[..open]);
        match rest[open..].find("</think>") {
            Some(close) => rest = &rest[open + close + "</think>".len()..],
            None => {
                // unterminated block swallows the rest
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Unwrap the first fenced block if the answer has one.
pub(crate) fn strip_code_fences(content: &str) -> String {
    let Some(open) = content.find("```") else {
        return content.to_string();
    };
    let after_fence = &content[open + 3..];
    // skip the language tag line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(close) => body[..close].to_string(),
        None => body.to_string(),
    }
}

/// Every JSON object or array that starts at a `{` or `[` in `text`.
///
/// A value is read from each opening bracket in turn and anything after it
/// is ignored. Brackets inside a value already read are skipped.
fn json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut resume = 0;
    for (start, c) in text.char_indices() {
        if start < resume || (c != '{' && c != '[') {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            resume = start + stream.byte_offset();
            values.push(value);
        }
    }
    values
}
