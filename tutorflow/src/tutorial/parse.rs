//! Parsing structured answers out of generative responses.
//!
//! Every structured prompt asks for a fenced YAML block. Indices may come
//! back as plain integers or as `"3 # Name"` strings.

use super::state::{Abstraction, Relationship, RelationshipGraph};
use crate::errors::ResponseFormatError;
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn yaml_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```ya?ml[^\n]*\n(.*?)```").ok())
        .as_ref()
}

/// Returns the body of the first fenced YAML block.
///
/// # Errors
///
/// Returns an error if the response has no such block.
pub fn extract_yaml_block<'a>(stage: &str, response: &'a str) -> Result<&'a str, ResponseFormatError> {
    yaml_fence()
        .and_then(|fence| fence.captures(response))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| ResponseFormatError::new(stage, "response has no ```yaml block"))
}

/// Parses the fenced YAML block into a generic value.
///
/// # Errors
///
/// Returns an error if the block is missing or is not valid YAML.
pub fn parse_yaml_block(stage: &str, response: &str) -> Result<Value, ResponseFormatError> {
    let block = extract_yaml_block(stage, response)?;
    serde_yaml::from_str(block).map_err(|e| ResponseFormatError::new(stage, format!("invalid YAML: {e}")))
}

/// Reads an index given as `3`, `"3"` or `"3 # Name"` and checks it is
/// below `bound`.
///
/// # Errors
///
/// Returns an error if the value is not an index or is out of range.
pub fn parse_index(stage: &str, value: &Value, bound: usize) -> Result<usize, ResponseFormatError> {
    let index = match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.split('#').next().and_then(|head| head.trim().parse().ok()),
        _ => None,
    }
    .ok_or_else(|| ResponseFormatError::new(stage, format!("not an index: {}", describe(value))))?;

    if index >= bound {
        return Err(ResponseFormatError::new(
            stage,
            format!("index {index} out of range (expected 0..{bound})"),
        ));
    }
    Ok(index)
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}

fn field<'a>(stage: &str, item: &'a Value, key: &str, position: usize) -> Result<&'a Value, ResponseFormatError> {
    item.get(key)
        .ok_or_else(|| ResponseFormatError::new(stage, format!("item {position} is missing '{key}'")))
}

fn text_field(stage: &str, item: &Value, key: &str, position: usize) -> Result<String, ResponseFormatError> {
    field(stage, item, key, position)?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResponseFormatError::new(stage, format!("item {position}: '{key}' must be non-empty text")))
}

fn sequence<'a>(stage: &str, value: &'a Value, what: &str) -> Result<&'a Vec<Value>, ResponseFormatError> {
    value
        .as_sequence()
        .ok_or_else(|| ResponseFormatError::new(stage, format!("{what} must be a list")))
}

/// Parses the abstraction list. File indices are validated against
/// `file_count`, sorted and de-duplicated. At most `max` entries are kept.
///
/// # Errors
///
/// Returns an error for a missing block, a non-list, missing fields or bad
/// indices.
pub fn parse_abstractions(
    stage: &str,
    response: &str,
    file_count: usize,
    max: usize,
) -> Result<Vec<Abstraction>, ResponseFormatError> {
    let value = parse_yaml_block(stage, response)?;
    let items = sequence(stage, &value, "abstractions")?;
    if items.is_empty() {
        return Err(ResponseFormatError::new(stage, "no abstractions returned"));
    }

    let mut abstractions = Vec::with_capacity(items.len().min(max));
    for (position, item) in items.iter().enumerate().take(max) {
        let name = text_field(stage, item, "name", position)?;
        let description = text_field(stage, item, "description", position)?;
        let files: BTreeSet<usize> = sequence(stage, field(stage, item, "file_indices", position)?, "file_indices")?
            .iter()
            .map(|v| parse_index(stage, v, file_count))
            .collect::<Result<_, _>>()?;

        abstractions.push(Abstraction {
            name,
            description,
            files: files.into_iter().collect(),
        });
    }

    if items.len() > max {
        tracing::debug!(stage, returned = items.len(), kept = max, "Truncated abstraction list");
    }
    Ok(abstractions)
}

/// Parses the summary and relationships. Self-loops are dropped.
///
/// # Errors
///
/// Returns an error for a missing block, a missing summary, or bad indices.
pub fn parse_relationships(
    stage: &str,
    response: &str,
    abstraction_count: usize,
) -> Result<RelationshipGraph, ResponseFormatError> {
    let value = parse_yaml_block(stage, response)?;
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResponseFormatError::new(stage, "missing 'summary'"))?;

    let items = sequence(
        stage,
        value
            .get("relationships")
            .ok_or_else(|| ResponseFormatError::new(stage, "missing 'relationships'"))?,
        "relationships",
    )?;

    let mut relationships = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let from = parse_index(stage, field(stage, item, "from_abstraction", position)?, abstraction_count)?;
        let to = parse_index(stage, field(stage, item, "to_abstraction", position)?, abstraction_count)?;
        let label = text_field(stage, item, "label", position)?;

        if from == to {
            tracing::debug!(stage, index = from, label = %label, "Dropping self-referencing relationship");
            continue;
        }
        relationships.push(Relationship { from, to, label });
    }

    Ok(RelationshipGraph { summary, relationships })
}

/// Parses the chapter order and checks it is a permutation of
/// `0..abstraction_count`.
///
/// # Errors
///
/// Returns an error for a missing block, bad or repeated indices, or a list
/// of the wrong length.
pub fn parse_chapter_order(
    stage: &str,
    response: &str,
    abstraction_count: usize,
) -> Result<Vec<usize>, ResponseFormatError> {
    let value = parse_yaml_block(stage, response)?;
    let items = sequence(stage, &value, "chapter order")?;

    let mut seen = BTreeSet::new();
    let mut order = Vec::with_capacity(items.len());
    for item in items {
        let index = parse_index(stage, item, abstraction_count)?;
        if !seen.insert(index) {
            return Err(ResponseFormatError::new(stage, format!("index {index} listed twice")));
        }
        order.push(index);
    }

    if order.len() != abstraction_count {
        return Err(ResponseFormatError::new(
            stage,
            format!("ordered {} of {abstraction_count} abstractions", order.len()),
        ));
    }
    Ok(order)
}
