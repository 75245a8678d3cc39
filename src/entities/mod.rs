//! sea-orm entities backing the relational requirement store.

pub mod requirement;
pub mod requirement_approval;
pub mod requirement_item;

use sea_orm::JsonValue;

pub(crate) fn strings_to_json(values: &[String]) -> JsonValue {
    JsonValue::Array(values.iter().cloned().map(JsonValue::String).collect())
}

pub(crate) fn json_to_strings(value: &JsonValue) -> Vec<String> {
    value
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
