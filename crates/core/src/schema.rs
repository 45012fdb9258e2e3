//! Argument validation against a tool's parameter schema.
//!
//! Supports the subset of JSON Schema that tool declarations actually use:
//!
//! ```text
//! { "type": "object",
//!   "properties": { "<field>": { "type": "string" | "integer" | "number"
//!                                      | "boolean" | "array" | "object" | "null" } },
//!   "required": ["<field>", ...],
//!   "additionalProperties": false }   // optional
//! ```
//!
//! `type` may also be an array of type names. Unknown keywords are ignored.

use serde_json::Value;

use crate::error::ToolError;

/// Check `arguments` against `schema`.
///
/// A `null` argument set is treated as `{}`. All violations are collected
/// into a single [`ToolError::InvalidArguments`] so the planner can fix them
/// in one go.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "arguments must be an object, got {}",
                type_name(other)
            )));
        }
    };

    let mut problems = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match args.get(field) {
                None | Some(Value::Null) => {
                    problems.push(format!("missing required field '{field}'"));
                }
                Some(_) => {}
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);

    for (key, value) in args {
        let Some(spec) = properties.and_then(|p| p.get(key)) else {
            if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                problems.push(format!("unexpected field '{key}'"));
            }
            continue;
        };
        if value.is_null() {
            // Optional fields may be sent as null.
            continue;
        }
        if let Some(expected) = spec.get("type") {
            if !matches_type(expected, value) {
                problems.push(format!(
                    "field '{key}' must be {}, got {}",
                    describe_type(expected),
                    type_name(value)
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments(problems.join("; ")))
    }
}

/// The required field names declared by a schema.
pub fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn matches_type(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => matches_named(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_named(name, value)),
        _ => true,
    }
}

fn matches_named(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type names are not ours to enforce.
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "limit": { "type": "integer" },
                "tags": { "type": "array" },
                "filter": { "type": ["object", "null"] }
            },
            "required": ["id"]
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"id": "u-1", "limit": 5, "tags": ["a"], "filter": {"lang": "de"}});
        assert!(validate_arguments(&lookup_schema(), &args).is_ok());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = validate_arguments(&lookup_schema(), &json!({})).unwrap_err();
        match err {
            ToolError::InvalidArguments(msg) => assert!(msg.contains("missing required field 'id'")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        assert!(validate_arguments(&lookup_schema(), &json!({"id": null})).is_err());
    }

    #[test]
    fn null_arguments_treated_as_empty_object() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(validate_arguments(&schema, &Value::Null).is_ok());
        assert!(validate_arguments(&lookup_schema(), &Value::Null).is_err());
    }

    #[test]
    fn wrong_types_are_all_reported() {
        let err = validate_arguments(&lookup_schema(), &json!({"id": 3, "limit": 2.5})).unwrap_err();
        let ToolError::InvalidArguments(msg) = err else {
            panic!("expected InvalidArguments");
        };
        assert!(msg.contains("field 'id' must be string, got integer"));
        assert!(msg.contains("field 'limit' must be integer, got number"));
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = validate_arguments(&lookup_schema(), &json!("u-1")).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn additional_properties_false_is_enforced() {
        let schema = json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "additionalProperties": false
        });
        assert!(validate_arguments(&schema, &json!({"text": "x"})).is_ok());
        let err = validate_arguments(&schema, &json!({"text": "x", "extra": 1})).unwrap_err();
        assert!(err.to_string().contains("unexpected field 'extra'"));
    }

    #[test]
    fn required_fields_lists_names() {
        assert_eq!(required_fields(&lookup_schema()), vec!["id"]);
        assert!(required_fields(&json!({})).is_empty());
    }
}
