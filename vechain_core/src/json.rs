use schemars::{
    JsonSchema, Schema,
    generate::SchemaSettings,
    transform::{RestrictFormats, Transform},
};
use serde_json::{Map, Value};

use crate::FieldError;

/// Generate JSON schema for a given type T.
pub fn root_schema_for<T: JsonSchema>() -> Schema {
    let settings = SchemaSettings::draft2020_12().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None; // Remove the $schema field

        let mut formater = RestrictFormats::default();
        formater.infer_from_meta_schema = false; // Do not infer formats from meta schema
        s.transforms.push(Box::new(formater)); // Remove the $format field
    });
    let generator = settings.into_generator();
    generator.into_root_schema_for::<T>()
}

/// Generate JSON schema for a given type T. Returns as serde_json::Value.
pub fn gen_schema_for<T: JsonSchema>() -> Value {
    root_schema_for::<T>().to_value()
}

/// Checks `value` against the structural subset of JSON schema that argument types
/// generate: `type`, `enum`, `const`, `anyOf`/`oneOf`, `properties`, `required`,
/// `additionalProperties: false`, `items`, `minimum`/`maximum` and `minLength`.
///
/// Every failing field is reported; validation does not stop at the first error.
pub fn validate_against_schema(schema: &Value, value: &Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check(schema, value, "", &mut errors);
    errors
}

/// Top-level properties missing from `required`. A strict orchestrator expects none.
pub fn optional_properties(schema: &Value) -> Vec<String> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    schema["properties"]
        .as_object()
        .map(|props| {
            props
                .keys()
                .filter(|k| !required.contains(&k.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn field_name(path: &str) -> String {
    if path.is_empty() {
        "args".to_string()
    } else {
        path.to_string()
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(ty: &str, value: &Value) -> bool {
    match ty {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn check(schema: &Value, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    // `true` and `{}` accept anything
    let Some(obj) = schema.as_object() else {
        if schema == &Value::Bool(false) {
            errors.push(FieldError::new(field_name(path), "is not allowed"));
        }
        return;
    };

    if let Some(ty) = obj.get("type") {
        let (matched, expected) = match ty {
            Value::String(t) => (type_matches(t, value), t.clone()),
            Value::Array(ts) => {
                let names: Vec<&str> = ts.iter().filter_map(|t| t.as_str()).collect();
                (
                    names.iter().any(|t| type_matches(t, value)),
                    names.join(" or "),
                )
            }
            _ => (true, String::new()),
        };
        if !matched {
            errors.push(FieldError::new(
                field_name(path),
                format!("expected {expected}, found {}", json_type_name(value)),
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = obj.get("enum")
        && !options.contains(value)
    {
        let allowed = options
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        errors.push(FieldError::new(
            field_name(path),
            format!("must be one of {allowed}"),
        ));
        return;
    }

    if let Some(expected) = obj.get("const")
        && expected != value
    {
        errors.push(FieldError::new(
            field_name(path),
            format!("must be {expected}"),
        ));
        return;
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = obj.get(key) {
            let matched = branches
                .iter()
                .any(|branch| validate_against_schema(branch, value).is_empty());
            if !matched {
                let allowed = branches
                    .iter()
                    .filter_map(|b| b.get("const").or_else(|| b.get("enum")))
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>();
                let message = if allowed.is_empty() {
                    "does not match any allowed shape".to_string()
                } else {
                    format!("must be one of {}", allowed.join(", "))
                };
                errors.push(FieldError::new(field_name(path), message));
                return;
            }
        }
    }

    match value {
        Value::Object(map) => check_object(obj, map, path, errors),
        Value::Array(items) => {
            if let Some(item_schema) = obj.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"), errors);
                }
            }
        }
        Value::Number(n) => {
            let Some(v) = n.as_f64() else { return };
            if let Some(min) = obj.get("minimum").and_then(|m| m.as_f64())
                && v < min
            {
                errors.push(FieldError::new(
                    field_name(path),
                    format!("must be at least {min}"),
                ));
            }
            if let Some(max) = obj.get("maximum").and_then(|m| m.as_f64())
                && v > max
            {
                errors.push(FieldError::new(
                    field_name(path),
                    format!("must be at most {max}"),
                ));
            }
        }
        Value::String(s) => {
            if let Some(min) = obj.get("minLength").and_then(|m| m.as_u64())
                && (s.chars().count() as u64) < min
            {
                errors.push(FieldError::new(
                    field_name(path),
                    format!("must be at least {min} characters"),
                ));
            }
        }
        _ => {}
    }
}

fn check_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<FieldError>,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for name in required.iter().filter_map(|v| v.as_str()) {
            if !map.contains_key(name) {
                errors.push(FieldError::new(join_path(path, name), "is required"));
            }
        }
    }

    let properties = schema.get("properties").and_then(|p| p.as_object());
    let additional = schema.get("additionalProperties");
    for (key, v) in map {
        match properties.and_then(|p| p.get(key)) {
            Some(sub) => check(sub, v, &join_path(path, key), errors),
            None => match additional {
                Some(Value::Bool(false)) => {
                    errors.push(FieldError::new(join_path(path, key), "unknown field"));
                }
                Some(sub @ Value::Object(_)) => check(sub, v, &join_path(path, key), errors),
                _ => {}
            },
        }
    }
}
