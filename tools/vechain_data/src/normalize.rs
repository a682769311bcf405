//! Envelope unwrapping and field extraction for upstream payloads.
//!
//! Pure data transformation: each upstream family wraps its payload differently and
//! spells field names inconsistently. Everything here takes a parsed JSON body and
//! either returns the inner payload or an `UpstreamError` carrying the upstream's own
//! message when it has one.

use serde_json::Value;
use vechain_core::{CapabilityError, Pagination};

/// Unwraps `{"status": {"success", "message"}, "meta": {..}, "data": ..}`.
pub fn vechainstats_envelope(
    endpoint: &str,
    body: Value,
) -> Result<(Value, Option<Pagination>), CapabilityError> {
    let mut body = into_object(endpoint, body)?;
    let status = body.remove("status").unwrap_or(Value::Null);
    let success = status
        .get("success")
        .and_then(Value::as_bool)
        .or_else(|| status.as_bool())
        .unwrap_or(false);
    if !success {
        let message = str_field(&status, &["message", "msg"])
            .or_else(|| str_field(&Value::Object(body.clone()), &["message", "error"]))
            .unwrap_or_else(|| "request was not successful".to_string());
        return Err(CapabilityError::upstream(endpoint, message));
    }

    let pagination = body.get("meta").and_then(pagination);
    let data = body
        .remove("data")
        .ok_or_else(|| CapabilityError::upstream(endpoint, "response has no data"))?;
    Ok((data, pagination))
}

/// Unwraps `{"success": true, "data": ..}`; failures carry `msg` or `message`.
pub fn wanbridge_envelope(endpoint: &str, body: Value) -> Result<Value, CapabilityError> {
    let mut body = into_object(endpoint, body)?;
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => body
            .remove("data")
            .ok_or_else(|| CapabilityError::upstream(endpoint, "response has no data")),
        _ => {
            let message = str_field(&Value::Object(body), &["msg", "message", "error"])
                .unwrap_or_else(|| "request was not successful".to_string());
            Err(CapabilityError::upstream(endpoint, message))
        }
    }
}

/// Accepts a bare payload, `{"data": ..}`, or `{"error": ..}`.
pub fn plain_envelope(endpoint: &str, body: Value) -> Result<Value, CapabilityError> {
    match body {
        Value::Object(mut obj) => {
            if let Some(err) = obj.get("error").filter(|e| !e.is_null()) {
                let message = match err {
                    Value::String(s) => s.clone(),
                    other => str_field(other, &["message", "msg"]).unwrap_or_else(|| other.to_string()),
                };
                return Err(CapabilityError::upstream(endpoint, message));
            }
            match obj.remove("data") {
                Some(data) => Ok(data),
                None => Ok(Value::Object(obj)),
            }
        }
        Value::Null => Err(CapabilityError::upstream(endpoint, "empty response")),
        other => Ok(other),
    }
}

/// Extracts the first array found at `keys`, or the value itself if it is an array.
pub fn list_field(endpoint: &str, value: Value, keys: &[&str]) -> Result<Vec<Value>, CapabilityError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => keys
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| CapabilityError::upstream(endpoint, "response has no list")),
        _ => Err(CapabilityError::upstream(endpoint, "response has no list")),
    }
}

fn into_object(
    endpoint: &str,
    body: Value,
) -> Result<serde_json::Map<String, Value>, CapabilityError> {
    match body {
        Value::Object(obj) => Ok(obj),
        other => Err(CapabilityError::upstream(
            endpoint,
            format!("expected a JSON object, found {}", type_name(&other)),
        )),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads page, page size and total from the spellings upstreams use.
pub fn pagination(meta: &Value) -> Option<Pagination> {
    let p = Pagination {
        page: u64_field(meta, &["page", "current_page", "currentPage"]),
        per_page: u64_field(meta, &["per_page", "perPage", "page_size", "pageSize", "limit"]),
        total: u64_field(meta, &["total", "total_items", "totalItems", "count"]),
    };
    if p == Pagination::default() { None } else { Some(p) }
}

fn first<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find(|v| !v.is_null())
}

/// A string field; numbers and booleans are rendered as text.
pub fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    match first(v, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// An unsigned integer field, also accepted as a decimal string.
pub fn u64_field(v: &Value, keys: &[&str]) -> Option<u64> {
    match first(v, keys)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A floating point field for display values such as prices and APYs, never amounts.
pub fn f64_field(v: &Value, keys: &[&str]) -> Option<f64> {
    match first(v, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn bool_field(v: &Value, keys: &[&str]) -> Option<bool> {
    match first(v, keys)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vechain_core::ErrorKind;

    const EP: &str = "https://api.example.org/x";

    #[test]
    fn test_vechainstats_envelope() {
        let (data, page) = vechainstats_envelope(
            EP,
            json!({
                "status": {"success": true, "message": "ok"},
                "meta": {"page": 2, "per_page": "50", "total_items": 120},
                "data": {"symbol": "VTHO"}
            }),
        )
        .unwrap();
        assert_eq!(data, json!({"symbol": "VTHO"}));
        assert_eq!(
            page,
            Some(Pagination {
                page: Some(2),
                per_page: Some(50),
                total: Some(120)
            })
        );

        let err = vechainstats_envelope(
            EP,
            json!({"status": {"success": false, "message": "Invalid API key"}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.to_string(), format!("{EP}: Invalid API key"));

        let err = vechainstats_envelope(EP, json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("found array"));
    }

    #[test]
    fn test_wanbridge_envelope() {
        assert_eq!(
            wanbridge_envelope(EP, json!({"success": true, "data": [1]})).unwrap(),
            json!([1])
        );
        let err = wanbridge_envelope(EP, json!({"success": false, "msg": "bad pair"})).unwrap_err();
        assert_eq!(err.to_string(), format!("{EP}: bad pair"));
    }

    #[test]
    fn test_plain_envelope() {
        assert_eq!(plain_envelope(EP, json!([1])).unwrap(), json!([1]));
        assert_eq!(
            plain_envelope(EP, json!({"data": {"a": 1}})).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            plain_envelope(EP, json!({"a": 1, "error": null})).unwrap(),
            json!({"a": 1, "error": null})
        );
        let err = plain_envelope(EP, json!({"error": {"message": "rate limited"}})).unwrap_err();
        assert_eq!(err.to_string(), format!("{EP}: rate limited"));
        assert!(plain_envelope(EP, Value::Null).is_err());
    }

    #[test]
    fn test_fields() {
        let v = json!({"Decimals": null, "decimals": "6", "apy": "3.5", "ok": 1, "n": 12});
        assert_eq!(u64_field(&v, &["Decimals", "decimals"]), Some(6));
        assert_eq!(f64_field(&v, &["apy"]), Some(3.5));
        assert_eq!(bool_field(&v, &["ok"]), Some(true));
        assert_eq!(str_field(&v, &["n"]), Some("12".to_string()));
        assert_eq!(str_field(&v, &["missing"]), None);
        assert!(pagination(&json!({})).is_none());

        let items = list_field(EP, json!({"reserves": [1, 2]}), &["data", "reserves"]).unwrap();
        assert_eq!(items.len(), 2);
        assert!(list_field(EP, json!({"x": 1}), &["reserves"]).is_err());
    }
}
