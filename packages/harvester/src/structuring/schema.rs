//! Deterministic validation of model output.
//!
//! Runs after every model call, on every repair retry. The checks are
//! plain JSON shape checks, independent of the model and of schemars:
//! required fields present, array fields actually arrays, and
//! `signup_info.available` a boolean.

use crate::types::record::StructuredRecord;

/// Validate parsed model output against the structural requirements.
/// Returns an empty vec when the value conforms.
pub fn validate(value: &serde_json::Value) -> Vec<String> {
    let mut violations = Vec::new();

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            violations.push("top-level value is not a JSON object".to_string());
            return violations;
        }
    };

    for field in StructuredRecord::required_fields() {
        if !obj.contains_key(*field) {
            violations.push(format!("missing required field '{}'", field));
        }
    }

    for field in StructuredRecord::array_fields() {
        if let Some(v) = obj.get(*field) {
            if !v.is_array() {
                violations.push(format!("field '{}' must be an array", field));
            }
        }
    }

    match obj.get("signup_info") {
        Some(serde_json::Value::Object(signup)) => match signup.get("available") {
            Some(v) if v.is_boolean() => {}
            Some(_) => {
                violations.push("'signup_info.available' must be a boolean".to_string())
            }
            None => violations.push("missing 'signup_info.available'".to_string()),
        },
        Some(_) => violations.push("'signup_info' must be an object".to_string()),
        None => {} // already reported as a missing required field
    }

    violations
}

/// Strip a markdown code fence wrapper, if the model added one.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conforming() -> serde_json::Value {
        json!({
            "overview": "City portal",
            "city_name": "Example City",
            "departments": [],
            "services": [],
            "contacts": [],
            "meetings": [],
            "documents": [],
            "forms": [],
            "signup_info": {"available": false}
        })
    }

    #[test]
    fn test_conforming_output_has_no_violations() {
        assert!(validate(&conforming()).is_empty());
    }

    #[test]
    fn test_missing_field_and_wrong_array_type_reported() {
        let mut value = conforming();
        value.as_object_mut().unwrap().remove("overview");
        value["departments"] = json!("public works");

        let violations = validate(&value);
        assert!(violations.iter().any(|v| v.contains("overview")));
        assert!(violations
            .iter()
            .any(|v| v.contains("departments") && v.contains("array")));
    }

    #[test]
    fn test_non_boolean_available_reported() {
        let mut value = conforming();
        value["signup_info"]["available"] = json!("yes");

        let violations = validate(&value);
        assert!(violations.iter().any(|v| v.contains("boolean")));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(!validate(&json!(["a", "b"])).is_empty());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
