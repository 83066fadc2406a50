//! Structural validation of snapshots against a form configuration.
//!
//! Validation never fails; problems come back as a list of
//! [`ValidationError`]s. Fields missing from the configuration are not
//! checked.

use crate::types::{value_type_name, FormConfig, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Machine-readable validation error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    InvalidState,
    RequiredField,
    InvalidType,
    InvalidMetadata,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ValidationCode::InvalidState => "INVALID_STATE",
            ValidationCode::RequiredField => "REQUIRED_FIELD",
            ValidationCode::InvalidType => "INVALID_TYPE",
            ValidationCode::InvalidMetadata => "INVALID_METADATA",
        };
        f.write_str(code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    fn new(code: ValidationCode, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Errors reported for one field.
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors
            .iter()
            .filter(move |e| e.field.as_deref() == Some(field))
    }

    pub fn has(&self, code: ValidationCode, field: &str) -> bool {
        self.errors_for(field).any(|e| e.code == code)
    }
}

/// Validate a typed snapshot.
pub fn validate_snapshot(snapshot: &Snapshot, config: &FormConfig) -> ValidationResult {
    match serde_json::to_value(snapshot) {
        Ok(raw) => validate_raw_snapshot(&raw, config),
        Err(e) => ValidationResult::from_errors(vec![ValidationError::new(
            ValidationCode::InvalidState,
            None,
            format!("Snapshot could not be serialized: {}", e),
        )]),
    }
}

/// Validate an untyped snapshot payload such as imported JSON.
pub fn validate_raw_snapshot(raw: &Value, config: &FormConfig) -> ValidationResult {
    let state = match raw.get("state") {
        Some(Value::Object(state)) => state,
        Some(other) => {
            return ValidationResult::from_errors(vec![ValidationError::new(
                ValidationCode::InvalidState,
                None,
                format!("Snapshot state must be an object, got {}", value_type_name(other)),
            )]);
        }
        None => {
            return ValidationResult::from_errors(vec![ValidationError::new(
                ValidationCode::InvalidState,
                None,
                "Snapshot state is missing",
            )]);
        }
    };

    let mut errors = Vec::new();

    for (name, field) in config.iter() {
        let value = state.get(name).filter(|v| !v.is_null());

        match value {
            None if field.required => errors.push(ValidationError::new(
                ValidationCode::RequiredField,
                Some(name),
                format!("{} is required", config.label(name)),
            )),
            None => {}
            Some(value) => {
                let Some(expected) = field.field_type else {
                    continue;
                };
                if expected.check(value) == Some(false) {
                    errors.push(ValidationError::new(
                        ValidationCode::InvalidType,
                        Some(name),
                        format!(
                            "{} must be of type {}, got {}",
                            config.label(name),
                            expected.name(),
                            value_type_name(value)
                        ),
                    ));
                }
            }
        }
    }

    if let Some(metadata) = raw.get("metadata") {
        if !metadata.is_null() && !metadata.is_object() {
            errors.push(ValidationError::new(
                ValidationCode::InvalidMetadata,
                None,
                format!("Snapshot metadata must be an object, got {}", value_type_name(metadata)),
            ));
        }
    }

    ValidationResult::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldConfig, FieldType, Timestamp};
    use serde_json::json;

    fn person_config() -> FormConfig {
        FormConfig::new()
            .field("age", FieldConfig::typed(FieldType::Number).required())
            .field("name", FieldConfig::typed(FieldType::String).required())
    }

    #[test]
    fn test_missing_required_and_valid_number() {
        let snapshot = Snapshot::new("s1", Timestamp(1), json!({"age": -1}), "1.0.0");
        let result = validate_snapshot(&snapshot, &person_config());

        assert!(!result.is_valid);
        assert!(result.has(ValidationCode::RequiredField, "name"));
        assert_eq!(result.errors_for("age").count(), 0);
    }

    #[test]
    fn test_type_mismatch() {
        let config = FormConfig::new()
            .field("tags", FieldConfig::typed(FieldType::Array))
            .field("agree", FieldConfig::typed(FieldType::Boolean));
        let raw = json!({"state": {"tags": "a,b", "agree": "yes"}});

        let result = validate_raw_snapshot(&raw, &config);
        assert!(result.has(ValidationCode::InvalidType, "tags"));
        assert!(result.has(ValidationCode::InvalidType, "agree"));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_state_must_be_object() {
        let result = validate_raw_snapshot(&json!({"state": [1, 2]}), &person_config());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationCode::InvalidState);

        let result = validate_raw_snapshot(&json!({"id": "x"}), &person_config());
        assert_eq!(result.errors[0].code, ValidationCode::InvalidState);
    }

    #[test]
    fn test_metadata_must_be_object() {
        let raw = json!({"state": {"age": 3, "name": "Kim"}, "metadata": "oops"});
        let result = validate_raw_snapshot(&raw, &person_config());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationCode::InvalidMetadata);
    }

    #[test]
    fn test_extra_fields_permitted() {
        let raw = json!({"state": {"age": 3, "name": "Kim", "nickname": 42}});
        assert!(validate_raw_snapshot(&raw, &person_config()).is_valid);
    }

    #[test]
    fn test_optional_null_is_skipped() {
        let config = FormConfig::new().field("bio", FieldConfig::typed(FieldType::String));
        let raw = json!({"state": {"bio": null}});
        assert!(validate_raw_snapshot(&raw, &config).is_valid);
    }
}
