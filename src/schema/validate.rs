//! Request validation against a field manifest
//!
//! Converts a JSON request body into a storage document, collecting every
//! field error before failing.

use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::{EntitySchema, FieldKind, FieldSpec};
use crate::types::{PlanError, ValidationErrors};

/// Write mode a body is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Required fields must be present, defaults are applied
    Create,
    /// Only supplied fields are checked; `null` clears an optional field
    Update,
}

impl EntitySchema {
    /// Validate `input` and convert it into a document of schema fields.
    ///
    /// Unknown fields are dropped. In [`Mode::Update`] a cleared field is
    /// returned as `Bson::Null`.
    pub fn coerce(&self, input: &Value, mode: Mode) -> Result<Document, PlanError> {
        let body = input
            .as_object()
            .ok_or_else(|| PlanError::BadRequest("request body must be a JSON object".into()))?;

        let mut errors = ValidationErrors::new();
        let mut doc = Document::new();

        for spec in &self.fields {
            let supplied = body.get(&spec.name).filter(|v| !v.is_null());
            let cleared = body.get(&spec.name).is_some_and(Value::is_null);

            let value = match (mode, supplied) {
                (_, Some(value)) => value.clone(),
                (Mode::Create, None) => match &spec.default {
                    Some(default) => default.clone(),
                    None => {
                        if spec.required {
                            errors.add(&spec.name, "is required");
                        }
                        continue;
                    }
                },
                (Mode::Update, None) => {
                    if cleared {
                        if spec.required {
                            errors.add(&spec.name, "is required");
                        } else {
                            doc.insert(spec.name.clone(), Bson::Null);
                        }
                    }
                    continue;
                }
            };

            match coerce_value(spec, &value) {
                Ok(Some(bson)) => {
                    doc.insert(spec.name.clone(), bson);
                }
                // Blank string after trimming
                Ok(None) => {
                    if spec.required {
                        errors.add(&spec.name, "is required");
                    } else if mode == Mode::Update {
                        doc.insert(spec.name.clone(), Bson::Null);
                    }
                }
                Err(message) => errors.add(&spec.name, message),
            }
        }

        errors.into_result()?;
        Ok(doc)
    }

    /// Coerce a raw query-string filter value for `field`.
    ///
    /// The literal `null` matches documents where the field is unset.
    pub fn filter_value(&self, field: &str, raw: &str) -> Result<Bson, PlanError> {
        let spec = self
            .get(field)
            .filter(|spec| spec.is_filterable())
            .ok_or_else(|| PlanError::BadRequest(format!("cannot filter by '{field}'")))?;

        if raw == "null" {
            return Ok(Bson::Null);
        }

        let value = match spec.kind {
            FieldKind::Integer { .. } => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        };

        match coerce_value(spec, &value) {
            Ok(Some(bson)) => Ok(bson),
            Ok(None) => Ok(Bson::Null),
            Err(message) => Err(PlanError::invalid(field, message)),
        }
    }
}

/// Coerce one JSON value by field kind. `Ok(None)` means a blank string.
fn coerce_value(spec: &FieldSpec, value: &Value) -> Result<Option<Bson>, String> {
    match &spec.kind {
        FieldKind::String { trim, max_length } => {
            let raw = value.as_str().ok_or("must be a string")?;
            let s = if *trim { raw.trim() } else { raw };
            if s.is_empty() {
                return Ok(None);
            }
            if let Some(max) = max_length {
                if s.chars().count() > *max {
                    return Err(format!("must be at most {max} characters"));
                }
            }
            Ok(Some(Bson::String(s.to_string())))
        }

        FieldKind::Integer { min } => {
            let n = value.as_i64().ok_or("must be an integer")?;
            if let Some(min) = min {
                if n < *min {
                    return Err(format!("must be at least {min}"));
                }
            }
            Ok(Some(Bson::Int64(n)))
        }

        FieldKind::Date => parse_date(value)
            .map(|dt| Some(Bson::DateTime(dt)))
            .ok_or_else(|| "must be a valid date".to_string()),

        FieldKind::Enum { values } => {
            let raw = value.as_str().ok_or("must be a string")?.trim();
            values
                .iter()
                .find(|allowed| allowed.eq_ignore_ascii_case(raw))
                .map(|canonical| Some(Bson::String(canonical.clone())))
                .ok_or_else(|| format!("must be one of: {}", values.join(", ")))
        }

        FieldKind::Reference(_) => {
            let raw = match value {
                Value::String(s) => Some(s.as_str()),
                // Echoed populated sub-document
                Value::Object(obj) => obj.get("_id").and_then(Value::as_str),
                _ => None,
            };
            raw.and_then(|s| ObjectId::parse_str(s.trim()).ok())
                .map(|oid| Some(Bson::ObjectId(oid)))
                .ok_or_else(|| "must be a valid ObjectId".to_string())
        }
    }
}

/// RFC 3339 timestamp, plain `YYYY-MM-DD` date, or epoch milliseconds
fn parse_date(value: &Value) -> Option<bson::DateTime> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(bson::DateTime::from_chrono(dt.with_timezone(&Utc)));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| bson::DateTime::from_chrono(naive.and_utc()))
        }
        Value::Number(n) => n.as_i64().map(bson::DateTime::from_millis),
        _ => None,
    }
}
