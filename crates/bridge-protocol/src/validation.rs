//! # Structural Validation
//!
//! `validate` decides whether a raw JSON value is a legal message. It is pure:
//! no global state, no panics, and malformed input comes back as an `Err`
//! carrying every violated field, keyed by path.

use crate::envelope::Message;
use crate::kinds::MessageType;
use crate::schema::{payload_schema, FieldKind, FieldSpec, ENVELOPE};
use crate::roles::SourceRole;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// A single violated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Dotted path, e.g. `payload.filePath` or `payload.clients[0].id`.
    /// `$` denotes the frame as a whole.
    pub path: String,
    /// Human-readable description of the problem.
    pub problem: String,
}

/// Every problem found in one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    violations: Vec<FieldViolation>,
}

impl ValidationReport {
    fn push(&mut self, path: impl Into<String>, problem: impl Into<String>) {
        self.violations.push(FieldViolation {
            path: path.into(),
            problem: problem.into(),
        });
    }

    fn single(path: impl Into<String>, problem: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.push(path, problem);
        report
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Paths of all violated fields, in discovery order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }

    /// True if `path` is among the violated fields.
    #[must_use]
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }

    /// The report as a JSON value, for `error.details`.
    #[must_use]
    pub fn to_details(&self) -> Value {
        serde_json::to_value(&self.violations).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid message ({} violation(s))", self.violations.len())?;
        for (i, v) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}: {}", v.path, v.problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Validate a raw JSON value and decode it into a typed [`Message`].
pub fn validate(raw: &Value) -> Result<Message, ValidationReport> {
    let Some(object) = raw.as_object() else {
        return Err(ValidationReport::single("$", "expected a JSON object"));
    };

    let mut report = ValidationReport::default();

    let kind = check_type(object.get("type"), &mut report);

    // `type` is handled above; everything else goes through the table.
    check_fields(object, ENVELOPE, &["type"], "", &mut report);

    if let (Some(kind), Some(Value::Object(payload))) = (kind, object.get("payload")) {
        check_fields(payload, payload_schema(kind), &[], "payload", &mut report);
    }

    // `command_request` must carry the requester's deadline.
    if kind == Some(MessageType::CommandRequest)
        && matches!(object.get("timeoutMs"), None | Some(Value::Null))
    {
        report.push("timeoutMs", "required for command_request");
    }

    if !report.is_empty() {
        return Err(report);
    }

    serde_json::from_value(raw.clone()).map_err(|e| ValidationReport::single("$", e.to_string()))
}

/// Boolean form of [`validate`].
#[must_use]
pub fn is_valid(raw: &Value) -> bool {
    validate(raw).is_ok()
}

/// Decode a JSON text frame and validate it.
pub fn parse_frame(text: &str) -> Result<Message, ValidationReport> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| ValidationReport::single("$", format!("invalid JSON: {e}")))?;
    validate(&raw)
}

/// Self-check an outbound message before it is handed to a transport.
pub fn check_message(message: &Message) -> Result<(), ValidationReport> {
    let raw = serde_json::to_value(message)
        .map_err(|e| ValidationReport::single("$", format!("unencodable message: {e}")))?;
    validate(&raw).map(|_| ())
}

fn check_type(value: Option<&Value>, report: &mut ValidationReport) -> Option<MessageType> {
    match value {
        None | Some(Value::Null) => {
            report.push("type", "required field is missing");
            None
        }
        Some(Value::String(s)) => {
            let kind = MessageType::parse(s);
            if kind.is_none() {
                report.push("type", format!("unknown message type '{s}'"));
            }
            kind
        }
        Some(_) => {
            report.push("type", "expected a string");
            None
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_fields(
    object: &Map<String, Value>,
    specs: &[FieldSpec],
    extra_known: &[&str],
    prefix: &str,
    report: &mut ValidationReport,
) {
    for spec in specs {
        let path = join(prefix, spec.name);
        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    report.push(path, "required field is missing");
                }
            }
            Some(value) => check_kind(value, spec.kind, &path, report),
        }
    }

    for key in object.keys() {
        let known = specs.iter().any(|s| s.name == key) || extra_known.contains(&key.as_str());
        if !known {
            report.push(join(prefix, key), "unknown field");
        }
    }
}

fn check_kind(value: &Value, kind: FieldKind, path: &str, report: &mut ValidationReport) {
    match kind {
        FieldKind::Any => {}
        FieldKind::String => {
            if !value.is_string() {
                report.push(path, "expected a string");
            }
        }
        FieldKind::NonEmptyString => match value.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            Some(_) => report.push(path, "must not be empty"),
            None => report.push(path, "expected a string"),
        },
        FieldKind::Bool => {
            if !value.is_boolean() {
                report.push(path, "expected a boolean");
            }
        }
        FieldKind::Unsigned => {
            if value.as_u64().is_none() {
                report.push(path, "expected a non-negative integer");
            }
        }
        FieldKind::UnsignedMax(max) => match value.as_u64() {
            Some(n) if n <= max => {}
            Some(_) => report.push(path, format!("must be at most {max}")),
            None => report.push(path, "expected a non-negative integer"),
        },
        FieldKind::Object => {
            if !value.is_object() {
                report.push(path, "expected an object");
            }
        }
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => report.push(path, format!("expected one of: {}", allowed.join(", "))),
        },
        FieldKind::Role => match value.as_str() {
            Some(s) if SourceRole::parse(s).is_some() => {}
            Some(s) => report.push(path, format!("unknown role '{s}'")),
            None => report.push(path, "expected a role name"),
        },
        FieldKind::Array(inner) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_kind(item, *inner, &format!("{path}[{i}]"), report);
                }
            }
            None => report.push(path, "expected an array"),
        },
        FieldKind::Map(inner) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    check_kind(item, *inner, &join(path, key), report);
                }
            }
            None => report.push(path, "expected an object"),
        },
        FieldKind::Nested(specs) => match value.as_object() {
            Some(object) => check_fields(object, specs, &[], path, report),
            None => report.push(path, "expected an object"),
        },
    }
}
