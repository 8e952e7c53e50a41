use crate::error::{Error, ErrorKind};
use crate::tree::{Message, Value};
use crate::types::{TypeKind, TypeSet};

// ── Error types ─────────────────────────────────────────────────────

/// A required property missing from a bound tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub message: String,
    /// Path in the tree where the error was found (e.g. ["objects[0]", "name"]).
    pub path: Vec<String>,
    /// Machine-readable error code.
    pub code: &'static str,
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::new(ErrorKind::MissingRequired(err.path.join(".")))
    }
}

// ── Required-property validation ────────────────────────────────────

/// Report every declared `required` property absent from `root` or any
/// message below it. Oneof messages are skipped: exactly one option is
/// present by construction.
///
/// Returns an empty vec when nothing is missing.
pub fn validate_required(root: &Message, types: &TypeSet) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    walk_message(root, types, &mut path, &mut errors);
    errors
}

fn walk_message(
    message: &Message,
    types: &TypeSet,
    path: &mut Vec<String>,
    errors: &mut Vec<SchemaError>,
) {
    if let Some(def) = types.get(&message.schema) {
        if def.kind == TypeKind::Object {
            for prop in def.properties.iter().filter(|p| p.required) {
                if !message.fields.contains_key(&prop.name) {
                    path.push(prop.name.clone());
                    errors.push(SchemaError {
                        message: format!(
                            "missing required property {:?} in {}",
                            prop.name, message.schema
                        ),
                        path: path.clone(),
                        code: "missing-required",
                    });
                    path.pop();
                }
            }
        }
    }

    for (name, value) in &message.fields {
        path.push(name.clone());
        walk_value(value, types, path, errors);
        path.pop();
    }
}

fn walk_value(value: &Value, types: &TypeSet, path: &mut Vec<String>, errors: &mut Vec<SchemaError>) {
    match value {
        Value::Message(m) => walk_message(m, types, path, errors),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                // Index attaches to the field segment: `objects[0]`.
                if let Some(last) = path.last_mut() {
                    let field = last.clone();
                    *last = format!("{}[{}]", field, i);
                    walk_value(item, types, path, errors);
                    if let Some(last) = path.last_mut() {
                        *last = field;
                    }
                }
            }
        }
        Value::Map { entries, .. } => {
            for (key, entry) in entries {
                path.push(key.clone());
                walk_value(entry, types, path, errors);
                path.pop();
            }
        }
        Value::Scalar(_) => {}
    }
}
