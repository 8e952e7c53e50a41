use crate::reflect::*;
use crate::types::{TypeKind, TypeSet};
use std::collections::BTreeMap;

/// A value in the dynamic target tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Message(Message),
    Scalar(ScalarValue),
    List(Vec<Value>),
    Map {
        values: FieldKind,
        entries: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(ScalarValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(ScalarValue::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

/// An instance of an object or oneof schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub schema: String,
    pub fields: BTreeMap<String, Value>,
}

impl Message {
    pub fn new(schema: &str) -> Self {
        Message {
            schema: schema.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a nested value by a path such as `objects[0].properties[1].name`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut cur = lookup_segment(self.fields.get(segment_name(first))?, first)?;
        for segment in segments {
            let next = match cur {
                Value::Message(m) => m.fields.get(segment_name(segment))?,
                Value::Map { entries, .. } => entries.get(segment_name(segment))?,
                _ => return None,
            };
            cur = lookup_segment(next, segment)?;
        }
        Some(cur)
    }
}

fn segment_name(segment: &str) -> &str {
    segment.split('[').next().unwrap_or(segment)
}

/// Apply any `[i]` suffixes of a path segment.
fn lookup_segment<'a>(mut value: &'a Value, segment: &str) -> Option<&'a Value> {
    for idx in segment.split('[').skip(1) {
        let i: usize = idx.trim_end_matches(']').parse().ok()?;
        value = value.as_list()?.get(i)?;
    }
    Some(value)
}

/// A `Reflect` target backed by `Message` values described by a `TypeSet`.
pub struct DynamicTarget<'t> {
    types: &'t TypeSet,
    fingerprint: u64,
    root: Value,
}

impl<'t> DynamicTarget<'t> {
    pub fn new(types: &'t TypeSet, root_schema: &str) -> Result<Self, ReflectError> {
        match types.get(root_schema) {
            Some(def) if def.kind != TypeKind::Enum => Ok(DynamicTarget {
                types,
                fingerprint: types.fingerprint(),
                root: Value::Message(Message::new(root_schema)),
            }),
            _ => Err(ReflectError::UnknownSchema(root_schema.to_string())),
        }
    }

    pub fn message(&self) -> &Message {
        match &self.root {
            Value::Message(m) => m,
            _ => unreachable!("root is always a message"),
        }
    }

    pub fn into_message(self) -> Message {
        match self.root {
            Value::Message(m) => m,
            _ => unreachable!("root is always a message"),
        }
    }

    fn value_at(&self, at: &Location) -> Result<&Value, ReflectError> {
        let mut cur = &self.root;
        for step in at.steps() {
            cur = match (cur, step) {
                (Value::Message(m), Step::Field(name)) => m.fields.get(name),
                (Value::Map { entries, .. }, Step::Field(key)) => entries.get(key),
                (Value::List(list), Step::Index(i)) => list.get(*i),
                _ => None,
            }
            .ok_or_else(|| ReflectError::InvalidLocation(at.to_string()))?;
        }
        Ok(cur)
    }

    fn value_at_mut(&mut self, at: &Location) -> Result<&mut Value, ReflectError> {
        let mut cur = &mut self.root;
        for step in at.steps() {
            cur = match (cur, step) {
                (Value::Message(m), Step::Field(name)) => m.fields.get_mut(name),
                (Value::Map { entries, .. }, Step::Field(key)) => entries.get_mut(key),
                (Value::List(list), Step::Index(i)) => list.get_mut(*i),
                _ => None,
            }
            .ok_or_else(|| ReflectError::InvalidLocation(at.to_string()))?;
        }
        Ok(cur)
    }

    fn is_oneof(&self, schema: &str) -> bool {
        self.types
            .get(schema)
            .map_or(false, |def| def.kind == TypeKind::Oneof)
    }

    /// Convert a literal into the representation stored for `kind`.
    fn coerce(
        &self,
        field: &str,
        kind: &FieldKind,
        value: ScalarValue,
    ) -> Result<ScalarValue, ReflectError> {
        let mismatch = |value: &ScalarValue| ReflectError::TypeMismatch {
            field: field.to_string(),
            kind: kind.clone(),
            value: value.to_string(),
        };
        match (kind, value) {
            (
                FieldKind::String
                | FieldKind::Bytes
                | FieldKind::Date
                | FieldKind::Timestamp
                | FieldKind::Key,
                v @ ScalarValue::String(_),
            ) => Ok(v),
            (FieldKind::Bool, v @ ScalarValue::Bool(_)) => Ok(v),
            (FieldKind::Integer, v @ ScalarValue::Int(_)) => Ok(v),
            (FieldKind::Integer, ScalarValue::String(s)) => s
                .parse::<i64>()
                .map(ScalarValue::Int)
                .map_err(|_| mismatch(&ScalarValue::String(s))),
            (FieldKind::Float, ScalarValue::Int(n)) => Ok(ScalarValue::Float(n as f64)),
            (FieldKind::Float, v @ ScalarValue::Float(_)) => Ok(v),
            (FieldKind::Float, ScalarValue::String(s)) => s
                .parse::<f64>()
                .map(ScalarValue::Float)
                .map_err(|_| mismatch(&ScalarValue::String(s))),
            (FieldKind::Decimal, ScalarValue::Int(n)) => Ok(ScalarValue::String(n.to_string())),
            (FieldKind::Decimal, ScalarValue::Float(n)) => Ok(ScalarValue::String(n.to_string())),
            (FieldKind::Decimal, ScalarValue::String(s)) if s.parse::<f64>().is_ok() => {
                Ok(ScalarValue::String(s))
            }
            (FieldKind::Enum(schema), ScalarValue::String(s)) => {
                let known = self
                    .types
                    .get(schema)
                    .map_or(false, |def| def.values.iter().any(|v| *v == s));
                if known {
                    Ok(ScalarValue::String(s))
                } else {
                    Err(mismatch(&ScalarValue::String(s)))
                }
            }
            (_, v) => Err(mismatch(&v)),
        }
    }

    /// Store `value` under `name`, clearing sibling options of a oneof.
    fn claim(&mut self, at: &Location, name: &str, value: Value) -> Result<(), ReflectError> {
        let oneof = match self.value_at(at)? {
            Value::Message(m) => self.is_oneof(&m.schema),
            _ => false,
        };
        match self.value_at_mut(at)? {
            Value::Message(m) => {
                if oneof {
                    m.fields.retain(|k, _| k == name);
                }
                m.fields.insert(name.to_string(), value);
                Ok(())
            }
            Value::Map { entries, .. } => {
                entries.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(ReflectError::InvalidLocation(at.to_string())),
        }
    }

    fn has_field(&self, at: &Location, name: &str) -> Result<bool, ReflectError> {
        Ok(match self.value_at(at)? {
            Value::Message(m) => m.fields.contains_key(name),
            Value::Map { entries, .. } => entries.contains_key(name),
            _ => false,
        })
    }

    fn empty_container(kind: &FieldKind) -> Option<Value> {
        match kind {
            FieldKind::Object(s) | FieldKind::Oneof(s) => Some(Value::Message(Message::new(s))),
            FieldKind::Map(values) => Some(Value::Map {
                values: (**values).clone(),
                entries: BTreeMap::new(),
            }),
            _ => None,
        }
    }
}

impl Reflect for DynamicTarget<'_> {
    fn schema_set(&self) -> u64 {
        self.fingerprint
    }

    fn schema_name(&self, at: &Location) -> Result<String, ReflectError> {
        match self.value_at(at)? {
            Value::Message(m) => Ok(m.schema.clone()),
            Value::Map { values, .. } => Ok(format!("map<{}>", values)),
            _ => Err(ReflectError::InvalidLocation(at.to_string())),
        }
    }

    fn container_kind(&self, at: &Location) -> Result<ContainerKind, ReflectError> {
        match self.value_at(at)? {
            Value::Message(m) if self.is_oneof(&m.schema) => Ok(ContainerKind::Oneof),
            Value::Message(_) => Ok(ContainerKind::Object),
            Value::Map { .. } => Ok(ContainerKind::Map),
            _ => Err(ReflectError::InvalidLocation(at.to_string())),
        }
    }

    fn properties(&self, schema: &str) -> Result<Vec<PropertyInfo>, ReflectError> {
        self.types
            .property_infos(schema)
            .ok_or_else(|| ReflectError::UnknownSchema(schema.to_string()))
    }

    fn field(&mut self, at: &Location, name: &str) -> Result<FieldHandle, ReflectError> {
        let kind = match self.value_at(at)? {
            Value::Message(m) => {
                let def = self
                    .types
                    .get(&m.schema)
                    .ok_or_else(|| ReflectError::UnknownSchema(m.schema.clone()))?;
                def.property(name)
                    .ok_or_else(|| ReflectError::UnknownField {
                        schema: m.schema.clone(),
                        field: name.to_string(),
                    })?
                    .kind
                    .clone()
            }
            Value::Map { values, .. } => values.clone(),
            _ => return Err(ReflectError::InvalidLocation(at.to_string())),
        };

        if let Some(empty) = Self::empty_container(&kind) {
            if !self.has_field(at, name)? {
                self.claim(at, name, empty)?;
            }
            return Ok(FieldHandle::Container(at.child(name)));
        }

        let field = FieldRef {
            container: at.clone(),
            name: name.to_string(),
            kind: kind.clone(),
        };
        Ok(match &kind {
            FieldKind::Array(items) if items.schema().is_some() => FieldHandle::ContainerList(field),
            FieldKind::Array(_) => FieldHandle::ScalarList(field),
            _ => FieldHandle::Scalar(field),
        })
    }

    fn new_element(&mut self, field: &FieldRef) -> Result<(Location, usize), ReflectError> {
        let element = match &field.kind {
            FieldKind::Array(items) => Self::empty_container(items),
            _ => None,
        };
        let element = element.ok_or_else(|| ReflectError::NotAList {
            field: field.name.clone(),
            kind: field.kind.clone(),
        })?;

        if !self.has_field(&field.container, &field.name)? {
            self.claim(&field.container, &field.name, Value::List(Vec::new()))?;
        }
        let at = field.container.child(&field.name);
        match self.value_at_mut(&at)? {
            Value::List(list) => {
                list.push(element);
                let index = list.len() - 1;
                Ok((at.index(index), index))
            }
            _ => Err(ReflectError::InvalidLocation(at.to_string())),
        }
    }

    fn set_scalar(&mut self, field: &FieldRef, value: ScalarValue) -> Result<(), ReflectError> {
        let value = self.coerce(&field.name, &field.kind, value)?;
        tracing::trace!(field = %field.name, %value, "set scalar");
        self.claim(&field.container, &field.name, Value::Scalar(value))
    }

    fn append_scalar(&mut self, field: &FieldRef, value: ScalarValue) -> Result<(), ReflectError> {
        let items = match &field.kind {
            FieldKind::Array(items) => items.as_ref(),
            _ => {
                return Err(ReflectError::NotAList {
                    field: field.name.clone(),
                    kind: field.kind.clone(),
                })
            }
        };
        let value = self.coerce(&field.name, items, value)?;
        tracing::trace!(field = %field.name, %value, "append scalar");

        if !self.has_field(&field.container, &field.name)? {
            self.claim(&field.container, &field.name, Value::List(Vec::new()))?;
        }
        let at = field.container.child(&field.name);
        match self.value_at_mut(&at)? {
            Value::List(list) => {
                list.push(Value::Scalar(value));
                Ok(())
            }
            _ => Err(ReflectError::InvalidLocation(at.to_string())),
        }
    }
}
