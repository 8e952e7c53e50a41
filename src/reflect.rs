//! The capability interface the walker writes through. The walker never
//! sees concrete target types: it addresses containers by `Location` and
//! asks the target for schema facts and field handles.
use serde::Deserialize;
use std::fmt;

/// The declared type of a property.
#[derive(Debug, Clone, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A nested object of the named schema.
    Object(String),
    /// A nested oneof of the named schema; setting one option clears the others.
    Oneof(String),
    /// String-keyed map of the given value kind.
    Map(Box<FieldKind>),
    Array(Box<FieldKind>),
    Bool,
    String,
    Integer,
    Float,
    /// A value of the named enum schema.
    Enum(String),
    Bytes,
    Date,
    Timestamp,
    Decimal,
    Key,
}

impl FieldKind {
    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::Object(_) | FieldKind::Oneof(_) | FieldKind::Map(_))
    }

    /// Schema name of an object or oneof kind.
    pub fn schema(&self) -> Option<&str> {
        match self {
            FieldKind::Object(s) | FieldKind::Oneof(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Object(s) => write!(f, "object {}", s),
            FieldKind::Oneof(s) => write!(f, "oneof {}", s),
            FieldKind::Map(v) => write!(f, "map<{}>", v),
            FieldKind::Array(v) => write!(f, "array<{}>", v),
            FieldKind::Bool => f.write_str("bool"),
            FieldKind::String => f.write_str("string"),
            FieldKind::Integer => f.write_str("integer"),
            FieldKind::Float => f.write_str("float"),
            FieldKind::Enum(s) => write!(f, "enum {}", s),
            FieldKind::Bytes => f.write_str("bytes"),
            FieldKind::Date => f.write_str("date"),
            FieldKind::Timestamp => f.write_str("timestamp"),
            FieldKind::Decimal => f.write_str("decimal"),
            FieldKind::Key => f.write_str("key"),
        }
    }
}

/// A declared property of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
    /// Name usable for one element of an array property.
    pub single_form: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Object,
    Oneof,
    Map,
}

/// One step from a container to a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Field(String),
    Index(usize),
}

/// Address of a value, as steps from the root container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location(Vec<Step>);

impl Location {
    pub fn root() -> Self {
        Location(Vec::new())
    }

    pub fn child(&self, name: &str) -> Self {
        let mut steps = self.0.clone();
        steps.push(Step::Field(name.to_string()));
        Location(steps)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(Step::Index(i));
        Location(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, step) in self.0.iter().enumerate() {
            match step {
                Step::Field(name) if i == 0 => f.write_str(name)?,
                Step::Field(name) => write!(f, ".{}", name)?,
                Step::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// A named field within a container.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub container: Location,
    pub name: String,
    pub kind: FieldKind,
}

/// What a field name leads to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldHandle {
    /// An existing or newly created nested container.
    Container(Location),
    Scalar(FieldRef),
    /// Repeated containers; grow with `new_element`.
    ContainerList(FieldRef),
    /// Repeated scalars; grow with `append_scalar`.
    ScalarList(FieldRef),
}

/// A typed literal to store.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "{:?}", s),
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(n) => write!(f, "{}", n),
            ScalarValue::Float(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReflectError {
    #[error("unknown schema {0:?}")]
    UnknownSchema(String),
    #[error("{schema} has no field {field:?}")]
    UnknownField { schema: String, field: String },
    #[error("no container at {0}")]
    InvalidLocation(String),
    #[error("field {field:?} is {kind}, not a repeated container")]
    NotAList { field: String, kind: FieldKind },
    #[error("cannot store {value} in {field:?} ({kind})")]
    TypeMismatch {
        field: String,
        kind: FieldKind,
        value: String,
    },
}

/// Reflective access to a strongly-typed target.
pub trait Reflect {
    /// Schema name of the container at `at`; keys the BlockSpec cache.
    fn schema_name(&self, at: &Location) -> Result<String, ReflectError>;

    /// Identifies the declarations schema names refer to. Cached block
    /// specs are shared only between targets reporting the same value.
    fn schema_set(&self) -> u64 {
        0
    }

    fn container_kind(&self, at: &Location) -> Result<ContainerKind, ReflectError>;

    /// Declared properties of a schema, in declaration order.
    fn properties(&self, schema: &str) -> Result<Vec<PropertyInfo>, ReflectError>;

    /// Fetch-or-create the field `name` of the container at `at`.
    fn field(&mut self, at: &Location, name: &str) -> Result<FieldHandle, ReflectError>;

    /// Append a new empty element to a repeated-container field.
    fn new_element(&mut self, field: &FieldRef) -> Result<(Location, usize), ReflectError>;

    fn set_scalar(&mut self, field: &FieldRef, value: ScalarValue) -> Result<(), ReflectError>;

    fn append_scalar(&mut self, field: &FieldRef, value: ScalarValue) -> Result<(), ReflectError>;
}
