//! Declarative mapping from block syntax (tags, qualifiers, children,
//! descriptions) onto target fields, one `BlockSpec` per schema name.
use crate::error::{Error, ErrorKind};
use crate::reflect::{ContainerKind, FieldKind, Location, PropertyInfo, Reflect};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Field names from a container down to a nested field.
pub type FieldPath = Vec<String>;

static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// How one header tag maps onto the target.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tag {
    /// Field receiving the value, or for block tags the container in which
    /// the tag names a child (empty = the current container).
    pub field: FieldPath,
    /// The tag selects a nested container rather than setting a value.
    pub block: bool,
    /// Missing tag is not an error.
    pub optional: bool,
    /// Set to `true` when the tag is written `!tag`.
    pub bang_field: Option<FieldPath>,
    /// Set to `true` when the tag is written `?tag`.
    pub question_field: Option<FieldPath>,
    /// Assign a dotted reference right-aligned across these fields; the
    /// first receives every leading segment joined with `.`.
    pub split_ref: Option<Vec<FieldPath>>,
}

impl Tag {
    pub fn field(path: &[&str]) -> Self {
        Tag {
            field: path.iter().map(|s| s.to_string()).collect(),
            ..Tag::default()
        }
    }

    fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        std::iter::once(&self.field)
            .chain(self.bang_field.iter())
            .chain(self.question_field.iter())
            .chain(self.split_ref.iter().flatten())
    }
}

/// Where a child name leads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChildSpec {
    pub path: FieldPath,
    pub is_container: bool,
    pub is_scalar: bool,
    pub is_collection: bool,
}

/// Decompose one tag into several fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScalarSplit {
    /// Split string tags on this; without it the tag must be a dotted
    /// reference and its segments are used.
    pub delimiter: Option<String>,
    pub right_to_left: bool,
    pub required: Vec<FieldPath>,
    pub optional: Vec<FieldPath>,
    pub remainder: Option<FieldPath>,
}

impl ScalarSplit {
    /// Assign `parts` to field paths. Consumes from the front of the
    /// (possibly reversed) list: required first, then optional, and joins
    /// whatever is left into `remainder` in original order.
    pub fn assign(&self, parts: Vec<String>) -> Result<Vec<(FieldPath, String)>, ErrorKind> {
        let mut parts = parts;
        if self.right_to_left {
            parts.reverse();
        }
        if parts.len() < self.required.len() {
            return Err(ErrorKind::ScalarSplit(format!(
                "expected at least {} parts, got {}",
                self.required.len(),
                parts.len()
            )));
        }

        let mut rest = parts.into_iter();
        let mut out = Vec::new();
        for path in &self.required {
            if let Some(part) = rest.next() {
                out.push((path.clone(), part));
            }
        }
        for path in &self.optional {
            match rest.next() {
                Some(part) => out.push((path.clone(), part)),
                None => break,
            }
        }

        let mut leftover: Vec<String> = rest.collect();
        if !leftover.is_empty() {
            let remainder = self.remainder.as_ref().ok_or_else(|| {
                ErrorKind::ScalarSplit(format!("{} unexpected extra part(s)", leftover.len()))
            })?;
            if self.right_to_left {
                leftover.reverse();
            }
            let joiner = self.delimiter.as_deref().unwrap_or(".");
            out.push((remainder.clone(), leftover.join(joiner)));
        }
        Ok(out)
    }
}

/// How blocks of one schema are written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlockSpec {
    pub name: Option<Tag>,
    pub type_select: Option<Tag>,
    pub qualifier: Option<Tag>,
    pub description: Option<FieldPath>,
    pub children: BTreeMap<String, ChildSpec>,
    pub scalar_split: Option<ScalarSplit>,
    /// Only the declared children; no derivation from the schema.
    pub only_defined: bool,
}

impl BlockSpec {
    /// Reject explicit specs that cannot be applied.
    pub fn validate(&self, schema: &str) -> Result<(), Error> {
        let invalid = |message: String| {
            Error::new(ErrorKind::InvalidSpec {
                schema: schema.to_string(),
                message,
            })
        };

        if let Some(tag) = &self.name {
            if tag.block {
                return Err(invalid("name tag cannot be a block tag".to_string()));
            }
        }
        if let Some(tag) = &self.qualifier {
            if tag.block && tag.split_ref.is_some() {
                return Err(invalid(
                    "block qualifier cannot split its reference".to_string(),
                ));
            }
        }

        let tag_paths = [&self.name, &self.type_select, &self.qualifier]
            .into_iter()
            .flatten()
            .flat_map(|t| t.paths());
        let child_paths = self.children.values().map(|c| &c.path);
        let split_paths = self.scalar_split.iter().flat_map(|s| {
            s.required
                .iter()
                .chain(s.optional.iter())
                .chain(s.remainder.iter())
        });
        for path in tag_paths
            .chain(child_paths)
            .chain(split_paths)
            .chain(self.description.iter())
        {
            if let Some(bad) = path.iter().find(|seg| !SEGMENT.is_match(seg)) {
                return Err(invalid(format!("invalid field name {:?}", bad)));
            }
        }
        for (name, child) in &self.children {
            if child.path.is_empty() {
                return Err(invalid(format!("child {:?} has an empty path", name)));
            }
        }
        if let Some(split) = &self.scalar_split {
            if split.required.is_empty() && split.optional.is_empty() && split.remainder.is_none()
            {
                return Err(invalid("scalar split assigns no fields".to_string()));
            }
        }
        Ok(())
    }
}

/// Explicit BlockSpecs keyed by schema name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SpecSet {
    pub specs: BTreeMap<String, BlockSpec>,
}

impl SpecSet {
    pub fn new() -> Self {
        SpecSet::default()
    }

    pub fn with(mut self, schema: &str, spec: BlockSpec) -> Self {
        self.specs.insert(schema.to_string(), spec);
        self
    }

    pub fn get(&self, schema: &str) -> Option<&BlockSpec> {
        self.specs.get(schema)
    }
}

/// Builds and caches one `BlockSpec` per schema of a schema set. Owned by
/// one walker.
#[derive(Debug, Default)]
pub struct SpecCache {
    explicit: SpecSet,
    cache: HashMap<(u64, String), Rc<BlockSpec>>,
}

impl SpecCache {
    pub fn new(explicit: SpecSet) -> Self {
        SpecCache {
            explicit,
            cache: HashMap::new(),
        }
    }

    /// The block spec for the container at `at`.
    pub fn block_spec<T: Reflect + ?Sized>(
        &mut self,
        target: &T,
        at: &Location,
    ) -> Result<Rc<BlockSpec>, Error> {
        let key = (target.schema_set(), target.schema_name(at)?);
        if let Some(spec) = self.cache.get(&key) {
            return Ok(spec.clone());
        }
        let schema = key.1.as_str();
        let spec = match target.container_kind(at)? {
            ContainerKind::Map => BlockSpec::default(),
            ContainerKind::Object | ContainerKind::Oneof => self.build(target, schema)?,
        };
        tracing::debug!(
            schema,
            explicit = self.explicit.get(schema).is_some(),
            children = spec.children.len(),
            "built block spec"
        );
        let spec = Rc::new(spec);
        self.cache.insert(key, spec.clone());
        Ok(spec)
    }

    /// A spec already built for `schema` in the schema set `set`.
    pub fn cached(&self, set: u64, schema: &str) -> Option<Rc<BlockSpec>> {
        self.cache.get(&(set, schema.to_string())).cloned()
    }

    fn build<T: Reflect + ?Sized>(&self, target: &T, schema: &str) -> Result<BlockSpec, Error> {
        let mut spec = match self.explicit.get(schema) {
            Some(explicit) => {
                explicit.validate(schema)?;
                explicit.clone()
            }
            None => BlockSpec::default(),
        };

        let properties = target.properties(schema)?;
        if !spec.only_defined {
            derive(&mut spec, &properties);
        }

        for (name, child) in spec.children.iter_mut() {
            classify(target, schema, &properties, child).map_err(|message| {
                Error::new(ErrorKind::InvalidSpec {
                    schema: schema.to_string(),
                    message: format!("child {:?}: {}", name, message),
                })
            })?;
        }
        Ok(spec)
    }
}

/// Fill defaults from the schema's declared properties. Never overwrites
/// anything already declared.
fn derive(spec: &mut BlockSpec, properties: &[PropertyInfo]) {
    for prop in properties {
        if prop.kind == FieldKind::String {
            if prop.name == "name" && spec.name.is_none() {
                spec.name = Some(Tag::field(&["name"]));
            }
            if prop.name == "description" && spec.description.is_none() {
                spec.description = Some(vec!["description".to_string()]);
            }
        }

        let child = ChildSpec {
            path: vec![prop.name.clone()],
            ..ChildSpec::default()
        };
        spec.children.entry(prop.name.clone()).or_insert(child.clone());

        if let FieldKind::Array(items) = &prop.kind {
            let alias = prop
                .single_form
                .clone()
                .or_else(|| items.schema().map(snake_case));
            if let Some(alias) = alias {
                spec.children.entry(alias).or_insert(child);
            }
        }
    }
}

/// Set the kind flags of a child by following its path through the schema.
fn classify<T: Reflect + ?Sized>(
    target: &T,
    schema: &str,
    properties: &[PropertyInfo],
    child: &mut ChildSpec,
) -> Result<(), String> {
    let mut current_schema = schema.to_string();
    let mut props = properties.to_vec();
    let last = child.path.len().saturating_sub(1);

    for (i, segment) in child.path.iter().enumerate() {
        let prop = props
            .iter()
            .find(|p| p.name == *segment)
            .ok_or_else(|| format!("{} has no field {:?}", current_schema, segment))?;

        if i == last {
            let (is_collection, element) = match &prop.kind {
                FieldKind::Array(items) => (true, items.as_ref()),
                kind => (false, kind),
            };
            child.is_collection = is_collection;
            child.is_container = element.is_container();
            child.is_scalar = !child.is_container;
            return Ok(());
        }

        match &prop.kind {
            FieldKind::Object(next) | FieldKind::Oneof(next) => {
                current_schema = next.clone();
                props = target.properties(next).map_err(|e| e.to_string())?;
            }
            kind => {
                return Err(format!(
                    "{:?} is {}, cannot walk through it",
                    segment, kind
                ))
            }
        }
    }
    Err("empty path".to_string())
}

/// `EnumOption` -> `enum_option`
pub fn snake_case(name: &str) -> String {
    CAMEL_BOUNDARY.replace_all(name, "${1}_${2}").to_lowercase()
}
