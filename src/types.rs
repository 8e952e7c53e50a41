//! Schema declarations backing the dynamic target in `tree`.
use crate::reflect::{FieldKind, PropertyInfo};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Object,
    Oneof,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Hash, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub single_form: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Hash, Deserialize)]
pub struct TypeDef {
    pub kind: TypeKind,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Enum values.
    #[serde(default)]
    pub values: Vec<String>,
}

impl TypeDef {
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Every schema the dynamic target knows, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Hash, Deserialize)]
#[serde(transparent)]
pub struct TypeSet {
    pub types: BTreeMap<String, TypeDef>,
}

impl TypeSet {
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Content hash of every declaration. Equal type sets share it.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub fn property_infos(&self, name: &str) -> Option<Vec<PropertyInfo>> {
        let def = self.get(name)?;
        Some(
            def.properties
                .iter()
                .map(|p| PropertyInfo {
                    name: p.name.clone(),
                    required: p.required,
                    kind: p.kind.clone(),
                    single_form: p.single_form.clone(),
                })
                .collect(),
        )
    }

    /// Check that every object, oneof and enum reference names a declared
    /// schema of the right kind. Returns one message per problem.
    pub fn check_references(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (type_name, def) in &self.types {
            for prop in &def.properties {
                self.check_kind(&prop.kind, &format!("{}.{}", type_name, prop.name), &mut problems);
            }
        }
        problems
    }

    fn check_kind(&self, kind: &FieldKind, at: &str, problems: &mut Vec<String>) {
        let (name, expected) = match kind {
            FieldKind::Object(name) => (name, TypeKind::Object),
            FieldKind::Oneof(name) => (name, TypeKind::Oneof),
            FieldKind::Enum(name) => (name, TypeKind::Enum),
            FieldKind::Map(inner) | FieldKind::Array(inner) => {
                return self.check_kind(inner, at, problems)
            }
            _ => return,
        };
        match self.get(name) {
            None => problems.push(format!("{}: unknown schema {:?}", at, name)),
            Some(def) if def.kind != expected => problems.push(format!(
                "{}: {:?} is declared as {:?}, referenced as {:?}",
                at, name, def.kind, expected
            )),
            Some(_) => {}
        }
    }
}
