//! Loading schema declarations and block specs from JSON.
use crate::blockspec::SpecSet;
use crate::types::TypeSet;

/// Why a JSON configuration document was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unresolved schema references:\n  {}", .0.join("\n  "))]
    References(Vec<String>),
    #[error("block spec for {schema}: {message}")]
    Spec { schema: String, message: String },
}

impl TypeSet {
    /// Deserialize type declarations and check that every reference
    /// resolves.
    pub fn from_json(input: &str) -> Result<TypeSet, ConfigError> {
        let types: TypeSet = serde_json::from_str(input)?;
        let problems = types.check_references();
        if !problems.is_empty() {
            return Err(ConfigError::References(problems));
        }
        tracing::debug!(types = types.types.len(), "loaded type set");
        Ok(types)
    }
}

impl SpecSet {
    /// Deserialize explicit block specs; each is validated on load.
    pub fn from_json(input: &str) -> Result<SpecSet, ConfigError> {
        let specs: SpecSet = serde_json::from_str(input)?;
        for (schema, spec) in &specs.specs {
            spec.validate(schema).map_err(|e| ConfigError::Spec {
                schema: schema.clone(),
                message: e.message(),
            })?;
        }
        tracing::debug!(specs = specs.specs.len(), "loaded block specs");
        Ok(specs)
    }
}
