//! Names of the idioms the inference engine recognizes.
//!
//! Defaults match the stock resource base class; a JSON file can override
//! any subset of fields (see [`InferenceConfig::load`]).
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct InferenceConfig {
    /// Method whose returned array is the response body.
    pub method: String,
    /// Variable naming the enclosing instance inside that method.
    pub instance_var: String,
    /// `when(cond, value)`: one optional field.
    pub conditional_field: Vec<String>,
    /// `merge([...])`: splice another literal in place.
    pub merge: Vec<String>,
    /// `mergeWhen(cond, [...])`: splice, every field optional.
    pub conditional_merge: Vec<String>,
    /// Calls whose value may be missing; constructing a nested transformer
    /// from one of these makes the field optional.
    pub conditional_value: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            method: "toArray".into(),
            instance_var: "this".into(),
            conditional_field: vec!["when".into()],
            merge: vec!["merge".into()],
            conditional_merge: vec!["mergeWhen".into()],
            conditional_value: ["when", "whenLoaded", "whenNotNull", "whenHas", "whenCounted", "whenPivotLoaded"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl InferenceConfig {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        crate::path_de::load_json_file(path)
    }

    pub fn is_conditional_field(&self, method: &str) -> bool {
        contains(&self.conditional_field, method)
    }

    pub fn is_merge(&self, method: &str) -> bool {
        contains(&self.merge, method)
    }

    pub fn is_conditional_merge(&self, method: &str) -> bool {
        contains(&self.conditional_merge, method)
    }

    pub fn is_conditional_value(&self, method: &str) -> bool {
        contains(&self.conditional_value, method)
    }
}

// method names are case-insensitive in the source language
fn contains(names: &[String], method: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_de::from_str_with_path;

    #[test]
    fn partial_files_keep_defaults() {
        let config: InferenceConfig = from_str_with_path(r#"{"merge": ["merge", "mergeAll"]}"#).unwrap();
        assert!(config.is_merge("mergeAll"));
        assert!(config.is_merge("MERGE"));
        assert_eq!(config.method, "toArray");
        assert!(config.is_conditional_value("whenLoaded"));
    }

    #[test]
    fn wrong_types_are_rejected_with_path() {
        let err = from_str_with_path::<InferenceConfig>(r#"{"conditional_value": "when"}"#).unwrap_err();
        assert!(err.contains("conditional_value"), "{err}");
    }
}
