//! Parsed sources indexed by fully-qualified class name.
//!
//! Plays the discovery role for inference: which types exist, where a
//! transformer's method body lives, and what names mean in its file.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::ast::{base_name, ClassDecl, Method, Name, SourceUnit, Stmt};
use crate::error::{LoadError, ParseError};
use crate::locate::find_method;
use crate::names::{NameContext, TypeLookup};

/// Namespace the model-name fallback looks in.
const MODEL_NAMESPACE: &str = "App\\Models";

static MODEL_DOC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@property(?:-read)?\s+([\\\w]+)\s+\$resource\b|@mixin\s+([\\\w]+)").expect("valid model doc regex")
});

/// Discovery collaborator: existence checks plus access to transformer types.
pub trait TransformerSource: TypeLookup {
    fn transformer(&self, fq_name: &str) -> Option<Transformer<'_>>;
}

/// One class as seen from its own source unit.
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    pub name: &'a str,
    pub class: &'a ClassDecl,
    pub names: &'a NameContext,
    pub path: Option<&'a Path>,
}

impl<'a> Transformer<'a> {
    pub fn method(&self, name: &str) -> Option<&'a Method> {
        find_method(self.class, name)
    }

    /// Body of `name`, if the class declares it with one.
    pub fn method_body(&self, name: &str) -> Option<&'a [Stmt]> {
        self.method(name)?.body.as_deref()
    }

    /// Best-effort guess at the data model this transformer wraps.
    ///
    /// Looks at `@property Model $resource` / `@mixin Model` in the class
    /// doc comment, then at `App\Models\<Name minus "Resource">`. Only names
    /// that `types` knows are returned.
    pub fn model_hint(&self, types: &dyn TypeLookup) -> Option<String> {
        let from_doc = self.class.doc_comment.as_deref().and_then(|doc| {
            doc.lines().find_map(|line| {
                let caps = MODEL_DOC_LINE.captures(line)?;
                let written = caps.get(1).or_else(|| caps.get(2))?.as_str();
                Some(self.names.resolve_name(&Name::new(written), types))
            })
        });
        if let Some(fq) = from_doc.filter(|fq| types.type_exists(fq)) {
            return Some(fq);
        }

        let short = base_name(self.name);
        let model = short.strip_suffix("Resource").unwrap_or(short);
        let fq = format!("{MODEL_NAMESPACE}\\{model}");
        types.type_exists(&fq).then_some(fq)
    }
}

#[derive(Debug)]
struct LoadedUnit {
    path: Option<PathBuf>,
    unit: SourceUnit,
    names: NameContext,
}

#[derive(Debug, Default)]
pub struct Workspace {
    units: Vec<LoadedUnit>,
    // fq class name -> (unit index, class index)
    classes: IndexMap<String, (usize, usize)>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse every file in parallel; the first failure aborts.
    pub fn load_files(paths: &[PathBuf]) -> Result<Self, LoadError> {
        let parsed = paths
            .par_iter()
            .map(|path| -> Result<(PathBuf, SourceUnit), LoadError> {
                let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                let unit = crate::parser::parse(&source).map_err(|source| LoadError::Parse {
                    path: path.clone(),
                    source,
                })?;
                Ok((path.clone(), unit))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        let mut workspace = Self::new();
        for (path, unit) in parsed {
            workspace.add_unit(Some(path), unit);
        }
        Ok(workspace)
    }

    pub fn add_source(&mut self, source: &str) -> Result<(), ParseError> {
        let unit = crate::parser::parse(source)?;
        self.add_unit(None, unit);
        Ok(())
    }

    /// Later declarations of an already known class name are ignored.
    pub fn add_unit(&mut self, path: Option<PathBuf>, unit: SourceUnit) {
        let names = NameContext::from_unit(&unit);
        let unit_index = self.units.len();
        for (class_index, class) in unit.classes.iter().enumerate() {
            let fq = names.declared(&class.name);
            if self.classes.contains_key(&fq) {
                tracing::warn!(class = %fq, "duplicate class declaration ignored");
                continue;
            }
            self.classes.insert(fq, (unit_index, class_index));
        }
        self.units.push(LoadedUnit { path, unit, names });
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Classes that declare `method` with a body, in load order.
    pub fn transformers_with(&self, method: &str) -> Vec<Transformer<'_>> {
        self.class_names()
            .filter_map(|fq| self.transformer(fq))
            .filter(|t| t.method_body(method).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TypeLookup for Workspace {
    fn type_exists(&self, fq_name: &str) -> bool {
        self.classes.contains_key(fq_name)
    }
}

impl TransformerSource for Workspace {
    fn transformer(&self, fq_name: &str) -> Option<Transformer<'_>> {
        let (fq, &(unit_index, class_index)) = self.classes.get_key_value(fq_name)?;
        let loaded = &self.units[unit_index];
        Some(Transformer {
            name: fq,
            class: &loaded.unit.classes[class_index],
            names: &loaded.names,
            path: loaded.path.as_deref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(sources: &[&str]) -> Workspace {
        let mut ws = Workspace::new();
        for src in sources {
            ws.add_source(src).unwrap();
        }
        ws
    }

    #[test]
    fn indexes_classes_by_qualified_name() {
        let ws = workspace(&[
            "<?php namespace App\\Http\\Resources; class UserResource { function toArray() { return []; } }",
            "<?php class Plain {}",
        ]);
        assert!(ws.type_exists("App\\Http\\Resources\\UserResource"));
        assert!(ws.type_exists("Plain"));
        assert!(!ws.type_exists("UserResource"));

        let t = ws.transformer("App\\Http\\Resources\\UserResource").unwrap();
        assert_eq!(t.names.namespace(), Some("App\\Http\\Resources"));
        assert!(t.method_body("toArray").is_some());
        assert_eq!(ws.transformers_with("toArray").len(), 1);
    }

    #[test]
    fn model_hint_from_doc_comment() {
        let ws = workspace(&[
            "<?php namespace App\\Domain; class Account {}",
            "<?php namespace App\\Http; use App\\Domain\\Account;
             /**
              * @property Account $resource
              */
             class UserResource {}",
        ]);
        let t = ws.transformer("App\\Http\\UserResource").unwrap();
        assert_eq!(t.model_hint(&ws).as_deref(), Some("App\\Domain\\Account"));
    }

    #[test]
    fn model_hint_falls_back_to_models_namespace() {
        let ws = workspace(&[
            "<?php namespace App\\Models; class Post {}",
            "<?php namespace App\\Http; /** @mixin Unknown */ class PostResource {}",
            "<?php namespace App\\Http; class TagResource {}",
        ]);
        let post = ws.transformer("App\\Http\\PostResource").unwrap();
        assert_eq!(post.model_hint(&ws).as_deref(), Some("App\\Models\\Post"));
        let tag = ws.transformer("App\\Http\\TagResource").unwrap();
        assert_eq!(tag.model_hint(&ws), None);
    }

    #[test]
    fn loaded_classes_remember_their_file() {
        let path = std::env::temp_dir().join(format!("resource-schema-{}-TagResource.php", std::process::id()));
        std::fs::write(&path, "<?php namespace App; class TagResource { function toArray() { return []; } }").unwrap();
        let ws = Workspace::load_files(std::slice::from_ref(&path)).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(ws.transformer("App\\TagResource").unwrap().path, Some(path.as_path()));
        let inline = workspace(&["<?php namespace App; class Other {}"]);
        assert_eq!(inline.transformer("App\\Other").unwrap().path, None);
    }

    #[test]
    fn load_reports_the_failing_file() {
        let missing = PathBuf::from("/definitely/not/here.php");
        let err = Workspace::load_files(&[missing]).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
