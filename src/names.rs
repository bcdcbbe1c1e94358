//! Short-name → fully-qualified-name resolution for one source unit.
use indexmap::IndexMap;

use crate::ast::{Name, NameKind, SourceUnit};

/// Answers whether a fully-qualified type name exists anywhere we can see.
pub trait TypeLookup {
    fn type_exists(&self, fq_name: &str) -> bool;
}

/// Alias table plus enclosing namespace, built once per source unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameContext {
    namespace: Option<String>,
    aliases: IndexMap<String, String>,
}

impl NameContext {
    pub fn new(namespace: Option<String>, aliases: IndexMap<String, String>) -> Self {
        Self { namespace, aliases }
    }

    pub fn from_unit(unit: &SourceUnit) -> Self {
        let aliases = unit
            .uses
            .iter()
            .map(|u| (u.binding().to_string(), u.name.text.clone()))
            .collect();
        Self {
            namespace: unit.namespace.as_ref().map(|n| n.text.clone()),
            aliases,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Fully-qualified name of a class declared in this unit.
    pub fn declared(&self, short_name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}\\{short_name}"),
            None => short_name.to_string(),
        }
    }

    /// Resolve a short name written in this unit.
    ///
    /// Alias table first, then the enclosing namespace if the resulting type
    /// exists, else the name unchanged. Never fails.
    pub fn resolve<T: TypeLookup + ?Sized>(&self, short_name: &str, types: &T) -> String {
        if let Some(fq) = self.aliases.get(short_name) {
            return fq.clone();
        }
        if let Some(ns) = &self.namespace {
            let fq = format!("{ns}\\{short_name}");
            if types.type_exists(&fq) {
                return fq;
            }
        }
        short_name.to_string()
    }

    /// Resolve a name as it appears in an expression, honouring its form.
    pub fn resolve_name<T: TypeLookup + ?Sized>(&self, name: &Name, types: &T) -> String {
        match name.kind {
            NameKind::FullyQualified => name.text.clone(),
            NameKind::Qualified => match self.aliases.get(name.first_segment()) {
                Some(prefix) => {
                    let rest = &name.text[name.first_segment().len()..];
                    format!("{prefix}{rest}")
                }
                None => self.resolve(&name.text, types),
            },
            NameKind::Unqualified => self.resolve(&name.text, types),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct Known(&'static [&'static str]);

    impl TypeLookup for Known {
        fn type_exists(&self, fq_name: &str) -> bool {
            self.0.contains(&fq_name)
        }
    }

    fn known(names: &'static [&'static str]) -> Known {
        Known(names)
    }

    #[test]
    fn alias_table_wins() {
        let unit = parse("<?php namespace App\\Http; use App\\Models\\User as Account; use Foo\\Bar;").unwrap();
        let ctx = NameContext::from_unit(&unit);
        let types = known(&["App\\Http\\Account"]);
        assert_eq!(ctx.resolve("Account", &types), "App\\Models\\User");
        assert_eq!(ctx.resolve("Bar", &types), "Foo\\Bar");
    }

    #[test]
    fn namespace_only_when_type_exists() {
        let unit = parse("<?php namespace App\\Http\\Resources;").unwrap();
        let ctx = NameContext::from_unit(&unit);
        let types = known(&["App\\Http\\Resources\\PostResource"]);
        assert_eq!(ctx.resolve("PostResource", &types), "App\\Http\\Resources\\PostResource");
        assert_eq!(ctx.resolve("Missing", &types), "Missing");
    }

    #[test]
    fn no_namespace_no_imports() {
        let ctx = NameContext::from_unit(&parse("<?php class A {}").unwrap());
        assert_eq!(ctx.namespace(), None);
        assert!(ctx.aliases().is_empty());
        assert_eq!(ctx.resolve("A", &known(&["A"])), "A");
        assert_eq!(ctx.declared("A"), "A");
    }

    #[test]
    fn qualified_and_fully_qualified_names() {
        let unit = parse("<?php namespace App; use App\\Http\\Resources;").unwrap();
        let ctx = NameContext::from_unit(&unit);
        let types = known(&[]);
        assert_eq!(
            ctx.resolve_name(&Name::new("Resources\\UserResource"), &types),
            "App\\Http\\Resources\\UserResource"
        );
        assert_eq!(ctx.resolve_name(&Name::new("\\Other\\Thing"), &types), "Other\\Thing");
        assert_eq!(ctx.resolve_name(&Name::new("Nope\\Thing"), &types), "Nope\\Thing");
    }
}
