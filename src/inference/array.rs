// Array-literal inference: entries in source order, merges spliced in place.

use crate::ast::Expr;
use crate::inference::{Classified, FieldDescriptor, InferenceResult, Inferer, SampleStructure};
use crate::names::NameContext;

impl Inferer<'_> {
    /// Fields of an array literal; `None` for any other expression.
    ///
    /// - Only literal string keys name a field. Other entries stay in the
    ///   structure unkeyed and never reach the schema.
    /// - A repeated key replaces the earlier descriptor in its original slot.
    /// - `merge`/`mergeWhen` splice only from unkeyed entries.
    pub fn infer(&mut self, expr: &Expr, names: &NameContext) -> Option<InferenceResult> {
        let Expr::Array(items) = expr else {
            return None;
        };

        let mut fields = SampleStructure::new();
        for item in items {
            if item.unpack {
                tracing::trace!("spread entry skipped");
                continue;
            }
            let key = item.key.as_ref().and_then(Expr::as_str_literal).map(str::to_string);

            match self.classify(&item.value, names) {
                Some(Classified::Field { ty, required }) => {
                    put(&mut fields, FieldDescriptor { key, ty, required });
                }
                Some(Classified::Expand { nested, conditional }) => {
                    if item.key.is_some() {
                        tracing::trace!(key = ?key, "merge under a key skipped");
                        continue;
                    }
                    let Some(spliced) = self.infer(nested, names) else {
                        tracing::debug!("merge argument is not an array literal");
                        continue;
                    };
                    for mut field in spliced.fields {
                        if conditional {
                            field.required = false;
                        }
                        put(&mut fields, field);
                    }
                }
                None => {}
            }
        }

        let required = fields
            .iter()
            .filter(|f| f.required)
            .filter_map(|f| f.key.clone())
            .collect();
        Some(InferenceResult { fields, required })
    }
}

fn put(fields: &mut SampleStructure, field: FieldDescriptor) {
    if let Some(key) = &field.key {
        if let Some(slot) = fields.iter_mut().find(|f| f.key.as_ref() == Some(key)) {
            *slot = field;
            return;
        }
    }
    fields.push(field);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceConfig;
    use crate::inference::TypeDescriptor;
    use crate::parser::parse_expr;
    use crate::registry::SchemaRegistry;
    use crate::workspace::Workspace;

    fn infer(src: &str) -> Option<InferenceResult> {
        let ws = Workspace::new();
        let config = InferenceConfig::default();
        let mut registry = SchemaRegistry::new();
        let expr = parse_expr(src).unwrap();
        Inferer::new(&config, &ws, &mut registry).infer(&expr, &NameContext::default())
    }

    #[test]
    fn non_arrays_yield_nothing() {
        assert!(infer("$this->resource").is_none());
        assert!(infer("'x'").is_none());
    }

    #[test]
    fn empty_array_is_empty_structure() {
        let result = infer("[]").unwrap();
        assert!(result.fields.is_empty());
        assert!(result.required.is_empty());
    }

    #[test]
    fn legacy_array_syntax_and_order() {
        let result = infer("array('z' => 'a', 'y' => $this->b, 'x' => 5)").unwrap();
        assert_eq!(result.keys(), ["z", "y"]);
        assert_eq!(result.field("y").unwrap().ty, TypeDescriptor::ScalarUnknown);
    }

    #[test]
    fn merge_under_a_key_is_ignored() {
        let result = infer("['a' => $this->merge(['b' => 'x']), $this->merge(['c' => 'y'])]").unwrap();
        assert_eq!(result.keys(), ["c"]);
    }

    #[test]
    fn merge_of_non_array_is_ignored() {
        let result = infer("['a' => 'x', $this->merge($this->extra)]").unwrap();
        assert_eq!(result.keys(), ["a"]);
    }

    #[test]
    fn nested_merges_compose() {
        let result = infer(
            "[$this->mergeWhen($c, ['a' => 'x', $this->merge(['b' => $this->b])]), 'c' => 'z']",
        )
        .unwrap();
        assert_eq!(result.keys(), ["a", "b", "c"]);
        assert!(!result.field("a").unwrap().required);
        assert!(!result.field("b").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["c"]);
    }

    #[test]
    fn later_duplicate_can_restore_required() {
        let result = infer("['a' => $this->when($x, 'v'), 'b' => 'b', 'a' => 'w']").unwrap();
        assert_eq!(result.keys(), ["a", "b"]);
        assert!(result.field("a").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["a", "b"]);
    }
}
