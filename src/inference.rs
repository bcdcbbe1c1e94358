//! Static response-shape inference for transformer types.
//!
//! Reads the array a transformer's `toArray` method returns and turns it
//! into a schema without running any code:
//!
//! - locate the first `return` of the method body;
//! - if it returns an array literal, classify every entry (literal strings,
//!   `$this` property reads, nested transformers, `when`/`merge`/`mergeWhen`);
//! - lower the resulting field list into a named schema in the registry.
//!
//! Design goals:
//! - Best effort. Anything unrecognized is skipped; a method we cannot read
//!   yields no schema rather than an error.
//! - Names are reserved in the registry before nested types are expanded,
//!   so self-referential transformer graphs terminate and shared nested
//!   types converge on one schema.
pub mod array;
pub mod expr;

use indexmap::IndexSet;

use crate::ast::{base_name, Expr, Stmt};
use crate::config::InferenceConfig;
use crate::ir::Response;
use crate::locate::find_return;
use crate::names::NameContext;
use crate::registry::{SchemaRef, SchemaRegistry};
use crate::workspace::TransformerSource;

pub use expr::Classified;

// ------------------------------- Model ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    StringLiteral,
    ScalarUnknown,
    /// Name of an entry in the schema registry.
    SchemaReference(String),
    InlineObject(SampleStructure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Only literal string keys; unkeyed entries are kept but never documented.
    pub key: Option<String>,
    pub ty: TypeDescriptor,
    pub required: bool,
}

/// Inferred fields of one array literal, in source order.
pub type SampleStructure = Vec<FieldDescriptor>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceResult {
    pub fields: SampleStructure,
    pub required: IndexSet<String>,
}

impl InferenceResult {
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key.as_deref() == Some(key))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().filter_map(|f| f.key.as_deref()).collect()
    }
}

// ------------------------------- Front API -------------------------------- //

/// One document-generation run: config, discovery and the shared registry.
pub struct Inferer<'a> {
    config: &'a InferenceConfig,
    source: &'a dyn TransformerSource,
    registry: &'a mut SchemaRegistry,
    /// Types whose method bodies are being read, innermost last.
    enclosing: Vec<String>,
}

impl<'a> Inferer<'a> {
    pub fn new(
        config: &'a InferenceConfig,
        source: &'a dyn TransformerSource,
        registry: &'a mut SchemaRegistry,
    ) -> Self {
        Self { config, source, registry, enclosing: Vec::new() }
    }

    pub fn config(&self) -> &InferenceConfig {
        self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    /// Schema for `type_name` given its method body and name context.
    ///
    /// Returns the existing reference if the registry already holds the
    /// schema name (finished or still being built). Otherwise the name is
    /// reserved before any nested type is looked at.
    pub fn infer_response_schema(
        &mut self,
        type_name: &str,
        body: &[Stmt],
        names: &NameContext,
    ) -> Option<SchemaRef> {
        let schema_name = base_name(type_name);
        if self.registry.has(schema_name) {
            tracing::trace!(schema = schema_name, "schema already registered");
            return Some(self.registry.reference(schema_name));
        }

        let Some(returned) = find_return(body) else {
            tracing::debug!(type_name, "no return value in method body");
            return None;
        };
        if !matches!(returned, Expr::Array(_)) {
            tracing::debug!(type_name, "return value is not an array literal");
            return None;
        }

        if !self.registry.reserve(schema_name) {
            return Some(self.registry.reference(schema_name));
        }
        let result = self.infer_within(type_name, returned, names)?;
        let reference = crate::lower::build_schema(schema_name, &result, self.registry);
        tracing::info!(type_name, schema = schema_name, fields = result.fields.len(), "schema registered");
        Some(reference)
    }

    /// Schema for a transformer type looked up through the discovery source.
    pub fn infer_type(&mut self, type_name: &str) -> Option<SchemaRef> {
        let schema_name = base_name(type_name);
        if self.registry.has(schema_name) {
            return Some(self.registry.reference(schema_name));
        }
        let source = self.source;
        let Some(transformer) = source.transformer(type_name) else {
            tracing::debug!(type_name, "unknown type");
            return None;
        };
        let Some(body) = transformer.method_body(&self.config.method) else {
            tracing::debug!(type_name, method = %self.config.method, "no such method");
            return None;
        };
        self.infer_response_schema(transformer.name, body, transformer.names)
    }

    /// The documented `200` response of a transformer type.
    pub fn extract_response(&mut self, type_name: &str) -> Option<Response> {
        let reference = self.infer_type(type_name)?;
        Some(Response::json(200, reference.to_ty()))
    }

    /// The raw field list of a transformer's return value, without
    /// registering the transformer itself. Nested types still register.
    pub fn sample(&mut self, type_name: &str) -> Option<InferenceResult> {
        let source = self.source;
        let transformer = source.transformer(type_name)?;
        let body = transformer.method_body(&self.config.method)?;
        let returned = find_return(body)?;
        self.infer_within(transformer.name, returned, transformer.names)
    }

    fn infer_within(&mut self, type_name: &str, returned: &Expr, names: &NameContext) -> Option<InferenceResult> {
        self.enclosing.push(type_name.to_string());
        let result = self.infer(returned, names);
        self.enclosing.pop();
        result
    }
}

/// Single-call entry point with the default idiom names.
pub fn infer_response_schema(
    type_name: &str,
    body: &[Stmt],
    names: &NameContext,
    source: &dyn TransformerSource,
    registry: &mut SchemaRegistry,
) -> Option<SchemaRef> {
    let config = InferenceConfig::default();
    Inferer::new(&config, source, registry).infer_response_schema(type_name, body, names)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Ty;
    use crate::workspace::Workspace;

    fn workspace(sources: &[&str]) -> Workspace {
        let mut ws = Workspace::new();
        for src in sources {
            ws.add_source(src).unwrap();
        }
        ws
    }

    fn resource(namespace: &str, class: &str, returned: &str) -> String {
        format!(
            "<?php namespace {namespace};\nuse Illuminate\\Http\\Resources\\Json\\JsonResource;\n\
             class {class} extends JsonResource {{\n  public function toArray($request) {{\n    return {returned};\n  }}\n}}\n"
        )
    }

    fn infer(ws: &Workspace, registry: &mut SchemaRegistry, type_name: &str) -> Option<SchemaRef> {
        let config = InferenceConfig::default();
        Inferer::new(&config, ws, registry).infer_type(type_name)
    }

    fn sample(ws: &Workspace, type_name: &str) -> InferenceResult {
        let config = InferenceConfig::default();
        let mut registry = SchemaRegistry::new();
        Inferer::new(&config, ws, &mut registry).sample(type_name).unwrap()
    }

    #[test]
    fn plain_literal_fields_are_required_strings() {
        let ws = workspace(&[&resource("App", "UserResource", "['id' => 'x', 'name' => 'y']")]);
        let mut registry = SchemaRegistry::new();
        let reference = infer(&ws, &mut registry, "App\\UserResource").unwrap();
        assert_eq!(reference.name(), "UserResource");

        let schema = registry.get("UserResource").unwrap();
        assert_eq!(schema.required(), ["id", "name"]);
        assert_eq!(schema.field("id").unwrap().ty, Ty::String);
        assert_eq!(schema.field("name").unwrap().ty, Ty::String);
    }

    #[test]
    fn instance_property_reads_are_scalars() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['id' => $this->id, 'email' => $this->resource->email, 'deep' => $this->a->b->c, 'call' => $this->name()]",
        )]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.field("id").unwrap().ty, TypeDescriptor::ScalarUnknown);
        assert_eq!(result.field("email").unwrap().ty, TypeDescriptor::ScalarUnknown);
        assert!(result.field("deep").is_none());
        assert!(result.field("call").is_none());
        assert_eq!(result.keys(), ["id", "email"]);
    }

    #[test]
    fn conditional_single_field_is_optional() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['id' => $this->id, 'secret' => $this->when($isAdmin, 'shh'), 'lazy' => $this->when($x, fn () => $this->lazy)]",
        )]);
        let result = sample(&ws, "App\\UserResource");
        let secret = result.field("secret").unwrap();
        assert_eq!(secret.ty, TypeDescriptor::StringLiteral);
        assert!(!secret.required);
        assert_eq!(result.field("lazy").unwrap().ty, TypeDescriptor::ScalarUnknown);
        assert!(!result.field("lazy").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["id"]);
    }

    #[test]
    fn unconditional_merge_keeps_nested_required_flags() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['b' => $this->b, $this->merge(['a' => $this->a, 'c' => $this->when($x, 'c')]), 'd' => 'd']",
        )]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.keys(), ["b", "a", "c", "d"]);
        assert!(result.field("a").unwrap().required);
        assert!(result.field("b").unwrap().required);
        assert!(!result.field("c").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["b", "a", "d"]);
    }

    #[test]
    fn conditional_merge_forces_optional() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['b' => $this->b, $this->mergeWhen($admin, ['a' => $this->a, 'e' => 'x'])]",
        )]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.keys(), ["b", "a", "e"]);
        assert!(!result.field("a").unwrap().required);
        assert!(!result.field("e").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn nested_transformer_from_conditional_value_is_optional_reference() {
        let ws = workspace(&[
            &resource("App", "UserResource", "['id' => $this->id, 'posts' => new PostResource($this->whenLoaded('posts'))]"),
            &resource("App", "PostResource", "['title' => $this->title]"),
        ]);
        let mut registry = SchemaRegistry::new();
        infer(&ws, &mut registry, "App\\UserResource").unwrap();

        let user = registry.get("UserResource").unwrap();
        let posts = user.field("posts").unwrap();
        assert_eq!(posts.ty, Ty::Ref("PostResource".into()));
        assert!(!posts.required);
        assert_eq!(registry.get("PostResource").unwrap().required(), ["title"]);
    }

    #[test]
    fn nested_transformer_from_plain_value_is_required_reference() {
        let ws = workspace(&[
            "<?php namespace App\\Http; use App\\Other\\AuthorResource as Author;
             class PostResource { function toArray($r) { return ['author' => new Author($this->author)]; } }",
            &resource("App\\Other", "AuthorResource", "['name' => $this->name]"),
        ]);
        let result = sample(&ws, "App\\Http\\PostResource");
        let author = result.field("author").unwrap();
        assert_eq!(author.ty, TypeDescriptor::SchemaReference("AuthorResource".into()));
        assert!(author.required);
    }

    #[test]
    fn unresolvable_nested_type_degrades_to_scalar() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['team' => new TeamResource($this->whenLoaded('team')), 'raw' => new NoArray($this->x)]",
        ), &resource("App", "NoArray", "$this->resource")]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.field("team").unwrap().ty, TypeDescriptor::ScalarUnknown);
        assert!(!result.field("team").unwrap().required);
        assert_eq!(result.field("raw").unwrap().ty, TypeDescriptor::ScalarUnknown);
    }

    #[test]
    fn self_reference_terminates() {
        let ws = workspace(&[&resource(
            "App",
            "CategoryResource",
            "['name' => $this->name, 'parent' => new CategoryResource($this->whenLoaded('parent'))]",
        )]);
        let mut registry = SchemaRegistry::new();
        let reference = infer(&ws, &mut registry, "App\\CategoryResource").unwrap();
        assert_eq!(registry.len(), 1);
        let schema = registry.get(reference.name()).unwrap();
        assert_eq!(schema.field("parent").unwrap().ty, Ty::Ref("CategoryResource".into()));
    }

    #[test]
    fn mutual_recursion_terminates() {
        let ws = workspace(&[
            &resource("App", "AResource", "['b' => new BResource($this->whenLoaded('b'))]"),
            &resource("App", "BResource", "['a' => new AResource($this->whenLoaded('a'))]"),
        ]);
        let mut registry = SchemaRegistry::new();
        infer(&ws, &mut registry, "App\\AResource").unwrap();
        assert_eq!(registry.get("AResource").unwrap().field("b").unwrap().ty, Ty::Ref("BResource".into()));
        assert_eq!(registry.get("BResource").unwrap().field("a").unwrap().ty, Ty::Ref("AResource".into()));
    }

    #[test]
    fn reinvocation_is_idempotent() {
        let ws = workspace(&[&resource("App", "UserResource", "['id' => $this->id]")]);
        let mut registry = SchemaRegistry::new();
        let first = infer(&ws, &mut registry, "App\\UserResource").unwrap();
        let second = infer(&ws, &mut registry, "App\\UserResource").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn non_literal_return_produces_nothing() {
        let ws = workspace(&[
            &resource("App", "VarResource", "$data"),
            "<?php namespace App; class EmptyResource { function toArray($r) { $x = []; } }",
            "<?php namespace App; class NoMethod { function other() { return []; } }",
        ]);
        let mut registry = SchemaRegistry::new();
        assert!(infer(&ws, &mut registry, "App\\VarResource").is_none());
        assert!(infer(&ws, &mut registry, "App\\EmptyResource").is_none());
        assert!(infer(&ws, &mut registry, "App\\NoMethod").is_none());
        assert!(infer(&ws, &mut registry, "App\\Missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_nested_type_converges() {
        let ws = workspace(&[
            &resource("App", "UserResource", "['team' => new TeamResource($this->whenLoaded('team'))]"),
            &resource("App", "ProjectResource", "['team' => new TeamResource($this->whenLoaded('team'))]"),
            &resource("App", "TeamResource", "['name' => $this->name]"),
        ]);
        let mut registry = SchemaRegistry::new();
        infer(&ws, &mut registry, "App\\UserResource").unwrap();
        infer(&ws, &mut registry, "App\\ProjectResource").unwrap();
        let names: Vec<_> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["UserResource", "TeamResource", "ProjectResource"]);
    }

    #[test]
    fn unkeyed_and_computed_entries_are_not_documented() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['id' => $this->id, 'x', $key => $this->y, ...$rest, 'meta' => ['v' => 'one', 'w' => $this->when($x, 'w')]]",
        )]);
        let mut registry = SchemaRegistry::new();
        let result = {
            let config = InferenceConfig::default();
            let mut inferer = Inferer::new(&config, &ws, &mut registry);
            let result = inferer.sample("App\\UserResource").unwrap();
            inferer.infer_type("App\\UserResource").unwrap();
            result
        };
        // 'x' and $key entries stay in the structure without a key
        assert_eq!(result.fields.len(), 4);
        assert_eq!(result.fields.iter().filter(|f| f.key.is_none()).count(), 2);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["id", "meta"]);

        let schema = registry.get("UserResource").unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "meta"]);
        let meta = &schema.field("meta").unwrap().ty;
        assert_eq!(meta.required(), ["v"]);
    }

    #[test]
    fn self_and_static_name_the_enclosing_type() {
        let ws = workspace(&[&resource(
            "App\\Http",
            "CategoryResource",
            "['id' => $this->id, 'parent' => new self($this->whenLoaded('parent')), 'first' => new STATIC($this->first)]",
        )]);
        let mut registry = SchemaRegistry::new();
        infer(&ws, &mut registry, "App\\Http\\CategoryResource").unwrap();

        let schema = registry.get("CategoryResource").unwrap();
        let parent = schema.field("parent").unwrap();
        assert_eq!(parent.ty, Ty::Ref("CategoryResource".into()));
        assert!(!parent.required);
        assert_eq!(schema.field("first").unwrap().ty, Ty::Ref("CategoryResource".into()));
        assert_eq!(schema.required(), ["id", "first"]);
        assert_eq!(registry.len(), 1);

        let result = sample(&ws, "App\\Http\\CategoryResource");
        assert_eq!(
            result.field("parent").unwrap().ty,
            TypeDescriptor::SchemaReference("CategoryResource".into())
        );
    }

    #[test]
    fn interpolated_keys_and_values_are_not_literals() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            r#"["meta_{$this->kind}" => $this->v, "x_$id" => 'y', 'id' => $this->id, 'greeting' => "Hi $name", "\$plain" => 'z']"#,
        )]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.keys(), ["id", "$plain"]);
        assert_eq!(result.fields.iter().filter(|f| f.key.is_none()).count(), 2);
        assert!(result.field("greeting").is_none());

        let mut registry = SchemaRegistry::new();
        infer(&ws, &mut registry, "App\\UserResource").unwrap();
        let schema = registry.get("UserResource").unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "$plain"]);
        assert_eq!(schema.required(), ["id", "$plain"]);
    }

    #[test]
    fn duplicate_keys_keep_first_position_last_value() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['a' => 'x', 'b' => 'y', $this->mergeWhen($c, ['a' => 'z'])]",
        )]);
        let result = sample(&ws, "App\\UserResource");
        assert_eq!(result.keys(), ["a", "b"]);
        assert!(!result.field("a").unwrap().required);
        assert_eq!(result.required.iter().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn extract_response_points_at_component() {
        let ws = workspace(&[&resource("App", "UserResource", "['id' => $this->id]")]);
        let config = InferenceConfig::default();
        let mut registry = SchemaRegistry::new();
        let response = Inferer::new(&config, &ws, &mut registry).extract_response("App\\UserResource").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.schema, Ty::Ref("UserResource".into()));
    }

    #[test]
    fn free_function_entry_point() {
        let ws = workspace(&[&resource("App", "UserResource", "['id' => $this->id]")]);
        let t = ws.transformer("App\\UserResource").unwrap();
        let mut registry = SchemaRegistry::new();
        let reference = infer_response_schema(t.name, t.method_body("toArray").unwrap(), t.names, &ws, &mut registry);
        assert_eq!(reference.map(|r| r.pointer()).as_deref(), Some("#/components/schemas/UserResource"));
    }

    #[test]
    fn custom_idiom_names() {
        let ws = workspace(&[&resource(
            "App",
            "UserResource",
            "['id' => $this->id, 'x' => $this->onlyIf($c, 'x'), 'y' => $this->when($c, 'y')]",
        )]);
        let config = InferenceConfig {
            conditional_field: vec!["onlyIf".into()],
            ..InferenceConfig::default()
        };
        let mut registry = SchemaRegistry::new();
        let result = Inferer::new(&config, &ws, &mut registry).sample("App\\UserResource").unwrap();
        assert!(!result.field("x").unwrap().required);
        assert!(result.field("y").is_none());
    }
}
