//! Named schemas shared across every inference run of one document.
//!
//! Entries are reserved before they are built. A reserved name already
//! answers `has` and hands out references, which is what lets a transformer
//! refer to itself (directly or through others) without being expanded
//! again.
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::ir::{Response, Ty, SCHEMA_POINTER_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    name: String,
}

impl SchemaRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pointer(&self) -> String {
        format!("{SCHEMA_POINTER_PREFIX}{}", self.name)
    }

    pub fn to_ty(&self) -> Ty {
        Ty::Ref(self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Name claimed, schema still being inferred.
    Reserved,
    Ready(Ty),
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: IndexMap<String, Entry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Claim `name`. Returns false if it was already present (reserved or
    /// finalized); the check and the insert are one step.
    pub fn reserve(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), Entry::Reserved);
        true
    }

    /// Store the finished schema, keeping the slot taken at reservation.
    pub fn finalize(&mut self, name: &str, schema: Ty) -> SchemaRef {
        match self.entries.get_mut(name) {
            Some(entry) => *entry = Entry::Ready(schema),
            None => {
                self.entries.insert(name.to_string(), Entry::Ready(schema));
            }
        }
        self.reference(name)
    }

    pub fn reference(&self, name: &str) -> SchemaRef {
        SchemaRef { name: name.to_string() }
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        match self.entries.get(name)? {
            Entry::Ready(ty) => Some(ty),
            Entry::Reserved => None,
        }
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in reservation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `components.schemas` object. Unfinished entries emit as empty objects.
    pub fn to_json(&self) -> Value {
        let mut schemas = Map::new();
        for (name, entry) in self.iter() {
            let schema = match entry {
                Entry::Ready(ty) => ty.to_json(),
                Entry::Reserved => json!({ "type": "object" }),
            };
            schemas.insert(name.to_string(), schema);
        }
        Value::Object(schemas)
    }
}

/// Everything one generation run produces: shared components plus the
/// response documented for each transformer type.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub components: SchemaRegistry,
    pub responses: IndexMap<String, Response>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Value {
        let mut responses = Map::new();
        for (type_name, response) in &self.responses {
            responses.insert(type_name.clone(), response.to_json());
        }
        json!({
            "components": { "schemas": self.components.to_json() },
            "responses": responses,
        })
    }
}
