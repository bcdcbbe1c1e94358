// Schema document model. Built by `lower`, stored in the registry, emitted as JSON.

use serde_json::{json, Map, Value};

/// Prefix of every component reference.
pub const SCHEMA_POINTER_PREFIX: &str = "#/components/schemas/";

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    String,
    Object {
        fields: Vec<Field>, // source order, for documentation
    },
    /// Named entry in the schema registry.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub required: bool, // always present in the response body
}

impl Ty {
    pub fn object(fields: Vec<Field>) -> Self {
        Ty::Object { fields }
    }

    pub fn fields(&self) -> &[Field] {
        match self {
            Ty::Object { fields } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn required(&self) -> Vec<&str> {
        self.fields().iter().filter(|f| f.required).map(|f| f.name.as_str()).collect()
    }

    pub fn to_json(&self) -> Value {
        match self {
            Ty::String => json!({ "type": "string" }),
            Ty::Ref(name) => json!({ "$ref": format!("{SCHEMA_POINTER_PREFIX}{name}") }),
            Ty::Object { fields } => {
                let mut props = Map::new();
                for f in fields {
                    props.insert(f.name.clone(), f.ty.to_json());
                }
                let mut o = json!({ "type": "object", "properties": props });
                let required = self.required();
                if !required.is_empty() {
                    o["required"] = Value::Array(required.into_iter().map(Value::from).collect());
                }
                o
            }
        }
    }
}

/// A documented response: status, media type and body schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub schema: Ty,
}

impl Response {
    pub fn json(status: u16, schema: Ty) -> Self {
        Self {
            status,
            content_type: "application/json".into(),
            schema,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            self.status.to_string(): {
                "content": {
                    self.content_type.clone(): { "schema": self.schema.to_json() }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_emits_properties_in_order_and_required() {
        let ty = Ty::object(vec![
            Field { name: "id".into(), ty: Ty::String, required: true },
            Field { name: "posts".into(), ty: Ty::Ref("PostResource".into()), required: false },
        ]);
        let schema = ty.to_json();
        let keys: Vec<_> = schema["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["id", "posts"]);
        assert_eq!(schema["properties"]["posts"]["$ref"], "#/components/schemas/PostResource");
        assert_eq!(schema["required"], json!(["id"]));
    }

    #[test]
    fn empty_required_list_is_omitted() {
        let ty = Ty::object(vec![Field { name: "a".into(), ty: Ty::String, required: false }]);
        assert!(ty.to_json().get("required").is_none());
    }

    #[test]
    fn response_wraps_schema_in_content() {
        let response = Response::json(200, Ty::Ref("UserResource".into()));
        let value = response.to_json();
        assert_eq!(
            value["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/UserResource"
        );
    }
}
