use crate::inference::{FieldDescriptor, InferenceResult, TypeDescriptor};
use crate::ir::{Field, Ty};
use crate::registry::{SchemaRef, SchemaRegistry};

/// Store the schema for `result` under `name` and return its reference.
///
/// `name` is normally already reserved; finalizing keeps that slot.
pub fn build_schema(name: &str, result: &InferenceResult, registry: &mut SchemaRegistry) -> SchemaRef {
    let mut schema = lower_fields(&result.fields);
    if let Ty::Object { fields } = &mut schema {
        // top level: the required set is authoritative
        for field in fields.iter_mut() {
            field.required = result.required.contains(&field.name);
        }
    }
    registry.finalize(name, schema)
}

/// Object schema from a field list. Unkeyed entries are dropped.
pub fn lower_fields(fields: &[FieldDescriptor]) -> Ty {
    let fields = fields
        .iter()
        .filter_map(|f| {
            let name = f.key.clone()?;
            Some(Field {
                name,
                ty: lower_descriptor(&f.ty),
                required: f.required,
            })
        })
        .collect();
    Ty::Object { fields }
}

pub fn lower_descriptor(ty: &TypeDescriptor) -> Ty {
    match ty {
        // literal and unknown scalars both document as strings
        TypeDescriptor::StringLiteral | TypeDescriptor::ScalarUnknown => Ty::String,
        TypeDescriptor::SchemaReference(name) => Ty::Ref(name.clone()),
        TypeDescriptor::InlineObject(fields) => lower_fields(fields),
    }
}
