//! Static response-schema inference for resource transformer classes.
//!
//! Sources are parsed into a small syntax tree ([`ast`]), indexed by class
//! ([`workspace`]), and each transformer's returned array literal is turned
//! into a named schema ([`inference`], [`lower`], [`registry`]).
pub mod ast;
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod ir;
pub mod jq_exec;
pub mod lexer;
pub mod locate;
pub mod lower;
pub mod names;
pub mod parser;
pub mod path_de;
pub mod registry;
pub mod workspace;

pub use config::InferenceConfig;
pub use error::{LoadError, ParseError};
pub use inference::{
    infer_response_schema, FieldDescriptor, InferenceResult, Inferer, SampleStructure, TypeDescriptor,
};
pub use ir::{Field, Response, Ty};
pub use names::{NameContext, TypeLookup};
pub use registry::{Document, SchemaRef, SchemaRegistry};
pub use workspace::{Transformer, TransformerSource, Workspace};
