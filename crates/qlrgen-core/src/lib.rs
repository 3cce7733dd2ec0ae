//! qlrgen Core - Registry, templates and QLR assembly
//!
//! This crate holds the domain model, the collection registry, the template
//! renderer and the assembler that ties them to a raster metadata extractor.

pub mod assembler;
pub mod error;
pub mod models;
pub mod ports;
pub mod registry;
pub mod substitution;
pub mod template;

pub use assembler::QlrAssembler;
pub use error::{QlrError, Result};
pub use models::{
    BandDataType, BoundingBox, CollectionDescriptor, CrsIdentifier, QlrDocument, RasterMetadata,
};
pub use ports::MetadataExtractor;
pub use registry::Registry;
pub use substitution::Substitutions;
pub use template::{Template, TemplateRenderer};
