pub mod collection;
pub mod document;
pub mod raster;

pub use collection::CollectionDescriptor;
pub use document::{QlrDocument, QLR_MEDIA_TYPE};
pub use raster::{BandDataType, BoundingBox, CrsDetails, CrsIdentifier, RasterMetadata};
