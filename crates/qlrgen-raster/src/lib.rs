//! qlrgen Raster - COG metadata extraction
//!
//! Reads only the header of a Cloud-Optimized GeoTIFF, locally or through
//! HTTP range requests, and turns it into `RasterMetadata`:
//! - TIFF and BigTIFF in either byte order, first IFD only
//! - GeoKey decoding and CRS normalization to `EPSG:<code>`
//! - User-defined projections rebuilt as PROJ definitions
//! - Native extent from the model transform, WGS84 extent through PROJ

pub mod crs;
pub mod extractor;
pub mod geokeys;
pub mod header;
pub mod source;
pub mod transform;

pub use extractor::{CogExtractor, ExtractorConfig};
pub use source::{open_source, HttpRangeReader, LocalRangeReader, MemoryRangeReader, RangeReader};
