//! Port trait definitions
//!
//! These traits define the interfaces that adapters must implement.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::RasterMetadata;

/// Port for reading raster metadata from a URL
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Open `url` and describe the raster without reading its pixels.
    ///
    /// Transport failures are `UnreachableSource`; payloads that are not a
    /// georeferenced GeoTIFF are `InvalidRaster`.
    async fn extract(&self, url: &str) -> Result<RasterMetadata>;
}
