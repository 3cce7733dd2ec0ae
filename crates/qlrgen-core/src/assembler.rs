//! QLR assembly: registry lookup, metadata extraction, template rendering.

use std::sync::Arc;

use crate::error::Result;
use crate::models::QlrDocument;
use crate::ports::MetadataExtractor;
use crate::registry::Registry;
use crate::substitution::{layer_id, layer_name, Substitutions};

/// Builds layer definitions from a registry and a metadata extractor.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct QlrAssembler {
    registry: Arc<Registry>,
    extractor: Arc<dyn MetadataExtractor>,
}

impl QlrAssembler {
    pub fn new(registry: Arc<Registry>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self {
            registry,
            extractor,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Build the QLR document for `url` styled as `collection_id`.
    ///
    /// Errors from the registry, extractor and renderer are returned as-is and
    /// nothing is retried.
    pub async fn build(&self, url: &str, collection_id: &str) -> Result<QlrDocument> {
        let descriptor = self.registry.resolve(collection_id)?;

        tracing::info!(url = %url, collection = %collection_id, "Building QLR");

        let metadata = self.extractor.extract(url).await?;

        tracing::debug!(
            crs = %metadata.crs,
            bbox = %metadata.bounding_box,
            bbox_wgs84 = %metadata.bounding_box_wgs84,
            bands = metadata.band_count,
            data_type = %metadata.band_data_type,
            "Extracted raster metadata"
        );

        let substitutions = Substitutions::for_layer(&metadata, &descriptor);
        let content = self.registry.renderer().render(&descriptor.template_path, &substitutions)?;

        let file_name = format!("{}.qlr", layer_id(&layer_name(&metadata.source_url)));
        tracing::info!(file_name = %file_name, bytes = content.len(), "QLR generated");

        Ok(QlrDocument::xml(content, file_name))
    }
}
