//! Structured output types for JSON mode

use qlrgen_core::models::RasterMetadata;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub url: String,
    pub collection: String,
    pub file_name: String,
    /// Where the document was written; absent when it is inlined as `content`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    #[serde(flatten)]
    pub metadata: RasterMetadata,
    /// CRS as QGIS expects it, e.g. `EPSG:32630`
    pub crs_authid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    pub id: String,
    pub template_path: PathBuf,
    pub style_params: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CheckConfigOutput {
    pub config: PathBuf,
    pub collections: Vec<CollectionInfo>,
}
