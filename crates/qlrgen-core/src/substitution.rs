//! Substitution key scheme shared by templates and the assembler.
//!
//! Metadata keys are fixed. Style parameters from the registry are added
//! under `style_<name>` so they can never shadow a metadata key.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::models::{CollectionDescriptor, RasterMetadata};

pub const SOURCE_URL: &str = "source_url";
pub const DATASOURCE: &str = "datasource";
pub const LAYER_ID: &str = "layer_id";
pub const LAYER_NAME: &str = "layer_name";
pub const COLLECTION: &str = "collection";
pub const XMIN: &str = "xmin";
pub const YMIN: &str = "ymin";
pub const XMAX: &str = "xmax";
pub const YMAX: &str = "ymax";
pub const WGS84_XMIN: &str = "wgs84_xmin";
pub const WGS84_YMIN: &str = "wgs84_ymin";
pub const WGS84_XMAX: &str = "wgs84_xmax";
pub const WGS84_YMAX: &str = "wgs84_ymax";
pub const CRS_AUTHID: &str = "crs_authid";
pub const CRS_EPSG: &str = "crs_epsg";
pub const CRS_DEFINITION: &str = "crs_definition";
pub const CRS_IS_CANONICAL: &str = "crs_is_canonical";
pub const CRS_DESCRIPTION: &str = "crs_description";
pub const CRS_WKT: &str = "crs_wkt";
pub const CRS_PROJ4: &str = "crs_proj4";
pub const CRS_IS_GEOGRAPHIC: &str = "crs_is_geographic";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const BAND_COUNT: &str = "band_count";
pub const DATA_TYPE: &str = "data_type";
pub const QGIS_DATA_TYPE: &str = "qgis_data_type";
pub const NODATA: &str = "nodata";

/// Every key produced from raster metadata, independent of the collection
pub const METADATA_KEYS: &[&str] = &[
    SOURCE_URL,
    DATASOURCE,
    LAYER_ID,
    LAYER_NAME,
    COLLECTION,
    XMIN,
    YMIN,
    XMAX,
    YMAX,
    WGS84_XMIN,
    WGS84_YMIN,
    WGS84_XMAX,
    WGS84_YMAX,
    CRS_AUTHID,
    CRS_EPSG,
    CRS_DEFINITION,
    CRS_IS_CANONICAL,
    CRS_DESCRIPTION,
    CRS_WKT,
    CRS_PROJ4,
    CRS_IS_GEOGRAPHIC,
    WIDTH,
    HEIGHT,
    BAND_COUNT,
    DATA_TYPE,
    QGIS_DATA_TYPE,
    NODATA,
];

pub const STYLE_PREFIX: &str = "style_";

/// Substitution key for a registry style parameter
pub fn style_key(name: &str) -> String {
    format!("{}{}", STYLE_PREFIX, name)
}

/// Named values for a template render, kept in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full substitution set for one raster rendered as one collection
    pub fn for_layer(metadata: &RasterMetadata, descriptor: &CollectionDescriptor) -> Self {
        let mut subs = Self::new();
        let layer_name = layer_name(&metadata.source_url);

        subs.insert(SOURCE_URL, &metadata.source_url);
        subs.insert(DATASOURCE, datasource(&metadata.source_url));
        subs.insert(LAYER_ID, layer_id(&layer_name));
        subs.insert(LAYER_NAME, &layer_name);
        subs.insert(COLLECTION, &descriptor.id);

        let native = &metadata.bounding_box;
        subs.insert(XMIN, native.min_x);
        subs.insert(YMIN, native.min_y);
        subs.insert(XMAX, native.max_x);
        subs.insert(YMAX, native.max_y);

        let wgs84 = &metadata.bounding_box_wgs84;
        subs.insert(WGS84_XMIN, wgs84.min_x);
        subs.insert(WGS84_YMIN, wgs84.min_y);
        subs.insert(WGS84_XMAX, wgs84.max_x);
        subs.insert(WGS84_YMAX, wgs84.max_y);

        subs.insert(CRS_AUTHID, metadata.crs.authid().unwrap_or_default());
        subs.insert(
            CRS_EPSG,
            metadata.crs.epsg_code().map(|code| code.to_string()).unwrap_or_default(),
        );
        subs.insert(CRS_DEFINITION, metadata.crs.definition());
        subs.insert(CRS_IS_CANONICAL, metadata.crs.is_canonical());

        let details = &metadata.crs_details;
        match &details.name {
            Some(name) => subs.insert(CRS_DESCRIPTION, name),
            None => subs.insert(CRS_DESCRIPTION, &metadata.crs),
        }
        subs.insert(CRS_WKT, details.wkt.as_deref().unwrap_or_default());
        subs.insert(CRS_PROJ4, details.proj4.as_deref().unwrap_or_default());
        subs.insert(CRS_IS_GEOGRAPHIC, details.is_geographic);

        subs.insert(WIDTH, metadata.width);
        subs.insert(HEIGHT, metadata.height);
        subs.insert(BAND_COUNT, metadata.band_count);
        subs.insert(DATA_TYPE, metadata.band_data_type);
        subs.insert(QGIS_DATA_TYPE, metadata.band_data_type.qgis_code());
        subs.insert(NODATA, metadata.nodata.as_deref().unwrap_or_default());

        for (name, value) in &descriptor.style_params {
            subs.insert(style_key(name), value);
        }

        subs
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Last path segment of a URL or path, without query or fragment
pub fn layer_name(source_url: &str) -> String {
    let without_suffix = source_url.split(['?', '#']).next().unwrap_or_default();
    let name = without_suffix.trim_end_matches('/').rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() {
        "layer".to_string()
    } else {
        name.to_string()
    }
}

/// Layer identifier derived from the layer name; stable across runs
pub fn layer_id(layer_name: &str) -> String {
    let stem = layer_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(layer_name);
    stem.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// GDAL data source string: remote rasters go through `/vsicurl/`
pub fn datasource(source_url: &str) -> String {
    let lower = source_url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        format!("/vsicurl/{}", source_url)
    } else if let Some(path) = source_url.strip_prefix("file://") {
        path.to_string()
    } else {
        source_url.to_string()
    }
}
