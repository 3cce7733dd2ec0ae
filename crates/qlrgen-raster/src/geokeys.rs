//! GeoKey directory decoding

use std::collections::BTreeMap;

use crate::header::{GeoTiffError, ImageHeader, TAG_GEO_ASCII_PARAMS, TAG_GEO_DOUBLE_PARAMS, TAG_GEO_KEY_DIRECTORY};

pub const GT_MODEL_TYPE: u16 = 1024;
pub const GT_RASTER_TYPE: u16 = 1025;
pub const GT_CITATION: u16 = 1026;
pub const GEOGRAPHIC_TYPE: u16 = 2048;
pub const GEOG_CITATION: u16 = 2049;
pub const PROJECTED_CS_TYPE: u16 = 3072;
pub const PCS_CITATION: u16 = 3073;

pub const GEOG_GEODETIC_DATUM: u16 = 2050;
pub const GEOG_ANGULAR_UNITS: u16 = 2054;
pub const GEOG_ELLIPSOID: u16 = 2056;
pub const GEOG_SEMI_MAJOR_AXIS: u16 = 2057;
pub const GEOG_SEMI_MINOR_AXIS: u16 = 2058;
pub const GEOG_INV_FLATTENING: u16 = 2059;

pub const PROJECTION: u16 = 3074;
pub const PROJ_COORD_TRANS: u16 = 3075;
pub const PROJ_LINEAR_UNITS: u16 = 3076;
pub const PROJ_LINEAR_UNIT_SIZE: u16 = 3077;
pub const PROJ_STD_PARALLEL_1: u16 = 3078;
pub const PROJ_STD_PARALLEL_2: u16 = 3079;
pub const PROJ_NAT_ORIGIN_LONG: u16 = 3080;
pub const PROJ_NAT_ORIGIN_LAT: u16 = 3081;
pub const PROJ_FALSE_EASTING: u16 = 3082;
pub const PROJ_FALSE_NORTHING: u16 = 3083;
pub const PROJ_FALSE_ORIGIN_LONG: u16 = 3084;
pub const PROJ_FALSE_ORIGIN_LAT: u16 = 3085;
pub const PROJ_FALSE_ORIGIN_EASTING: u16 = 3086;
pub const PROJ_FALSE_ORIGIN_NORTHING: u16 = 3087;
pub const PROJ_CENTER_LONG: u16 = 3088;
pub const PROJ_CENTER_LAT: u16 = 3089;
pub const PROJ_SCALE_AT_NAT_ORIGIN: u16 = 3092;
pub const PROJ_SCALE_AT_CENTER: u16 = 3093;
pub const PROJ_STRAIGHT_VERT_POLE_LONG: u16 = 3095;

pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub const RASTER_PIXEL_IS_POINT: u16 = 2;
pub const USER_DEFINED: u16 = 32767;

#[derive(Debug, Clone, PartialEq)]
pub enum GeoKeyValue {
    Short(u16),
    Shorts(Vec<u16>),
    Doubles(Vec<f64>),
    Ascii(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeys {
    keys: BTreeMap<u16, GeoKeyValue>,
}

impl GeoKeys {
    /// Decode the GeoKey directory of an image; `None` if it has none
    pub fn from_header(header: &ImageHeader) -> Option<Result<Self, GeoTiffError>> {
        let directory = header.geo_key_directory.as_deref()?;
        Some(Self::parse(directory, &header.geo_double_params, &header.geo_ascii_params))
    }

    /// Decode a directory given its double and ASCII parameter stores.
    ///
    /// Keys pointing outside their store are skipped, not fatal.
    pub fn parse(directory: &[u64], doubles: &[f64], ascii: &str) -> Result<Self, GeoTiffError> {
        if directory.len() < 4 {
            return Err(GeoTiffError::Malformed("GeoKeyDirectory header is incomplete".to_string()));
        }
        let key_count = directory[3] as usize;
        let needed = 4 + key_count.saturating_mul(4);
        if directory.len() < needed {
            return Err(GeoTiffError::Malformed(format!(
                "GeoKeyDirectory declares {} keys but holds {}",
                key_count,
                (directory.len() - 4) / 4
            )));
        }

        let mut keys = BTreeMap::new();
        for entry in directory[4..needed].chunks_exact(4) {
            let id = entry[0] as u16;
            let location = entry[1] as u16;
            let count = entry[2] as usize;
            let index = entry[3] as usize;

            let value = match location {
                0 => Some(GeoKeyValue::Short(entry[3] as u16)),
                TAG_GEO_KEY_DIRECTORY => directory
                    .get(index..index.saturating_add(count))
                    .map(|values| GeoKeyValue::Shorts(values.iter().map(|v| *v as u16).collect())),
                TAG_GEO_DOUBLE_PARAMS => doubles
                    .get(index..index.saturating_add(count))
                    .map(|values| GeoKeyValue::Doubles(values.to_vec())),
                TAG_GEO_ASCII_PARAMS => ascii
                    .as_bytes()
                    .get(index..index.saturating_add(count))
                    .map(|text| GeoKeyValue::Ascii(clean_ascii(text))),
                _ => None,
            };

            match value {
                Some(value) => {
                    keys.insert(id, value);
                }
                None => tracing::debug!(key = id, location, "Skipping unreadable GeoKey"),
            }
        }

        Ok(Self { keys })
    }

    pub fn get(&self, id: u16) -> Option<&GeoKeyValue> {
        self.keys.get(&id)
    }

    pub fn short(&self, id: u16) -> Option<u16> {
        match self.keys.get(&id) {
            Some(GeoKeyValue::Short(value)) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value, whether stored inline or in the double params
    pub fn double(&self, id: u16) -> Option<f64> {
        match self.keys.get(&id) {
            Some(GeoKeyValue::Short(value)) => Some(f64::from(*value)),
            Some(GeoKeyValue::Doubles(values)) => values.first().copied(),
            _ => None,
        }
    }

    /// Non-empty ASCII value
    pub fn ascii(&self, id: u16) -> Option<&str> {
        match self.keys.get(&id) {
            Some(GeoKeyValue::Ascii(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn model_type(&self) -> Option<u16> {
        self.short(GT_MODEL_TYPE)
    }

    pub fn pixel_is_point(&self) -> bool {
        self.short(GT_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// ASCII params use `|` as the value terminator
fn clean_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(['|', '\0']).trim().to_string()
}
