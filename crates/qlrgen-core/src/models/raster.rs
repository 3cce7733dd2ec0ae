//! Raster facts extracted from a single COG.
//!
//! These values are built fresh for every request and never cached.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned extent as (min_x, min_y, max_x, max_y)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box enclosing all finite points, or `None` if there are none.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .fold(None, |acc: Option<BoundingBox>, (x, y)| match acc {
                None => Some(BoundingBox::new(x, y, x, y)),
                Some(b) => Some(BoundingBox::new(
                    b.min_x.min(x),
                    b.min_y.min(y),
                    b.max_x.max(x),
                    b.max_y.max(y),
                )),
            })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Corners in ring order starting at (min_x, min_y)
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    /// Check that all values are finite and min < max on both axes
    pub fn validate(&self) -> std::result::Result<(), String> {
        let values = [self.min_x, self.min_y, self.max_x, self.max_y];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(format!("bounding box has non-finite coordinates: {}", self));
        }
        if self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(format!("bounding box is empty or inverted: {}", self));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Coordinate reference system of a raster.
///
/// Rasters in the wild do not always carry a clean authority code, so the
/// non-canonical case is a regular value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrsIdentifier {
    Canonical { authority: String, code: u32 },
    NonCanonical { definition: String },
}

impl CrsIdentifier {
    pub fn epsg(code: u32) -> Self {
        Self::Canonical {
            authority: "EPSG".to_string(),
            code,
        }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::epsg(4326)
    }

    pub fn non_canonical(definition: impl Into<String>) -> Self {
        Self::NonCanonical {
            definition: definition.into(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, CrsIdentifier::Canonical { .. })
    }

    /// `AUTHORITY:CODE`, only for canonical identifiers
    pub fn authid(&self) -> Option<String> {
        match self {
            CrsIdentifier::Canonical { authority, code } => Some(format!("{}:{}", authority, code)),
            CrsIdentifier::NonCanonical { .. } => None,
        }
    }

    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CrsIdentifier::Canonical { authority, code } if authority == "EPSG" => Some(*code),
            _ => None,
        }
    }

    /// A definition PROJ can be asked to interpret
    pub fn definition(&self) -> String {
        match self {
            CrsIdentifier::Canonical { .. } => self.authid().unwrap_or_default(),
            CrsIdentifier::NonCanonical { definition } => definition.clone(),
        }
    }
}

impl fmt::Display for CrsIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsIdentifier::Canonical { authority, code } => write!(f, "{}:{}", authority, code),
            CrsIdentifier::NonCanonical { definition } => write!(f, "RAW:{}", definition),
        }
    }
}

/// Descriptive forms of the raster CRS, filled in where they could be derived
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsDetails {
    /// Human-readable name, usually the GeoTIFF citation
    pub name: Option<String>,
    /// WKT2 as exported by PROJ
    pub wkt: Option<String>,
    pub proj4: Option<String>,
    pub is_geographic: bool,
}

/// Pixel type shared by the raster's bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandDataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl BandDataType {
    /// Map TIFF BitsPerSample / SampleFormat to a pixel type.
    ///
    /// SampleFormat 1 is unsigned, 2 signed, 3 IEEE float.
    pub fn from_tiff(bits_per_sample: u16, sample_format: u16) -> Option<Self> {
        match (sample_format, bits_per_sample) {
            (1, 8) => Some(BandDataType::UInt8),
            (2, 8) => Some(BandDataType::Int8),
            (1, 16) => Some(BandDataType::UInt16),
            (2, 16) => Some(BandDataType::Int16),
            (1, 32) => Some(BandDataType::UInt32),
            (2, 32) => Some(BandDataType::Int32),
            (3, 32) => Some(BandDataType::Float32),
            (3, 64) => Some(BandDataType::Float64),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BandDataType::UInt8 => "uint8",
            BandDataType::Int8 => "int8",
            BandDataType::UInt16 => "uint16",
            BandDataType::Int16 => "int16",
            BandDataType::UInt32 => "uint32",
            BandDataType::Int32 => "int32",
            BandDataType::Float32 => "float32",
            BandDataType::Float64 => "float64",
        }
    }

    /// QGIS raster data type code (`Qgis::DataType`)
    pub fn qgis_code(&self) -> u8 {
        match self {
            BandDataType::UInt8 => 1,
            BandDataType::UInt16 => 2,
            BandDataType::Int16 => 3,
            BandDataType::UInt32 => 4,
            BandDataType::Int32 => 5,
            BandDataType::Float32 => 6,
            BandDataType::Float64 => 7,
            BandDataType::Int8 => 14,
        }
    }

    pub fn bits(&self) -> u16 {
        match self {
            BandDataType::UInt8 | BandDataType::Int8 => 8,
            BandDataType::UInt16 | BandDataType::Int16 => 16,
            BandDataType::UInt32 | BandDataType::Int32 | BandDataType::Float32 => 32,
            BandDataType::Float64 => 64,
        }
    }
}

impl fmt::Display for BandDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the assembler needs to know about one COG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub source_url: String,
    /// Extent in the native CRS
    pub bounding_box: BoundingBox,
    /// Extent reprojected to EPSG:4326, longitude first
    pub bounding_box_wgs84: BoundingBox,
    pub crs: CrsIdentifier,
    #[serde(default)]
    pub crs_details: CrsDetails,
    pub width: u64,
    pub height: u64,
    pub band_count: u32,
    pub band_data_type: BandDataType,
    pub nodata: Option<String>,
}

impl RasterMetadata {
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.bounding_box.validate()?;
        self.bounding_box_wgs84
            .validate()
            .map_err(|reason| format!("WGS84 {}", reason))?;
        if self.band_count == 0 {
            return Err("raster has no bands".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err(format!("raster has zero size {}x{}", self.width, self.height));
        }
        Ok(())
    }
}
