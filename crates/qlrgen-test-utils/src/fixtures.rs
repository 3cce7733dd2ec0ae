//! Reference rasters with known georeferencing.
//!
//! The WGS84 values were computed independently with PROJ and are the
//! expected output for the UTM extent below, within [`WGS84_TOLERANCE`].

use std::path::PathBuf;

use crate::geotiff::GeoTiffBuilder;

/// EPSG code of the reference rasters (WGS 84 / UTM zone 30N)
pub const UTM30N_EPSG: u16 = 32630;

/// Native extent of the reference rasters
pub const UTM30N_EXTENT: (f64, f64, f64, f64) = (500000.0, 5900000.0, 500100.0, 5900100.0);

/// [`UTM30N_EXTENT`] in EPSG:4326, longitude first
pub const UTM30N_EXTENT_WGS84: (f64, f64, f64, f64) =
    (-3.0, 53.249266904, -2.998501271, 53.250165810);

/// Absolute tolerance for comparing reprojected coordinates, in degrees
pub const WGS84_TOLERANCE: f64 = 1e-5;

fn utm_raster() -> GeoTiffBuilder {
    let (min_x, min_y, max_x, max_y) = UTM30N_EXTENT;
    GeoTiffBuilder::new(10, 10)
        .with_extent(min_x, min_y, max_x, max_y)
        .projected_epsg(UTM30N_EPSG)
}

/// Four band uint16 optical scene with nodata 0
pub fn sentinel2_cog() -> Vec<u8> {
    utm_raster().bands(4).data_type(16, 1).nodata("0").build()
}

/// Single band float32 backscatter scene
pub fn sentinel1_cog() -> Vec<u8> {
    utm_raster()
        .data_type(32, 3)
        .nodata("-9999")
        .byte_order(crate::geotiff::ByteOrder::Big)
        .build()
}

/// Assert that each coordinate is within [`WGS84_TOLERANCE`] of the reference
pub fn assert_wgs84_close(actual: (f64, f64, f64, f64), expected: (f64, f64, f64, f64)) {
    let pairs = [
        (actual.0, expected.0),
        (actual.1, expected.1),
        (actual.2, expected.2),
        (actual.3, expected.3),
    ];
    for (a, e) in pairs {
        assert!(
            (a - e).abs() < WGS84_TOLERANCE,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }
}

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Registry document shipped with the workspace
pub fn shipped_config() -> PathBuf {
    workspace_root().join("templates").join("template_config.toml")
}
