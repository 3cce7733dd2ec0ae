//! Integration tests for metadata extraction from GeoTIFF files on disk

use qlrgen_core::error::QlrError;
use qlrgen_core::models::{BandDataType, BoundingBox, CrsIdentifier};
use qlrgen_core::ports::MetadataExtractor;
use qlrgen_raster::{CogExtractor, ExtractorConfig};
use qlrgen_test_utils::fixtures::{
    assert_wgs84_close, sentinel1_cog, sentinel2_cog, UTM30N_EPSG, UTM30N_EXTENT,
    UTM30N_EXTENT_WGS84,
};
use qlrgen_test_utils::{ByteOrder, GeoKey, GeoTiffBuilder};
use std::path::Path;
use tempfile::TempDir;

fn extractor() -> CogExtractor {
    CogExtractor::new(ExtractorConfig::default()).unwrap()
}

fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

fn utm_builder() -> GeoTiffBuilder {
    let (min_x, min_y, max_x, max_y) = UTM30N_EXTENT;
    GeoTiffBuilder::new(10, 10)
        .with_extent(min_x, min_y, max_x, max_y)
        .projected_epsg(UTM30N_EPSG)
}

fn wgs84_tuple(bbox: &BoundingBox) -> (f64, f64, f64, f64) {
    (bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y)
}

#[tokio::test]
async fn test_little_endian_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "s2.tif", &sentinel2_cog());

    let metadata = extractor().extract(&path).await.unwrap();

    let (min_x, min_y, max_x, max_y) = UTM30N_EXTENT;
    assert_eq!(metadata.bounding_box, BoundingBox::new(min_x, min_y, max_x, max_y));
    assert_wgs84_close(wgs84_tuple(&metadata.bounding_box_wgs84), UTM30N_EXTENT_WGS84);
    assert_eq!(metadata.crs, CrsIdentifier::epsg(32630));
    assert_eq!((metadata.width, metadata.height), (10, 10));
    assert_eq!(metadata.band_count, 4);
    assert_eq!(metadata.band_data_type, BandDataType::UInt16);
    assert_eq!(metadata.nodata.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_big_endian_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "s1.tif", &sentinel1_cog());

    let metadata = extractor().extract(&path).await.unwrap();

    assert_eq!(metadata.crs, CrsIdentifier::epsg(32630));
    assert_eq!(metadata.band_count, 1);
    assert_eq!(metadata.band_data_type, BandDataType::Float32);
    assert_eq!(metadata.nodata.as_deref(), Some("-9999"));
    assert_wgs84_close(wgs84_tuple(&metadata.bounding_box_wgs84), UTM30N_EXTENT_WGS84);
}

#[tokio::test]
async fn test_big_tiff_in_both_byte_orders() {
    let dir = TempDir::new().unwrap();

    for (name, order) in [("le.tif", ByteOrder::Little), ("be.tif", ByteOrder::Big)] {
        let bytes = utm_builder().big_tiff().byte_order(order).data_type(16, 2).build();
        let path = write(&dir, name, &bytes);

        let metadata = extractor().extract(&path).await.unwrap();
        assert_eq!(metadata.crs, CrsIdentifier::epsg(32630), "{name}");
        assert_eq!(metadata.band_data_type, BandDataType::Int16, "{name}");
        assert_wgs84_close(wgs84_tuple(&metadata.bounding_box_wgs84), UTM30N_EXTENT_WGS84);
    }
}

#[tokio::test]
async fn test_ifd_beyond_header_prefix() {
    let dir = TempDir::new().unwrap();
    let bytes = utm_builder().ifd_padding(64 * 1024).build();
    let path = write(&dir, "far_ifd.tif", &bytes);

    let metadata = extractor().extract(&path).await.unwrap();
    assert_eq!(metadata.crs, CrsIdentifier::epsg(32630));
}

#[tokio::test]
async fn test_tag_values_beyond_header_prefix() {
    let dir = TempDir::new().unwrap();
    let bytes = utm_builder()
        .citation(1026, "WGS 84 / UTM zone 30N")
        .value_padding(40 * 1024)
        .build();
    let path = write(&dir, "far_values.tif", &bytes);

    let metadata = extractor().extract(&path).await.unwrap();
    assert_eq!(metadata.crs, CrsIdentifier::epsg(32630));
    assert_eq!(metadata.width, 10);
}

#[tokio::test]
async fn test_small_header_prefix_still_reads_everything() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "s2.tif", &sentinel2_cog());
    let config = ExtractorConfig {
        header_prefix: 16,
        ..ExtractorConfig::default()
    };

    let metadata = CogExtractor::new(config).unwrap().extract(&path).await.unwrap();
    assert_eq!(metadata.band_count, 4);
}

#[tokio::test]
async fn test_citation_only_crs() {
    let dir = TempDir::new().unwrap();
    let (min_x, min_y, max_x, max_y) = UTM30N_EXTENT;
    let bytes = GeoTiffBuilder::new(10, 10)
        .with_extent(min_x, min_y, max_x, max_y)
        .geo_key(1024, GeoKey::Short(1))
        .geo_key(3072, GeoKey::Short(32767))
        .citation(3073, "WGS_1984_UTM_Zone_30N")
        .build();
    let path = write(&dir, "esri.tif", &bytes);

    let metadata = extractor().extract(&path).await.unwrap();
    assert_eq!(metadata.crs, CrsIdentifier::epsg(32630));
}

#[tokio::test]
async fn test_file_url() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "s2.tif", &sentinel2_cog());

    let url = format!("file://{}", path);
    let metadata = extractor().extract(&url).await.unwrap();
    assert_eq!(metadata.source_url, url);
    assert_eq!(metadata.band_count, 4);
}

#[tokio::test]
async fn test_bare_path_kept_as_given() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "s2.tif", &sentinel2_cog());

    let metadata = extractor().extract(&format!("  {}  ", path)).await.unwrap();
    assert_eq!(Path::new(&metadata.source_url), Path::new(&path));
}

#[tokio::test]
async fn test_user_defined_lambert_projection() {
    let dir = TempDir::new().unwrap();
    let bytes = GeoTiffBuilder::new(10, 10)
        .with_extent(4_321_000.0, 3_210_000.0, 4_322_000.0, 3_211_000.0)
        .geo_key(1024, GeoKey::Short(1))
        .geo_key(2048, GeoKey::Short(4258))
        .geo_key(3072, GeoKey::Short(32767))
        .geo_key(3075, GeoKey::Short(10))
        .geo_key(3080, GeoKey::Double(10.0))
        .geo_key(3081, GeoKey::Double(52.0))
        .geo_key(3082, GeoKey::Double(4_321_000.0))
        .geo_key(3083, GeoKey::Double(3_210_000.0))
        .build();
    let path = write(&dir, "laea.tif", &bytes);

    let metadata = extractor().extract(&path).await.unwrap();

    assert!(!metadata.crs.is_canonical());
    assert!(metadata.crs.definition().starts_with("+proj=laea +lat_0=52 +lon_0=10 "));
    // Same parameters as ETRS89-LAEA; the lower left corner is the projection origin
    let wgs84 = metadata.bounding_box_wgs84;
    assert!((wgs84.min_x - 10.0).abs() < 1e-6, "{wgs84}");
    assert!((wgs84.min_y - 52.0).abs() < 1e-6, "{wgs84}");
    assert!(wgs84.max_x > 10.0 && wgs84.max_y > 52.0, "{wgs84}");
    assert!(metadata.crs_details.proj4.is_some_and(|p| p.contains("+ellps=GRS80")));
}

#[tokio::test]
async fn test_not_a_tiff() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "notes.txt", b"these are not the pixels you are looking for");

    let err = extractor().extract(&path).await.unwrap_err();
    assert!(matches!(err, QlrError::InvalidRaster { .. }), "{err:?}");
}

#[tokio::test]
async fn test_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "empty.tif", b"");

    let err = extractor().extract(&path).await.unwrap_err();
    assert!(matches!(err, QlrError::InvalidRaster { .. }), "{err:?}");
}

#[tokio::test]
async fn test_truncated_file() {
    let dir = TempDir::new().unwrap();
    let bytes = sentinel2_cog();
    let path = write(&dir, "cut.tif", &bytes[..12]);

    let err = extractor().extract(&path).await.unwrap_err();
    assert!(matches!(err, QlrError::InvalidRaster { .. }), "{err:?}");
}

#[tokio::test]
async fn test_missing_file_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.tif");

    let err = extractor().extract(&path.to_string_lossy()).await.unwrap_err();
    match err {
        QlrError::UnreachableSource { timed_out, .. } => assert!(!timed_out),
        other => panic!("expected UnreachableSource, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_urls() {
    for url in ["", "   ", "ftp://example.com/a.tif", "s3://bucket/key.tif", "http://"] {
        let err = extractor().extract(url).await.unwrap_err();
        assert!(matches!(err, QlrError::InvalidUrl { .. }), "{url:?}: {err:?}");
    }
}
