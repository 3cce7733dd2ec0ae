//! End-to-end QLR generation against the shipped registry and a local server

use qlrgen_core::error::QlrError;
use qlrgen_core::{QlrAssembler, Registry};
use qlrgen_raster::{CogExtractor, ExtractorConfig};
use qlrgen_test_utils::fixtures::{
    assert_wgs84_close, sentinel1_cog, sentinel2_cog, shipped_config, UTM30N_EXTENT,
    UTM30N_EXTENT_WGS84,
};
use qlrgen_test_utils::xml::{assert_well_formed, element_floats, element_texts};
use qlrgen_test_utils::RangeServer;
use std::sync::Arc;

fn assembler() -> QlrAssembler {
    let registry = Registry::load(shipped_config()).unwrap();
    let extractor = CogExtractor::new(ExtractorConfig::default()).unwrap();
    QlrAssembler::new(Arc::new(registry), Arc::new(extractor))
}

#[tokio::test]
async fn test_sentinel2_layer_definition() {
    let server = RangeServer::spawn([("S2A_T30UXC_ARD.tif", sentinel2_cog())]).await;
    let url = server.url("S2A_T30UXC_ARD.tif");

    let doc = assembler().build(&url, "sentinel2_ard").await.unwrap();

    assert_well_formed(&doc.content);
    assert_eq!(doc.media_type, "application/xml");
    assert_eq!(doc.file_name, "S2A_T30UXC_ARD.qlr");

    assert_eq!(element_texts(&doc.content, "authid"), vec!["EPSG:32630"]);
    assert_eq!(element_texts(&doc.content, "datasource"), vec![format!("/vsicurl/{}", url)]);
    assert!(doc.content.contains(&url));

    // First occurrence is the native extent, second the WGS84 one.
    let (xmin, ymin, xmax, ymax) = (
        element_floats(&doc.content, "xmin"),
        element_floats(&doc.content, "ymin"),
        element_floats(&doc.content, "xmax"),
        element_floats(&doc.content, "ymax"),
    );
    assert_eq!((xmin.len(), ymin.len(), xmax.len(), ymax.len()), (2, 2, 2, 2));
    assert_eq!((xmin[0], ymin[0], xmax[0], ymax[0]), UTM30N_EXTENT);
    assert_wgs84_close((xmin[1], ymin[1], xmax[1], ymax[1]), UTM30N_EXTENT_WGS84);

    let wkt = element_texts(&doc.content, "wkt");
    assert!(wkt[0].contains("UTM zone 30N"), "{wkt:?}");
    assert_eq!(
        element_texts(&doc.content, "proj4"),
        vec!["+proj=utm +zone=30 +datum=WGS84 +units=m +no_defs"]
    );
    assert_eq!(element_texts(&doc.content, "geographicflag"), vec!["false"]);
}

#[tokio::test]
async fn test_signed_url_survives_into_document() {
    let server = RangeServer::spawn([("s2.tif", sentinel2_cog())]).await;
    let url = format!("{}?sig=a b", server.url("s2.tif"));

    let doc = assembler().build(&url, "sentinel2_ard").await.unwrap();

    assert_well_formed(&doc.content);
    assert!(doc.content.contains(&url));
    assert_eq!(element_texts(&doc.content, "datasource"), vec![format!("/vsicurl/{}", url)]);
    assert_eq!(doc.file_name, "s2.qlr");
}

#[tokio::test]
async fn test_sentinel1_layer_definition() {
    let server = RangeServer::spawn([("s1_vv.tif", sentinel1_cog())]).await;

    let doc = assembler().build(&server.url("s1_vv.tif"), "sentinel1_ard").await.unwrap();

    assert_well_formed(&doc.content);
    assert_eq!(element_texts(&doc.content, "authid"), vec!["EPSG:32630"]);
    assert_eq!(doc.file_name, "s1_vv.qlr");
}

#[tokio::test]
async fn test_output_is_deterministic() {
    let server = RangeServer::spawn([("s2.tif", sentinel2_cog())]).await;
    let url = server.url("s2.tif");
    let assembler = assembler();

    let first = assembler.build(&url, "sentinel2_ard").await.unwrap();
    let second = assembler.build(&url, "sentinel2_ard").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_builds_share_one_assembler() {
    let server = RangeServer::spawn([("a.tif", sentinel2_cog()), ("b.tif", sentinel1_cog())]).await;
    let assembler = assembler();

    let (a, b) = tokio::join!(
        assembler.build(&server.url("a.tif"), "sentinel2_ard"),
        assembler.build(&server.url("b.tif"), "sentinel1_ard"),
    );

    assert_eq!(a.unwrap().file_name, "a.qlr");
    assert_eq!(b.unwrap().file_name, "b.qlr");
}

#[tokio::test]
async fn test_unknown_collection_makes_no_request() {
    let server = RangeServer::spawn([("s2.tif", sentinel2_cog())]).await;

    let err = assembler().build(&server.url("s2.tif"), "landsat_ard").await.unwrap_err();

    assert!(matches!(err, QlrError::UnknownCollection { .. }), "{err:?}");
    assert_eq!(server.requests(), 0);
}

#[tokio::test]
async fn test_unreachable_source_produces_no_document() {
    let server = RangeServer::spawn([("s2.tif", sentinel2_cog())]).await;

    let err = assembler().build(&server.url("gone.tif"), "sentinel2_ard").await.unwrap_err();
    assert!(matches!(err, QlrError::UnreachableSource { .. }), "{err:?}");
}
