//! Rendered documents must stay well-formed whatever values are substituted

use proptest::prelude::*;
use qlrgen_core::models::{BandDataType, BoundingBox, CrsDetails, CrsIdentifier, RasterMetadata};
use qlrgen_core::registry::Registry;
use qlrgen_core::substitution::Substitutions;
use qlrgen_core::template::Template;
use qlrgen_test_utils::xml::{assert_well_formed, element_texts};
use std::path::PathBuf;

fn shipped_registry() -> Registry {
    let config =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../templates/template_config.toml");
    Registry::load(config).unwrap()
}

fn metadata(url: &str, crs: CrsIdentifier) -> RasterMetadata {
    RasterMetadata {
        source_url: url.to_string(),
        bounding_box: BoundingBox::new(500000.0, 5900000.0, 500100.0, 5900100.0),
        bounding_box_wgs84: BoundingBox::new(-3.0, 53.249266, -2.998501, 53.250166),
        crs,
        crs_details: CrsDetails {
            name: Some("WGS 84 / UTM zone 30N".to_string()),
            wkt: Some("PROJCRS[\"WGS 84 / UTM zone 30N\",ID[\"EPSG\",32630]]".to_string()),
            proj4: Some("+proj=utm +zone=30 +datum=WGS84 +units=m +no_defs".to_string()),
            is_geographic: false,
        },
        width: 10,
        height: 10,
        band_count: 4,
        band_data_type: BandDataType::UInt16,
        nodata: Some("0".to_string()),
    }
}

#[test]
fn test_shipped_templates_render_well_formed() {
    let registry = shipped_registry();

    for id in registry.collection_ids() {
        let descriptor = registry.resolve(id).unwrap();
        let subs = Substitutions::for_layer(
            &metadata("https://example.com/scene.tif?a=1&b=2", CrsIdentifier::epsg(32630)),
            &descriptor,
        );
        let xml = registry.renderer().render(&descriptor.template_path, &subs).unwrap();

        assert_well_formed(&xml);
        assert_eq!(
            element_texts(&xml, "datasource"),
            vec!["/vsicurl/https://example.com/scene.tif?a=1&b=2"]
        );
        assert_eq!(element_texts(&xml, "authid"), vec!["EPSG:32630"]);
        assert_eq!(
            element_texts(&xml, "proj4"),
            vec!["+proj=utm +zone=30 +datum=WGS84 +units=m +no_defs"]
        );
        assert_eq!(element_texts(&xml, "geographicflag"), vec!["false"]);
        assert_eq!(element_texts(&xml, "description"), vec!["WGS 84 / UTM zone 30N"]);
        assert!(xml.contains(r#"name="qlrgen/nodata" type="QString" value="0""#), "{xml}");
    }
}

#[test]
fn test_hostile_values_stay_escaped() {
    let registry = shipped_registry();
    let descriptor = registry.resolve("sentinel2_ard").unwrap();
    let url = "https://evil.example/\"><maplayer>&amp;</qlr><!--x.tif";
    let mut raster = metadata(url, CrsIdentifier::non_canonical("+proj=tmerc +type=crs"));
    raster.crs_details.name = Some("<Grid \"quoted\" & 'odd'>".to_string());
    raster.crs_details.wkt = Some("PROJCRS[\"<&>\"]]]></wkt>".to_string());
    let subs = Substitutions::for_layer(&raster, &descriptor);

    let xml = registry.renderer().render(&descriptor.template_path, &subs).unwrap();
    assert_well_formed(&xml);
    assert_eq!(element_texts(&xml, "description"), vec!["<Grid \"quoted\" & 'odd'>"]);
    assert_eq!(element_texts(&xml, "wkt"), vec!["PROJCRS[\"<&>\"]]]></wkt>"]);
    assert_eq!(element_texts(&xml, "maplayers").len(), 1);
}

proptest! {
    #[test]
    fn prop_any_value_renders_well_formed(value in "\\PC*") {
        let template = Template::parse(
            "prop.qlr",
            "<qlr><layer name=\"{v}\" source='{v}'>{v}</layer><id>{v}</id></qlr>",
        )
        .unwrap();
        let mut subs = Substitutions::new();
        subs.insert("v", &value);

        let xml = template.render(&subs).unwrap();
        assert_well_formed(&xml);
        prop_assert_eq!(element_texts(&xml, "id"), vec![value.clone()]);
    }
}
