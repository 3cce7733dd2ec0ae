//! Inspect command implementation

use anyhow::{Context, Result};
use qlrgen_core::ports::MetadataExtractor;

use crate::cli::InspectArgs;
use crate::output::OutputWriter;
use crate::output_types::InspectOutput;

pub async fn execute(args: InspectArgs, output: &OutputWriter) -> Result<()> {
    let extractor = super::extractor(args.timeout)?;
    let metadata = extractor
        .extract(&args.url)
        .await
        .with_context(|| format!("Failed to read raster metadata from {}", args.url))?;

    if output.is_json() {
        return output.result(InspectOutput {
            crs_authid: metadata.crs.authid(),
            metadata,
        });
    }

    output.section("Raster");
    output.kv("Source", &metadata.source_url);
    output.kv("Size", format!("{} x {} pixels", metadata.width, metadata.height));
    output.kv("Bands", format!("{} x {}", metadata.band_count, metadata.band_data_type));
    output.kv("NoData", metadata.nodata.as_deref().unwrap_or("(none)"));

    output.section("Georeferencing");
    output.kv("CRS", &metadata.crs);
    if let Some(name) = &metadata.crs_details.name {
        output.kv("CRS name", name);
    }
    output.kv("Geographic", metadata.crs_details.is_geographic);
    output.kv("Extent", metadata.bounding_box);
    output.kv("Extent (WGS84)", metadata.bounding_box_wgs84);

    match (&metadata.crs, &metadata.crs_details.proj4) {
        (crs, _) if crs.is_canonical() => {}
        (_, Some(proj4)) => output.info(format!(
            "CRS has no EPSG code; the layer carries its PROJ definition '{}'",
            proj4
        )),
        (crs, None) => output.warning(format!(
            "CRS has no EPSG code; QGIS will see only its citation '{}'",
            crs.definition()
        )),
    }

    Ok(())
}
