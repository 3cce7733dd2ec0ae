//! COG metadata extractor
//!
//! Implements the core `MetadataExtractor` port by reading the TIFF header of
//! a local or remote COG and deriving extent, CRS and band layout from it.

use async_trait::async_trait;
use qlrgen_core::error::{QlrError, Result};
use qlrgen_core::models::{BandDataType, CrsIdentifier, RasterMetadata};
use qlrgen_core::ports::MetadataExtractor;
use std::time::Duration;

use crate::crs::{crs_details, crs_wkt, normalize_crs};
use crate::geokeys::GeoKeys;
use crate::header::{read_image_header, ImageHeader, DEFAULT_PREFIX_LEN};
use crate::source::{open_source, RangeReader};
use crate::transform::{native_bounds, pixel_to_model, to_wgs84};

/// Extractor settings
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// TCP/TLS connect timeout for each request
    pub connect_timeout: Duration,
    /// Total timeout for each HTTP request
    pub request_timeout: Duration,
    /// Deadline for the whole extraction, however many requests it takes
    pub overall_timeout: Duration,
    /// Size of the first header read
    pub header_prefix: usize,
    pub user_agent: String,
    /// Accept `file://` URLs and bare paths besides http(s)
    pub allow_local_paths: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            overall_timeout: Duration::from_secs(60),
            header_prefix: DEFAULT_PREFIX_LEN,
            user_agent: format!("qlrgen/{}", env!("CARGO_PKG_VERSION")),
            allow_local_paths: true,
        }
    }
}

impl ExtractorConfig {
    /// Apply one timeout to connect, request and overall deadlines
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = self.connect_timeout.min(timeout);
        self.request_timeout = timeout;
        self.overall_timeout = timeout;
        self
    }
}

/// Reads COG headers over HTTP range requests or from local files
#[derive(Debug, Clone)]
pub struct CogExtractor {
    config: ExtractorConfig,
    client: reqwest::Client,
}

impl CogExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| QlrError::Internal {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract metadata through an already opened reader.
    ///
    /// `source_url` is recorded as given; the reader's own location may be
    /// a normalized form of it.
    pub async fn extract_from(
        &self,
        source_url: &str,
        reader: &dyn RangeReader,
    ) -> Result<RasterMetadata> {
        let url = source_url.to_string();
        let header = read_image_header(reader, self.config.header_prefix).await?;
        let mut metadata = describe(&url, &header)?;

        // PROJ may hit its database; keep it off the async workers.
        let bounding_box = metadata.bounding_box;
        let crs = metadata.crs.clone();
        let (reprojected, wkt) = tokio::task::spawn_blocking(move || {
            (to_wgs84(&bounding_box, &crs), crs_wkt(&crs))
        })
        .await
        .map_err(|e| QlrError::Internal {
            reason: format!("Reprojection task failed: {}", e),
        })?;

        metadata.bounding_box_wgs84 = reprojected.map_err(|reason| {
            QlrError::invalid_raster(&url, format!("Cannot reproject extent: {}", reason))
        })?;
        match wkt {
            Ok(wkt) => metadata.crs_details.wkt = Some(wkt),
            Err(reason) => tracing::debug!(url = %url, reason = %reason, "No WKT for CRS"),
        }

        metadata.validate().map_err(|reason| QlrError::invalid_raster(&url, reason))?;

        Ok(metadata)
    }
}

#[async_trait]
impl MetadataExtractor for CogExtractor {
    async fn extract(&self, url: &str) -> Result<RasterMetadata> {
        let url = url.trim();
        let reader = open_source(url, &self.client, self.config.allow_local_paths)?;
        let deadline = self.config.overall_timeout;

        match tokio::time::timeout(deadline, self.extract_from(url, reader.as_ref())).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!(url = %url, error = %e, "Metadata extraction failed");
                }
                result
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout = ?deadline, "Metadata extraction timed out");
                Err(QlrError::timed_out(
                    url,
                    format!("metadata extraction did not finish within {:?}", deadline),
                ))
            }
        }
    }
}

/// Turn the decoded header into metadata in the native CRS.
///
/// The WGS84 box is left equal to the native box for the caller to fill in.
fn describe(url: &str, header: &ImageHeader) -> Result<RasterMetadata> {
    let invalid = |reason: String| QlrError::invalid_raster(url, reason);

    let width = u64::from(header.width);
    let height = u64::from(header.height);
    let band_count = header.samples_per_pixel;
    let band_data_type = data_type(header).map_err(invalid)?;

    let keys = GeoKeys::from_header(header)
        .ok_or_else(|| invalid("no GeoKeyDirectory, not a GeoTIFF".to_string()))?
        .map_err(|e| invalid(e.to_string()))?;
    let crs: CrsIdentifier =
        normalize_crs(&keys).ok_or_else(|| invalid("GeoKeys carry no CRS".to_string()))?;
    let details = crs_details(&keys, &crs);

    let transform = pixel_to_model(
        header.transformation.as_deref(),
        header.tiepoint.as_deref(),
        header.pixel_scale.as_deref(),
        keys.pixel_is_point(),
    )
    .map_err(|e| invalid(e.to_string()))?;
    let bounding_box = native_bounds(&transform, width, height)
        .ok_or_else(|| invalid("extent is not finite".to_string()))?;
    bounding_box.validate().map_err(invalid)?;

    let nodata = header
        .nodata
        .as_deref()
        .map(|value| value.trim_end_matches('\0').trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    tracing::debug!(
        url = %url,
        width,
        height,
        bands = band_count,
        data_type = %band_data_type,
        crs = %crs,
        "Decoded GeoTIFF header"
    );

    Ok(RasterMetadata {
        source_url: url.to_string(),
        bounding_box,
        bounding_box_wgs84: bounding_box,
        crs,
        crs_details: details,
        width,
        height,
        band_count: u32::from(band_count),
        band_data_type,
        nodata,
    })
}

/// All bands must share one bit depth and sample format
fn data_type(header: &ImageHeader) -> std::result::Result<BandDataType, String> {
    let bits = &header.bits_per_sample;
    let formats = &header.sample_format;

    let first_bits = bits.first().copied().unwrap_or(1);
    let first_format = formats.first().copied().unwrap_or(1);
    if bits.iter().any(|b| *b != first_bits) || formats.iter().any(|f| *f != first_format) {
        return Err("bands have mixed sample types".to_string());
    }

    u16::try_from(first_bits)
        .ok()
        .zip(u16::try_from(first_format).ok())
        .and_then(|(bits, format)| BandDataType::from_tiff(bits, format))
        .ok_or_else(|| {
            format!(
                "unsupported sample layout: {} bits, sample format {}",
                first_bits, first_format
            )
        })
}
