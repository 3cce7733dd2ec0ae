//! CRS normalization from GeoKeys
//!
//! EPSG codes stored in the GeoKeys are used directly. User-defined CRSs fall
//! back to a lookup over the citation strings, then to a PROJ definition
//! rebuilt from the projection parameter keys. Only when neither works is
//! the citation itself kept as the definition.

use proj::Proj;
use qlrgen_core::models::{CrsDetails, CrsIdentifier};

use crate::geokeys::*;

/// Identify the CRS described by `keys`.
///
/// Returns `None` when the keys carry no usable code, no projection
/// parameters and no citation.
pub fn normalize_crs(keys: &GeoKeys) -> Option<CrsIdentifier> {
    let (code_keys, citation_keys) = crs_keys(keys);

    if let Some(code) = code_keys.iter().filter_map(|key| keys.short(*key)).find(|c| is_epsg_code(*c))
    {
        return Some(CrsIdentifier::epsg(u32::from(code)));
    }

    let citations: Vec<&str> = citation_keys.iter().filter_map(|key| keys.ascii(*key)).collect();

    if let Some(code) = citations.iter().find_map(|citation| lookup_citation(citation)) {
        tracing::debug!(code, "Resolved user-defined CRS from citation");
        return Some(CrsIdentifier::epsg(code));
    }

    if let Some(definition) = proj_definition(keys) {
        tracing::debug!(definition = %definition, "Rebuilt user-defined CRS from projection keys");
        return Some(CrsIdentifier::non_canonical(format!("{} +type=crs", definition)));
    }

    citations.first().map(|citation| {
        tracing::warn!(citation = %citation, "CRS has no EPSG code, keeping citation as definition");
        CrsIdentifier::non_canonical(*citation)
    })
}

/// Code keys and citation keys to consult, in order, for the model type
fn crs_keys(keys: &GeoKeys) -> (&'static [u16], &'static [u16]) {
    match keys.model_type() {
        Some(MODEL_TYPE_GEOGRAPHIC) => (&[GEOGRAPHIC_TYPE], &[GEOG_CITATION, GT_CITATION]),
        Some(MODEL_TYPE_PROJECTED) => (&[PROJECTED_CS_TYPE], &[PCS_CITATION, GT_CITATION]),
        _ => (
            &[PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE],
            &[PCS_CITATION, GT_CITATION, GEOG_CITATION],
        ),
    }
}

/// Name, proj4 string and axis kind for an identified CRS.
///
/// WKT is left empty here; it needs PROJ, see [`crs_wkt`].
pub fn crs_details(keys: &GeoKeys, crs: &CrsIdentifier) -> CrsDetails {
    let (_, citation_keys) = crs_keys(keys);
    let name = citation_keys.iter().find_map(|key| keys.ascii(*key)).map(str::to_string);

    let proj4 = match crs {
        CrsIdentifier::Canonical { .. } => crs.epsg_code().and_then(epsg_proj4),
        CrsIdentifier::NonCanonical { definition } => definition
            .strip_suffix(" +type=crs")
            .map(|proj| format!("{} +no_defs", proj)),
    };

    let is_geographic = match crs.epsg_code() {
        Some(code) => is_geographic_code(code),
        None => {
            keys.model_type() == Some(MODEL_TYPE_GEOGRAPHIC)
                || proj4.as_deref().is_some_and(|p| p.starts_with("+proj=longlat"))
        }
    };

    CrsDetails {
        name,
        wkt: None,
        proj4,
        is_geographic,
    }
}

/// WKT2 export of a CRS through PROJ
pub fn crs_wkt(crs: &CrsIdentifier) -> Result<String, String> {
    let definition = crs.definition();
    let proj = Proj::new(&definition)
        .map_err(|e| format!("PROJ cannot read {}: {}", definition, e))?;
    proj.as_wkt(None, None)
        .map_err(|e| format!("PROJ cannot export {} as WKT: {}", definition, e))
}

fn is_geographic_code(code: u32) -> bool {
    (4000..5000).contains(&code)
}

/// proj4 strings for the CRSs this tool meets most
fn epsg_proj4(code: u32) -> Option<String> {
    let proj = match code {
        4326 => "+proj=longlat +datum=WGS84".to_string(),
        4258 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0".to_string(),
        4269 => "+proj=longlat +datum=NAD83".to_string(),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m", code - 32600),
        32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m", code - 32700),
        25828..=25838 => format!(
            "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m",
            code - 25800
        ),
        26901..=26923 => format!("+proj=utm +zone={} +datum=NAD83 +units=m", code - 26900),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 \
                 +units=m +nadgrids=@null +wktext"
            .to_string(),
        27700 => "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 \
                  +ellps=airy +units=m"
            .to_string(),
        _ => return None,
    };
    Some(format!("{} +no_defs", proj))
}

/// PROJ string for a user-defined CRS described by projection keys.
///
/// Covers the GeoTIFF coordinate transformations in common use; anything
/// else gives `None`.
pub fn proj_definition(keys: &GeoKeys) -> Option<String> {
    let datum = datum_definition(keys);

    if keys.model_type() == Some(MODEL_TYPE_GEOGRAPHIC) {
        let described = keys.short(GEOGRAPHIC_TYPE) == Some(USER_DEFINED)
            || [GEOG_GEODETIC_DATUM, GEOG_ELLIPSOID, GEOG_SEMI_MAJOR_AXIS]
                .iter()
                .any(|id| keys.get(*id).is_some());
        return described.then(|| format!("+proj=longlat {}", datum));
    }

    let units = LinearUnits::from_keys(keys);

    if let Some(projection) = keys.short(PROJECTION) {
        if let Some((zone, south)) = utm_projection(projection) {
            let hemisphere = if south { " +south" } else { "" };
            return Some(format!("+proj=utm +zone={}{} {} {}", zone, hemisphere, datum, units.proj()));
        }
    }

    let angle = AngleReader::from_keys(keys);
    let lon_0 = angle.read(
        keys,
        &[PROJ_NAT_ORIGIN_LONG, PROJ_CENTER_LONG, PROJ_FALSE_ORIGIN_LONG, PROJ_STRAIGHT_VERT_POLE_LONG],
    );
    let lat_0 = angle.read(keys, &[PROJ_NAT_ORIGIN_LAT, PROJ_CENTER_LAT, PROJ_FALSE_ORIGIN_LAT]);
    let x_0 = units.to_metres(first(keys, &[PROJ_FALSE_EASTING, PROJ_FALSE_ORIGIN_EASTING]));
    let y_0 = units.to_metres(first(keys, &[PROJ_FALSE_NORTHING, PROJ_FALSE_ORIGIN_NORTHING]));
    let k = first(keys, &[PROJ_SCALE_AT_NAT_ORIGIN, PROJ_SCALE_AT_CENTER]);
    let lat_1 = angle.read(keys, &[PROJ_STD_PARALLEL_1]);
    let lat_2 = angle.read(keys, &[PROJ_STD_PARALLEL_2]);

    let origin = format!("+x_0={} +y_0={}", x_0.unwrap_or(0.0), y_0.unwrap_or(0.0));
    let lon = lon_0.unwrap_or(0.0);
    let lat = lat_0.unwrap_or(0.0);

    let projection = match keys.short(PROJ_COORD_TRANS)? {
        CT_TRANSVERSE_MERCATOR => format!(
            "+proj=tmerc +lat_0={} +lon_0={} +k={} {}",
            lat,
            lon,
            k.unwrap_or(1.0),
            origin
        ),
        CT_MERCATOR => match (k, lat_1) {
            (None, Some(lat_ts)) => format!("+proj=merc +lat_ts={} +lon_0={} {}", lat_ts, lon, origin),
            _ => format!("+proj=merc +lon_0={} +k={} {}", lon, k.unwrap_or(1.0), origin),
        },
        CT_LAMBERT_CONFORMAL_2SP => format!(
            "+proj=lcc +lat_0={} +lon_0={} +lat_1={} +lat_2={} {}",
            lat,
            lon,
            lat_1?,
            lat_2.or(lat_1)?,
            origin
        ),
        CT_LAMBERT_CONFORMAL_1SP => format!(
            "+proj=lcc +lat_0={} +lat_1={} +lon_0={} +k_0={} {}",
            lat,
            lat,
            lon,
            k.unwrap_or(1.0),
            origin
        ),
        CT_LAMBERT_AZIMUTHAL_EQUAL_AREA => {
            format!("+proj=laea +lat_0={} +lon_0={} {}", lat, lon, origin)
        }
        CT_ALBERS_EQUAL_AREA => format!(
            "+proj=aea +lat_0={} +lon_0={} +lat_1={} +lat_2={} {}",
            lat,
            lon,
            lat_1?,
            lat_2.or(lat_1)?,
            origin
        ),
        CT_POLAR_STEREOGRAPHIC => format!(
            "+proj=stere +lat_0={} +lat_ts={} +lon_0={} +k={} {}",
            if lat_0.or(lat_1).unwrap_or(90.0) < 0.0 { -90.0 } else { 90.0 },
            lat_1.or(lat_0).unwrap_or(90.0),
            lon,
            k.unwrap_or(1.0),
            origin
        ),
        CT_EQUIRECTANGULAR => format!(
            "+proj=eqc +lat_ts={} +lon_0={} {}",
            lat_1.unwrap_or(lat),
            lon,
            origin
        ),
        other => {
            tracing::debug!(transformation = other, "Unsupported coordinate transformation");
            return None;
        }
    };

    Some(format!("{} {} {}", projection, datum, units.proj()))
}

const CT_TRANSVERSE_MERCATOR: u16 = 1;
const CT_MERCATOR: u16 = 7;
const CT_LAMBERT_CONFORMAL_2SP: u16 = 8;
const CT_LAMBERT_CONFORMAL_1SP: u16 = 9;
const CT_LAMBERT_AZIMUTHAL_EQUAL_AREA: u16 = 10;
const CT_ALBERS_EQUAL_AREA: u16 = 11;
const CT_POLAR_STEREOGRAPHIC: u16 = 15;
const CT_EQUIRECTANGULAR: u16 = 17;

fn first(keys: &GeoKeys, ids: &[u16]) -> Option<f64> {
    ids.iter().find_map(|id| keys.double(*id)).filter(|v| v.is_finite())
}

/// ProjectionGeoKey codes for UTM zones (16001..16060 north, 16101..16160 south)
fn utm_projection(code: u16) -> Option<(u16, bool)> {
    match code {
        16001..=16060 => Some((code - 16000, false)),
        16101..=16160 => Some((code - 16100, true)),
        _ => None,
    }
}

/// Angular parameters are degrees unless the keys say radians
struct AngleReader {
    radians: bool,
}

impl AngleReader {
    fn from_keys(keys: &GeoKeys) -> Self {
        Self {
            radians: keys.short(GEOG_ANGULAR_UNITS) == Some(9101),
        }
    }

    fn read(&self, keys: &GeoKeys, ids: &[u16]) -> Option<f64> {
        first(keys, ids).map(|value| if self.radians { value.to_degrees() } else { value })
    }
}

enum LinearUnits {
    Metre,
    Foot,
    UsSurveyFoot,
    Other(f64),
}

impl LinearUnits {
    fn from_keys(keys: &GeoKeys) -> Self {
        match keys.short(PROJ_LINEAR_UNITS) {
            Some(9002) => LinearUnits::Foot,
            Some(9003) => LinearUnits::UsSurveyFoot,
            Some(USER_DEFINED) => keys
                .double(PROJ_LINEAR_UNIT_SIZE)
                .filter(|size| size.is_finite() && *size > 0.0)
                .map_or(LinearUnits::Metre, LinearUnits::Other),
            _ => LinearUnits::Metre,
        }
    }

    fn factor(&self) -> f64 {
        match self {
            LinearUnits::Metre => 1.0,
            LinearUnits::Foot => 0.3048,
            LinearUnits::UsSurveyFoot => 1200.0 / 3937.0,
            LinearUnits::Other(size) => *size,
        }
    }

    /// False easting and northing are stored in the CRS unit; PROJ wants metres
    fn to_metres(&self, value: Option<f64>) -> Option<f64> {
        value.map(|v| v * self.factor())
    }

    fn proj(&self) -> String {
        match self {
            LinearUnits::Metre => "+units=m".to_string(),
            LinearUnits::Foot => "+units=ft".to_string(),
            LinearUnits::UsSurveyFoot => "+units=us-ft".to_string(),
            LinearUnits::Other(size) => format!("+to_meter={}", size),
        }
    }
}

/// Datum or ellipsoid part of a PROJ string
fn datum_definition(keys: &GeoKeys) -> String {
    let by_geographic = match keys.short(GEOGRAPHIC_TYPE) {
        Some(4326) => Some("+datum=WGS84"),
        Some(4258) => Some("+ellps=GRS80 +towgs84=0,0,0,0,0,0,0"),
        Some(4269) => Some("+datum=NAD83"),
        Some(4267) => Some("+datum=NAD27"),
        Some(4277) => Some("+datum=OSGB36"),
        Some(4283) => Some("+ellps=GRS80 +towgs84=0,0,0,0,0,0,0"),
        _ => None,
    };
    let by_datum = || match keys.short(GEOG_GEODETIC_DATUM) {
        Some(6326) => Some("+datum=WGS84"),
        Some(6258) | Some(6283) => Some("+ellps=GRS80 +towgs84=0,0,0,0,0,0,0"),
        Some(6269) => Some("+datum=NAD83"),
        Some(6267) => Some("+datum=NAD27"),
        Some(6277) => Some("+datum=OSGB36"),
        _ => None,
    };
    let by_ellipsoid = || match keys.short(GEOG_ELLIPSOID) {
        Some(7030) => Some("+ellps=WGS84"),
        Some(7019) => Some("+ellps=GRS80"),
        Some(7001) => Some("+ellps=airy"),
        Some(7008) => Some("+ellps=clrk66"),
        Some(7022) => Some("+ellps=intl"),
        Some(7004) => Some("+ellps=bessel"),
        _ => None,
    };

    if let Some(datum) = by_geographic.or_else(by_datum).or_else(by_ellipsoid) {
        return datum.to_string();
    }

    let semi_major = keys.double(GEOG_SEMI_MAJOR_AXIS).filter(|a| *a > 0.0);
    let inverse_flattening = keys.double(GEOG_INV_FLATTENING).filter(|rf| *rf > 0.0);
    let semi_minor = keys.double(GEOG_SEMI_MINOR_AXIS).filter(|b| *b > 0.0);
    match (semi_major, inverse_flattening, semi_minor) {
        (Some(a), Some(rf), _) => format!("+a={} +rf={}", a, rf),
        (Some(a), None, Some(b)) => format!("+a={} +b={}", a, b),
        (Some(a), None, None) => format!("+R={}", a),
        _ => {
            tracing::debug!("No datum in GeoKeys, assuming WGS 84");
            "+datum=WGS84".to_string()
        }
    }
}

fn is_epsg_code(code: u16) -> bool {
    code != 0 && code != USER_DEFINED
}

/// Best-effort EPSG code for a CRS citation or name
pub fn lookup_citation(citation: &str) -> Option<u32> {
    let text = citation.to_ascii_lowercase().replace('_', " ");

    if let Some(code) = explicit_epsg(&text) {
        return Some(code);
    }
    if let Some(code) = utm_zone(&text) {
        return Some(code);
    }
    if text.contains("british national grid") || text.contains("osgb 1936 / british") {
        return Some(27700);
    }
    if text.contains("pseudo-mercator") || text.contains("pseudo mercator") || text.contains("web mercator") {
        return Some(3857);
    }

    let compact: String = text.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if compact == "wgs84" || compact == "gcswgs1984" || compact == "wgs1984" {
        return Some(4326);
    }

    None
}

/// `EPSG:nnnn` or `EPSG::nnnn` anywhere in the text
fn explicit_epsg(text: &str) -> Option<u32> {
    let (_, rest) = text.split_once("epsg:")?;
    let digits: String = rest.trim_start_matches(':').chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|code| *code > 0)
}

/// `<datum> / UTM zone NN[N|S]` for WGS 84, ETRS89 and NAD83
fn utm_zone(text: &str) -> Option<u32> {
    let (datum, rest) = text.split_once("utm zone")?;
    let rest = rest.trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let zone: u32 = digits.parse().ok().filter(|zone| (1..=60).contains(zone))?;
    let hemisphere = rest[digits.len()..].chars().next();
    let south = hemisphere == Some('s');

    let datum: String = datum.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if datum.contains("wgs84") || datum.contains("wgs1984") {
        Some(if south { 32700 + zone } else { 32600 + zone })
    } else if datum.contains("etrs89") && !south && (28..=38).contains(&zone) {
        Some(25800 + zone)
    } else if datum.contains("nad83") && !south && (1..=23).contains(&zone) {
        Some(26900 + zone)
    } else {
        None
    }
}
