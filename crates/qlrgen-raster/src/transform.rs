//! Pixel-to-model transform and reprojection of extents

use geo::{AffineTransform, Coord};
use proj::Proj;
use qlrgen_core::models::{BoundingBox, CrsIdentifier};

use crate::header::GeoTiffError;

/// Points per edge when reprojecting a box
pub const DENSIFY_POINTS: usize = 21;

/// Build the pixel-to-model transform from ModelTransformation, or from the
/// first tiepoint and the pixel scale.
///
/// For PixelIsPoint rasters the transform is moved half a pixel up and left,
/// so that it maps pixel corners like an area raster.
pub fn pixel_to_model(
    transformation: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
    pixel_scale: Option<&[f64]>,
    pixel_is_point: bool,
) -> Result<AffineTransform, GeoTiffError> {
    let transform = match (transformation, tiepoint, pixel_scale) {
        (Some(m), _, _) if m.len() >= 16 => AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7]),
        (_, Some(tie), Some(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            let (scale_x, scale_y) = (scale[0], scale[1]);
            if scale_x == 0.0 || scale_y == 0.0 {
                return Err(GeoTiffError::Malformed("pixel scale is zero".to_string()));
            }
            AffineTransform::new(scale_x, 0.0, x - i * scale_x, 0.0, -scale_y, y + j * scale_y)
        }
        (_, Some(_), None) => {
            return Err(GeoTiffError::Malformed(
                "tiepoints without pixel scale are not supported".to_string(),
            ))
        }
        _ => return Err(GeoTiffError::Malformed("raster is not georeferenced".to_string())),
    };

    let coefficients = [
        transform.a(),
        transform.b(),
        transform.xoff(),
        transform.d(),
        transform.e(),
        transform.yoff(),
    ];
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(GeoTiffError::Malformed("geotransform has non-finite values".to_string()));
    }

    if pixel_is_point {
        return Ok(AffineTransform::new(
            transform.a(),
            transform.b(),
            transform.xoff() - 0.5 * (transform.a() + transform.b()),
            transform.d(),
            transform.e(),
            transform.yoff() - 0.5 * (transform.d() + transform.e()),
        ));
    }

    Ok(transform)
}

/// Enclosing box of the four corners of a `width` x `height` pixel grid
pub fn native_bounds(transform: &AffineTransform, width: u64, height: u64) -> Option<BoundingBox> {
    let (w, h) = (width as f64, height as f64);
    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    BoundingBox::enclosing(corners.into_iter().map(|(x, y)| {
        let Coord { x, y } = transform.apply(Coord { x, y });
        (x, y)
    }))
}

/// Points along the four edges of `bbox`, `DENSIFY_POINTS` per edge
pub fn densify(bbox: &BoundingBox) -> Vec<(f64, f64)> {
    let steps = (DENSIFY_POINTS - 1) as f64;
    let corners = bbox.corners();
    let mut points = Vec::with_capacity(4 * DENSIFY_POINTS);

    for (index, &(x0, y0)) in corners.iter().enumerate() {
        let (x1, y1) = corners[(index + 1) % 4];
        for step in 0..DENSIFY_POINTS {
            let t = step as f64 / steps;
            points.push((x0 + (x1 - x0) * t, y0 + (y1 - y0) * t));
        }
    }

    points
}

/// Reproject `bbox` from `crs` to EPSG:4326, longitude first.
///
/// EPSG:4326 input is returned as-is. Points PROJ cannot transform are
/// dropped; the result encloses the rest.
pub fn to_wgs84(bbox: &BoundingBox, crs: &CrsIdentifier) -> Result<BoundingBox, String> {
    if crs.epsg_code() == Some(4326) {
        return Ok(*bbox);
    }

    let source = crs.definition();
    let proj = Proj::new_known_crs(&source, "EPSG:4326", None).map_err(|e| {
        format!("Failed to create projection from {} to EPSG:4326: {}", source, e)
    })?;

    let points = densify(bbox);
    let total = points.len();
    let converted: Vec<(f64, f64)> =
        points.into_iter().filter_map(|point| proj.convert(point).ok()).collect();
    if converted.len() < total {
        tracing::debug!(
            crs = %crs,
            dropped = total - converted.len(),
            "Some extent points could not be reprojected"
        );
    }

    BoundingBox::enclosing(converted)
        .ok_or_else(|| format!("No point of the extent could be reprojected from {}", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlrgen_test_utils::fixtures::{assert_wgs84_close, UTM30N_EXTENT, UTM30N_EXTENT_WGS84};

    #[test]
    fn test_tiepoint_and_scale() {
        let tie = [0.0, 0.0, 0.0, 500000.0, 5900100.0, 0.0];
        let t = pixel_to_model(None, Some(&tie), Some(&[10.0, 10.0, 0.0]), false).unwrap();
        let bbox = native_bounds(&t, 10, 10).unwrap();
        assert_eq!(bbox, BoundingBox::new(500000.0, 5900000.0, 500100.0, 5900100.0));
    }

    #[test]
    fn test_tiepoint_not_at_origin() {
        let tie = [2.0, 3.0, 0.0, 120.0, 470.0, 0.0];
        let t = pixel_to_model(None, Some(&tie), Some(&[10.0, 10.0, 0.0]), false).unwrap();
        assert_eq!(t.apply(Coord { x: 0.0, y: 0.0 }), Coord { x: 100.0, y: 500.0 });
    }

    #[test]
    fn test_pixel_is_point_shift() {
        let tie = [0.0, 0.0, 0.0, 500005.0, 5900095.0, 0.0];
        let t = pixel_to_model(None, Some(&tie), Some(&[10.0, 10.0, 0.0]), true).unwrap();
        let bbox = native_bounds(&t, 10, 10).unwrap();
        assert_eq!(bbox, BoundingBox::new(500000.0, 5900000.0, 500100.0, 5900100.0));
    }

    #[test]
    fn test_model_transformation_takes_precedence() {
        #[rustfmt::skip]
        let matrix = [
            0.0, 2.0, 0.0, 100.0,
            -2.0, 0.0, 0.0, 200.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = pixel_to_model(Some(&matrix), Some(&[0.0; 6]), Some(&[1.0, 1.0, 0.0]), false).unwrap();
        let bbox = native_bounds(&t, 4, 3).unwrap();
        // x = 100 + 2j, y = 200 - 2i
        assert_eq!(bbox, BoundingBox::new(100.0, 192.0, 106.0, 200.0));
    }

    #[test]
    fn test_missing_georeferencing() {
        assert!(pixel_to_model(None, None, None, false).is_err());
        assert!(pixel_to_model(None, Some(&[0.0; 6]), None, false).is_err());
        assert!(pixel_to_model(None, Some(&[0.0; 6]), Some(&[0.0, 1.0, 0.0]), false).is_err());
    }

    #[test]
    fn test_densify_covers_edges() {
        let points = densify(&BoundingBox::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(points.len(), 4 * DENSIFY_POINTS);
        assert_eq!(points[0], (0.0, 0.0));
        assert!((points[1].0 - 1.0).abs() < 1e-12 && points[1].1 == 0.0);
        assert_eq!(BoundingBox::enclosing(points), Some(BoundingBox::new(0.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_wgs84_passthrough() {
        let bbox = BoundingBox::new(-3.5, 50.0, -3.0, 50.5);
        assert_eq!(to_wgs84(&bbox, &CrsIdentifier::wgs84()).unwrap(), bbox);
    }

    #[test]
    fn test_utm_to_wgs84() {
        let (min_x, min_y, max_x, max_y) = UTM30N_EXTENT;
        let bbox = BoundingBox::new(min_x, min_y, max_x, max_y);
        let wgs84 = to_wgs84(&bbox, &CrsIdentifier::epsg(32630)).unwrap();
        assert_wgs84_close((wgs84.min_x, wgs84.min_y, wgs84.max_x, wgs84.max_y), UTM30N_EXTENT_WGS84);
    }

    #[test]
    fn test_uninterpretable_definition() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(to_wgs84(&bbox, &CrsIdentifier::non_canonical("Custom Lambert Conformal")).is_err());
    }
}
