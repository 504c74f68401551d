//! proj4rs endpoints built from resolved CRS definitions
//!
//! A definition is rendered back to a PROJ string with explicit ellipsoid
//! axes and `+towgs84` terms, so proj4rs applies exactly the parameters the
//! registry resolved. proj4rs works in radians for geographic frames.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt::Write;
use terrabind_core::crs::{CrsDefinition, DatumShift, Ellipsoid, Projection};

fn ellipsoid_terms(out: &mut String, ell: &Ellipsoid) {
    if ell.f == 0.0 {
        let _ = write!(out, " +a={} +b={}", ell.a, ell.a);
    } else {
        let _ = write!(out, " +a={} +rf={}", ell.a, 1.0 / ell.f);
    }
}

/// PROJ string for a definition, `None` for engineering frames
pub(crate) fn proj_string(def: &CrsDefinition) -> Option<String> {
    let mut out = match &def.projection {
        Projection::Local => return None,
        Projection::Geographic => "+proj=longlat".to_string(),
        // Spherical Mercator on WGS84 longitudes and latitudes
        Projection::WebMercator => {
            let a = def.datum.ellipsoid.a;
            return Some(format!(
                "+proj=merc +a={a} +b={a} +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"
            ));
        }
        Projection::TransverseMercator { lon0, lat0, k0, false_easting, false_northing } => format!(
            "+proj=tmerc +lat_0={} +lon_0={} +k={} +x_0={} +y_0={} +units=m",
            lat0, lon0, k0, false_easting, false_northing
        ),
    };

    ellipsoid_terms(&mut out, &def.datum.ellipsoid);
    if let DatumShift::ToWgs84([dx, dy, dz]) = def.datum.shift {
        let _ = write!(out, " +towgs84={},{},{}", dx, dy, dz);
    }
    out.push_str(" +no_defs");
    Some(out)
}

/// One side of a transform
pub(crate) struct Endpoint {
    proj: Proj,
    geographic: bool,
}

impl Endpoint {
    /// Build the proj4rs projection for a definition.
    ///
    /// `Err` carries a human-readable reason; `Ok(None)` means the frame has
    /// no link to the Earth.
    pub fn new(def: &CrsDefinition) -> Result<Option<Self>, String> {
        let Some(text) = proj_string(def) else {
            return Ok(None);
        };
        let proj = Proj::from_proj_string(&text).map_err(|e| format!("{:?} in '{}'", e, text))?;
        Ok(Some(Self {
            proj,
            geographic: matches!(def.projection, Projection::Geographic),
        }))
    }
}

/// Move one coordinate from `source` to `target`; degrees in and out for geographic frames
pub(crate) fn convert(source: &Endpoint, target: &Endpoint, x: f64, y: f64) -> Result<(f64, f64), String> {
    let mut point = if source.geographic {
        (x.to_radians(), y.to_radians(), 0.0)
    } else {
        (x, y, 0.0)
    };

    transform(&source.proj, &target.proj, &mut point).map_err(|e| format!("{:?}", e))?;

    Ok(if target.geographic {
        (point.0.to_degrees(), point.1.to_degrees())
    } else {
        (point.0, point.1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrabind_core::crs::Datum;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    fn endpoint(def: &CrsDefinition) -> Endpoint {
        Endpoint::new(def).unwrap().unwrap()
    }

    fn wgs84() -> Endpoint {
        endpoint(&CrsDefinition::geographic(Datum::wgs84()))
    }

    #[test]
    fn renders_utm_definition() {
        let text = proj_string(&CrsDefinition::utm(Datum::wgs84(), 30, true)).unwrap();
        assert!(text.starts_with("+proj=tmerc +lat_0=0 +lon_0=-3 +k=0.9996 +x_0=500000 +y_0=0"));
        assert!(text.contains("+a=6378137"));
        assert!(text.contains("+towgs84=0,0,0"));
        assert!(proj_string(&CrsDefinition::local()).is_none());
    }

    #[test]
    fn unlinked_datum_has_no_shift_terms() {
        let mut datum = Datum::ed50();
        datum.shift = DatumShift::Unlinked("survey".to_string());
        let text = proj_string(&CrsDefinition::geographic(datum)).unwrap();
        assert!(!text.contains("towgs84"));
        assert!(text.contains("+rf=297"));
    }

    // Reference values from PROJ 9.x, EPSG:4326 -> EPSG:32630, always_xy
    #[test]
    fn madrid_to_utm30n() {
        let utm = endpoint(&CrsDefinition::utm(Datum::wgs84(), 30, true));
        let (e, n) = convert(&wgs84(), &utm, -3.7037, 40.4168).unwrap();
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");

        let (lon, lat) = convert(&utm, &wgs84(), e, n).unwrap();
        assert_close(lon, -3.7037, 1e-7, "lon");
        assert_close(lat, 40.4168, 1e-7, "lat");
    }

    #[test]
    fn buenos_aires_to_utm21s() {
        let utm = endpoint(&CrsDefinition::utm(Datum::wgs84(), 21, false));
        let (e, n) = convert(&wgs84(), &utm, -58.3816, -34.6037).unwrap();
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn equator_central_meridian() {
        let utm = endpoint(&CrsDefinition::utm(Datum::wgs84(), 31, true));
        let (e, n) = convert(&wgs84(), &utm, 3.0, 0.0).unwrap();
        assert_close(e, 500_000.0, 0.01, "easting at CM");
        assert_close(n, 0.0, 0.01, "northing at equator");
    }

    #[test]
    fn web_mercator_known_point() {
        let merc = endpoint(&CrsDefinition { datum: Datum::wgs84(), projection: Projection::WebMercator });
        // lon 10, lat 0 -> x = a * 10 degrees in radians
        let (x, y) = convert(&wgs84(), &merc, 10.0, 0.0).unwrap();
        assert_close(x, 1_113_194.907_932_736, 1e-6, "x");
        assert_close(y, 0.0, 1e-6, "y");

        let (lon, lat) = convert(&merc, &wgs84(), x, 5_000_000.0).unwrap();
        assert_close(lon, 10.0, 1e-9, "lon");
        let (_, y_back) = convert(&wgs84(), &merc, lon, lat).unwrap();
        assert_close(y_back, 5_000_000.0, 1e-6, "y roundtrip");
    }
}
