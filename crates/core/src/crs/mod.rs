//! Coordinate Reference System handling
//!
//! A [`CRS`] pairs the identifier it was resolved from with the parameters
//! needed to move coordinates to and from WGS84 geographic coordinates.
//! Equality compares only those parameters: `EPSG:4326` and `OGC:CRS84`
//! are the same frame.

mod registry;

pub use registry::CrsRegistry;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference ellipsoid given by semi-major axis and flattening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid { a: 6_378_137.0, f: 1.0 / 298.257_223_563 };
    pub const GRS80: Ellipsoid = Ellipsoid { a: 6_378_137.0, f: 1.0 / 298.257_222_101 };
    pub const AIRY_1830: Ellipsoid = Ellipsoid { a: 6_377_563.396, f: 1.0 / 299.324_964_6 };
    pub const INTERNATIONAL_1924: Ellipsoid = Ellipsoid { a: 6_378_388.0, f: 1.0 / 297.0 };
}

/// How a datum relates to WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatumShift {
    /// Geocentric translation (dx, dy, dz) in metres from this datum to WGS84
    ToWgs84([f64; 3]),
    /// No known path to WGS84; only transforms within the same datum are possible
    Unlinked(String),
}

/// Geodetic datum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub ellipsoid: Ellipsoid,
    pub shift: DatumShift,
}

impl Datum {
    pub fn wgs84() -> Self {
        Self { ellipsoid: Ellipsoid::WGS84, shift: DatumShift::ToWgs84([0.0; 3]) }
    }

    /// NAD83 and ETRS89 share this definition at the precision handled here
    pub fn grs80() -> Self {
        Self { ellipsoid: Ellipsoid::GRS80, shift: DatumShift::ToWgs84([0.0; 3]) }
    }

    pub fn ed50() -> Self {
        Self {
            ellipsoid: Ellipsoid::INTERNATIONAL_1924,
            shift: DatumShift::ToWgs84([-87.0, -98.0, -121.0]),
        }
    }

    pub fn osgb36() -> Self {
        Self {
            ellipsoid: Ellipsoid::AIRY_1830,
            shift: DatumShift::ToWgs84([446.448, -125.157, 542.06]),
        }
    }

    /// Translation to WGS84, if one is known
    pub fn to_wgs84(&self) -> Option<[f64; 3]> {
        match self.shift {
            DatumShift::ToWgs84(t) => Some(t),
            DatumShift::Unlinked(_) => None,
        }
    }
}

/// Map projection applied on top of the datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical (pseudo) Mercator on the datum's semi-major axis
    WebMercator,
    /// Ellipsoidal Transverse Mercator (UTM and national grids)
    TransverseMercator {
        /// Central meridian (degrees)
        lon0: f64,
        /// Latitude of origin (degrees)
        lat0: f64,
        /// Scale factor on the central meridian
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    },
    /// Engineering plane in metres with no link to the Earth
    Local,
}

/// Resolved transform parameters of a CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsDefinition {
    pub datum: Datum,
    pub projection: Projection,
}

impl CrsDefinition {
    pub fn geographic(datum: Datum) -> Self {
        Self { datum, projection: Projection::Geographic }
    }

    pub fn utm(datum: Datum, zone: u32, north: bool) -> Self {
        Self {
            datum,
            projection: Projection::TransverseMercator {
                lon0: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
                lat0: 0.0,
                k0: 0.9996,
                false_easting: 500_000.0,
                false_northing: if north { 0.0 } else { 10_000_000.0 },
            },
        }
    }

    pub fn local() -> Self {
        Self {
            datum: Datum {
                ellipsoid: Ellipsoid::WGS84,
                shift: DatumShift::Unlinked("local".to_string()),
            },
            projection: Projection::Local,
        }
    }
}

/// Units of the CRS axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    Degrees,
    Metres,
}

/// Coordinate Reference System representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CRS {
    /// Identifier the CRS was resolved from
    identifier: String,
    /// Transform parameters
    definition: CrsDefinition,
}

impl CRS {
    /// Create a CRS from an identifier and its resolved parameters
    pub fn new(identifier: impl Into<String>, definition: CrsDefinition) -> Self {
        Self { identifier: identifier.into(), definition }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326", CrsDefinition::geographic(Datum::wgs84()))
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::new(
            "EPSG:3857",
            CrsDefinition { datum: Datum::wgs84(), projection: Projection::WebMercator },
        )
    }

    /// WGS84 / UTM zone (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::InvalidParameter {
                name: "zone",
                value: zone.to_string(),
                reason: "UTM zones run from 1 to 60".to_string(),
            });
        }
        let code = if north { 32600 + zone } else { 32700 + zone };
        Ok(Self::new(format!("EPSG:{}", code), CrsDefinition::utm(Datum::wgs84(), zone, north)))
    }

    /// Local engineering plane in metres
    pub fn local() -> Self {
        Self::new("LOCAL", CrsDefinition::local())
    }

    /// Identifier the CRS was created from
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn definition(&self) -> &CrsDefinition {
        &self.definition
    }

    pub fn datum(&self) -> &Datum {
        &self.definition.datum
    }

    pub fn projection(&self) -> &Projection {
        &self.definition.projection
    }

    /// Get EPSG code if the identifier carries one
    pub fn epsg(&self) -> Option<u32> {
        self.identifier
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse().ok())
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self.definition.projection, Projection::Geographic)
    }

    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    pub fn units(&self) -> Units {
        if self.is_geographic() {
            Units::Degrees
        } else {
            Units::Metres
        }
    }

    /// Check that a coordinate lies in the domain of this CRS
    pub fn check_coord(&self, x: f64, y: f64) -> Result<()> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::InvalidCoordinate { x, y, reason: "not finite".to_string() });
        }
        if self.is_geographic() && !(-90.0..=90.0).contains(&y) {
            return Err(Error::InvalidCoordinate {
                x,
                y,
                reason: format!("latitude outside [-90, 90] in {}", self.identifier),
            });
        }
        Ok(())
    }
}

impl PartialEq for CRS {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::wgs84();
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
        assert_eq!(crs.units(), Units::Degrees);
    }

    #[test]
    fn test_equality_ignores_identifier() {
        let a = CRS::wgs84();
        let b = CRS::new("OGC:CRS84", CrsDefinition::geographic(Datum::wgs84()));
        assert_eq!(a, b);
        assert_ne!(a, CRS::web_mercator());
    }

    #[test]
    fn test_utm_zone_parameters() {
        let crs = CRS::utm(30, true).unwrap();
        assert_eq!(crs.epsg(), Some(32630));
        match crs.projection() {
            Projection::TransverseMercator { lon0, false_northing, .. } => {
                assert_eq!(*lon0, -3.0);
                assert_eq!(*false_northing, 0.0);
            }
            other => panic!("unexpected projection {:?}", other),
        }
        assert!(CRS::utm(61, true).is_err());
        assert_eq!(CRS::utm(21, false).unwrap().epsg(), Some(32721));
    }

    #[test]
    fn test_check_coord() {
        let geo = CRS::wgs84();
        assert!(geo.check_coord(10.0, 45.0).is_ok());
        assert!(geo.check_coord(10.0, 95.0).is_err());
        assert!(CRS::local().check_coord(10.0, 95.0).is_ok());
        assert!(CRS::local().check_coord(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_local_frames_are_projected() {
        let local = CRS::local();
        assert!(local.is_projected());
        assert_eq!(local.units(), Units::Metres);
        assert_eq!(local.datum().to_wgs84(), None);
    }
}
