//! Coordinate reprojection between resolved CRS definitions
//!
//! Transforms run through proj4rs: inverse projection, a three-parameter
//! geocentric datum shift when the datums differ, forward projection.
//! Geometries that cross the antimeridian are transformed coordinate by
//! coordinate with no unwrapping.

mod proj;

use crate::maybe_rayon::*;
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use proj::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use terrabind_core::crs::Projection;
use terrabind_core::vector::{Feature, VectorLayer};
use terrabind_core::{Algorithm, CrsRegistry, Error, Result, CRS};
use tracing::debug;

/// A prepared transform between two CRS definitions
pub struct CoordTransform {
    from: String,
    to: String,
    /// `None` when both frames are the same
    endpoints: Option<(Endpoint, Endpoint)>,
}

impl fmt::Debug for CoordTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordTransform")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("identity", &self.is_identity())
            .finish()
    }
}

impl CoordTransform {
    /// Plan the transform, failing with [`Error::UnsupportedTransform`] when
    /// no path between the two frames is known
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let source = from.definition();
        let target = to.definition();

        if source == target {
            return Ok(Self { from: from.to_string(), to: to.to_string(), endpoints: None });
        }

        let unsupported = || Error::UnsupportedTransform {
            from: from.to_string(),
            to: to.to_string(),
        };

        // Engineering frames have no link to the Earth
        if matches!(source.projection, Projection::Local) || matches!(target.projection, Projection::Local) {
            return Err(unsupported());
        }
        if source.datum != target.datum && (source.datum.to_wgs84().is_none() || target.datum.to_wgs84().is_none()) {
            return Err(unsupported());
        }

        let endpoint = |crs: &CRS| -> Result<Endpoint> {
            Endpoint::new(crs.definition())
                .map_err(|reason| Error::UnknownCrs(format!("{}: {}", crs, reason)))?
                .ok_or_else(unsupported)
        };

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            endpoints: Some((endpoint(from)?, endpoint(to)?)),
        })
    }

    pub fn is_identity(&self) -> bool {
        self.endpoints.is_none()
    }

    /// Transform one coordinate
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some((source, target)) = &self.endpoints else {
            return Ok((x, y));
        };

        let outside = |reason: String| Error::InvalidCoordinate {
            x,
            y,
            reason: format!("cannot transform from {} to {}: {}", self.from, self.to, reason),
        };

        let (out_x, out_y) = proj::convert(source, target, x, y).map_err(outside)?;
        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(outside("outside the domain of the target projection".to_string()));
        }
        Ok((out_x, out_y))
    }

    fn apply_coord(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self.apply(c.x, c.y)?;
        Ok(Coord { x, y })
    }

    /// Transform every coordinate of a geometry, preserving structure and order
    pub fn apply_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }

        let line = |ls: &LineString<f64>| -> Result<LineString<f64>> {
            ls.0.iter()
                .map(|c| self.apply_coord(*c))
                .collect::<Result<Vec<_>>>()
                .map(LineString::new)
        };
        let polygon = |p: &Polygon<f64>| -> Result<Polygon<f64>> {
            let exterior = line(p.exterior())?;
            let interiors = p.interiors().iter().map(line).collect::<Result<Vec<_>>>()?;
            Ok(Polygon::new(exterior, interiors))
        };

        Ok(match geometry {
            Geometry::Point(p) => Geometry::Point(Point(self.apply_coord(p.0)?)),
            Geometry::MultiPoint(mp) => Geometry::MultiPoint(MultiPoint(
                mp.0.iter()
                    .map(|p| self.apply_coord(p.0).map(Point))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::LineString(ls) => Geometry::LineString(line(ls)?),
            Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString(
                mls.0.iter().map(line).collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Polygon(p) => Geometry::Polygon(polygon(p)?),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon(
                mp.0.iter().map(polygon).collect::<Result<Vec<_>>>()?,
            )),
            _ => {
                return Err(Error::UnsupportedGeometry(
                    "only points, lines and polygons can be reprojected".to_string(),
                ))
            }
        })
    }
}

/// Transform a single coordinate pair
pub fn reproject_coord(x: f64, y: f64, from: &CRS, to: &CRS) -> Result<(f64, f64)> {
    CoordTransform::new(from, to)?.apply(x, y)
}

/// Reproject a geometry; returns an identical clone when the frames are equal
pub fn reproject_geometry(geometry: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
    CoordTransform::new(from, to)?.apply_geometry(geometry)
}

/// Reproject every feature of a layer and stamp the target CRS
pub fn reproject_layer(layer: &VectorLayer, to: &CRS) -> Result<VectorLayer> {
    let transform = CoordTransform::new(layer.crs(), to)?;

    let features: Vec<Feature> = layer
        .features()
        .into_par_iter()
        .map(|f| {
            Ok(Feature {
                geometry: transform.apply_geometry(&f.geometry)?,
                properties: f.properties.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        from = %layer.crs(),
        to = %to,
        features = features.len(),
        "reprojected layer"
    );

    VectorLayer::with_schema(to.clone(), layer.schema().clone(), features)
}

/// Bring `other` into `base`'s CRS so the two can be joined or overlaid
pub fn harmonize(base: &VectorLayer, other: &VectorLayer) -> Result<VectorLayer> {
    if base.crs() == other.crs() {
        return Ok(other.clone());
    }
    reproject_layer(other, base.crs())
}

/// Reprojection against identifiers resolved through a registry
#[derive(Debug, Clone, Copy)]
pub struct Reprojector<'r> {
    registry: &'r CrsRegistry,
}

impl<'r> Reprojector<'r> {
    pub fn new(registry: &'r CrsRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r CrsRegistry {
        self.registry
    }

    /// Reproject a geometry between two identifiers
    pub fn geometry(&self, geometry: &Geometry<f64>, from: &str, to: &str) -> Result<Geometry<f64>> {
        let from = self.registry.resolve(from)?;
        let to = self.registry.resolve(to)?;
        reproject_geometry(geometry, &from, &to)
    }

    /// Reproject a layer to the CRS named by `identifier`
    pub fn to_identifier(&self, layer: &VectorLayer, identifier: &str) -> Result<VectorLayer> {
        let target = self.registry.resolve(identifier)?;
        reproject_layer(layer, &target)
    }
}

/// Parameters for layer reprojection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReprojectParams {
    /// Target CRS
    pub target: CRS,
}

/// Layer reprojection algorithm
#[derive(Debug, Clone, Default)]
pub struct Reproject;

impl Algorithm for Reproject {
    type Input = VectorLayer;
    type Output = VectorLayer;
    type Params = ReprojectParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Reproject"
    }

    fn description(&self) -> &'static str {
        "Transform every feature of a layer into another coordinate reference system"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        reproject_layer(&input, &params.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, point, polygon};
    use terrabind_core::crs::{CrsDefinition, Datum};

    fn coords_of(g: &Geometry<f64>) -> Vec<Coord<f64>> {
        let mut out = Vec::new();
        terrabind_core::vector::for_each_coord(g, |c| out.push(c));
        out
    }

    #[test]
    fn test_identity_returns_same_geometry() {
        let g: Geometry<f64> = line_string![(x: 1.0, y: 2.0), (x: 3.0, y: 4.0)].into();
        let out = reproject_geometry(&g, &CRS::wgs84(), &CRS::wgs84()).unwrap();
        assert_eq!(out, g);
    }

    #[test]
    fn test_wgs84_to_utm_and_back() {
        let utm = CRS::utm(30, true).unwrap();
        let (e, n) = reproject_coord(-3.7037, 40.4168, &CRS::wgs84(), &utm).unwrap();
        assert_relative_eq!(e, 440_298.94, epsilon = 1.0);
        assert_relative_eq!(n, 4_474_257.31, epsilon = 1.0);

        let (lon, lat) = reproject_coord(e, n, &utm, &CRS::wgs84()).unwrap();
        assert_relative_eq!(lon, -3.7037, epsilon = 1e-7);
        assert_relative_eq!(lat, 40.4168, epsilon = 1e-7);
    }

    #[test]
    fn test_web_mercator_to_utm_goes_through_geographic() {
        let utm = CRS::utm(33, true).unwrap();
        let (x, y) = reproject_coord(15.0, 45.0, &CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let (e, n) = reproject_coord(x, y, &CRS::web_mercator(), &utm).unwrap();
        let (e_direct, n_direct) = reproject_coord(15.0, 45.0, &CRS::wgs84(), &utm).unwrap();
        assert_relative_eq!(e, e_direct, epsilon = 1e-3);
        assert_relative_eq!(n, n_direct, epsilon = 1e-3);
    }

    #[test]
    fn test_datum_shift_moves_coordinates() {
        let ed50 = CRS::new("EPSG:4230", CrsDefinition::geographic(Datum::ed50()));
        let (lon, lat) = reproject_coord(2.0, 41.0, &ed50, &CRS::wgs84()).unwrap();
        // ED50 -> WGS84 in Iberia shifts roughly 100 m south-west
        assert!(lon < 2.0 && lon > 1.99, "lon {}", lon);
        assert!(lat < 41.0 && lat > 40.99, "lat {}", lat);

        let (lon2, lat2) = reproject_coord(lon, lat, &CRS::wgs84(), &ed50).unwrap();
        assert_relative_eq!(lon2, 2.0, epsilon = 1e-6);
        assert_relative_eq!(lat2, 41.0, epsilon = 1e-6);
    }

    #[test]
    fn test_local_frame_is_unsupported() {
        let err = reproject_coord(0.0, 0.0, &CRS::local(), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransform { .. }));
        assert!(reproject_coord(0.0, 0.0, &CRS::local(), &CRS::local()).is_ok());
    }

    #[test]
    fn test_pole_in_web_mercator_is_rejected() {
        let err = reproject_coord(0.0, 90.0, &CRS::wgs84(), &CRS::web_mercator()).unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinate { .. }));
    }

    #[test]
    fn test_antimeridian_not_unwrapped() {
        let g: Geometry<f64> = line_string![(x: 179.5, y: 10.0), (x: -179.5, y: 10.0)].into();
        let out = reproject_geometry(&g, &CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let c = coords_of(&out);
        assert!(c[0].x > 0.0);
        assert!(c[1].x < 0.0);
    }

    #[test]
    fn test_reproject_layer_stamps_crs() {
        let layer = VectorLayer::new(
            CRS::wgs84(),
            vec![
                Feature::new(point!(x: 10.0, y: 50.0)).with_property("id", 1.0),
                Feature::new(point!(x: 11.0, y: 51.0)).with_property("id", 2.0),
            ],
        )
        .unwrap();
        let out = reproject_layer(&layer, &CRS::web_mercator()).unwrap();
        assert_eq!(out.crs(), &CRS::web_mercator());
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(1).unwrap().get_property("id"), layer.get(1).unwrap().get_property("id"));
        assert!(layer.crs().is_geographic());
    }

    #[test]
    fn test_harmonize_and_reprojector() {
        let registry = CrsRegistry::with_defaults();
        let poly: Geometry<f64> =
            polygon![(x: 10.0, y: 50.0), (x: 10.1, y: 50.0), (x: 10.1, y: 50.1), (x: 10.0, y: 50.0)].into();
        let base = VectorLayer::new(CRS::web_mercator(), vec![]).unwrap();
        let other = VectorLayer::new(CRS::wgs84(), vec![Feature::new(poly.clone())]).unwrap();

        let harmonized = harmonize(&base, &other).unwrap();
        assert_eq!(harmonized.crs(), base.crs());

        let reprojector = Reprojector::new(&registry);
        let via_id = reprojector.to_identifier(&other, "3857").unwrap();
        assert_eq!(via_id.get(0).unwrap().geometry, harmonized.get(0).unwrap().geometry);

        let back = reprojector.geometry(&via_id.get(0).unwrap().geometry, "EPSG:3857", "CRS84").unwrap();
        for (a, b) in coords_of(&back).iter().zip(coords_of(&poly)) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        }

        assert!(matches!(
            reprojector.to_identifier(&other, "EPSG:999999"),
            Err(Error::UnknownCrs(_))
        ));
    }

    #[test]
    fn test_algorithm_impl() {
        let layer = VectorLayer::new(CRS::wgs84(), vec![Feature::new(point!(x: 0.0, y: 0.0))]).unwrap();
        let out = Reproject
            .execute(layer, ReprojectParams { target: CRS::web_mercator() })
            .unwrap();
        let c = coords_of(&out.get(0).unwrap().geometry);
        assert_relative_eq!(c[0].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c[0].y, 0.0, epsilon = 1e-9);
        assert_eq!(Reproject.name(), "Reproject");
    }
}
