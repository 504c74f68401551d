//! Geometry families, normalisation and bounding boxes

use crate::error::{Error, Result};
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension family shared by all features of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryFamily {
    /// Point and MultiPoint
    Point,
    /// LineString and MultiLineString
    Line,
    /// Polygon and MultiPolygon
    Polygon,
}

impl fmt::Display for GeometryFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryFamily::Point => "points",
            GeometryFamily::Line => "lines",
            GeometryFamily::Polygon => "polygons",
        };
        f.write_str(name)
    }
}

/// Family of a supported geometry variant
pub fn family_of(geom: &Geometry<f64>) -> Result<GeometryFamily> {
    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(GeometryFamily::Point),
        Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
            Ok(GeometryFamily::Line)
        }
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
            Ok(GeometryFamily::Polygon)
        }
        Geometry::GeometryCollection(_) => Err(Error::UnsupportedGeometry(
            "geometry collections are not supported".to_string(),
        )),
    }
}

/// Rewrite `Line`, `Rect` and `Triangle` as the six supported variants
pub fn normalize(geom: Geometry<f64>) -> Result<Geometry<f64>> {
    Ok(match geom {
        Geometry::Line(l) => Geometry::LineString(LineString::new(vec![l.start, l.end])),
        Geometry::Rect(r) => Geometry::Polygon(r.to_polygon()),
        Geometry::Triangle(t) => Geometry::Polygon(t.to_polygon()),
        Geometry::GeometryCollection(_) => {
            return Err(Error::UnsupportedGeometry(
                "geometry collections are not supported".to_string(),
            ))
        }
        other => other,
    })
}

/// Visit every coordinate of a geometry in storage order
pub fn for_each_coord(geom: &Geometry<f64>, mut f: impl FnMut(Coord<f64>)) {
    visit(geom, &mut f);
}

fn visit(geom: &Geometry<f64>, f: &mut dyn FnMut(Coord<f64>)) {
    fn polygon(p: &Polygon<f64>, f: &mut dyn FnMut(Coord<f64>)) {
        p.exterior().0.iter().for_each(|c| f(*c));
        for ring in p.interiors() {
            ring.0.iter().for_each(|c| f(*c));
        }
    }

    match geom {
        Geometry::Point(p) => f(p.0),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(p.0)),
        Geometry::Line(l) => {
            f(l.start);
            f(l.end);
        }
        Geometry::LineString(ls) => ls.0.iter().for_each(|c| f(*c)),
        Geometry::MultiLineString(mls) => {
            for ls in &mls.0 {
                ls.0.iter().for_each(|c| f(*c));
            }
        }
        Geometry::Polygon(p) => polygon(p, f),
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                polygon(p, f);
            }
        }
        Geometry::Rect(r) => polygon(&r.to_polygon(), f),
        Geometry::Triangle(t) => polygon(&t.to_polygon(), f),
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                visit(g, f);
            }
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Bounding box of a geometry, `None` when it has no coordinates
    pub fn of(geom: &Geometry<f64>) -> Option<Self> {
        let mut bbox: Option<BoundingBox> = None;
        for_each_coord(geom, |c| {
            bbox = Some(match bbox {
                None => BoundingBox::new(c.x, c.y, c.x, c.y),
                Some(b) => BoundingBox::new(b.min_x.min(c.x), b.min_y.min(c.y), b.max_x.max(c.x), b.max_y.max(c.y)),
            });
        });
        bbox
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Closed-box overlap: boxes sharing only an edge or corner intersect
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grow every side by `d`
    pub fn expand(&self, d: f64) -> Self {
        Self::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }
}
