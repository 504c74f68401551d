//! Features and vector layers

use super::attribute::{AttributeValue, Schema};
use super::geometry::{family_of, for_each_coord, normalize, GeometryFamily};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::Geometry;
use std::collections::HashMap;

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Geometry<f64>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with no attributes
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: HashMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// An ordered, immutable collection of features sharing one CRS, one schema
/// and one geometry family.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    crs: CRS,
    schema: Schema,
    /// `None` only for an empty layer
    family: Option<GeometryFamily>,
    features: Vec<Feature>,
}

impl VectorLayer {
    /// Build a layer, inferring its schema from the features
    pub fn new(crs: CRS, features: Vec<Feature>) -> Result<Self> {
        let schema = Schema::infer(features.iter().map(|f| &f.properties))?;
        Self::with_schema(crs, schema, features)
    }

    /// Build a layer against a declared schema
    pub fn with_schema(crs: CRS, schema: Schema, features: Vec<Feature>) -> Result<Self> {
        let mut family: Option<GeometryFamily> = None;
        let mut checked = Vec::with_capacity(features.len());

        for (index, feature) in features.into_iter().enumerate() {
            let Feature { geometry, properties } = feature;
            let geometry = normalize(geometry)?;

            let found = family_of(&geometry)?;
            match family {
                None => family = Some(found),
                Some(expected) if expected != found => {
                    return Err(Error::MixedGeometry {
                        expected: expected.to_string(),
                        found: format!("{} at feature {}", found, index),
                    });
                }
                Some(_) => {}
            }

            let mut domain = Ok(());
            for_each_coord(&geometry, |c| {
                if domain.is_ok() {
                    domain = crs.check_coord(c.x, c.y);
                }
            });
            domain?;

            schema.check(&properties)?;
            checked.push(Feature { geometry, properties });
        }

        Ok(Self { crs, schema, family, features: checked })
    }

    /// An empty layer with a declared schema
    pub fn empty(crs: CRS, schema: Schema) -> Self {
        Self { crs, schema, family: None, features: Vec::new() }
    }

    /// Same schema and CRS, new features
    pub fn derive(&self, features: Vec<Feature>) -> Result<Self> {
        Self::with_schema(self.crs.clone(), self.schema.clone(), features)
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn family(&self) -> Option<GeometryFamily> {
        self.family
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Fail with [`Error::CrsMismatch`] unless both layers share a frame
    pub fn ensure_same_crs(&self, other: &VectorLayer) -> Result<()> {
        if self.crs == other.crs {
            Ok(())
        } else {
            Err(Error::CrsMismatch(self.crs.to_string(), other.crs.to_string()))
        }
    }
}

impl IntoIterator for VectorLayer {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a VectorLayer {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::attribute::{Field, FieldType};
    use geo_types::{line_string, point, Coord, Line};

    #[test]
    fn test_layer_infers_schema() {
        let layer = VectorLayer::new(
            CRS::local(),
            vec![
                Feature::new(point!(x: 0.0, y: 0.0)).with_property("name", "a"),
                Feature::new(point!(x: 1.0, y: 1.0)).with_property("pop", 12.0),
            ],
        )
        .unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.family(), Some(GeometryFamily::Point));
        assert_eq!(layer.schema().len(), 2);
        assert_eq!(layer.get(1).unwrap().get_property("pop"), Some(&AttributeValue::Number(12.0)));
    }

    #[test]
    fn test_mixed_geometry_rejected() {
        let result = VectorLayer::new(
            CRS::local(),
            vec![
                Feature::new(point!(x: 0.0, y: 0.0)),
                Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
            ],
        );
        assert!(matches!(result, Err(Error::MixedGeometry { .. })));
    }

    #[test]
    fn test_lines_normalised() {
        let line = Line::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 });
        let layer = VectorLayer::new(CRS::local(), vec![Feature::new(line)]).unwrap();
        assert!(matches!(layer.get(0).unwrap().geometry, Geometry::LineString(_)));
        assert_eq!(layer.family(), Some(GeometryFamily::Line));
    }

    #[test]
    fn test_coordinate_domain_checked() {
        let result = VectorLayer::new(CRS::wgs84(), vec![Feature::new(point!(x: 10.0, y: 120.0))]);
        assert!(matches!(result, Err(Error::InvalidCoordinate { .. })));
    }

    #[test]
    fn test_declared_schema_enforced() {
        let schema = Schema::from_fields(vec![Field::new("id", FieldType::Number)]).unwrap();
        let bad = VectorLayer::with_schema(
            CRS::local(),
            schema.clone(),
            vec![Feature::new(point!(x: 0.0, y: 0.0)).with_property("id", "seven")],
        );
        assert!(matches!(bad, Err(Error::SchemaConflict { .. })));

        let empty = VectorLayer::empty(CRS::local(), schema);
        assert!(empty.is_empty());
        assert_eq!(empty.family(), None);
    }

    #[test]
    fn test_crs_guard() {
        let a = VectorLayer::new(CRS::local(), vec![]).unwrap();
        let b = VectorLayer::new(CRS::web_mercator(), vec![]).unwrap();
        assert!(matches!(a.ensure_same_crs(&b), Err(Error::CrsMismatch(_, _))));
        assert!(a.ensure_same_crs(&a.clone()).is_ok());
    }
}
