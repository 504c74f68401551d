//! Spatial join
//!
//! Attaches candidate attributes to base features that satisfy a spatial
//! predicate. Output geometry is the base geometry; output rows are ordered
//! by base index, then candidate index, whatever the evaluation order.

use super::index::BoxIndex;
use super::predicate::SpatialPredicate;
use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use terrabind_core::vector::{BoundingBox, Feature, KeyCollision, Schema, VectorLayer};
use terrabind_core::{Algorithm, Error, Result};
use tracing::debug;

/// Which base features survive a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinHow {
    /// One row per matching pair; unmatched base features are dropped
    #[default]
    Inner,
    /// Like `Inner`, plus one row with null candidate attributes per unmatched base feature
    Left,
}

/// Join configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinOptions {
    pub how: JoinHow,
    /// Handling of attribute names present on both sides
    pub collision: KeyCollision,
}

impl JoinOptions {
    pub fn inner() -> Self {
        Self::default()
    }

    pub fn left() -> Self {
        Self { how: JoinHow::Left, ..Self::default() }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.collision = KeyCollision::Suffix(suffix.into());
        self
    }
}

/// Candidate indices matching each base feature, ascending
pub(crate) fn match_pairs(
    base: &VectorLayer,
    candidate: &VectorLayer,
    predicate: SpatialPredicate,
) -> Vec<Vec<usize>> {
    let index = predicate.requires_overlap().then(|| BoxIndex::from_layer(candidate));
    let candidates = candidate.features();

    base.features()
        .par_iter()
        .map(|b| {
            let pool: Vec<usize> = match &index {
                Some(index) => match BoundingBox::of(&b.geometry) {
                    Some(bbox) => index.query(&bbox),
                    None => Vec::new(),
                },
                None => (0..candidates.len()).collect(),
            };
            pool.into_iter()
                .filter(|&j| predicate.test(&b.geometry, &candidates[j].geometry))
                .collect::<Vec<usize>>()
        })
        .collect()
}

/// Join `candidate` attributes onto `base` features related by `predicate`.
///
/// Both layers must share a CRS. The output schema is the union of both
/// schemas with collisions resolved by `options.collision`.
pub fn spatial_join(
    base: &VectorLayer,
    candidate: &VectorLayer,
    predicate: SpatialPredicate,
    options: &JoinOptions,
) -> Result<VectorLayer> {
    base.ensure_same_crs(candidate)?;
    let merge = Schema::merge(base.schema(), candidate.schema(), &options.collision)?;

    let matches = match_pairs(base, candidate, predicate);

    let mut rows = Vec::new();
    let mut pairs = 0usize;
    for (feature, hits) in base.iter().zip(&matches) {
        if hits.is_empty() {
            if options.how == JoinHow::Left {
                rows.push(Feature {
                    geometry: feature.geometry.clone(),
                    properties: merge.combine(Some(&feature.properties), None),
                });
            }
            continue;
        }
        for &j in hits {
            let other = &candidate.features()[j];
            rows.push(Feature {
                geometry: feature.geometry.clone(),
                properties: merge.combine(Some(&feature.properties), Some(&other.properties)),
            });
        }
        pairs += hits.len();
    }

    debug!(
        %predicate,
        how = ?options.how,
        base = base.len(),
        candidates = candidate.len(),
        pairs,
        rows = rows.len(),
        "spatial join"
    );

    VectorLayer::with_schema(base.crs().clone(), merge.into_schema(), rows)
}

/// Parameters for [`SpatialJoin`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialJoinParams {
    pub predicate: SpatialPredicate,
    pub options: JoinOptions,
}

/// Spatial join algorithm over a (base, candidate) pair of layers
#[derive(Debug, Clone, Default)]
pub struct SpatialJoin;

impl Algorithm for SpatialJoin {
    type Input = (VectorLayer, VectorLayer);
    type Output = VectorLayer;
    type Params = SpatialJoinParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SpatialJoin"
    }

    fn description(&self) -> &'static str {
        "Attach attributes of candidate features related to each base feature by a spatial predicate"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (base, candidate) = input;
        spatial_join(&base, &candidate, params.predicate, &params.options)
    }
}
