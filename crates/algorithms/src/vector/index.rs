//! Static bounding-box index
//!
//! Sort-and-sweep over feature envelopes. Narrows candidate pairs before
//! exact predicate evaluation; results are identical to an all-pairs scan.

use terrabind_core::vector::{BoundingBox, VectorLayer};

/// Envelopes sorted by `min_x`
#[derive(Debug, Clone, Default)]
pub struct BoxIndex {
    entries: Vec<(BoundingBox, usize)>,
    /// Widest envelope, bounds how far left a match can start
    max_width: f64,
}

impl BoxIndex {
    /// Index the envelopes in order; `None` entries (empty geometries) never match
    pub fn new<I>(boxes: I) -> Self
    where
        I: IntoIterator<Item = Option<BoundingBox>>,
    {
        let mut entries: Vec<(BoundingBox, usize)> = boxes
            .into_iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|b| (b, i)))
            .collect();
        entries.sort_by(|a, b| a.0.min_x.total_cmp(&b.0.min_x).then(a.1.cmp(&b.1)));
        let max_width = entries.iter().map(|(b, _)| b.width()).fold(0.0, f64::max);
        Self { entries, max_width }
    }

    /// Index every feature of a layer by position
    pub fn from_layer(layer: &VectorLayer) -> Self {
        Self::new(layer.iter().map(|f| BoundingBox::of(&f.geometry)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices whose envelope intersects `bbox` (closed), ascending
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        let lo = bbox.min_x - self.max_width;
        let start = self.entries.partition_point(|(b, _)| b.min_x < lo);
        let end = self.entries.partition_point(|(b, _)| b.min_x <= bbox.max_x);

        let mut hits: Vec<usize> = self.entries[start..end.max(start)]
            .iter()
            .filter(|(b, _)| b.intersects(bbox))
            .map(|(_, i)| *i)
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(boxes: &[Option<BoundingBox>], q: &BoundingBox) -> Vec<usize> {
        boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some_and(|b| b.intersects(q)))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_query_matches_naive_scan() {
        let mut boxes = Vec::new();
        for i in 0..20 {
            let x = ((i * 7) % 13) as f64;
            let y = ((i * 5) % 11) as f64;
            let w = 0.5 + (i % 4) as f64;
            boxes.push(Some(BoundingBox::new(x, y, x + w, y + w)));
        }
        boxes.push(None);

        let index = BoxIndex::new(boxes.clone());
        assert_eq!(index.len(), 20);

        for q in [
            BoundingBox::new(0.0, 0.0, 2.0, 2.0),
            BoundingBox::new(5.0, 3.0, 9.0, 4.0),
            BoundingBox::new(12.0, 10.0, 20.0, 20.0),
            BoundingBox::new(-5.0, -5.0, -1.0, -1.0),
            BoundingBox::new(3.0, 3.0, 3.0, 3.0),
        ] {
            assert_eq!(index.query(&q), naive(&boxes, &q), "query {:?}", q);
        }
    }

    #[test]
    fn test_edge_contact_counts() {
        let index = BoxIndex::new(vec![Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(index.query(&BoundingBox::new(1.0, 1.0, 2.0, 2.0)), vec![0]);
    }

    #[test]
    fn test_empty_index() {
        let index = BoxIndex::default();
        assert!(index.is_empty());
        assert!(index.query(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());
    }
}
