//! Algebraic properties that must hold for any input layers:
//! CRS round trips, join cardinality, overlay set algebra, buffer
//! monotonicity and sampling determinism.

use geo::{polygon, Area, CoordsIter, Geometry, Point, Relate};
use ndarray::Array2;
use terrabind_algorithms::raster::{sample_points, sample_value};
use terrabind_algorithms::reproject::{reproject_geometry, reproject_layer};
use terrabind_algorithms::vector::{
    buffer, overlay, spatial_join, BufferParams, JoinOptions, OverlayMode, OverlayOptions, SpatialPredicate,
};
use terrabind_core::raster::{GeoTransform, Raster};
use terrabind_core::vector::{Feature, VectorLayer};
use terrabind_core::{CrsRegistry, CRS};

fn square(x: f64, y: f64, size: f64) -> geo::Polygon<f64> {
    polygon![(x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size)]
}

fn polygons(crs: CRS, squares: &[(f64, f64, f64)]) -> VectorLayer {
    let features = squares
        .iter()
        .enumerate()
        .map(|(i, &(x, y, s))| Feature::new(square(x, y, s)).with_property("id", i as f64))
        .collect();
    VectorLayer::new(crs, features).unwrap()
}

fn total_area(layer: &VectorLayer) -> f64 {
    layer.iter().map(|f| f.geometry.unsigned_area()).sum()
}

fn assert_coords_close(a: &Geometry<f64>, b: &Geometry<f64>, tol: f64) {
    assert_eq!(a.coords_count(), b.coords_count());
    for (p, q) in a.coords_iter().zip(b.coords_iter()) {
        assert!(
            (p.x - q.x).abs() < tol && (p.y - q.y).abs() < tol,
            "({}, {}) vs ({}, {})",
            p.x,
            p.y,
            q.x,
            q.y
        );
    }
}

// ---------------------------------------------------------------------------
// CRS round trip

#[test]
fn crs_round_trip_across_frames() {
    let registry = CrsRegistry::with_defaults();
    let wgs84 = registry.resolve("EPSG:4326").unwrap();

    // Around Madrid and London, where every target frame is well defined
    let madrid: Geometry<f64> = polygon![
        (x: -3.75, y: 40.35),
        (x: -3.60, y: 40.35),
        (x: -3.60, y: 40.48),
        (x: -3.75, y: 40.48),
    ]
    .into();
    let london: Geometry<f64> = Point::new(-0.1276, 51.5072).into();

    let cases = [
        (&madrid, "EPSG:32630"),
        (&madrid, "EPSG:25830"),
        (&madrid, "EPSG:23030"),
        (&madrid, "EPSG:3857"),
        (&madrid, "EPSG:4230"),
        (&london, "EPSG:27700"),
        (&london, "EPSG:4277"),
    ];

    for (geom, target) in cases {
        let to = registry.resolve(target).unwrap();
        let there = reproject_geometry(geom, &wgs84, &to).unwrap();
        let back = reproject_geometry(&there, &to, &wgs84).unwrap();
        assert_coords_close(geom, &back, 1e-6);
    }
}

#[test]
fn crs_round_trip_of_projected_layer() {
    let utm = CRS::utm(30, true).unwrap();
    let layer = polygons(utm.clone(), &[(440_000.0, 4_470_000.0, 500.0), (441_000.0, 4_471_000.0, 250.0)]);

    let geographic = reproject_layer(&layer, &CRS::wgs84()).unwrap();
    let back = reproject_layer(&geographic, &utm).unwrap();

    assert_eq!(back.crs(), &utm);
    assert_eq!(back.len(), layer.len());
    for (a, b) in layer.iter().zip(back.iter()) {
        // Metres
        assert_coords_close(&a.geometry, &b.geometry, 1e-2);
        assert_eq!(a.properties, b.properties);
    }
}

// ---------------------------------------------------------------------------
// Join cardinality

fn match_counts(base: &VectorLayer, candidate: &VectorLayer, predicate: SpatialPredicate) -> Vec<usize> {
    base.iter()
        .map(|b| candidate.iter().filter(|c| predicate.test(&b.geometry, &c.geometry)).count())
        .collect()
}

#[test]
fn join_cardinality() {
    let crs = CRS::local();
    let base = polygons(
        crs.clone(),
        &[(0.0, 0.0, 4.0), (10.0, 10.0, 2.0), (3.0, 3.0, 4.0), (50.0, 50.0, 1.0)],
    );
    let candidate = polygons(
        crs,
        &[(1.0, 1.0, 1.0), (2.0, 2.0, 3.0), (4.0, 0.0, 2.0), (11.0, 11.0, 0.5), (6.0, 6.0, 1.0)],
    );

    for predicate in [
        SpatialPredicate::Intersects,
        SpatialPredicate::Within,
        SpatialPredicate::Contains,
        SpatialPredicate::Touches,
        SpatialPredicate::Crosses,
        SpatialPredicate::Disjoint,
    ] {
        let counts = match_counts(&base, &candidate, predicate);

        let inner = spatial_join(&base, &candidate, predicate, &JoinOptions::inner()).unwrap();
        assert_eq!(inner.len(), counts.iter().sum::<usize>(), "inner {}", predicate);

        let left = spatial_join(&base, &candidate, predicate, &JoinOptions::left()).unwrap();
        assert_eq!(
            left.len(),
            counts.iter().map(|&m| m.max(1)).sum::<usize>(),
            "left {}",
            predicate
        );
    }
}

// ---------------------------------------------------------------------------
// Overlay set algebra

fn overlay_layers() -> (VectorLayer, VectorLayer) {
    let crs = CRS::local();
    let a = polygons(crs.clone(), &[(0.0, 0.0, 4.0), (6.0, 0.0, 3.0), (20.0, 20.0, 1.0)]);
    let b = polygons(crs, &[(2.0, 2.0, 6.0), (7.0, -1.0, 1.0)]);
    (a, b)
}

#[test]
fn overlay_partition_law() {
    let (a, b) = overlay_layers();
    let options = OverlayOptions::default();

    let inter = overlay(&a, &b, OverlayMode::Intersection, &options).unwrap();
    let diff = overlay(&a, &b, OverlayMode::Difference, &options).unwrap();
    approx::assert_relative_eq!(total_area(&inter) + total_area(&diff), total_area(&a), epsilon = 1e-9);
}

#[test]
fn overlay_union_area() {
    let (a, b) = overlay_layers();
    let options = OverlayOptions::default();

    let inter = overlay(&a, &b, OverlayMode::Intersection, &options).unwrap();
    let union = overlay(&a, &b, OverlayMode::Union, &options).unwrap();
    approx::assert_relative_eq!(
        total_area(&union),
        total_area(&a) + total_area(&b) - total_area(&inter),
        epsilon = 1e-9
    );

    let sym = overlay(&a, &b, OverlayMode::SymmetricDifference, &options).unwrap();
    approx::assert_relative_eq!(
        total_area(&sym),
        total_area(&union) - total_area(&inter),
        epsilon = 1e-9
    );
}

// ---------------------------------------------------------------------------
// Buffer monotonicity

#[test]
fn buffer_monotonic_in_distance() {
    let crs = CRS::utm(33, true).unwrap();
    let layer = VectorLayer::new(
        crs.clone(),
        vec![
            Feature::new(Point::new(500_000.0, 5_000_000.0)),
            Feature::new(Point::new(500_010.0, 5_000_003.0)),
        ],
    )
    .unwrap();

    let distances = [0.5, 1.0, 2.5, 10.0];
    let buffered: Vec<VectorLayer> = distances
        .iter()
        .map(|&d| buffer(&layer, &BufferParams::new(d), &crs).unwrap())
        .collect();

    for pair in buffered.windows(2) {
        for (small, large) in pair[0].iter().zip(pair[1].iter()) {
            assert!(large.geometry.relate(&small.geometry).is_contains());
            assert!(large.geometry.unsigned_area() > small.geometry.unsigned_area());
        }
    }
}

#[test]
fn buffer_monotonic_for_polygons() {
    let crs = CRS::local();
    let layer = polygons(crs.clone(), &[(0.0, 0.0, 3.0), (10.0, 0.0, 1.0)]);

    let unchanged = buffer(&layer, &BufferParams::new(0.0), &crs).unwrap();
    let grown = buffer(&layer, &BufferParams::new(1.5), &crs).unwrap();
    for (small, large) in unchanged.iter().zip(grown.iter()) {
        assert!(large.geometry.relate(&small.geometry).is_contains());
    }
}

// ---------------------------------------------------------------------------
// Sampling determinism

#[test]
fn sampling_is_deterministic() {
    let data = Array2::from_shape_fn((16, 16), |(r, c)| if (r + c) % 5 == 0 { -1.0 } else { (r * 16 + c) as f64 });
    let raster = Raster::from_array(data, GeoTransform::new(100.0, 216.0, 7.0, -7.0), CRS::local(), -1.0).unwrap();

    let points: Vec<Point<f64>> = (0..200)
        .map(|i| {
            let t = i as f64;
            Point::new(90.0 + (t * 7.31) % 140.0, 90.0 + (t * 3.77) % 140.0)
        })
        .collect();

    let first = sample_points(&raster, &points);
    let second = sample_points(&raster, &points);
    assert_eq!(first, second);

    for (p, v) in &first {
        assert_eq!(sample_value(&raster, p.x(), p.y()), *v);
    }
}
