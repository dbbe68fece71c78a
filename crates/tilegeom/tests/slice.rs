// Integration tests for stripe clipping: tile assignment, buffer overshoot,
// world wraparound, filled tiles and area coverage.

mod common;

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use common::{covered_area, rect_ring, seq, slice_polygon, BUFFER};
use geo::{Coord, Rect};
use tilegeom::geometry::signed_area;
use tilegeom::{slice, CoordSeq, Geometry, PolygonRings, TileCoord, ZoomExtents, TILE_SIZE};

#[test]
fn three_by_three_square_fills_only_center() {
    let extents = ZoomExtents::world(3);
    let square = Geometry::Polygon(PolygonRings::new(rect_ring(1.5, 1.5, 3.5, 3.5), vec![]));
    let sliced = slice_polygon(&square, 3, &extents);

    let mut tiles: Vec<_> = sliced.tile_data().keys().copied().collect();
    tiles.sort();
    let mut expected = Vec::new();
    for x in 1..=3 {
        for y in 1..=3 {
            if (x, y) != (2, 2) {
                expected.push(TileCoord::new(x, y, 3));
            }
        }
    }
    assert_eq!(tiles, expected);
    assert_eq!(sliced.filled_tiles().collect::<Vec<_>>(), vec![TileCoord::new(2, 2, 3)]);
    assert_relative_eq!(covered_area(&sliced), 4.0 * TILE_SIZE * TILE_SIZE, max_relative = 1e-9);
}

#[test]
fn boundary_fragments_are_closed_rings() {
    let extents = ZoomExtents::world(3);
    let square = Geometry::Polygon(PolygonRings::new(rect_ring(1.5, 1.5, 3.5, 3.5), vec![]));
    let sliced = slice_polygon(&square, 3, &extents);
    for groups in sliced.tile_data().values() {
        for ring in groups.iter().flatten() {
            assert!(ring.len() >= 4);
            assert_eq!(ring.first(), ring.last());
            assert!(signed_area(ring) > 0.0);
        }
    }
}

#[test]
fn line_overshoot_matches_buffer_on_both_sides() {
    let extents = ZoomExtents::world(1);
    let line = seq(&[(0.5, 0.5), (1.5, 0.5)]);
    let sliced = slice(&[vec![line]], BUFFER, false, 1, &extents).unwrap();

    let left = &sliced.tile_data()[&TileCoord::new(0, 0, 1)][0][0];
    let right = &sliced.tile_data()[&TileCoord::new(1, 0, 1)][0][0];
    assert_eq!(left, &seq(&[(128.0, 128.0), (260.0, 128.0)]));
    assert_eq!(right, &seq(&[(-4.0, 128.0), (128.0, 128.0)]));
    assert_eq!(sliced.tile_data().len(), 2);
}

#[test]
fn line_across_antimeridian_wraps_onto_same_tile() {
    let extents = ZoomExtents::world(0);
    let line = seq(&[(-0.001, 0.5), (1.001, 0.5)]);
    let sliced = slice(&[vec![line]], BUFFER, false, 0, &extents).unwrap();

    let tiles: Vec<_> = sliced.tile_data().keys().copied().collect();
    assert_eq!(tiles, vec![TileCoord::new(0, 0, 0)]);

    let fragments: Vec<&CoordSeq> = sliced.tile_data()[&TileCoord::new(0, 0, 0)].iter().flatten().collect();
    assert_eq!(fragments.len(), 3);
    let min_x = fragments.iter().flat_map(|f| f.iter()).map(|c| c.x).fold(f64::INFINITY, f64::min);
    let max_x = fragments.iter().flat_map(|f| f.iter()).map(|c| c.x).fold(f64::NEG_INFINITY, f64::max);
    assert_relative_eq!(min_x, -4.0, epsilon = 1e-9);
    assert_relative_eq!(max_x, 260.0, epsilon = 1e-9);
}

#[test]
fn polygon_across_antimeridian_keeps_its_area() {
    let extents = ZoomExtents::world(1);
    let square = Geometry::Polygon(PolygonRings::new(rect_ring(-0.5, 0.5, 0.5, 1.5), vec![]));
    let sliced = slice_polygon(&square, 1, &extents);

    assert!(sliced.tile_data().keys().all(|tile| tile.x < 2));
    assert!(sliced.tile_data().contains_key(&TileCoord::new(1, 0, 1)));
    assert!(sliced.tile_data().contains_key(&TileCoord::new(0, 1, 1)));
    assert_relative_eq!(covered_area(&sliced), TILE_SIZE * TILE_SIZE, max_relative = 1e-9);
}

#[test]
fn hole_removes_filled_tiles_and_gets_fill_shell() {
    let extents = ZoomExtents::world(3);
    let polygon = Geometry::Polygon(PolygonRings::new(
        rect_ring(0.5, 0.5, 5.5, 5.5),
        vec![rect_ring(1.5, 1.5, 4.5, 4.5)],
    ));
    let sliced = slice_polygon(&polygon, 3, &extents);

    // tiles wholly inside the hole are neither filled nor detailed
    for x in 2..=3 {
        for y in 2..=3 {
            let tile = TileCoord::new(x, y, 3);
            assert!(!sliced.tile_data().contains_key(&tile), "{tile} has detail");
            assert!(sliced.filled_tiles().all(|t| t != tile), "{tile} is filled");
        }
    }

    // hole detail inside an otherwise filled tile sits in a full-tile shell
    let group = &sliced.tile_data()[&TileCoord::new(2, 1, 3)][0];
    assert_eq!(group.len(), 2);
    assert_eq!(group[0][0], Coord { x: -4.0, y: -4.0 });
    assert_eq!(group[0][2], Coord { x: 260.0, y: 260.0 });

    assert_relative_eq!(covered_area(&sliced), 16.0 * TILE_SIZE * TILE_SIZE, max_relative = 1e-9);
}

#[test]
fn notched_polygon_fills_only_solid_rows() {
    // C shape open to the right: both arms span columns 2 and 3, the notch
    // covers column 3 completely
    let extents = ZoomExtents::world(4);
    let ring = seq(&[
        (0.5, 0.5),
        (4.5, 0.5),
        (4.5, 2.5),
        (2.5, 2.5),
        (2.5, 6.5),
        (4.5, 6.5),
        (4.5, 8.5),
        (0.5, 8.5),
        (0.5, 0.5),
    ]);
    let polygon = Geometry::Polygon(PolygonRings::new(ring, vec![]));
    let sliced = slice_polygon(&polygon, 4, &extents);

    let mut filled: Vec<_> = sliced.filled_tiles().collect();
    filled.sort();
    let expected: Vec<_> = [(1, 1), (1, 2), (1, 3), (1, 4), (1, 5), (1, 6), (1, 7), (2, 1), (2, 7), (3, 1), (3, 7)]
        .into_iter()
        .map(|(x, y)| TileCoord::new(x, y, 4))
        .collect();
    assert_eq!(filled, expected);
    for y in 3..=5 {
        assert!(!sliced.tile_data().contains_key(&TileCoord::new(3, y, 4)));
    }
    assert_relative_eq!(covered_area(&sliced), 24.0 * TILE_SIZE * TILE_SIZE, max_relative = 1e-9);
}

#[test]
fn extents_clip_rows_and_columns() {
    let bounds = Rect::new(Coord { x: 0.25, y: 0.25 }, Coord { x: 0.5, y: 0.75 });
    let extents = ZoomExtents::from_world_rect(2, bounds);
    let square = Geometry::Polygon(PolygonRings::new(rect_ring(0.5, 0.5, 3.5, 3.5), vec![]));
    let sliced = slice_polygon(&square, 2, &extents);

    let tiles: Vec<_> = sliced.tile_data().keys().copied().chain(sliced.filled_tiles()).collect();
    assert!(!tiles.is_empty());
    for tile in tiles {
        assert_eq!(tile.x, 1);
        assert!((1..=2).contains(&tile.y), "{tile} outside extents");
    }
}

#[test]
fn degenerate_edges_are_ignored() {
    let extents = ZoomExtents::world(2);
    let line = seq(&[(0.5, 0.5), (0.5, 0.5), (1.5, 0.5), (1.5, 0.5)]);
    let sliced = slice(&[vec![line]], 0.0, false, 2, &extents).unwrap();
    assert_eq!(sliced.tile_data().len(), 2);
    let right = &sliced.tile_data()[&TileCoord::new(1, 0, 2)][0][0];
    assert_eq!(right, &seq(&[(0.0, 128.0), (128.0, 128.0)]));
}

#[test]
fn lines_do_not_report_filled_tiles() {
    let extents = ZoomExtents::world(3);
    let ring = rect_ring(1.5, 1.5, 4.5, 4.5);
    let sliced = slice(&[vec![ring]], BUFFER, false, 3, &extents).unwrap();
    assert_eq!(sliced.filled_tiles().count(), 0);
    assert!(!sliced.tile_data().contains_key(&TileCoord::new(3, 3, 3)));
}

#[test]
fn polygon_spanning_every_column_still_slices() {
    let z = 6;
    let extents = ZoomExtents::world(z);
    let band = Geometry::Polygon(PolygonRings::new(rect_ring(0.5, 20.5, 63.5, 40.5), vec![]));
    let sliced = slice_polygon(&band, z, &extents);

    let columns: BTreeSet<u32> = sliced.tile_data().keys().map(|tile| tile.x).collect();
    assert_eq!(columns.len(), 64);
    assert_eq!(sliced.filled_tiles().count(), 62 * 19);
    assert!(sliced.filled_tiles().all(|tile| (1..=62).contains(&tile.x) && (21..=39).contains(&tile.y)));
    assert_relative_eq!(covered_area(&sliced), 63.0 * 20.0 * TILE_SIZE * TILE_SIZE, max_relative = 1e-9);
}
