//! Helpers shared by the slicing test binaries.

#![allow(dead_code)]

use geo::Coord;
use tilegeom::geometry::signed_area;
use tilegeom::{extract_groups, slice, CoordSeq, Geometry, TiledFragmentSet, ZoomExtents, TILE_SIZE};

pub const BUFFER: f64 = 4.0 / 256.0;

pub fn seq(points: &[(f64, f64)]) -> CoordSeq { points.iter().map(|&(x, y)| Coord { x, y }).collect() }

/// Axis-aligned rectangle ring, clockwise on screen.
pub fn rect_ring(x0: f64, y0: f64, x1: f64, y1: f64) -> CoordSeq {
    seq(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)])
}

pub fn slice_polygon(geometry: &Geometry, z: u8, extents: &ZoomExtents) -> TiledFragmentSet {
    let groups = extract_groups(geometry, 0.0).unwrap();
    slice(&groups, BUFFER, true, z, extents).unwrap()
}

/// Sutherland-Hodgman pass against one edge of the tile.
fn clip_against(
    ring: &[Coord<f64>],
    inside: impl Fn(Coord<f64>) -> bool,
    cross: impl Fn(Coord<f64>, Coord<f64>) -> Coord<f64>,
) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    let Some(&last) = ring.last() else { return out };
    let mut prev = last;
    for &curr in ring {
        match (inside(prev), inside(curr)) {
            (true, true) => out.push(curr),
            (true, false) => out.push(cross(prev, curr)),
            (false, true) => {
                out.push(cross(prev, curr));
                out.push(curr);
            }
            (false, false) => {}
        }
        prev = curr;
    }
    out
}

fn at_x(a: Coord<f64>, b: Coord<f64>, x: f64) -> Coord<f64> {
    Coord { x, y: a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x) }
}

fn at_y(a: Coord<f64>, b: Coord<f64>, y: f64) -> Coord<f64> {
    Coord { x: a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y), y }
}

/// Area of a ring inside the unbuffered tile, in square pixels.
pub fn area_in_tile(ring: &[Coord<f64>]) -> f64 {
    let s = TILE_SIZE;
    let ring = clip_against(ring, |c| c.x >= 0.0, |a, b| at_x(a, b, 0.0));
    let ring = clip_against(&ring, |c| c.x <= s, |a, b| at_x(a, b, s));
    let ring = clip_against(&ring, |c| c.y >= 0.0, |a, b| at_y(a, b, 0.0));
    let ring = clip_against(&ring, |c| c.y <= s, |a, b| at_y(a, b, s));
    signed_area(&ring).abs()
}

/// Area covered by all fragments and filled tiles, in square pixels.
pub fn covered_area(sliced: &TiledFragmentSet) -> f64 {
    let mut total = 0.0;
    for groups in sliced.tile_data().values() {
        for group in groups {
            let (shell, holes) = group.split_first().unwrap();
            total += area_in_tile(shell) - holes.iter().map(|hole| area_in_tile(hole)).sum::<f64>();
        }
    }
    total + sliced.filled_tiles().count() as f64 * TILE_SIZE * TILE_SIZE
}
