//! Cleanup applied to a geometry that failed to render.

use geo::BooleanOps;
use tilegeom::{CoordSeq, Geometry, PolygonRings};

/// Drop non-finite and repeated coordinates; for polygons also close rings
/// and resolve self-intersections by a union with nothing.
pub(crate) fn repair(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Point(_) => geometry.clone(),
        Geometry::MultiPoint(coords) => Geometry::MultiPoint(clean_seq(coords)),
        Geometry::Line(line) => Geometry::Line(clean_seq(line)),
        Geometry::MultiLine(lines) => {
            Geometry::MultiLine(lines.iter().map(|line| clean_seq(line)).filter(|line| line.len() >= 2).collect())
        }
        Geometry::Polygon(polygon) => repair_polygons(std::slice::from_ref(polygon)),
        Geometry::MultiPolygon(polygons) => repair_polygons(polygons),
        Geometry::Collection(children) => Geometry::Collection(children.iter().map(repair).collect()),
    }
}

fn clean_seq(seq: &[geo::Coord<f64>]) -> CoordSeq {
    let mut cleaned = CoordSeq::with_capacity(seq.len());
    for &c in seq {
        if !c.x.is_finite() || !c.y.is_finite() || cleaned.last() == Some(&c) {
            continue;
        }
        cleaned.push(c);
    }
    cleaned
}

fn clean_ring(ring: &[geo::Coord<f64>]) -> Option<CoordSeq> {
    let mut ring = clean_seq(ring);
    let &first = ring.first()?;
    if ring.last() != Some(&first) {
        ring.push(first);
    }
    (ring.len() >= 4).then_some(ring)
}

fn repair_polygons(polygons: &[PolygonRings]) -> Geometry {
    let cleaned: Vec<geo::Polygon<f64>> = polygons
        .iter()
        .filter_map(|polygon| {
            let shell = clean_ring(&polygon.shell)?;
            let holes = polygon.holes.iter().filter_map(|hole| clean_ring(hole)).collect();
            Some(PolygonRings::new(shell, holes).to_geo())
        })
        .collect();
    let unioned = geo::MultiPolygon::new(cleaned).union(&geo::MultiPolygon::new(Vec::new()));
    Geometry::from(unioned)
}
