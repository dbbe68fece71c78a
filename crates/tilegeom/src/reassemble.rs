//! Conversions between geometries and slicer groups.
//!
//! [`extract_groups`] flattens a scaled geometry into the groups the slicer
//! consumes; the `reassemble_*` functions turn one tile's fragments back into
//! a geometry ready for encoding.

use geo::Coord;

use crate::codec::GRID_SCALE;
use crate::error::{GeometryError, GeometryResult};
use crate::geometry::{is_closed, seq_length, signed_area, CoordSeq, Geometry, Group, PolygonRings};

/// Orient a ring so its signed area is positive (`true`) or negative.
fn oriented(ring: &[Coord<f64>], positive: bool) -> CoordSeq {
    if (signed_area(ring) > 0.0) == positive { ring.to_vec() } else { ring.iter().rev().copied().collect() }
}

fn checked_ring(ring: &[Coord<f64>]) -> GeometryResult<&[Coord<f64>]> {
    if ring.len() < 4 || !is_closed(ring) {
        return Err(GeometryError::InvalidRing { points: ring.len() });
    }
    Ok(ring)
}

// ---------------------------------------------------------------------------
// Input side
// ---------------------------------------------------------------------------

/// Flatten a geometry into slicer groups, dropping parts below `min_size`.
///
/// `min_size` is a length for lines and an area for rings. Shells and holes
/// are both oriented to positive signed area. A kept shell that is not a
/// valid ring is an error; an invalid hole is dropped.
pub fn extract_groups(geometry: &Geometry, min_size: f64) -> GeometryResult<Vec<Group>> {
    let mut groups = Vec::new();
    collect_groups(geometry, min_size, &mut groups)?;
    Ok(groups)
}

fn collect_groups(geometry: &Geometry, min_size: f64, groups: &mut Vec<Group>) -> GeometryResult<()> {
    match geometry {
        Geometry::Point(c) => groups.push(vec![vec![*c]]),
        Geometry::MultiPoint(coords) => groups.extend(coords.iter().map(|&c| vec![vec![c]])),
        Geometry::Line(line) => push_line(line, min_size, groups),
        Geometry::MultiLine(lines) => lines.iter().for_each(|line| push_line(line, min_size, groups)),
        Geometry::Polygon(polygon) => push_polygon(polygon, min_size, groups)?,
        Geometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                push_polygon(polygon, min_size, groups)?;
            }
        }
        Geometry::Collection(children) => {
            for child in children {
                collect_groups(child, min_size, groups)?;
            }
        }
    }
    Ok(())
}

fn push_line(line: &CoordSeq, min_size: f64, groups: &mut Vec<Group>) {
    if line.len() >= 2 && (min_size <= 0.0 || seq_length(line) >= min_size) {
        groups.push(vec![line.clone()]);
    }
}

fn push_polygon(polygon: &PolygonRings, min_size: f64, groups: &mut Vec<Group>) -> GeometryResult<()> {
    if signed_area(&polygon.shell).abs() <= min_size {
        return Ok(());
    }
    let mut group = vec![oriented(checked_ring(&polygon.shell)?, true)];
    for hole in &polygon.holes {
        if checked_ring(hole).is_ok() && signed_area(hole).abs() > min_size {
            group.push(oriented(hole, true));
        }
    }
    groups.push(group);
    Ok(())
}

// ---------------------------------------------------------------------------
// Output side
// ---------------------------------------------------------------------------

/// Every fragment with at least two points, as one line or a multi-line.
pub fn reassemble_lines(groups: &[Group]) -> Geometry {
    let mut lines: Vec<CoordSeq> = groups.iter().flatten().filter(|seq| seq.len() >= 2).cloned().collect();
    match lines.len() {
        1 => Geometry::Line(lines.swap_remove(0)),
        _ => Geometry::MultiLine(lines),
    }
}

/// Build polygons from fragment groups: the first sequence of a group is the
/// shell, the rest are holes.
///
/// Shells get the vector tile exterior winding (positive signed area in tile
/// pixels) and holes the opposite.
pub fn reassemble_polygons(groups: &[Group]) -> GeometryResult<Geometry> {
    let mut polygons = Vec::with_capacity(groups.len());
    for group in groups {
        let Some((shell, holes)) = group.split_first() else { continue };
        let shell = oriented(checked_ring(shell)?, true);
        let holes = holes
            .iter()
            .map(|hole| checked_ring(hole).map(|ring| oriented(ring, false)))
            .collect::<GeometryResult<Vec<_>>>()?;
        polygons.push(PolygonRings::new(shell, holes));
    }
    Ok(match polygons.len() {
        1 => Geometry::Polygon(polygons.swap_remove(0)),
        _ => Geometry::MultiPolygon(polygons),
    })
}

/// One-point fragments as a point, or a multi-point when there are several.
pub fn reassemble_points(groups: &[Group]) -> Geometry {
    let mut points: CoordSeq = groups.iter().flatten().filter(|seq| seq.len() == 1).map(|seq| seq[0]).collect();
    match points.len() {
        1 => Geometry::Point(points.swap_remove(0)),
        _ => Geometry::MultiPoint(points),
    }
}

// ---------------------------------------------------------------------------
// Grid snapping
// ---------------------------------------------------------------------------

/// Round polygon rings to the wire grid and drop the ones that collapse.
///
/// Rings lose consecutive duplicates and A-B-A spikes. A ring left with fewer
/// than 4 points or no area is removed, and a polygon whose shell is removed
/// goes with it. Lines and points pass through; the encoder rounds them.
pub fn snap_to_grid(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon(polygon) => match snap_polygon(polygon) {
            Some(polygon) => Geometry::Polygon(polygon),
            None => Geometry::MultiPolygon(Vec::new()),
        },
        Geometry::MultiPolygon(polygons) => {
            let mut kept: Vec<PolygonRings> = polygons.iter().filter_map(snap_polygon).collect();
            match kept.len() {
                1 => Geometry::Polygon(kept.swap_remove(0)),
                _ => Geometry::MultiPolygon(kept),
            }
        }
        Geometry::Collection(children) => Geometry::Collection(children.iter().map(snap_to_grid).collect()),
        _ => geometry.clone(),
    }
}

fn snap_polygon(polygon: &PolygonRings) -> Option<PolygonRings> {
    let shell = snap_ring(&polygon.shell)?;
    let holes = polygon.holes.iter().filter_map(|hole| snap_ring(hole)).collect();
    Some(PolygonRings::new(shell, holes))
}

fn snap_ring(ring: &[Coord<f64>]) -> Option<CoordSeq> {
    let mut cleaned: CoordSeq = Vec::with_capacity(ring.len());
    for c in ring {
        let snapped = Coord { x: (c.x * GRID_SCALE).round() / GRID_SCALE, y: (c.y * GRID_SCALE).round() / GRID_SCALE };
        if cleaned.last() == Some(&snapped) {
            continue;
        }
        if cleaned.len() >= 2 && cleaned[cleaned.len() - 2] == snapped {
            cleaned.pop();
            continue;
        }
        cleaned.push(snapped);
    }
    if let Some(&first) = cleaned.first() {
        if cleaned.last() != Some(&first) {
            cleaned.push(first);
        }
    }
    (cleaned.len() >= 4 && signed_area(&cleaned) != 0.0).then_some(cleaned)
}
