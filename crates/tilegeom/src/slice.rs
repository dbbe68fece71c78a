//! Stripe clipping of scaled geometry into per-tile fragments.
//!
//! Input coordinates are world coordinates multiplied by 2^z, so the integer
//! part of a coordinate is its tile column or row. Every ring or line is cut
//! into one vertical stripe per column (extended by the buffer), then every
//! stripe into rows. Polygons also record which rows of a column lie wholly
//! inside the shape, so those tiles can be stamped with one shared fill square
//! instead of carrying ring detail.
//!
//! Shells and holes must both arrive with positive signed area (clockwise on
//! screen). With that orientation the interior of a stripe is always to the
//! right of an edge running down the buffered right edge, or up the buffered
//! left edge, which is what the filled-row detection relies on.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use geo::Coord;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::{GeometryError, GeometryResult};
use crate::geometry::{CoordSeq, Geometry, Group};
use crate::range::RangeSet;
use crate::reassemble::extract_groups;
use crate::tile::{TileCoord, TileCoverage, ZoomExtents, MAX_ZOOM, TILE_SIZE};

/// Slack added to the buffer when picking candidate columns and rows, so that
/// geometry lying exactly on a buffered edge still reaches the neighbor tile.
const NEIGHBOR_EPSILON: f64 = 0.1 / 4096.0;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Fragments of one geometry at one zoom, keyed by tile.
///
/// Fragment coordinates are tile pixels: `0..256` inside the tile, extended by
/// `buffer * 256` on every side.
#[derive(Debug, Default)]
pub struct TiledFragmentSet {
    z: u8,
    contents: AHashMap<TileCoord, Vec<Group>>,
    /// Rows known to be inside the polygon, per column.
    filled: BTreeMap<u32, RangeSet>,
}

impl TiledFragmentSet {
    fn new(z: u8) -> Self { Self { z, ..Self::default() } }

    #[inline] pub fn tile_data(&self) -> &AHashMap<TileCoord, Vec<Group>> { &self.contents }
    #[inline] pub fn into_tile_data(self) -> AHashMap<TileCoord, Vec<Group>> { self.contents }

    pub fn is_empty(&self) -> bool { self.contents.is_empty() && self.filled_tiles().next().is_none() }

    /// Rows of each column that lie wholly inside a polygon, tiles with ring
    /// detail included.
    pub fn filled_rows(&self) -> impl Iterator<Item = (u32, &RangeSet)> + '_ {
        self.filled.iter().map(|(&x, rows)| (x, rows))
    }

    /// Tiles wholly inside a polygon that carry no ring detail.
    pub fn filled_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.filled
            .iter()
            .flat_map(move |(&x, rows)| rows.iter().map(move |y| TileCoord::new(x, y as u32, self.z)))
            .filter(|tile| !self.contents.contains_key(tile))
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Cut line or polygon groups into per-tile fragments.
///
/// `groups` come from [`extract_groups`] on a geometry scaled by 2^z. `buffer`
/// is a fraction of the tile width.
pub fn slice(
    groups: &[Group],
    buffer: f64,
    area: bool,
    z: u8,
    extents: &ZoomExtents,
) -> GeometryResult<TiledFragmentSet> {
    if z > MAX_ZOOM {
        return Err(GeometryError::InvalidZoom(z));
    }
    if let Some(c) = groups.iter().flatten().flatten().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::NonFinite { x: c.x, y: c.y });
    }

    let mut slicer = Slicer::new(extents, buffer, z, area);
    let overflow = slicer.slice_world_copy(groups, 0);
    // only the primary pass decides whether neighboring world copies are needed
    if overflow.right {
        trace!(z, "slicing world copy to the west");
        slicer.slice_world_copy(groups, -slicer.world_tiles);
    }
    if overflow.left {
        trace!(z, "slicing world copy to the east");
        slicer.slice_world_copy(groups, slicer.world_tiles);
    }
    Ok(slicer.out)
}

/// Assign points to every tile whose buffered bounds contain them.
///
/// All points landing on a tile share one group of one-point sequences.
/// Non-finite points are skipped.
pub fn slice_points(extents: &ZoomExtents, buffer: f64, z: u8, coords: &[Coord<f64>]) -> TiledFragmentSet {
    let mut slicer = Slicer::new(extents, buffer, z, false);
    for &c in coords {
        if c.x.is_finite() && c.y.is_finite() {
            slicer.slice_point(c);
        }
    }
    slicer.out
}

/// Every tile a scaled geometry touches or fills, without buffer.
pub fn covered_tiles(scaled: &Geometry, z: u8, extents: &ZoomExtents) -> GeometryResult<TileCoverage> {
    let mut coverage = TileCoverage::new(z);
    match scaled {
        Geometry::Collection(children) => {
            for child in children {
                coverage.merge(&covered_tiles(child, z, extents)?);
            }
        }
        Geometry::Point(c) => add_coverage(&mut coverage, &slice_points(extents, 0.0, z, &[*c])),
        Geometry::MultiPoint(coords) => add_coverage(&mut coverage, &slice_points(extents, 0.0, z, coords)),
        _ => {
            let groups = extract_groups(scaled, 0.0)?;
            add_coverage(&mut coverage, &slice(&groups, 0.0, scaled.is_polygonal(), z, extents)?);
        }
    }
    Ok(coverage)
}

fn add_coverage(coverage: &mut TileCoverage, sliced: &TiledFragmentSet) {
    for (x, rows) in sliced.filled_rows() {
        coverage.insert_rows(x, rows);
    }
    for tile in sliced.tile_data().keys() {
        coverage.insert(tile.x, tile.y);
    }
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

/// Coordinate sequence that translates and scales points as they are added,
/// dropping consecutive duplicates.
#[derive(Debug)]
struct ScaledSeq {
    x0: f64,
    y0: f64,
    scale: f64,
    coords: CoordSeq,
}

impl ScaledSeq {
    fn new(x0: f64, y0: f64, scale: f64) -> Self { Self { x0, y0, scale, coords: Vec::new() } }

    /// Stores points as given.
    fn plain() -> Self { Self::new(0.0, 0.0, 1.0) }

    fn push(&mut self, x: f64, y: f64) {
        let c = Coord { x: (x - self.x0) * self.scale, y: (y - self.y0) * self.scale };
        if self.coords.last() != Some(&c) {
            self.coords.push(c);
        }
    }

    fn close_ring(&mut self) {
        if let (Some(&first), Some(&last)) = (self.coords.first(), self.coords.last()) {
            if first != last {
                self.coords.push(first);
            }
        }
    }

    #[inline] fn into_coords(self) -> CoordSeq { self.coords }
}

/// Crossing of `a -> b` with the vertical line at `x`.
fn intersect_x(seq: &mut ScaledSeq, a: Coord<f64>, b: Coord<f64>, x: f64) {
    let t = (x - a.x) / (b.x - a.x);
    seq.push(x, a.y + (b.y - a.y) * t);
}

/// Crossing of `a -> b` with the horizontal line at `y`.
fn intersect_y(seq: &mut ScaledSeq, a: Coord<f64>, b: Coord<f64>, y: f64) {
    let t = (y - a.y) / (b.y - a.y);
    seq.push(a.x + (b.x - a.x) * t, y);
}

/// Square covering a whole tile plus `buffer` (fraction of the tile width)
/// around it, in tile pixels, clockwise on screen.
pub fn fill_ring(buffer: f64) -> CoordSeq {
    let min = -TILE_SIZE * buffer;
    let max = TILE_SIZE - min;
    vec![
        Coord { x: min, y: min },
        Coord { x: max, y: min },
        Coord { x: max, y: max },
        Coord { x: min, y: max },
        Coord { x: min, y: min },
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Rows an edge along a buffered side crossed without emitting detail.
#[derive(Clone, Copy, Debug)]
struct SkippedSegment {
    side: Side,
    lo: i32,
    hi: i32,
    /// Edge ran toward larger y.
    downward: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct Overflow {
    left: bool,
    right: bool,
}

// ---------------------------------------------------------------------------
// Slicer
// ---------------------------------------------------------------------------

/// State for slicing one geometry at one zoom.
struct Slicer<'a> {
    extents: &'a ZoomExtents,
    buffer: f64,
    neighbor_buffer: f64,
    z: u8,
    area: bool,
    world_tiles: i32,
    out: TiledFragmentSet,
}

impl<'a> Slicer<'a> {
    fn new(extents: &'a ZoomExtents, buffer: f64, z: u8, area: bool) -> Self {
        let buffer = buffer.max(0.0);
        Self {
            extents,
            buffer,
            neighbor_buffer: buffer + NEIGHBOR_EPSILON,
            z,
            area,
            world_tiles: 1 << z,
            out: TiledFragmentSet::new(z),
        }
    }

    fn slice_point(&mut self, c: Coord<f64>) {
        let nb = self.neighbor_buffer;
        let min_x = (c.x - nb).floor() as i32;
        let max_x = (c.x + nb).floor() as i32;
        let min_y = ((c.y - nb).floor() as i32).max(self.extents.min_y());
        let max_y = ((c.y + nb).floor() as i32).min(self.extents.max_y() - 1);
        for x in min_x..=max_x {
            let wrapped = x.rem_euclid(self.world_tiles);
            if !self.extents.test_x(wrapped) {
                continue;
            }
            let tile_x = (c.x - f64::from(x)) * TILE_SIZE;
            for y in min_y..=max_y {
                let tile = TileCoord::new(wrapped as u32, y as u32, self.z);
                let point = Coord { x: tile_x, y: (c.y - f64::from(y)) * TILE_SIZE };
                let groups = self.out.contents.entry(tile).or_default();
                match groups.first_mut() {
                    Some(group) => group.push(vec![point]),
                    None => groups.push(vec![vec![point]]),
                }
            }
        }
    }

    /// Slice every group with columns shifted by `x_offset`, reporting which
    /// sides spilled past the world.
    fn slice_world_copy(&mut self, groups: &[Group], x_offset: i32) -> Overflow {
        let mut overflow = Overflow::default();
        for group in groups {
            let mut in_progress: AHashMap<TileCoord, Vec<CoordSeq>> = AHashMap::new();
            for (i, segment) in group.iter().enumerate() {
                let outer = i == 0;
                let columns = self.slice_x(segment);
                if self.area && self.z >= 6 && columns.len() as i64 >= i64::from(self.world_tiles) - 1 {
                    warn!(z = self.z, columns = columns.len(), "polygon crosses the world, slicing will be slow");
                }
                for (column, stripes) in columns {
                    let x = column + x_offset;
                    if x >= self.world_tiles {
                        overflow.right = true;
                    } else if x < 0 {
                        overflow.left = true;
                    } else if self.extents.test_x(x) {
                        for stripe in &stripes {
                            let filled = self.slice_y(stripe, x, outer, &mut in_progress);
                            if self.area && !filled.is_empty() {
                                let rows = self.out.filled.entry(x as u32).or_default();
                                if outer {
                                    rows.add_all(&filled);
                                } else {
                                    rows.remove_all(&filled);
                                }
                            }
                        }
                    }
                }
            }
            self.add_shape_to_results(in_progress);
        }
        overflow
    }

    fn add_shape_to_results(&mut self, in_progress: AHashMap<TileCoord, Vec<CoordSeq>>) {
        let min_points = if self.area { 4 } else { 2 };
        for (tile, seqs) in in_progress {
            // holes without their shell mean nothing
            if self.area && seqs.first().is_none_or(|shell| shell.len() < 4) {
                continue;
            }
            let kept: Group = seqs.into_iter().filter(|seq| seq.len() >= min_points).collect();
            if !kept.is_empty() {
                self.out.contents.entry(tile).or_default().push(kept);
            }
        }
    }

    /// Cut a ring or line into stripes, one list per column. X coordinates
    /// become relative to the column, Y stays as given.
    fn slice_x(&self, segment: &[Coord<f64>]) -> AHashMap<i32, SmallVec<[CoordSeq; 1]>> {
        let (k1, k2) = (-self.buffer, 1.0 + self.buffer);
        let nb = self.neighbor_buffer;
        let mut columns: AHashMap<i32, SmallVec<[ScaledSeq; 1]>> = AHashMap::new();
        // columns whose last sequence still accepts points
        let mut open: AHashSet<i32> = AHashSet::new();

        for pair in segment.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let start_x = (a.x.min(b.x) - nb).floor() as i32;
            let end_x = (a.x.max(b.x) + nb).floor() as i32;

            for x in start_x..=end_x {
                let col = f64::from(x);
                let a = Coord { x: a.x - col, y: a.y };
                let b = Coord { x: b.x - col, y: b.y };

                let slices = columns.entry(x).or_default();
                if open.insert(x) {
                    slices.push(ScaledSeq::plain());
                }
                let Some(slice) = slices.last_mut() else { continue };

                let mut exited = false;
                if a.x < k1 {
                    if b.x > k1 {
                        intersect_x(slice, a, b, k1);
                    }
                } else if a.x > k2 {
                    if b.x < k2 {
                        intersect_x(slice, a, b, k2);
                    }
                } else {
                    slice.push(a.x, a.y);
                }
                if b.x < k1 && a.x >= k1 {
                    intersect_x(slice, a, b, k1);
                    exited = true;
                }
                if b.x > k2 && a.x <= k2 {
                    intersect_x(slice, a, b, k2);
                    exited = true;
                }
                // lines start a fresh sequence when they come back
                if !self.area && exited {
                    open.remove(&x);
                }
            }
        }

        if let Some(&last) = segment.last() {
            let start_x = (last.x - nb).floor() as i32;
            let end_x = (last.x + nb).floor() as i32;
            for x in start_x - 1..=end_x + 1 {
                let rel = last.x - f64::from(x);
                if open.contains(&x) && rel >= k1 && rel <= k2 {
                    if let Some(slice) = columns.get_mut(&x).and_then(|slices| slices.last_mut()) {
                        slice.push(rel, last.y);
                    }
                }
            }
        }

        if self.area {
            for slices in columns.values_mut() {
                if let Some(ring) = slices.first_mut() {
                    ring.close_ring();
                }
            }
        }

        columns
            .into_iter()
            .map(|(x, slices)| (x, slices.into_iter().map(ScaledSeq::into_coords).collect()))
            .collect()
    }

    /// Cut one column stripe into rows, appending fragments for tiles in
    /// column `x` to `in_progress`. Returns the rows of this stripe that lie
    /// wholly inside it.
    fn slice_y(
        &self,
        stripe: &[Coord<f64>],
        x: i32,
        outer: bool,
        in_progress: &mut AHashMap<TileCoord, Vec<CoordSeq>>,
    ) -> RangeSet {
        let (left_edge, right_edge) = (-self.buffer, 1.0 + self.buffer);
        let nb = self.neighbor_buffer;
        let (min_row, max_row) = (self.extents.min_y(), self.extents.max_y() - 1);

        // sequences in creation order, and the open one per row
        let mut slices: Vec<(i32, ScaledSeq)> = Vec::new();
        let mut open: BTreeMap<i32, usize> = BTreeMap::new();
        let mut skipped: Vec<SkippedSegment> = Vec::new();
        let mut left_filled = RangeSet::new();
        let mut right_filled = RangeSet::new();

        for pair in stripe.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
            let start_y = ((min_y - nb).floor() as i32).max(min_row);
            let end_start_y = ((min_y + nb).floor() as i32).max(min_row);
            let start_end_y = ((max_y - nb).floor() as i32).min(max_row);
            let end_y = ((max_y + nb).floor() as i32).min(max_row);

            let on_right_edge = self.area && a.x == b.x && a.x == right_edge && b.y > a.y;
            let on_left_edge = self.area && a.x == b.x && a.x == left_edge && b.y < a.y;

            let mut y = start_y;
            while y <= end_y {
                if (on_right_edge || on_left_edge) && y > end_start_y && y < start_end_y {
                    // jump to the next row that already has detail
                    let next = open.range(y..).next().map_or(start_end_y, |(&row, _)| row.min(start_end_y));
                    let end_skip = next - 1;
                    if end_skip >= y {
                        let side = if on_right_edge { Side::Right } else { Side::Left };
                        skipped.push(SkippedSegment { side, lo: y, hi: end_skip, downward: b.y > a.y });
                        let filled = if on_right_edge { &mut right_filled } else { &mut left_filled };
                        filled.add(y, end_skip);
                    }
                    y = next;
                }

                let row = f64::from(y);
                let (k1, k2) = (row - self.buffer, row + 1.0 + self.buffer);

                let idx = match open.get(&y) {
                    Some(&idx) => idx,
                    None => {
                        let fragments = in_progress.entry(TileCoord::new(x as u32, y as u32, self.z)).or_default();
                        if self.area && !outer && fragments.is_empty() {
                            // hole detail in a tile its shell fills completely
                            fragments.push(fill_ring(self.buffer));
                        }
                        let mut slice = ScaledSeq::new(0.0, row, TILE_SIZE);
                        if self.area && (left_filled.contains(y) || right_filled.contains(y)) {
                            for skip in skipped.iter().filter(|skip| skip.lo <= y && y <= skip.hi) {
                                let edge = match skip.side {
                                    Side::Left => left_edge,
                                    Side::Right => right_edge,
                                };
                                let (from, to) = if skip.downward { (k1, k2) } else { (k2, k1) };
                                slice.push(edge, from);
                                slice.push(edge, to);
                            }
                        }
                        slices.push((y, slice));
                        open.insert(y, slices.len() - 1);
                        slices.len() - 1
                    }
                };
                let slice = &mut slices[idx].1;

                let mut exited = false;
                if a.y < k1 {
                    if b.y > k1 {
                        intersect_y(slice, a, b, k1);
                    }
                } else if a.y > k2 {
                    if b.y < k2 {
                        intersect_y(slice, a, b, k2);
                    }
                } else {
                    slice.push(a.x, a.y);
                }
                if b.y < k1 && a.y >= k1 {
                    intersect_y(slice, a, b, k1);
                    exited = true;
                }
                if b.y > k2 && a.y <= k2 {
                    intersect_y(slice, a, b, k2);
                    exited = true;
                }
                if !self.area && exited {
                    open.remove(&y);
                }
                y += 1;
            }
        }

        if let Some(&last) = stripe.last() {
            let start_y = (last.y - nb).floor() as i32;
            let end_y = (last.y + nb).floor() as i32;
            for y in start_y - 1..=end_y + 1 {
                let row = f64::from(y);
                if last.y >= row - self.buffer && last.y <= row + 1.0 + self.buffer {
                    if let Some(&idx) = open.get(&y) {
                        slices[idx].1.push(last.x, last.y);
                    }
                }
            }
        }

        if self.area {
            for (_, slice) in &mut slices {
                slice.close_ring();
            }
        }
        for (y, slice) in slices {
            in_progress
                .entry(TileCoord::new(x as u32, y as u32, self.z))
                .or_default()
                .push(slice.into_coords());
        }

        right_filled.intersect(&left_filled)
    }
}
