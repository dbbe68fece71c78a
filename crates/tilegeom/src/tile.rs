//! Tile addressing, Web Mercator projection and per-zoom tile extents.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use geo::{Coord, Rect};

use crate::error::GeometryResult;
use crate::geometry::Geometry;
use crate::range::RangeSet;
use crate::slice::covered_tiles;

/// Deepest zoom level of the pyramid.
pub const MAX_ZOOM: u8 = 14;

/// Tile edge length in tile-local pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude at which Web Mercator world Y reaches 0 and 1.
pub const MAX_LATITUDE: f64 = 85.05112877980659;

/// One tile of the pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    #[inline] pub fn new(x: u32, y: u32, z: u8) -> Self { Self { z, x, y } }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}/{}", self.z, self.x, self.y) }
}

/// Convert longitude to world X in [0, 1]
#[inline]
pub fn lon_to_world_x(lon: f64) -> f64 { (lon + 180.0) / 360.0 }

/// Convert latitude to Web Mercator world Y in [0, 1], north at 0
pub fn lat_to_world_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = 0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI);
    y.clamp(0.0, 1.0)
}

/// Project a lon/lat coordinate into world space.
#[inline]
pub fn lon_lat_to_world(c: Coord<f64>) -> Coord<f64> { Coord { x: lon_to_world_x(c.x), y: lat_to_world_y(c.y) } }

#[inline]
fn tiles_at(z: u8) -> i32 { 1 << z }

/// Tile index containing `value` (world units), clamped to the pyramid.
fn quantize_down(value: f64, z: u8) -> i32 {
    let n = tiles_at(z);
    ((value * f64::from(n)).floor() as i32).clamp(0, n - 1)
}

/// Exclusive upper tile index for `value` (world units), clamped to the pyramid.
fn quantize_up(value: f64, z: u8) -> i32 {
    let n = tiles_at(z);
    ((value * f64::from(n)).ceil() as i32).clamp(0, n)
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// A set of tiles at one zoom, stored as row ranges per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileCoverage {
    z: u8,
    columns: BTreeMap<u32, RangeSet>,
}

impl TileCoverage {
    #[inline] pub fn new(z: u8) -> Self { Self { z, columns: BTreeMap::new() } }

    pub fn insert(&mut self, x: u32, y: u32) { self.columns.entry(x).or_default().add(y as i32, y as i32); }

    pub fn insert_rows(&mut self, x: u32, rows: &RangeSet) {
        if !rows.is_empty() {
            self.columns.entry(x).or_default().add_all(rows);
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.columns.get(&x).is_some_and(|rows| rows.contains(y as i32))
    }

    pub fn merge(&mut self, other: &TileCoverage) {
        for (&x, rows) in &other.columns {
            self.insert_rows(x, rows);
        }
    }

    pub fn len(&self) -> u64 { self.columns.values().map(RangeSet::count).sum() }
    pub fn is_empty(&self) -> bool { self.columns.values().all(RangeSet::is_empty) }

    /// Tiles in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.columns
            .iter()
            .flat_map(move |(&x, rows)| rows.iter().map(move |y| TileCoord::new(x, y as u32, self.z)))
    }
}

// ---------------------------------------------------------------------------
// Extents
// ---------------------------------------------------------------------------

/// Tiles of interest at one zoom: a rectangle, optionally refined by a mask.
#[derive(Clone, Debug)]
pub struct ZoomExtents {
    min_x: i32,
    min_y: i32,
    /// Exclusive.
    max_x: i32,
    /// Exclusive.
    max_y: i32,
    mask: Option<Arc<TileCoverage>>,
}

impl ZoomExtents {
    /// Every tile at `z`.
    pub fn world(z: u8) -> Self {
        let n = tiles_at(z);
        Self { min_x: 0, min_y: 0, max_x: n, max_y: n, mask: None }
    }

    /// Tiles touched by a world-space rectangle. Always at least one tile wide.
    pub fn from_world_rect(z: u8, rect: Rect<f64>) -> Self {
        let n = tiles_at(z);
        let min_x = quantize_down(rect.min().x, z);
        let min_y = quantize_down(rect.min().y, z);
        let max_x = quantize_up(rect.max().x, z).max(min_x + 1).min(n);
        let max_y = quantize_up(rect.max().y, z).max(min_y + 1).min(n);
        Self { min_x, min_y, max_x, max_y, mask: None }
    }

    pub fn with_mask(mut self, mask: TileCoverage) -> Self {
        self.mask = Some(Arc::new(mask));
        self
    }

    #[inline] pub fn min_x(&self) -> i32 { self.min_x }
    #[inline] pub fn min_y(&self) -> i32 { self.min_y }
    #[inline] pub fn max_x(&self) -> i32 { self.max_x }
    #[inline] pub fn max_y(&self) -> i32 { self.max_y }
    #[inline] pub fn mask(&self) -> Option<&TileCoverage> { self.mask.as_deref() }

    #[inline] pub fn test_x(&self, x: i32) -> bool { x >= self.min_x && x < self.max_x }
    #[inline] pub fn test_y(&self, y: i32) -> bool { y >= self.min_y && y < self.max_y }

    /// Inside the rectangle and, when present, the mask.
    pub fn test(&self, tile: TileCoord) -> bool {
        self.test_x(tile.x as i32)
            && self.test_y(tile.y as i32)
            && self.mask.as_ref().is_none_or(|mask| mask.contains(tile.x, tile.y))
    }
}

/// Per-zoom extents for the whole pyramid.
#[derive(Clone, Debug)]
pub struct TileExtents {
    zooms: Vec<ZoomExtents>,
}

impl Default for TileExtents {
    fn default() -> Self { Self::world() }
}

impl TileExtents {
    pub fn world() -> Self { Self { zooms: (0..=MAX_ZOOM).map(ZoomExtents::world).collect() } }

    /// Extents of a world-space rectangle.
    pub fn from_world_bounds(bounds: Rect<f64>) -> Self {
        Self { zooms: (0..=MAX_ZOOM).map(|z| ZoomExtents::from_world_rect(z, bounds)).collect() }
    }

    /// Extents of a lon/lat box, in degrees.
    pub fn from_lon_lat_bounds(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        // north maps to the smaller world y
        let rect = Rect::new(
            Coord { x: lon_to_world_x(min_lon), y: lat_to_world_y(max_lat) },
            Coord { x: lon_to_world_x(max_lon), y: lat_to_world_y(min_lat) },
        );
        Self::from_world_bounds(rect)
    }

    /// Restrict zooms up to `max_zoom` to the tiles a world-space geometry covers.
    pub fn with_mask(mut self, mask: &Geometry, max_zoom: u8) -> GeometryResult<Self> {
        for z in 0..=max_zoom.min(MAX_ZOOM) {
            let extents = &self.zooms[usize::from(z)];
            let scaled = mask.scale(f64::from(tiles_at(z)));
            let coverage = covered_tiles(&scaled, z, extents)?;
            self.zooms[usize::from(z)] = extents.clone().with_mask(coverage);
        }
        Ok(self)
    }

    /// Extents at `z`. Zooms past the pyramid clamp to the deepest level.
    #[inline]
    pub fn for_zoom(&self, z: u8) -> &ZoomExtents { &self.zooms[usize::from(z.min(MAX_ZOOM))] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PolygonRings;

    #[test]
    fn display_is_z_x_y() {
        assert_eq!(TileCoord::new(3, 5, 7).to_string(), "7/3/5");
    }

    #[test]
    fn mercator_edges() {
        assert_eq!(lon_to_world_x(-180.0), 0.0);
        assert_eq!(lon_to_world_x(180.0), 1.0);
        assert!((lat_to_world_y(0.0) - 0.5).abs() < 1e-12);
        assert!(lat_to_world_y(90.0) < 1e-9);
        assert!(lat_to_world_y(-90.0) > 1.0 - 1e-9);
    }

    #[test]
    fn world_extents_accept_everything() {
        let extents = TileExtents::world();
        let z3 = extents.for_zoom(3);
        assert!(z3.test(TileCoord::new(7, 7, 3)));
        assert!(!z3.test_x(8));
        assert!(!z3.test_y(-1));
    }

    #[test]
    fn bounds_quantize_outward() {
        // western hemisphere, northern half
        let extents = TileExtents::from_lon_lat_bounds(-180.0, 0.0, -0.001, 85.0);
        let z1 = extents.for_zoom(1);
        assert_eq!((z1.min_x(), z1.max_x(), z1.min_y(), z1.max_y()), (0, 1, 0, 1));
        let z2 = extents.for_zoom(2);
        assert_eq!((z2.min_x(), z2.max_x()), (0, 2));
        assert!(!z2.test(TileCoord::new(2, 0, 2)));
        assert!(!z2.test(TileCoord::new(0, 2, 2)));
    }

    #[test]
    fn degenerate_bounds_keep_one_tile() {
        let point = Coord { x: 0.5, y: 0.5 };
        let zoom = ZoomExtents::from_world_rect(1, Rect::new(point, point));
        assert_eq!((zoom.min_x(), zoom.max_x()), (1, 2));
    }

    #[test]
    fn mask_limits_tiles() {
        // a small square in the north-west quarter of the world
        let square = Geometry::Polygon(PolygonRings::new(
            vec![
                Coord { x: 0.1, y: 0.1 },
                Coord { x: 0.2, y: 0.1 },
                Coord { x: 0.2, y: 0.2 },
                Coord { x: 0.1, y: 0.2 },
                Coord { x: 0.1, y: 0.1 },
            ],
            vec![],
        ));
        let extents = TileExtents::world().with_mask(&square, 2).unwrap();
        let z2 = extents.for_zoom(2);
        assert!(z2.test(TileCoord::new(0, 0, 2)));
        assert!(!z2.test(TileCoord::new(3, 3, 2)));
        assert_eq!(z2.mask().unwrap().len(), 1);
        // zooms past the mask keep the plain rectangle
        assert!(extents.for_zoom(3).test(TileCoord::new(7, 7, 3)));
    }

    #[test]
    fn near_world_mask_takes_filled_rows_whole() {
        let square = Geometry::Polygon(PolygonRings::new(
            vec![
                Coord { x: 0.001, y: 0.001 },
                Coord { x: 0.999, y: 0.001 },
                Coord { x: 0.999, y: 0.999 },
                Coord { x: 0.001, y: 0.999 },
                Coord { x: 0.001, y: 0.001 },
            ],
            vec![],
        ));
        let extents = TileExtents::world().with_mask(&square, 10).unwrap();
        let z10 = extents.for_zoom(10);
        assert_eq!(z10.mask().unwrap().len(), 1022 * 1022);
        assert!(z10.test(TileCoord::new(500, 500, 10)));
        assert!(!z10.test(TileCoord::new(0, 500, 10)));
        assert!(!z10.test(TileCoord::new(500, 1023, 10)));
    }

    #[test]
    fn coverage_set_operations() {
        let mut a = TileCoverage::new(4);
        a.insert(1, 2);
        a.insert(1, 3);
        let mut b = TileCoverage::new(4);
        b.insert(5, 5);
        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert!(a.contains(5, 5));
        assert!(!a.contains(1, 4));
        let tiles: Vec<_> = a.iter().collect();
        assert_eq!(tiles[0], TileCoord::new(1, 2, 4));
    }
}
