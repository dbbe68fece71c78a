//! Renders one feature into encoded tile geometry for every zoom it covers.
//!
//! Zooms run from deepest to shallowest. Each zoom is rendered completely
//! before anything reaches the sink, so a zoom that fails is skipped without
//! leaving partial output behind, and the remaining zooms still render.

mod fill;
mod repair;

use std::ops::{AddAssign, RangeInclusive};
use std::sync::Arc;

use geo::Coord;
use serde_json::Value;
use tilegeom::{
    encode, extract_groups, reassemble_lines, reassemble_points, reassemble_polygons, slice, slice_points,
    snap_to_grid, Geometry, GeometryResult, TileCoord, TileExtents, VectorGeometry, ZoomExtents, MAX_ZOOM,
};
use tracing::{debug, trace, warn};

use crate::config::RenderConfig;
use crate::feature::{Attrs, Feature};
use crate::sink::{FeatureSink, RenderedFeature};

use self::fill::fill_geometry;
use self::repair::repair;

/// What rendering produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub features: u64,
    /// Tile features carrying their own geometry
    pub emitted: u64,
    /// Tile features carrying the shared fill square
    pub filled: u64,
    /// Zooms that only rendered after repair
    pub repaired: u64,
    /// Zooms dropped because repair did not help
    pub skipped_zooms: u64,
}

impl AddAssign for RenderSummary {
    fn add_assign(&mut self, other: Self) {
        self.features += other.features;
        self.emitted += other.emitted;
        self.filled += other.filled;
        self.repaired += other.repaired;
        self.skipped_zooms += other.skipped_zooms;
    }
}

/// Thresholds for one zoom, in tile units.
#[derive(Debug, Clone, Copy)]
struct ZoomParams {
    z: u8,
    scale: f64,
    buffer: f64,
    tolerance: f64,
    min_size: f64,
    area: bool,
}

/// One zoom of output, held back until the whole zoom succeeded.
#[derive(Debug, Default)]
struct ZoomOutput {
    tiles: Vec<(TileCoord, VectorGeometry)>,
    filled: Vec<TileCoord>,
    num_points: usize,
}

/// Renders features against one set of tile extents.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    extents: &'a TileExtents,
    min_zoom: u8,
    max_zoom: u8,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &RenderConfig, extents: &'a TileExtents) -> Self {
        Self { extents, min_zoom: config.min_zoom, max_zoom: config.max_zoom }
    }

    /// Render every zoom of `feature` into `sink`.
    pub fn render(&self, feature: &Feature, sink: &mut impl FeatureSink) -> RenderSummary {
        let mut summary = RenderSummary { features: 1, ..RenderSummary::default() };
        if feature.geometry().is_empty() {
            warn!(id = feature.id(), layer = feature.layer(), "empty geometry, nothing to render");
            return summary;
        }
        self.render_geometry(feature, feature.geometry(), sink, &mut summary);
        summary
    }

    fn render_geometry(&self, feature: &Feature, geometry: &Geometry, sink: &mut impl FeatureSink, summary: &mut RenderSummary) {
        match geometry {
            Geometry::Collection(children) => {
                for child in children.iter().filter(|child| !child.is_empty()) {
                    self.render_geometry(feature, child, sink, summary);
                }
            }
            Geometry::Point(c) => self.render_points(feature, std::slice::from_ref(c), sink, summary),
            Geometry::MultiPoint(coords) => self.render_points(feature, coords, sink, summary),
            _ => self.render_line_or_polygon(feature, geometry, sink, summary),
        }
    }

    /// Zooms to render, deepest first, never past the pyramid.
    fn zooms(&self, feature: &Feature) -> std::iter::Rev<RangeInclusive<u8>> {
        let min = feature.min_zoom().max(self.min_zoom);
        let max = feature.max_zoom().min(self.max_zoom).min(MAX_ZOOM);
        (min..=max).rev()
    }

    fn render_points(&self, feature: &Feature, coords: &[Coord<f64>], sink: &mut impl FeatureSink, summary: &mut RenderSummary) {
        for z in self.zooms(feature) {
            let extents = self.extents.for_zoom(z);
            let scale = f64::from(1u32 << z);
            let scaled: Vec<Coord<f64>> = coords.iter().map(|c| Coord { x: c.x * scale, y: c.y * scale }).collect();
            let sliced = slice_points(extents, feature.buffer_at(z), z, &scaled);

            let tiles: Vec<(TileCoord, VectorGeometry)> = sliced
                .into_tile_data()
                .into_iter()
                .filter(|(tile, _)| extents.test(*tile))
                .map(|(tile, groups)| (tile, encode(&reassemble_points(&groups))))
                .filter(|(_, encoded)| !encoded.is_empty())
                .collect();
            let output = ZoomOutput { tiles, filled: Vec::new(), num_points: coords.len() };
            self.emit_zoom(feature, z, output, feature.buffer_at(z), sink, summary);
        }
    }

    fn render_line_or_polygon(
        &self,
        feature: &Feature,
        geometry: &Geometry,
        sink: &mut impl FeatureSink,
        summary: &mut RenderSummary,
    ) {
        let area = geometry.is_polygonal();
        let world_length = geometry.length();

        for z in self.zooms(feature) {
            let scale = f64::from(1u32 << z);
            let mut min_size = feature.min_size_at(z, self.max_zoom);
            if area {
                min_size *= min_size;
            } else if world_length > 0.0 && world_length * scale < min_size {
                trace!(id = feature.id(), z, "line shorter than the minimum size");
                continue;
            }
            let params = ZoomParams {
                z,
                scale,
                buffer: feature.buffer_at(z),
                tolerance: feature.tolerance_at(z, self.max_zoom),
                min_size,
                area,
            };
            let extents = self.extents.for_zoom(z);

            match with_repair(geometry, |geometry| render_zoom(geometry, &params, extents)) {
                Ok((output, repaired)) => {
                    if repaired {
                        summary.repaired += 1;
                    }
                    self.emit_zoom(feature, z, output, params.buffer, sink, summary);
                }
                Err(err) => {
                    warn!(id = feature.id(), layer = feature.layer(), z, %err, "skipping zoom, geometry could not be repaired");
                    summary.skipped_zooms += 1;
                }
            }
        }
    }

    fn emit_zoom(
        &self,
        feature: &Feature,
        z: u8,
        output: ZoomOutput,
        buffer: f64,
        sink: &mut impl FeatureSink,
        summary: &mut RenderSummary,
    ) {
        if output.tiles.is_empty() && output.filled.is_empty() {
            return;
        }
        let mut attrs = feature.attrs_at_zoom(z);
        if let Some(key) = feature.num_points_attr() {
            attrs.insert(key.to_string(), Value::from(output.num_points));
        }
        let attrs = Arc::new(attrs);

        for (tile, geometry) in output.tiles {
            emit(feature, tile, Arc::new(geometry), &attrs, sink);
            summary.emitted += 1;
        }
        if !output.filled.is_empty() {
            let fill = fill_geometry(buffer);
            for tile in output.filled {
                emit(feature, tile, Arc::clone(&fill), &attrs, sink);
                summary.filled += 1;
            }
        }
    }
}

/// Run `attempt`, and once more on the repaired geometry if it fails.
/// The flag tells whether repair was needed.
fn with_repair<T>(
    geometry: &Geometry,
    mut attempt: impl FnMut(&Geometry) -> GeometryResult<T>,
) -> GeometryResult<(T, bool)> {
    match attempt(geometry) {
        Ok(value) => Ok((value, false)),
        Err(err) => {
            debug!(%err, "retrying with repaired geometry");
            attempt(&repair(geometry)).map(|value| (value, true))
        }
    }
}

/// Scale, simplify, slice and encode a line or polygon geometry at one zoom.
fn render_zoom(geometry: &Geometry, params: &ZoomParams, extents: &ZoomExtents) -> GeometryResult<ZoomOutput> {
    let scaled = geometry.scale(params.scale).simplify(params.tolerance);
    let groups = extract_groups(&scaled, params.min_size)?;
    if groups.is_empty() {
        return Ok(ZoomOutput::default());
    }
    let sliced = slice(&groups, params.buffer, params.area, params.z, extents)?;

    let filled: Vec<TileCoord> = sliced.filled_tiles().filter(|tile| extents.test(*tile)).collect();
    let mut tiles = Vec::new();
    for (tile, groups) in sliced.into_tile_data() {
        if !extents.test(tile) {
            continue;
        }
        let geometry = if params.area { snap_to_grid(&reassemble_polygons(&groups)?) } else { reassemble_lines(&groups) };
        let encoded = encode(&geometry);
        if !encoded.is_empty() {
            tiles.push((tile, encoded));
        }
    }
    Ok(ZoomOutput { tiles, filled, num_points: scaled.num_points() })
}

fn emit(feature: &Feature, tile: TileCoord, geometry: Arc<VectorGeometry>, attrs: &Arc<Attrs>, sink: &mut impl FeatureSink) {
    assert!(!geometry.is_empty(), "empty command stream for feature {} on tile {tile}", feature.id());
    sink.accept(tile, RenderedFeature {
        layer: feature.layer_arc(),
        id: feature.id(),
        geometry,
        attrs: Arc::clone(attrs),
        sort_key: feature.sort_key(),
        group: feature.group(),
    });
}
