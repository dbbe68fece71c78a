use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use geo::Coord;
use serde::{Deserialize, Serialize};
use tilegeom::tile::{lon_lat_to_world, MAX_LATITUDE};
use tilegeom::{CoordSeq, Geometry, PolygonRings, TileExtents, MAX_ZOOM};

/// Settings shared by every feature of one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// `[min_lon, min_lat, max_lon, max_lat]` in degrees
    pub bounds: Option<[f64; 4]>,
    /// Ring of `[lon, lat]` vertices; only tiles it covers are rendered
    pub mask: Option<Vec<[f64; 2]>>,
    /// Worker threads, all cores when unset
    pub threads: Option<usize>,
    /// Rendered batches that may wait for the writer before workers block
    pub queue_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
            bounds: None,
            mask: None,
            threads: None,
            queue_capacity: 1024,
        }
    }
}

impl RenderConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .context("[RenderConfig::from_json_str] Failed to parse render config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("[RenderConfig::from_path] Failed to read {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("[RenderConfig::from_path] Invalid render config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_zoom <= MAX_ZOOM, "max_zoom {} is deeper than {MAX_ZOOM}", self.max_zoom);
        ensure!(self.min_zoom <= self.max_zoom, "min_zoom {} is above max_zoom {}", self.min_zoom, self.max_zoom);
        ensure!(self.queue_capacity > 0, "queue_capacity must be positive");
        if self.threads == Some(0) {
            bail!("threads must be positive when set");
        }

        if let Some([min_lon, min_lat, max_lon, max_lat]) = self.bounds {
            ensure!(
                [min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()),
                "bounds must be finite"
            );
            ensure!(min_lon <= max_lon && min_lat <= max_lat, "bounds must be [min_lon, min_lat, max_lon, max_lat]");
            ensure!(min_lon >= -180.0 && max_lon <= 180.0, "bounds longitude outside -180..180");
            ensure!(
                min_lat >= -MAX_LATITUDE && max_lat <= MAX_LATITUDE,
                "bounds latitude outside the Web Mercator range"
            );
        }

        if let Some(mask) = &self.mask {
            ensure!(mask.len() >= 3, "mask needs at least 3 vertices, got {}", mask.len());
            ensure!(mask.iter().flatten().all(|v| v.is_finite()), "mask vertices must be finite");
        }
        Ok(())
    }

    /// Tile extents for every zoom, restricted by bounds and mask.
    pub fn tile_extents(&self) -> Result<TileExtents> {
        let extents = match self.bounds {
            Some([min_lon, min_lat, max_lon, max_lat]) => TileExtents::from_lon_lat_bounds(min_lon, min_lat, max_lon, max_lat),
            None => TileExtents::world(),
        };
        let Some(mask) = self.mask_geometry() else { return Ok(extents) };
        extents
            .with_mask(&mask, self.max_zoom)
            .context("[RenderConfig::tile_extents] Failed to compute tiles covered by the mask")
    }

    /// The mask ring projected to world space, closed.
    fn mask_geometry(&self) -> Option<Geometry> {
        let vertices = self.mask.as_ref()?;
        let mut shell: CoordSeq = vertices.iter().map(|&[lon, lat]| lon_lat_to_world(Coord { x: lon, y: lat })).collect();
        if let Some(&first) = shell.first() {
            if shell.last() != Some(&first) {
                shell.push(first);
            }
        }
        Some(Geometry::Polygon(PolygonRings::new(shell, Vec::new())))
    }
}
