use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tilegeom::{Geometry, MAX_ZOOM, TILE_SIZE};

use crate::sink::GroupInfo;

/// Attributes attached to a rendered feature.
pub type Attrs = Map<String, Value>;

/// A number with optional per-zoom overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomValue {
    default: f64,
    overrides: BTreeMap<u8, f64>,
}

impl ZoomValue {
    #[inline] pub fn new(default: f64) -> Self { Self { default, overrides: BTreeMap::new() } }

    /// Use `value` at zoom `z` instead of the default.
    pub fn with_zoom(mut self, z: u8, value: f64) -> Self {
        self.overrides.insert(z, value);
        self
    }

    #[inline] pub fn at(&self, z: u8) -> f64 { self.overrides.get(&z).copied().unwrap_or(self.default) }
}

impl From<f64> for ZoomValue {
    fn from(default: f64) -> Self { Self::new(default) }
}

#[derive(Debug, Clone, PartialEq)]
struct AttrEntry {
    key: String,
    value: Value,
    min_zoom: u8,
}

/// A map feature ready to render: world-space geometry plus the per-zoom
/// policy decided by the caller.
///
/// Thresholds are in tile pixels (256 per tile edge). Tolerance and minimum
/// size take a separate value at the deepest rendered zoom, where detail is
/// never regenerated by a deeper level.
#[derive(Debug, Clone)]
pub struct Feature {
    id: u64,
    layer: Arc<str>,
    geometry: Geometry,
    min_zoom: u8,
    max_zoom: u8,
    sort_key: i32,
    group: Option<GroupInfo>,
    buffer_pixels: ZoomValue,
    pixel_tolerance: ZoomValue,
    pixel_tolerance_at_max_zoom: f64,
    min_pixel_size: ZoomValue,
    min_pixel_size_at_max_zoom: f64,
    attrs: Vec<AttrEntry>,
    num_points_attr: Option<String>,
}

impl Feature {
    pub fn new(layer: &str, id: u64, geometry: Geometry) -> Self {
        Self {
            id,
            layer: Arc::from(layer),
            geometry,
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
            sort_key: 0,
            group: None,
            buffer_pixels: ZoomValue::new(4.0),
            pixel_tolerance: ZoomValue::new(0.1),
            pixel_tolerance_at_max_zoom: TILE_SIZE / 4096.0,
            min_pixel_size: ZoomValue::new(1.0),
            min_pixel_size_at_max_zoom: TILE_SIZE / 4096.0,
            attrs: Vec::new(),
            num_points_attr: None,
        }
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_sort_key(mut self, sort_key: i32) -> Self {
        self.sort_key = sort_key;
        self
    }

    pub fn with_group(mut self, key: u64, limit: usize) -> Self {
        self.group = Some(GroupInfo { key, limit });
        self
    }

    pub fn with_buffer_pixels(mut self, buffer: impl Into<ZoomValue>) -> Self {
        self.buffer_pixels = buffer.into();
        self
    }

    pub fn with_pixel_tolerance(mut self, tolerance: impl Into<ZoomValue>) -> Self {
        self.pixel_tolerance = tolerance.into();
        self
    }

    pub fn with_pixel_tolerance_at_max_zoom(mut self, tolerance: f64) -> Self {
        self.pixel_tolerance_at_max_zoom = tolerance;
        self
    }

    pub fn with_min_pixel_size(mut self, size: impl Into<ZoomValue>) -> Self {
        self.min_pixel_size = size.into();
        self
    }

    pub fn with_min_pixel_size_at_max_zoom(mut self, size: f64) -> Self {
        self.min_pixel_size_at_max_zoom = size;
        self
    }

    pub fn with_attr(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_attr_min_zoom(key, value, 0)
    }

    /// Attribute present only from `min_zoom` down.
    pub fn with_attr_min_zoom(mut self, key: impl Into<String>, value: impl Into<Value>, min_zoom: u8) -> Self {
        self.attrs.push(AttrEntry { key: key.into(), value: value.into(), min_zoom });
        self
    }

    /// Store the rendered point count under `key`.
    pub fn with_num_points_attr(mut self, key: impl Into<String>) -> Self {
        self.num_points_attr = Some(key.into());
        self
    }

    #[inline] pub fn id(&self) -> u64 { self.id }
    #[inline] pub fn layer(&self) -> &str { &self.layer }
    #[inline] pub(crate) fn layer_arc(&self) -> Arc<str> { Arc::clone(&self.layer) }
    #[inline] pub fn geometry(&self) -> &Geometry { &self.geometry }
    #[inline] pub fn min_zoom(&self) -> u8 { self.min_zoom }
    #[inline] pub fn max_zoom(&self) -> u8 { self.max_zoom }
    #[inline] pub fn sort_key(&self) -> i32 { self.sort_key }
    #[inline] pub fn group(&self) -> Option<GroupInfo> { self.group }
    #[inline] pub fn num_points_attr(&self) -> Option<&str> { self.num_points_attr.as_deref() }

    /// Buffer at `z` as a fraction of the tile width.
    pub fn buffer_at(&self, z: u8) -> f64 { self.buffer_pixels.at(z).max(0.0) / TILE_SIZE }

    /// Simplification tolerance at `z` in tile units.
    pub fn tolerance_at(&self, z: u8, max_zoom: u8) -> f64 {
        let pixels = if z >= max_zoom { self.pixel_tolerance_at_max_zoom } else { self.pixel_tolerance.at(z) };
        pixels / TILE_SIZE
    }

    /// Smallest line length (or square root of ring area) kept at `z`, in tile units.
    pub fn min_size_at(&self, z: u8, max_zoom: u8) -> f64 {
        let pixels = if z >= max_zoom { self.min_pixel_size_at_max_zoom } else { self.min_pixel_size.at(z) };
        pixels / TILE_SIZE
    }

    /// Attributes visible at `z`. Later values win for repeated keys.
    pub fn attrs_at_zoom(&self, z: u8) -> Attrs {
        let mut attrs = Attrs::new();
        for entry in self.attrs.iter().filter(|entry| entry.min_zoom <= z) {
            attrs.insert(entry.key.clone(), entry.value.clone());
        }
        attrs
    }
}
