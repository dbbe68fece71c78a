use std::sync::Arc;

use tilegeom::{TileCoord, VectorGeometry};

use crate::feature::Attrs;

/// Caps how many features sharing `key` a tile keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupInfo {
    pub key: u64,
    pub limit: usize,
}

/// One encoded feature on one tile.
///
/// Geometry and attributes are shared: every filled tile of a polygon points
/// at the same encoded square, and every tile of one zoom at the same
/// attributes.
#[derive(Debug, Clone)]
pub struct RenderedFeature {
    pub layer: Arc<str>,
    pub id: u64,
    pub geometry: Arc<VectorGeometry>,
    pub attrs: Arc<Attrs>,
    pub sort_key: i32,
    pub group: Option<GroupInfo>,
}

/// Receives rendered features. Called from one thread at a time.
pub trait FeatureSink {
    fn accept(&mut self, tile: TileCoord, feature: RenderedFeature);
}

impl FeatureSink for Vec<(TileCoord, RenderedFeature)> {
    fn accept(&mut self, tile: TileCoord, feature: RenderedFeature) { self.push((tile, feature)); }
}

impl<S: FeatureSink + ?Sized> FeatureSink for &mut S {
    fn accept(&mut self, tile: TileCoord, feature: RenderedFeature) { (**self).accept(tile, feature); }
}
