//! The full-tile square stamped onto tiles wholly inside a polygon.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ahash::AHashMap;
use tilegeom::{encode, fill_ring, Geometry, PolygonRings, VectorGeometry};

/// Encoded fill squares keyed by the bits of their buffer.
static FILLS: OnceLock<Mutex<AHashMap<u64, Arc<VectorGeometry>>>> = OnceLock::new();

/// Square covering a tile and `buffer` (fraction of the tile width) around
/// it, encoded once per buffer value.
pub(crate) fn fill_geometry(buffer: f64) -> Arc<VectorGeometry> {
    let fills = FILLS.get_or_init(Default::default);
    let mut fills = fills.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(fills.entry(buffer.to_bits()).or_insert_with(|| {
        Arc::new(encode(&Geometry::Polygon(PolygonRings::new(fill_ring(buffer), Vec::new()))))
    }))
}
