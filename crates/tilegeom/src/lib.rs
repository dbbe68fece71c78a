pub mod codec;
pub mod error;
pub mod geometry;
pub mod range;
pub mod reassemble;
pub mod slice;
pub mod tile;

pub use codec::{decode, encode, GeomType, VectorGeometry};
pub use error::{GeometryError, GeometryResult};
pub use geometry::{CoordSeq, Geometry, Group, PolygonRings};
pub use range::RangeSet;
pub use reassemble::{extract_groups, reassemble_lines, reassemble_points, reassemble_polygons, snap_to_grid};
pub use slice::{covered_tiles, fill_ring, slice, slice_points, TiledFragmentSet};
pub use tile::{TileCoord, TileCoverage, TileExtents, ZoomExtents, MAX_ZOOM, TILE_SIZE};
