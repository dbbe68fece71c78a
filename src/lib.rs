#![doc = "tilecut public API"]
mod config;
mod feature;
mod pipeline;
mod render;
mod sink;

#[doc(inline)]
pub use config::RenderConfig;

#[doc(inline)]
pub use feature::{Attrs, Feature, ZoomValue};

#[doc(inline)]
pub use pipeline::render_all;

#[doc(inline)]
pub use render::{RenderSummary, Renderer};

#[doc(inline)]
pub use sink::{FeatureSink, GroupInfo, RenderedFeature};

#[doc(inline)]
pub use tilegeom::{GeomType, Geometry, PolygonRings, TileCoord, TileExtents, VectorGeometry};
