//! Tagged-union geometry shared by the slicer, reassembler and codec.
//!
//! Coordinates are plain `geo::Coord<f64>` values. Which space they live in
//! (world, tile pixels or wire grid) depends on the stage that produced them;
//! the geometry itself does not track it.

use std::iter;

use geo::{Coord, LineString, Simplify};

/// An ordered list of coordinates: a line, a ring, or a point cluster.
pub type CoordSeq = Vec<Coord<f64>>;

/// One outer ring (or line) followed by its holes.
pub type Group = Vec<CoordSeq>;

/// Shell and holes of a single polygon.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolygonRings {
    pub shell: CoordSeq,
    pub holes: Vec<CoordSeq>,
}

impl PolygonRings {
    #[inline] pub fn new(shell: CoordSeq, holes: Vec<CoordSeq>) -> Self { Self { shell, holes } }

    /// Shell first, then each hole.
    pub fn rings(&self) -> impl Iterator<Item = &CoordSeq> { iter::once(&self.shell).chain(&self.holes) }

    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            LineString::new(self.shell.clone()),
            self.holes.iter().map(|hole| LineString::new(hole.clone())).collect(),
        )
    }

    pub fn from_geo(polygon: &geo::Polygon<f64>) -> Self {
        Self {
            shell: polygon.exterior().0.clone(),
            holes: polygon.interiors().iter().map(|ring| ring.0.clone()).collect(),
        }
    }

    fn map_coords(&self, f: &dyn Fn(Coord<f64>) -> Coord<f64>) -> Self {
        Self {
            shell: self.shell.iter().map(|&c| f(c)).collect(),
            holes: self.holes.iter().map(|hole| hole.iter().map(|&c| f(c)).collect()).collect(),
        }
    }

    fn simplify(&self, tolerance: f64) -> Self {
        Self {
            shell: simplify_seq(&self.shell, tolerance),
            holes: self.holes.iter().map(|hole| simplify_seq(hole, tolerance)).collect(),
        }
    }
}

/// A feature geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord<f64>),
    MultiPoint(CoordSeq),
    Line(CoordSeq),
    MultiLine(Vec<CoordSeq>),
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
    Collection(Vec<Geometry>),
}

impl Geometry {
    /// True if the geometry has no coordinates to render.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::MultiPoint(coords) | Self::Line(coords) => coords.is_empty(),
            Self::MultiLine(lines) => lines.iter().all(Vec::is_empty),
            Self::Polygon(polygon) => polygon.shell.is_empty(),
            Self::MultiPolygon(polygons) => polygons.iter().all(|p| p.shell.is_empty()),
            Self::Collection(children) => children.iter().all(Geometry::is_empty),
        }
    }

    #[inline] pub fn is_lineal(&self) -> bool { matches!(self, Self::Line(_) | Self::MultiLine(_)) }
    #[inline] pub fn is_polygonal(&self) -> bool { matches!(self, Self::Polygon(_) | Self::MultiPolygon(_)) }

    /// Total number of coordinates, closing vertices included.
    pub fn num_points(&self) -> usize {
        match self {
            Self::Point(_) => 1,
            Self::MultiPoint(coords) | Self::Line(coords) => coords.len(),
            Self::MultiLine(lines) => lines.iter().map(Vec::len).sum(),
            Self::Polygon(polygon) => polygon.rings().map(Vec::len).sum(),
            Self::MultiPolygon(polygons) => polygons.iter().flat_map(PolygonRings::rings).map(Vec::len).sum(),
            Self::Collection(children) => children.iter().map(Geometry::num_points).sum(),
        }
    }

    /// Summed length of all lines. Zero for points and polygons.
    pub fn length(&self) -> f64 {
        match self {
            Self::Line(line) => seq_length(line),
            Self::MultiLine(lines) => lines.iter().map(|line| seq_length(line)).sum(),
            Self::Collection(children) => children.iter().map(Geometry::length).sum(),
            _ => 0.0,
        }
    }

    /// Apply `f` to every coordinate.
    pub fn map_coords(&self, f: impl Fn(Coord<f64>) -> Coord<f64>) -> Self { self.map_coords_dyn(&f) }

    fn map_coords_dyn(&self, f: &dyn Fn(Coord<f64>) -> Coord<f64>) -> Self {
        let seq = |coords: &CoordSeq| -> CoordSeq { coords.iter().map(|&c| f(c)).collect() };
        match self {
            Self::Point(c) => Self::Point(f(*c)),
            Self::MultiPoint(coords) => Self::MultiPoint(seq(coords)),
            Self::Line(coords) => Self::Line(seq(coords)),
            Self::MultiLine(lines) => Self::MultiLine(lines.iter().map(seq).collect()),
            Self::Polygon(polygon) => Self::Polygon(polygon.map_coords(f)),
            Self::MultiPolygon(polygons) => Self::MultiPolygon(polygons.iter().map(|p| p.map_coords(f)).collect()),
            Self::Collection(children) => Self::Collection(children.iter().map(|g| g.map_coords_dyn(f)).collect()),
        }
    }

    /// Uniformly scale about the origin.
    pub fn scale(&self, factor: f64) -> Self { self.map_coords(|c| Coord { x: c.x * factor, y: c.y * factor }) }

    /// Douglas-Peucker simplification of lines and rings. Points are untouched.
    pub fn simplify(&self, tolerance: f64) -> Self {
        if tolerance <= 0.0 {
            return self.clone();
        }
        match self {
            Self::Point(_) | Self::MultiPoint(_) => self.clone(),
            Self::Line(line) => Self::Line(simplify_seq(line, tolerance)),
            Self::MultiLine(lines) => Self::MultiLine(lines.iter().map(|l| simplify_seq(l, tolerance)).collect()),
            Self::Polygon(polygon) => Self::Polygon(polygon.simplify(tolerance)),
            Self::MultiPolygon(polygons) => Self::MultiPolygon(polygons.iter().map(|p| p.simplify(tolerance)).collect()),
            Self::Collection(children) => Self::Collection(children.iter().map(|g| g.simplify(tolerance)).collect()),
        }
    }

    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Self::Point(c) => geo::Geometry::Point(geo::Point(*c)),
            Self::MultiPoint(coords) => geo::Geometry::MultiPoint(geo::MultiPoint(coords.iter().map(|&c| geo::Point(c)).collect())),
            Self::Line(coords) => geo::Geometry::LineString(LineString::new(coords.clone())),
            Self::MultiLine(lines) => geo::Geometry::MultiLineString(geo::MultiLineString(
                lines.iter().map(|line| LineString::new(line.clone())).collect(),
            )),
            Self::Polygon(polygon) => geo::Geometry::Polygon(polygon.to_geo()),
            Self::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(geo::MultiPolygon(
                polygons.iter().map(PolygonRings::to_geo).collect(),
            )),
            Self::Collection(children) => geo::Geometry::GeometryCollection(geo::GeometryCollection(
                children.iter().map(Geometry::to_geo).collect(),
            )),
        }
    }

    pub fn from_geo(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(p) => Self::Point(p.0),
            geo::Geometry::Line(line) => Self::Line(vec![line.start, line.end]),
            geo::Geometry::LineString(line) => Self::Line(line.0.clone()),
            geo::Geometry::Polygon(polygon) => Self::Polygon(PolygonRings::from_geo(polygon)),
            geo::Geometry::MultiPoint(points) => Self::MultiPoint(points.0.iter().map(|p| p.0).collect()),
            geo::Geometry::MultiLineString(lines) => Self::MultiLine(lines.0.iter().map(|l| l.0.clone()).collect()),
            geo::Geometry::MultiPolygon(polygons) => Self::from(polygons.clone()),
            geo::Geometry::GeometryCollection(children) => Self::Collection(children.0.iter().map(Self::from_geo).collect()),
            geo::Geometry::Rect(rect) => Self::Polygon(PolygonRings::from_geo(&rect.to_polygon())),
            geo::Geometry::Triangle(triangle) => Self::Polygon(PolygonRings::from_geo(&triangle.to_polygon())),
        }
    }
}

impl From<geo::MultiPolygon<f64>> for Geometry {
    fn from(polygons: geo::MultiPolygon<f64>) -> Self {
        Self::MultiPolygon(polygons.0.iter().map(PolygonRings::from_geo).collect())
    }
}

impl From<geo::Polygon<f64>> for Geometry {
    fn from(polygon: geo::Polygon<f64>) -> Self { Self::Polygon(PolygonRings::from_geo(&polygon)) }
}

impl From<geo::LineString<f64>> for Geometry {
    fn from(line: geo::LineString<f64>) -> Self { Self::Line(line.0) }
}

/// Surveyor's formula over the raw coordinates.
///
/// In y-down spaces (world, tile pixels, wire grid) a positive result means
/// the ring runs clockwise on screen, which is the vector tile exterior
/// winding.
pub fn signed_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area / 2.0
}

/// First and last coordinates are equal.
#[inline]
pub fn is_closed(seq: &[Coord<f64>]) -> bool { seq.len() > 1 && seq.first() == seq.last() }

pub fn seq_length(seq: &[Coord<f64>]) -> f64 {
    seq.windows(2).map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y)).sum()
}

fn simplify_seq(seq: &[Coord<f64>], tolerance: f64) -> CoordSeq {
    LineString::new(seq.to_vec()).simplify(&tolerance).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(points: &[(f64, f64)]) -> CoordSeq { points.iter().map(|&(x, y)| Coord { x, y }).collect() }

    #[test]
    fn clockwise_on_screen_is_positive() {
        // y grows downward: right along the top, then down the right side
        let ring = seq(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        assert_eq!(signed_area(&ring), 100.0);
        let reversed: CoordSeq = ring.iter().rev().copied().collect();
        assert_eq!(signed_area(&reversed), -100.0);
    }

    #[test]
    fn closed_needs_two_points() {
        assert!(!is_closed(&seq(&[(1.0, 1.0)])));
        assert!(is_closed(&seq(&[(1.0, 1.0), (2.0, 1.0), (1.0, 1.0)])));
        assert!(!is_closed(&seq(&[(1.0, 1.0), (2.0, 1.0)])));
    }

    #[test]
    fn emptiness_and_kind() {
        assert!(Geometry::MultiLine(vec![vec![]]).is_empty());
        assert!(Geometry::Collection(vec![]).is_empty());
        assert!(!Geometry::Point(Coord { x: 0.0, y: 0.0 }).is_empty());
        assert!(Geometry::MultiPolygon(vec![]).is_polygonal());
        assert!(!Geometry::Collection(vec![]).is_lineal());
    }

    #[test]
    fn scale_and_length() {
        let line = Geometry::Line(seq(&[(0.0, 0.0), (3.0, 4.0)]));
        assert_eq!(line.length(), 5.0);
        assert_eq!(line.scale(2.0).length(), 10.0);
        assert_eq!(line.num_points(), 2);
    }

    #[test]
    fn simplify_drops_collinear_points() {
        let line = Geometry::Line(seq(&[(0.0, 0.0), (1.0, 0.001), (2.0, 0.0)]));
        assert_eq!(line.simplify(0.1).num_points(), 2);
        assert_eq!(line.simplify(0.0).num_points(), 3);
    }

    #[test]
    fn geo_conversion_keeps_rings() {
        let polygon = Geometry::Polygon(PolygonRings::new(
            seq(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![seq(&[(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0), (1.0, 1.0)])],
        ));
        assert_eq!(Geometry::from_geo(&polygon.to_geo()), polygon);

        let rect = geo::Geometry::Rect(geo::Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }));
        let Geometry::Polygon(rings) = Geometry::from_geo(&rect) else { panic!("expected polygon") };
        assert_eq!(signed_area(&rings.shell).abs(), 1.0);
    }
}
