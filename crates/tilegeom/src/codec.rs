//! Vector tile command stream encoding.
//!
//! A geometry becomes a flat list of `i32`: a command header
//! `(count << 3) | id` followed by zigzag encoded `(dx, dy)` pairs relative to
//! a cursor that persists across sub-paths. Tile pixels are scaled onto a
//! 4096 unit grid per tile edge.

use geo::Coord;

use crate::error::{GeometryError, GeometryResult};
use crate::geometry::{signed_area, CoordSeq, Geometry, PolygonRings};
use crate::tile::TILE_SIZE;

/// Grid units per tile edge on the wire.
pub const EXTENT: u32 = 4096;

/// Grid units per tile pixel.
pub const GRID_SCALE: f64 = EXTENT as f64 / TILE_SIZE;

const MOVE_TO: i32 = 1;
const LINE_TO: i32 = 2;
const CLOSE_PATH: i32 = 7;

#[inline]
fn command(id: i32, count: usize) -> i32 { ((count as i32) << 3) | id }

#[inline]
pub fn zigzag_encode(n: i32) -> i32 { (n << 1) ^ (n >> 31) }

#[inline]
pub fn zigzag_decode(n: i32) -> i32 { ((n as u32 >> 1) as i32) ^ -(n & 1) }

/// Geometry type tag, with its wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeomType {
    Unknown = 0,
    Point = 1,
    Line = 2,
    Polygon = 3,
}

impl GeomType {
    pub fn of(geometry: &Geometry) -> Self {
        match geometry {
            _ if geometry.is_empty() => Self::Unknown,
            Geometry::Point(_) | Geometry::MultiPoint(_) => Self::Point,
            Geometry::Line(_) | Geometry::MultiLine(_) => Self::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Self::Polygon,
            Geometry::Collection(children) => {
                children.iter().find(|child| !child.is_empty()).map_or(Self::Unknown, Self::of)
            }
        }
    }
}

/// An encoded tile geometry. Equality compares the type and every command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VectorGeometry {
    commands: Vec<i32>,
    geom_type: GeomType,
}

impl VectorGeometry {
    #[inline] pub fn new(geom_type: GeomType, commands: Vec<i32>) -> Self { Self { commands, geom_type } }
    #[inline] pub fn commands(&self) -> &[i32] { &self.commands }
    #[inline] pub fn geom_type(&self) -> GeomType { self.geom_type }
    #[inline] pub fn is_empty(&self) -> bool { self.commands.is_empty() }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a tile-pixel geometry.
pub fn encode(geometry: &Geometry) -> VectorGeometry {
    let mut encoder = CommandEncoder::default();
    encoder.geometry(geometry);
    VectorGeometry::new(GeomType::of(geometry), encoder.commands)
}

#[derive(Default)]
struct CommandEncoder {
    commands: Vec<i32>,
    x: i32,
    y: i32,
}

impl CommandEncoder {
    fn geometry(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Point(c) => self.seq(&[*c], false, false),
            Geometry::MultiPoint(coords) => self.seq(coords, false, true),
            Geometry::Line(line) => self.seq(line, false, false),
            Geometry::MultiLine(lines) => lines.iter().for_each(|line| self.seq(line, false, false)),
            Geometry::Polygon(polygon) => self.polygon(polygon),
            Geometry::MultiPolygon(polygons) => polygons.iter().for_each(|polygon| self.polygon(polygon)),
            Geometry::Collection(children) => children.iter().for_each(|child| self.geometry(child)),
        }
    }

    fn polygon(&mut self, polygon: &PolygonRings) {
        for ring in polygon.rings() {
            self.seq(ring, true, false);
        }
    }

    fn seq(&mut self, coords: &[Coord<f64>], close: bool, multi_point: bool) {
        let Some(&first) = coords.first() else { return };
        let last_index = coords.len() - 1;
        self.commands.push(command(MOVE_TO, if multi_point { coords.len() } else { 1 }));

        let mut line_to: Option<usize> = None;
        let mut line_to_count = 0;
        for (i, c) in coords.iter().enumerate() {
            let x = (c.x * GRID_SCALE).round() as i32;
            let y = (c.y * GRID_SCALE).round() as i32;
            if i > 0 && !multi_point {
                if x == self.x && y == self.y {
                    continue;
                }
                // the close command stands in for the repeated first vertex
                if close && i == last_index && *c == first {
                    continue;
                }
            }
            self.commands.push(zigzag_encode(x - self.x));
            self.commands.push(zigzag_encode(y - self.y));
            self.x = x;
            self.y = y;

            if multi_point {
                continue;
            }
            if i == 0 {
                if coords.len() > 1 {
                    line_to = Some(self.commands.len());
                    self.commands.push(0);
                }
            } else {
                line_to_count += 1;
            }
        }

        if let Some(idx) = line_to {
            if line_to_count > 0 {
                self.commands[idx] = command(LINE_TO, line_to_count);
            } else {
                self.commands.remove(idx);
            }
        }
        if close {
            self.commands.push(command(CLOSE_PATH, 1));
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a command stream back into tile pixels.
pub fn decode(geometry: &VectorGeometry) -> GeometryResult<Geometry> {
    let commands = geometry.commands();
    if commands.is_empty() {
        return Err(GeometryError::decode("empty command stream"));
    }
    let geom_type = geometry.geom_type();
    if geom_type == GeomType::Unknown {
        return Err(GeometryError::decode("unknown geometry type"));
    }

    let mut paths: Vec<(CoordSeq, bool)> = Vec::new();
    let mut points: CoordSeq = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0;

    let next_coord = |i: &mut usize, x: &mut i32, y: &mut i32| -> GeometryResult<Coord<f64>> {
        let (Some(&dx), Some(&dy)) = (commands.get(*i), commands.get(*i + 1)) else {
            return Err(GeometryError::decode("truncated parameters"));
        };
        *i += 2;
        *x = x.checked_add(zigzag_decode(dx)).ok_or_else(|| GeometryError::decode("coordinate overflow"))?;
        *y = y.checked_add(zigzag_decode(dy)).ok_or_else(|| GeometryError::decode("coordinate overflow"))?;
        Ok(Coord { x: f64::from(*x) / GRID_SCALE, y: f64::from(*y) / GRID_SCALE })
    };

    while i < commands.len() {
        let header = commands[i];
        i += 1;
        let id = header & 0x7;
        let count = (header as u32 >> 3) as usize;
        match id {
            MOVE_TO => {
                if count == 0 {
                    return Err(GeometryError::decode("MoveTo with zero count"));
                }
                if geom_type != GeomType::Point && count != 1 {
                    return Err(GeometryError::decode(format!("MoveTo count {count} outside a point geometry")));
                }
                for _ in 0..count {
                    let c = next_coord(&mut i, &mut x, &mut y)?;
                    if geom_type == GeomType::Point {
                        points.push(c);
                    } else {
                        paths.push((vec![c], false));
                    }
                }
            }
            LINE_TO => {
                if geom_type == GeomType::Point {
                    return Err(GeometryError::decode("LineTo in a point geometry"));
                }
                let Some((path, _)) = paths.last_mut() else {
                    return Err(GeometryError::decode("LineTo before MoveTo"));
                };
                for _ in 0..count {
                    path.push(next_coord(&mut i, &mut x, &mut y)?);
                }
            }
            CLOSE_PATH => {
                if geom_type != GeomType::Polygon {
                    return Err(GeometryError::decode("ClosePath outside a polygon"));
                }
                if count != 1 {
                    return Err(GeometryError::decode(format!("ClosePath count {count}")));
                }
                let Some((path, closed)) = paths.last_mut() else {
                    return Err(GeometryError::decode("ClosePath before MoveTo"));
                };
                path.push(path[0]);
                *closed = true;
            }
            other => return Err(GeometryError::decode(format!("unknown command id {other}"))),
        }
    }

    match geom_type {
        GeomType::Point => Ok(match points.len() {
            1 => Geometry::Point(points[0]),
            _ => Geometry::MultiPoint(points),
        }),
        GeomType::Line => {
            let mut lines: Vec<CoordSeq> = paths.into_iter().map(|(path, _)| path).filter(|path| path.len() >= 2).collect();
            Ok(match lines.len() {
                1 => Geometry::Line(lines.swap_remove(0)),
                _ => Geometry::MultiLine(lines),
            })
        }
        GeomType::Polygon => decode_polygons(paths),
        GeomType::Unknown => Err(GeometryError::decode("unknown geometry type")),
    }
}

/// Group closed rings into polygons by winding: rings matching the first
/// ring's winding start a polygon, the others are its holes.
fn decode_polygons(paths: Vec<(CoordSeq, bool)>) -> GeometryResult<Geometry> {
    let mut polygons: Vec<PolygonRings> = Vec::new();
    let mut outer_positive: Option<bool> = None;
    for (ring, closed) in paths {
        if !closed {
            return Err(GeometryError::decode("polygon ring without ClosePath"));
        }
        let area = signed_area(&ring);
        if ring.len() < 4 || area == 0.0 {
            continue;
        }
        let positive = area > 0.0;
        let outer = *outer_positive.get_or_insert(positive);
        if positive != outer {
            if let Some(polygon) = polygons.last_mut() {
                polygon.holes.push(ring);
                continue;
            }
        }
        polygons.push(PolygonRings::new(ring, Vec::new()));
    }
    Ok(match polygons.len() {
        1 => Geometry::Polygon(polygons.swap_remove(0)),
        _ => Geometry::MultiPolygon(polygons),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_small_magnitudes() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(160), 320);
        for n in [0, 1, -1, 4096, -4096, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn command_headers() {
        assert_eq!(command(MOVE_TO, 1), 9);
        assert_eq!(command(LINE_TO, 2), 18);
        assert_eq!(command(CLOSE_PATH, 1), 15);
    }

    #[test]
    fn geom_type_of_collection_uses_first_non_empty() {
        let geometry = Geometry::Collection(vec![
            Geometry::MultiPoint(vec![]),
            Geometry::Line(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }]),
        ]);
        assert_eq!(GeomType::of(&geometry), GeomType::Line);
        assert_eq!(GeomType::of(&Geometry::Collection(vec![])), GeomType::Unknown);
    }

    #[test]
    fn empty_geometry_has_no_commands() {
        let encoded = encode(&Geometry::MultiLine(vec![]));
        assert!(encoded.is_empty());
        assert_eq!(encoded.geom_type(), GeomType::Unknown);
    }
}
