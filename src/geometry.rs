//! Decoded primitives and their conversion into closed, valid polygons.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use geo::{
    algorithm::line_intersection::{line_intersection, LineIntersection},
    algorithm::orient::{Direction, Orient},
    Area, BooleanOps, Contains, Coord, Line, LineString, MultiPolygon, Point, Polygon,
};
use itertools::Itertools;
use nalgebra::Vector2;
use ordered_float::NotNan;

use crate::{
    arc::ArcPath,
    config::GeometryConfig,
    diagnostics::{Diagnostics, Issue},
};

/// Something a decoder drew. All lengths are millimeters.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// A swept aperture with round caps and joins.
    Stroke { path: StrokePath, width: f64 },

    /// A single stamp of an aperture.
    Flash {
        shape: FlashShape,
        position: Vector2<f64>,
    },

    /// A closed ring, first vertex equal to the last.
    FilledRegion { path: Vec<Vector2<f64>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrokePath {
    Line {
        start: Vector2<f64>,
        end: Vector2<f64>,
    },
    Arc(ArcPath),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlashShape {
    Circle {
        diameter: f64,
    },
    Rectangle {
        width: f64,
        height: f64,
    },
    /// A rounded rectangle whose corner radius is half the smaller side.
    Obround {
        width: f64,
        height: f64,
    },
    Polygon {
        diameter: f64,
        vertices: u32,
        rotation: f64,
    },
}

fn flip(point: Vector2<f64>) -> Vector2<f64> {
    Vector2::new(point.x, -point.y)
}

fn to_coord(point: Vector2<f64>) -> Coord<f64> {
    Coord {
        x: point.x,
        y: point.y,
    }
}

impl Primitive {
    /// Mirror across the X axis, turning the file's Y-up frame into a Y-down display frame.
    pub fn flip_y(&self) -> Self {
        match self {
            Primitive::Stroke { path, width } => Primitive::Stroke {
                path: match path {
                    StrokePath::Line { start, end } => StrokePath::Line {
                        start: flip(*start),
                        end: flip(*end),
                    },
                    StrokePath::Arc(arc) => StrokePath::Arc(arc.flip_y()),
                },
                width: *width,
            },
            Primitive::Flash { shape, position } => Primitive::Flash {
                shape: *shape,
                position: flip(*position),
            },
            Primitive::FilledRegion { path } => Primitive::FilledRegion {
                path: path.iter().copied().map(flip).collect(),
            },
        }
    }

    /// The outline rings of this primitive. Rings are not yet closed or validated.
    pub fn outline_rings(&self, config: &GeometryConfig) -> Vec<Vec<Coord<f64>>> {
        match self {
            Primitive::Stroke { path, width } => vec![stroke_outline(path, *width, config)],
            Primitive::Flash { shape, position } => vec![flash_outline(shape, *position, config)],
            Primitive::FilledRegion { path } => {
                vec![path.iter().copied().map(to_coord).collect()]
            }
        }
    }
}

/// `segments + 1` points on a circular arc around `center`, angles in radians.
fn arc_points(
    center: Vector2<f64>,
    radius: f64,
    from_angle: f64,
    sweep: f64,
    segments: usize,
) -> impl Iterator<Item = Coord<f64>> {
    let segments = segments.max(1);
    (0..=segments).map(move |step_index| {
        let angle = from_angle + sweep * step_index as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        to_coord(center + Vector2::new(cos, sin) * radius)
    })
}

fn circle_outline(center: Vector2<f64>, radius: f64, samples: usize) -> Vec<Coord<f64>> {
    (0..samples)
        .map(|sample| {
            let angle = TAU * sample as f64 / samples as f64;
            let (sin, cos) = angle.sin_cos();
            to_coord(center + Vector2::new(cos, sin) * radius)
        })
        .collect()
}

fn stroke_outline(path: &StrokePath, width: f64, config: &GeometryConfig) -> Vec<Coord<f64>> {
    let half_width = width / 2.0;
    let cap_segments = (config.circle_segments / 2).max(2);

    match path {
        StrokePath::Line { start, end } => {
            let direction = end - start;
            if direction.norm() == 0.0 {
                return circle_outline(*start, half_width, config.circle_segments);
            }

            let perpendicular = Vector2::new(-direction.y, direction.x).normalize();
            let side_angle = perpendicular.y.atan2(perpendicular.x);

            // Round cap around the end, then back along the other side around the start.
            arc_points(*end, half_width, side_angle, -PI, cap_segments)
                .chain(arc_points(
                    *start,
                    half_width,
                    side_angle + PI,
                    -PI,
                    cap_segments,
                ))
                .collect()
        }
        StrokePath::Arc(arc) => {
            let angles = arc.sample_angles(config.distance_per_step);
            let outer_radius = arc.radius + half_width;
            let inner_radius = (arc.radius - half_width).max(0.0);
            let turn = arc.sweep.signum() * PI;

            let end_angle = (arc.start_angle + arc.sweep).to_radians();
            let start_angle = arc.start_angle.to_radians();

            angles
                .iter()
                .map(|angle| to_coord(arc.point_at(*angle, outer_radius)))
                .chain(arc_points(arc.end, half_width, end_angle, turn, cap_segments))
                .chain(
                    angles
                        .iter()
                        .rev()
                        .map(|angle| to_coord(arc.point_at(*angle, inner_radius))),
                )
                .chain(arc_points(
                    arc.start,
                    half_width,
                    start_angle + PI,
                    turn,
                    cap_segments,
                ))
                .collect()
        }
    }
}

fn rounded_rectangle(
    position: Vector2<f64>,
    width: f64,
    height: f64,
    corner_radius: f64,
    config: &GeometryConfig,
) -> Vec<Coord<f64>> {
    let half_width = width / 2.0 - corner_radius;
    let half_height = height / 2.0 - corner_radius;
    let corner_segments = (config.circle_segments / 4).max(1);

    [
        (Vector2::new(half_width, half_height), 0.0),
        (Vector2::new(-half_width, half_height), PI / 2.0),
        (Vector2::new(-half_width, -half_height), PI),
        (Vector2::new(half_width, -half_height), 3.0 * PI / 2.0),
    ]
    .into_iter()
    .flat_map(|(corner, angle)| {
        arc_points(
            position + corner,
            corner_radius,
            angle,
            PI / 2.0,
            corner_segments,
        )
    })
    .collect()
}

fn flash_outline(
    shape: &FlashShape,
    position: Vector2<f64>,
    config: &GeometryConfig,
) -> Vec<Coord<f64>> {
    match *shape {
        FlashShape::Circle { diameter } => {
            circle_outline(position, diameter / 2.0, config.circle_segments)
        }
        FlashShape::Rectangle { width, height } => {
            let left = position.x - width / 2.0;
            let right = position.x + width / 2.0;
            let top = position.y - height / 2.0;
            let bottom = position.y + height / 2.0;

            vec![
                Coord { x: left, y: top },
                Coord { x: right, y: top },
                Coord { x: right, y: bottom },
                Coord { x: left, y: bottom },
                Coord { x: left, y: top },
            ]
        }
        FlashShape::Obround { width, height } => {
            rounded_rectangle(position, width, height, width.min(height) / 2.0, config)
        }
        FlashShape::Polygon {
            diameter,
            vertices,
            rotation,
        } => {
            let vertices = vertices.max(3) as usize;
            let rotation = rotation.to_radians();
            (0..vertices)
                .map(|vertex| {
                    let angle = rotation + TAU * vertex as f64 / vertices as f64;
                    let (sin, cos) = angle.sin_cos();
                    to_coord(position + Vector2::new(cos, sin) * (diameter / 2.0))
                })
                .collect()
        }
    }
}

fn coordinate_key(coord: &Coord<f64>) -> Option<(NotNan<f64>, NotNan<f64>)> {
    Some((NotNan::new(coord.x).ok()?, NotNan::new(coord.y).ok()?))
}

/// Segments of a closed ring.
fn ring_lines(ring: &[Coord<f64>]) -> Vec<Line<f64>> {
    ring.iter()
        .tuple_windows()
        .map(|(start, end)| Line::new(*start, *end))
        .collect()
}

fn are_neighbours(first: usize, second: usize, segment_count: usize) -> bool {
    second == first + 1 || (first == 0 && second + 1 == segment_count)
}

/// True when no two segments of the closed ring cross, touch or overlap apart from neighbours
/// sharing their common vertex.
pub fn is_simple_ring(ring: &[Coord<f64>]) -> bool {
    let lines = ring_lines(ring);
    let segment_count = lines.len();

    for first in 0..segment_count {
        for second in (first + 1)..segment_count {
            match line_intersection(lines[first], lines[second]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. })
                    if are_neighbours(first, second, segment_count) => {}
                Some(_) => return false,
            }
        }
    }

    true
}

/// Splits a self-intersecting closed ring into the simple loops it is made of. Every crossing is
/// inserted as a vertex into both segments, then the ring is walked and each time a vertex
/// repeats the loop since its first visit is cut off.
fn split_self_intersections(ring: &[Coord<f64>]) -> Vec<Vec<Coord<f64>>> {
    let lines = ring_lines(ring);
    let segment_count = lines.len();
    let mut crossings: Vec<Vec<Coord<f64>>> = vec![Vec::new(); segment_count];

    for first in 0..segment_count {
        for second in (first + 1)..segment_count {
            let points = match line_intersection(lines[first], lines[second]) {
                None => continue,
                Some(LineIntersection::SinglePoint { .. })
                    if are_neighbours(first, second, segment_count) =>
                {
                    continue
                }
                Some(LineIntersection::SinglePoint { intersection, .. }) => vec![intersection],
                Some(LineIntersection::Collinear { intersection }) => {
                    vec![intersection.start, intersection.end]
                }
            };

            crossings[first].extend(points.iter().copied());
            crossings[second].extend(points);
        }
    }

    let mut expanded = Vec::with_capacity(ring.len());
    for (line, mut points) in lines.iter().zip(crossings) {
        let delta = line.delta();
        let length_squared = delta.x * delta.x + delta.y * delta.y;
        let parameter = |point: &Coord<f64>| {
            ((point.x - line.start.x) * delta.x + (point.y - line.start.y) * delta.y)
                / length_squared
        };

        points.sort_by(|a, b| parameter(a).total_cmp(&parameter(b)));

        expanded.push(line.start);
        expanded.extend(
            points
                .into_iter()
                .filter(|point| *point != line.start && *point != line.end)
                .dedup(),
        );
    }

    let mut loops = Vec::new();
    let mut stack: Vec<Coord<f64>> = Vec::new();
    let mut visited = HashMap::new();

    for point in expanded {
        let Some(key) = coordinate_key(&point) else {
            continue;
        };

        if let Some(&index) = visited.get(&key) {
            let mut cut: Vec<_> = stack.drain(index..).collect();
            for removed in cut.iter().skip(1) {
                if let Some(removed_key) = coordinate_key(removed) {
                    visited.remove(&removed_key);
                }
            }
            cut.push(point);
            loops.push(cut);
            stack.push(point);
        } else {
            visited.insert(key, stack.len());
            stack.push(point);
        }
    }

    if let Some(first) = stack.first().copied() {
        stack.push(first);
        loops.push(stack);
    }

    loops
}

/// Winding number of the closed `ring` around `point`.
fn winding_number(ring: &[Coord<f64>], point: Coord<f64>) -> i32 {
    ring.iter().tuple_windows().fold(0, |winding, (start, end)| {
        let side =
            (end.x - start.x) * (point.y - start.y) - (point.x - start.x) * (end.y - start.y);

        if start.y <= point.y && end.y > point.y && side > 0.0 {
            winding + 1
        } else if start.y > point.y && end.y <= point.y && side < 0.0 {
            winding - 1
        } else {
            winding
        }
    })
}

/// A point just inside a simple closed ring, next to the middle of its longest edge.
fn point_inside(ring: &[Coord<f64>]) -> Option<Coord<f64>> {
    let line = ring_lines(ring)
        .into_iter()
        .max_by(|first, second| {
            let first = first.dx().hypot(first.dy());
            first.total_cmp(&second.dx().hypot(second.dy()))
        })?;

    let delta = line.delta();
    let length = delta.x.hypot(delta.y);
    if length == 0.0 {
        return None;
    }

    // The interior lies to the left of a counter-clockwise ring.
    let side = Polygon::new(LineString(ring.to_vec()), vec![])
        .signed_area()
        .signum();
    let offset = length * 1e-6 * side;
    let middle = line.start + delta / 2.0;

    Some(Coord {
        x: middle.x - delta.y / length * offset,
        y: middle.y + delta.x / length * offset,
    })
}

/// Split every component whose exterior pinches into itself. Holes go to the piece that
/// surrounds them.
fn split_pinched(merged: MultiPolygon<f64>, area_epsilon: f64) -> Vec<Polygon<f64>> {
    merged
        .into_iter()
        .flat_map(|polygon| {
            if is_simple_ring(&polygon.exterior().0) {
                return vec![polygon];
            }

            let (exterior, interiors) = polygon.into_inner();
            split_self_intersections(&exterior.0)
                .into_iter()
                .filter(|part| part.len() >= 4 && is_simple_ring(part))
                .map(|part| {
                    let outline = Polygon::new(LineString(part), vec![]);
                    let holes = interiors
                        .iter()
                        .filter(|hole| {
                            point_inside(&hole.0)
                                .is_some_and(|point| outline.contains(&Point::from(point)))
                        })
                        .cloned()
                        .collect();

                    Polygon::new(outline.into_inner().0, holes).orient(Direction::Default)
                })
                .collect()
        })
        .filter(|polygon| polygon.unsigned_area() > area_epsilon)
        .collect()
}

/// Close the ring if needed, repair self-intersections and keep only the valid parts whose area is
/// above `area_epsilon`. Exteriors come out counter-clockwise.
///
/// A self-intersecting ring is filled by the non-zero winding rule: it is cut into simple loops,
/// and a loop the ring winds around zero times becomes a hole in whatever surrounds it.
pub fn close_and_repair(points: &[Coord<f64>], area_epsilon: f64) -> Vec<Polygon<f64>> {
    let mut ring: Vec<Coord<f64>> = points
        .iter()
        .copied()
        .filter(|point| point.x.is_finite() && point.y.is_finite())
        .dedup()
        .collect();

    if ring.first() != ring.last() {
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
    }

    // A triangle needs three distinct vertices plus the closing one.
    if ring.len() < 4 {
        return Vec::new();
    }

    if is_simple_ring(&ring) {
        let polygon = Polygon::new(LineString(ring), vec![]).orient(Direction::Default);
        return if polygon.unsigned_area() > area_epsilon {
            vec![polygon]
        } else {
            Vec::new()
        };
    }

    let mut loops: Vec<(Polygon<f64>, bool)> = split_self_intersections(&ring)
        .into_iter()
        .filter(|part| part.len() >= 4 && is_simple_ring(part))
        .filter_map(|part| {
            let filled = winding_number(&ring, point_inside(&part)?) != 0;
            let polygon = Polygon::new(LineString(part), vec![]).orient(Direction::Default);
            (polygon.unsigned_area() > area_epsilon).then_some((polygon, filled))
        })
        .collect();

    if loops.iter().all(|(_, filled)| *filled) {
        return loops.into_iter().map(|(polygon, _)| polygon).collect();
    }

    // Loops never cross each other, so a loop nested inside another is always the smaller one.
    loops.sort_by(|(first, _), (second, _)| {
        second.unsigned_area().total_cmp(&first.unsigned_area())
    });
    let merged = loops
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |merged, (polygon, filled)| {
            let part = MultiPolygon::new(vec![polygon]);
            if filled {
                merged.union(&part)
            } else {
                merged.difference(&part)
            }
        });

    split_pinched(merged, area_epsilon)
}

/// Merge overlapping polygons, keeping their holes. Slivers left behind by the union are dropped,
/// and a component whose outline pinches into itself is split apart.
pub fn union_polygons(polygons: Vec<Polygon<f64>>, area_epsilon: f64) -> Vec<Polygon<f64>> {
    let merged = polygons
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |merged, polygon| {
            merged.union(&MultiPolygon::new(vec![polygon]))
        });

    split_pinched(merged, area_epsilon)
}

/// Convert every primitive to polygons and union the result. A primitive that yields nothing
/// usable is recorded and skipped.
pub fn extract_polygons(
    primitives: &[Primitive],
    config: &GeometryConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<Polygon<f64>> {
    let mut polygons = Vec::new();

    for primitive in primitives {
        let before = polygons.len();
        for ring in primitive.outline_rings(config) {
            polygons.extend(close_and_repair(&ring, config.area_epsilon));
        }

        if polygons.len() == before {
            log::debug!("Primitive produced no polygon: {:?}", primitive);
            diagnostics.push(None, Issue::DegeneratePolygon);
        }
    }

    union_polygons(polygons, config.area_epsilon)
}
