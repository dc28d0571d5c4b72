//! Circular interpolation: turning a start point, an end point and a center offset into an arc
//! that travels in the requested rotational sense.

use nalgebra::Vector2;
use thiserror::Error;

/// Difference between the start and end radius above which a warning is logged.
const RADIUS_MISMATCH_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,        // G02
    CounterClockwise, // G03
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArcError {
    #[error("arc has zero radius")]
    ZeroRadius,

    #[error("arc start and end points coincide")]
    CoincidentPoints,
}

/// A resolved arc. Angles are in degrees, in a Y-up frame: positive sweeps run counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcPath {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
    pub center: Vector2<f64>,
    pub radius: f64,

    /// Normalized to [0, 360).
    pub start_angle: f64,
    pub sweep: f64,
}

/// `center_offset` is relative to `start`.
pub fn resolve_arc(
    start: Vector2<f64>,
    end: Vector2<f64>,
    center_offset: Vector2<f64>,
    direction: ArcDirection,
) -> Result<ArcPath, ArcError> {
    let center = start + center_offset;

    let radius = (start - center).norm();
    if radius == 0.0 {
        return Err(ArcError::ZeroRadius);
    }

    if start == end {
        return Err(ArcError::CoincidentPoints);
    }

    let end_radius = (end - center).norm();
    if (end_radius - radius).abs() > RADIUS_MISMATCH_TOLERANCE {
        log::debug!(
            "Arc radius mismatch: start radius {} end radius {}.",
            radius,
            end_radius
        );
    }

    let start_angle = angle_of(start - center);
    let end_angle = angle_of(end - center);

    let sweep = match direction {
        ArcDirection::Clockwise => {
            if end_angle <= start_angle {
                end_angle - start_angle
            } else {
                end_angle - start_angle - 360.0
            }
        }
        ArcDirection::CounterClockwise => {
            if end_angle >= start_angle {
                end_angle - start_angle
            } else {
                end_angle - start_angle + 360.0
            }
        }
    };

    if sweep == 0.0 {
        // Same bearing from the center but different distances.
        return Err(ArcError::CoincidentPoints);
    }

    Ok(ArcPath {
        start,
        end,
        center,
        radius,
        start_angle,
        sweep,
    })
}

impl ArcPath {
    pub fn direction(&self) -> ArcDirection {
        if self.sweep < 0.0 {
            ArcDirection::Clockwise
        } else {
            ArcDirection::CounterClockwise
        }
    }

    pub fn length(&self) -> f64 {
        self.sweep.abs().to_radians() * self.radius
    }

    pub fn point_at(&self, angle: f64, radius: f64) -> Vector2<f64> {
        let (sin, cos) = angle.to_radians().sin_cos();
        self.center + Vector2::new(cos, sin) * radius
    }

    /// Number of chords used to approximate the arc.
    pub fn steps(&self, distance_per_step: f64) -> usize {
        ((self.length() / distance_per_step).ceil() as usize).max(1)
    }

    /// Angles of the chord endpoints from start to end, inclusive.
    pub fn sample_angles(&self, distance_per_step: f64) -> Vec<f64> {
        let steps = self.steps(distance_per_step);
        (0..=steps)
            .map(|step_index| self.start_angle + self.sweep * step_index as f64 / steps as f64)
            .collect()
    }

    /// Mirror across the X axis. The rotational sense inverts with it.
    pub fn flip_y(&self) -> Self {
        let flip = |point: Vector2<f64>| Vector2::new(point.x, -point.y);

        Self {
            start: flip(self.start),
            end: flip(self.end),
            center: flip(self.center),
            radius: self.radius,
            start_angle: normalize_degrees(-self.start_angle),
            sweep: -self.sweep,
        }
    }
}

fn angle_of(vector: Vector2<f64>) -> f64 {
    normalize_degrees(vector.y.atan2(vector.x).to_degrees())
}

fn normalize_degrees(angle: f64) -> f64 {
    let angle = angle.rem_euclid(360.0);
    if angle >= 360.0 {
        0.0
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn point_on_circle(center: Vector2<f64>, radius: f64, angle: f64) -> Vector2<f64> {
        let (sin, cos) = angle.to_radians().sin_cos();
        center + Vector2::new(cos, sin) * radius
    }

    #[test]
    fn quarter_circle_counter_clockwise() {
        let arc = resolve_arc(
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .unwrap();

        assert_eq!(arc.center, Vector2::new(0.0, 0.0));
        assert_relative_eq!(arc.radius, 1.0);
        assert_abs_diff_eq!(arc.start_angle, 0.0);
        assert_abs_diff_eq!(arc.sweep, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn same_points_clockwise_take_the_long_way() {
        let arc = resolve_arc(
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
            ArcDirection::Clockwise,
        )
        .unwrap();

        assert_abs_diff_eq!(arc.sweep, -270.0, epsilon = 1e-9);
        assert_eq!(arc.direction(), ArcDirection::Clockwise);
    }

    #[test]
    fn zero_radius_is_degenerate() {
        assert_eq!(
            resolve_arc(
                Vector2::new(1.0, 1.0),
                Vector2::new(2.0, 2.0),
                Vector2::zeros(),
                ArcDirection::Clockwise,
            ),
            Err(ArcError::ZeroRadius)
        );
    }

    #[test]
    fn coincident_points_are_degenerate() {
        assert_eq!(
            resolve_arc(
                Vector2::new(1.0, 1.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(1.0, 0.0),
                ArcDirection::CounterClockwise,
            ),
            Err(ArcError::CoincidentPoints)
        );
    }

    #[test]
    fn generated_arcs_resolve_to_their_own_sweep() {
        let centers = [Vector2::new(0.0, 0.0), Vector2::new(-12.5, 40.25)];
        let radii = [0.1, 3.0, 150.0];
        let start_angles = [0.0, 37.0, 179.5, 300.0];
        let sweeps = [10.0, 90.0, 181.0, 350.0];

        for center in centers {
            for radius in radii {
                for start_angle in start_angles {
                    for magnitude in sweeps {
                        for direction in [ArcDirection::Clockwise, ArcDirection::CounterClockwise]
                        {
                            let sweep = match direction {
                                ArcDirection::Clockwise => -magnitude,
                                ArcDirection::CounterClockwise => magnitude,
                            };
                            let start = point_on_circle(center, radius, start_angle);
                            let end = point_on_circle(center, radius, start_angle + sweep);

                            let arc = resolve_arc(start, end, center - start, direction).unwrap();

                            assert_eq!(arc.direction(), direction);
                            assert_abs_diff_eq!(arc.sweep, sweep, epsilon = 1e-6);

                            let angles = arc.sample_angles(radius / 10.0);
                            let first = arc.point_at(angles[0], arc.radius);
                            let last = arc.point_at(angles[angles.len() - 1], arc.radius);
                            assert_abs_diff_eq!((first - start).norm(), 0.0, epsilon = 1e-9);
                            assert_abs_diff_eq!((last - end).norm(), 0.0, epsilon = 1e-6);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn samples_stay_on_the_circle() {
        let arc = resolve_arc(
            Vector2::new(5.0, 0.0),
            Vector2::new(-5.0, 0.0),
            Vector2::new(-5.0, 0.0),
            ArcDirection::Clockwise,
        )
        .unwrap();

        let angles = arc.sample_angles(0.5);
        assert!(angles.len() > 10);
        for point in angles.into_iter().map(|angle| arc.point_at(angle, arc.radius)) {
            assert_relative_eq!(point.norm(), 5.0, epsilon = 1e-9);
            assert!(point.y <= 1e-9, "clockwise from +X to -X passes below: {}", point);
        }
    }

    #[test]
    fn flipping_inverts_direction_and_keeps_points_on_arc() {
        let arc = resolve_arc(
            Vector2::new(2.0, 1.0),
            Vector2::new(1.0, 2.0),
            Vector2::new(-1.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .unwrap();
        let flipped = arc.flip_y();

        assert_eq!(flipped.direction(), ArcDirection::Clockwise);
        assert_eq!(flipped.start, Vector2::new(2.0, -1.0));
        assert_eq!(flipped.end, Vector2::new(1.0, -2.0));

        let middle = flipped.point_at(flipped.start_angle + flipped.sweep / 2.0, flipped.radius);
        let original_middle = arc.point_at(arc.start_angle + arc.sweep / 2.0, arc.radius);
        assert_relative_eq!(middle.x, original_middle.x, epsilon = 1e-9);
        assert_relative_eq!(middle.y, -original_middle.y, epsilon = 1e-9);
    }
}
