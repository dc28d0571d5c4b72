//! Conversion of raw integer coordinate tokens into millimeters.

use nalgebra::Vector2;

use crate::parsing::UnitMode;

/// Modal numeric format of a coordinate stream. Both fields persist until a new format or unit
/// command replaces them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFormat {
    pub decimal_places: u32,
    pub unit_scale: f64,
}

impl CoordinateFormat {
    pub fn new(decimal_places: u32, unit_mode: UnitMode) -> Self {
        Self {
            decimal_places,
            unit_scale: unit_mode.scale(),
        }
    }

    pub fn set_unit_mode(&mut self, unit_mode: UnitMode) {
        self.unit_scale = unit_mode.scale();
    }

    /// `raw / 10^D * U`
    pub fn to_millimeters(&self, raw: i64) -> f64 {
        raw as f64 / 10f64.powi(self.decimal_places as i32) * self.unit_scale
    }

    /// A missing token carries the current value forward.
    pub fn resolve_axis(&self, raw: Option<i64>, current: f64) -> f64 {
        raw.map(|raw| self.to_millimeters(raw)).unwrap_or(current)
    }

    pub fn resolve_point(
        &self,
        x: Option<i64>,
        y: Option<i64>,
        current: Vector2<f64>,
    ) -> Vector2<f64> {
        Vector2::new(
            self.resolve_axis(x, current.x),
            self.resolve_axis(y, current.y),
        )
    }

    /// Offsets are relative values, so a missing token means zero rather than carry-forward.
    pub fn resolve_offset(&self, i: Option<i64>, j: Option<i64>) -> Vector2<f64> {
        Vector2::new(self.resolve_axis(i, 0.0), self.resolve_axis(j, 0.0))
    }
}
