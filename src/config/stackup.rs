use serde::Deserialize;
use uom::si::length::{millimeter, Length};

use crate::parsing::parse_quantity;

pub type Millimeters = Length<uom::si::SI<f64>, f64>;

fn millimeters(value: f64) -> Millimeters {
    Millimeters::new::<millimeter>(value)
}

/// Physical thicknesses of the board and the films stacked on it. Values are written with their
/// unit, for example `board_thickness: "1.6 mm"` or `board_thickness: "62 mil"`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct StackupConfig {
    #[serde(deserialize_with = "parse_quantity")]
    pub board_thickness: Millimeters,

    #[serde(deserialize_with = "parse_quantity")]
    pub copper_thickness: Millimeters,

    #[serde(deserialize_with = "parse_quantity")]
    pub silk_thickness: Millimeters,

    #[serde(deserialize_with = "parse_quantity")]
    pub mask_thickness: Millimeters,

    #[serde(deserialize_with = "parse_quantity")]
    pub paste_thickness: Millimeters,

    /// Added to the substrate and drill heights so coplanar faces do not z-fight.
    #[serde(deserialize_with = "parse_quantity")]
    pub epsilon: Millimeters,

    /// Outline polygons at or below this area (mm²) are ignored when picking the board shape.
    pub outline_area_epsilon: f64,
}

impl Default for StackupConfig {
    fn default() -> Self {
        Self {
            board_thickness: millimeters(1.6),
            copper_thickness: millimeters(0.035),
            silk_thickness: millimeters(0.015),
            mask_thickness: millimeters(0.01),
            paste_thickness: millimeters(0.1),
            epsilon: millimeters(0.001),
            outline_area_epsilon: 1e-6,
        }
    }
}

/// The stackup with every length resolved to millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thicknesses {
    pub board: f64,
    pub copper: f64,
    pub silk: f64,
    pub mask: f64,
    pub paste: f64,
    pub epsilon: f64,
}

impl StackupConfig {
    pub fn thicknesses(&self) -> Thicknesses {
        Thicknesses {
            board: self.board_thickness.get::<millimeter>(),
            copper: self.copper_thickness.get::<millimeter>(),
            silk: self.silk_thickness.get::<millimeter>(),
            mask: self.mask_thickness.get::<millimeter>(),
            paste: self.paste_thickness.get::<millimeter>(),
            epsilon: self.epsilon.get::<millimeter>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_match_a_standard_board() {
        let thicknesses = StackupConfig::default().thicknesses();
        assert_relative_eq!(thicknesses.board, 1.6, epsilon = 1e-12);
        assert_relative_eq!(thicknesses.copper, 0.035, epsilon = 1e-12);
        assert_relative_eq!(thicknesses.paste, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn lengths_accept_units() {
        let config: StackupConfig =
            serde_yaml::from_str("board_thickness: \"62 mil\"\ncopper_thickness: \"0.07 mm\"\n")
                .unwrap();
        let thicknesses = config.thicknesses();

        assert_relative_eq!(thicknesses.board, 1.5748, epsilon = 1e-9);
        assert_relative_eq!(thicknesses.copper, 0.07, epsilon = 1e-12);
        assert_relative_eq!(thicknesses.silk, 0.015, epsilon = 1e-12);
    }
}
