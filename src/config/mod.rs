use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod stackup;
use stackup::StackupConfig;

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    /// Fallbacks for Gerber files that leave parts of their state undeclared.
    pub gerber: GerberConfig,

    /// Fallbacks for drill files that leave parts of their state undeclared.
    pub drill: DrillConfig,

    /// Tolerances used when turning primitives into polygons.
    pub geometry: GeometryConfig,

    /// Layer thicknesses used to plan the board's 3D stack.
    pub stackup: StackupConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::get_path()?)
    }

    pub fn get_path() -> Result<PathBuf> {
        let home_dir = home::home_dir().context("Failed to get user's home directory.")?;
        Ok(home_dir.join(".config/pcb_stackup/config.yaml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = std::fs::read_to_string(path).context("Failed to read config file.")?;
        Self::from_yaml(&config)
    }

    pub fn from_yaml(config: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(config).context("Failed to decode config file.")?;

        Ok(config)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GerberConfig {
    /// Decimal places assumed until a format specification is seen.
    pub default_decimal_places: u32,

    /// Diameter in millimeters used when no aperture is active.
    pub default_aperture_diameter: f64,
}

impl Default for GerberConfig {
    fn default() -> Self {
        Self {
            default_decimal_places: 5,
            default_aperture_diameter: 0.2,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DrillConfig {
    /// Decimal places for bare integer coordinates when the file declares no format.
    pub default_decimal_places: u32,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            default_decimal_places: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GeometryConfig {
    /// Number of sides used to approximate a full circle.
    pub circle_segments: usize,

    /// Chord length in millimeters used when sampling arcs.
    pub distance_per_step: f64,

    /// Polygons with an area at or below this are discarded as slivers.
    pub area_epsilon: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            circle_segments: 24,
            distance_per_step: 0.05,
            area_epsilon: 1e-9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.gerber, GerberConfig::default());
        assert_eq!(config.geometry.circle_segments, 24);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_yaml(
            "gerber:\n  default_decimal_places: 6\ngeometry:\n  distance_per_step: 0.01\n",
        )
        .unwrap();

        assert_eq!(config.gerber.default_decimal_places, 6);
        assert_eq!(config.gerber.default_aperture_diameter, 0.2);
        assert_eq!(config.geometry.distance_per_step, 0.01);
        assert_eq!(config.geometry.area_epsilon, 1e-9);
        assert_eq!(config.drill.default_decimal_places, 5);
    }

    #[test]
    fn bad_yaml_is_an_error() {
        assert!(Config::from_yaml("gerber: [1, 2").is_err());
    }
}
