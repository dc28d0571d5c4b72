use std::collections::HashMap;

use crate::parsing::gerber::ApertureTemplate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApertureShape {
    Circle,
    Rectangle,
    Obround,
    Polygon,
    Macro(String),
}

/// An aperture with its parameters already converted to millimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureDefinition {
    pub code: u32,
    pub shape: ApertureShape,
    pub params: Vec<f64>,
}

impl ApertureDefinition {
    /// Builds a definition from a parsed template, scaling every length by `unit_scale`.
    /// Polygon vertex counts and rotations are not lengths and are left alone.
    pub fn from_template(code: u32, template: &ApertureTemplate, unit_scale: f64) -> Self {
        let (shape, params) = match template {
            ApertureTemplate::Circle {
                diameter,
                hole_diameter,
            } => (
                ApertureShape::Circle,
                std::iter::once(*diameter)
                    .chain(*hole_diameter)
                    .map(|length| length * unit_scale)
                    .collect(),
            ),
            ApertureTemplate::Rectangle {
                width,
                height,
                hole_diameter,
            } => (
                ApertureShape::Rectangle,
                [*width, *height]
                    .into_iter()
                    .chain(*hole_diameter)
                    .map(|length| length * unit_scale)
                    .collect(),
            ),
            ApertureTemplate::Obround {
                width,
                height,
                hole_diameter,
            } => (
                ApertureShape::Obround,
                [*width, *height]
                    .into_iter()
                    .chain(*hole_diameter)
                    .map(|length| length * unit_scale)
                    .collect(),
            ),
            ApertureTemplate::Polygon {
                diameter,
                num_vertices,
                rotation,
                hole_diameter,
            } => {
                let mut params = vec![
                    diameter * unit_scale,
                    *num_vertices as f64,
                    rotation.unwrap_or(0.0),
                ];
                params.extend(hole_diameter.map(|hole| hole * unit_scale));
                (ApertureShape::Polygon, params)
            }
            ApertureTemplate::Macro { name, arguments } => (
                ApertureShape::Macro(name.fragment().to_string()),
                arguments.iter().map(|value| value * unit_scale).collect(),
            ),
        };

        Self {
            code,
            shape,
            params,
        }
    }

    /// Width of a stroke drawn with this aperture: the diameter of a circle, otherwise the first
    /// parameter.
    pub fn primary_dimension(&self) -> Option<f64> {
        self.params.first().copied()
    }

    /// Second dimension for box shaped apertures; a missing one means a square.
    pub fn secondary_dimension(&self) -> Option<f64> {
        self.params.get(1).copied().or_else(|| self.primary_dimension())
    }
}

/// Apertures seen so far in one file. Redefining a code replaces the previous entry.
#[derive(Debug, Default)]
pub struct ApertureTable {
    apertures: HashMap<u32, ApertureDefinition>,
}

impl ApertureTable {
    pub fn define(&mut self, definition: ApertureDefinition) {
        if let Some(previous) = self.apertures.insert(definition.code, definition) {
            log::debug!("Aperture D{} has been redefined.", previous.code);
        }
    }

    pub fn get(&self, code: u32) -> Option<&ApertureDefinition> {
        self.apertures.get(&code)
    }

    pub fn contains(&self, code: u32) -> bool {
        self.apertures.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.apertures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apertures.is_empty()
    }
}
