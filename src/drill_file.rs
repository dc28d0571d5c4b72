use std::{collections::HashMap, fs, path::Path};

use geo::Polygon;
use nalgebra::Vector2;

use crate::{
    config::{DrillConfig, GeometryConfig},
    diagnostics::{Diagnostics, Issue},
    geometry::{extract_polygons, FlashShape, Primitive},
    parsing::{
        drill::{parse_drill_file, CoordinateToken, DrillCommand},
        LocationInfo, Span, UnitMode,
    },
};

/// Bare six digit coordinates are read with this many decimal places when the file does not
/// declare a format.
const SIX_DIGIT_DECIMAL_PLACES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrillTool {
    pub id: u32,

    /// Millimeters.
    pub diameter: f64,
}

/// A drilled hole in the display frame (Y down), millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrillHit {
    pub position: Vector2<f64>,
    pub diameter: f64,
}

impl DrillHit {
    pub fn to_primitive(&self) -> Primitive {
        Primitive::Flash {
            shape: FlashShape::Circle {
                diameter: self.diameter,
            },
            position: self.position,
        }
    }
}

#[derive(Debug, Default)]
pub struct DrillFile {
    pub hits: Vec<DrillHit>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Eq, PartialEq)]
enum CoordinateMode {
    Absolute,
    Incremental,
}

/// State of one drill file parse. Nothing here outlives [DrillFile::parse_str].
struct DrillingContext {
    unit_mode: UnitMode,
    tools: HashMap<u32, DrillTool>,
    coordinate_mode: CoordinateMode,
    declared_decimal_places: Option<u32>,
    default_decimal_places: u32,
    current_tool: Option<u32>,
    position: Vector2<f64>,
}

impl DrillingContext {
    fn new(config: &DrillConfig) -> Self {
        Self {
            unit_mode: UnitMode::Imperial,
            tools: HashMap::new(),
            coordinate_mode: CoordinateMode::Absolute,
            declared_decimal_places: None,
            default_decimal_places: config.default_decimal_places,
            current_tool: None,
            position: Vector2::zeros(),
        }
    }

    /// Value of a token in file units.
    fn token_value(&self, token: CoordinateToken) -> f64 {
        match token {
            CoordinateToken::Decimal(value) => value,
            CoordinateToken::Integer { value, digits } => {
                let decimal_places = match self.declared_decimal_places {
                    Some(decimal_places) => decimal_places,
                    None if digits == 6 => SIX_DIGIT_DECIMAL_PLACES,
                    None => self.default_decimal_places,
                };

                value as f64 / 10f64.powi(decimal_places as i32)
            }
        }
    }

    fn internalize_axis(&self, token: Option<CoordinateToken>, current: f64) -> f64 {
        let scale = self.unit_mode.scale();

        match (&self.coordinate_mode, token) {
            (CoordinateMode::Absolute, Some(token)) => self.token_value(token) * scale,
            (CoordinateMode::Absolute, None) => current,
            (CoordinateMode::Incremental, Some(token)) => {
                current + self.token_value(token) * scale
            }
            (CoordinateMode::Incremental, None) => current,
        }
    }

    fn active_tool(&self) -> Option<&DrillTool> {
        self.current_tool.and_then(|id| self.tools.get(&id))
    }
}

impl DrillFile {
    /// A file that cannot be read yields no hits and a [Issue::FileUnreadable] diagnostic.
    pub fn load(path: &Path, config: &DrillConfig) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let drill_file = Self::parse_str(&content, config);
                log::info!(
                    "Loaded {} drill hits from {}.",
                    drill_file.hits.len(),
                    path.to_string_lossy()
                );
                drill_file
            }
            Err(error) => {
                let mut drill_file = Self::default();
                drill_file.diagnostics.push(
                    None,
                    Issue::FileUnreadable(format!("{}: {}", path.to_string_lossy(), error)),
                );
                drill_file
            }
        }
    }

    pub fn parse_str(content: &str, config: &DrillConfig) -> Self {
        let mut drill_file = Self::default();
        let mut drilling_context = DrillingContext::new(config);

        let commands = match parse_drill_file(Span::new(content)) {
            Ok((_remainder, commands)) => commands,
            Err(error) => {
                drill_file
                    .diagnostics
                    .push(None, Issue::MalformedDirective(format!("{:?}", error)));
                return drill_file;
            }
        };

        for command in commands.iter() {
            if !process_drill_command(
                &command.command,
                command.location_info(),
                &mut drilling_context,
                &mut drill_file,
            ) {
                break;
            }
        }

        drill_file
    }

    pub fn to_primitives(&self) -> Vec<Primitive> {
        self.hits.iter().map(DrillHit::to_primitive).collect()
    }

    /// Union of all holes. Holes too small to form a polygon are recorded in `diagnostics`.
    pub fn polygons(&mut self, config: &GeometryConfig) -> Vec<Polygon<f64>> {
        extract_polygons(&self.to_primitives(), config, &mut self.diagnostics)
    }
}

/// Returns false once the end of the program has been reached.
fn process_drill_command(
    command: &DrillCommand,
    location_info: LocationInfo,
    drilling_context: &mut DrillingContext,
    drill_file: &mut DrillFile,
) -> bool {
    match command {
        DrillCommand::Comment(_comment) => {}
        DrillCommand::Header => {}
        DrillCommand::UnitMode(unit_mode) => drilling_context.unit_mode = *unit_mode,
        DrillCommand::AbsoluteMode => drilling_context.coordinate_mode = CoordinateMode::Absolute,
        DrillCommand::IncrementalMode => {
            drilling_context.coordinate_mode = CoordinateMode::Incremental
        }
        DrillCommand::Format { integer, decimal } => {
            log::debug!("Drill format {}.{} declared.", integer, decimal);
            drilling_context.declared_decimal_places = Some(*decimal);
        }
        DrillCommand::ToolDeclaration { index, diameter } => {
            let tool = DrillTool {
                id: *index,
                diameter: diameter * drilling_context.unit_mode.scale(),
            };

            if drilling_context.tools.insert(*index, tool).is_some() {
                log::warn!("{}: Tool {} has been defined multiple times.", location_info, index);
            }
        }
        DrillCommand::SelectTool(index) => {
            if *index == 0 {
                drilling_context.current_tool = None;
            } else {
                if !drilling_context.tools.contains_key(index) {
                    log::warn!("{}: Tool {} selected but never declared.", location_info, index);
                }

                drilling_context.current_tool = Some(*index);
            }
        }
        DrillCommand::Coordinates { x, y } => {
            let position = Vector2::new(
                drilling_context.internalize_axis(*x, drilling_context.position.x),
                drilling_context.internalize_axis(*y, drilling_context.position.y),
            );
            drilling_context.position = position;

            if let Some(tool) = drilling_context.active_tool() {
                if tool.diameter > 0.0 {
                    drill_file.hits.push(DrillHit {
                        position: Vector2::new(position.x, -position.y),
                        diameter: tool.diameter,
                    });
                }
            }
        }
        DrillCommand::EndOfProgram => return false,
        DrillCommand::Unknown(span) => {
            log::debug!("{}: Ignoring drill line {:?}.", location_info, span.fragment());
        }
    }

    true
}
