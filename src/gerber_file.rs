use std::{fs, path::Path};

use geo::Polygon;
use nalgebra::Vector2;

use crate::{
    aperture::{ApertureDefinition, ApertureShape, ApertureTable},
    arc::{resolve_arc, ArcDirection},
    config::{GeometryConfig, GerberConfig},
    coordinates::CoordinateFormat,
    diagnostics::{Diagnostics, Issue},
    geometry::{extract_polygons, FlashShape, Primitive, StrokePath},
    parsing::{
        gerber::{parse_gerber_file, GerberCommand, Operation},
        LocationInfo, Span, UnitMode,
    },
};

/// Everything drawn by one Gerber file, in millimeters and in the display frame (Y down).
#[derive(Debug, Default)]
pub struct GerberFile {
    pub primitives: Vec<Primitive>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterpolationMode {
    Linear,
    Clockwise,
    CounterClockwise,
}

/// Modal state of one Gerber parse. It is created for every file and dropped with it, so separate
/// files can be parsed on separate threads.
struct GraphicsState<'a> {
    config: &'a GerberConfig,
    apertures: ApertureTable,
    format: CoordinateFormat,
    position: Vector2<f64>,
    current_aperture: Option<u32>,
    interpolation_mode: InterpolationMode,

    /// `Some` while in region mode. Holds the outline drawn so far.
    region: Option<Vec<Vector2<f64>>>,
}

impl<'a> GraphicsState<'a> {
    fn new(config: &'a GerberConfig) -> Self {
        Self {
            config,
            apertures: ApertureTable::default(),
            format: CoordinateFormat::new(config.default_decimal_places, UnitMode::Metric),
            position: Vector2::zeros(),
            current_aperture: None,
            interpolation_mode: InterpolationMode::Linear,
            region: None,
        }
    }

    fn polygon_mode(&self) -> bool {
        self.region.is_some()
    }

    fn aperture(&self) -> Option<&ApertureDefinition> {
        self.current_aperture.and_then(|code| self.apertures.get(code))
    }

    fn default_circle(&self) -> FlashShape {
        FlashShape::Circle {
            diameter: self.config.default_aperture_diameter,
        }
    }

    fn stroke_width(&self, location: LocationInfo, diagnostics: &mut Diagnostics) -> f64 {
        match self.aperture().and_then(ApertureDefinition::primary_dimension) {
            Some(width) => width,
            None => {
                diagnostics.push(
                    Some(location),
                    Issue::UnknownAperture {
                        operation: "draw",
                        diameter: self.config.default_aperture_diameter,
                    },
                );
                self.config.default_aperture_diameter
            }
        }
    }

    fn flash_shape(&self, location: LocationInfo, diagnostics: &mut Diagnostics) -> FlashShape {
        let aperture = match self.aperture() {
            Some(aperture) => aperture,
            None => {
                diagnostics.push(
                    Some(location),
                    Issue::UnknownAperture {
                        operation: "flash",
                        diameter: self.config.default_aperture_diameter,
                    },
                );
                return self.default_circle();
            }
        };

        let primary = aperture
            .primary_dimension()
            .unwrap_or(self.config.default_aperture_diameter);
        let secondary = aperture.secondary_dimension().unwrap_or(primary);

        match &aperture.shape {
            ApertureShape::Circle => FlashShape::Circle { diameter: primary },
            ApertureShape::Rectangle => FlashShape::Rectangle {
                width: primary,
                height: secondary,
            },
            ApertureShape::Obround => FlashShape::Obround {
                width: primary,
                height: secondary,
            },
            ApertureShape::Polygon => FlashShape::Polygon {
                diameter: primary,
                vertices: aperture.params.get(1).map_or(3, |vertices| *vertices as u32),
                rotation: aperture.params.get(2).copied().unwrap_or(0.0),
            },
            ApertureShape::Macro(name) => {
                log::debug!("Flashing macro aperture {} as a default circle.", name);
                diagnostics.push(Some(location), Issue::UnsupportedAperture(aperture.code));
                self.default_circle()
            }
        }
    }
}

impl GerberFile {
    /// A file that cannot be read yields no primitives and a [Issue::FileUnreadable] diagnostic.
    pub fn load(path: &Path, config: &GerberConfig) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let gerber_file = Self::parse_str(&content, config);
                log::info!(
                    "Loaded {} primitives from {} with {} issues.",
                    gerber_file.primitives.len(),
                    path.to_string_lossy(),
                    gerber_file.diagnostics.len()
                );
                gerber_file
            }
            Err(error) => {
                let mut gerber_file = Self::default();
                gerber_file.diagnostics.push(
                    None,
                    Issue::FileUnreadable(format!("{}: {}", path.to_string_lossy(), error)),
                );
                gerber_file
            }
        }
    }

    pub fn parse_str(content: &str, config: &GerberConfig) -> Self {
        let mut gerber_file = Self::default();
        let mut graphics_state = GraphicsState::new(config);

        match parse_gerber_file(Span::new(content)) {
            Ok((remainder, commands)) => {
                for command in commands.iter() {
                    let keep_going = process_gerber_command(
                        &command.command,
                        command.location_info(),
                        &mut graphics_state,
                        &mut gerber_file,
                    );

                    if !keep_going {
                        break;
                    }
                }

                if !remainder.fragment().trim().is_empty() {
                    gerber_file.diagnostics.push(
                        Some(LocationInfo::of(&remainder)),
                        Issue::MalformedDirective("unterminated data block".into()),
                    );
                }
            }
            Err(error) => {
                gerber_file
                    .diagnostics
                    .push(None, Issue::MalformedDirective(format!("{:?}", error)));
            }
        }

        if let Some(region) = graphics_state.region.take() {
            log::debug!(
                "Discarding region left open at end of file with {} points.",
                region.len()
            );
        }

        log::debug!(
            "Decoded {} primitives using {} apertures.",
            gerber_file.primitives.len(),
            graphics_state.apertures.len()
        );

        gerber_file.primitives = gerber_file
            .primitives
            .iter()
            .map(Primitive::flip_y)
            .collect();

        gerber_file
    }

    /// Closed, repaired and unioned outlines of everything this file draws.
    pub fn polygons(&mut self, config: &GeometryConfig) -> Vec<Polygon<f64>> {
        extract_polygons(&self.primitives, config, &mut self.diagnostics)
    }
}

/// Returns false once the end of file command has been seen.
fn process_gerber_command(
    command: &GerberCommand,
    location: LocationInfo,
    graphics_state: &mut GraphicsState,
    gerber_file: &mut GerberFile,
) -> bool {
    match command {
        GerberCommand::Comment(_comment) => {}
        GerberCommand::FormatSpecification { x, y } => {
            if x.decimal != y.decimal {
                log::warn!(
                    "{}: X and Y use different decimal places ({} and {}), using X for both.",
                    location,
                    x.decimal,
                    y.decimal
                );
            }

            graphics_state.format.decimal_places = x.decimal;
        }
        GerberCommand::UnitMode(unit_mode) => graphics_state.format.set_unit_mode(*unit_mode),
        GerberCommand::ApertureDefine { identity, template } => {
            graphics_state.apertures.define(ApertureDefinition::from_template(
                *identity,
                template,
                graphics_state.format.unit_scale,
            ));
        }
        GerberCommand::SetAperture(code) => {
            if graphics_state.apertures.contains(*code) {
                graphics_state.current_aperture = Some(*code);
            } else {
                log::warn!(
                    "{}: Aperture D{} is not defined, keeping the previous one.",
                    location,
                    code
                );
            }
        }
        GerberCommand::Operation(operation) => {
            process_operation(operation, location, graphics_state, gerber_file)
        }
        GerberCommand::RegionStart => {
            if graphics_state.polygon_mode() {
                log::warn!("{}: Region started inside an open region.", location);
            }

            graphics_state.region = Some(Vec::new());
        }
        GerberCommand::RegionEnd => match graphics_state.region.take() {
            Some(mut path) if !path.is_empty() => {
                if path.first() != path.last() {
                    path.push(path[0]);
                }

                gerber_file.primitives.push(Primitive::FilledRegion { path });
            }
            Some(_) => {}
            None => log::debug!("{}: Region end without a region.", location),
        },
        GerberCommand::EndOfFile => return false,
        GerberCommand::Malformed(span) => gerber_file.diagnostics.push(
            Some(location),
            Issue::MalformedDirective(span.fragment().to_string()),
        ),
        GerberCommand::Unknown(span) => {
            log::debug!("{}: Ignoring command {:?}.", location, span.fragment());
        }
    }

    true
}

fn process_operation(
    operation: &Operation,
    location: LocationInfo,
    graphics_state: &mut GraphicsState,
    gerber_file: &mut GerberFile,
) {
    match operation {
        Operation::LinearMode => graphics_state.interpolation_mode = InterpolationMode::Linear,
        Operation::ClockwiseMode => {
            graphics_state.interpolation_mode = InterpolationMode::Clockwise
        }
        Operation::CounterClockwiseMode => {
            graphics_state.interpolation_mode = InterpolationMode::CounterClockwise
        }
        Operation::Move { x, y } => {
            let target = graphics_state
                .format
                .resolve_point(*x, *y, graphics_state.position);

            if let Some(region) = graphics_state.region.as_mut() {
                if region.is_empty() {
                    region.push(target);
                }
            }

            graphics_state.position = target;
        }
        Operation::Plot { x, y, i, j } => {
            let start = graphics_state.position;
            let target = graphics_state.format.resolve_point(*x, *y, start);

            if let Some(region) = graphics_state.region.as_mut() {
                // Arcs inside regions are drawn as chords.
                if region.is_empty() {
                    region.push(start);
                }
                region.push(target);
            } else {
                let direction = match graphics_state.interpolation_mode {
                    InterpolationMode::Linear => None,
                    InterpolationMode::Clockwise => Some(ArcDirection::Clockwise),
                    InterpolationMode::CounterClockwise => Some(ArcDirection::CounterClockwise),
                };

                let path = match direction {
                    None => Some(StrokePath::Line { start, end: target }),
                    Some(direction) => {
                        let offset = graphics_state.format.resolve_offset(*i, *j);
                        match resolve_arc(start, target, offset, direction) {
                            Ok(arc) => Some(StrokePath::Arc(arc)),
                            Err(error) => {
                                gerber_file.diagnostics.push(
                                    Some(location),
                                    Issue::DegenerateArc(error.to_string()),
                                );
                                None
                            }
                        }
                    }
                };

                if let Some(path) = path {
                    let width = graphics_state.stroke_width(location, &mut gerber_file.diagnostics);
                    gerber_file.primitives.push(Primitive::Stroke { path, width });
                }
            }

            graphics_state.position = target;
        }
        Operation::Flash { x, y } => {
            let position = graphics_state
                .format
                .resolve_point(*x, *y, graphics_state.position);
            graphics_state.position = position;

            let shape = graphics_state.flash_shape(location, &mut gerber_file.diagnostics);
            gerber_file
                .primitives
                .push(Primitive::Flash { shape, position });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(content: &str) -> GerberFile {
        GerberFile::parse_str(content, &GerberConfig::default())
    }

    #[test]
    fn single_trace() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.5*%\nD10*\nX1000000Y1000000D02*\nX2000000Y1000000D01*\nM02*\n",
        );

        assert_eq!(
            gerber_file.primitives,
            vec![Primitive::Stroke {
                path: StrokePath::Line {
                    start: Vector2::new(10.0, -10.0),
                    end: Vector2::new(20.0, -10.0),
                },
                width: 0.5,
            }]
        );
        assert!(gerber_file.diagnostics.is_empty());
    }

    #[test]
    fn imperial_apertures_and_coordinates() {
        let gerber_file = parse(
            "%FSLAX24Y24*%\n%MOIN*%\n%ADD11R,0.1X0.05*%\nD11*\nX10000Y-5000D03*\n",
        );

        match &gerber_file.primitives[..] {
            [Primitive::Flash {
                shape: FlashShape::Rectangle { width, height },
                position,
            }] => {
                assert_relative_eq!(*width, 2.54);
                assert_relative_eq!(*height, 1.27);
                assert_relative_eq!(position.x, 25.4);
                assert_relative_eq!(position.y, 12.7);
            }
            other => panic!("Unexpected primitives: {:?}", other),
        }
    }

    #[test]
    fn missing_axes_carry_forward() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.1*%\nD10*\nX100000Y200000D02*\nX300000D01*\nY0D01*\n",
        );

        assert_eq!(
            gerber_file.primitives,
            vec![
                Primitive::Stroke {
                    path: StrokePath::Line {
                        start: Vector2::new(1.0, -2.0),
                        end: Vector2::new(3.0, -2.0),
                    },
                    width: 0.1,
                },
                Primitive::Stroke {
                    path: StrokePath::Line {
                        start: Vector2::new(3.0, -2.0),
                        end: Vector2::new(3.0, -0.0),
                    },
                    width: 0.1,
                },
            ]
        );
    }

    #[test]
    fn arcs_resolve_and_flip() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.2*%\nD10*\nX500000Y0D02*\nG03X0Y500000I-500000J0D01*\n",
        );

        match &gerber_file.primitives[..] {
            [Primitive::Stroke {
                path: StrokePath::Arc(arc),
                width,
            }] => {
                assert_relative_eq!(*width, 0.2);
                assert_eq!(arc.start, Vector2::new(5.0, -0.0));
                assert_eq!(arc.end, Vector2::new(0.0, -5.0));
                assert_relative_eq!(arc.radius, 5.0);
                // Counter-clockwise in the file turns clockwise once Y points down.
                assert_eq!(arc.direction(), ArcDirection::Clockwise);
            }
            other => panic!("Unexpected primitives: {:?}", other),
        }
    }

    #[test]
    fn zero_radius_arc_is_skipped() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.2*%\nD10*\nG02*\nX100000Y0D01*\nX200000Y0D01*\n",
        );

        assert!(gerber_file.primitives.is_empty());
        assert_eq!(gerber_file.diagnostics.len(), 2);
        assert!(gerber_file
            .diagnostics
            .contains(|issue| matches!(issue, Issue::DegenerateArc(_))));
    }

    #[test]
    fn region_is_closed() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\nG36*\nX0Y0D02*\nX100000Y0D01*\nX100000Y100000D01*\nX0Y100000D01*\nG37*\n",
        );

        match &gerber_file.primitives[..] {
            [Primitive::FilledRegion { path }] => {
                assert_eq!(path.len(), 5);
                assert_eq!(path.first(), path.last());
                assert_eq!(path[2], Vector2::new(1.0, -1.0));
            }
            other => panic!("Unexpected primitives: {:?}", other),
        }
    }

    #[test]
    fn empty_and_unclosed_regions_emit_nothing() {
        let gerber_file = parse("%FSLAX25Y25*%\nG36*\nG37*\nG36*\nX0Y0D02*\nX100000Y0D01*\nM02*\n");
        assert!(gerber_file.primitives.is_empty());
    }

    #[test]
    fn region_draw_without_move_starts_at_current_position() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\nX100000Y100000D02*\nG36*\nX200000Y100000D01*\nX200000Y200000D01*\nG37*\n",
        );

        match &gerber_file.primitives[..] {
            [Primitive::FilledRegion { path }] => {
                assert_eq!(path[0], Vector2::new(1.0, -1.0));
                assert_eq!(path.len(), 4);
            }
            other => panic!("Unexpected primitives: {:?}", other),
        }
    }

    #[test]
    fn region_arcs_become_straight_edges() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\nG36*\nX0Y0D02*\nG01X1000000Y0D01*\n\
             G03X0Y1000000I-1000000J0D01*\nG01X0Y0D01*\nG37*\nM02*\n",
        );

        match &gerber_file.primitives[..] {
            [Primitive::FilledRegion { path }] => {
                assert_eq!(path.len(), 4);
                assert_eq!(path[1], Vector2::new(10.0, 0.0));
                assert_eq!(path[2], Vector2::new(0.0, -10.0));
            }
            other => panic!("Unexpected primitives: {:?}", other),
        }
        assert!(gerber_file.diagnostics.is_empty());
    }

    #[test]
    fn unknown_aperture_falls_back_to_default_circle() {
        let gerber_file = parse("%FSLAX25Y25*%\n%MOMM*%\nD42*\nX0Y0D03*\n");

        assert_eq!(
            gerber_file.primitives,
            vec![Primitive::Flash {
                shape: FlashShape::Circle { diameter: 0.2 },
                position: Vector2::new(0.0, -0.0),
            }]
        );
        assert!(gerber_file
            .diagnostics
            .contains(|issue| matches!(issue, Issue::UnknownAperture { .. })));
    }

    #[test]
    fn undefined_selection_keeps_previous_aperture() {
        let gerber_file = parse("%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.7*%\nD10*\nD99*\nX0Y0D03*\n");

        assert_eq!(
            gerber_file.primitives,
            vec![Primitive::Flash {
                shape: FlashShape::Circle { diameter: 0.7 },
                position: Vector2::new(0.0, -0.0),
            }]
        );
    }

    #[test]
    fn macro_flash_is_reported() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD20RoundRect,0.1X0.2*%\nD20*\nX0Y0D03*\n",
        );

        assert!(gerber_file
            .diagnostics
            .contains(|issue| *issue == Issue::UnsupportedAperture(20)));
        assert_eq!(gerber_file.primitives.len(), 1);
    }

    #[test]
    fn malformed_definition_is_skipped() {
        let gerber_file = parse(
            "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,abc*%\n%ADD11C,0.3*%\nD11*\nX0Y0D03*\n",
        );

        assert!(gerber_file
            .diagnostics
            .contains(|issue| matches!(issue, Issue::MalformedDirective(_))));
        assert_eq!(
            gerber_file.primitives,
            vec![Primitive::Flash {
                shape: FlashShape::Circle { diameter: 0.3 },
                position: Vector2::new(0.0, -0.0),
            }]
        );
    }

    #[test]
    fn end_of_file_stops_interpretation() {
        let gerber_file = parse("%FSLAX25Y25*%\n%ADD10C,0.3*%\nD10*\nM02*\nX0Y0D03*\n");
        assert!(gerber_file.primitives.is_empty());
    }

    #[test]
    fn unreadable_file_is_empty() {
        let gerber_file = GerberFile::load(
            Path::new("/this/path/does/not/exist.gtl"),
            &GerberConfig::default(),
        );

        assert!(gerber_file.primitives.is_empty());
        assert!(gerber_file
            .diagnostics
            .contains(|issue| matches!(issue, Issue::FileUnreadable(_))));
    }
}
