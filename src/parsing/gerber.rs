//! The Gerber specification can be found [here](https://www.ucamco.com/en/guest/downloads/gerber-format).
//!
//! Only the subset used by common CAD exports is recognized: format and unit selection, standard
//! aperture definitions, aperture selection, linear and circular interpolation, region mode and the
//! three operation codes. Everything else is handed back as [GerberCommand::Unknown] so the
//! interpreter can skip it, and definitions that look like FS/MO/AD but fail to parse come back as
//! [GerberCommand::Malformed].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as nom_char, one_of},
    combinator::{all_consuming, map, map_res, opt, rest, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{is_space, LocationInfo, Span, UnitMode};

#[derive(Clone)]
pub struct GerberCommandContext<'a> {
    pub command: GerberCommand<'a>,
    pub span: Span<'a>,
}

impl<'a> GerberCommandContext<'a> {
    pub fn location_info(&self) -> LocationInfo {
        LocationInfo::of(&self.span)
    }
}

impl<'a> std::fmt::Debug for GerberCommandContext<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location_info = self.location_info();

        f.debug_struct("GerberCommandContext")
            .field("command", &self.command)
            .field("span", &location_info)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GerberCommand<'a> {
    Comment(Span<'a>), // G04
    FormatSpecification {
        // FS
        x: CoordinateDigits,
        y: CoordinateDigits,
    },
    UnitMode(UnitMode), // MO
    ApertureDefine {
        // AD
        identity: u32,
        template: ApertureTemplate<'a>,
    },
    SetAperture(u32), // Dnn (nn≥10)
    Operation(Operation),
    RegionStart, // G36
    RegionEnd,   // G37
    EndOfFile,   // M02

    /// Looked like a directive we support but could not be read.
    Malformed(Span<'a>),

    /// Anything outside the supported subset.
    Unknown(Span<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateDigits {
    pub integer: u32,
    pub decimal: u32,
}

/// Raw coordinate tokens are kept as integers; the interpreter owns the decimal format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Plot {
        // D01
        x: Option<i64>,
        y: Option<i64>,
        i: Option<i64>,
        j: Option<i64>,
    },
    Move {
        // D02
        x: Option<i64>,
        y: Option<i64>,
    },
    Flash {
        // D03
        x: Option<i64>,
        y: Option<i64>,
    },

    LinearMode,           // G01
    ClockwiseMode,        // G02
    CounterClockwiseMode, // G03
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApertureTemplate<'a> {
    Circle {
        diameter: f64,
        hole_diameter: Option<f64>,
    },
    Rectangle {
        width: f64,
        height: f64,
        hole_diameter: Option<f64>,
    },
    Obround {
        width: f64,
        height: f64,
        hole_diameter: Option<f64>,
    },
    Polygon {
        diameter: f64,
        num_vertices: u32,
        rotation: Option<f64>,
        hole_diameter: Option<f64>,
    },
    Macro {
        name: Span<'a>,
        arguments: Vec<f64>,
    },
}

/// Splits the whole file into commands. Never fails on content it does not understand, but will
/// stop early on a block that is never terminated; the caller is expected to inspect the remainder.
pub fn parse_gerber_file(input: Span) -> IResult<Span, Vec<GerberCommandContext>> {
    map(
        terminated(many0(preceded(space, parse_block)), space),
        |blocks| blocks.into_iter().flatten().collect(),
    )(input)
}

fn parse_block(input: Span) -> IResult<Span, Vec<GerberCommandContext>> {
    alt((parse_extended_block, parse_word_block))(input)
}

fn data_block(input: Span) -> IResult<Span, Span> {
    terminated(take_while(|c| !matches!(c, '*' | '%')), nom_char('*'))(input)
}

fn parse_extended_block(input: Span) -> IResult<Span, Vec<GerberCommandContext>> {
    map(
        delimited(
            nom_char('%'),
            many0(preceded(space, data_block)),
            preceded(space, nom_char('%')),
        ),
        |contents| {
            contents
                .into_iter()
                .filter(|content| !content.fragment().trim().is_empty())
                .map(|content| GerberCommandContext {
                    command: classify_extended(content),
                    span: content,
                })
                .collect()
        },
    )(input)
}

fn classify_extended(content: Span) -> GerberCommand {
    match all_consuming(parse_extended_command)(content) {
        Ok((_, command)) => command,
        Err(_) => {
            let fragment = content.fragment();
            if ["FS", "MO", "AD"]
                .iter()
                .any(|prefix| fragment.starts_with(prefix))
            {
                GerberCommand::Malformed(content)
            } else {
                GerberCommand::Unknown(content)
            }
        }
    }
}

fn parse_word_block(input: Span) -> IResult<Span, Vec<GerberCommandContext>> {
    map(data_block, |content| {
        if content.fragment().trim().is_empty() {
            return Vec::new();
        }

        match all_consuming(parse_word_commands)(content) {
            Ok((_, commands)) => commands
                .into_iter()
                .map(|command| GerberCommandContext {
                    command,
                    span: content,
                })
                .collect(),
            Err(_) => vec![GerberCommandContext {
                command: GerberCommand::Unknown(content),
                span: content,
            }],
        }
    })(input)
}

// Word commands.

fn parse_word_commands(input: Span) -> IResult<Span, Vec<GerberCommand>> {
    alt((
        map(parse_comment, |comment| vec![comment]),
        value(vec![GerberCommand::RegionStart], tag("G36")),
        value(vec![GerberCommand::RegionEnd], tag("G37")),
        value(vec![GerberCommand::EndOfFile], tag("M02")),
        parse_modal_operation,
    ))(input)
}

fn parse_comment(input: Span) -> IResult<Span, GerberCommand> {
    map(preceded(tag("G04"), rest), GerberCommand::Comment)(input)
}

/// An optional interpolation mode, an optional deprecated `G54` select prefix, then an operation
/// or aperture selection. At least one of the two must be present.
fn parse_modal_operation(input: Span) -> IResult<Span, Vec<GerberCommand>> {
    let (input, mode) = opt(parse_interpolation_mode)(input)?;
    let (input, _) = opt(tag("G54"))(input)?;

    let (input, command) = if mode.is_some() {
        opt(parse_operation_or_selection)(input)?
    } else {
        map(parse_operation_or_selection, Some)(input)?
    };

    Ok((
        input,
        mode.map(GerberCommand::Operation)
            .into_iter()
            .chain(command)
            .collect(),
    ))
}

fn parse_interpolation_mode(input: Span) -> IResult<Span, Operation> {
    alt((
        value(Operation::LinearMode, alt((tag("G01"), tag("G1")))),
        value(Operation::ClockwiseMode, alt((tag("G02"), tag("G2")))),
        value(
            Operation::CounterClockwiseMode,
            alt((tag("G03"), tag("G3"))),
        ),
    ))(input)
}

fn parse_operation_or_selection(input: Span) -> IResult<Span, GerberCommand> {
    let (input, (x, y, i, j)) = tuple((
        opt(preceded(nom_char('X'), parse_integer)),
        opt(preceded(nom_char('Y'), parse_integer)),
        opt(preceded(nom_char('I'), parse_integer)),
        opt(preceded(nom_char('J'), parse_integer)),
    ))(input)?;
    let (input, code) = preceded(nom_char('D'), parse_unsigned_integer)(input)?;

    let command = match code {
        1 => GerberCommand::Operation(Operation::Plot { x, y, i, j }),
        2 => GerberCommand::Operation(Operation::Move { x, y }),
        3 => GerberCommand::Operation(Operation::Flash { x, y }),
        code if code >= 10 && x.is_none() && y.is_none() => GerberCommand::SetAperture(code),
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )))
        }
    };

    Ok((input, command))
}

// Extended commands.

fn parse_extended_command(input: Span) -> IResult<Span, GerberCommand> {
    alt((
        parse_unit_mode,
        parse_format_specification,
        parse_aperture_define,
    ))(input)
}

fn parse_unit_mode(input: Span) -> IResult<Span, GerberCommand> {
    preceded(
        tag("MO"),
        alt((
            value(GerberCommand::UnitMode(UnitMode::Metric), tag("MM")),
            value(GerberCommand::UnitMode(UnitMode::Imperial), tag("IN")),
        )),
    )(input)
}

fn parse_format_specification(input: Span) -> IResult<Span, GerberCommand> {
    fn digit(input: Span) -> IResult<Span, u32> {
        map_res(one_of("0123456789"), |digit: char| {
            digit.to_string().parse::<u32>()
        })(input)
    }

    fn parse_coordinate_digits(input: Span) -> IResult<Span, CoordinateDigits> {
        map(pair(digit, digit), |(integer, decimal)| CoordinateDigits {
            integer,
            decimal,
        })(input)
    }

    map(
        preceded(
            tag("FSLA"),
            pair(
                preceded(nom_char('X'), parse_coordinate_digits),
                preceded(nom_char('Y'), parse_coordinate_digits),
            ),
        ),
        |(x, y)| GerberCommand::FormatSpecification { x, y },
    )(input)
}

fn parse_aperture_define(input: Span) -> IResult<Span, GerberCommand> {
    map(
        preceded(
            tag("AD"),
            pair(
                preceded(nom_char('D'), parse_unsigned_integer),
                alt((
                    map(
                        preceded(
                            tag("C,"),
                            pair(parse_decimal, opt(preceded(nom_char('X'), parse_decimal))),
                        ),
                        |(diameter, hole_diameter)| ApertureTemplate::Circle {
                            diameter,
                            hole_diameter,
                        },
                    ),
                    map(
                        preceded(tag("R,"), parse_box_dimensions),
                        |(width, height, hole_diameter)| ApertureTemplate::Rectangle {
                            width,
                            height,
                            hole_diameter,
                        },
                    ),
                    map(
                        preceded(tag("O,"), parse_box_dimensions),
                        |(width, height, hole_diameter)| ApertureTemplate::Obround {
                            width,
                            height,
                            hole_diameter,
                        },
                    ),
                    map(
                        preceded(
                            tag("P,"),
                            tuple((
                                parse_decimal,
                                preceded(nom_char('X'), parse_unsigned_integer),
                                opt(preceded(nom_char('X'), parse_decimal)),
                                opt(preceded(nom_char('X'), parse_decimal)),
                            )),
                        ),
                        |(diameter, num_vertices, rotation, hole_diameter)| {
                            ApertureTemplate::Polygon {
                                diameter,
                                num_vertices,
                                rotation,
                                hole_diameter,
                            }
                        },
                    ),
                    map(
                        pair(
                            parse_name,
                            opt(preceded(
                                nom_char(','),
                                separated_list1(nom_char('X'), parse_decimal),
                            )),
                        ),
                        |(name, arguments)| ApertureTemplate::Macro {
                            name,
                            arguments: arguments.unwrap_or_default(),
                        },
                    ),
                )),
            ),
        ),
        |(identity, template)| GerberCommand::ApertureDefine { identity, template },
    )(input)
}

/// `<width>[X<height>[X<hole>]]`, a missing height means a square.
fn parse_box_dimensions(input: Span) -> IResult<Span, (f64, f64, Option<f64>)> {
    map(
        tuple((
            parse_decimal,
            opt(preceded(nom_char('X'), parse_decimal)),
            opt(preceded(nom_char('X'), parse_decimal)),
        )),
        |(width, height, hole_diameter)| (width, height.unwrap_or(width), hole_diameter),
    )(input)
}

// Primitive parsing.

fn parse_unsigned_integer(input: Span) -> IResult<Span, u32> {
    map_res(take_while1(|c: char| c.is_ascii_digit()), |digits: Span| {
        digits.fragment().parse::<u32>()
    })(input)
}

fn parse_integer(input: Span) -> IResult<Span, i64> {
    // integer          =  /[+-]?[0-9]+/;
    let (input, sign) = map(
        opt(alt((value(1, nom_char('+')), value(-1, nom_char('-'))))),
        |sign| sign.unwrap_or(1),
    )(input)?;

    map_res(take_while1(|c: char| c.is_ascii_digit()), move |digits: Span| {
        digits.fragment().parse::<i64>().map(|value| value * sign)
    })(input)
}

fn parse_decimal(input: Span) -> IResult<Span, f64> {
    // decimal          = /[+-]?((([0-9]+)(\.[0-9]*)?)|(\.[0-9]+))/;
    let (input, sign) = map(
        opt(alt((value(1.0, nom_char('+')), value(-1.0, nom_char('-'))))),
        |sign| sign.unwrap_or(1.0),
    )(input)?;

    map_res(
        take_while1(|c| matches!(c, '.' | '0'..='9')),
        move |number: Span| number.fragment().parse::<f64>().map(|value| value * sign),
    )(input)
}

fn parse_name(input: Span) -> IResult<Span, Span> {
    // name      = /[._a-zA-Z$][._a-zA-Z0-9]*/;
    take_while1(|c| matches!(c, '.' | '_' | '$' | 'a'..='z' | 'A'..='Z' | '0'..='9'))(input)
}

fn space(input: Span) -> IResult<Span, ()> {
    value((), take_while(is_space))(input)
}
