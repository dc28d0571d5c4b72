//! Line recognizers for Excellon (NC drill) files.
//!
//! Drill files in the wild rarely agree on their header, so every line is recognized on its own and
//! anything that is not understood comes back as [DrillCommand::Unknown] for the interpreter to
//! skip. Keywords are matched case-insensitively.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{anychar, char as nom_char, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, rest, value},
    multi::many0,
    sequence::{pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::{is_space, LocationInfo, Span, UnitMode};

#[derive(Debug, Clone)]
pub struct DrillCommandContext<'a> {
    pub span: Span<'a>,
    pub command: DrillCommand<'a>,
}

impl<'a> DrillCommandContext<'a> {
    pub fn location_info(&self) -> LocationInfo {
        LocationInfo::of(&self.span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrillCommand<'a> {
    Comment(Span<'a>),

    /// `M48`, a lone `%`, or a KiCad `FMAT,` line.
    Header,
    UnitMode(UnitMode), // METRIC, INCH, M71, M72
    AbsoluteMode,       // G90
    IncrementalMode,    // G91, M95
    Format {
        // FORMAT=I.D
        integer: u32,
        decimal: u32,
    },
    ToolDeclaration {
        index: u32,
        diameter: f64,
    },
    SelectTool(u32),
    Coordinates {
        x: Option<CoordinateToken>,
        y: Option<CoordinateToken>,
    },
    EndOfProgram, // M30
    Unknown(Span<'a>),
}

/// A single axis value as written in the file, still in file units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateToken {
    /// Written with a decimal point and read as is.
    Decimal(f64),

    /// Bare digits whose decimal point is implied. `digits` excludes the sign.
    Integer { value: i64, digits: usize },
}

/// Splits the file into lines and recognizes each one. Blank lines produce nothing.
pub fn parse_drill_file(input: Span) -> IResult<Span, Vec<DrillCommandContext>> {
    terminated(many0(preceded(space, parse_line)), space)(input)
}

fn parse_line(input: Span) -> IResult<Span, DrillCommandContext> {
    map(take_while1(|c| !matches!(c, '\n' | '\r')), |line: Span| {
        DrillCommandContext {
            command: classify_line(line),
            span: line,
        }
    })(input)
}

fn classify_line(line: Span) -> DrillCommand {
    match parse_drill_command(line) {
        Ok((_, command)) => command,
        Err(_) => DrillCommand::Unknown(line),
    }
}

fn parse_drill_command(input: Span) -> IResult<Span, DrillCommand> {
    alt((
        map(preceded(nom_char(';'), rest), DrillCommand::Comment),
        parse_header_marker,
        parse_end_of_program,
        parse_unit_mode,
        parse_coordinate_mode,
        parse_format,
        parse_tool_declaration,
        parse_select_tool,
        parse_coordinates,
    ))(input)
}

fn parse_header_marker(input: Span) -> IResult<Span, DrillCommand> {
    value(
        DrillCommand::Header,
        alt((
            terminated(tag("M48"), rest),
            all_consuming(terminated(tag("%"), space)),
            terminated(tag_no_case("FMAT"), rest),
        )),
    )(input)
}

fn parse_end_of_program(input: Span) -> IResult<Span, DrillCommand> {
    value(DrillCommand::EndOfProgram, terminated(tag("M30"), rest))(input)
}

/// `METRIC,LZ` and friends carry zero suppression flags after the unit; those are not needed
/// since bare integers are resolved by digit count.
fn parse_unit_mode(input: Span) -> IResult<Span, DrillCommand> {
    map(
        terminated(
            alt((
                value(UnitMode::Metric, tag_no_case("METRIC")),
                value(UnitMode::Imperial, tag_no_case("INCH")),
                value(UnitMode::Metric, tag("M71")),
                value(UnitMode::Imperial, tag("M72")),
            )),
            rest,
        ),
        DrillCommand::UnitMode,
    )(input)
}

fn parse_coordinate_mode(input: Span) -> IResult<Span, DrillCommand> {
    all_consuming(terminated(
        alt((
            value(DrillCommand::AbsoluteMode, tag("G90")),
            value(DrillCommand::IncrementalMode, alt((tag("G91"), tag("M95")))),
        )),
        space,
    ))(input)
}

fn parse_format(input: Span) -> IResult<Span, DrillCommand> {
    map(
        preceded(
            tuple((tag_no_case("FORMAT"), space, nom_char('='), space)),
            separated_pair(parse_unsigned_integer, nom_char('.'), parse_unsigned_integer),
        ),
        |(integer, decimal)| DrillCommand::Format { integer, decimal },
    )(input)
}

/// `T<id>C<diameter>`, optionally followed by feed and speed words that are ignored.
fn parse_tool_declaration(input: Span) -> IResult<Span, DrillCommand> {
    map(
        terminated(
            pair(
                preceded(tag_no_case("T"), parse_unsigned_integer),
                preceded(
                    pair(space, tag_no_case("C")),
                    preceded(space, parse_unsigned_decimal),
                ),
            ),
            rest,
        ),
        |(index, diameter)| DrillCommand::ToolDeclaration { index, diameter },
    )(input)
}

fn parse_select_tool(input: Span) -> IResult<Span, DrillCommand> {
    all_consuming(terminated(
        map(
            preceded(tag_no_case("T"), parse_unsigned_integer),
            DrillCommand::SelectTool,
        ),
        space,
    ))(input)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    X,
    Y,
}

/// Finds every X/Y token on the line. When any of them carries a decimal point, only those are
/// used, since mixing the two styles on one line would be ambiguous. A later token for the same
/// axis replaces an earlier one.
fn parse_coordinates(input: Span) -> IResult<Span, DrillCommand> {
    let (remaining, tokens) = map(
        many0(alt((
            map(parse_axis_token, Some),
            value(None, anychar),
        ))),
        |tokens| tokens.into_iter().flatten().collect::<Vec<_>>(),
    )(input)?;

    let has_decimal = tokens
        .iter()
        .any(|(_, token)| matches!(token, CoordinateToken::Decimal(_)));

    let mut x = None;
    let mut y = None;
    for (axis, token) in tokens {
        if has_decimal && !matches!(token, CoordinateToken::Decimal(_)) {
            continue;
        }

        match axis {
            Axis::X => x = Some(token),
            Axis::Y => y = Some(token),
        }
    }

    if x.is_none() && y.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    Ok((remaining, DrillCommand::Coordinates { x, y }))
}

fn parse_axis_token(input: Span) -> IResult<Span, (Axis, CoordinateToken)> {
    pair(
        map(one_of("XYxy"), |axis| match axis {
            'X' | 'x' => Axis::X,
            _ => Axis::Y,
        }),
        parse_coordinate_token,
    )(input)
}

fn parse_coordinate_token(input: Span) -> IResult<Span, CoordinateToken> {
    let (input, negative) = map(opt(one_of("+-")), |sign| sign == Some('-'))(input)?;
    let (input, integer_part) = take_while(|c: char| c.is_ascii_digit())(input)?;
    let (input, fraction) = opt(preceded(
        nom_char('.'),
        take_while(|c: char| c.is_ascii_digit()),
    ))(input)?;

    let digit_error =
        || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    match fraction {
        Some(fraction) if !(integer_part.is_empty() && fraction.is_empty()) => {
            let number = format!("{}.{}", integer_part.fragment(), fraction.fragment())
                .parse::<f64>()
                .map_err(|_| digit_error())?;

            Ok((
                input,
                CoordinateToken::Decimal(if negative { -number } else { number }),
            ))
        }
        None if !integer_part.is_empty() => {
            let value = integer_part
                .fragment()
                .parse::<i64>()
                .map_err(|_| digit_error())?;

            Ok((
                input,
                CoordinateToken::Integer {
                    value: if negative { -value } else { value },
                    digits: integer_part.fragment().len(),
                },
            ))
        }
        _ => Err(digit_error()),
    }
}

fn parse_unsigned_integer(input: Span) -> IResult<Span, u32> {
    map_res(take_while1(|c: char| c.is_ascii_digit()), |digits: Span| {
        digits.fragment().parse::<u32>()
    })(input)
}

fn parse_unsigned_decimal(input: Span) -> IResult<Span, f64> {
    // unsigned_decimal =      /((([0-9]+)(\.[0-9]*)?)|(\.[0-9]+))/;
    map_res(
        recognize(pair(
            take_while(|c: char| c.is_ascii_digit()),
            opt(pair(nom_char('.'), take_while(|c: char| c.is_ascii_digit()))),
        )),
        |number: Span| number.fragment().parse::<f64>(),
    )(input)
}

fn space(input: Span) -> IResult<Span, ()> {
    value((), take_while(is_space))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(input: &str) -> Vec<DrillCommand> {
        let (remaining, commands) = parse_drill_file(Span::new(input)).unwrap();
        assert!(remaining.fragment().is_empty(), "left over: {:?}", remaining);

        commands.into_iter().map(|context| context.command).collect()
    }

    #[test]
    fn header() {
        let parsed = commands("M48\n; DRILL file\nFMAT,2\nMETRIC,TZ\nFORMAT=3.3\n%\n");

        assert_eq!(parsed.len(), 6);
        assert_eq!(parsed[0], DrillCommand::Header);
        assert!(matches!(
            parsed[1],
            DrillCommand::Comment(comment) if *comment.fragment() == " DRILL file"
        ));
        assert_eq!(parsed[2], DrillCommand::Header);
        assert_eq!(parsed[3], DrillCommand::UnitMode(UnitMode::Metric));
        assert_eq!(
            parsed[4],
            DrillCommand::Format {
                integer: 3,
                decimal: 3
            }
        );
        assert_eq!(parsed[5], DrillCommand::Header);
    }

    #[test]
    fn unit_codes() {
        assert_eq!(
            commands("INCH,LZ\nM71\nM72\nmetric"),
            vec![
                DrillCommand::UnitMode(UnitMode::Imperial),
                DrillCommand::UnitMode(UnitMode::Metric),
                DrillCommand::UnitMode(UnitMode::Imperial),
                DrillCommand::UnitMode(UnitMode::Metric),
            ]
        );
    }

    #[test]
    fn coordinate_modes() {
        assert_eq!(
            commands("G90\nG91\nM95\n"),
            vec![
                DrillCommand::AbsoluteMode,
                DrillCommand::IncrementalMode,
                DrillCommand::IncrementalMode,
            ]
        );
    }

    #[test]
    fn tools() {
        assert_eq!(
            commands("T01C0.80\nT2C.035F200S65\nT01\nT0"),
            vec![
                DrillCommand::ToolDeclaration {
                    index: 1,
                    diameter: 0.8
                },
                DrillCommand::ToolDeclaration {
                    index: 2,
                    diameter: 0.035
                },
                DrillCommand::SelectTool(1),
                DrillCommand::SelectTool(0),
            ]
        );
    }

    #[test]
    fn bare_integer_coordinates() {
        assert_eq!(
            commands("X010000Y-020000\nY5"),
            vec![
                DrillCommand::Coordinates {
                    x: Some(CoordinateToken::Integer {
                        value: 10000,
                        digits: 6
                    }),
                    y: Some(CoordinateToken::Integer {
                        value: -20000,
                        digits: 6
                    }),
                },
                DrillCommand::Coordinates {
                    x: None,
                    y: Some(CoordinateToken::Integer {
                        value: 5,
                        digits: 1
                    }),
                },
            ]
        );
    }

    #[test]
    fn decimal_coordinates_win_over_integers() {
        assert_eq!(
            commands("X1.5Y2\nx-.25y+3.0"),
            vec![
                DrillCommand::Coordinates {
                    x: Some(CoordinateToken::Decimal(1.5)),
                    y: None,
                },
                DrillCommand::Coordinates {
                    x: Some(CoordinateToken::Decimal(-0.25)),
                    y: Some(CoordinateToken::Decimal(3.0)),
                },
            ]
        );
    }

    #[test]
    fn route_words_around_coordinates_are_ignored() {
        assert_eq!(
            commands("G01X1.0Y2.0"),
            vec![DrillCommand::Coordinates {
                x: Some(CoordinateToken::Decimal(1.0)),
                y: Some(CoordinateToken::Decimal(2.0)),
            }]
        );
    }

    #[test]
    fn end_of_program_and_unknown_lines() {
        let parsed = commands("G05\nM30\n");
        assert!(matches!(parsed[0], DrillCommand::Unknown(span) if *span.fragment() == "G05"));
        assert_eq!(parsed[1], DrillCommand::EndOfProgram);
    }

    #[test]
    fn lines_keep_their_location() {
        let (_, parsed) = parse_drill_file(Span::new("M48\r\n\r\nMETRIC\r\nT1C0.3\r\n")).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2].location_info(), LocationInfo { line: 4, column: 1 });
    }
}
