//! IPC-D-356 net list records. Only the net name and the first `X<int>Y<int>` pair of each record
//! are read; the remaining fixed-width fields are ignored.

use nom::{
    bytes::complete::{tag, take_till1, take_while, take_while1},
    character::complete::{anychar, char as nom_char, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::many_till,
    sequence::{pair, preceded, tuple},
    IResult,
};

use super::{is_space, LocationInfo, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct NetRecord<'a> {
    pub span: Span<'a>,
    pub net: Span<'a>,

    /// Raw values in the file's integer units.
    pub x: i64,
    pub y: i64,
}

impl<'a> NetRecord<'a> {
    pub fn location_info(&self) -> LocationInfo {
        LocationInfo::of(&self.span)
    }
}

/// Lines starting with `P ` are parameter records and `999` ends the file; both are skipped, as
/// are lines without a coordinate pair.
pub fn parse_net_line(line: Span) -> Option<NetRecord> {
    if line.fragment().starts_with("P ") || line.fragment().starts_with("999") {
        return None;
    }

    parse_record(line).ok().map(|(_, record)| record)
}

fn parse_record(input: Span) -> IResult<Span, NetRecord> {
    let line = input;
    let (input, net) = preceded(take_while(is_space), take_till1(is_space))(input)?;
    let (input, (_, (x, y))) = many_till(anychar, parse_coordinate_pair)(input)?;

    Ok((
        input,
        NetRecord {
            span: line,
            net,
            x,
            y,
        },
    ))
}

fn parse_coordinate_pair(input: Span) -> IResult<Span, (i64, i64)> {
    pair(
        preceded(nom_char('X'), parse_integer),
        preceded(nom_char('Y'), parse_integer),
    )(input)
}

fn parse_integer(input: Span) -> IResult<Span, i64> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            take_while1(|c: char| c.is_ascii_digit()),
        ))),
        |number: Span| number.fragment().parse::<i64>(),
    )(input)
}

/// Splits the input into lines, keeping their location. A trailing `\r` stays on the line.
pub fn lines<'a>(input: Span<'a>) -> impl Iterator<Item = Span<'a>> {
    let mut remaining = input;

    std::iter::from_fn(move || {
        if remaining.fragment().is_empty() {
            return None;
        }

        let result: IResult<Span, Span> = map(
            pair(take_while(|c| c != '\n'), opt(tag("\n"))),
            |(line, _)| line,
        )(remaining);

        let (rest, line) = result.ok()?;
        remaining = rest;
        Some(line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_record() {
        let line = Span::new(
            "317GND                U1    -1     D0300PA00X+011811Y-009449X0600Y0600R000 S0",
        );
        let record = parse_net_line(line).unwrap();

        assert_eq!(*record.net.fragment(), "317GND");
        assert_eq!(record.x, 11811);
        assert_eq!(record.y, -9449);
    }

    #[test]
    fn only_the_first_pair_is_used() {
        let record = parse_net_line(Span::new("VCC X100Y200 X300Y400")).unwrap();
        assert_eq!((record.x, record.y), (100, 200));
    }

    #[test]
    fn parameter_and_end_records_are_skipped() {
        assert!(parse_net_line(Span::new("P  JOB   board X1Y1")).is_none());
        assert!(parse_net_line(Span::new("999")).is_none());
        assert!(parse_net_line(Span::new("C  comment without coordinates")).is_none());
        assert!(parse_net_line(Span::new("")).is_none());
    }

    #[test]
    fn lines_are_located() {
        let lines: Vec<_> = lines(Span::new("a\r\nb\n\nc")).collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(*lines[1].fragment(), "b");
        assert_eq!(lines[3].location_line(), 4);
    }
}
