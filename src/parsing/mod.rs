use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uom::si::Quantity;

pub mod drill;
pub mod gerber;
pub mod ipc_d356;

pub use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocationInfo {
    pub line: u32,
    pub column: usize,
}

impl LocationInfo {
    pub fn of(span: &Span) -> Self {
        Self {
            line: span.location_line(),
            column: span.get_utf8_column(),
        }
    }
}

impl std::fmt::Display for LocationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitMode {
    Metric,
    Imperial,
}

impl UnitMode {
    /// Millimeters per file unit.
    pub fn scale(&self) -> f64 {
        match self {
            UnitMode::Metric => 1.0,
            UnitMode::Imperial => 25.4,
        }
    }
}

pub fn parse_quantity<'de, U, V, D, DE>(deserializer: DE) -> Result<Quantity<D, U, V>, DE::Error>
where
    DE: Deserializer<'de>,
    D: uom::si::Dimension + ?Sized,
    U: uom::si::Units<V> + ?Sized,
    V: uom::num_traits::Num + uom::Conversion<V>,
    Quantity<D, U, V>: FromStr,
    <uom::si::Quantity<D, U, V> as std::str::FromStr>::Err: std::fmt::Debug,
{
    use serde::de::Error;

    let s = String::deserialize(deserializer)?;
    let quantity = Quantity::from_str(&s)
        .map_err(|error| DE::Error::custom(format!("Number formatting: {:?}", error)))?;

    Ok(quantity)
}

pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_one_based() {
        let span = Span::new("G04 hello*");
        let location = LocationInfo::of(&span);
        assert_eq!(location.line, 1);
        assert_eq!(location.column, 1);
        assert_eq!(location.to_string(), "1:1");
    }

    #[test]
    fn imperial_scale_is_inch_in_millimeters() {
        assert_eq!(UnitMode::Metric.scale(), 1.0);
        assert_eq!(UnitMode::Imperial.scale(), 25.4);
    }
}
