//! The six semantic fields a particle record can carry.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A semantic particle field.
///
/// The variant order is the canonical field order used for
/// column overrides, STAR header directives and output selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    X,
    Y,
    W,
    H,
    Conf,
    Name,
}

impl Field {
    /// All fields in canonical order.
    pub const ALL: [Field; 6] = [
        Field::X,
        Field::Y,
        Field::W,
        Field::H,
        Field::Conf,
        Field::Name,
    ];

    /// The geometric fields that take part in shifting and rounding.
    pub const GEOMETRY: [Field; 4] = [Field::X, Field::Y, Field::W, Field::H];

    /// Column name used for this field inside a resolved [`Table`](super::Table).
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::X => "x",
            Field::Y => "y",
            Field::W => "w",
            Field::H => "h",
            Field::Conf => "conf",
            Field::Name => "name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("'{}' is not a particle field", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_names() {
        assert_eq!("conf".parse::<Field>(), Ok(Field::Conf));
        assert_eq!("name".parse::<Field>(), Ok(Field::Name));
        assert!("none".parse::<Field>().is_err());
        assert!("X".parse::<Field>().is_err());
    }

    #[test]
    fn canonical_order_matches_all() {
        let mut sorted = Field::ALL;
        sorted.sort();
        assert_eq!(sorted, Field::ALL);
    }
}
