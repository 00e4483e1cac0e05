//! Token-level helpers shared by the text readers and writers.

use super::column::ColumnData;

/// Tokens that denote a missing value in delimited particle files.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Returns true if the token stands for a missing value.
#[inline]
pub fn is_missing(token: &str) -> bool {
    MISSING_TOKENS.contains(&token)
}

/// Parses a token as a float, treating missing tokens as `None`.
#[inline]
pub fn parse_number(token: &str) -> Option<f64> {
    if is_missing(token) {
        return None;
    }
    token.parse::<f64>().ok()
}

/// Returns true if the line contains any ASCII digit.
#[inline]
pub fn has_digit(line: &str) -> bool {
    line.bytes().any(|b| b.is_ascii_digit())
}

/// Returns true if no present cell of the row parses as a number.
pub fn row_is_all_non_numeric(row: &[&str]) -> bool {
    row.iter().all(|token| parse_number(token).is_none())
}

/// Infers typed column data from raw tokens.
///
/// `None` entries are cells missing from short rows. A column becomes
/// `Int` only when every cell is present and integral, `Float` when every
/// present cell is numeric, and `Text` otherwise.
pub fn infer_column(tokens: &[Option<&str>]) -> ColumnData {
    let present: Vec<&str> = tokens
        .iter()
        .map(|t| t.unwrap_or(""))
        .collect();

    if !present.is_empty() {
        let ints: Option<Vec<i64>> = present.iter().map(|t| t.parse::<i64>().ok()).collect();
        if let Some(ints) = ints {
            return ColumnData::Int(ints);
        }
    }

    let floats: Option<Vec<f64>> = present
        .iter()
        .map(|t| {
            if is_missing(t) {
                Some(f64::NAN)
            } else {
                t.parse::<f64>().ok()
            }
        })
        .collect();
    if let Some(floats) = floats {
        return ColumnData::Float(floats);
    }

    ColumnData::Text(
        present
            .iter()
            .map(|t| if is_missing(t) { String::new() } else { (*t).to_string() })
            .collect(),
    )
}

/// Renders a float the way the output formats expect.
///
/// Integral values keep one fractional digit (`20.0`), NaN becomes an
/// empty cell, everything else uses the shortest round-trip form.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", value)
    }
}
