//! Minimal reader for NumPy `.npy` record arrays.
//!
//! cryoSPARC stores particle metadata as a structured NumPy array written
//! with `numpy.save`. The file starts with the magic `\x93NUMPY`, a format
//! version, and a Python-literal header such as
//!
//! ```text
//! {'descr': [('uid', '<u8'), ('blob/shape', '<u4', (2,)), ...],
//!  'fortran_order': False, 'shape': (1024,), }
//! ```
//!
//! followed by the packed records. This module decodes fixed-size fields
//! of kinds `b`, `i`, `u`, `f`, `S`, `U` and `V`, including fixed sub-array
//! shapes. Object fields (`O`) would require unpickling and are rejected.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{anychar, char, digit1, multispace0, satisfy},
    combinator::{all_consuming, cut, map, map_res, opt, recognize, value},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult, Parser,
};
use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";

/// Errors raised while decoding an `.npy` payload.
#[derive(Debug, Error, PartialEq)]
pub enum NpyError {
    #[error("missing NPY magic string")]
    BadMagic,

    #[error("unsupported NPY format version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("invalid NPY header: {0}")]
    Header(String),

    #[error("unsupported field dtype '{0}'")]
    UnsupportedDtype(String),

    #[error("array is not a record array (descr '{0}')")]
    NotRecordArray(String),

    #[error("payload truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// A decoded field value.
#[derive(Clone, Debug, PartialEq)]
pub enum NpyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<NpyValue>),
}

impl NpyValue {
    /// Numeric value of a scalar field.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NpyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            NpyValue::Int(i) => Some(*i as f64),
            NpyValue::UInt(u) => Some(*u as f64),
            NpyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Elements of a sub-array field.
    pub fn as_array(&self) -> Option<&[NpyValue]> {
        match self {
            NpyValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// Scalar kind of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    UInt,
    Float,
    Bytes,
    Unicode,
    Void,
}

/// Scalar dtype of a record field, e.g. `<f4` or `|S128`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalarType {
    kind: Kind,
    size: usize,
    little_endian: bool,
}

impl ScalarType {
    fn parse(typestr: &str) -> Result<Self, NpyError> {
        let unsupported = || NpyError::UnsupportedDtype(typestr.to_string());
        let mut chars = typestr.chars();
        let little_endian = match chars.next() {
            Some('<') | Some('|') | Some('=') => true,
            Some('>') => false,
            _ => return Err(unsupported()),
        };
        let kind = match chars.next() {
            Some('b') => Kind::Bool,
            Some('i') => Kind::Int,
            Some('u') => Kind::UInt,
            Some('f') => Kind::Float,
            Some('S') => Kind::Bytes,
            Some('U') => Kind::Unicode,
            Some('V') => Kind::Void,
            _ => return Err(unsupported()),
        };
        let count: usize = chars.as_str().parse().map_err(|_| unsupported())?;

        let size = match kind {
            Kind::Bool if count == 1 => 1,
            Kind::Int | Kind::UInt if matches!(count, 1 | 2 | 4 | 8) => count,
            Kind::Float if matches!(count, 4 | 8) => count,
            Kind::Bytes | Kind::Void => count,
            Kind::Unicode => count.checked_mul(4).ok_or_else(unsupported)?,
            _ => return Err(unsupported()),
        };

        Ok(Self {
            kind,
            size,
            little_endian,
        })
    }

    fn decode(&self, bytes: &[u8]) -> NpyValue {
        match self.kind {
            Kind::Bool => NpyValue::Bool(bytes[0] != 0),
            Kind::UInt => NpyValue::UInt(self.read_uint(bytes)),
            Kind::Int => {
                let raw = self.read_uint(bytes);
                let shift = 64 - 8 * self.size as u32;
                NpyValue::Int(((raw << shift) as i64) >> shift)
            }
            Kind::Float => match self.size {
                4 => NpyValue::Float(f32::from_bits(self.read_uint(bytes) as u32) as f64),
                _ => NpyValue::Float(f64::from_bits(self.read_uint(bytes))),
            },
            Kind::Bytes | Kind::Void => {
                let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                NpyValue::Bytes(bytes[..end].to_vec())
            }
            Kind::Unicode => NpyValue::Text(
                bytes
                    .chunks_exact(4)
                    .map(|c| self.read_uint(c) as u32)
                    .take_while(|&c| c != 0)
                    .filter_map(char::from_u32)
                    .collect(),
            ),
        }
    }

    fn read_uint(&self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        if self.little_endian {
            bytes.iter().rev().fold(0, fold)
        } else {
            bytes.iter().fold(0, fold)
        }
    }
}

/// One named field of the record dtype.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescr {
    pub name: String,
    pub dtype: ScalarType,
    /// Sub-array shape; empty for scalar fields.
    pub shape: Vec<usize>,
}

impl FieldDescr {
    fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    fn byte_size(&self) -> usize {
        self.dtype.size * self.element_count()
    }

    fn checked_byte_size(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(self.dtype.size, |acc, &dim| acc.checked_mul(dim))
    }

    fn decode(&self, bytes: &[u8]) -> NpyValue {
        if self.shape.is_empty() {
            return self.dtype.decode(bytes);
        }
        NpyValue::Array(
            bytes
                .chunks_exact(self.dtype.size.max(1))
                .take(self.element_count())
                .map(|chunk| self.dtype.decode(chunk))
                .collect(),
        )
    }
}

/// A decoded record array.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordArray {
    pub fields: Vec<FieldDescr>,
    /// One entry per record, values in field order.
    pub records: Vec<Vec<NpyValue>>,
}

/// Decodes an `.npy` record array from bytes.
pub fn parse_npy(bytes: &[u8]) -> Result<RecordArray, NpyError> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (len_size, max_minor) = match major {
        1 => (2, 0),
        2 | 3 => (4, 0),
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };
    if minor > max_minor {
        return Err(NpyError::UnsupportedVersion(major, minor));
    }

    let header_start = 8 + len_size;
    let len_bytes = bytes.get(8..header_start).ok_or(NpyError::Truncated {
        expected: header_start,
        actual: bytes.len(),
    })?;
    let header_len = len_bytes
        .iter()
        .rev()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    let header_end = header_start + header_len;
    let header_bytes = bytes.get(header_start..header_end).ok_or(NpyError::Truncated {
        expected: header_end,
        actual: bytes.len(),
    })?;
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|e| NpyError::Header(format!("header is not valid text: {}", e)))?;

    let header = parse_header(header_text)?;
    let (fields, count) = interpret_header(&header)?;

    let too_large = || NpyError::Header("record array size overflows".to_string());
    let record_size = fields.iter().try_fold(0usize, |acc, field| {
        field
            .checked_byte_size()
            .and_then(|size| acc.checked_add(size))
            .ok_or_else(too_large)
    })?;
    if record_size == 0 && count > 0 {
        return Err(NpyError::Header("records have zero size".to_string()));
    }
    let payload = &bytes[header_end..];
    let expected = record_size.checked_mul(count).ok_or_else(too_large)?;
    if payload.len() < expected {
        return Err(NpyError::Truncated {
            expected,
            actual: payload.len(),
        });
    }

    let records = if count == 0 {
        Vec::new()
    } else {
        payload[..expected]
            .chunks_exact(record_size)
            .map(|record| {
                let mut offset = 0;
                fields
                    .iter()
                    .map(|field| {
                        let size = field.byte_size();
                        let value = field.decode(&record[offset..offset + size]);
                        offset += size;
                        value
                    })
                    .collect()
            })
            .collect()
    };

    Ok(RecordArray { fields, records })
}

/// Extracts the field list and record count from the header dictionary.
fn interpret_header(header: &Literal) -> Result<(Vec<FieldDescr>, usize), NpyError> {
    let Literal::Dict(entries) = header else {
        return Err(NpyError::Header("header is not a dictionary".to_string()));
    };
    let lookup = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| matches!(k, Literal::Str(s) if s == key))
            .map(|(_, v)| v)
            .ok_or_else(|| NpyError::Header(format!("missing '{}' key", key)))
    };

    let fields = match lookup("descr")? {
        Literal::List(items) => items
            .iter()
            .map(parse_field_descr)
            .collect::<Result<Vec<_>, _>>()?,
        Literal::Str(s) => return Err(NpyError::NotRecordArray(s.clone())),
        _ => return Err(NpyError::Header("'descr' is not a list".to_string())),
    };

    let count = match lookup("shape")? {
        Literal::Tuple(dims) => dims.iter().try_fold(1usize, |acc, dim| match dim {
            Literal::Int(n) if *n >= 0 => acc
                .checked_mul(*n as usize)
                .ok_or_else(|| NpyError::Header("'shape' overflows".to_string())),
            _ => Err(NpyError::Header("'shape' holds a non-integer".to_string())),
        })?,
        _ => return Err(NpyError::Header("'shape' is not a tuple".to_string())),
    };

    Ok((fields, count))
}

fn parse_field_descr(item: &Literal) -> Result<FieldDescr, NpyError> {
    let invalid = || NpyError::Header(format!("invalid field description {:?}", item));
    let Literal::Tuple(parts) = item else {
        return Err(invalid());
    };

    let name = match parts.first() {
        Some(Literal::Str(name)) => name.clone(),
        // (title, name) pairs
        Some(Literal::Tuple(pair)) => match pair.last() {
            Some(Literal::Str(name)) => name.clone(),
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };

    let dtype = match parts.get(1) {
        Some(Literal::Str(typestr)) => ScalarType::parse(typestr)?,
        Some(Literal::List(_)) => {
            return Err(NpyError::UnsupportedDtype(format!("nested record in field '{}'", name)))
        }
        _ => return Err(invalid()),
    };

    let shape = match parts.get(2) {
        None => Vec::new(),
        Some(Literal::Int(n)) if *n >= 0 => vec![*n as usize],
        Some(Literal::Tuple(dims)) => dims
            .iter()
            .map(|d| match d {
                Literal::Int(n) if *n >= 0 => Ok(*n as usize),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid()),
    };

    Ok(FieldDescr { name, dtype, shape })
}

/// The subset of Python literals that appears in NPY headers.
#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

/// Deepest bracket nesting accepted in a header; real headers use three levels.
const MAX_HEADER_DEPTH: usize = 32;

fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    for c in text.chars() {
        match c {
            '[' | '(' | '{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

/// Parses the header dictionary literal.
fn parse_header(text: &str) -> Result<Literal, NpyError> {
    if nesting_depth(text) > MAX_HEADER_DEPTH {
        return Err(NpyError::Header("header nests too deeply".to_string()));
    }
    all_consuming(terminated(literal, multispace0))
        .parse(text)
        .map(|(_, value)| value)
        .map_err(|e| {
            let rest = match e {
                nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
                nom::Err::Incomplete(_) => "",
            };
            let near: String = rest.chars().take(24).collect();
            NpyError::Header(format!(
                "unexpected input at offset {} near '{}'",
                text.len() - rest.len(),
                near
            ))
        })
}

fn punct<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = nom::error::Error<&'a str>> {
    preceded(multispace0, char(c))
}

/// Parse one literal, skipping leading whitespace.
fn literal(input: &str) -> IResult<&str, Literal> {
    preceded(
        multispace0,
        alt((
            dict,
            map(sequence('[', ']'), Literal::List),
            map(sequence('(', ')'), Literal::Tuple),
            map(string, Literal::Str),
            integer,
            keyword,
        )),
    )
    .parse(input)
}

/// Comma separated literals between brackets; a trailing comma is allowed.
/// Past the opening bracket errors are fatal, so they point inside the literal.
fn sequence(open: char, close: char) -> impl FnMut(&str) -> IResult<&str, Vec<Literal>> {
    move |input| {
        preceded(
            char(open),
            cut(terminated(
                terminated(separated_list0(punct(','), literal), opt(punct(','))),
                punct(close),
            )),
        )
        .parse(input)
    }
}

fn dict(input: &str) -> IResult<&str, Literal> {
    map(
        preceded(
            char('{'),
            cut(terminated(
                terminated(
                    separated_list0(punct(','), separated_pair(literal, punct(':'), literal)),
                    opt(punct(',')),
                ),
                punct('}'),
            )),
        ),
        Literal::Dict,
    )
    .parse(input)
}

fn quoted(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input| {
        delimited(
            char(quote),
            fold_many0(
                alt((
                    preceded(char('\\'), anychar),
                    satisfy(move |c| c != quote && c != '\\'),
                )),
                String::new,
                |mut out, c| {
                    out.push(c);
                    out
                },
            ),
            char(quote),
        )
        .parse(input)
    }
}

fn string(input: &str) -> IResult<&str, String> {
    alt((quoted('\''), quoted('"'))).parse(input)
}

/// Python 2 era headers may write long integers as `1024L`.
fn integer(input: &str) -> IResult<&str, Literal> {
    map_res(
        terminated(recognize(pair(opt(char('-')), digit1)), opt(char('L'))),
        |digits: &str| digits.parse().map(Literal::Int),
    )
    .parse(input)
}

fn keyword(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Bool(true), tag("True")),
        value(Literal::Bool(false), tag("False")),
        value(Literal::None, tag("None")),
    ))
    .parse(input)
}
