//! cryoSPARC particle reader.
//!
//! A `.cs` file is a NumPy record array (see [`super::npy`]). The reader
//! relies on the field positions cryoSPARC uses for exported particles:
//!
//! | index | field                   | meaning                            |
//! |-------|-------------------------|------------------------------------|
//! | 3     | `blob/shape`            | box size as `(rows, cols)`         |
//! | 8     | `location/micrograph_path` | micrograph path, NUL padded bytes |
//! | 9     | `location/micrograph_shape` | micrograph size as `(rows, cols)` |
//! | 10    | `location/center_x_frac` | center x as a fraction of width   |
//! | 11    | `location/center_y_frac` | center y as a fraction of height  |
//!
//! Coordinates are converted to pixels. The resulting table already carries
//! resolved `x`, `y`, `w`, `h` and `name` labels.

use std::fs;
use std::path::Path;

use super::column::ColumnData;
use super::field::Field;
use super::npy::{parse_npy, NpyValue, RecordArray};
use super::table::Table;
use crate::error::CoordconvError;

pub const CS_FIELD_BOX_SHAPE: usize = 3;
pub const CS_FIELD_MICROGRAPH_PATH: usize = 8;
pub const CS_FIELD_MICROGRAPH_SHAPE: usize = 9;
pub const CS_FIELD_CENTER_X: usize = 10;
pub const CS_FIELD_CENTER_Y: usize = 11;

/// Reads a cryoSPARC `.cs` file.
pub fn read_cs(path: &Path) -> Result<Table, CoordconvError> {
    let bytes = fs::read(path)?;
    parse_cs(&bytes, path)
}

/// Reads cryoSPARC particles from an in-memory `.npy` payload.
pub fn from_cs_slice(bytes: &[u8]) -> Result<Table, CoordconvError> {
    parse_cs(bytes, Path::new("<bytes>"))
}

fn unreadable(path: &Path, message: impl Into<String>) -> CoordconvError {
    CoordconvError::UnreadableInput {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_cs(bytes: &[u8], path: &Path) -> Result<Table, CoordconvError> {
    let array = parse_npy(bytes).map_err(|e| unreadable(path, e.to_string()))?;
    if array.records.is_empty() {
        return Err(CoordconvError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    if array.fields.len() <= CS_FIELD_CENTER_Y {
        return Err(unreadable(
            path,
            format!(
                "record has {} field(s), expected at least {}",
                array.fields.len(),
                CS_FIELD_CENTER_Y + 1
            ),
        ));
    }

    let rows = array.records.len();
    let mut xs = Vec::with_capacity(rows);
    let mut ys = Vec::with_capacity(rows);
    let mut ws = Vec::with_capacity(rows);
    let mut hs = Vec::with_capacity(rows);
    let mut names = Vec::with_capacity(rows);

    let reader = FieldReader { array: &array, path };
    for (row, record) in array.records.iter().enumerate() {
        let (mic_rows, mic_cols) = reader.pair(record, row, CS_FIELD_MICROGRAPH_SHAPE)?;
        let x_frac = reader.scalar(record, row, CS_FIELD_CENTER_X)?;
        let y_frac = reader.scalar(record, row, CS_FIELD_CENTER_Y)?;
        let (box_rows, box_cols) = reader.pair(record, row, CS_FIELD_BOX_SHAPE)?;

        xs.push(x_frac * mic_cols);
        ys.push(y_frac * mic_rows);
        ws.push(reader.integral(box_cols, row, CS_FIELD_BOX_SHAPE)?);
        hs.push(reader.integral(box_rows, row, CS_FIELD_BOX_SHAPE)?);
        names.push(reader.text(record, row, CS_FIELD_MICROGRAPH_PATH)?);
    }

    let mut table = Table::default();
    table.set_field(Field::X, ColumnData::Float(xs));
    table.set_field(Field::Y, ColumnData::Float(ys));
    table.set_field(Field::W, ColumnData::Int(ws));
    table.set_field(Field::H, ColumnData::Int(hs));
    table.set_field(Field::Name, ColumnData::Text(names));
    Ok(table)
}

struct FieldReader<'a> {
    array: &'a RecordArray,
    path: &'a Path,
}

impl FieldReader<'_> {
    fn error(&self, row: usize, index: usize, problem: &str) -> CoordconvError {
        unreadable(
            self.path,
            format!(
                "record {}: field {} ('{}') {}",
                row, index, self.array.fields[index].name, problem
            ),
        )
    }

    fn scalar(&self, record: &[NpyValue], row: usize, index: usize) -> Result<f64, CoordconvError> {
        record[index]
            .as_f64()
            .ok_or_else(|| self.error(row, index, "is not numeric"))
    }

    /// The first two elements of a sub-array field, as `(rows, cols)`.
    fn pair(
        &self,
        record: &[NpyValue],
        row: usize,
        index: usize,
    ) -> Result<(f64, f64), CoordconvError> {
        let values = record[index]
            .as_array()
            .filter(|values| values.len() >= 2)
            .ok_or_else(|| self.error(row, index, "is not a pair"))?;
        match (values[0].as_f64(), values[1].as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.error(row, index, "holds non-numeric values")),
        }
    }

    fn integral(&self, value: f64, row: usize, index: usize) -> Result<i64, CoordconvError> {
        if value.fract() == 0.0 && value.is_finite() {
            Ok(value as i64)
        } else {
            Err(self.error(row, index, "holds a non-integral size"))
        }
    }

    fn text(&self, record: &[NpyValue], row: usize, index: usize) -> Result<String, CoordconvError> {
        match &record[index] {
            NpyValue::Bytes(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| self.error(row, index, "is not valid UTF-8")),
            NpyValue::Text(text) => Ok(text.clone()),
            _ => Err(self.error(row, index, "is not a string")),
        }
    }
}

/// Fuzz-only entrypoint for cryoSPARC parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_cs(input: &[u8]) -> Result<(), CoordconvError> {
    let _ = parse_cs(input, Path::new("<fuzz>"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCR: &str = "[('uid', '<u8'), ('blob/path', '|S8'), ('blob/idx', '<u4'), \
('blob/shape', '<u4', (2,)), ('blob/psize_A', '<f4'), ('blob/sign', '<f4'), \
('blob/import_sig', '<u8'), ('location/micrograph_uid', '<u8'), \
('location/micrograph_path', '|S16'), ('location/micrograph_shape', '<u4', (2,)), \
('location/center_x_frac', '<f4'), ('location/center_y_frac', '<f4')]";

    fn record(box_size: u32, mic: (u32, u32), frac: (f32, f32), name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u64.to_le_bytes());
        out.extend_from_slice(b"blob.mrc");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&box_size.to_le_bytes());
        out.extend_from_slice(&box_size.to_le_bytes());
        out.extend_from_slice(&1.0f32.to_le_bytes());
        out.extend_from_slice(&(-1.0f32).to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&2u64.to_le_bytes());
        let mut padded = name.as_bytes().to_vec();
        padded.resize(16, 0);
        out.extend_from_slice(&padded);
        out.extend_from_slice(&mic.0.to_le_bytes());
        out.extend_from_slice(&mic.1.to_le_bytes());
        out.extend_from_slice(&frac.0.to_le_bytes());
        out.extend_from_slice(&frac.1.to_le_bytes());
        out
    }

    fn npy(descr: &str, count: usize, payload: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': {}, 'fortran_order': False, 'shape': ({},), }}\n",
            descr, count
        );
        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn converts_fractions_to_pixels() {
        let mut payload = record(128, (4000, 3000), (0.5, 0.25), "mic1.mrc");
        payload.extend(record(128, (4000, 3000), (0.125, 1.0), "mic2.mrc"));
        let table = from_cs_slice(&npy(DESCR, 2, &payload)).expect("parse failed");

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.field(Field::X), Some(&ColumnData::Float(vec![1500.0, 375.0])));
        assert_eq!(table.field(Field::Y), Some(&ColumnData::Float(vec![1000.0, 4000.0])));
        assert_eq!(table.field(Field::W), Some(&ColumnData::Int(vec![128, 128])));
        assert_eq!(table.field(Field::H), Some(&ColumnData::Int(vec![128, 128])));
        assert_eq!(
            table.field(Field::Name),
            Some(&ColumnData::Text(vec!["mic1.mrc".into(), "mic2.mrc".into()]))
        );
    }

    #[test]
    fn zero_records_is_empty_input() {
        let err = from_cs_slice(&npy(DESCR, 0, &[])).unwrap_err();
        assert!(matches!(err, CoordconvError::EmptyInput { .. }));
    }

    #[test]
    fn short_layout_is_unreadable() {
        let err = from_cs_slice(&npy("[('uid', '<u8')]", 1, &[0; 8])).unwrap_err();
        assert!(matches!(err, CoordconvError::UnreadableInput { .. }));
    }

    #[test]
    fn garbage_is_unreadable() {
        let err = from_cs_slice(b"data_\nloop_\n").unwrap_err();
        assert!(matches!(err, CoordconvError::UnreadableInput { .. }));
    }
}
