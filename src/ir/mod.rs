//! Intermediate Representation (IR) for particle coordinates.
//!
//! Every reader turns its file into a [`Table`]: an ordered set of typed,
//! labelled columns. Readers label columns with whatever the file provides
//! (STAR directive names, header row names, or positions); the column
//! resolver in [`crate::conversion`] then maps those labels onto the
//! particle [`Field`]s `x`, `y`, `w`, `h`, `conf` and `name`. Writers only
//! look at resolved fields.
//!
//! # Design Principles
//!
//! 1. **Lossless reading**: Readers keep every column of the file, so the
//!    resolver can pick any of them by name or position.
//!
//! 2. **Inferred storage**: Column types (integer, float, text) are inferred
//!    from the tokens, with the usual missing-value tokens (`NA`, `nan`,
//!    `<NA>`, ...) treated as gaps.
//!
//! 3. **Explicit overwrite policy**: Writers never replace an existing
//!    file unless [`Overwrite::Force`] is given.
//!
//! # Example
//!
//! ```
//! use coordconv::ir::{ColumnData, Field, Table};
//!
//! let mut table = Table::default();
//! table.set_field(Field::X, ColumnData::Float(vec![120.0, 64.5]));
//! table.set_field(Field::Y, ColumnData::Float(vec![80.0, 32.0]));
//! assert_eq!(table.num_rows(), 2);
//! assert!(!table.has_field(Field::Conf));
//! ```

mod column;
mod field;
pub mod io_cs;
pub mod io_delimited;
pub mod io_star;
pub mod npy;
mod overwrite;
mod table;
pub mod token;

// Re-export core types for convenient access
pub use column::{Column, ColumnData, Label};
pub use field::Field;
pub use io_delimited::HeaderMode;
pub use overwrite::Overwrite;
pub use table::{Record, Table};
