//! CSV output
//!
//! Every field is wrapped in double quotes, embedded quotes are doubled and
//! line breaks collapse to spaces. Multi-valued fields use the in-cell list
//! encoding `[''a''-|-''b'']`. Every row ends with the `is_legit`
//! classification column, `false` for freshly ingested data.

pub mod writer;
pub mod requote;

pub use writer::{
    decode_list, encode_value, sanitize_text, serialize, write_csv_file, CsvWriter,
    CLASSIFICATION_COLUMN, CLASSIFICATION_DEFAULT, LIST_SEPARATOR,
};
pub use requote::{parse_rows, requote};
