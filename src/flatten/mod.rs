//! Record flattening - turn nested documents into flat, tabular records
//!
//! Mapping keys are joined into key paths (`a_b_c`); sequences reuse their
//! parent's path so repeated child mappings collapse onto shared columns,
//! and repeated visits of one path turn its value into a list.

pub mod types;
pub mod extractor;
pub mod loader;

pub use types::{Document, FieldValue, FlatRecord, FlattenConfig, Scalar};
pub use extractor::RecordFlattener;
pub use loader::{find_files, load_documents, parse_documents, prepare_front_matter, DocumentFormat, LoadedDocument};
