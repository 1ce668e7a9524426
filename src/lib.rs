//! # lotcsv - Living-off-the-Land dataset aggregator
//!
//! Collects security reference datasets (binaries, drivers, certificates,
//! tunnels, webhooks, RMM tools, ...) from their upstream repositories and
//! sites, and normalizes all of them into one CSV convention.
//!
//! ## Modules
//!
//! - **flatten**: turn nested YAML/front-matter documents into flat records
//! - **schema**: ordered union of the key paths seen during one export
//! - **csv**: fully quoted CSV output with in-cell list encoding
//! - **sources**: one adapter per upstream dataset
//!
//! ## Quick Start
//!
//! ```rust
//! use lotcsv::flatten::Document;
//!
//! # fn main() -> anyhow::Result<()> {
//! let docs: Vec<Document> = vec![
//!     serde_yaml::from_str(r#"{"name": "foo", "tags": ["x", "y"]}"#)?,
//!     serde_yaml::from_str(r#"{"name": "bar"}"#)?,
//! ];
//!
//! let csv = lotcsv::documents_to_csv(&docs)?;
//! assert_eq!(
//!     csv,
//!     "\"name\",\"tags\",\"is_legit\"\n\
//!      \"foo\",\"[''x''-|-''y'']\",\"false\"\n\
//!      \"bar\",\"\",\"false\"\n"
//! );
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde_json::{json, Map, Value};
use std::path::Path;

pub mod csv;
pub mod export;
pub mod fetch;
pub mod flatten;
pub mod schema;
pub mod sources;

// Re-export commonly used types for convenience
pub use export::{write_table, ExportConfig, SourceContext, Table};
pub use fetch::{FetchError, HttpRetriever, Retriever};
pub use flatten::{Document, FieldValue, FlatRecord, FlattenConfig, RecordFlattener, Scalar};
pub use schema::KeySchema;
pub use sources::{registry, resolve_selection, run_selected, run_source, Source};

/// Flatten documents in order and serialize them as one CSV table
pub fn documents_to_csv(documents: &[Document]) -> Result<String> {
    let flattener = RecordFlattener::default();
    let (records, schema) = flattener.flatten_all(documents);
    csv::serialize(&records, schema.keys())
}

/// Flatten one YAML file and describe the result as pretty JSON
pub fn inspect_file(path: &Path, format: flatten::DocumentFormat) -> Result<String> {
    let documents = flatten::load_documents(&[path.to_path_buf()], format);
    let flattener = RecordFlattener::default();
    let (records, schema) = flattener.flatten_all(documents.iter().map(|loaded| &loaded.document));

    let ordered = records
        .iter()
        .map(|record| ordered_fields(record, schema.keys()))
        .collect::<serde_json::Result<Vec<_>>>()?;

    let report = json!({
        "records": ordered,
        "keys": schema.keys(),
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

/// A record's fields as a JSON object, in key order
fn ordered_fields(record: &FlatRecord, keys: &[String]) -> serde_json::Result<Map<String, Value>> {
    let mut fields = Map::new();
    for key in keys {
        if let Some(value) = record.get(key) {
            fields.insert(key.clone(), serde_json::to_value(value)?);
        }
    }
    Ok(fields)
}
