//! Export plumbing shared by all sources
//!
//! Sources produce [`Table`]s; this module writes them into the configured
//! output directory through the shared CSV serializer.

use crate::csv::{requote, write_csv_file};
use crate::fetch::{repository_dir_name, Retriever};
use crate::flatten::FlatRecord;
use crate::schema::KeySchema;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Configuration for one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory receiving the CSV files
    pub output_dir: PathBuf,

    /// Directory holding the upstream repository clones
    pub mirror_dir: PathBuf,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output_dir: PathBuf::from("export"),
            mirror_dir: PathBuf::from("."),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One output file produced by a source
#[derive(Debug, Clone)]
pub enum Table {
    /// Flat records rendered against the schema's key order
    Records {
        file_name: String,
        records: Vec<FlatRecord>,
        schema: KeySchema,
    },
    /// CSV text published upstream, re-quoted on write
    Csv { file_name: String, content: String },
}

impl Table {
    pub fn records(file_name: impl Into<String>, records: Vec<FlatRecord>, schema: KeySchema) -> Self {
        Table::Records {
            file_name: file_name.into(),
            records,
            schema,
        }
    }

    pub fn csv(file_name: impl Into<String>, content: String) -> Self {
        Table::Csv {
            file_name: file_name.into(),
            content,
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Table::Records { file_name, .. } | Table::Csv { file_name, .. } => file_name,
        }
    }
}

/// Write a table into `output_dir`, creating the directory when needed
pub fn write_table(output_dir: &Path, table: &Table) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;
    let path = output_dir.join(table.file_name());

    match table {
        Table::Records { records, schema, .. } => {
            write_csv_file(&path, records, schema.keys())?;
        }
        Table::Csv { content, .. } => {
            let quoted = requote(content)?;
            std::fs::write(&path, quoted)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
        }
    }

    info!(path = %path.display(), "Output file");
    Ok(path)
}

/// Everything a source needs while producing its tables
pub struct SourceContext<'a> {
    pub retriever: &'a dyn Retriever,
    pub config: &'a ExportConfig,
}

impl<'a> SourceContext<'a> {
    pub fn new(retriever: &'a dyn Retriever, config: &'a ExportConfig) -> Self {
        SourceContext { retriever, config }
    }

    /// Fetch text, logging and swallowing the failure
    pub fn fetch(&self, url: &str) -> Option<String> {
        match self.retriever.fetch_text(url) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// Mirror a repository and return its local directory.
    ///
    /// A failed update falls back to an existing clone.
    pub fn mirror(&self, url: &str) -> Result<PathBuf> {
        let dest = self.config.mirror_dir.join(repository_dir_name(url));
        match self.retriever.mirror_repository(url, &dest) {
            Ok(()) => Ok(dest),
            Err(e) if dest.is_dir() => {
                warn!("{:#}; using existing clone at {}", e, dest.display());
                Ok(dest)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_records_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("export");
        let mut record = FlatRecord::new();
        record.insert("name", "foo");
        let table = Table::records("t.csv", vec![record], KeySchema::with_keys(["name"]));

        let path = write_table(&out, &table).unwrap();

        assert_eq!(path, out.join("t.csv"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "\"name\",\"is_legit\"\n\"foo\",\"false\"\n"
        );
    }

    #[test]
    fn test_write_csv_table_requotes() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::csv("raw.csv", String::from("a,b\n1,2\n"));

        let path = write_table(dir.path(), &table).unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "\"a\",\"b\",\"is_legit\"\n\"1\",\"2\",\"false\"\n"
        );
    }
}
