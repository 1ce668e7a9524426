//! Document discovery and parsing
//!
//! Reads YAML files (possibly holding several documents) and Markdown files
//! with YAML front matter. Parsing is best-effort: a file that fails to parse
//! is reported and skipped, the rest of the batch carries on.

use crate::flatten::types::Document;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

// Upstream front matter sometimes writes `key: *value`, which YAML reads as an alias
static ALIAS_VALUE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":\s+\*([^\s]+)").unwrap()
});

/// How the text of a file is turned into documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain YAML, one or more `---` separated documents
    Yaml,
    /// Markdown with YAML front matter
    FrontMatter,
}

impl DocumentFormat {
    /// Apply the format's text fixes before parsing
    pub fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            DocumentFormat::Yaml => Cow::Borrowed(text),
            DocumentFormat::FrontMatter => Cow::Owned(prepare_front_matter(text)),
        }
    }
}

/// A parsed document together with the file it came from
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub document: Document,
}

impl LoadedDocument {
    /// File name without its extension
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Drop one trailing blank line and quote alias-like values
pub fn prepare_front_matter(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let joined = lines.join("\n");
    ALIAS_VALUE_REGEX
        .replace_all(&joined, r#": "${1}""#)
        .into_owned()
}

/// Parse every document in `text`.
///
/// Documents that parsed before an error are kept; the error is returned
/// alongside them. Null and bare scalar documents carry no fields and are
/// dropped.
pub fn parse_documents(text: &str) -> (Vec<Document>, Option<serde_yaml::Error>) {
    let mut documents = Vec::new();

    for deserializer in serde_yaml::Deserializer::from_str(text) {
        match Document::deserialize(deserializer) {
            Ok(document) => {
                if has_fields(&document) {
                    documents.push(document);
                }
            }
            Err(e) => return (documents, Some(e)),
        }
    }

    (documents, None)
}

fn has_fields(document: &Document) -> bool {
    match document {
        Document::Mapping(_) | Document::Sequence(_) => true,
        Document::Tagged(tagged) => has_fields(&tagged.value),
        _ => false,
    }
}

/// Read a file as text, replacing invalid UTF-8
pub fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load and parse every file in `paths`
pub fn load_documents(paths: &[PathBuf], format: DocumentFormat) -> Vec<LoadedDocument> {
    let mut loaded = Vec::new();

    for path in paths {
        debug!(file = %path.display(), "reading");
        let text = match read_text_lossy(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };

        let prepared = format.prepare(&text);
        let (documents, error) = parse_documents(&prepared);
        if let Some(e) = error {
            warn!(file = %path.display(), "Error parsing YAML: {}", e);
        }

        loaded.extend(documents.into_iter().map(|document| LoadedDocument {
            path: path.clone(),
            document,
        }));
    }

    loaded
}

/// Recursively find files under `root` ending with `extension`.
///
/// Paths containing any of the `exclude` fragments are skipped. The result is
/// sorted so exports are stable between runs.
pub fn find_files(root: &Path, extension: &str, exclude: &[&str]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.to_string_lossy().ends_with(extension))
        .filter(|path| {
            let text = path.to_string_lossy();
            !exclude.iter().any(|fragment| text.contains(fragment))
        })
        .collect();
    found.sort();
    found
}
