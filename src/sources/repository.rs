//! Sources backed by a git repository of YAML or Markdown files

use crate::csv::writer::render_value;
use crate::export::{SourceContext, Table};
use crate::flatten::{
    find_files, load_documents, Document, DocumentFormat, FieldValue, FlatRecord,
    LoadedDocument, RecordFlattener, Scalar,
};
use crate::schema::KeySchema;
use crate::sources::Source;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Column filled from the file name for sources whose files are named after the tool
pub const NAME_COLUMN: &str = "Name";

/// Flatten loaded documents into one table's records and schema.
///
/// With `name_from_file` the schema starts with a `Name` column holding the
/// file stem, unless the document provides its own `Name`.
pub fn flatten_documents(
    documents: &[LoadedDocument],
    name_from_file: bool,
) -> (Vec<FlatRecord>, KeySchema) {
    let flattener = RecordFlattener::default();
    let mut schema = if name_from_file {
        KeySchema::with_keys([NAME_COLUMN])
    } else {
        KeySchema::new()
    };

    let records = documents
        .iter()
        .map(|loaded| {
            let mut record = flattener.flatten(&loaded.document, &mut schema);
            if name_from_file && !record.contains_key(NAME_COLUMN) {
                record.insert(NAME_COLUMN, loaded.file_stem());
            }
            record
        })
        .collect();

    (records, schema)
}

fn load_table(
    root: &Path,
    extension: &str,
    exclude: &[&str],
    format: DocumentFormat,
    name_from_file: bool,
) -> (Vec<FlatRecord>, KeySchema) {
    let files = find_files(root, extension, exclude);
    info!(dir = %root.display(), files = files.len(), "Reading documents");
    let documents = load_documents(&files, format);
    flatten_documents(&documents, name_from_file)
}

/// A repository with a directory of YAML files, one or more documents each
pub struct YamlRepository {
    name: &'static str,
    repository: &'static str,
    subdir: &'static str,
    exclude: Vec<&'static str>,
    file_name: &'static str,
}

impl YamlRepository {
    pub fn new(
        name: &'static str,
        repository: &'static str,
        subdir: &'static str,
        file_name: &'static str,
    ) -> Self {
        YamlRepository {
            name,
            repository,
            subdir,
            exclude: Vec::new(),
            file_name,
        }
    }

    /// Skip files whose path contains any of `fragments`
    pub fn excluding(mut self, fragments: &[&'static str]) -> Self {
        self.exclude.extend_from_slice(fragments);
        self
    }
}

impl Source for YamlRepository {
    fn name(&self) -> &'static str {
        self.name
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let repo = ctx.mirror(self.repository)?;
        let (records, schema) = load_table(
            &repo.join(self.subdir),
            ".yml",
            &self.exclude,
            DocumentFormat::Yaml,
            false,
        );
        Ok(vec![Table::records(self.file_name, records, schema)])
    }
}

/// A repository of Markdown pages carrying YAML front matter
pub struct FrontMatterRepository {
    name: &'static str,
    repository: &'static str,
    subdir: &'static str,
    file_name: &'static str,
    name_from_file: bool,
}

impl FrontMatterRepository {
    pub fn new(
        name: &'static str,
        repository: &'static str,
        subdir: &'static str,
        file_name: &'static str,
    ) -> Self {
        FrontMatterRepository {
            name,
            repository,
            subdir,
            file_name,
            name_from_file: false,
        }
    }

    /// Add a leading `Name` column taken from each page's file name
    pub fn with_name_from_file(mut self) -> Self {
        self.name_from_file = true;
        self
    }

    fn read(&self, ctx: &SourceContext) -> Result<(Vec<FlatRecord>, KeySchema)> {
        let repo = ctx.mirror(self.repository)?;
        Ok(load_table(
            &repo.join(self.subdir),
            ".md",
            &[],
            DocumentFormat::FrontMatter,
            self.name_from_file,
        ))
    }
}

impl Source for FrontMatterRepository {
    fn name(&self) -> &'static str {
        self.name
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let (records, schema) = self.read(ctx)?;
        Ok(vec![Table::records(self.file_name, records, schema)])
    }
}

/// Tunnelling tools, plus a narrow `Name`/`Domain` table of detection domains
pub struct LotTunnels {
    pages: FrontMatterRepository,
}

impl Default for LotTunnels {
    fn default() -> Self {
        LotTunnels {
            pages: FrontMatterRepository::new(
                "lottunnels",
                "https://github.com/LOTTunnels/LOTTunnels.github.io",
                "_lottunnels/Binaries",
                "lottunnels.csv",
            ),
        }
    }
}

/// Field holding the domains a tunnelling tool talks to
pub const DETECTION_DOMAIN: &str = "Detection_Domain";

/// One `Name`/`Domain` record per detection domain value
pub fn domain_projection(records: &[FlatRecord]) -> (Vec<FlatRecord>, KeySchema) {
    let schema = KeySchema::with_keys([NAME_COLUMN, "Domain"]);
    let mut projected = Vec::new();

    for record in records {
        let Some(domains) = record.get(DETECTION_DOMAIN) else {
            continue;
        };
        let name = record.get(NAME_COLUMN).map(render_value).unwrap_or_default();
        for domain in domains.scalars() {
            let mut row = FlatRecord::new();
            row.insert(NAME_COLUMN, name.clone());
            row.insert("Domain", domain.to_string());
            projected.push(row);
        }
    }

    (projected, schema)
}

/// `lottunnels.csv` becomes `lottunnels_domain.csv`
fn domain_file_name(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
    format!("{}_domain.csv", stem)
}

impl Source for LotTunnels {
    fn name(&self) -> &'static str {
        self.pages.name
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let (records, schema) = self.pages.read(ctx)?;
        let (domains, domain_schema) = domain_projection(&records);
        Ok(vec![
            Table::records(self.pages.file_name, records, schema),
            Table::records(domain_file_name(self.pages.file_name), domains, domain_schema),
        ])
    }
}

/// Code-signing certificates, one table per category directory
pub struct LolCerts {
    repository: &'static str,
    categories: Vec<(&'static str, &'static str)>,
}

impl Default for LolCerts {
    fn default() -> Self {
        LolCerts {
            repository: "https://github.com/ReversecLabs/lolcerts",
            categories: vec![
                ("malicious", "lolcerts_malicious.csv"),
                ("leaked", "lolcerts_leaked.csv"),
            ],
        }
    }
}

impl Source for LolCerts {
    fn name(&self) -> &'static str {
        "lolcerts"
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let repo = ctx.mirror(self.repository)?;
        Ok(self
            .categories
            .iter()
            .map(|(subdir, file_name)| {
                let (records, schema) =
                    load_table(&repo.join(subdir), ".yml", &[], DocumentFormat::Yaml, false);
                Table::records(*file_name, records, schema)
            })
            .collect())
    }
}

/// C2 frameworks, described by one JSON catalog keyed by framework name
pub struct LolC2 {
    repository: &'static str,
    catalog: &'static str,
}

impl Default for LolC2 {
    fn default() -> Self {
        LolC2 {
            repository: "https://github.com/lolc2/lolc2.github.io",
            catalog: "c2_data.json",
        }
    }
}

/// Catalog field pointing at a Markdown description file
pub const DESCRIPTION_URL_FIELD: &str = "descriptionUrl";

/// First line of a Markdown description worth showing in a cell.
///
/// Only the first six lines are considered; headings, images and lines of
/// two characters or fewer are skipped.
pub fn summary_line(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .take(6)
        .find(|line| {
            !line.starts_with("###")
                && !(line.contains("![") && line.contains("]("))
                && line.chars().count() > 2
        })
        .map(str::to_string)
}

/// Turn the C2 catalog into records.
///
/// Each top-level entry becomes one record with its key under `name`. The
/// description reference is resolved through `describe`.
pub fn parse_c2_catalog<F>(catalog: &str, describe: F) -> Result<(Vec<FlatRecord>, KeySchema)>
where
    F: Fn(&str) -> String,
{
    let parsed: serde_json::Value =
        serde_json::from_str(catalog).context("Failed to parse C2 catalog")?;
    let entries = parsed
        .as_object()
        .context("C2 catalog is not a JSON object")?;

    let flattener = RecordFlattener::default();
    let mut schema = KeySchema::with_keys(["name"]);
    let mut records = Vec::new();

    for (name, entry) in entries {
        let mut record = FlatRecord::new();
        record.insert("name", name.clone());

        let Some(fields) = entry.as_object() else {
            warn!(entry = %name, "Skipping C2 entry that is not an object");
            continue;
        };
        for (field, value) in fields {
            if field.contains(DESCRIPTION_URL_FIELD) {
                schema.insert(field.as_str());
                let target = value.as_str().unwrap_or_default();
                record.insert(field.as_str(), describe(target));
                continue;
            }
            if let Some(items) = scalar_list(value)? {
                schema.insert(field.as_str());
                record.insert(field.as_str(), FieldValue::List(items));
                continue;
            }
            let mut single = serde_yaml::Mapping::new();
            single.insert(
                Document::String(field.clone()),
                serde_yaml::to_value(value).context("Failed to convert C2 field")?,
            );
            flattener.flatten_into(&Document::Mapping(single), &mut record, &mut schema);
        }
        records.push(record);
    }

    Ok((records, schema))
}

/// Elements of a JSON array holding only scalars. Such arrays keep their list
/// form even with a single element.
fn scalar_list(value: &serde_json::Value) -> Result<Option<Vec<Scalar>>> {
    let Some(items) = value.as_array() else {
        return Ok(None);
    };
    let mut scalars = Vec::with_capacity(items.len());
    for item in items {
        let converted = serde_yaml::to_value(item).context("Failed to convert C2 field")?;
        match Scalar::from_document(&converted) {
            Some(scalar) => scalars.push(scalar),
            None => return Ok(None),
        }
    }
    Ok(Some(scalars))
}

impl Source for LolC2 {
    fn name(&self) -> &'static str {
        "lolc2"
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let repo = ctx.mirror(self.repository)?;
        let catalog_path = repo.join(self.catalog);
        let catalog = std::fs::read_to_string(&catalog_path)
            .with_context(|| format!("Failed to read {}", catalog_path.display()))?;

        let (records, schema) = parse_c2_catalog(&catalog, |target| {
            let path = repo.join(target);
            match std::fs::read(&path) {
                Ok(bytes) => summary_line(&String::from_utf8_lossy(&bytes)).unwrap_or_default(),
                Err(e) => {
                    warn!(file = %path.display(), "Failed to read description: {}", e);
                    String::new()
                }
            }
        })?;

        Ok(vec![Table::records("lolc2.csv", records, schema)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loaded(path: &str, yaml: &str) -> LoadedDocument {
        LoadedDocument {
            path: PathBuf::from(path),
            document: serde_yaml::from_str(yaml).unwrap(),
        }
    }

    #[test]
    fn test_name_from_file_leads_schema() {
        let docs = vec![
            loaded("_gtfobins/awk.md", "functions:\n  shell:\n    - code: awk 'BEGIN {system(\"/bin/sh\")}'\n"),
            loaded("_gtfobins/bash.md", "functions:\n  suid:\n    - code: ./bash -p\n"),
        ];

        let (records, schema) = flatten_documents(&docs, true);

        assert_eq!(schema.keys()[0], NAME_COLUMN);
        assert_eq!(records[0].get(NAME_COLUMN), Some(&FieldValue::from("awk")));
        assert_eq!(records[1].get(NAME_COLUMN), Some(&FieldValue::from("bash")));
        assert!(schema.contains("functions_shell_code"));
        assert!(schema.contains("functions_suid_code"));
    }

    #[test]
    fn test_document_name_wins_over_file_name() {
        let docs = vec![loaded("_lolesxi/Binaries/esxcli.md", "Name: esxcli tool\n")];

        let (records, schema) = flatten_documents(&docs, true);

        assert_eq!(schema.keys(), [NAME_COLUMN]);
        assert_eq!(records[0].get(NAME_COLUMN), Some(&FieldValue::from("esxcli tool")));
    }

    #[test]
    fn test_domain_projection_emits_every_domain() {
        let docs = vec![
            loaded("a.md", "Name: ngrok\nDetection:\n  - Domain: ngrok.io\n  - Domain: ngrok.com\n"),
            loaded("b.md", "Name: bore\nDetection:\n  - Domain: bore.pub\n"),
            loaded("c.md", "Name: nothing\n"),
        ];
        let (records, _) = flatten_documents(&docs, false);

        let (projected, schema) = domain_projection(&records);

        assert_eq!(schema.keys(), ["Name", "Domain"]);
        assert_eq!(projected.len(), 3);
        assert_eq!(projected[1].get("Domain"), Some(&FieldValue::from("ngrok.com")));
        assert_eq!(projected[2].get("Name"), Some(&FieldValue::from("bore")));
    }

    #[test]
    fn test_domain_file_name() {
        assert_eq!(domain_file_name("lottunnels.csv"), "lottunnels_domain.csv");
    }

    #[test]
    fn test_summary_line_skips_headings_and_images() {
        let md = "### Cobalt Strike\n![logo](img.png)\n\nCommercial adversary simulation.\nMore text\n";
        assert_eq!(summary_line(md).as_deref(), Some("Commercial adversary simulation."));
        assert_eq!(summary_line("### only\nab\n"), None);
    }

    #[test]
    fn test_summary_line_only_looks_at_first_six_lines() {
        let md = "#\n#\n#\n#\n#\n#\nlate line\n";
        assert_eq!(summary_line(md), None);
    }

    #[test]
    fn test_parse_c2_catalog() {
        let catalog = r#"{
            "Sliver": {
                "descriptionUrl": "c2/sliver.md",
                "tags": ["go", "mtls"],
                "opsec": {"level": 3}
            },
            "Havoc": {
                "descriptionUrl": "c2/havoc.md",
                "tags": ["c"]
            }
        }"#;

        let (records, schema) =
            parse_c2_catalog(catalog, |target| format!("desc of {}", target)).unwrap();

        assert_eq!(
            schema.keys(),
            ["name", "descriptionUrl", "tags", "opsec", "opsec_level"]
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some(&FieldValue::from("Sliver")));
        assert_eq!(
            records[0].get("descriptionUrl"),
            Some(&FieldValue::from("desc of c2/sliver.md"))
        );
        assert_eq!(
            records[0].get("tags"),
            Some(&FieldValue::List(vec![Scalar::from("go"), Scalar::from("mtls")]))
        );
        assert_eq!(records[0].get("opsec_level"), Some(&FieldValue::Single(Scalar::Int(3))));
        assert_eq!(
            records[1].get("tags"),
            Some(&FieldValue::List(vec![Scalar::from("c")]))
        );
        assert_eq!(
            crate::csv::encode_value(records[1].get("tags").unwrap()),
            "[''c'']"
        );
    }

    #[test]
    fn test_parse_c2_catalog_rejects_non_object() {
        assert!(parse_c2_catalog("[1, 2]", |_| String::new()).is_err());
    }
}
