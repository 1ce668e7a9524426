use crate::flatten::types::{FieldValue, FlatRecord};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Name of the trailing classification column
pub const CLASSIFICATION_COLUMN: &str = "is_legit";

/// Value of the classification column on freshly ingested rows
pub const CLASSIFICATION_DEFAULT: &str = "false";

/// Separator between list elements inside one cell
pub const LIST_SEPARATOR: &str = "-|-";

/// Delimiter wrapped around each list element inside one cell
pub const LIST_ITEM_QUOTE: &str = "''";

/// Make a piece of text safe to place between double quotes.
///
/// Doubles embedded quotes, turns each line break into one space and trims
/// the result.
pub fn sanitize_text(text: &str) -> String {
    let escaped = text.replace('"', "\"\"");
    let single_line = escaped.replace("\r\n", " ").replace(['\r', '\n'], " ");
    single_line.trim().to_string()
}

/// Render a field value as cell text, before sanitization
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Single(scalar) => scalar.to_string(),
        FieldValue::List(items) => {
            let inner: Vec<String> = items
                .iter()
                .map(|item| format!("{}{}{}", LIST_ITEM_QUOTE, item, LIST_ITEM_QUOTE))
                .collect();
            format!("[{}]", inner.join(LIST_SEPARATOR))
        }
    }
}

/// Cell text for a value: rendered, then sanitized
pub fn encode_value(value: &FieldValue) -> String {
    sanitize_text(&render_value(value))
}

/// Recover list elements from a decoded cell such as `[''x''-|-''y'']`.
///
/// Returns `None` when the cell does not use the list encoding.
pub fn decode_list(cell: &str) -> Option<Vec<String>> {
    let inner = cell.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(LIST_SEPARATOR)
        .map(|item| {
            item.strip_prefix(LIST_ITEM_QUOTE)
                .and_then(|rest| rest.strip_suffix(LIST_ITEM_QUOTE))
                .map(str::to_string)
        })
        .collect()
}

/// Writes flat records as fully quoted CSV rows
pub struct CsvWriter<W: Write> {
    writer: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(writer: W) -> Self {
        CsvWriter { writer }
    }

    /// Header row: the keys followed by the classification column
    pub fn write_header(&mut self, keys: &[String]) -> Result<()> {
        let cells = keys.iter().map(|key| sanitize_text(key.trim()));
        self.write_row(cells, CLASSIFICATION_COLUMN)
    }

    /// One data row in `keys` order; missing keys become empty cells
    pub fn write_record(&mut self, record: &FlatRecord, keys: &[String]) -> Result<()> {
        let cells = keys.iter().map(|key| match record.get(key) {
            Some(value) => encode_value(value),
            None => String::new(),
        });
        self.write_row(cells, CLASSIFICATION_DEFAULT)
    }

    /// Write already sanitized cells, quoting each and appending `classification`
    pub fn write_row<I>(&mut self, cells: I, classification: &str) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let mut quoted: Vec<String> = cells.into_iter().map(|cell| format!("\"{}\"", cell)).collect();
        quoted.push(format!("\"{}\"", classification));
        writeln!(self.writer, "{}", quoted.join(",")).context("Failed to write CSV row")
    }

    /// Header followed by every record
    pub fn write_table(&mut self, records: &[FlatRecord], keys: &[String]) -> Result<()> {
        self.write_header(keys)?;
        for record in records {
            self.write_record(record, keys)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Serialize records against a fixed key order into CSV text
pub fn serialize(records: &[FlatRecord], keys: &[String]) -> Result<String> {
    let mut writer = CsvWriter::new(Vec::new());
    writer.write_table(records, keys)?;
    String::from_utf8(writer.into_inner()).context("CSV output is not valid UTF-8")
}

/// Serialize records straight into a file, replacing any previous content
pub fn write_csv_file(path: &Path, records: &[FlatRecord], keys: &[String]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = CsvWriter::new(std::io::BufWriter::new(file));
    writer.write_table(records, keys)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::Scalar;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quotes_are_doubled() {
        assert_eq!(sanitize_text(r#"He said "hi""#), r#"He said ""hi"""#);
    }

    #[test]
    fn test_newlines_collapse_to_single_spaces() {
        let once = sanitize_text("line1\nline2\r\nline3");
        assert_eq!(once, "line1 line2 line3");
        assert_eq!(sanitize_text(&once), once);
    }

    #[test]
    fn test_sanitize_trims() {
        assert_eq!(sanitize_text("  padded \n"), "padded");
    }

    #[test]
    fn test_list_encoding() {
        let value = FieldValue::from(vec!["x".to_string(), "y".to_string()]);
        let cell = encode_value(&value);

        assert_eq!(cell, "[''x''-|-''y'']");
        assert_eq!(decode_list(&cell), Some(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_decode_list_rejects_plain_text() {
        assert_eq!(decode_list("plain"), None);
        assert_eq!(decode_list("[not a list]"), None);
        assert_eq!(decode_list("[]"), Some(Vec::new()));
    }

    #[test]
    fn test_list_of_mixed_scalars() {
        let value = FieldValue::List(vec![Scalar::Int(1), Scalar::Bool(false), Scalar::from("a \"b\"")]);
        assert_eq!(encode_value(&value), "[''1''-|-''false''-|-''a \"\"b\"\"'']");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let mut record = FlatRecord::new();
        record.insert("B", "only b");

        let csv = serialize(&[record], &keys(&["A", "B", "C"])).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], r#""A","B","C","is_legit""#);
        assert_eq!(lines[1], r#""","only b","","false""#);
    }

    #[test]
    fn test_header_keys_are_trimmed() {
        let csv = serialize(&[], &keys(&[" padded ", "x"])).unwrap();
        assert_eq!(csv, "\"padded\",\"x\",\"is_legit\"\n");
    }

    #[test]
    fn test_empty_schema_still_has_classification_column() {
        let csv = serialize(&[FlatRecord::new()], &[]).unwrap();
        assert_eq!(csv, "\"is_legit\"\n\"false\"\n");
    }

    #[test]
    fn test_write_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut record = FlatRecord::new();
        record.insert("name", "foo");

        write_csv_file(&path, &[record], &keys(&["name"])).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "\"name\",\"is_legit\"\n\"foo\",\"false\"\n");
    }
}
