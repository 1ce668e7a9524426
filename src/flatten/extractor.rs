use crate::flatten::types::{Document, FlatRecord, FlattenConfig, Scalar};
use crate::schema::KeySchema;

/// Flattens nested documents into flat records keyed by joined key paths
pub struct RecordFlattener {
    config: FlattenConfig,
}

impl Default for RecordFlattener {
    fn default() -> Self {
        RecordFlattener::new(FlattenConfig::default())
    }
}

impl RecordFlattener {
    pub fn new(config: FlattenConfig) -> Self {
        RecordFlattener { config }
    }

    /// Flatten one document into a record.
    ///
    /// Every key path discovered on the way is appended to `schema`, which is
    /// shared across all documents of one export.
    pub fn flatten(&self, document: &Document, schema: &mut KeySchema) -> FlatRecord {
        let mut record = FlatRecord::new();
        self.flatten_into(document, &mut record, schema);
        record
    }

    /// Flatten a document into an existing record
    pub fn flatten_into(&self, document: &Document, record: &mut FlatRecord, schema: &mut KeySchema) {
        self.walk(document, "", record, schema);
    }

    /// Flatten a batch of documents against one fresh schema
    pub fn flatten_all<'a, I>(&self, documents: I) -> (Vec<FlatRecord>, KeySchema)
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut schema = KeySchema::new();
        let records = documents
            .into_iter()
            .map(|doc| self.flatten(doc, &mut schema))
            .collect();
        (records, schema)
    }

    /// Depth-first walk of a document
    fn walk(
        &self,
        value: &Document,
        parent_key: &str,
        record: &mut FlatRecord,
        schema: &mut KeySchema,
    ) {
        match value {
            Document::Mapping(map) => {
                for (key, child) in map {
                    let segment = key_text(key);
                    let path = self.child_path(parent_key, segment.trim());
                    schema.insert(path.as_str());
                    self.walk(child, &path, record, schema);
                }
            }
            Document::Sequence(items) => {
                // Sequences never extend the path, so list elements share columns
                for item in items {
                    self.walk(item, parent_key, record, schema);
                }
            }
            Document::Tagged(tagged) => {
                self.walk(&tagged.value, parent_key, record, schema);
            }
            leaf => {
                // A top-level scalar has no column to land in
                if parent_key.is_empty() {
                    return;
                }
                if let Some(scalar) = Scalar::from_document(leaf) {
                    if !scalar.looks_like_inline_mapping() {
                        record.push(parent_key, scalar);
                    }
                }
            }
        }
    }

    fn child_path(&self, parent_key: &str, key: &str) -> String {
        if parent_key.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", parent_key, self.config.separator, key)
        }
    }
}

/// Text form of a mapping key; YAML allows non-string keys
fn key_text(key: &Document) -> String {
    match key {
        Document::String(s) => s.clone(),
        Document::Null => String::from("null"),
        other => match Scalar::from_document(other) {
            Some(scalar) => scalar.to_string(),
            None => serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::FieldValue;

    fn doc(yaml: &str) -> Document {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_simple_mapping() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        let record = flattener.flatten(&doc("Name: certutil\nAuthor: someone\n"), &mut schema);

        assert_eq!(schema.keys(), ["Name", "Author"]);
        assert_eq!(record.get("Name"), Some(&FieldValue::from("certutil")));
    }

    #[test]
    fn test_nested_mapping_joins_keys() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        let record = flattener.flatten(&doc("a:\n  b:\n    c: 1\n"), &mut schema);

        assert_eq!(schema.keys(), ["a", "a_b", "a_b_c"]);
        assert_eq!(record.get("a_b_c"), Some(&FieldValue::Single(Scalar::Int(1))));
        assert!(!record.contains_key("a"));
    }

    #[test]
    fn test_sequence_collapses_onto_parent_path() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        let record = flattener.flatten(&doc(r#"{"a": [{"b": 1}, {"b": 2}]}"#), &mut schema);

        assert_eq!(schema.keys(), ["a", "a_b"]);
        assert_eq!(
            record.get("a_b"),
            Some(&FieldValue::List(vec![Scalar::Int(1), Scalar::Int(2)]))
        );
    }

    #[test]
    fn test_commands_list_of_mappings() {
        let yaml = r#"
Name: Certutil.exe
Commands:
  - Command: certutil.exe -urlcache -f http://x/y.exe y.exe
    Category: Download
  - Command: certutil -encode a b
    Category: Encode
  - Command: certutil -decode b a
    Category: Decode
"#;
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();
        let record = flattener.flatten(&doc(yaml), &mut schema);

        assert_eq!(
            schema.keys(),
            ["Name", "Commands", "Commands_Command", "Commands_Category"]
        );
        match record.get("Commands_Category") {
            Some(FieldValue::List(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_mapping_fragments_are_dropped() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        let record = flattener.flatten(&doc("a: \"{'x': 1}\"\nb: ok\n"), &mut schema);

        assert_eq!(schema.keys(), ["a", "b"]);
        assert!(!record.contains_key("a"));
        assert!(record.contains_key("b"));
    }

    #[test]
    fn test_keys_are_trimmed_and_non_string_keys_stringified() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        flattener.flatten(&doc("\" spaced \": 1\n42: answer\ntrue: yes\n"), &mut schema);

        assert_eq!(schema.keys(), ["spaced", "42", "true"]);
    }

    #[test]
    fn test_top_level_scalar_produces_empty_record() {
        let flattener = RecordFlattener::default();
        let mut schema = KeySchema::new();

        let record = flattener.flatten(&doc("just text"), &mut schema);

        assert!(record.is_empty());
        assert!(schema.is_empty());
    }

    #[test]
    fn test_flattening_is_deterministic() {
        let flattener = RecordFlattener::default();
        let input = doc("z: 1\na:\n  - {m: x, n: y}\n  - {m: z}\nb: [1, 2, 3]\n");

        let (first, first_schema) = flattener.flatten_all([&input]);
        let (second, second_schema) = flattener.flatten_all([&input]);

        assert_eq!(first, second);
        assert_eq!(first_schema.keys(), second_schema.keys());
    }

    #[test]
    fn test_schema_is_union_across_documents() {
        let flattener = RecordFlattener::default();
        let docs = vec![doc("a: 1\nb: 2\n"), doc("c: 3\na: 4\n"), doc("d: {e: 5}\n")];

        let (records, schema) = flattener.flatten_all(&docs);

        assert_eq!(records.len(), 3);
        assert_eq!(schema.keys(), ["a", "b", "c", "d", "d_e"]);
    }

    #[test]
    fn test_custom_separator() {
        let flattener = RecordFlattener::new(FlattenConfig {
            separator: String::from("."),
        });
        let mut schema = KeySchema::new();

        flattener.flatten(&doc("a:\n  b: 1\n"), &mut schema);

        assert_eq!(schema.keys(), ["a", "a.b"]);
    }
}
