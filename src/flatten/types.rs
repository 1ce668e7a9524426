use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A semi-structured document as parsed from YAML, front matter or JSON
pub type Document = serde_yaml::Value;

/// A leaf value in a flattened record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Convert a YAML leaf into a scalar. Returns `None` for composite values.
    pub fn from_document(value: &Document) -> Option<Self> {
        match value {
            Document::Null => Some(Scalar::Null),
            Document::Bool(b) => Some(Scalar::Bool(*b)),
            Document::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    // Out of i64 range, keep the digits intact
                    Some(Scalar::String(u.to_string()))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            Document::String(s) => Some(Scalar::String(s.clone())),
            Document::Tagged(tagged) => Scalar::from_document(&tagged.value),
            Document::Sequence(_) | Document::Mapping(_) => None,
        }
    }

    /// True when the text form looks like a stray inline mapping literal
    pub fn looks_like_inline_mapping(&self) -> bool {
        match self {
            Scalar::String(s) => s.contains("{'") || s.contains("'}"),
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part of whole floats (`1.0`)
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

/// The value stored under one key path of a flat record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(Scalar),
    List(Vec<Scalar>),
}

impl FieldValue {
    /// Iterate the scalars regardless of arity
    pub fn scalars(&self) -> impl Iterator<Item = &Scalar> {
        let slice = match self {
            FieldValue::Single(s) => std::slice::from_ref(s),
            FieldValue::List(items) => items.as_slice(),
        };
        slice.iter()
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Single(Scalar::from(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Single(Scalar::from(s))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items.into_iter().map(Scalar::String).collect())
    }
}

/// One row's worth of data: key path to scalar or list of scalars
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: HashMap<String, FieldValue>,
}

impl FlatRecord {
    pub fn new() -> Self {
        FlatRecord::default()
    }

    /// Record a visit of `key` with `value`.
    ///
    /// The first visit stores the scalar, the second promotes the field to a
    /// two-element list, later visits append.
    pub fn push(&mut self, key: &str, value: Scalar) {
        match self.fields.get_mut(key) {
            None => {
                self.fields.insert(key.to_string(), FieldValue::Single(value));
            }
            Some(existing) => {
                let previous = std::mem::replace(existing, FieldValue::List(Vec::new()));
                *existing = match previous {
                    FieldValue::Single(first) => FieldValue::List(vec![first, value]),
                    FieldValue::List(mut items) => {
                        items.push(value);
                        FieldValue::List(items)
                    }
                };
            }
        }
    }

    /// Overwrite a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Configuration for the flattening process
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Separator placed between nested mapping keys
    pub separator: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            separator: String::from("_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_promotes_to_list() {
        let mut record = FlatRecord::new();
        record.push("a", Scalar::Int(1));
        assert_eq!(record.get("a"), Some(&FieldValue::Single(Scalar::Int(1))));

        record.push("a", Scalar::Int(2));
        record.push("a", Scalar::Int(3));
        assert_eq!(
            record.get("a"),
            Some(&FieldValue::List(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]))
        );
    }

    #[test]
    fn test_scalar_text_forms() {
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
        assert_eq!(Scalar::Int(-4).to_string(), "-4");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
        assert_eq!(Scalar::Float(1.0).to_string(), "1.0");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }

    #[test]
    fn test_inline_mapping_detection() {
        assert!(Scalar::from("{'a': 1}").looks_like_inline_mapping());
        assert!(!Scalar::from("plain {text}").looks_like_inline_mapping());
        assert!(!Scalar::Int(3).looks_like_inline_mapping());
    }
}
