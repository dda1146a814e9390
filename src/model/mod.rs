// src/model/mod.rs
//! Content document model
//!
//! An in-memory tree of repository content nodes as described by an
//! enhanced system view (ESV) document. Nodes own their children and their
//! typed, possibly multi-valued attributes (JCR properties).
//!
//! Trees are built from a stream of [`EsvEvent`]s by [`TreeBuilder`]; the
//! [`esv`] module turns ESV markup into that event stream.

pub mod builder;
pub mod esv;
pub mod merge;

pub use builder::{EsvEvent, TreeBuilder};
pub use esv::{parse_document, parse_document_file};
pub use merge::{Merge, MergeDirective, MergeScope};

use crate::error::{Error, Result};
use strum_macros::{Display, EnumString};

/// Scalar type of an attribute's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ValueType {
    String,
    Long,
    Double,
    Decimal,
    Boolean,
    Date,
    Binary,
    Name,
    Path,
    Reference,
    WeakReference,
    #[strum(serialize = "URI")]
    Uri,
}

impl ValueType {
    /// Type name used in the declarative output format
    pub fn yaml_name(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Long => "long",
            ValueType::Double => "double",
            ValueType::Decimal => "decimal",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Binary => "binary",
            ValueType::Name => "name",
            ValueType::Path => "path",
            ValueType::Reference => "reference",
            ValueType::WeakReference => "weakreference",
            ValueType::Uri => "uri",
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Inline literal text
    Literal(String),
    /// External resource file, relative to the descriptor root
    Resource(String),
}

impl Value {
    /// The inline literal, if this is not a resource reference
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            Value::Resource(_) => None,
        }
    }

    /// The resource path, if this is a resource reference
    pub fn as_resource(&self) -> Option<&str> {
        match self {
            Value::Resource(path) => Some(path),
            Value::Literal(_) => None,
        }
    }
}

/// A typed, possibly multi-valued node attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value_type: ValueType,
    pub multiple: bool,
    pub merge: Option<MergeDirective>,
    pub values: Vec<Value>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value_type: ValueType, multiple: bool) -> Self {
        Self {
            name: name.into(),
            value_type,
            multiple,
            merge: None,
            values: Vec::new(),
        }
    }

    /// Single-valued attribute holding one literal
    pub fn single(
        name: impl Into<String>,
        value_type: ValueType,
        value: impl Into<String>,
    ) -> Self {
        let mut attribute = Self::new(name, value_type, false);
        attribute.values.push(Value::Literal(value.into()));
        attribute
    }

    /// Whether any value refers to an external resource
    pub fn has_resources(&self) -> bool {
        self.values.iter().any(|v| matches!(v, Value::Resource(_)))
    }
}

/// A content node with its attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    pub name: String,
    /// Zero-based same-name-sibling index
    pub index: usize,
    pub primary_type: Option<String>,
    pub mixins: Vec<String>,
    /// Identity token (`jcr:uuid`), kept so references survive migration
    pub identifier: Option<String>,
    pub merge: Option<Merge>,
    pub children: Vec<ContentNode>,
    pub attributes: Vec<Attribute>,
}

impl ContentNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
            primary_type: None,
            mixins: Vec::new(),
            identifier: None,
            merge: None,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Merge directive on this node, if any
    pub fn directive(&self) -> Option<MergeDirective> {
        self.merge.as_ref().map(|m| m.directive)
    }

    /// Required, single-valued attribute of the given type
    pub fn require_single(&self, name: &str, value_type: ValueType) -> Result<&Value> {
        self.optional_single(name, value_type)?
            .ok_or_else(|| self.attribute_error(name, "is required but missing"))
    }

    /// Optional single-valued attribute of the given type
    ///
    /// Absence is not an error; multiple values or a type mismatch is.
    pub fn optional_single(&self, name: &str, value_type: ValueType) -> Result<Option<&Value>> {
        let Some(attribute) = self.attribute(name) else {
            return Ok(None);
        };

        if attribute.value_type != value_type {
            return Err(self.attribute_error(
                name,
                format!("must be of type {}, found {}", value_type, attribute.value_type),
            ));
        }
        if attribute.multiple || attribute.values.len() != 1 {
            return Err(self.attribute_error(
                name,
                format!("must have a single value, found {}", attribute.values.len()),
            ));
        }

        Ok(attribute.values.first())
    }

    /// Required single-valued literal string attribute
    pub fn require_string(&self, name: &str) -> Result<&str> {
        let value = self.require_single(name, ValueType::String)?;
        value
            .as_literal()
            .ok_or_else(|| self.attribute_error(name, "must be an inline value, not a resource"))
    }

    /// Optional single-valued `Double` attribute parsed as a number
    pub fn optional_double(&self, name: &str) -> Result<Option<f64>> {
        let Some(value) = self.optional_single(name, ValueType::Double)? else {
            return Ok(None);
        };
        let literal = value
            .as_literal()
            .ok_or_else(|| self.attribute_error(name, "must be an inline value, not a resource"))?;

        literal
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| !n.is_nan())
            .map(Some)
            .ok_or_else(|| Error::InvalidValue {
                node: self.name.clone(),
                attribute: name.to_string(),
                expected: "Double".to_string(),
                value: literal.to_string(),
            })
    }

    fn attribute_error(&self, attribute: &str, problem: impl Into<String>) -> Error {
        Error::Attribute {
            node: self.name.clone(),
            attribute: attribute.to_string(),
            problem: problem.into(),
        }
    }
}

/// Split a `name[N]` node name into the bare name and a zero-based index
///
/// Returns `None` when the suffix is present but not a positive integer.
pub fn split_sibling_index(raw: &str) -> Option<(&str, usize)> {
    let Some(open) = raw.rfind('[') else {
        return Some((raw, 0));
    };
    if !raw.ends_with(']') {
        return Some((raw, 0));
    }

    let digits = &raw[open + 1..raw.len() - 1];
    let index: usize = digits.parse().ok()?;
    if index == 0 {
        return None;
    }
    Some((&raw[..open], index - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ContentNode {
        let mut node = ContentNode::new("item");
        node.attributes
            .push(Attribute::single("hippo:contentroot", ValueType::String, "/content"));
        node.attributes
            .push(Attribute::single("hippo:sequence", ValueType::Double, "30000.5"));
        let mut multi = Attribute::new("hippo:contentpropset", ValueType::String, true);
        multi.values.push(Value::Literal("a".into()));
        multi.values.push(Value::Literal("b".into()));
        node.attributes.push(multi);
        node
    }

    #[test]
    fn test_require_string() {
        assert_eq!(item().require_string("hippo:contentroot").unwrap(), "/content");
    }

    #[test]
    fn test_require_missing_attribute() {
        let err = item().require_string("hippo:namespace").unwrap_err();
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_require_rejects_multiple_values() {
        let err = item().require_string("hippo:contentpropset").unwrap_err();
        assert!(err.to_string().contains("single value"));
    }

    #[test]
    fn test_require_rejects_wrong_type() {
        let err = item().require_string("hippo:sequence").unwrap_err();
        assert!(err.to_string().contains("type String"));
    }

    #[test]
    fn test_optional_double() {
        let node = item();
        assert_eq!(node.optional_double("hippo:sequence").unwrap(), Some(30000.5));
        assert_eq!(node.optional_double("hippo:missing").unwrap(), None);
    }

    #[test]
    fn test_optional_double_rejects_garbage() {
        let mut node = ContentNode::new("item");
        node.attributes
            .push(Attribute::single("hippo:sequence", ValueType::Double, "ten"));
        assert!(matches!(
            node.optional_double("hippo:sequence"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_split_sibling_index() {
        assert_eq!(split_sibling_index("node"), Some(("node", 0)));
        assert_eq!(split_sibling_index("node[1]"), Some(("node", 0)));
        assert_eq!(split_sibling_index("node[3]"), Some(("node", 2)));
        assert_eq!(split_sibling_index("node[0]"), None);
        assert_eq!(split_sibling_index("node[x]"), None);
    }

    #[test]
    fn test_value_type_tokens() {
        use std::str::FromStr;
        assert_eq!(ValueType::from_str("URI").unwrap(), ValueType::Uri);
        assert_eq!(ValueType::from_str("WeakReference").unwrap(), ValueType::WeakReference);
        assert!(ValueType::from_str("string").is_err());
        assert_eq!(ValueType::WeakReference.yaml_name(), "weakreference");
    }
}
