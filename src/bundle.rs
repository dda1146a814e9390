// src/bundle.rs

//! Resource bundle expansion
//!
//! Translation bundles are nested JSON maps. A map whose values are all
//! plain values (strings, numbers, booleans) is a leaf: its entries become
//! the properties of one locale node. The keys leading to a leaf name the
//! bundle path under the translations root, the last key names the locale:
//!
//! ```json
//! { "cms": { "labels": { "en": { "save": "Save" }, "nl": { "save": "Opslaan" } } } }
//! ```
//!
//! expands to two definitions at `<root>/cms/labels`, one holding the `en`
//! locale node and one holding the `nl` locale node.

use crate::error::{Error, Result};
use crate::instruction::join_path;
use crate::model::{Attribute, ContentNode, ValueType};
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

/// Type of a bundle container node
pub const BUNDLES_TYPE: &str = "hippo:resourcebundles";

/// Type of a locale node
pub const BUNDLE_TYPE: &str = "hippo:resourcebundle";

/// One expanded translation definition
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDefinition {
    /// Absolute path of the bundle container node
    pub path: String,
    /// Container node, holding a single locale child
    pub node: ContentNode,
}

/// Expand a parsed bundle file into translation definitions
pub fn expand_bundles(
    resource: &str,
    bundles: &Json,
    translations_root: &str,
) -> Result<Vec<BundleDefinition>> {
    let map = bundles.as_object().ok_or_else(|| Error::Bundle {
        resource: resource.to_string(),
        message: "top level must be a JSON object".to_string(),
    })?;

    let mut expander = Expander {
        resource,
        root: translations_root,
        keys: Vec::new(),
        definitions: Vec::new(),
    };
    expander.walk(map)?;

    debug!(
        "Expanded '{}' into {} translation definitions",
        resource,
        expander.definitions.len()
    );
    Ok(expander.definitions)
}

struct Expander<'a> {
    resource: &'a str,
    root: &'a str,
    keys: Vec<&'a str>,
    definitions: Vec<BundleDefinition>,
}

impl<'a> Expander<'a> {
    fn walk(&mut self, map: &'a Map<String, Json>) -> Result<()> {
        if is_leaf(map) {
            return self.emit(map);
        }

        for (key, value) in map {
            match value {
                Json::Object(child) => {
                    self.check_key(key)?;
                    self.keys.push(key);
                    self.walk(child)?;
                    self.keys.pop();
                }
                Json::Array(_) | Json::Null => {
                    return Err(self.error(format!(
                        "unsupported {} at '{}'",
                        if value.is_null() { "null" } else { "array" },
                        self.location(key)
                    )));
                }
                _ => warn!(
                    "Resource bundle '{}': skipping value '{}' mixed with nested bundles",
                    self.resource,
                    self.location(key)
                ),
            }
        }
        Ok(())
    }

    fn emit(&mut self, map: &Map<String, Json>) -> Result<()> {
        let Some((locale, parents)) = self.keys.split_last() else {
            return Err(self.error("translations at the top level have no locale key"));
        };

        let path = parents
            .iter()
            .fold(self.root.to_string(), |path, key| join_path(&path, key));
        let container_name = match parents.last() {
            Some(key) => *key,
            None => self.root.rsplit('/').next().unwrap_or_default(),
        };

        let mut locale_node = ContentNode::new(*locale);
        locale_node.primary_type = Some(BUNDLE_TYPE.to_string());
        for (key, value) in map {
            locale_node
                .attributes
                .push(Attribute::single(key, ValueType::String, plain_text(value)));
        }

        let mut node = ContentNode::new(container_name);
        node.primary_type = Some(BUNDLES_TYPE.to_string());
        node.children.push(locale_node);

        self.definitions.push(BundleDefinition { path, node });
        Ok(())
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if key.is_empty() || key.contains('/') {
            return Err(self.error(format!("invalid bundle key '{}'", key)));
        }
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        let mut keys = self.keys.clone();
        keys.push(key);
        keys.join("/")
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Bundle {
            resource: self.resource.to_string(),
            message: message.into(),
        }
    }
}

/// A non-empty map holding only strings, numbers and booleans
fn is_leaf(map: &Map<String, Json>) -> bool {
    !map.is_empty()
        && map
            .values()
            .all(|v| matches!(v, Json::String(_) | Json::Number(_) | Json::Bool(_)))
}

fn plain_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
