// src/model/builder.rs
//! Event-driven content tree construction
//!
//! The markup reader reports what it sees as a flat stream of
//! [`EsvEvent`]s; [`TreeBuilder`] validates the nesting and assembles the
//! single-rooted [`ContentNode`] tree.

use super::merge::{Merge, MergeScope, resolve_merge};
use super::{Attribute, ContentNode, Value, ValueType, split_sibling_index};
use crate::error::{Error, Result};
use std::str::FromStr;
use tracing::warn;

/// One step of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EsvEvent {
    /// Start a node (child of the currently open node, or the root)
    OpenNode {
        name: String,
        merge: Option<String>,
        location: Option<String>,
    },
    /// Declared primary type of the open node
    SetType(String),
    /// Mixin types of the open node
    SetMixins(Vec<String>),
    /// Identity token of the open node
    SetIdentity(String),
    /// Start an attribute on the open node
    AddAttribute {
        name: String,
        value_type: String,
        multiple: bool,
        merge: Option<String>,
    },
    /// Append a value to the most recently added attribute
    AppendValue(Value),
    /// Close the open node
    CloseNode,
}

/// Builds a content tree from [`EsvEvent`]s
#[derive(Debug)]
pub struct TreeBuilder {
    resource: String,
    stack: Vec<ContentNode>,
    root: Option<ContentNode>,
    attribute_open: bool,
}

impl TreeBuilder {
    /// Create a builder; `resource` names the document in errors
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            stack: Vec::new(),
            root: None,
            attribute_open: false,
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: EsvEvent) -> Result<()> {
        match event {
            EsvEvent::OpenNode {
                name,
                merge,
                location,
            } => self.open_node(&name, merge.as_deref(), location),
            EsvEvent::SetType(node_type) => {
                let resource = self.resource.clone();
                let node = self.current("node type")?;
                if let Some(previous) = node.primary_type.replace(node_type) {
                    warn!(
                        "Node '{}' in {} declares its type twice, replacing '{}'",
                        node.name, resource, previous
                    );
                }
                self.attribute_open = false;
                Ok(())
            }
            EsvEvent::SetMixins(mixins) => {
                self.current("mixin types")?.mixins = mixins;
                self.attribute_open = false;
                Ok(())
            }
            EsvEvent::SetIdentity(identifier) => {
                self.current("identifier")?.identifier = Some(identifier);
                self.attribute_open = false;
                Ok(())
            }
            EsvEvent::AddAttribute {
                name,
                value_type,
                multiple,
                merge,
            } => self.add_attribute(name, &value_type, multiple, merge.as_deref()),
            EsvEvent::AppendValue(value) => self.append_value(value),
            EsvEvent::CloseNode => self.close_node(),
        }
    }

    /// Finish the stream and return the root node
    pub fn finish(self) -> Result<ContentNode> {
        if let Some(open) = self.stack.last() {
            return Err(Error::Structure {
                resource: self.resource,
                message: format!("node '{}' is never closed", open.name),
            });
        }
        self.root.ok_or_else(|| Error::Structure {
            resource: self.resource,
            message: "document contains no node".to_string(),
        })
    }

    /// Build a tree from a complete event sequence
    pub fn build(
        resource: impl Into<String>,
        events: impl IntoIterator<Item = EsvEvent>,
    ) -> Result<ContentNode> {
        let mut builder = Self::new(resource);
        for event in events {
            builder.handle(event)?;
        }
        builder.finish()
    }

    fn open_node(
        &mut self,
        raw_name: &str,
        merge: Option<&str>,
        location: Option<String>,
    ) -> Result<()> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(self.structure(format!("second root node '{}'", raw_name)));
        }
        if raw_name.is_empty() {
            return Err(self.structure("node name is mandatory"));
        }
        let (name, index) = split_sibling_index(raw_name)
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| self.structure(format!("invalid node name '{}'", raw_name)))?;

        let mut node = ContentNode::new(name);
        node.index = index;
        if let Some(token) = merge {
            node.merge = resolve_merge(token, MergeScope::Node, raw_name).map(|directive| Merge {
                directive,
                location: location.clone(),
            });
        }
        if location.is_some() && node.merge.is_none() {
            warn!(
                "Ignoring merge location on node '{}' in {}: no merge directive",
                raw_name, self.resource
            );
        }

        self.stack.push(node);
        self.attribute_open = false;
        Ok(())
    }

    fn add_attribute(
        &mut self,
        name: String,
        value_type: &str,
        multiple: bool,
        merge: Option<&str>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(self.structure("attribute name is mandatory"));
        }
        if value_type.is_empty() {
            return Err(self.structure(format!("attribute '{}' has no type", name)));
        }
        let value_type = ValueType::from_str(value_type).map_err(|_| {
            self.structure(format!("attribute '{}' has unknown type '{}'", name, value_type))
        })?;

        let mut attribute = Attribute::new(name, value_type, multiple);
        if let Some(token) = merge {
            attribute.merge = resolve_merge(token, MergeScope::Attribute, &attribute.name);
        }

        let resource = self.resource.clone();
        let node = self.current("attribute")?;
        if let Some(pos) = node.attributes.iter().position(|a| a.name == attribute.name) {
            warn!(
                "Attribute '{}' on node '{}' in {} is declared twice, keeping the last",
                attribute.name, node.name, resource
            );
            node.attributes.remove(pos);
        }
        node.attributes.push(attribute);
        self.attribute_open = true;
        Ok(())
    }

    fn append_value(&mut self, value: Value) -> Result<()> {
        if !self.attribute_open {
            return Err(self.structure("value outside of an attribute"));
        }
        let resource = self.resource.clone();
        let node = self.current("value")?;
        let node_name = node.name.clone();
        let Some(attribute) = node.attributes.last_mut() else {
            return Err(Error::Structure {
                resource,
                message: "value outside of an attribute".to_string(),
            });
        };
        if !attribute.multiple && !attribute.values.is_empty() {
            return Err(Error::Structure {
                resource,
                message: format!(
                    "single-valued attribute '{}' on node '{}' has more than one value",
                    attribute.name, node_name
                ),
            });
        }
        attribute.values.push(value);
        Ok(())
    }

    fn close_node(&mut self) -> Result<()> {
        let node = self
            .stack
            .pop()
            .ok_or_else(|| self.structure("node closed but none is open"))?;
        self.attribute_open = false;

        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root = Some(node),
        }
        Ok(())
    }

    fn current(&mut self, what: &str) -> Result<&mut ContentNode> {
        let resource = &self.resource;
        self.stack.last_mut().ok_or_else(|| Error::Structure {
            resource: resource.clone(),
            message: format!("{} outside of any node", what),
        })
    }

    fn structure(&self, message: impl Into<String>) -> Error {
        Error::Structure {
            resource: self.resource.clone(),
            message: message.into(),
        }
    }
}
