// src/module/mod.rs

//! Declarative module model
//!
//! A [`Module`] is the migrated form of a descriptor: an ordered list of
//! target documents, each holding ordered definitions. Documents are listed
//! in order of first use. Definitions within one document follow the order
//! computed by [`crate::instruction::replay_order`]; the main document can
//! hold definitions from both sides of a content document, so the document
//! list alone does not reproduce that order.

pub mod render;
pub mod writer;

pub use render::{render_descriptor, render_document};
pub use writer::{ModuleWriter, WriteSummary};

use crate::bundle::expand_bundles;
use crate::config::MigrationOptions;
use crate::error::{Error, Result};
use crate::instruction::{InstructionId, InstructionSet, Payload, split_property_path};
use crate::model::{Attribute, ContentNode, Value, ValueType};
use std::collections::BTreeSet;
use strum_macros::Display;
use url::Url;

/// How a property definition changes an existing property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PropertyOperation {
    Set,
    Add,
    Delete,
}

/// One entry of a target document
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Namespace registration, with the schema loaded alongside it
    Namespace {
        prefix: String,
        uri: Url,
        cnd: Option<String>,
    },
    /// Standalone type schema
    NodeTypes { cnd: String },
    /// Removal of a node and its subtree
    DeleteNode { path: String },
    /// Full node tree rooted at `path`
    Content { path: String, node: ContentNode },
    /// Change to one property of an existing node
    Property {
        node_path: String,
        attribute: Attribute,
        operation: PropertyOperation,
    },
    WebFileBundle { name: String },
    /// Expanded resource bundle, rooted at `path`
    Translations { path: String, node: ContentNode },
}

/// One output document and its definitions in replay order
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDocument {
    /// Name relative to the module's config directory
    pub name: String,
    pub definitions: Vec<Definition>,
}

impl TargetDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
        }
    }
}

/// A source file or directory copied into the module unchanged
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleResource {
    /// Path relative to the descriptor directory
    pub path: String,
    pub directory: bool,
}

/// The migrated module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub documents: Vec<TargetDocument>,
    pub resources: BTreeSet<ModuleResource>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
            resources: BTreeSet::new(),
        }
    }

    /// Document with the given name, created on first use
    fn document_mut(&mut self, name: &str) -> &mut TargetDocument {
        let position = match self.documents.iter().position(|d| d.name == name) {
            Some(position) => position,
            None => {
                self.documents.push(TargetDocument::new(name));
                self.documents.len() - 1
            }
        };
        &mut self.documents[position]
    }

    pub fn document(&self, name: &str) -> Option<&TargetDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn definition_count(&self) -> usize {
        self.documents.iter().map(|d| d.definitions.len()).sum()
    }

    fn add_file(&mut self, path: &str) {
        self.resources.insert(ModuleResource {
            path: path.to_string(),
            directory: false,
        });
    }
}

/// Build the module from an ordered, allocated instruction set
pub fn assemble(
    name: &str,
    set: &InstructionSet,
    order: &[InstructionId],
    options: &MigrationOptions,
) -> Result<Module> {
    let mut module = Module::new(name);

    for &id in order {
        let instruction = set.get(id);
        let target = instruction
            .target
            .as_deref()
            .ok_or_else(|| Error::Unallocated(instruction.name.clone()))?;
        let partner = instruction.combined_with.map(|p| set.get(p));
        let path = instruction.content_path.clone().unwrap_or_default();

        let definitions = match &instruction.payload {
            Payload::Namespace { uri } => {
                let cnd = partner.and_then(|p| match &p.payload {
                    Payload::NodeTypes { resource } => Some(resource.clone()),
                    _ => None,
                });
                if let Some(cnd) = &cnd {
                    module.add_file(cnd);
                }
                vec![Definition::Namespace {
                    prefix: instruction.name.clone(),
                    uri: uri.clone(),
                    cnd,
                }]
            }
            Payload::NodeTypes { resource } => {
                // Loaded by the namespace definition of the same item
                if partner.is_some_and(|p| matches!(p.payload, Payload::Namespace { .. })) {
                    continue;
                }
                module.add_file(resource);
                vec![Definition::NodeTypes {
                    cnd: resource.clone(),
                }]
            }
            Payload::ContentDelete => vec![Definition::DeleteNode { path }],
            Payload::ContentResource(import) => {
                collect_resources(&import.root, &mut module);
                vec![Definition::Content {
                    path,
                    node: import.root.clone(),
                }]
            }
            Payload::ContentPropDelete => {
                let (node_path, property) = split_property_path(&path);
                vec![Definition::Property {
                    node_path,
                    attribute: Attribute::new(property, ValueType::String, false),
                    operation: PropertyOperation::Delete,
                }]
            }
            Payload::ContentPropSet { property } | Payload::ContentPropAdd { property } => {
                let (node_path, name) = split_property_path(&path);
                let mut attribute = property.clone();
                attribute.name = name;
                for value in &attribute.values {
                    if let Value::Resource(resource) = value {
                        module.add_file(resource);
                    }
                }
                let operation = if matches!(instruction.payload, Payload::ContentPropAdd { .. }) {
                    PropertyOperation::Add
                } else {
                    PropertyOperation::Set
                };
                vec![Definition::Property {
                    node_path,
                    attribute,
                    operation,
                }]
            }
            Payload::WebFileBundle { resource } => {
                module.resources.insert(ModuleResource {
                    path: resource.clone(),
                    directory: true,
                });
                vec![Definition::WebFileBundle {
                    name: resource.clone(),
                }]
            }
            Payload::ResourceBundles { resource, bundles } => {
                expand_bundles(resource, bundles, &options.translations_root)?
                    .into_iter()
                    .map(|b| Definition::Translations {
                        path: b.path,
                        node: b.node,
                    })
                    .collect()
            }
        };

        module.document_mut(target).definitions.extend(definitions);
    }

    Ok(module)
}

fn collect_resources(node: &ContentNode, module: &mut Module) {
    for attribute in &node.attributes {
        for value in &attribute.values {
            if let Value::Resource(resource) = value {
                module.add_file(resource);
            }
        }
    }
    for child in &node.children {
        collect_resources(child, module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ContentImport, Instruction, UNORDERED, allocate_targets, replay_order};

    fn build(set: &mut InstructionSet) -> Module {
        let options = MigrationOptions::default();
        let order = replay_order(set);
        allocate_targets(set, &order, &options).unwrap();
        assemble("demo", set, &order, &options).unwrap()
    }

    #[test]
    fn test_namespace_pair_becomes_one_definition() {
        let mut set = InstructionSet::new();
        let ns = set.push(Instruction::new(
            "demo",
            UNORDERED,
            Payload::Namespace {
                uri: Url::parse("http://example.org/demo/1.0").unwrap(),
            },
        ));
        let cnd = set.push(Instruction::new(
            "demo",
            UNORDERED,
            Payload::NodeTypes {
                resource: "demo.cnd".to_string(),
            },
        ));
        set.link(ns, cnd);

        let module = build(&mut set);
        assert_eq!(module.documents.len(), 1);
        let main = &module.documents[0];
        assert_eq!(main.name, "main.yaml");
        assert_eq!(main.definitions.len(), 1);
        assert!(matches!(
            &main.definitions[0],
            Definition::Namespace { prefix, cnd: Some(cnd), .. } if prefix == "demo" && cnd == "demo.cnd"
        ));
        assert!(module.resources.contains(&ModuleResource {
            path: "demo.cnd".to_string(),
            directory: false,
        }));
    }

    #[test]
    fn test_property_paths_split_into_node_and_name() {
        let mut set = InstructionSet::new();
        let mut values = Attribute::new("hippo:contentpropadd", ValueType::String, true);
        values.values.push(Value::Literal("x".to_string()));
        set.push(
            Instruction::new("add", UNORDERED, Payload::ContentPropAdd { property: values })
                .with_content_path("/content/doc/tags"),
        );
        set.push(
            Instruction::new("drop", UNORDERED, Payload::ContentPropDelete)
                .with_content_path("/content/doc/old"),
        );

        let module = build(&mut set);
        let defs = &module.documents[0].definitions;
        assert!(matches!(
            &defs[0],
            Definition::Property { node_path, attribute, operation: PropertyOperation::Add }
                if node_path == "/content/doc" && attribute.name == "tags"
        ));
        assert!(matches!(
            &defs[1],
            Definition::Property { attribute, operation: PropertyOperation::Delete, .. }
                if attribute.name == "old"
        ));
    }

    #[test]
    fn test_content_resources_are_collected() {
        let mut root = ContentNode::new("doc");
        let mut child = ContentNode::new("image");
        let mut data = Attribute::new("jcr:data", ValueType::Binary, false);
        data.values.push(Value::Resource("content/image.png".to_string()));
        child.attributes.push(data);
        root.children.push(child);

        let mut set = InstructionSet::new();
        set.push(
            Instruction::new(
                "doc",
                UNORDERED,
                Payload::ContentResource(Box::new(ContentImport {
                    resource: "content/doc.xml".to_string(),
                    root,
                    document: "content/doc.yaml".to_string(),
                })),
            )
            .with_content_path("/content/doc"),
        );

        let module = build(&mut set);
        assert_eq!(module.documents[0].name, "content/doc.yaml");
        assert!(module.resources.iter().any(|r| r.path == "content/image.png"));
    }

    #[test]
    fn test_unallocated_instruction_is_an_error() {
        let mut set = InstructionSet::new();
        let id = set.push(
            Instruction::new("del", UNORDERED, Payload::ContentDelete).with_content_path("/x"),
        );
        let result = assemble("demo", &set, &[id], &MigrationOptions::default());
        assert!(matches!(result, Err(Error::Unallocated(name)) if name == "del"));
    }
}
