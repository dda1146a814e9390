// src/instruction/classify.rs
//! Descriptor entry classification
//!
//! Each direct child of the descriptor root is inspected for the nine
//! kind-selecting attributes. One match yields one instruction; two
//! matches are only accepted for the combinable pairs
//! (namespace + nodetypesresource, contentdelete + contentresource), which
//! yield two instructions linked to each other.

use super::{
    ContentImport, Instruction, InstructionKind, InstructionSet, Payload, UNORDERED, join_path,
};
use crate::config::MigrationOptions;
use crate::error::{Error, Result};
use crate::model::{ContentNode, parse_document_file};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// Item attribute carrying the sort sequence
pub const SEQUENCE: &str = "hippo:sequence";

/// Item attribute carrying the content root
pub const CONTENT_ROOT: &str = "hippo:contentroot";

/// Legacy item attributes that have no declarative counterpart
const IGNORED_ATTRIBUTES: &[&str] = &[
    "hippo:status",
    "hippo:reload",
    "hippo:reloadonstartup",
    "hippo:version",
    "hippo:timestamp",
    "hippo:errormessage",
    "hippo:extension.version",
    "hippo:contextpaths",
    "hippo:contentdeletes",
    "hippo:upstreamitems",
];

/// Determine the instruction kinds of one descriptor entry
///
/// Returns the primary kind and, for a combinable pair, the second kind in
/// replay order.
pub fn classify_item(item: &ContentNode) -> Result<(InstructionKind, Option<InstructionKind>)> {
    let found: Vec<InstructionKind> = InstructionKind::ALL
        .into_iter()
        .filter(|kind| item.has_attribute(kind.attribute_name()))
        .collect();

    match found.as_slice() {
        [] => Err(Error::unsupported(
            &item.name,
            "no supported instruction attribute found",
        )),
        [kind] => Ok((*kind, None)),
        [a, b] => match InstructionKind::combinable(*a, *b) {
            Some((first, second)) => Ok((first, Some(second))),
            None => Err(Error::unsupported(
                &item.name,
                format!(
                    "instructions '{}' and '{}' cannot be combined",
                    a.attribute_name(),
                    b.attribute_name()
                ),
            )),
        },
        more => Err(Error::unsupported(
            &item.name,
            format!(
                "too many instructions on one item: {}",
                more.iter()
                    .map(|k| k.attribute_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
    }
}

/// What a resource reference must point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    File,
    Directory,
}

/// Turns descriptor entries into instructions, resolving their resources
/// under the descriptor root
pub struct Classifier<'a> {
    root: &'a Path,
    options: &'a MigrationOptions,
}

impl<'a> Classifier<'a> {
    pub fn new(root: &'a Path, options: &'a MigrationOptions) -> Self {
        Self { root, options }
    }

    /// Classify every item of the descriptor
    ///
    /// All items are validated before any instruction is returned, so the
    /// ordering engine only ever sees a fully valid set.
    pub fn classify(&self, descriptor: &ContentNode) -> Result<InstructionSet> {
        let mut names = BTreeSet::new();
        for item in &descriptor.children {
            if !names.insert(item.name.as_str()) {
                return Err(Error::DuplicateItem(item.name.clone()));
            }
        }

        let mut set = InstructionSet::new();
        for item in &descriptor.children {
            self.classify_into(item, &mut set)?;
        }
        debug!(
            "Classified {} descriptor items into {} instructions",
            descriptor.children.len(),
            set.len()
        );
        Ok(set)
    }

    fn classify_into(&self, item: &ContentNode, set: &mut InstructionSet) -> Result<()> {
        if item.primary_type.as_deref() != Some(self.options.item_type.as_str()) {
            return Err(Error::unsupported(
                &item.name,
                format!(
                    "expected type '{}', found '{}'",
                    self.options.item_type,
                    item.primary_type.as_deref().unwrap_or("none")
                ),
            ));
        }

        for attribute in &item.attributes {
            if IGNORED_ATTRIBUTES.contains(&attribute.name.as_str()) {
                warn!(
                    "Item '{}': ignoring legacy attribute '{}'",
                    item.name, attribute.name
                );
            }
        }

        let sequence = item.optional_double(SEQUENCE)?.unwrap_or(UNORDERED);
        let (first, second) = classify_item(item)?;

        let first_id = set.push(self.build(item, first, sequence)?);
        if let Some(second) = second {
            let second_id = set.push(self.build(item, second, sequence)?);
            set.link(first_id, second_id);
        }
        Ok(())
    }

    fn build(
        &self,
        item: &ContentNode,
        kind: InstructionKind,
        sequence: f64,
    ) -> Result<Instruction> {
        let attribute = kind.attribute_name();
        let name = item.name.clone();

        let instruction = match kind {
            InstructionKind::Namespace => {
                let value = item.require_string(attribute)?;
                let uri = Url::parse(value.trim()).map_err(|_| Error::InvalidValue {
                    node: item.name.clone(),
                    attribute: attribute.to_string(),
                    expected: "URI".to_string(),
                    value: value.to_string(),
                })?;
                Instruction::new(name, sequence, Payload::Namespace { uri })
            }
            InstructionKind::NodeTypesResource => {
                let resource =
                    self.resolve(item, item.require_string(attribute)?, ResourceKind::File)?;
                Instruction::new(name, sequence, Payload::NodeTypes { resource })
            }
            InstructionKind::ContentDelete => {
                let path = item.require_string(attribute)?;
                Instruction::new(name, sequence, Payload::ContentDelete).with_content_path(path)
            }
            InstructionKind::ContentResource => {
                let resource =
                    self.resolve(item, item.require_string(attribute)?, ResourceKind::File)?;
                let content_root = item.require_string(CONTENT_ROOT)?;
                let root = parse_document_file(self.root, &resource)?;
                let path = join_path(content_root, &root.name);
                let import = ContentImport {
                    document: document_name(&resource),
                    resource,
                    root,
                };
                Instruction::new(name, sequence, Payload::ContentResource(Box::new(import)))
                    .with_content_path(&path)
            }
            InstructionKind::ContentPropDelete => {
                let path = item.require_string(attribute)?;
                Instruction::new(name, sequence, Payload::ContentPropDelete)
                    .with_content_path(path)
            }
            InstructionKind::ContentPropSet | InstructionKind::ContentPropAdd => {
                let path = item.require_string(CONTENT_ROOT)?;
                let property = item
                    .attribute(attribute)
                    .cloned()
                    .ok_or_else(|| Error::unsupported(&item.name, "property values missing"))?;
                let payload = if kind == InstructionKind::ContentPropSet {
                    Payload::ContentPropSet { property }
                } else {
                    Payload::ContentPropAdd { property }
                };
                Instruction::new(name, sequence, payload).with_content_path(path)
            }
            InstructionKind::WebFileBundle => {
                let resource = self.resolve(
                    item,
                    item.require_string(attribute)?,
                    ResourceKind::Directory,
                )?;
                Instruction::new(name, sequence, Payload::WebFileBundle { resource })
            }
            InstructionKind::ResourceBundles => {
                let resource =
                    self.resolve(item, item.require_string(attribute)?, ResourceKind::File)?;
                let path = self.root.join(&resource);
                let json = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                let bundles = serde_json::from_str(&json).map_err(|source| Error::Json {
                    resource: resource.clone(),
                    source,
                })?;
                Instruction::new(name, sequence, Payload::ResourceBundles { resource, bundles })
                    .with_content_path(&self.options.translations_root)
            }
        };

        debug!(
            "Item '{}' → {} (sequence {}, path {})",
            instruction.name,
            kind,
            instruction.sequence,
            instruction.content_path.as_deref().unwrap_or("-")
        );
        Ok(instruction)
    }

    /// Validate a resource reference and return it relative to the root
    fn resolve(&self, item: &ContentNode, reference: &str, expect: ResourceKind) -> Result<String> {
        let segments: Vec<&str> = reference
            .trim()
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        let relative = segments.join("/");
        if segments.is_empty() || segments.contains(&"..") {
            return Err(Error::resource(
                &item.name,
                reference,
                "must be a path inside the descriptor directory",
            ));
        }

        let path = self.root.join(&relative);
        let metadata = std::fs::metadata(&path)
            .map_err(|_| Error::resource(&item.name, &relative, "does not exist"))?;
        match expect {
            ResourceKind::File if !metadata.is_file() => {
                Err(Error::resource(&item.name, &relative, "is not a regular file"))
            }
            ResourceKind::Directory if !metadata.is_dir() => {
                Err(Error::resource(&item.name, &relative, "is not a directory"))
            }
            _ => Ok(relative),
        }
    }
}

/// Target document name for an imported content resource
pub fn document_name(resource: &str) -> String {
    let (dir, file) = match resource.rfind('/') {
        Some(pos) => (&resource[..=pos], &resource[pos + 1..]),
        None => ("", resource),
    };
    let stem = match file.rfind('.') {
        Some(pos) if pos > 0 => &file[..pos],
        _ => file,
    };
    format!("{}{}.yaml", dir, stem)
}
