// src/instruction/mod.rs
//! Initialize instructions
//!
//! Every entry of the extension descriptor is classified into one (or, for
//! the two combinable pairs, two linked) [`Instruction`]s. Instructions are
//! owned by an [`InstructionSet`]; a combined pair refers to its partner by
//! [`InstructionId`] so the set stays a plain arena with no shared
//! ownership.
//!
//! # Pipeline
//!
//! 1. [`classify`] builds the set from the parsed descriptor
//! 2. [`order`] computes the replay order
//! 3. [`allocate`] assigns target documents

pub mod allocate;
pub mod classify;
pub mod order;

pub use allocate::{TargetAllocator, allocate_targets};
pub use classify::{Classifier, classify_item};
pub use order::{compare, replay_order};

use crate::model::{Attribute, ContentNode, MergeDirective};
use strum_macros::Display;
use url::Url;

/// Sequence of an item that does not declare one
pub const UNORDERED: f64 = -1.0;

/// The nine kinds of initialize instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum InstructionKind {
    #[strum(serialize = "namespace")]
    Namespace,
    #[strum(serialize = "nodetypesresource")]
    NodeTypesResource,
    #[strum(serialize = "contentdelete")]
    ContentDelete,
    #[strum(serialize = "contentresource")]
    ContentResource,
    #[strum(serialize = "contentpropdelete")]
    ContentPropDelete,
    #[strum(serialize = "contentpropset")]
    ContentPropSet,
    #[strum(serialize = "contentpropadd")]
    ContentPropAdd,
    #[strum(serialize = "webfilebundle")]
    WebFileBundle,
    #[strum(serialize = "resourcebundles")]
    ResourceBundles,
}

impl InstructionKind {
    /// All kinds, in the order descriptor entries are scanned
    pub const ALL: [InstructionKind; 9] = [
        InstructionKind::Namespace,
        InstructionKind::NodeTypesResource,
        InstructionKind::ContentDelete,
        InstructionKind::ContentResource,
        InstructionKind::ContentPropDelete,
        InstructionKind::ContentPropSet,
        InstructionKind::ContentPropAdd,
        InstructionKind::WebFileBundle,
        InstructionKind::ResourceBundles,
    ];

    /// Descriptor attribute that selects this kind
    pub fn attribute_name(self) -> &'static str {
        match self {
            InstructionKind::Namespace => "hippo:namespace",
            InstructionKind::NodeTypesResource => "hippo:nodetypesresource",
            InstructionKind::ContentDelete => "hippo:contentdelete",
            InstructionKind::ContentResource => "hippo:contentresource",
            InstructionKind::ContentPropDelete => "hippo:contentpropdelete",
            InstructionKind::ContentPropSet => "hippo:contentpropset",
            InstructionKind::ContentPropAdd => "hippo:contentpropadd",
            InstructionKind::WebFileBundle => "hippo:webfilebundle",
            InstructionKind::ResourceBundles => "hippo:resourcebundles",
        }
    }

    /// Whether two kinds may appear together on one descriptor entry
    ///
    /// Returns the pair in replay order when they combine.
    pub fn combinable(a: Self, b: Self) -> Option<(Self, Self)> {
        use InstructionKind::*;
        match (a, b) {
            (Namespace, NodeTypesResource) | (NodeTypesResource, Namespace) => {
                Some((Namespace, NodeTypesResource))
            }
            (ContentDelete, ContentResource) | (ContentResource, ContentDelete) => {
                Some((ContentDelete, ContentResource))
            }
            _ => None,
        }
    }
}

/// Index of an instruction within its [`InstructionSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId(pub usize);

/// Content document imported by a `contentresource` instruction
#[derive(Debug, Clone, PartialEq)]
pub struct ContentImport {
    /// Source document, relative to the descriptor root
    pub resource: String,
    /// Parsed document tree
    pub root: ContentNode,
    /// Target document resolved for this import
    pub document: String,
}

/// Kind-specific instruction data
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Namespace { uri: Url },
    NodeTypes { resource: String },
    ContentDelete,
    ContentResource(Box<ContentImport>),
    ContentPropDelete,
    ContentPropSet { property: Attribute },
    ContentPropAdd { property: Attribute },
    WebFileBundle { resource: String },
    ResourceBundles {
        resource: String,
        bundles: serde_json::Value,
    },
}

impl Payload {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Payload::Namespace { .. } => InstructionKind::Namespace,
            Payload::NodeTypes { .. } => InstructionKind::NodeTypesResource,
            Payload::ContentDelete => InstructionKind::ContentDelete,
            Payload::ContentResource(_) => InstructionKind::ContentResource,
            Payload::ContentPropDelete => InstructionKind::ContentPropDelete,
            Payload::ContentPropSet { .. } => InstructionKind::ContentPropSet,
            Payload::ContentPropAdd { .. } => InstructionKind::ContentPropAdd,
            Payload::WebFileBundle { .. } => InstructionKind::WebFileBundle,
            Payload::ResourceBundles { .. } => InstructionKind::ResourceBundles,
        }
    }
}

/// One classified unit of migration work
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Name of the descriptor entry this came from
    pub name: String,
    /// Primary sort key; [`UNORDERED`] when not declared
    pub sequence: f64,
    /// Absolute, normalized content path, for kinds that have one
    pub content_path: Option<String>,
    /// Partner of a combinable pair
    pub combined_with: Option<InstructionId>,
    /// Target document assigned by the allocator
    pub target: Option<String>,
    pub payload: Payload,
}

impl Instruction {
    pub fn new(name: impl Into<String>, sequence: f64, payload: Payload) -> Self {
        Self {
            name: name.into(),
            sequence,
            content_path: None,
            combined_with: None,
            target: None,
            payload,
        }
    }

    /// Set the content path, normalizing it
    pub fn with_content_path(mut self, path: &str) -> Self {
        self.content_path = Some(normalize_path(path));
        self
    }

    pub fn kind(&self) -> InstructionKind {
        self.payload.kind()
    }

    /// Merge directive on the root of the imported content, if any
    pub fn root_directive(&self) -> Option<MergeDirective> {
        match &self.payload {
            Payload::ContentResource(import) => import.root.directive(),
            _ => None,
        }
    }

    /// Whether the imported content is merged into existing content
    pub fn is_delta(&self) -> bool {
        self.root_directive().is_some_and(MergeDirective::is_delta)
    }

    /// Whether the imported content is skipped when it already exists
    pub fn is_skip(&self) -> bool {
        self.root_directive() == Some(MergeDirective::Skip)
    }
}

/// Arena of instructions for one migration run
#[derive(Debug, Clone, Default)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
}

impl InstructionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instruction: Instruction) -> InstructionId {
        self.instructions.push(instruction);
        InstructionId(self.instructions.len() - 1)
    }

    /// Link two instructions as a combinable pair
    pub fn link(&mut self, a: InstructionId, b: InstructionId) {
        self.instructions[a.0].combined_with = Some(b);
        self.instructions[b.0].combined_with = Some(a);
    }

    pub fn get(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn get_mut(&mut self, id: InstructionId) -> &mut Instruction {
        &mut self.instructions[id.0]
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = InstructionId> + '_ {
        (0..self.instructions.len()).map(InstructionId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Whether `a` and `b` are the two halves of one combinable pair
    pub fn are_combined(&self, a: InstructionId, b: InstructionId) -> bool {
        self.get(a).combined_with == Some(b)
    }
}

/// Normalize a content path: absolute, single slashes, no trailing slash
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Join a child name onto a content path
pub fn join_path(parent: &str, child: &str) -> String {
    normalize_path(&format!("{}/{}", parent, child))
}

/// Split a property path into its node path and property name
pub fn split_property_path(path: &str) -> (String, String) {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(0) => ("/".to_string(), path[1..].to_string()),
        Some(pos) => (path[..pos].to_string(), path[pos + 1..].to_string()),
        None => ("/".to_string(), path),
    }
}
