// src/instruction/allocate.rs
//! Target document allocation
//!
//! Assigns every instruction the output document it is written to. Content
//! imports keep the document resolved from their source file, resource
//! bundles get one document each, and everything else is folded into a
//! single main document. Names never collide: a claimed name is retried
//! with `-1`, `-2`, ... suffixes.

use super::{InstructionId, InstructionKind, InstructionSet, Payload};
use crate::config::MigrationOptions;
use crate::error::Result;
use std::collections::BTreeSet;
use tracing::debug;

/// Extension of every target document
pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Hands out unique target document names
#[derive(Debug, Default)]
pub struct TargetAllocator {
    claimed: BTreeSet<String>,
}

impl TargetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Claim `base.yaml`, or the first free `base-N.yaml`
    pub fn claim(&mut self, base: &str) -> String {
        let mut name = format!("{}.{}", base, DOCUMENT_EXTENSION);
        let mut suffix = 0;
        while self.is_claimed(&name) {
            suffix += 1;
            name = format!("{}-{}.{}", base, suffix, DOCUMENT_EXTENSION);
        }
        self.claimed.insert(name.clone());
        name
    }

    /// Claim the first unclaimed candidate, falling back to suffixing the
    /// first candidate when all of them are taken
    pub fn claim_first(&mut self, candidates: &[String]) -> String {
        for candidate in candidates {
            let name = format!("{}.{}", candidate, DOCUMENT_EXTENSION);
            if !self.is_claimed(&name) {
                self.claimed.insert(name.clone());
                return name;
            }
        }
        let first = candidates.first().map(String::as_str).unwrap_or("main");
        self.claim(first)
    }
}

/// Strip the document extension from a document name
fn document_base(document: &str) -> &str {
    document
        .strip_suffix(&format!(".{}", DOCUMENT_EXTENSION))
        .unwrap_or(document)
}

/// File stem of a resource path (`a/b/labels.json` → `labels`)
fn resource_stem(resource: &str) -> &str {
    let file = resource.rsplit('/').next().unwrap_or(resource);
    match file.rfind('.') {
        Some(pos) if pos > 0 => &file[..pos],
        _ => file,
    }
}

/// Assign a target document to every instruction, in replay order
///
/// Content documents are claimed first, then the main document (only if
/// anything is folded into it), then resource bundle documents. Returns
/// the name of the main document, if one was allocated.
pub fn allocate_targets(
    set: &mut InstructionSet,
    order: &[InstructionId],
    options: &MigrationOptions,
) -> Result<Option<String>> {
    let mut allocator = TargetAllocator::new();

    for &id in order {
        let document = match &set.get(id).payload {
            Payload::ContentResource(import) => import.document.clone(),
            _ => continue,
        };
        let target = allocator.claim(document_base(&document));
        if target != document {
            debug!(
                "Document '{}' for item '{}' already claimed, using '{}'",
                document,
                set.get(id).name,
                target
            );
        }
        if let Some(partner) = set.get(id).combined_with {
            set.get_mut(partner).target = Some(target.clone());
        }
        set.get_mut(id).target = Some(target);
    }

    let needs_main = order.iter().any(|&id| {
        let instruction = set.get(id);
        instruction.target.is_none() && instruction.kind() != InstructionKind::ResourceBundles
    });
    let main = needs_main.then(|| allocator.claim_first(&options.main_candidates));
    if let Some(main) = &main {
        debug!("Main document: {}", main);
    }

    for &id in order {
        if set.get(id).target.is_some() {
            continue;
        }
        let target = match &set.get(id).payload {
            Payload::ResourceBundles { resource, .. } => allocator.claim(resource_stem(resource)),
            _ => match &main {
                Some(main) => main.clone(),
                None => continue,
            },
        };
        set.get_mut(id).target = Some(target);
    }

    Ok(main)
}
