// src/convert.rs
//! Descriptor to module migration
//!
//! Drives the whole pipeline for one source directory: read the extension
//! descriptor, classify its items, compute the replay order, allocate
//! target documents, assemble the module and write it out.

use crate::config::MigrationOptions;
use crate::error::{Error, Result};
use crate::instruction::{
    Classifier, InstructionKind, InstructionSet, allocate_targets, replay_order,
};
use crate::model::{ContentNode, parse_document_file};
use crate::module::{Module, ModuleWriter, WriteSummary, assemble};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One instruction of the replay plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub name: String,
    pub kind: InstructionKind,
    pub sequence: f64,
    pub content_path: Option<String>,
    pub target: String,
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] sequence {} path {} -> {}",
            self.name,
            self.kind,
            self.sequence,
            self.content_path.as_deref().unwrap_or("-"),
            self.target
        )
    }
}

/// Result of a migration run
#[derive(Debug)]
pub struct MigrationReport {
    /// Instructions in replay order
    pub plan: Vec<PlanEntry>,
    pub module: Module,
    /// Set when the module was written
    pub written: Option<WriteSummary>,
}

/// Migrates extension descriptors to declarative modules
pub struct Migrator {
    options: MigrationOptions,
}

impl Migrator {
    pub fn new(options: MigrationOptions) -> Self {
        Self { options }
    }

    pub fn with_defaults() -> Self {
        Self::new(MigrationOptions::default())
    }

    /// Compute the migrated module without writing anything
    pub fn plan(&self, source: &Path) -> Result<MigrationReport> {
        let descriptor = self.load_descriptor(source)?;
        let classifier = Classifier::new(source, &self.options);
        let mut set = classifier.classify(&descriptor)?;

        let order = replay_order(&set);
        allocate_targets(&mut set, &order, &self.options)?;

        let name = self.module_name(source);
        let module = assemble(&name, &set, &order, &self.options)?;
        let plan = plan_entries(&set, &order)?;

        info!(
            "Planned module '{}': {} instructions as {} definitions in {} documents",
            module.name,
            plan.len(),
            module.definition_count(),
            module.documents.len()
        );
        Ok(MigrationReport {
            plan,
            module,
            written: None,
        })
    }

    /// Migrate the descriptor in `source` into a module at `target`
    pub fn migrate(&self, source: &Path, target: &Path) -> Result<MigrationReport> {
        check_disjoint(source, target)?;
        let mut report = self.plan(source)?;
        let summary = ModuleWriter::new(source, target)
            .copy_resources(self.options.copy_resources)
            .write(&report.module)?;
        report.written = Some(summary);
        Ok(report)
    }

    fn load_descriptor(&self, source: &Path) -> Result<ContentNode> {
        let path = source.join(&self.options.descriptor_name);
        if !path.is_file() {
            return Err(Error::Descriptor {
                path,
                message: "descriptor not found".to_string(),
            });
        }
        debug!("Reading descriptor {}", path.display());

        let descriptor = parse_document_file(source, &self.options.descriptor_name)?;
        if descriptor.primary_type.as_deref() != Some(self.options.root_type.as_str()) {
            return Err(Error::Descriptor {
                path,
                message: format!(
                    "root node must be of type '{}', found '{}'",
                    self.options.root_type,
                    descriptor.primary_type.as_deref().unwrap_or("none")
                ),
            });
        }
        Ok(descriptor)
    }

    fn module_name(&self, source: &Path) -> String {
        if let Some(name) = &self.options.module_name {
            return name.clone();
        }
        source
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "module".to_string())
    }
}

fn plan_entries(
    set: &InstructionSet,
    order: &[crate::instruction::InstructionId],
) -> Result<Vec<PlanEntry>> {
    order
        .iter()
        .map(|&id| {
            let instruction = set.get(id);
            let target = instruction
                .target
                .clone()
                .ok_or_else(|| Error::Unallocated(instruction.name.clone()))?;
            Ok(PlanEntry {
                name: instruction.name.clone(),
                kind: instruction.kind(),
                sequence: instruction.sequence,
                content_path: instruction.content_path.clone(),
                target,
            })
        })
        .collect()
}

/// Refuse targets that would wipe the source when replaced
fn check_disjoint(source: &Path, target: &Path) -> Result<()> {
    let source = source.canonicalize().map_err(|e| Error::io(source, e))?;
    let Ok(target) = target.canonicalize() else {
        return Ok(());
    };
    if source.starts_with(&target) {
        return Err(Error::Config(format!(
            "target '{}' contains the source directory",
            target.display()
        )));
    }
    Ok(())
}

/// Convenience wrapper: migrate with the given options
pub fn migrate(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: MigrationOptions,
) -> Result<MigrationReport> {
    Migrator::new(options).migrate(source.as_ref(), target.as_ref())
}
