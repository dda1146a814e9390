// src/module/writer.rs
//! Module output
//!
//! Layout of a written module:
//!
//! ```text
//! <target>/module.yaml            module descriptor
//! <target>/config/<document>      one file per target document
//! <target>/config/<resource>      copied schemas, binaries, web bundles
//! ```

use super::{Module, render_descriptor, render_document};
use crate::error::{Error, Result};
use serde_yaml::Value as Yaml;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory holding the target documents and copied resources
pub const CONFIG_DIR: &str = "config";

/// Module descriptor file name
pub const DESCRIPTOR_FILE: &str = "module.yaml";

/// What a write produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub documents: usize,
    pub files_copied: usize,
}

/// Writes a migrated module to disk
pub struct ModuleWriter {
    source: PathBuf,
    target: PathBuf,
    copy_resources: bool,
}

impl ModuleWriter {
    /// Writer copying resources from `source` into the module at `target`
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            copy_resources: true,
        }
    }

    pub fn copy_resources(mut self, copy: bool) -> Self {
        self.copy_resources = copy;
        self
    }

    /// Write the module, replacing whatever the target directory held
    pub fn write(&self, module: &Module) -> Result<WriteSummary> {
        self.prepare_target()?;
        let config = self.target.join(CONFIG_DIR);
        let mut summary = WriteSummary::default();

        for document in &module.documents {
            write_yaml(&config.join(&document.name), &render_document(document))?;
            summary.documents += 1;
        }
        write_yaml(&self.target.join(DESCRIPTOR_FILE), &render_descriptor(module))?;

        if self.copy_resources {
            for resource in &module.resources {
                if module.document(&resource.path).is_some() {
                    warn!(
                        "Resource '{}' has the name of a target document, not copied",
                        resource.path
                    );
                    continue;
                }
                let from = self.source.join(&resource.path);
                let to = config.join(&resource.path);
                summary.files_copied += if resource.directory {
                    copy_dir(&from, &to)?
                } else {
                    copy_file(&from, &to)?;
                    1
                };
            }
        }

        info!(
            "Wrote {} documents and {} resource files to {}",
            summary.documents,
            summary.files_copied,
            self.target.display()
        );
        Ok(summary)
    }

    fn prepare_target(&self) -> Result<()> {
        match fs::metadata(&self.target) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(Error::TargetNotDirectory(self.target.clone()));
            }
            Ok(_) => {
                debug!("Removing existing target {}", self.target.display());
                fs::remove_dir_all(&self.target).map_err(|e| Error::io(&self.target, e))?;
            }
            Err(_) => {}
        }
        let config = self.target.join(CONFIG_DIR);
        fs::create_dir_all(&config).map_err(|e| Error::io(&config, e))
    }
}

fn write_yaml(path: &Path, value: &Yaml) -> Result<()> {
    let content = serde_yaml::to_string(value)?;
    create_parent(path)?;
    fs::write(path, content).map_err(|e| Error::io(path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    create_parent(to)?;
    fs::copy(from, to).map_err(|e| Error::io(from, e))?;
    Ok(())
}

/// Copy a directory tree, returning the number of files copied
fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::io(from, e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let destination = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| Error::io(&destination, e))?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &destination)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Definition, ModuleResource, TargetDocument};
    use tempfile::TempDir;

    fn module() -> Module {
        let mut module = Module::new("demo");
        let mut document = TargetDocument::new("content/doc.yaml");
        document.definitions.push(Definition::DeleteNode {
            path: "/content/doc".to_string(),
        });
        module.documents.push(document);
        module
    }

    #[test]
    fn test_write_layout() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let out = target.path().join("module");

        let summary = ModuleWriter::new(source.path(), &out).write(&module()).unwrap();
        assert_eq!(summary.documents, 1);
        assert!(out.join("module.yaml").is_file());
        let document = fs::read_to_string(out.join("config/content/doc.yaml")).unwrap();
        assert!(document.contains("definitions:"));
        assert!(document.contains("/content/doc"));
    }

    #[test]
    fn test_existing_target_is_replaced() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("stale.txt"), "old").unwrap();

        ModuleWriter::new(source.path(), target.path())
            .write(&module())
            .unwrap();
        assert!(!target.path().join("stale.txt").exists());
        assert!(target.path().join("module.yaml").exists());
    }

    #[test]
    fn test_target_file_rejected() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let file = target.path().join("module");
        fs::write(&file, "not a directory").unwrap();

        let result = ModuleWriter::new(source.path(), &file).write(&module());
        assert!(matches!(result, Err(Error::TargetNotDirectory(_))));
        assert!(file.is_file());
    }

    #[test]
    fn test_resources_copied() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("demo.cnd"), "<demo='x'>").unwrap();
        fs::create_dir_all(source.path().join("site/css")).unwrap();
        fs::write(source.path().join("site/css/main.css"), "body {}").unwrap();
        fs::write(source.path().join("site/index.html"), "<html/>").unwrap();

        let mut module = module();
        module.resources.insert(ModuleResource {
            path: "demo.cnd".to_string(),
            directory: false,
        });
        module.resources.insert(ModuleResource {
            path: "site".to_string(),
            directory: true,
        });

        let target = TempDir::new().unwrap();
        let out = target.path().join("out");
        let summary = ModuleWriter::new(source.path(), &out).write(&module).unwrap();

        assert_eq!(summary.files_copied, 3);
        assert!(out.join("config/demo.cnd").is_file());
        assert!(out.join("config/site/css/main.css").is_file());
        assert!(out.join("config/site/index.html").is_file());
    }

    #[test]
    fn test_copy_disabled() {
        let source = TempDir::new().unwrap();
        let mut module = module();
        module.resources.insert(ModuleResource {
            path: "missing.cnd".to_string(),
            directory: false,
        });

        let target = TempDir::new().unwrap();
        let summary = ModuleWriter::new(source.path(), target.path())
            .copy_resources(false)
            .write(&module)
            .unwrap();
        assert_eq!(summary.files_copied, 0);
    }
}
