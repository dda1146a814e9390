// src/config.rs
//! Migration options
//!
//! Every option has a default matching the legacy repository layout, so a
//! configuration file is only needed to migrate non-standard descriptors.
//! Options are read from TOML:
//!
//! ```toml
//! descriptor_name = "hippoecm-extension.xml"
//! translations_root = "/hippo:configuration/hippo:translations"
//! main_candidates = ["main", "root", "base", "index"]
//! module_name = "my-module"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default descriptor file name
pub const DEFAULT_DESCRIPTOR: &str = "hippoecm-extension.xml";

/// Options controlling a migration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationOptions {
    /// File name of the descriptor inside the source directory
    pub descriptor_name: String,
    /// Required type of the descriptor root node
    pub root_type: String,
    /// Required type of each initialize item
    pub item_type: String,
    /// Content path under which resource bundles are stored
    pub translations_root: String,
    /// Base names tried, in order, for the main target document
    pub main_candidates: Vec<String>,
    /// Module name; defaults to the source directory name
    pub module_name: Option<String>,
    /// Copy referenced resources into the output module
    pub copy_resources: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            descriptor_name: DEFAULT_DESCRIPTOR.to_string(),
            root_type: "hippo:initializefolder".to_string(),
            item_type: "hippo:initializeitem".to_string(),
            translations_root: "/hippo:configuration/hippo:translations".to_string(),
            main_candidates: ["main", "root", "base", "index"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            module_name: None,
            copy_resources: true,
        }
    }
}

impl MigrationOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse options from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let options: MigrationOptions = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options for consistency
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_name.is_empty() {
            return Err(Error::Config("descriptor_name cannot be empty".to_string()));
        }
        if self.main_candidates.is_empty() {
            return Err(Error::Config("main_candidates cannot be empty".to_string()));
        }
        if let Some(bad) = self
            .main_candidates
            .iter()
            .find(|c| c.is_empty() || c.contains('/'))
        {
            return Err(Error::Config(format!(
                "main candidate '{}' must be a plain file base name",
                bad
            )));
        }
        if !self.translations_root.starts_with('/') {
            return Err(Error::Config(format!(
                "translations_root '{}' must be an absolute path",
                self.translations_root
            )));
        }
        Ok(())
    }
}
