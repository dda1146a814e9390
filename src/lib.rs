// src/lib.rs

//! Extension descriptor migrator
//!
//! Migrates a legacy `hippoecm-extension.xml` bootstrap descriptor, an
//! ordered list of initialize items replayed one by one by the repository
//! loader, into a declarative module: ordered YAML documents whose layout
//! bakes in the replay order the items depended on.
//!
//! # Pipeline
//!
//! - [`model`]: enhanced system view (ESV) parsing into content trees
//! - [`instruction`]: item classification, replay ordering and target
//!   document allocation
//! - [`bundle`]: resource bundle (translation JSON) expansion
//! - [`module`]: module assembly, YAML rendering and output
//! - [`convert`]: the [`Migrator`] driving all of the above

pub mod bundle;
pub mod config;
pub mod convert;
mod error;
pub mod instruction;
pub mod model;
pub mod module;

pub use config::{DEFAULT_DESCRIPTOR, MigrationOptions};
pub use convert::{MigrationReport, Migrator, PlanEntry, migrate};
pub use error::{Error, Result};
pub use instruction::{Instruction, InstructionId, InstructionKind, InstructionSet};
pub use model::{Attribute, ContentNode, MergeDirective, Value, ValueType};
pub use module::{Definition, Module, TargetDocument};
