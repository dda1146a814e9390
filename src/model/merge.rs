// src/model/merge.rs
//! Merge directives
//!
//! A delta document can mark a node or a property with a merge directive
//! (`esv:merge="combine"`) describing how it is combined with content that
//! already exists when the document is replayed. Each directive is legal on
//! nodes, on properties, or on both.

use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

/// How a delta node or property is merged into existing content
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum MergeDirective {
    /// Append values to an existing multi-valued property
    Append,
    /// Merge child nodes and properties into the existing node
    Combine,
    /// Insert the node at the merge location
    Insert,
    /// Overlay the existing node, replacing what the delta defines
    Overlay,
    /// Replace the existing node or property entirely
    Override,
    /// Leave existing content untouched
    Skip,
}

/// Where a directive is being attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MergeScope {
    #[strum(serialize = "node")]
    Node,
    #[strum(serialize = "property")]
    Attribute,
}

impl MergeDirective {
    /// Whether the directive may be attached to a node
    pub fn legal_on_node(self) -> bool {
        !matches!(self, MergeDirective::Append)
    }

    /// Whether the directive may be attached to a property
    pub fn legal_on_attribute(self) -> bool {
        matches!(
            self,
            MergeDirective::Append | MergeDirective::Override | MergeDirective::Skip
        )
    }

    /// Whether the directive is legal in the given scope
    pub fn legal_on(self, scope: MergeScope) -> bool {
        match scope {
            MergeScope::Node => self.legal_on_node(),
            MergeScope::Attribute => self.legal_on_attribute(),
        }
    }

    /// Whether content carrying this directive is merged into, rather than
    /// replacing, existing content
    pub fn is_delta(self) -> bool {
        matches!(self, MergeDirective::Combine | MergeDirective::Overlay)
    }
}

/// A resolved merge directive plus its optional location hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge {
    pub directive: MergeDirective,
    /// Sibling name or path used to position the merged result
    pub location: Option<String>,
}

impl Merge {
    pub fn new(directive: MergeDirective) -> Self {
        Self {
            directive,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Resolve a merge token for the given scope
///
/// Unknown tokens and directives that are not legal in `scope` are logged
/// and dropped; `owner` names the node or property for the warning.
pub fn resolve_merge(token: &str, scope: MergeScope, owner: &str) -> Option<MergeDirective> {
    let directive = match MergeDirective::from_str(token) {
        Ok(directive) => directive,
        Err(_) => {
            warn!("Ignoring unknown merge directive '{}' on {} '{}'", token, scope, owner);
            return None;
        }
    };

    if !directive.legal_on(scope) {
        warn!(
            "Ignoring merge directive '{}' on {} '{}': not allowed on a {}",
            directive, scope, owner, scope
        );
        return None;
    }

    Some(directive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_directive_has_a_scope() {
        for directive in MergeDirective::iter() {
            assert!(directive.legal_on_node() || directive.legal_on_attribute());
        }
    }

    #[test]
    fn test_tokens_are_lowercase_and_exact() {
        assert_eq!(
            resolve_merge("combine", MergeScope::Node, "n"),
            Some(MergeDirective::Combine)
        );
        assert_eq!(resolve_merge("Combine", MergeScope::Node, "n"), None);
        assert_eq!(resolve_merge("COMBINE", MergeScope::Node, "n"), None);
        assert_eq!(resolve_merge("merge", MergeScope::Node, "n"), None);
        assert_eq!(MergeDirective::Overlay.to_string(), "overlay");
    }

    #[test]
    fn test_scope_violations_are_dropped() {
        assert_eq!(resolve_merge("append", MergeScope::Node, "n"), None);
        assert_eq!(resolve_merge("combine", MergeScope::Attribute, "p"), None);
        assert_eq!(
            resolve_merge("append", MergeScope::Attribute, "p"),
            Some(MergeDirective::Append)
        );
        assert_eq!(
            resolve_merge("skip", MergeScope::Attribute, "p"),
            Some(MergeDirective::Skip)
        );
    }

    #[test]
    fn test_delta_directives() {
        assert!(MergeDirective::Combine.is_delta());
        assert!(MergeDirective::Overlay.is_delta());
        assert!(!MergeDirective::Skip.is_delta());
        assert!(!MergeDirective::Override.is_delta());
    }
}
