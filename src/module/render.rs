// src/module/render.rs
//! YAML rendering of target documents
//!
//! Nodes render as maps: properties by name, child nodes as `/name` keys
//! (`/name[N]` for the N-th same-name sibling, counted from one). A property
//! uses the short scalar or sequence form when that loses nothing and the
//! long `type`/`value`/`resource`/`operation` map otherwise.
//!
//! Resource references render as absolute paths within the module's config
//! directory, where the writer copies them.

use super::{Definition, Module, PropertyOperation, TargetDocument};
use crate::model::{Attribute, ContentNode, MergeDirective, Value, ValueType};
use serde_yaml::{Mapping, Value as Yaml};

/// Render a target document as a `definitions:` sequence
pub fn render_document(document: &TargetDocument) -> Yaml {
    let definitions = document.definitions.iter().map(render_definition).collect();
    entry("definitions", Yaml::Sequence(definitions))
}

/// Render the module descriptor
pub fn render_descriptor(module: &Module) -> Yaml {
    let mut body = Mapping::new();
    body.insert(text("name"), text(&module.name));
    body.insert(
        text("documents"),
        Yaml::Sequence(module.documents.iter().map(|d| text(&d.name)).collect()),
    );
    entry("module", Yaml::Mapping(body))
}

fn render_definition(definition: &Definition) -> Yaml {
    match definition {
        Definition::Namespace { prefix, uri, cnd } => {
            let mut body = Mapping::new();
            body.insert(text("prefix"), text(prefix));
            body.insert(text("uri"), text(uri.as_str()));
            if let Some(cnd) = cnd {
                body.insert(text("cnd"), resource_path(cnd));
            }
            entry("namespace", Yaml::Mapping(body))
        }
        Definition::NodeTypes { cnd } => entry("cnd", resource_path(cnd)),
        Definition::DeleteNode { path } => {
            config(path, entry(".meta:delete", Yaml::Bool(true)))
        }
        Definition::Content { path, node } | Definition::Translations { path, node } => {
            config(path, render_node(node))
        }
        Definition::Property {
            node_path,
            attribute,
            operation,
        } => config(
            node_path,
            entry(&attribute.name, render_property(attribute, *operation)),
        ),
        Definition::WebFileBundle { name } => entry("webfilebundle", text(name)),
    }
}

fn render_node(node: &ContentNode) -> Yaml {
    let mut body = Mapping::new();
    if let Some(merge) = &node.merge {
        body.insert(text(".meta:merge"), text(merge.directive.as_ref()));
        if let Some(location) = &merge.location {
            body.insert(text(".meta:location"), text(location));
        }
    }
    if let Some(primary_type) = &node.primary_type {
        body.insert(text("jcr:primaryType"), text(primary_type));
    }
    if !node.mixins.is_empty() {
        body.insert(
            text("jcr:mixinTypes"),
            Yaml::Sequence(node.mixins.iter().map(|m| text(m)).collect()),
        );
    }
    if let Some(identifier) = &node.identifier {
        body.insert(text("jcr:uuid"), text(identifier));
    }
    for attribute in &node.attributes {
        body.insert(text(&attribute.name), render_attribute(attribute, None));
    }
    for child in &node.children {
        body.insert(text(&child_key(child)), render_node(child));
    }
    Yaml::Mapping(body)
}

fn child_key(node: &ContentNode) -> String {
    if node.index > 0 {
        format!("/{}[{}]", node.name, node.index + 1)
    } else {
        format!("/{}", node.name)
    }
}

fn render_property(attribute: &Attribute, operation: PropertyOperation) -> Yaml {
    match operation {
        PropertyOperation::Set => render_attribute(attribute, None),
        PropertyOperation::Add => render_attribute(attribute, Some("add")),
        PropertyOperation::Delete => entry("operation", text("delete")),
    }
}

fn render_attribute(attribute: &Attribute, operation: Option<&str>) -> Yaml {
    let operation = operation.or(attribute.merge.map(operation_name));

    if operation.is_none() && !attribute.has_resources() {
        if let Some(short) = short_form(attribute) {
            return short;
        }
    }

    let mut body = Mapping::new();
    if let Some(operation) = operation {
        body.insert(text("operation"), text(operation));
    }
    body.insert(text("type"), text(attribute.value_type.yaml_name()));

    let literals: Vec<Yaml> = attribute
        .values
        .iter()
        .filter_map(Value::as_literal)
        .map(|v| scalar(attribute.value_type, v).unwrap_or_else(|| text(v)))
        .collect();
    let resources: Vec<Yaml> = attribute
        .values
        .iter()
        .filter_map(Value::as_resource)
        .map(resource_path)
        .collect();

    if !literals.is_empty() || resources.is_empty() {
        body.insert(text("value"), values(attribute.multiple, literals));
    }
    if !resources.is_empty() {
        body.insert(text("resource"), values(attribute.multiple, resources));
    }
    Yaml::Mapping(body)
}

/// Scalar or sequence form, when the type can be read back from the value
fn short_form(attribute: &Attribute) -> Option<Yaml> {
    if attribute.multiple && attribute.values.is_empty() {
        return (attribute.value_type == ValueType::String).then(|| Yaml::Sequence(Vec::new()));
    }
    let rendered = attribute
        .values
        .iter()
        .map(|v| v.as_literal().and_then(|v| scalar(attribute.value_type, v)))
        .collect::<Option<Vec<_>>>()?;
    Some(values(attribute.multiple, rendered))
}

/// Native YAML scalar for a literal of a self-describing type
fn scalar(value_type: ValueType, literal: &str) -> Option<Yaml> {
    match value_type {
        ValueType::String => Some(text(literal)),
        ValueType::Boolean => literal.parse::<bool>().ok().map(Yaml::Bool),
        ValueType::Long => literal.trim().parse::<i64>().ok().map(|n| Yaml::Number(n.into())),
        ValueType::Double => literal
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(|n| Yaml::Number(n.into())),
        _ => None,
    }
}

fn values(multiple: bool, mut rendered: Vec<Yaml>) -> Yaml {
    if multiple {
        Yaml::Sequence(rendered)
    } else if rendered.is_empty() {
        Yaml::Null
    } else {
        rendered.swap_remove(0)
    }
}

fn operation_name(directive: MergeDirective) -> &'static str {
    match directive {
        MergeDirective::Append => "add",
        MergeDirective::Combine => "combine",
        MergeDirective::Insert => "insert",
        MergeDirective::Overlay => "overlay",
        MergeDirective::Override => "override",
        MergeDirective::Skip => "skip",
    }
}

fn resource_path(path: &str) -> Yaml {
    text(&format!("/{}", path))
}

fn config(path: &str, body: Yaml) -> Yaml {
    entry("config", entry(path, body))
}

fn entry(key: &str, value: Yaml) -> Yaml {
    let mut map = Mapping::new();
    map.insert(text(key), value);
    Yaml::Mapping(map)
}

fn text(value: &str) -> Yaml {
    Yaml::String(value.to_string())
}
