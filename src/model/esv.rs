// src/model/esv.rs
//! Enhanced system view (ESV) reader
//!
//! Reads JCR system-view XML with the enhanced import attributes
//! (`esv:merge`, `esv:location`, `esv:resource`) and feeds the resulting
//! events into a [`TreeBuilder`]:
//!
//! ```xml
//! <sv:node sv:name="documents" esv:merge="combine"
//!     xmlns:sv="http://www.jcp.org/jcr/sv/1.0"
//!     xmlns:esv="http://www.onehippo.org/jcr/xmlimport">
//!   <sv:property sv:name="jcr:primaryType" sv:type="Name">
//!     <sv:value>hippostd:folder</sv:value>
//!   </sv:property>
//! </sv:node>
//! ```

use super::builder::{EsvEvent, TreeBuilder};
use super::{ContentNode, Value};
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use std::path::Path;
use tracing::debug;

/// JCR system view namespace
pub const SV_NAMESPACE: &str = "http://www.jcp.org/jcr/sv/1.0";

/// Enhanced import namespace
pub const ESV_NAMESPACE: &str = "http://www.onehippo.org/jcr/xmlimport";

const PRIMARY_TYPE: &str = "jcr:primaryType";
const MIXIN_TYPES: &str = "jcr:mixinTypes";
const IDENTIFIER: &str = "jcr:uuid";

/// Parse an ESV document from a string
///
/// `resource` names the document in errors. `base_dir` is the document's
/// directory relative to the descriptor root and prefixes `esv:resource`
/// references so they end up relative to the root as well.
pub fn parse_document(xml: &str, resource: &str, base_dir: &str) -> Result<ContentNode> {
    let mut reader = EsvReader::new(xml, resource, base_dir);
    reader.run()?;
    reader.builder.finish()
}

/// Parse an ESV document stored at `root/relative`
pub fn parse_document_file(root: &Path, relative: &str) -> Result<ContentNode> {
    let path = root.join(relative);
    let xml = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    let base_dir = match relative.rfind('/') {
        Some(pos) => &relative[..pos],
        None => "",
    };
    debug!("Parsing ESV document {}", path.display());
    parse_document(&xml, relative, base_dir)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Sv,
    Esv,
    Other,
}

impl Ns {
    fn of(resolved: &ResolveResult) -> Self {
        match resolved {
            ResolveResult::Bound(Namespace(ns)) if *ns == SV_NAMESPACE.as_bytes() => Ns::Sv,
            ResolveResult::Bound(Namespace(ns)) if *ns == ESV_NAMESPACE.as_bytes() => Ns::Esv,
            _ => Ns::Other,
        }
    }
}

/// Open element on the reader's own stack
#[derive(Debug)]
enum Open {
    Node,
    Property(PendingProperty),
    Value { resource: Option<String>, text: String },
}

/// Property whose values are still being read
#[derive(Debug)]
struct PendingProperty {
    name: String,
    value_type: String,
    multiple: bool,
    merge: Option<String>,
    values: Vec<Value>,
}

/// Attributes of one ESV element, already namespace-resolved
#[derive(Debug, Default)]
struct ElementAttributes {
    name: Option<String>,
    value_type: Option<String>,
    multiple: bool,
    merge: Option<String>,
    location: Option<String>,
    resource: Option<String>,
}

struct EsvReader<'a> {
    xml: &'a str,
    resource: &'a str,
    base_dir: &'a str,
    reader: NsReader<&'a [u8]>,
    builder: TreeBuilder,
    open: Vec<Open>,
}

impl<'a> EsvReader<'a> {
    fn new(xml: &'a str, resource: &'a str, base_dir: &'a str) -> Self {
        Self {
            xml,
            resource,
            base_dir,
            reader: NsReader::from_str(xml),
            builder: TreeBuilder::new(resource),
            open: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        loop {
            let next = self.reader.read_resolved_event();
            let (ns, event) = match next {
                Ok((resolved, event)) => (Ns::of(&resolved), event),
                Err(e) => return Err(self.parse_error(e.to_string())),
            };

            match event {
                Event::Start(e) => {
                    self.start_element(ns, &e)?;
                }
                Event::Empty(e) => {
                    self.start_element(ns, &e)?;
                    self.end_element()?;
                }
                Event::End(_) => self.end_element()?,
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| self.parse_error(e.to_string()))?
                        .into_owned();
                    self.text(&text)?;
                }
                Event::CData(c) => {
                    let text = std::str::from_utf8(&c)
                        .map_err(|e| self.parse_error(e.to_string()))?
                        .to_string();
                    self.text(&text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !self.open.is_empty() {
            return Err(self.parse_error("unexpected end of document"));
        }
        Ok(())
    }

    fn start_element(&mut self, ns: Ns, element: &BytesStart) -> Result<()> {
        let local = element.local_name();
        let local = String::from_utf8_lossy(local.as_ref()).into_owned();
        if ns != Ns::Sv {
            return Err(self.parse_error(format!("unexpected element '{}'", local)));
        }
        let attributes = self.element_attributes(element)?;

        match local.as_str() {
            "node" => {
                if matches!(self.open.last(), Some(Open::Property(_) | Open::Value { .. })) {
                    return Err(self.parse_error("node nested inside a property"));
                }
                let name = attributes
                    .name
                    .ok_or_else(|| self.parse_error("sv:node without sv:name"))?;
                self.emit(EsvEvent::OpenNode {
                    name,
                    merge: attributes.merge,
                    location: attributes.location,
                })?;
                self.open.push(Open::Node);
            }
            "property" => {
                if !matches!(self.open.last(), Some(Open::Node)) {
                    return Err(self.parse_error("property outside of a node"));
                }
                let name = attributes
                    .name
                    .ok_or_else(|| self.parse_error("sv:property without sv:name"))?;
                let value_type = attributes.value_type.ok_or_else(|| {
                    self.parse_error(format!("property '{}' without sv:type", name))
                })?;
                self.open.push(Open::Property(PendingProperty {
                    name,
                    value_type,
                    multiple: attributes.multiple,
                    merge: attributes.merge,
                    values: Vec::new(),
                }));
            }
            "value" => {
                if !matches!(self.open.last(), Some(Open::Property(_))) {
                    return Err(self.parse_error("value outside of a property"));
                }
                let resource = attributes.resource.map(|r| self.resolve_resource(&r));
                self.open.push(Open::Value {
                    resource,
                    text: String::new(),
                });
            }
            other => {
                return Err(self.parse_error(format!("unexpected element 'sv:{}'", other)));
            }
        }
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        let Some(open) = self.open.pop() else {
            return Err(self.parse_error("closing tag without open element"));
        };

        match open {
            Open::Node => self.emit(EsvEvent::CloseNode),
            Open::Property(property) => self.flush_property(property),
            Open::Value { resource, text } => {
                let value = match resource {
                    Some(path) => Value::Resource(path),
                    None => Value::Literal(text),
                };
                if let Some(Open::Property(property)) = self.open.last_mut() {
                    property.values.push(value);
                    return Ok(());
                }
                Err(self.parse_error("value outside of a property"))
            }
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if let Some(Open::Value {
            resource: None,
            text: buffer,
        }) = self.open.last_mut()
        {
            buffer.push_str(text);
            return Ok(());
        }
        if text.trim().is_empty() {
            return Ok(());
        }
        Err(self.parse_error(format!("unexpected text '{}'", text.trim())))
    }

    /// Turn the well-known identity properties into their own events
    fn flush_property(&mut self, property: PendingProperty) -> Result<()> {
        match property.name.as_str() {
            PRIMARY_TYPE => {
                let node_type = self.single_literal(&property)?;
                self.emit(EsvEvent::SetType(node_type))
            }
            IDENTIFIER => {
                let identifier = self.single_literal(&property)?;
                self.emit(EsvEvent::SetIdentity(identifier))
            }
            MIXIN_TYPES => {
                let mixins = property
                    .values
                    .iter()
                    .filter_map(|v| v.as_literal().map(str::to_string))
                    .collect();
                self.emit(EsvEvent::SetMixins(mixins))
            }
            _ => {
                self.emit(EsvEvent::AddAttribute {
                    name: property.name,
                    value_type: property.value_type,
                    multiple: property.multiple,
                    merge: property.merge,
                })?;
                for value in property.values {
                    self.emit(EsvEvent::AppendValue(value))?;
                }
                Ok(())
            }
        }
    }

    fn single_literal(&self, property: &PendingProperty) -> Result<String> {
        match property.values.as_slice() {
            [Value::Literal(value)] => Ok(value.trim().to_string()),
            _ => Err(self.parse_error(format!(
                "property '{}' must have exactly one inline value",
                property.name
            ))),
        }
    }

    fn element_attributes(&self, element: &BytesStart) -> Result<ElementAttributes> {
        let mut attributes = ElementAttributes::default();

        for attr in element.attributes() {
            let attr = attr.map_err(|e| self.parse_error(e.to_string()))?;
            let (resolved, local) = self.reader.resolve_attribute(attr.key);
            let ns = Ns::of(&resolved);
            let value = attr
                .unescape_value()
                .map_err(|e| self.parse_error(e.to_string()))?
                .into_owned();

            match (ns, local.as_ref()) {
                (Ns::Sv, b"name") => attributes.name = Some(value),
                (Ns::Sv, b"type") => attributes.value_type = Some(value),
                (Ns::Sv, b"multiple") => attributes.multiple = value == "true",
                (Ns::Esv, b"merge") => attributes.merge = Some(value),
                (Ns::Esv, b"location") => attributes.location = Some(value),
                (Ns::Esv, b"resource") => attributes.resource = Some(value),
                _ => {}
            }
        }

        Ok(attributes)
    }

    fn resolve_resource(&self, reference: &str) -> String {
        if reference.starts_with('/') || self.base_dir.is_empty() {
            reference.trim_start_matches('/').to_string()
        } else {
            format!("{}/{}", self.base_dir, reference)
        }
    }

    fn emit(&mut self, event: EsvEvent) -> Result<()> {
        self.builder.handle(event)
    }

    fn parse_error(&self, message: impl Into<String>) -> Error {
        let position = (self.reader.buffer_position() as usize).min(self.xml.len());
        let (line, column) = line_column(self.xml, position);
        Error::Parse {
            resource: self.resource.to_string(),
            line,
            column,
            message: message.into(),
        }
    }
}

/// One-based line and column of a byte offset
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let before = &text[..end];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(pos) => before[pos + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
