// tests/common/mod.rs

//! Shared fixtures for integration tests: a source directory holding an
//! extension descriptor and the resources its items refer to.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SV: &str = "http://www.jcp.org/jcr/sv/1.0";
pub const ESV: &str = "http://www.onehippo.org/jcr/xmlimport";

/// One `hippo:initializeitem` of a fixture descriptor
pub struct Item {
    name: String,
    properties: Vec<(String, String, String)>,
}

impl Item {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: Vec::new(),
        }
    }

    /// Add a single-valued `String` property
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.properties
            .push((name.to_string(), "String".to_string(), value.to_string()));
        self
    }

    pub fn sequence(mut self, sequence: f64) -> Self {
        self.properties.push((
            "hippo:sequence".to_string(),
            "Double".to_string(),
            sequence.to_string(),
        ));
        self
    }

    fn render(&self) -> String {
        let mut xml = format!("  <sv:node sv:name=\"{}\">\n", self.name);
        xml.push_str(&property("jcr:primaryType", "Name", "hippo:initializeitem"));
        for (name, value_type, value) in &self.properties {
            xml.push_str(&property(name, value_type, value));
        }
        xml.push_str("  </sv:node>\n");
        xml
    }
}

pub fn property(name: &str, value_type: &str, value: &str) -> String {
    format!(
        "    <sv:property sv:name=\"{}\" sv:type=\"{}\"><sv:value>{}</sv:value></sv:property>\n",
        name, value_type, value
    )
}

/// Source directory with a descriptor; keep it alive for the whole test
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the source directory
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `hippoecm-extension.xml` holding the given items
    pub fn descriptor(&self, items: &[Item]) -> PathBuf {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sv:node sv:name=\"hippo:initialize\" xmlns:sv=\"{}\">\n",
            SV
        );
        xml.push_str(&property("jcr:primaryType", "Name", "hippo:initializefolder"));
        for item in items {
            xml.push_str(&item.render());
        }
        xml.push_str("</sv:node>\n");
        self.write("hippoecm-extension.xml", &xml)
    }

    /// Write a content document whose root node has the given name, type
    /// and inner markup
    pub fn content(&self, relative: &str, root: &str, node_type: &str, body: &str) -> PathBuf {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sv:node sv:name=\"{}\" xmlns:sv=\"{}\" xmlns:esv=\"{}\">\n{}{}</sv:node>\n",
            root,
            SV,
            ESV,
            property("jcr:primaryType", "Name", node_type),
            body
        );
        self.write(relative, &xml)
    }
}

/// Fresh, not yet existing output directory inside its own temp dir
pub fn output_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("module");
    (dir, target)
}

/// Parse a written YAML file
pub fn read_yaml(path: &Path) -> serde_yaml::Value {
    let content = fs::read_to_string(path).unwrap();
    serde_yaml::from_str(&content).unwrap()
}
