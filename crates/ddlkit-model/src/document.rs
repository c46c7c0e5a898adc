//! Tree-shaped document abstraction and its XML adapter.
//!
//! The schema reader and writer only consume [`Node`]; [`XmlDocument`]
//! converts between nodes and XML text with `quick-xml`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ModelError, Result};

/// One element of a document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    data: String,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or overwrite an attribute; insertion order is kept.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append a new child and return it for filling in.
    pub fn create_child(&mut self, name: impl Into<String>) -> &mut Node {
        self.children.push(Node::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First node matching a slash separated path relative to this node.
    pub fn find_node(&self, path: &str) -> Option<&Node> {
        self.find_nodes(path).into_iter().next()
    }

    /// Every node matching a slash separated path relative to this node.
    ///
    /// A leading `/` anchors the path at this node's own name.
    pub fn find_nodes(&self, path: &str) -> Vec<&Node> {
        if path.trim_matches('/').is_empty() {
            return Vec::new();
        }
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        if path.starts_with('/') {
            match segments.next() {
                Some(first) if first == self.name => {}
                _ => return Vec::new(),
            }
        }
        let mut current = vec![self];
        for segment in segments {
            current = current
                .into_iter()
                .flat_map(|node| node.children.iter().filter(move |c| c.name == segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn set_data(&mut self, data: impl Into<String>) {
        self.data = data.into();
    }

    /// Text of a named child, if present.
    pub fn child_data(&self, name: &str) -> Option<&str> {
        self.child(name).map(Node::data)
    }
}

/// An XML document held as a [`Node`] tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Node,
}

impl XmlDocument {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Parse XML text. Comments, processing instructions and the
    /// declaration are dropped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(node_from_start(&start)?),
                Event::Empty(start) => {
                    let node = node_from_start(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| {
                        ModelError::MalformedDocument("unbalanced closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    let value = text.unescape()?;
                    if let Some(top) = stack.last_mut() {
                        top.data.push_str(&value);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(top) = stack.last_mut() {
                        top.data.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(ModelError::MalformedDocument(
                "document ended inside an element".to_string(),
            ));
        }
        root.map(Self::new)
            .ok_or_else(|| ModelError::MalformedDocument("no root element".to_string()))
    }

    /// Serialize to XML text; `indent == 0` writes a single line.
    pub fn to_xml_string(&self, indent: usize) -> Result<String> {
        let mut writer = if indent == 0 {
            Writer::new(Vec::new())
        } else {
            Writer::new_with_indent(Vec::new(), b' ', indent)
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_write_error)?;
        write_node(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| ModelError::Xml(format!("invalid utf-8 output: {err}")))
    }
}

fn node_from_start(start: &BytesStart<'_>) -> Result<Node> {
    let mut node = Node::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(ModelError::MalformedDocument(
                "more than one root element".to_string(),
            ))
        }
    }
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if node.children.is_empty() && node.data.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(xml_write_error);
    }
    writer
        .write_event(Event::Start(start))
        .map_err(xml_write_error)?;
    if !node.data.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&node.data)))
            .map_err(xml_write_error)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(xml_write_error)
}

fn xml_write_error(err: impl std::fmt::Display) -> ModelError {
    ModelError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<ddl:ddl xmlns:ddl="ddl">
  <!-- comment -->
  <header><author>me &amp; you</author></header>
  <structs>
    <struct name="A"><element name="x"/></struct>
    <struct name="B"/>
  </structs>
</ddl:ddl>"#;

    #[test]
    fn parse_builds_tree() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let root = doc.root();
        assert_eq!(root.name(), "ddl:ddl");
        assert_eq!(root.find_node("header/author").unwrap().data(), "me & you");
        assert_eq!(root.find_nodes("structs/struct").len(), 2);
        assert_eq!(
            root.find_node("/ddl:ddl/structs/struct/element")
                .and_then(|n| n.attribute("name")),
            Some("x")
        );
        assert!(root.find_node("/other/structs").is_none());
    }

    #[test]
    fn write_then_parse_keeps_structure() {
        let mut root = Node::new("mapping");
        root.create_child("source")
            .set_attribute("name", "in<1>");
        root.create_child("note").set_data("a \"quoted\" text");

        let text = XmlDocument::new(root.clone()).to_xml_string(2).unwrap();
        let parsed = XmlDocument::parse(&text).unwrap();
        assert_eq!(parsed.root(), &root);
    }

    #[test]
    fn unbalanced_documents_fail() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("").is_err());
    }

    #[test]
    fn set_attribute_overwrites() {
        let mut node = Node::new("n").with_attribute("k", "1");
        node.set_attribute("k", "2");
        assert_eq!(node.attribute("k"), Some("2"));
        assert_eq!(node.attributes().count(), 1);
    }
}
