//! Owned, mutable XML tree for the export feed.
//!
//! The tree keeps what is needed to write the feed back out faithfully enough
//! for re-import: qualified element names, attribute order, text, CDATA,
//! comments, processing instructions and the XML declaration. Entity escaping
//! is normalized on output.

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// A node of the feed tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data, unescaped
    Text(String),
    /// CDATA section content
    CData(String),
    /// Comment body
    Comment(String),
    /// Processing instruction body (without `<?` and `?>`)
    ProcessingInstruction(String),
    /// DOCTYPE body
    DocType(String),
}

/// An element with its qualified name, attributes and children
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written in the source (e.g. `"app:control"`)
    pub name: String,
    /// Attributes in source order, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Value of the attribute whose local name is `name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_part(k) == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Direct child elements with the given local name
    pub fn elements_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == local)
    }

    /// First direct child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Mutable access to the first direct child element with the given local name
    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) if e.local_name() == local => Some(e),
            _ => None,
        })
    }

    /// Concatenated text and CDATA of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all text/CDATA children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, XmlNode::Text(_) | XmlNode::CData(_)));
        self.children.push(XmlNode::Text(text.into()));
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// The parsed export feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedDocument {
    /// Whether the source started with an XML declaration
    pub has_declaration: bool,
    /// Comments, processing instructions and DOCTYPE before the root element
    pub prolog: Vec<XmlNode>,
    /// Document element (the Atom `feed`)
    pub root: XmlElement,
}

impl FeedDocument {
    /// Parse an XML document from bytes
    ///
    /// # Errors
    /// Returns [`Error::Xml`] for malformed XML and [`Error::Other`] for
    /// non-UTF-8 input or a document without a root element.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(input)
            .map_err(|e| Error::Other(format!("feed is not valid UTF-8: {}", e)))?;
        let mut reader = Reader::from_str(text);

        let mut has_declaration = false;
        let mut prolog = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let node = match reader.read_event()? {
                Event::Eof => break,
                Event::Decl(_) => {
                    has_declaration = true;
                    continue;
                }
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                    continue;
                }
                Event::End(_) => {
                    let Some(done) = stack.pop() else {
                        return Err(Error::Other("unbalanced closing tag in feed".into()));
                    };
                    XmlNode::Element(done)
                }
                Event::Empty(start) => XmlNode::Element(element_from_start(&start)?),
                Event::Text(t) => XmlNode::Text(t.unescape()?.into_owned()),
                Event::CData(c) => XmlNode::CData(utf8(&c)?),
                Event::Comment(c) => XmlNode::Comment(utf8(&c)?),
                Event::PI(pi) => XmlNode::ProcessingInstruction(utf8(&pi)?),
                Event::DocType(d) => XmlNode::DocType(utf8(&d)?),
            };

            match (stack.last_mut(), node) {
                (Some(parent), node) => parent.children.push(node),
                (None, XmlNode::Element(element)) => {
                    if root.is_some() {
                        return Err(Error::Other("feed has more than one root element".into()));
                    }
                    root = Some(element);
                }
                // Whitespace between prolog items is dropped
                (None, XmlNode::Text(t)) if t.trim().is_empty() => {}
                (None, other) => {
                    if root.is_none() {
                        prolog.push(other);
                    }
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::Other("feed ended inside an open element".into()));
        }
        let root = root.ok_or_else(|| Error::Other("feed has no root element".into()))?;
        Ok(Self {
            has_declaration,
            prolog,
            root,
        })
    }

    /// Serialize the document back to UTF-8 XML
    ///
    /// # Errors
    /// Returns [`Error::Xml`] if the writer fails.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if self.has_declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            writer.get_mut().push(b'\n');
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
            writer.get_mut().push(b'\n');
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| Error::Other(format!("invalid UTF-8 in feed: {}", e)))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = utf8(start.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(e) => write_element(writer, e)?,
        XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        XmlNode::CData(c) => writer.write_event(Event::CData(BytesCData::new(c.as_str())))?,
        XmlNode::Comment(c) => writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))?,
        XmlNode::ProcessingInstruction(pi) => {
            writer.write_event(Event::PI(BytesText::from_escaped(pi.as_str())))?
        }
        XmlNode::DocType(d) => writer.write_event(Event::DocType(BytesText::from_escaped(d.as_str())))?,
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
