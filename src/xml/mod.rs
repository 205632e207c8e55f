//! Minimal owned XML tree on top of quick-xml
//!
//! Architecture: Infrastructure Layer - Generic document access for the XML collaborators
//! - Results files, metadata.xml and projects.xml are all read through XmlElement
//! - Only element names, attributes and direct text are kept
//! - Writing is used to merge result documents back into one file

use crate::domain::results::{ReportError, ReportResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// One element of a parsed document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Element name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Parse a whole document and return its root element
    pub fn parse(content: &str) -> ReportResult<Self> {
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                ReportError::xml(format!("at position {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| ReportError::xml(format!("invalid text: {e}")))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| ReportError::xml("unbalanced closing tag"))?;
                    // indentation between child elements is not content
                    if !element.children.is_empty() && element.text.trim().is_empty() {
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ReportError::xml("unexpected end of document"));
        }
        root.ok_or_else(|| ReportError::xml("document has no root element"))
    }

    fn from_start(start: &BytesStart<'_>) -> ReportResult<Self> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));

        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|e| ReportError::xml(format!("invalid attribute: {e}")))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| ReportError::xml(format!("invalid attribute value: {e}")))?;
            element.attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(element)
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with the given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Value of an attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Serialize as a standalone UTF-8 document with declaration
    pub fn to_document(&self) -> ReportResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| ReportError::xml(format!("failed to write declaration: {e}")))?;
        self.write_into(&mut writer)?;

        let mut output = String::from_utf8(writer.into_inner())
            .map_err(|e| ReportError::xml(format!("non UTF-8 output: {e}")))?;
        output.push('\n');
        Ok(output)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> ReportResult<()> {
        let start = BytesStart::new(self.name.as_str())
            .with_attributes(self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if self.text.is_empty() && self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| ReportError::xml(format!("failed to write <{}>: {e}", self.name)));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| ReportError::xml(format!("failed to write <{}>: {e}", self.name)))?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(|e| ReportError::xml(format!("failed to write text: {e}")))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| ReportError::xml(format!("failed to write </{}>: {e}", self.name)))
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> ReportResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(ReportError::xml("multiple root elements")),
    }
    Ok(())
}
