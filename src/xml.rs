//! Secure loading of tool-emitted XML reports.
//!
//! Reports are small, so they are materialized into a plain element tree the
//! audits can walk. DOCTYPE declarations are rejected outright and only the
//! predefined/numeric entities are ever expanded, so external-entity tricks
//! in a report cannot reach the filesystem.

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{GateError, Result};

/// One XML element: name, attributes, child elements, and accumulated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute parsed as a number; unparsable values read as absent.
    pub fn attr_usize(&self, name: &str) -> Option<usize> {
        self.attr(name).and_then(|v| v.parse().ok())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn first_child<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children_named(name).next()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parse a report file into its root element. Missing files and malformed
/// markup are processing errors.
pub fn parse_xml(path: &Path) -> Result<Element> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            GateError::missing_report(path, "report file does not exist")
        } else {
            GateError::io(path, e)
        }
    })?;
    parse_bytes(&bytes, path)
}

fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Element> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let element = element_from(&tag, path)?;
                stack.push(element);
            }
            Ok(Event::Empty(tag)) => {
                let element = element_from(&tag, path)?;
                attach(element, &mut stack, &mut root, path)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| GateError::xml(path, "unbalanced closing tag"))?;
                attach(element, &mut stack, &mut root, path)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| GateError::xml(path, e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::DocType(_)) => {
                return Err(GateError::xml(path, "DOCTYPE declarations are not allowed"));
            }
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(GateError::xml(path, e.to_string())),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(GateError::xml(path, "unexpected end of document"));
    }
    root.ok_or_else(|| GateError::xml(path, "document has no root element"))
}

fn element_from(tag: &BytesStart<'_>, path: &Path) -> Result<Element> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| GateError::xml(path, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| GateError::xml(path, e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    element: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    path: &Path,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(GateError::xml(path, "multiple root elements")),
    }
    Ok(())
}
