//! Owned DOM built from quick-xml pull events.
//!
//! The extractors navigate packets as small trees: element name, attributes
//! in document order, concatenated text, children in document order. The
//! builder below assembles that tree from the pull parser's event stream and
//! turns every parser complaint into an input error, since fragments come
//! from a lexical splitter that performs no validation of its own.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SieveError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute access for call sites where absence means the packet is
    /// malformed.
    pub fn expect_attribute(&self, key: &str) -> Result<&str> {
        self.attribute(key).ok_or_else(|| {
            SieveError::input(format!(
                "element <{}> is missing attribute \"{key}\"",
                self.name
            ))
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn expect_child(&self, name: &str) -> Result<&Element> {
        self.child(name).ok_or_else(|| {
            SieveError::input(format!(
                "element <{}> has no <{name}> child",
                self.name
            ))
        })
    }
}

fn malformed(err: impl std::fmt::Display) -> SieveError {
    SieveError::input(format!("malformed XML: {err}"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

/// Parse one top-level document into its root element.
pub fn parse_document(text: &str) -> Result<Element> {
    // The reader's default configuration already rejects mismatched end
    // tags, which is the only grammar check the pipeline relies on.
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    let attach = |stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element| {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(el);
            Ok(())
        } else if root.is_none() {
            *root = Some(el);
            Ok(())
        } else {
            Err(malformed("content after the top-level element"))
        }
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let el = element_from_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without an opening tag"))?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(t)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(malformed)?);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e)),
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", unclosed.name)));
    }
    root.ok_or_else(|| malformed("no top-level element"))
}
