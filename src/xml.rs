//! Minimal namespace-aware XML element tree.
//!
//! Built on quick-xml's pull reader. Just enough to walk WSDL documents and
//! SOAP request bodies: qualified names, in-scope namespace bindings,
//! attributes and concatenated text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// A name resolved against the in-scope namespace bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub children: Vec<Element>,
    pub text: String,
    attributes: Vec<(String, String)>,
    // Every binding in scope at this element; "" is the default namespace.
    scope: BTreeMap<String, String>,
}

impl Element {
    /// Parse a complete document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let element = Element::open(&start, stack.last())?;
                    stack.push(element);
                }
                Ok(Event::Empty(start)) => {
                    let element = Element::open(&start, stack.last())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    match stack.last_mut() {
                        Some(current) => current.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(XmlError::Malformed(
                                "text outside of the root element".to_string(),
                            ))
                        }
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(XmlError::Malformed(e.to_string())),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.qualified_name()));
        }
        root.ok_or(XmlError::NoRoot)
    }

    fn open(start: &BytesStart<'_>, parent: Option<&Element>) -> Result<Element, XmlError> {
        let mut scope = parent.map(|p| p.scope.clone()).unwrap_or_default();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| XmlError::Malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| XmlError::Malformed(e.to_string()))?
                .into_owned();
            if key == "xmlns" {
                scope.insert(String::new(), value.clone());
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.insert(prefix.to_string(), value.clone());
            }
            attributes.push((key, value));
        }

        let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let (prefix, local_name) = split_qname(&raw_name);
        let namespace = scope.get(prefix.unwrap_or("")).cloned();

        Ok(Element {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace,
            children: Vec::new(),
            text: String::new(),
            attributes,
            scope,
        })
    }

    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Attribute value by its name as written (e.g. `name`, `soap:action`).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.local_name == local)
    }

    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name == local)
    }

    /// This element and every descendant, in document order.
    pub fn walk(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut pending = vec![self];
        while let Some(element) = pending.pop() {
            out.push(element);
            pending.extend(element.children.iter().rev());
        }
        out
    }

    /// Follow a `/`-separated path of local names below this element.
    pub fn find_path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Resolve a prefixed value such as `tns:Foo` against this element's scope.
    pub fn resolve_qname(&self, value: &str) -> QName {
        let (prefix, local) = split_qname(value.trim());
        QName {
            namespace: self.scope.get(prefix.unwrap_or("")).cloned(),
            local: local.to_string(),
        }
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Malformed("more than one root element".to_string()));
    }
    *root = Some(element);
    Ok(())
}

/// Split `prefix:local` into its parts.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}
