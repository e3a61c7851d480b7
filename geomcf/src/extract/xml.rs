use crate::error::{GeoMcfError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// An XML element with namespace prefixes stripped from element and
/// attribute names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parse a document into its root element.
    pub fn parse(xml: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        GeoMcfError::Extraction("unbalanced closing tag".into())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(GeoMcfError::Extraction(format!(
                "unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }

        root.ok_or_else(|| GeoMcfError::Extraction("document has no root element".into()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Resolve a `/`-separated path of element names below `root`. A final
/// `@name` segment selects an attribute. Returns every non-empty match in
/// document order.
pub fn resolve_path(root: &XmlElement, path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (attribute, elements) = match segments.split_last() {
        Some((last, rest)) if last.starts_with('@') => (Some(&last[1..]), rest),
        _ => (None, segments.as_slice()),
    };

    let mut current: Vec<&XmlElement> = vec![root];
    for segment in elements {
        current = current
            .into_iter()
            .flat_map(|element| element.children_named(segment))
            .collect();
        if current.is_empty() {
            return Vec::new();
        }
    }

    let values = current.into_iter().filter_map(|element| match attribute {
        Some(name) => element.attribute(name).map(str::trim),
        None => Some(element.text.trim()),
    });

    values
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn element_from_start(start: &BytesStart) -> Result<XmlElement> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Default::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(GeoMcfError::Extraction(
                "document has more than one root element".into(),
            ))
        }
    }
    Ok(())
}
