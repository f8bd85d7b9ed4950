//! Parse stage: provider markup into the intermediate document tree
//!
//! The tree mirrors the markup one to one:
//! - an element becomes an object,
//! - its attributes go under `"$"`,
//! - its text goes under `"_"`,
//! - every child element name maps to an array of child values,
//! - an element with neither attributes nor children collapses to its text.
//!
//! The document itself is `{ "<root>": <root value> }`.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::pipeline::error::StageError;

pub const ATTRIBUTES_KEY: &str = "$";
pub const TEXT_KEY: &str = "_";

struct ElementFrame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl ElementFrame {
    fn open(element: &BytesStart) -> Result<Self, StageError> {
        let name = element_name(element)?;
        let mut attributes = Map::new();

        for attr in element.attributes() {
            let attr = attr.map_err(|e| {
                StageError::parse(format!("Malformed attribute on <{name}>: {e}"))
            })?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| StageError::parse(format!("Invalid UTF-8 in attribute name: {e}")))?;
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|e| StageError::parse(format!("Invalid UTF-8 in attribute value: {e}")))?;
            let value = unescape(raw)
                .map_err(|e| StageError::parse(format!("Bad escape in attribute '{key}': {e}")))?;
            attributes.insert(key.to_string(), Value::String(value.into_owned()));
        }

        Ok(Self {
            name,
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(siblings)) => siblings.push(value),
            _ => {
                self.children.insert(name, Value::Array(vec![value]));
            }
        }
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();

        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(text.to_string()));
        }

        let mut object = Map::new();
        if !self.attributes.is_empty() {
            object.insert(ATTRIBUTES_KEY.to_string(), Value::Object(self.attributes));
        }
        if !text.is_empty() {
            object.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
        }
        object.extend(self.children);
        (self.name, Value::Object(object))
    }
}

fn element_name(element: &BytesStart) -> Result<String, StageError> {
    std::str::from_utf8(element.name().as_ref())
        .map(str::to_string)
        .map_err(|e| StageError::parse(format!("Invalid UTF-8 in XML element name: {e}")))
}

/// Parse provider markup into the intermediate tree
pub fn parse_document(content: &str) -> Result<Value, StageError> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<ElementFrame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(StageError::parse("Multiple root elements"));
                }
                stack.push(ElementFrame::open(e)?);
            }

            Ok(Event::Empty(ref e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(StageError::parse("Multiple root elements"));
                }
                let (name, value) = ElementFrame::open(e)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }

            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| StageError::parse("Closing tag without matching opening tag"))?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }

            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(&e)
                    .map_err(|e| StageError::parse(format!("Invalid UTF-8 in text: {e}")))?;
                let text = unescape(raw)
                    .map_err(|e| StageError::parse(format!("Bad escape in text: {e}")))?;
                push_text(&mut stack, &text)?;
            }

            Ok(Event::GeneralRef(e)) => {
                let name = std::str::from_utf8(&e)
                    .map_err(|e| StageError::parse(format!("Invalid UTF-8 in entity: {e}")))?;
                let entity = format!("&{name};");
                let text = unescape(&entity)
                    .map_err(|e| StageError::parse(format!("Unknown entity {entity}: {e}")))?;
                push_text(&mut stack, &text)?;
            }

            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| StageError::parse(format!("Invalid UTF-8 in CDATA: {e}")))?;
                push_text(&mut stack, text)?;
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(StageError::parse(format!(
                    "XML parsing error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }

            _ => {} // Declarations, comments, processing instructions, doctype
        }
    }

    if let Some(open) = stack.last() {
        return Err(StageError::parse(format!(
            "Unexpected end of document, <{}> is not closed",
            open.name
        )));
    }

    let (name, value) = root.ok_or_else(|| StageError::parse("Document has no root element"))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn push_text(stack: &mut [ElementFrame], text: &str) -> Result<(), StageError> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(StageError::parse("Text content outside of the root element")),
    }
}

/// Count the `<element>` children of the root, e.g. the `pase` entries
pub fn count_root_children(tree: &Value, element: &str) -> usize {
    tree.as_object()
        .and_then(|doc| doc.values().next())
        .and_then(|root| root.get(element))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
