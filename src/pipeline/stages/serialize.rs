//! Serialize stage: XMLTV-shaped tree into XMLTV markup
//!
//! Inverse of the parse convention: `"$"` holds attributes, `"_"` text,
//! and every other key is a child element (arrays repeat the element).

use quick_xml::escape::escape;
use serde_json::{Map, Value};

use super::parse::{ATTRIBUTES_KEY, TEXT_KEY};
use crate::pipeline::error::StageError;

pub const XMLTV_DTD: &str = "xmltv.dtd";

/// Encode the tree as an XML document with a DOCTYPE pointing at `dtd`
pub fn serialize_document(tree: &Value, dtd: &str) -> Result<String, StageError> {
    let document = tree
        .as_object()
        .ok_or_else(|| StageError::serialize("Document is not an object"))?;

    let mut entries = document.iter();
    let (root_name, root_value) = match (entries.next(), entries.next()) {
        (Some(root), None) => root,
        _ => {
            return Err(StageError::serialize(format!(
                "Document must have exactly one root element, found {}",
                document.len()
            )));
        }
    };
    if root_value.is_array() {
        return Err(StageError::serialize("Root element cannot be a list"));
    }

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<!DOCTYPE {root_name} SYSTEM \"{dtd}\">\n"));
    write_element(&mut xml, root_name, root_value, 0)?;
    Ok(xml)
}

fn write_element(xml: &mut String, name: &str, value: &Value, depth: usize) -> Result<(), StageError> {
    validate_name(name)?;
    let indent = "  ".repeat(depth);

    let object = match value {
        Value::Object(object) => object,
        Value::Array(_) => {
            return Err(StageError::serialize(format!(
                "Nested list directly inside <{name}>"
            )));
        }
        Value::Null => {
            xml.push_str(&format!("{indent}<{name}/>\n"));
            return Ok(());
        }
        scalar => {
            let text = scalar_text(name, scalar)?;
            if text.is_empty() {
                xml.push_str(&format!("{indent}<{name}/>\n"));
            } else {
                xml.push_str(&format!("{indent}<{name}>{}</{name}>\n", escape(text.as_str())));
            }
            return Ok(());
        }
    };

    let attributes = match object.get(ATTRIBUTES_KEY) {
        Some(Value::Object(attributes)) => render_attributes(name, attributes)?,
        Some(_) => {
            return Err(StageError::serialize(format!(
                "Attributes of <{name}> are not an object"
            )));
        }
        None => String::new(),
    };
    let text = match object.get(TEXT_KEY) {
        Some(value) => scalar_text(name, value)?,
        None => String::new(),
    };
    let children: Vec<(&String, &Value)> = object
        .iter()
        .filter(|(key, _)| key.as_str() != ATTRIBUTES_KEY && key.as_str() != TEXT_KEY)
        .collect();

    if children.is_empty() {
        if text.is_empty() {
            xml.push_str(&format!("{indent}<{name}{attributes}/>\n"));
        } else {
            xml.push_str(&format!(
                "{indent}<{name}{attributes}>{}</{name}>\n",
                escape(text.as_str())
            ));
        }
        return Ok(());
    }

    xml.push_str(&format!("{indent}<{name}{attributes}>\n"));
    if !text.is_empty() {
        xml.push_str(&format!("{indent}  {}\n", escape(text.as_str())));
    }
    for (child_name, child_value) in children {
        match child_value {
            Value::Array(items) => {
                for item in items {
                    write_element(xml, child_name, item, depth + 1)?;
                }
            }
            other => write_element(xml, child_name, other, depth + 1)?,
        }
    }
    xml.push_str(&format!("{indent}</{name}>\n"));
    Ok(())
}

fn render_attributes(element: &str, attributes: &Map<String, Value>) -> Result<String, StageError> {
    let mut rendered = String::new();
    for (key, value) in attributes {
        validate_name(key)?;
        let text = scalar_text(element, value)?;
        rendered.push_str(&format!(" {key}=\"{}\"", escape(text.as_str())));
    }
    Ok(rendered)
}

fn scalar_text(element: &str, value: &Value) -> Result<String, StageError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(StageError::serialize(format!(
            "Non-scalar text or attribute value in <{element}>"
        ))),
    }
}

fn validate_name(name: &str) -> Result<(), StageError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
    if valid_start && valid_rest && name != TEXT_KEY {
        Ok(())
    } else {
        Err(StageError::serialize(format!("Invalid XML name '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::parse::parse_document;
    use serde_json::json;

    #[test]
    fn test_serialize_xmltv_layout() {
        let tree = json!({
            "tv": {
                "$": {"generator-info-name": "movistar-xmltv"},
                "channel": [
                    {"$": {"id": "TVE"}, "display-name": [{"$": {"lang": "es"}, "_": "La 1"}]}
                ],
                "programme": [
                    {
                        "$": {"start": "20261016060000 +0200", "stop": "20261016070000 +0200", "channel": "TVE"},
                        "title": [{"$": {"lang": "es"}, "_": "Tom & Jerry"}]
                    }
                ]
            }
        });

        let xml = serialize_document(&tree, XMLTV_DTD).unwrap();
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="movistar-xmltv">
  <channel id="TVE">
    <display-name lang="es">La 1</display-name>
  </channel>
  <programme start="20261016060000 +0200" stop="20261016070000 +0200" channel="TVE">
    <title lang="es">Tom &amp; Jerry</title>
  </programme>
</tv>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_serialize_output_parses_back() {
        let tree = json!({
            "tv": {
                "programme": [
                    {"$": {"start": "20261016060000 +0200", "channel": "A\"B"}, "title": ["<x>"]},
                    {"$": {"start": "20261016070000 +0200", "channel": "C"}, "title": ["y"]}
                ]
            }
        });
        let xml = serialize_document(&tree, XMLTV_DTD).unwrap();
        let reparsed = parse_document(&xml).unwrap();
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn test_serialize_rejects_multiple_roots() {
        let err = serialize_document(&json!({"a": "", "b": ""}), XMLTV_DTD).unwrap_err();
        assert!(matches!(err, StageError::Serialize { .. }));
    }

    #[test]
    fn test_serialize_rejects_non_scalar_attribute() {
        let tree = json!({"tv": {"$": {"start": ["x"]}}});
        assert!(matches!(
            serialize_document(&tree, XMLTV_DTD),
            Err(StageError::Serialize { .. })
        ));
    }

    #[test]
    fn test_serialize_rejects_invalid_names() {
        let tree = json!({"tv": {"bad name": "x"}});
        assert!(matches!(
            serialize_document(&tree, XMLTV_DTD),
            Err(StageError::Serialize { .. })
        ));
    }
}
