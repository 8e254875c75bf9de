//! XML response mapping.
//!
//! The service answers with
//!
//! ```text
//! <results>
//!   <record>
//!     <field><name>col</name><value>val</value></field>
//!   </record>
//! </results>
//! ```
//!
//! Records are collected from anywhere in the document, fields only from the
//! direct children of each record. Within a field the first `name` and first
//! `value` children are used; a later field with the same name overwrites an
//! earlier one.
//!
//! Bodies arrive as bytes. A byte-order mark wins, then the `encoding` of the
//! XML declaration, then UTF-8. Bytes that do not decode are an XML error.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use roxmltree::{Document, Node, ParsingOptions};

use crate::error::AtomicsError;
use crate::record::Attributes;

/// Decode a response body to text.
pub fn decode_body(body: &[u8]) -> Result<Cow<'_, str>, AtomicsError> {
    let (encoding, bytes) = match Encoding::for_bom(body) {
        Some((encoding, bom_len)) => (encoding, &body[bom_len..]),
        None => (declared_encoding(body)?.unwrap_or(UTF_8), body),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| AtomicsError::Xml(format!("body is not valid {}", encoding.name())))
}

/// The encoding named in a leading `<?xml ... ?>` declaration, if any.
fn declared_encoding(body: &[u8]) -> Result<Option<&'static Encoding>, AtomicsError> {
    let Some(decl) = body.strip_prefix(b"<?xml") else {
        return Ok(None);
    };
    let Some(end) = decl.windows(2).position(|w| w == b"?>") else {
        return Ok(None);
    };
    let decl = &decl[..end];
    let Some(at) = decl.windows(8).position(|w| w == b"encoding") else {
        return Ok(None);
    };

    let rest = decl[at + 8..].trim_ascii_start();
    let label = rest
        .strip_prefix(b"=")
        .map(<[u8]>::trim_ascii_start)
        .and_then(|v| {
            let quote = *v.first()?;
            if quote != b'"' && quote != b'\'' {
                return None;
            }
            let v = &v[1..];
            v.iter().position(|&b| b == quote).map(|close| &v[..close])
        })
        .ok_or_else(|| AtomicsError::Xml("malformed encoding declaration".to_string()))?;

    Encoding::for_label(label).map(Some).ok_or_else(|| {
        AtomicsError::Xml(format!("unsupported encoding {}", String::from_utf8_lossy(label)))
    })
}

/// Map every `record` element in `body` to its attributes, in document order.
pub fn parse_attributes(body: &str) -> Result<Vec<Attributes>, AtomicsError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(body, options)?;

    doc.descendants()
        .filter(|n| n.has_tag_name("record"))
        .enumerate()
        .map(|(index, record)| record_attributes(index, record))
        .collect()
}

fn record_attributes(index: usize, record: Node<'_, '_>) -> Result<Attributes, AtomicsError> {
    let mut attributes = Attributes::new();
    for (position, field) in child_elements(record, "field").enumerate() {
        let name = child_text(field, "name").ok_or_else(|| {
            AtomicsError::MalformedResponse(format!("record {index}, field {position}: missing <name>"))
        })?;
        let value = child_text(field, "value").ok_or_else(|| {
            AtomicsError::MalformedResponse(format!("record {index}, field {position}: missing <value>"))
        })?;
        attributes.insert(name, value);
    }
    Ok(attributes)
}

fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(tag))
}

/// Concatenated text content of the first `tag` child, if there is one.
fn child_text(node: Node<'_, '_>, tag: &'static str) -> Option<String> {
    let child = child_elements(node, tag).next()?;
    Some(
        child
            .descendants()
            .filter(|d| d.is_text())
            .filter_map(|d| d.text())
            .collect(),
    )
}
