//! Namespace-stripping XML parser.
//!
//! TEI produced by GROBID puts every element in the
//! `http://www.tei-c.org/ns/1.0` namespace, and some services emit a `tei:`
//! prefix on top. Selectors are written against bare local names, so every
//! element tag and attribute key is reduced to its local part while the tree
//! is built, and `xmlns` declarations are dropped.

use crate::error::PaperChemError;
use crate::markup::tree::{Element, Node};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// Parse raw markup into a namespace-free [`Element`] tree.
///
/// # Errors
/// * [`PaperChemError::MalformedMarkup`] when the XML is broken before any
///   root element was opened.
/// * [`PaperChemError::EmptyDocument`] when there is no root element at all.
///
/// Syntax errors inside the root are recovered: open elements are closed
/// where the error occurred and a warning is logged.
pub fn normalize(raw: &str) -> Result<Element, PaperChemError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(open_element(&e)),
            Ok(Event::Empty(e)) => {
                let el = open_element(&e);
                attach(&mut stack, &mut root, el);
            }
            Ok(Event::End(_)) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    push_text(parent, text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, String::from_utf8_lossy(&c.into_inner()).into_owned());
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctype.
            Ok(_) => {}
            Err(e) => {
                let position = reader.buffer_position() as u64;
                if stack.is_empty() && root.is_none() {
                    return Err(PaperChemError::MalformedMarkup {
                        position,
                        detail: e.to_string(),
                    });
                }
                warn!("Recovering from malformed markup at byte {}: {}", position, e);
                break;
            }
        }
    }

    while let Some(el) = stack.pop() {
        attach(&mut stack, &mut root, el);
    }

    let mut root = root.ok_or(PaperChemError::EmptyDocument)?;
    root.renumber();
    debug!("Normalized markup: root <{}>", root.name);
    Ok(root)
}

fn open_element(e: &BytesStart<'_>) -> Element {
    let name = match std::str::from_utf8(e.local_name().as_ref()) {
        Ok(local) if !local.is_empty() => local.to_string(),
        _ => {
            let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
            warn!("Element {} has no name.", raw);
            raw
        }
    };

    let mut el = Element::new(name);
    for attr in e.attributes().with_checks(false) {
        match attr {
            Ok(a) => {
                if a.key.as_namespace_binding().is_some() {
                    continue;
                }
                let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
                let value = a
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
                el.attributes.push((key, value));
            }
            Err(err) => warn!("Skipping malformed attribute on <{}>: {}", el.name, err),
        }
    }
    el
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(el));
    } else if root.is_none() {
        *root = Some(el);
    } else {
        warn!("Ignoring second top-level element <{}>", el.name);
    }
}

fn push_text(parent: &mut Element, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(prev)) = parent.children.last_mut() {
        prev.push_str(&text);
    } else {
        parent.children.push(Node::Text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_namespace() {
        let xml = r#"<?xml version="1.0"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><fileDesc/></teiHeader></TEI>"#;
        let root = normalize(xml).unwrap();
        assert_eq!(root.name, "TEI");
        assert!(root.attributes.is_empty());
        let header = root.child_elements().next().unwrap();
        assert_eq!(header.name, "teiHeader");
    }

    #[test]
    fn strips_prefixes_on_tags_and_attributes() {
        let xml = r#"<tei:TEI xmlns:tei="http://www.tei-c.org/ns/1.0"
            xmlns:xml="http://www.w3.org/XML/1998/namespace">
            <tei:figure xml:id="fig_0"/></tei:TEI>"#;
        let root = normalize(xml).unwrap();
        assert_eq!(root.name, "TEI");
        let fig = root.child_elements().next().unwrap();
        assert_eq!(fig.name, "figure");
        assert_eq!(fig.attr("id"), Some("fig_0"));
    }

    #[test]
    fn unescapes_text_and_keeps_cdata() {
        let xml = "<p>H<hi>2</hi>O &amp; NaCl<![CDATA[ <raw> ]]></p>";
        let root = normalize(xml).unwrap();
        assert_eq!(root.text(), "H2O & NaCl <raw> ");
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(matches!(normalize(""), Err(PaperChemError::EmptyDocument)));
        assert!(matches!(
            normalize("<?xml version=\"1.0\"?>\n<!-- nothing -->"),
            Err(PaperChemError::EmptyDocument)
        ));
    }

    #[test]
    fn truncated_document_is_recovered() {
        let root = normalize("<TEI><text><p>benzene").unwrap();
        assert_eq!(root.name, "TEI");
        assert_eq!(root.text(), "benzene");
    }

    #[test]
    fn elements_are_numbered_in_document_order() {
        let root = normalize("<a><b/><c><d/></c></a>").unwrap();
        let orders: Vec<usize> = root.descendants().iter().map(|e| e.order()).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }
}
