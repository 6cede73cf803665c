//! XML interchange format.
//!
//! Version 0 documents have a bare `<aut>` root and an empty `<name>` per
//! node. Version 1 documents use `<aut type="basic">` and pack the `mode`
//! and `rgrad` annotations into an `<anno>` element. The reader accepts
//! both, and also finds the `<aut>` element when it is nested in a larger
//! document such as the output of `gr1c rg -t tulip`.

use std::fmt::Write;

use log::warn;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Automaton, AutomatonError, NodeId, State};

/// Schema version of the XML interchange format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum XmlVersion {
    /// Plain `<aut>` without annotations.
    V0,
    /// `<aut type="basic">` with `mode` and `rgrad` annotations.
    #[default]
    V1,
}

/// A node while its element is being read.
#[derive(Default)]
struct PartialNode {
    id: Option<usize>,
    anno: Option<(i32, i32)>,
    children: Vec<NodeId>,
    state: State,
}

fn format_error(message: impl Into<String>) -> AutomatonError {
    AutomatonError::Format(message.into())
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, AutomatonError> {
    text.trim()
        .parse()
        .map_err(|_| format_error(format!("invalid {} '{}'", what, text.trim())))
}

fn read_item(e: &BytesStart<'_>) -> Result<(String, i64), AutomatonError> {
    let mut key = None;
    let mut value = None;
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        match attr.key.as_ref() {
            b"key" => key = Some(attr.unescape_value()?.into_owned()),
            b"value" => value = Some(parse_number(&attr.unescape_value()?, "state value")?),
            _ => {}
        }
    }
    match (key, value) {
        (Some(key), Some(value)) => Ok((key, value)),
        _ => Err(format_error("state item without key or value")),
    }
}

impl Automaton {
    /// Read an automaton from an XML document.
    ///
    /// Nodes whose id was already seen are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not well-formed, contains no
    /// `<aut>` element, a node lacks an id, or an edge ends in a missing node.
    pub fn from_xml(xml: &str) -> Result<Self, AutomatonError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut aut = Automaton::new();
        let mut found = false;
        let mut in_aut = false;
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut node: Option<PartialNode> = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    match name.as_slice() {
                        b"aut" if !in_aut => {
                            found = true;
                            in_aut = true;
                        }
                        b"node" if in_aut => node = Some(PartialNode::default()),
                        b"item" => {
                            if let Some(node) = node.as_mut() {
                                let (key, value) = read_item(&e)?;
                                node.state.insert(key, value);
                            }
                        }
                        _ => {}
                    }
                    path.push(name);
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"item" {
                        if let Some(node) = node.as_mut() {
                            let (key, value) = read_item(&e)?;
                            node.state.insert(key, value);
                        }
                    }
                }
                Event::Text(t) => {
                    let (Some(node), Some(tag)) = (node.as_mut(), path.last()) else {
                        continue;
                    };
                    let text = t.unescape()?;
                    match tag.as_slice() {
                        b"id" => node.id = Some(parse_number(&text, "node id")?),
                        b"anno" => {
                            let fields: Vec<&str> = text.split_whitespace().collect();
                            if fields.len() != 2 {
                                return Err(format_error(format!("invalid annotation '{}'", text)));
                            }
                            node.anno = Some((
                                parse_number(fields[0], "mode")?,
                                parse_number(fields[1], "rgrad")?,
                            ));
                        }
                        b"child_list" => {
                            for child in text.split_whitespace() {
                                node.children.push(NodeId(parse_number(child, "child id")?));
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(e) => {
                    path.pop();
                    match e.local_name().as_ref() {
                        b"node" => {
                            if let Some(done) = node.take() {
                                aut.finish_xml_node(done)?;
                            }
                        }
                        b"aut" if in_aut => break,
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !found {
            return Err(format_error("no <aut> element"));
        }
        aut.validate()?;
        Ok(aut)
    }

    fn finish_xml_node(&mut self, partial: PartialNode) -> Result<(), AutomatonError> {
        let id = NodeId(
            partial
                .id
                .ok_or_else(|| format_error("node without <id>"))?,
        );
        if self.contains(id) {
            warn!("Duplicate node {} found; ignoring", id);
            return Ok(());
        }
        let node = self.add_node(id, &partial.state, partial.children);
        if let Some((mode, rgrad)) = partial.anno {
            node.set_mode(mode).set_rgrad(rgrad);
        }
        Ok(())
    }

    /// Write the automaton as an indented XML fragment.
    pub fn to_xml(&self, version: XmlVersion) -> String {
        let mut out = String::new();
        // writing to a string cannot fail
        match version {
            XmlVersion::V0 => out.push_str("<aut>\n"),
            XmlVersion::V1 => out.push_str("<aut type=\"basic\">\n"),
        }
        for (id, node) in self.nodes() {
            out.push_str("  <node>\n");
            match version {
                XmlVersion::V0 => {
                    let _ = writeln!(out, "    <id>{}</id><name></name>", id);
                }
                XmlVersion::V1 => {
                    let _ = writeln!(
                        out,
                        "    <id>{}</id><anno>{} {}</anno>",
                        id,
                        node.mode(),
                        node.rgrad()
                    );
                }
            }
            let children: Vec<String> = node.successors().map(|s| s.to_string()).collect();
            let _ = writeln!(out, "    <child_list>{}</child_list>", children.join(" "));
            out.push_str("    <state>");
            for (var, value) in node.valuation().iter() {
                let _ = write!(
                    out,
                    "<item key=\"{}\" value=\"{}\" />",
                    escape(self.schema.name(var)),
                    value
                );
            }
            out.push_str("</state>\n  </node>\n");
        }
        out.push_str("</aut>\n");
        out
    }
}
