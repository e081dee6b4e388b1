//! Batch splitting: one government-portal export often bundles many NFSe
//! documents in a single XML. This splits the batch into one file per
//! note, re-serialized standalone, ready to be re-zipped with
//! [`crate::archive::zip_files`].

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use roxmltree::{Document, Node};

use crate::core::FiscalError;
use crate::xmlquery::{local_name_eq, path_text};

/// Note-wrapper tags recognized when splitting (lowercase local names).
/// The ABRASF pair plus the vendor-specific wrappers seen in municipal
/// exports. Only outermost matches are split, so a `CompNfse` wrapping an
/// `Nfse` yields one note, not two.
const BATCH_NOTE_TAGS: &[&str] = &["compnfse", "nfse", "nfdok", "reg20item"];

/// Split a batch document into `(file_name, xml_bytes)` pairs.
///
/// File names are `{prefix}{number}.xml` where the number comes from the
/// note's `InfNfse/Numero` (any namespace), falling back to a 1-based
/// index. Returns an empty vec when the document contains no recognizable
/// note wrapper below the root; the input is then not a batch.
pub fn split_batch(xml: &[u8], prefix: &str) -> Result<Vec<(String, Vec<u8>)>, FiscalError> {
    let text = String::from_utf8_lossy(xml).into_owned();
    let doc = Document::parse(&text)
        .map_err(|e| FiscalError::Xml(format!("failed to parse batch XML: {e}")))?;
    let root = doc.root_element();

    let notes: Vec<Node> = root
        .descendants()
        .filter(|n| n.id() != root.id() && is_note_wrapper(*n))
        .filter(|n| !n.ancestors().skip(1).any(is_note_wrapper))
        .collect();

    let mut output = Vec::with_capacity(notes.len());
    for (index, note) in notes.iter().enumerate() {
        let number = path_text(*note, &["InfNfse", "Numero"])
            .unwrap_or_else(|| format!("{}", index + 1));
        let name = format!("{prefix}{number}.xml");
        output.push((name, serialize_subtree(*note)?));
    }
    Ok(output)
}

fn is_note_wrapper(node: Node) -> bool {
    BATCH_NOTE_TAGS
        .iter()
        .any(|tag| local_name_eq(node, tag))
}

/// Re-serialize a subtree as a standalone document.
///
/// Tags are written with their local names; each element carries a default
/// `xmlns` declaration whenever its namespace differs from its parent's,
/// so namespace semantics survive extraction from the wrapper.
fn serialize_subtree(node: Node) -> Result<Vec<u8>, FiscalError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_io)?;
    write_element(&mut writer, node, None)?;
    Ok(writer.into_inner().into_inner())
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    node: Node,
    parent_ns: Option<&str>,
) -> Result<(), FiscalError> {
    let name = node.tag_name().name().to_string();
    let ns = node.tag_name().namespace();

    let mut start = BytesStart::new(name.as_str());
    if ns != parent_ns {
        start.push_attribute(("xmlns", ns.unwrap_or("")));
    }
    for attr in node.attributes() {
        start.push_attribute((attr.name(), attr.value()));
    }
    writer.write_event(Event::Start(start)).map_err(xml_io)?;

    for child in node.children() {
        if child.is_element() {
            write_element(writer, child, ns)?;
        } else if child.is_text() {
            if let Some(text) = child.text() {
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(xml_io)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(xml_io)?;
    Ok(())
}

fn xml_io(e: std::io::Error) -> FiscalError {
    FiscalError::Xml(format!("XML write error: {e}"))
}
