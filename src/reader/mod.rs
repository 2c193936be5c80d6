//! Reading search engine descriptions from OpenSearch documents.
//!
//! [`read`] walks an OpenSearch 1.1 description document with a pull-based
//! XML cursor and populates a fresh [`SearchEngine`], applying the format's
//! defensive rules: unrecognized elements are skipped whole, malformed
//! fragments are dropped without aborting the document, and repeated `Url`
//! elements of the same type keep the first occurrence.
//!
//! For the document format see:
//! <http://www.opensearch.org/Specifications/OpenSearch/1.1/Draft_4#OpenSearch_description_document>

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{Parameters, SEARCH_URL_TYPE, SUGGESTIONS_URL_TYPE, SearchEngine};

/// Required namespace of the description document's root element.
pub const OPENSEARCH_NAMESPACE: &str = "http://a9.com/-/spec/opensearch/1.1/";

const ROOT_TAG: &[u8] = b"OpenSearchDescription";

/// Result type alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Structural failures while reading a description document.
///
/// Semantic incompleteness (missing name or search template) is not an
/// error; it only shows up as [`SearchEngine::is_valid`] returning false.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The root element is not `OpenSearchDescription` in the OpenSearch 1.1
    /// namespace.
    #[error("the document is not an OpenSearch 1.1 description")]
    NotOpenSearch,

    /// Input ended before the description document was complete.
    #[error("unexpected end of input inside the description document")]
    UnexpectedEof,

    /// The underlying XML was malformed.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Outcome of reading a description document: the populated engine plus the
/// structural error, if one occurred.
///
/// An engine is always produced, even on error; how much of it got filled in
/// before the failure is judged separately with
/// [`SearchEngine::is_valid`].
#[derive(Debug)]
pub struct ParsedDescription {
    pub engine: SearchEngine,
    pub error: Option<ReaderError>,
}

/// Reads an OpenSearch description document from `input` into a fresh
/// [`SearchEngine`].
pub fn read(input: impl BufRead) -> ParsedDescription {
    let mut reader = NsReader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut engine = SearchEngine::new();
    let error = read_document(&mut reader, &mut engine).err();
    if let Some(error) = &error {
        warn!(%error, "description document rejected");
    }

    ParsedDescription { engine, error }
}

fn read_document<R: BufRead>(
    reader: &mut NsReader<R>,
    engine: &mut SearchEngine,
) -> ReaderResult<()> {
    let mut buf = Vec::new();

    // Advance to the root element and verify tag name and namespace.
    loop {
        buf.clear();
        let (resolve, event) = reader.read_resolved_event_into(&mut buf)?;
        match event {
            Event::Start(element) => {
                check_root(&resolve, &element)?;
                break;
            }
            Event::Empty(element) => {
                // A self-closing root carries no data; the engine stays empty.
                check_root(&resolve, &element)?;
                return Ok(());
            }
            Event::Eof => return Err(ReaderError::UnexpectedEof),
            _ => {}
        }
    }

    // Immediate children of the root: recognized tags dispatch, everything
    // else is skipped whole.
    loop {
        buf.clear();
        let (_, event) = reader.read_resolved_event_into(&mut buf)?;
        match event {
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(ReaderError::UnexpectedEof),
            Event::Start(element) => match element.local_name().as_ref() {
                b"ShortName" => engine.set_name(read_element_text(reader)?),
                b"Description" => engine.set_description(read_element_text(reader)?),
                b"Url" => read_url(reader, &element, true, engine)?,
                b"Image" => engine.set_image_url(read_element_text(reader)?),
                b"Tags" => engine.set_tags(split_tags(&read_element_text(reader)?)),
                other => {
                    debug!(
                        element = %String::from_utf8_lossy(other),
                        "skipping unrecognized element"
                    );
                    skip_subtree(reader)?;
                }
            },
            Event::Empty(element) => match element.local_name().as_ref() {
                b"ShortName" => engine.set_name(String::new()),
                b"Description" => engine.set_description(String::new()),
                b"Url" => read_url(reader, &element, false, engine)?,
                b"Image" => engine.set_image_url(String::new()),
                b"Tags" => engine.set_tags(Vec::new()),
                _ => {}
            },
            _ => {}
        }
    }
}

fn check_root(resolve: &ResolveResult, element: &BytesStart) -> ReaderResult<()> {
    if element.local_name().as_ref() != ROOT_TAG {
        return Err(ReaderError::NotOpenSearch);
    }
    match resolve {
        ResolveResult::Bound(ns) if ns.0 == OPENSEARCH_NAMESPACE.as_bytes() => Ok(()),
        _ => Err(ReaderError::NotOpenSearch),
    }
}

/// Handles one `Url` element. `has_children` is false for the self-closing
/// form, which cannot carry `Param` children and needs no subtree walk.
fn read_url<R: BufRead>(
    reader: &mut NsReader<R>,
    element: &BytesStart,
    has_children: bool,
    engine: &mut SearchEngine,
) -> ReaderResult<()> {
    let mut kind = attribute(element, "type")?;
    let template = attribute(element, "template")?;
    let method = attribute(element, "method")?;

    if kind.is_empty() || kind == "application/xhtml+xml" {
        kind = String::from(SEARCH_URL_TYPE);
    }

    // A Url without a template is useless; drop it, subtree included.
    if template.is_empty() {
        debug!("dropping Url element without a template");
        if has_children {
            skip_subtree(reader)?;
        }
        return Ok(());
    }

    // First-wins per type: the slot check must still consume the element's
    // subtree to keep the walk synchronized.
    let slot_filled = (kind == SUGGESTIONS_URL_TYPE
        && !engine.suggestions_url_template().is_empty())
        || (kind == SEARCH_URL_TYPE && !engine.search_url_template().is_empty());
    if slot_filled {
        debug!(url_type = %kind, "ignoring repeated Url element");
        if has_children {
            skip_subtree(reader)?;
        }
        return Ok(());
    }

    let mut parameters = Parameters::new();
    if has_children {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let (_, event) = reader.read_resolved_event_into(&mut buf)?;
            match event {
                Event::End(_) => break,
                Event::Eof => return Err(ReaderError::UnexpectedEof),
                Event::Start(child) => {
                    if matches!(child.local_name().as_ref(), b"Param" | b"Parameter") {
                        read_parameter(&child, &mut parameters)?;
                    }
                    skip_subtree(reader)?;
                }
                Event::Empty(child) => {
                    if matches!(child.local_name().as_ref(), b"Param" | b"Parameter") {
                        read_parameter(&child, &mut parameters)?;
                    }
                }
                _ => {}
            }
        }
    }

    if kind == SUGGESTIONS_URL_TYPE {
        engine.set_suggestions_url_template(template);
        engine.set_suggestions_parameters(parameters);
        engine.set_suggestions_method(&method);
    } else if kind == SEARCH_URL_TYPE {
        engine.set_search_url_template(template);
        engine.set_search_parameters(parameters);
        engine.set_search_method(&method);
    } else {
        debug!(url_type = %kind, "discarding Url element of unrecognized type");
    }

    Ok(())
}

fn read_parameter(element: &BytesStart, parameters: &mut Parameters) -> ReaderResult<()> {
    let key = attribute(element, "name")?;
    let value = attribute(element, "value")?;

    // A parameter needs both halves; drop the entry, keep its siblings.
    if key.is_empty() || value.is_empty() {
        debug!("dropping parameter without both name and value");
        return Ok(());
    }

    parameters.push((key, value));
    Ok(())
}

/// Collects the text content of the current element, ignoring any nested
/// markup, and consumes through its end tag.
fn read_element_text<R: BufRead>(reader: &mut NsReader<R>) -> ReaderResult<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let (_, event) = reader.read_resolved_event_into(&mut buf)?;
        match event {
            Event::Text(fragment) => text.push_str(&fragment.unescape().map_err(quick_xml::Error::from)?),
            Event::CData(fragment) => text.push_str(&String::from_utf8_lossy(&fragment)),
            Event::Start(_) => skip_subtree(reader)?,
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(ReaderError::UnexpectedEof),
            _ => {}
        }
    }
}

/// Consumes the rest of the current element, descendants included. A depth
/// counter instead of recursion keeps stack use flat on deeply nested
/// unknown extensions.
fn skip_subtree<R: BufRead>(reader: &mut NsReader<R>) -> ReaderResult<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        buf.clear();
        match reader.read_resolved_event_into(&mut buf)?.1 {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(ReaderError::UnexpectedEof),
            _ => {}
        }
    }
    Ok(())
}

fn attribute(element: &BytesStart, name: &str) -> ReaderResult<String> {
    let found = element
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?;
    match found {
        Some(attribute) => Ok(attribute
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned()),
        None => Ok(String::new()),
    }
}

/// Splits a `Tags` element's text on single spaces, dropping empty
/// fragments.
fn split_tags(text: &str) -> Vec<String> {
    text.split(' ')
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_owned)
        .collect()
}
