//! TEI document structure extraction.
//!
//! Parses GROBID-style TEI XML into a normalized [`Document`]: title,
//! abstract, and ordered body sections of non-empty paragraphs. Section
//! headings are normalized to a small set of canonical labels so that
//! chunk metadata stays interpretable across papers.
//!
//! Parsing is event-driven (quick-xml); element text is the concatenation
//! of all descendant text nodes joined by single spaces.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::models::{Document, Section};

/// Derive the paper identifier from a TEI filename.
///
/// `paper.tei.xml` maps to `paper`; other names fall back to the plain
/// file stem.
pub fn paper_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stem) = name.strip_suffix(".tei.xml") {
        return stem.to_string();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

/// Normalize a raw section heading to a canonical label where possible.
pub fn normalize_section_name(raw: &str) -> String {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return "unlabeled".to_string();
    }

    // Common scientific section aliases
    if ["introduction", "background"].iter().any(|k| name.contains(k)) {
        return "introduction".to_string();
    }
    if ["method", "materials"].iter().any(|k| name.contains(k)) {
        return "methods".to_string();
    }
    if ["result", "findings"].iter().any(|k| name.contains(k)) {
        return "results".to_string();
    }
    if ["discussion", "interpretation"].iter().any(|k| name.contains(k)) {
        return "discussion".to_string();
    }
    if ["conclusion", "summary"].iter().any(|k| name.contains(k)) {
        return "conclusion".to_string();
    }
    if name.contains("abstract") {
        return "abstract".to_string();
    }

    name
}

/// Read and parse one TEI file into a [`Document`].
///
/// The paper id is derived from the filename. Malformed XML or an
/// unreadable file fails with [`Error::ParseFailure`]; callers running a
/// batch decide whether to skip or abort.
pub fn extract_document(path: &Path) -> Result<Document> {
    let xml = std::fs::read_to_string(path).map_err(|e| Error::ParseFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let paper_id = paper_id_from_path(path);
    parse_tei(&paper_id, &xml).map_err(|e| match e {
        Error::ParseFailure { message, .. } => Error::ParseFailure {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// What an active text capture is feeding.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CaptureKind {
    Title,
    AbstractParagraph,
    SectionHead,
    SectionParagraph,
    LooseBodyParagraph,
}

struct Capture {
    kind: CaptureKind,
    fragments: Vec<String>,
    end_depth: usize,
}

/// A body division being accumulated before normalization.
struct PendingSection {
    type_attr: Option<String>,
    head: Option<String>,
    paragraphs: Vec<String>,
}

/// Parse TEI XML (already read into memory) into a [`Document`].
pub fn parse_tei(paper_id: &str, xml: &str) -> Result<Document> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    let mut title: Option<String> = None;
    let mut abstract_paragraphs: Vec<String> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut body_paragraphs: Vec<String> = Vec::new();

    let mut in_title_stmt = false;
    let mut in_profile_desc = false;
    let mut in_abstract = false;
    let mut in_body = false;
    let mut div_depth: usize = 0;
    let mut saw_div = false;
    let mut pending: Option<PendingSection> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent = stack.last().map(String::as_str).unwrap_or("");

                match name.as_str() {
                    "titleStmt" => in_title_stmt = true,
                    "profileDesc" => in_profile_desc = true,
                    "abstract" if in_profile_desc => in_abstract = true,
                    "body" => in_body = true,
                    "div" if in_body => {
                        if div_depth == 0 {
                            saw_div = true;
                            let type_attr = attribute_value(&e, b"type").map_err(|m| {
                                parse_failure(paper_id, m)
                            })?;
                            pending = Some(PendingSection {
                                type_attr,
                                head: None,
                                paragraphs: Vec::new(),
                            });
                        }
                        div_depth += 1;
                    }
                    _ => {}
                }

                if capture.is_none() {
                    let kind = match name.as_str() {
                        "title" if in_title_stmt && title.is_none() => Some(CaptureKind::Title),
                        "p" if in_abstract => Some(CaptureKind::AbstractParagraph),
                        "head"
                            if in_body
                                && div_depth == 1
                                && parent == "div"
                                && pending.as_ref().is_some_and(|s| s.head.is_none()) =>
                        {
                            Some(CaptureKind::SectionHead)
                        }
                        "p" if in_body && div_depth > 0 => Some(CaptureKind::SectionParagraph),
                        "p" if in_body => Some(CaptureKind::LooseBodyParagraph),
                        _ => None,
                    };
                    if let Some(kind) = kind {
                        capture = Some(Capture {
                            kind,
                            fragments: Vec::new(),
                            end_depth: stack.len(),
                        });
                    }
                }

                stack.push(name);
            }
            Ok(Event::Text(t)) => {
                if let Some(cap) = capture.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| parse_failure(paper_id, e.to_string()))?;
                    if !text.is_empty() {
                        cap.fragments.push(text.into_owned());
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(cap) = capture.as_mut() {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    if !text.trim().is_empty() {
                        cap.fragments.push(text.trim().to_string());
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                // Self-closing division still counts as structured body markup.
                if in_body && e.local_name().as_ref() == b"div" && div_depth == 0 {
                    saw_div = true;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();

                if capture.as_ref().is_some_and(|c| stack.len() == c.end_depth) {
                    if let Some(cap) = capture.take() {
                        let text = cap.fragments.join(" ").trim().to_string();
                        if !text.is_empty() {
                            match cap.kind {
                                CaptureKind::Title => title = Some(text),
                                CaptureKind::AbstractParagraph => abstract_paragraphs.push(text),
                                CaptureKind::SectionHead => {
                                    if let Some(sec) = pending.as_mut() {
                                        sec.head = Some(text);
                                    }
                                }
                                CaptureKind::SectionParagraph => {
                                    if let Some(sec) = pending.as_mut() {
                                        sec.paragraphs.push(text);
                                    }
                                }
                                CaptureKind::LooseBodyParagraph => body_paragraphs.push(text),
                            }
                        }
                    }
                }

                match name.as_str() {
                    "titleStmt" => in_title_stmt = false,
                    "profileDesc" => in_profile_desc = false,
                    "abstract" => in_abstract = false,
                    "body" => in_body = false,
                    "div" if in_body && div_depth > 0 => {
                        div_depth -= 1;
                        if div_depth == 0 {
                            if let Some(sec) = pending.take() {
                                if !sec.paragraphs.is_empty() {
                                    let raw = sec
                                        .type_attr
                                        .as_deref()
                                        .or(sec.head.as_deref())
                                        .unwrap_or("");
                                    sections.push(Section {
                                        name: normalize_section_name(raw),
                                        paragraphs: sec.paragraphs,
                                    });
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_failure(paper_id, e.to_string())),
        }
        buf.clear();
    }

    // No structured divisions at all: everything found in the body becomes
    // one synthetic section.
    if !saw_div && !body_paragraphs.is_empty() {
        sections.push(Section {
            name: "body".to_string(),
            paragraphs: body_paragraphs,
        });
    }

    let title = match title {
        Some(t) if !t.is_empty() => t,
        _ => paper_id.to_string(),
    };

    Ok(Document {
        paper_id: paper_id.to_string(),
        title,
        abstract_text: abstract_paragraphs.join("\n"),
        sections,
    })
}

fn parse_failure(paper_id: &str, message: String) -> Error {
    Error::ParseFailure {
        path: paper_id.into(),
        message,
    }
}

fn attribute_value(
    e: &quick_xml::events::BytesStart<'_>,
    key: &[u8],
) -> std::result::Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.local_name().as_ref() == key {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
