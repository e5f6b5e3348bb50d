//! Word-window text chunker and chunk assembly.
//!
//! [`chunk_paragraphs`] splits an ordered paragraph sequence into
//! fixed-size word windows with a configurable overlap carried between
//! consecutive chunks. The buffer persists across paragraph boundaries so
//! chunks may span paragraphs for continuity.
//!
//! [`build_chunks`] turns a [`Document`] into identity-stable [`Chunk`]
//! records: the abstract (when present) becomes a synthetic first section,
//! real sections follow in document order. Chunk ids are deterministic, so
//! re-running assembly on an unchanged document yields byte-identical
//! output and upserts replace instead of accumulate.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkMeta, Document};

/// Split paragraphs into overlapping word windows.
///
/// Words are whitespace-delimited; emitted chunks join them with single
/// spaces. Whenever the running buffer reaches `max_words` it is emitted
/// and reset to its trailing `overlap_words` words. A final partial chunk
/// is emitted only if it holds words not already emitted; a residue of
/// pure carried overlap is dropped.
///
/// Requires `overlap_words < max_words`; violations fail with
/// [`Error::InvalidConfiguration`] before any chunking happens.
pub fn chunk_paragraphs(
    paragraphs: &[String],
    max_words: usize,
    overlap_words: usize,
) -> Result<Vec<String>> {
    if max_words == 0 {
        return Err(Error::InvalidConfiguration(
            "max_words must be > 0".to_string(),
        ));
    }
    if overlap_words >= max_words {
        return Err(Error::InvalidConfiguration(format!(
            "overlap_words ({overlap_words}) must be < max_words ({max_words})"
        )));
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut fresh_words = 0usize;

    for paragraph in paragraphs {
        for word in paragraph.split_whitespace() {
            buffer.push(word);
            fresh_words += 1;
            if buffer.len() >= max_words {
                chunks.push(buffer.join(" "));
                buffer.drain(..buffer.len() - overlap_words);
                fresh_words = 0;
            }
        }
    }

    if !buffer.is_empty() && fresh_words > 0 {
        chunks.push(buffer.join(" "));
    }

    Ok(chunks)
}

/// Assemble a document into retrievable chunk records.
///
/// The abstract, when non-empty, is chunked as a synthetic `abstract`
/// section at index 0; body sections follow at subsequent indices. A
/// document with neither abstract nor section content fails with
/// [`Error::EmptyDocument`], which batch callers treat as a skip.
pub fn build_chunks(document: &Document, chunking: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut all = Vec::new();
    let mut section_index = 0usize;

    if !document.abstract_text.is_empty() {
        let texts = chunk_paragraphs(
            std::slice::from_ref(&document.abstract_text),
            chunking.max_words,
            chunking.overlap_words,
        )?;
        push_section_chunks(&mut all, document, "abstract", section_index, texts);
        section_index += 1;
    }

    for section in &document.sections {
        let texts = chunk_paragraphs(
            &section.paragraphs,
            chunking.max_words,
            chunking.overlap_words,
        )?;
        push_section_chunks(&mut all, document, &section.name, section_index, texts);
        section_index += 1;
    }

    if all.is_empty() {
        return Err(Error::EmptyDocument {
            paper_id: document.paper_id.clone(),
        });
    }

    Ok(all)
}

fn push_section_chunks(
    all: &mut Vec<Chunk>,
    document: &Document,
    section_name: &str,
    section_index: usize,
    texts: Vec<String>,
) {
    for (chunk_index, text) in texts.into_iter().enumerate() {
        all.push(Chunk {
            id: Chunk::compose_id(&document.paper_id, section_index, chunk_index),
            text,
            meta: ChunkMeta {
                paper_id: document.paper_id.clone(),
                title: document.title.clone(),
                section: Some(section_name.to_string()),
                section_index,
                chunk_index,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;

    fn paragraphs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_input_single_chunk() {
        let chunks = chunk_paragraphs(&paragraphs(&["alpha beta", "gamma"]), 280, 40).unwrap();
        assert_eq!(chunks, vec!["alpha beta gamma"]);
    }

    #[test]
    fn empty_input_no_chunks() {
        let chunks = chunk_paragraphs(&[], 280, 40).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_must_be_below_max() {
        let err = chunk_paragraphs(&paragraphs(&["a b c"]), 3, 3).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        let err = chunk_paragraphs(&paragraphs(&["a b c"]), 0, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn worked_example_from_four_word_paragraph() {
        // max 3, overlap 1: "D E F G" -> "D E F", "F G"
        let chunks = chunk_paragraphs(&paragraphs(&["D E F G"]), 3, 1).unwrap();
        assert_eq!(chunks, vec!["D E F", "F G"]);
    }

    #[test]
    fn trailing_pure_overlap_is_not_reemitted() {
        // "A B C" at max 3 / overlap 1 fills the buffer exactly once; the
        // carried "C" alone must not become a second chunk.
        let chunks = chunk_paragraphs(&paragraphs(&["A B C"]), 3, 1).unwrap();
        assert_eq!(chunks, vec!["A B C"]);
    }

    #[test]
    fn buffer_spans_paragraph_boundaries() {
        let chunks = chunk_paragraphs(&paragraphs(&["a b", "c d e"]), 4, 0).unwrap();
        assert_eq!(chunks, vec!["a b c d", "e"]);
    }

    #[test]
    fn zero_overlap_chunks_share_no_words() {
        let input = paragraphs(&[&words(25)]);
        let chunks = chunk_paragraphs(&input, 10, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        let mut seen = std::collections::HashSet::new();
        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                assert!(seen.insert(word.to_string()), "duplicated word {word}");
            }
        }
    }

    #[test]
    fn deoverlapping_reconstructs_the_word_sequence() {
        let input = paragraphs(&[&words(100), &words(57)]);
        let original: Vec<String> = input
            .iter()
            .flat_map(|p| p.split_whitespace().map(str::to_string))
            .collect();

        for overlap in [0usize, 1, 7, 20] {
            let chunks = chunk_paragraphs(&input, 21, overlap).unwrap();
            let mut rebuilt: Vec<String> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let mut w: Vec<String> =
                    chunk.split_whitespace().map(str::to_string).collect();
                if i > 0 {
                    w.drain(..overlap.min(w.len()));
                }
                rebuilt.extend(w);
            }
            assert_eq!(
                rebuilt, original,
                "overlap {overlap} lost or duplicated words"
            );
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let input = paragraphs(&[&words(90), &words(33)]);
        let a = chunk_paragraphs(&input, 17, 5).unwrap();
        let b = chunk_paragraphs(&input, 17, 5).unwrap();
        assert_eq!(a, b);
    }

    fn sample_document() -> Document {
        Document {
            paper_id: "paper1".to_string(),
            title: "A Title".to_string(),
            abstract_text: "A B C".to_string(),
            sections: vec![Section {
                name: "results".to_string(),
                paragraphs: paragraphs(&["D E F G"]),
            }],
        }
    }

    fn tiny_config() -> ChunkingConfig {
        ChunkingConfig {
            max_words: 3,
            overlap_words: 1,
        }
    }

    #[test]
    fn worked_example_assembly() {
        let chunks = build_chunks(&sample_document(), &tiny_config()).unwrap();
        let view: Vec<(&str, &str)> = chunks
            .iter()
            .map(|c| (c.id.as_str(), c.text.as_str()))
            .collect();
        assert_eq!(
            view,
            vec![
                ("paper1::sec_0::chunk_0", "A B C"),
                ("paper1::sec_1::chunk_0", "D E F"),
                ("paper1::sec_1::chunk_1", "F G"),
            ]
        );
        assert_eq!(chunks[0].meta.section.as_deref(), Some("abstract"));
        assert_eq!(chunks[1].meta.section.as_deref(), Some("results"));
        assert_eq!(chunks[2].meta.section_index, 1);
        assert_eq!(chunks[2].meta.chunk_index, 1);
        assert_eq!(chunks[0].meta.title, "A Title");
    }

    #[test]
    fn no_abstract_shifts_sections_to_index_zero() {
        let mut doc = sample_document();
        doc.abstract_text.clear();
        let chunks = build_chunks(&doc, &tiny_config()).unwrap();
        assert_eq!(chunks[0].id, "paper1::sec_0::chunk_0");
        assert_eq!(chunks[0].meta.section.as_deref(), Some("results"));
    }

    #[test]
    fn assembly_is_idempotent() {
        let doc = sample_document();
        let a = build_chunks(&doc, &tiny_config()).unwrap();
        let b = build_chunks(&doc, &tiny_config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn document_without_content_is_empty_document() {
        let doc = Document {
            paper_id: "hollow".to_string(),
            title: "hollow".to_string(),
            abstract_text: String::new(),
            sections: Vec::new(),
        };
        let err = build_chunks(&doc, &tiny_config()).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { .. }));
    }
}
