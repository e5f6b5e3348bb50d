//! Citation-bound answer generation.
//!
//! Retrieved chunks are bound to ordinal labels (`[S1]`, `[S2]`, …) in
//! retrieval order, embedded into a grounded prompt, and returned together
//! with the generated answer as a [`GroundedAnswer`]. The binding is fixed
//! at prompt-composition time: label `S{i}` always means the `i`-th chunk
//! of the returned context list, and nothing between composition and
//! rendering reorders it.
//!
//! With zero retrieved chunks the binder short-circuits to
//! [`NO_CONTEXT_ANSWER`] and the generation backend is never invoked.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::generation::GenerationProvider;
use crate::models::{ChatMessage, Chunk, GroundedAnswer};

/// Fixed sentinel returned when retrieval produced no context.
pub const NO_CONTEXT_ANSWER: &str = "No relevant documents found in the RAG index.";

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[S(\d+)\]").unwrap());

/// Render the header line for one labeled context block.
///
/// `position` is 1-based, matching the citation label.
pub fn context_header(position: usize, chunk: &Chunk) -> String {
    let mut header = format!(
        "[S{position}] {} - {}",
        chunk.meta.paper_id,
        chunk.meta.title.trim()
    );
    if let Some(section) = &chunk.meta.section {
        header.push_str(&format!(" (section: {section})"));
    }
    header
}

/// Compose the system and user messages for one grounded answer.
///
/// The system message restricts the model to the supplied chunks and to
/// the supplied citation labels; the user message carries one labeled
/// block per chunk, in retrieval order, followed by the question.
pub fn compose_prompt(query: &str, contexts: &[Chunk]) -> Vec<ChatMessage> {
    let context_blocks: Vec<String> = contexts
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "{}\nChunk text:\n{}\n",
                context_header(i + 1, chunk),
                chunk.text
            )
        })
        .collect();

    let system = "You are a rigorous scientific assistant.\n\
        You must answer ONLY using the provided context chunks from scientific articles.\n\
        If the answer is not contained in the context, say you do not know.\n\n\
        When you make a factual statement that is supported by a chunk, cite it inline \
        using [S1], [S2], etc., corresponding to the chunk labels.\n\
        Do not fabricate new sources, do not invent citation labels, and do not mention \
        any documents that are not labeled [S1], [S2], etc.\n\
        You do not need to list a separate 'Sources' section; the caller handles that.";

    let user = format!(
        "User question:\n{query}\n\nContext from scientific articles:\n{}\n\n\
         Answer the question as precisely and concisely as possible. \
         If you are unsure or the information is incomplete, clearly say so.",
        context_blocks.join("\n")
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Citation labels in `answer` that fall outside `1..=k`, ascending and
/// deduplicated.
///
/// The binder only warns about these; callers wanting stricter handling
/// can reject or annotate the answer themselves.
pub fn unknown_citation_labels(answer: &str, k: usize) -> Vec<usize> {
    let mut unknown: Vec<usize> = CITATION_RE
        .captures_iter(answer)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .filter(|&n| n == 0 || n > k)
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    unknown
}

/// Binds retrieved chunks to citation labels and produces grounded
/// answers through an injected generation backend.
pub struct AnswerBinder {
    generator: Arc<dyn GenerationProvider>,
}

impl AnswerBinder {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    /// Answer `query` grounded in `contexts`.
    ///
    /// The returned [`GroundedAnswer`] carries the generated text verbatim
    /// and the same ordered chunk list the prompt was built from. Labels
    /// outside the supplied range are logged, never rewritten.
    pub async fn answer(&self, query: &str, contexts: Vec<Chunk>) -> Result<GroundedAnswer> {
        if contexts.is_empty() {
            return Ok(GroundedAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                contexts,
            });
        }

        let messages = compose_prompt(query, &contexts);
        let answer = self.generator.generate(&messages).await?;

        let unknown = unknown_citation_labels(&answer, contexts.len());
        if !unknown.is_empty() {
            warn!(
                labels = ?unknown,
                supplied = contexts.len(),
                "generated answer cites labels that were never supplied"
            );
        }

        Ok(GroundedAnswer { answer, contexts })
    }
}
