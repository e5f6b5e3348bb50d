//! Append-only conversation log.
//!
//! A [`Conversation`] accumulates [`ChatTurn`]s: one user turn per
//! question, one assistant turn per successful answer carrying the exact
//! chunk list the answer was grounded on. Turns are never mutated or
//! removed; persistence and display belong to the caller.

use chrono::Utc;

use crate::models::{ChatTurn, GroundedAnswer, Role};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one user turn.
    pub fn record_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::User,
            content: content.into(),
            contexts: None,
            at: Utc::now(),
        });
    }

    /// Append one assistant turn with the contexts it was grounded on.
    pub fn record_assistant(&mut self, answer: &GroundedAnswer) {
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            content: answer.answer.clone(),
            contexts: Some(answer.contexts.clone()),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMeta};

    fn grounded(answer: &str) -> GroundedAnswer {
        GroundedAnswer {
            answer: answer.to_string(),
            contexts: vec![Chunk {
                id: "p::sec_0::chunk_0".to_string(),
                text: "context".to_string(),
                meta: ChunkMeta {
                    paper_id: "p".to_string(),
                    title: "t".to_string(),
                    section: Some("abstract".to_string()),
                    section_index: 0,
                    chunk_index: 0,
                },
            }],
        }
    }

    #[test]
    fn turns_accumulate_in_order() {
        let mut conversation = Conversation::new();
        assert!(conversation.is_empty());

        conversation.record_user("first question");
        conversation.record_assistant(&grounded("first answer [S1]"));
        conversation.record_user("second question");

        let turns = conversation.turns();
        assert_eq!(conversation.len(), 3);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "first question");
        assert!(turns[0].contexts.is_none());
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].contexts.as_ref().unwrap().len(), 1);
        assert_eq!(turns[2].content, "second question");
    }

    #[test]
    fn assistant_turn_keeps_context_order() {
        let mut answer = grounded("a");
        answer.contexts.push(Chunk {
            id: "p::sec_1::chunk_0".to_string(),
            text: "more".to_string(),
            meta: ChunkMeta {
                paper_id: "p".to_string(),
                title: "t".to_string(),
                section: Some("results".to_string()),
                section_index: 1,
                chunk_index: 0,
            },
        });

        let mut conversation = Conversation::new();
        conversation.record_assistant(&answer);
        let stored = conversation.turns()[0].contexts.as_ref().unwrap();
        assert_eq!(stored[0].id, "p::sec_0::chunk_0");
        assert_eq!(stored[1].id, "p::sec_1::chunk_0");
    }
}
