use crate::error::{KnowledgeError, Result};
use crate::types::KnowledgeEntry;
use once_cell::sync::Lazy;
use regex::Regex;

/// `Q:` / `A:` markers that start a block. The word boundary keeps tokens
/// such as `FAQ:` from being read as a question marker.
static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([QA]):").expect("marker regex"));

#[derive(Debug, Clone, Copy)]
struct Block {
    question_start: usize,
    question_end: Option<usize>,
    answer_start: Option<usize>,
}

/// Parse raw knowledge base text into entries.
///
/// A question block starts at `Q:` and its answer at the first `A:` that
/// follows it; the answer runs until the next `Q:` or end of input. Pairs
/// with an empty side after cleanup are dropped and ids are assigned over
/// the survivors.
pub fn parse(raw_text: &str) -> Result<Vec<KnowledgeEntry>> {
    let mut blocks: Vec<Block> = Vec::new();

    for caps in MARKER.captures_iter(raw_text) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        match kind.as_str() {
            "Q" => blocks.push(Block {
                question_start: whole.end(),
                question_end: None,
                answer_start: None,
            }),
            _ => {
                // The first A: after a Q: opens the answer; later ones are answer text.
                if let Some(block) = blocks.last_mut() {
                    if block.answer_start.is_none() {
                        block.question_end = Some(whole.start());
                        block.answer_start = Some(whole.end());
                    }
                }
            }
        }
    }

    let mut entries = Vec::with_capacity(blocks.len());
    let mut discarded = 0usize;
    for (idx, block) in blocks.iter().enumerate() {
        let (Some(question_end), Some(answer_start)) = (block.question_end, block.answer_start)
        else {
            discarded += 1;
            continue;
        };
        let answer_end = blocks
            .get(idx + 1)
            .map_or(raw_text.len(), |next| next.question_start - 2);

        let question = clean_text(&raw_text[block.question_start..question_end]);
        let answer = clean_text(&raw_text[answer_start..answer_end]);
        if question.is_empty() || answer.is_empty() {
            discarded += 1;
            continue;
        }
        entries.push(KnowledgeEntry::new(entries.len(), question, answer));
    }

    if discarded > 0 {
        log::debug!("Discarded {discarded} incomplete Q&A blocks");
    }
    if entries.is_empty() {
        return Err(KnowledgeError::empty());
    }

    log::info!("Parsed {} Q&A pairs from knowledge base", entries.len());
    Ok(entries)
}

/// Collapse whitespace runs to single spaces and trim the ends
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
