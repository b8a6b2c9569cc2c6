use faq_knowledge::KnowledgeEntry;

pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the knowledge base.";
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Renders ranked entries into a bounded text block for a generator.
///
/// Blocks are `Q: ..\nA: ..` in ranking order joined by
/// [`CONTEXT_SEPARATOR`]. The character budget covers blocks and separators;
/// the header naming the query is added on top. Assembly stops at the first
/// block that would overflow the budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    #[must_use]
    pub const fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[must_use]
    pub fn header(query: &str) -> String {
        format!("Here are the most relevant Q&A pairs for the query '{query}':\n\n")
    }

    pub fn assemble<'a, I>(&self, query: &str, entries: I) -> String
    where
        I: IntoIterator<Item = &'a KnowledgeEntry>,
    {
        let separator_len = CONTEXT_SEPARATOR.chars().count();
        let mut blocks: Vec<String> = Vec::new();
        let mut used = 0usize;

        for entry in entries {
            let block = entry.context_block();
            let cost = block.chars().count() + if blocks.is_empty() { 0 } else { separator_len };
            if used + cost > self.max_chars {
                break;
            }
            used += cost;
            blocks.push(block);
        }

        if blocks.is_empty() {
            return NO_RELEVANT_INFORMATION.to_string();
        }

        log::debug!(
            "Assembled context from {} entries ({used}/{} chars)",
            blocks.len(),
            self.max_chars
        );
        format!("{}{}", Self::header(query), blocks.join(CONTEXT_SEPARATOR))
    }
}
