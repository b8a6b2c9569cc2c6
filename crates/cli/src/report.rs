use faq_knowledge::{KnowledgeEntry, KnowledgeStats};
use faq_search::{
    GeneratedAnswer, RetrievalReport, SearchExplanation, SimilarQuestion, SourceStatus,
};

const ANSWER_PREVIEW_CHARS: usize = 160;

pub(crate) fn render_stats(stats: &KnowledgeStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Q&A pairs:           {}\n", stats.total_pairs));
    out.push_str(&format!("Total characters:    {}\n", stats.total_characters));
    out.push_str(&format!(
        "Avg question length: {}\n",
        stats.average_question_length
    ));
    out.push_str(&format!("Avg answer length:   {}\n", stats.average_answer_length));
    out.push_str(&format!("Shortest question:   {}\n", stats.shortest_question));
    out.push_str(&format!("Longest answer:      {}", stats.longest_answer_preview));
    out
}

pub(crate) fn render_search(report: &RetrievalReport) -> String {
    if report.results.is_empty() {
        return format!("No results for '{}'", report.query);
    }

    let mut out = String::new();
    for (i, result) in report.results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (score: {:.3}, {})\n",
            i + 1,
            result.entry.question,
            result.candidate.combined_score,
            result.candidate.match_kind
        ));
        out.push_str(&format!("   {}\n", preview(&result.entry.answer)));
        out.push_str(&format!("   {}\n\n", result.explanation));
    }
    out.push_str(&format!(
        "semantic: {} | lexical: {}",
        render_status(&report.semantic),
        render_status(&report.lexical)
    ));
    out
}

pub(crate) fn render_explanation(explanation: &SearchExplanation) -> String {
    let mut out = String::new();
    out.push_str(&format!("Query:          {}\n", explanation.query));
    out.push_str(&format!(
        "Results:        {} (semantic only {}, keyword only {}, both {})\n",
        explanation.total_results,
        explanation.semantic_only,
        explanation.lexical_only,
        explanation.both_match
    ));
    out.push_str(&format!(
        "Weights:        semantic {:.2}, lexical {:.2}\n",
        explanation.weights.semantic(),
        explanation.weights.lexical()
    ));
    if let Some(top) = &explanation.top_result {
        out.push_str(&format!(
            "Top result:     #{} {} (score: {:.3}, {})\n",
            top.entry_id, top.question, top.score, top.match_kind
        ));
    }
    if !explanation.important_keywords.is_empty() {
        out.push_str(&format!(
            "Keywords:       {}\n",
            render_terms_inline(&explanation.important_keywords)
        ));
    }
    if !explanation.matching_keywords.is_empty() {
        out.push_str(&format!(
            "Shared with top: {}\n",
            explanation.matching_keywords.join(", ")
        ));
    }
    out.push_str(&format!(
        "Semantic path:  {}\n",
        render_status(&explanation.semantic)
    ));
    out.push_str(&format!(
        "Lexical path:   {}",
        render_status(&explanation.lexical)
    ));
    out
}

pub(crate) fn render_terms(terms: &[(String, f32)]) -> String {
    if terms.is_empty() {
        return "No known terms".to_string();
    }
    terms
        .iter()
        .map(|(term, weight)| format!("{weight:.3}  {term}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_similar(question: &str, similar: &[SimilarQuestion]) -> String {
    if similar.is_empty() {
        return format!("No similar questions for '{question}'");
    }
    let mut out = String::from("Did you mean:");
    for item in similar {
        out.push_str(&format!("\n  - {} ({:.2})", item.question, item.similarity));
    }
    out
}

pub(crate) fn render_matches(term: &str, entries: &[&KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return format!("No entries mention '{term}'");
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "#{} {}\n   {}",
                entry.id,
                entry.question,
                preview(&entry.answer)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_answer(answer: &GeneratedAnswer) -> String {
    let mut out = answer.answer.clone();
    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in &answer.sources {
            out.push_str(&format!(
                "\n  - {} ({:.2})",
                source.entry.question, source.candidate.combined_score
            ));
        }
    }
    out
}

fn render_status(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Ready { hits } => format!("{hits} hits"),
        SourceStatus::Unavailable { reason } => format!("unavailable ({reason})"),
    }
}

fn render_terms_inline(terms: &[(String, f32)]) -> String {
    terms
        .iter()
        .map(|(term, weight)| format!("{term} ({weight:.2})"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(ANSWER_PREVIEW_CHARS).collect();
    if text.chars().count() > ANSWER_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
