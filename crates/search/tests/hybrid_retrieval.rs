use async_trait::async_trait;
use faq_knowledge::KnowledgeStore;
use faq_search::{
    AnswerGenerator, HybridSearch, IndexSnapshot, MatchKind, RetrievalConfig, SearchError,
    SourceStatus, NO_RELEVANT_INFORMATION,
};
use faq_vector_store::{
    DistanceMetric, EmbeddingProvider, IndexCacheKey, StubEmbedder, VectorIndex,
    VectorStoreError,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const REFUND_KB: &str = r"
Customer support knowledge base.

Q: What is the refund policy?
A: Refunds within 30 days.

Q: How do I reset my password?
A: Use the forgot password link on the login page.

Q: How long does shipping take?
A: Shipping takes five business days.

Q: Which browsers are supported?
A: Chrome, Firefox and Safari.
";

const SUPPORT_KB: &str = r"
Q: What is the refund policy?
A: Refunds within 30 days of purchase.
Q: How do I request a refund?
A: Open a billing ticket to request a refund.
Q: How do I reset my password?
A: Use the forgot password link on the login page.
Q: Can I change my password?
A: Yes, from the account settings page.
Q: How long does shipping take?
A: Standard shipping takes five business days.
Q: Do you offer express shipping?
A: Express shipping arrives in two business days.
Q: Which browsers are supported?
A: Chrome, Firefox and Safari.
";

const COMPLIANCE_KB: &str = r"
Q: What is the refund policy?
A: Refunds within 30 days.
Q: How do I reset my password?
A: Use the forgot password link on the login page.
Q: How long does shipping take?
A: Shipping takes five business days.
Q: Is the platform audited?
A: Yes, we hold a current SOC2 Type II report.
Q: Can I download the SOC2 report?
A: Ask your account manager for a copy under NDA.
Q: Which browsers are supported?
A: Chrome, Firefox and Safari.
Q: Do you offer discounts?
A: Annual plans include two months free.
Q: How do I contact support?
A: Email the support team any time.
";

/// Maps words onto a handful of concept axes, so paraphrases with no shared
/// words still land close together.
struct ConceptEmbedder;

const CONCEPTS: &[&[&str]] = &[
    &["refund", "refunds", "money", "reimburse", "back"],
    &["password", "login", "reset", "forgot"],
    &["shipping", "delivery", "ships"],
    &["browser", "browsers", "chrome", "firefox", "safari"],
];

#[async_trait]
impl EmbeddingProvider for ConceptEmbedder {
    async fn embed(&self, text: &str) -> faq_vector_store::Result<Vec<f32>> {
        let mut vector = vec![0.0; CONCEPTS.len()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            for (axis, words) in CONCEPTS.iter().enumerate() {
                if words.contains(&word) {
                    vector[axis] += 1.0;
                }
            }
        }
        Ok(vector)
    }

    fn model_id(&self) -> String {
        "concepts-4".to_string()
    }
}

/// Entries mentioning SOC2 point away from every query; other entries are
/// only weakly related.
struct AcronymBlindEmbedder;

#[async_trait]
impl EmbeddingProvider for AcronymBlindEmbedder {
    async fn embed(&self, text: &str) -> faq_vector_store::Result<Vec<f32>> {
        if !text.starts_with("Question:") {
            return Ok(vec![1.0, 0.0]);
        }
        if text.contains("SOC2") {
            Ok(vec![-1.0, 0.0])
        } else {
            Ok(vec![-0.6, 0.8])
        }
    }

    fn model_id(&self) -> String {
        "acronym-blind".to_string()
    }
}

/// Answers entry texts immediately; queries either fail or hang.
struct QueryFailingEmbedder {
    hang: bool,
}

#[async_trait]
impl EmbeddingProvider for QueryFailingEmbedder {
    async fn embed(&self, text: &str) -> faq_vector_store::Result<Vec<f32>> {
        if text.starts_with("Question:") {
            return Ok(vec![1.0, 0.5]);
        }
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Err(VectorStoreError::EmbeddingError("connection refused".to_string()))
    }

    fn model_id(&self) -> String {
        "query-failing".to_string()
    }
}

/// Every call fails as if the provider were down.
struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> faq_vector_store::Result<Vec<f32>> {
        Err(VectorStoreError::EmbeddingError("connection refused".to_string()))
    }

    fn model_id(&self) -> String {
        "unreachable".to_string()
    }
}

struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, question: &str, context: &str) -> faq_search::Result<String> {
        Ok(format!("{question} | {} context chars", context.chars().count()))
    }
}

struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> faq_search::Result<String> {
        Err(SearchError::Generation("model offline".to_string()))
    }
}

async fn engine_with(
    kb: &str,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
) -> HybridSearch {
    let search = HybridSearch::new(config)
        .expect("valid config")
        .with_embedder(embedder);
    search.initialize(kb).await.expect("initialize");
    search
}

#[tokio::test]
async fn paraphrased_refund_question_ranks_refund_entry_first() {
    let search = engine_with(
        REFUND_KB,
        Arc::new(ConceptEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    let report = search
        .query("How can I get my money back?", 4)
        .await
        .expect("query");

    assert!(report.semantic.is_ready());
    let top = &report.results[0];
    assert_eq!(top.entry.question, "What is the refund policy?");
    assert!(matches!(
        top.candidate.match_kind,
        MatchKind::Semantic | MatchKind::Both
    ));
    for other in &report.results[1..] {
        assert!(top.candidate.combined_score > other.candidate.combined_score);
    }
}

#[tokio::test]
async fn rare_acronym_surfaces_through_lexical_path() {
    let search = engine_with(
        COMPLIANCE_KB,
        Arc::new(AcronymBlindEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    let report = search.query("SOC2", 5).await.expect("query");
    assert!(report.semantic.is_ready());
    assert!(report.lexical.is_ready());

    let audited = report
        .results
        .iter()
        .find(|r| r.entry.question == "Is the platform audited?")
        .expect("SOC2 answer in top results");
    assert_eq!(audited.candidate.match_kind, MatchKind::Lexical);
    assert_eq!(audited.candidate.semantic_score, 0.0);
    assert!(audited.candidate.lexical_score > 0.0);
    assert!(audited.explanation.starts_with("Strong keyword match"));
}

#[tokio::test]
async fn identical_query_gets_top_semantic_similarity() {
    let store = KnowledgeStore::from_text(REFUND_KB).expect("parse");
    let embedder = StubEmbedder::default();
    let index = VectorIndex::build(
        store.entries(),
        &embedder,
        &Default::default(),
        |_, _| {},
    )
    .await
    .expect("build");

    for entry in store.entries() {
        let query = embedder.embed_sync(&entry.composite_text());
        let hits = index.search(&query, 1).expect("search");
        assert_eq!(hits[0].0, entry.id);
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn embedding_failure_degrades_to_lexical_only() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(QueryFailingEmbedder { hang: false }),
        RetrievalConfig::default(),
    )
    .await;

    let report = search.query("password reset", 3).await.expect("query");
    assert!(matches!(report.semantic, SourceStatus::Unavailable { .. }));
    assert!(report.lexical.is_ready());
    assert_eq!(report.results[0].entry.question, "How do I reset my password?");
    assert!(report
        .results
        .iter()
        .all(|r| r.candidate.match_kind == MatchKind::Lexical));
}

#[tokio::test]
async fn provider_down_at_startup_serves_lexical_only() {
    let search = HybridSearch::new(RetrievalConfig::default())
        .expect("config")
        .with_embedder(Arc::new(UnreachableEmbedder));
    search.initialize(REFUND_KB).await.expect("initialize");

    let snapshot = search.snapshot().await.expect("ready");
    assert!(snapshot.vectors().is_none());
    assert_eq!(snapshot.store().len(), 4);

    let report = search.query("refund", 3).await.expect("query");
    assert!(matches!(report.semantic, SourceStatus::Unavailable { .. }));
    assert!(report.lexical.is_ready());
    assert_eq!(report.results[0].entry.question, "What is the refund policy?");
}

#[tokio::test]
async fn required_semantic_index_fails_when_provider_is_down() {
    let search = HybridSearch::new(RetrievalConfig::default())
        .expect("config")
        .with_embedder(Arc::new(UnreachableEmbedder))
        .with_required_semantic(true);

    let err = search.initialize(REFUND_KB).await.unwrap_err();
    assert!(matches!(err, SearchError::EmbeddingProvider(_)));
    assert!(!search.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn slow_embedding_provider_times_out_and_degrades() {
    let config = RetrievalConfig {
        embed_timeout_ms: 50,
        ..Default::default()
    };
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(QueryFailingEmbedder { hang: true }),
        config,
    )
    .await;

    let report = search.query("shipping", 3).await.expect("query");
    match &report.semantic {
        SourceStatus::Unavailable { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected semantic timeout, got {other:?}"),
    }
    assert_eq!(
        report.results[0].entry.question,
        "How long does shipping take?"
    );
}

#[tokio::test]
async fn both_paths_unavailable_is_an_error() {
    let store = KnowledgeStore::from_text(SUPPORT_KB).expect("parse");
    let embedder = QueryFailingEmbedder { hang: false };
    let vectors = VectorIndex::build(store.entries(), &embedder, &Default::default(), |_, _| {})
        .await
        .expect("build vectors");
    let snapshot = IndexSnapshot::from_parts(store, None, Some(vectors)).expect("snapshot");

    let search = HybridSearch::new(RetrievalConfig::default())
        .expect("config")
        .with_embedder(Arc::new(embedder));
    search.publish(snapshot).await;

    assert!(matches!(
        search.query("refund", 3).await,
        Err(SearchError::RetrievalUnavailable { .. })
    ));
}

#[tokio::test]
async fn rebuild_swaps_snapshot_without_disturbing_holders() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(StubEmbedder::default()),
        RetrievalConfig::default(),
    )
    .await;
    let before = search.snapshot().await.expect("ready");
    assert_eq!(before.store().len(), 7);

    let replacement = KnowledgeStore::from_text(
        "Q: What is the refund policy? A: Refunds within 60 days.\n\
         Q: Do you ship abroad? A: Yes, to 40 countries.",
    )
    .expect("parse");
    let mut progress = Vec::new();
    search
        .rebuild(replacement, |done, total| progress.push((done, total)))
        .await
        .expect("rebuild");

    assert_eq!(progress.last(), Some(&(2, 2)));
    assert_eq!(before.store().len(), 7);
    let after = search.snapshot().await.expect("ready");
    assert_eq!(after.store().len(), 2);

    let report = search.query("refund", 2).await.expect("query");
    assert!(report.results[0].entry.answer.contains("60 days"));
}

#[tokio::test]
async fn concurrent_queries_see_one_whole_snapshot() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(StubEmbedder::default()),
        RetrievalConfig::default(),
    )
    .await;
    let old = KnowledgeStore::from_text(SUPPORT_KB).expect("parse");
    let new_text = "Q: What is the refund policy? A: Refunds within 60 days.\n\
                    Q: Do you ship abroad? A: Yes, to 40 countries.";
    let new = KnowledgeStore::from_text(new_text).expect("parse");
    let pairs = |store: &KnowledgeStore| -> Vec<(String, String)> {
        store
            .entries()
            .iter()
            .map(|e| (e.question.clone(), e.answer.clone()))
            .collect()
    };
    let (old_pairs, new_pairs) = (pairs(&old), pairs(&new));

    let (first, second, rebuilt, third, fourth) = tokio::join!(
        search.query("refund policy", 5),
        search.query("shipping", 5),
        search.rebuild(new, |_, _| {}),
        search.query("refund policy", 5),
        search.query("ship abroad", 5),
    );
    rebuilt.expect("rebuild");

    for report in [first, second, third, fourth] {
        let report = report.expect("query");
        let seen: Vec<(String, String)> = report
            .results
            .iter()
            .map(|r| (r.entry.question.clone(), r.entry.answer.clone()))
            .collect();
        assert!(!seen.is_empty());
        let from_old = seen.iter().all(|pair| old_pairs.contains(pair));
        let from_new = seen.iter().all(|pair| new_pairs.contains(pair));
        assert!(from_old || from_new, "mixed snapshot results: {seen:?}");
    }

    assert_eq!(search.snapshot().await.expect("ready").store().len(), 2);
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_previous_snapshot() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(StubEmbedder::default()),
        RetrievalConfig::default(),
    )
    .await;

    let err = search.initialize("no markers here").await.unwrap_err();
    assert!(matches!(err, SearchError::Knowledge(_)));
    let snapshot = search.snapshot().await.expect("still ready");
    assert_eq!(snapshot.store().len(), 7);
}

#[tokio::test]
async fn context_for_respects_budget_and_sentinel() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(ConceptEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    assert_eq!(
        search.context_for("refund", 0).await.expect("context"),
        NO_RELEVANT_INFORMATION
    );

    let context = search.context_for("refund policy", 2000).await.expect("context");
    assert!(context
        .starts_with("Here are the most relevant Q&A pairs for the query 'refund policy':\n\n"));
    assert!(context.contains("Q: What is the refund policy?\nA: Refunds within 30 days of purchase."));

    let tight = search.context_for("refund policy", 120).await.expect("context");
    assert_ne!(tight, NO_RELEVANT_INFORMATION);
    assert!(!tight.contains("---"));
}

#[tokio::test]
async fn explain_counts_match_kinds() {
    let search = engine_with(
        COMPLIANCE_KB,
        Arc::new(AcronymBlindEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    let explanation = search.explain("SOC2 report").await.expect("explain");
    assert_eq!(
        explanation.total_results,
        explanation.semantic_only + explanation.lexical_only + explanation.both_match
    );
    assert!(explanation.lexical_only >= 1);
    assert!(explanation
        .important_keywords
        .iter()
        .any(|(term, _)| term == "soc2"));
    assert!((explanation.weights.semantic() - 0.6).abs() < f32::EPSILON);
    let top = explanation.top_result.as_ref().expect("top result");
    if top.match_kind != MatchKind::Semantic {
        assert!(!explanation.matching_keywords.is_empty());
    }
}

#[tokio::test]
async fn similar_questions_excludes_the_question_itself() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(ConceptEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    let similar = search
        .similar_questions("what is the refund policy?", 0.7)
        .await
        .expect("similar");
    let questions: Vec<&str> = similar.iter().map(|s| s.question.as_str()).collect();
    assert_eq!(questions, vec!["How do I request a refund?"]);

    let similar = search
        .similar_questions("I want my money back", 0.7)
        .await
        .expect("similar");
    let questions: Vec<&str> = similar.iter().map(|s| s.question.as_str()).collect();
    assert_eq!(
        questions,
        vec!["What is the refund policy?", "How do I request a refund?"]
    );
    assert!(similar.iter().all(|s| s.similarity >= 0.7));
}

#[tokio::test]
async fn answer_passes_context_to_generator() {
    let search = engine_with(
        SUPPORT_KB,
        Arc::new(ConceptEmbedder),
        RetrievalConfig::default(),
    )
    .await;

    let answer = search
        .answer("How do refunds work?", &EchoGenerator)
        .await
        .expect("answer");
    assert!(answer.answer.starts_with("How do refunds work? |"));
    assert!(answer.context.contains("Refunds within 30 days of purchase."));
    assert!(!answer.sources.is_empty());

    assert!(matches!(
        search.answer("How do refunds work?", &FailingGenerator).await,
        Err(SearchError::Generation(_))
    ));
}

#[tokio::test]
async fn cached_vectors_can_be_published() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("vectors.json");
    let store = KnowledgeStore::from_text(SUPPORT_KB).expect("parse");
    let embedder = StubEmbedder::default();

    let built = VectorIndex::build(store.entries(), &embedder, &Default::default(), |_, _| {})
        .await
        .expect("build");
    built.save(&path, &store.fingerprint()).await.expect("save");

    let key = IndexCacheKey {
        metric: DistanceMetric::Cosine,
        model_id: "stub-hash-256".to_string(),
        fingerprint: store.fingerprint(),
    };
    let loaded = VectorIndex::load(&path, &key).await.expect("load");
    let lexical = faq_lexical::LexicalIndex::build(store.entries(), &Default::default())
        .expect("lexical");
    let snapshot =
        IndexSnapshot::from_parts(store, Some(lexical), Some(loaded)).expect("snapshot");

    let search = HybridSearch::new(RetrievalConfig::default())
        .expect("config")
        .with_embedder(Arc::new(embedder));
    search.publish(snapshot).await;

    let report = search.query("shipping", 2).await.expect("query");
    assert!(report.semantic.is_ready());
    assert!(report
        .results
        .iter()
        .any(|r| r.entry.question == "How long does shipping take?"));
}
