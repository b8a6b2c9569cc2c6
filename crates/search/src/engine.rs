use crate::config::RetrievalConfig;
use crate::context::{ContextAssembler, NO_RELEVANT_INFORMATION};
use crate::error::{Result, SearchError};
use crate::fusion::{FusionWeights, MatchKind, ScoreFusion, ScoredCandidate};
use crate::generation::AnswerGenerator;
use faq_knowledge::{KnowledgeEntry, KnowledgeStore};
use faq_lexical::{LexicalIndex, VectorizerConfig};
use faq_vector_store::{embed_with_timeout, EmbeddingProvider, VectorIndex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

const EXPLAIN_RESULTS: usize = 5;
const EXPLAIN_KEYWORDS: usize = 5;
const MAX_SIMILAR_QUESTIONS: usize = 3;

/// Knowledge store plus the indices built from it, immutable once published.
#[derive(Debug)]
pub struct IndexSnapshot {
    store: KnowledgeStore,
    lexical: Option<LexicalIndex>,
    vectors: Option<VectorIndex>,
}

impl IndexSnapshot {
    /// Combine prebuilt parts, checking every index covers exactly the
    /// store's entry ids.
    pub fn from_parts(
        store: KnowledgeStore,
        lexical: Option<LexicalIndex>,
        vectors: Option<VectorIndex>,
    ) -> Result<Self> {
        let expected: BTreeSet<usize> = store.entries().iter().map(|e| e.id).collect();

        if let Some(lexical) = &lexical {
            let lexical_ids: BTreeSet<usize> = lexical.entry_ids().iter().copied().collect();
            if let Some(id) = lexical_ids.symmetric_difference(&expected).next() {
                log::error!("Lexical index and knowledge store disagree on entry {id}");
                return Err(SearchError::NotFound(*id));
            }
        }

        if let Some(vectors) = &vectors {
            let vector_ids: BTreeSet<usize> = vectors.entry_ids().collect();
            if let Some(id) = vector_ids.symmetric_difference(&expected).next() {
                log::error!("Vector index and knowledge store disagree on entry {id}");
                return Err(SearchError::NotFound(*id));
            }
        }

        Ok(Self {
            store,
            lexical,
            vectors,
        })
    }

    /// Build both indices from `store`.
    ///
    /// Without an embedder the snapshot is lexical-only. When the embedding
    /// provider fails the snapshot is also lexical-only, unless
    /// `require_semantic` is set, in which case the build fails with
    /// `EmbeddingProvider`.
    pub async fn build<F>(
        store: KnowledgeStore,
        vectorizer: &VectorizerConfig,
        embedder: Option<&dyn EmbeddingProvider>,
        config: &RetrievalConfig,
        require_semantic: bool,
        progress: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) + Send,
    {
        let lexical = LexicalIndex::build(store.entries(), vectorizer)?;

        let vectors = match embedder {
            Some(embedder) => {
                let built = VectorIndex::build(
                    store.entries(),
                    embedder,
                    &config.vector_index_config(),
                    progress,
                )
                .await;
                match built {
                    Ok(vectors) => Some(vectors),
                    Err(e) if e.is_provider_failure() && !require_semantic => {
                        log::warn!("Embedding provider failed, building a lexical-only index: {e}");
                        None
                    }
                    Err(e) if e.is_provider_failure() => {
                        return Err(SearchError::EmbeddingProvider(e.to_string()))
                    }
                    Err(e) => return Err(SearchError::VectorStore(e)),
                }
            }
            None => {
                log::warn!("No embedding provider configured; building a lexical-only index");
                None
            }
        };

        Self::from_parts(store, Some(lexical), vectors)
    }

    #[must_use]
    pub const fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    #[must_use]
    pub const fn lexical(&self) -> Option<&LexicalIndex> {
        self.lexical.as_ref()
    }

    #[must_use]
    pub const fn vectors(&self) -> Option<&VectorIndex> {
        self.vectors.as_ref()
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.store.fingerprint()
    }
}

/// Outcome of querying one retrieval path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Ready { hits: usize },
    Unavailable { reason: String },
}

impl SourceStatus {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// A fused candidate with its knowledge entry attached
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub entry: KnowledgeEntry,
    #[serde(flatten)]
    pub candidate: ScoredCandidate,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    pub query: String,
    pub results: Vec<RankedEntry>,
    pub semantic: SourceStatus,
    pub lexical: SourceStatus,
}

impl RetrievalReport {
    /// Entries in ranking order
    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.results.iter().map(|r| &r.entry)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopResult {
    pub entry_id: usize,
    pub question: String,
    pub score: f32,
    pub match_kind: MatchKind,
}

/// Diagnostics for how a query was ranked
#[derive(Debug, Clone, Serialize)]
pub struct SearchExplanation {
    pub query: String,
    pub total_results: usize,
    pub semantic_only: usize,
    pub lexical_only: usize,
    pub both_match: usize,
    pub top_result: Option<TopResult>,
    pub important_keywords: Vec<(String, f32)>,
    /// Keywords the query shares with the top result
    pub matching_keywords: Vec<String>,
    pub weights: FusionWeights,
    pub semantic: SourceStatus,
    pub lexical: SourceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarQuestion {
    pub entry_id: usize,
    pub question: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAnswer {
    pub question: String,
    pub answer: String,
    pub context: String,
    pub sources: Vec<RankedEntry>,
}

/// Hybrid semantic + lexical retrieval over a knowledge base.
///
/// Queries run against an immutable [`IndexSnapshot`]. A rebuild constructs
/// a new snapshot in isolation and swaps it in once complete, so in-flight
/// queries keep the snapshot they started with.
pub struct HybridSearch {
    config: RetrievalConfig,
    vectorizer: VectorizerConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    require_semantic: bool,
    fusion: ScoreFusion,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl HybridSearch {
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        let weights = FusionWeights::new(config.semantic_weight, config.lexical_weight)?;
        Ok(Self {
            config,
            vectorizer: VectorizerConfig::default(),
            embedder: None,
            require_semantic: false,
            fusion: ScoreFusion::new(weights),
            snapshot: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Make rebuilds fail when the embedding provider does, instead of
    /// publishing a lexical-only snapshot.
    #[must_use]
    pub const fn with_required_semantic(mut self, required: bool) -> Self {
        self.require_semantic = required;
        self
    }

    #[must_use]
    pub fn with_vectorizer(mut self, vectorizer: VectorizerConfig) -> Self {
        self.vectorizer = vectorizer;
        self
    }

    /// Parse `raw_text` and build both indices.
    pub async fn initialize(&self, raw_text: &str) -> Result<()> {
        let store = KnowledgeStore::from_text(raw_text)?;
        self.rebuild(store, |_, _| {}).await
    }

    /// Build a fresh snapshot from `store` and publish it. The previous
    /// snapshot keeps serving until the build succeeds; on failure it stays.
    pub async fn rebuild<F>(&self, store: KnowledgeStore, progress: F) -> Result<()>
    where
        F: FnMut(usize, usize) + Send,
    {
        log::info!("Building search indices for {} entries", store.len());
        let snapshot = IndexSnapshot::build(
            store,
            &self.vectorizer,
            self.embedder.as_deref(),
            &self.config,
            self.require_semantic,
            progress,
        )
        .await?;
        self.publish(snapshot).await;
        Ok(())
    }

    /// Atomically replace the serving snapshot
    pub async fn publish(&self, snapshot: IndexSnapshot) {
        let entries = snapshot.store().len();
        let semantic = snapshot.vectors().is_some();
        *self.snapshot.write().await = Some(Arc::new(snapshot));
        log::info!(
            "Published search snapshot: {entries} entries, semantic index {}",
            if semantic { "ready" } else { "absent" }
        );
    }

    pub async fn is_ready(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// The serving snapshot, or `IndexNotReady` before the first publish
    pub async fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or(SearchError::IndexNotReady)
    }

    /// Fused ranking of the best `n` entries for `question`.
    ///
    /// A failing path is reported in the returned [`SourceStatus`] and the
    /// ranking uses whatever remains; only when both paths fail does this
    /// return `RetrievalUnavailable`.
    pub async fn query(&self, question: &str, n: usize) -> Result<RetrievalReport> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let snapshot = self.snapshot().await?;
        let k = n.max(self.config.candidate_pool);

        log::debug!("Hybrid query: '{question}', n={n}, k={k}");

        let (semantic_hits, semantic) = match self.semantic_hits(&snapshot, question, k).await {
            Ok(hits) => {
                let status = SourceStatus::Ready { hits: hits.len() };
                (hits, status)
            }
            Err(reason) => {
                log::warn!("Semantic retrieval unavailable, ranking lexically: {reason}");
                (Vec::new(), SourceStatus::Unavailable { reason })
            }
        };

        let (lexical_hits, lexical) = match lexical_ranking(&snapshot, question, k) {
            Ok(hits) => {
                let status = SourceStatus::Ready { hits: hits.len() };
                (hits, status)
            }
            Err(reason) => {
                log::warn!("Lexical retrieval unavailable: {reason}");
                (Vec::new(), SourceStatus::Unavailable { reason })
            }
        };

        if let (
            SourceStatus::Unavailable { reason: semantic_reason },
            SourceStatus::Unavailable { reason: lexical_reason },
        ) = (&semantic, &lexical)
        {
            return Err(SearchError::RetrievalUnavailable {
                semantic: semantic_reason.clone(),
                lexical: lexical_reason.clone(),
            });
        }

        let fused = self.fusion.fuse(&semantic_hits, &lexical_hits, n);
        let results = attach_entries(snapshot.store(), fused);

        log::debug!(
            "Semantic: {} hits, lexical: {} hits, fused: {}",
            semantic_hits.len(),
            lexical_hits.len(),
            results.len()
        );
        for (rank, result) in results.iter().take(3).enumerate() {
            log::debug!(
                "  #{}: {} (combined: {:.2}, type: {})",
                rank + 1,
                preview(&result.entry.question, 50),
                result.candidate.combined_score,
                result.candidate.match_kind
            );
        }

        Ok(RetrievalReport {
            query: question.to_string(),
            results,
            semantic,
            lexical,
        })
    }

    /// Generator context for `question`, bounded to `max_chars`
    pub async fn context_for(&self, question: &str, max_chars: usize) -> Result<String> {
        if max_chars == 0 {
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }
        let report = self.query(question, self.config.context_results).await?;
        Ok(ContextAssembler::new(max_chars).assemble(&report.query, report.entries()))
    }

    pub async fn explain(&self, question: &str) -> Result<SearchExplanation> {
        let report = self.query(question, EXPLAIN_RESULTS).await?;
        let snapshot = self.snapshot().await?;

        let count = |kind: MatchKind| {
            report
                .results
                .iter()
                .filter(|r| r.candidate.match_kind == kind)
                .count()
        };

        let matching_keywords = match (snapshot.lexical(), report.results.first()) {
            (Some(lexical), Some(top)) => lexical
                .explain_match(&report.query, top.entry.id)
                .map(|m| m.matching_keywords)
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        Ok(SearchExplanation {
            query: report.query.clone(),
            total_results: report.results.len(),
            semantic_only: count(MatchKind::Semantic),
            lexical_only: count(MatchKind::Lexical),
            both_match: count(MatchKind::Both),
            top_result: report.results.first().map(|top| TopResult {
                entry_id: top.entry.id,
                question: top.entry.question.clone(),
                score: top.candidate.combined_score,
                match_kind: top.candidate.match_kind,
            }),
            important_keywords: snapshot
                .lexical()
                .map(|lexical| lexical.important_terms(&report.query, EXPLAIN_KEYWORDS))
                .unwrap_or_default(),
            matching_keywords,
            weights: self.fusion.weights(),
            semantic: report.semantic,
            lexical: report.lexical,
        })
    }

    /// Stored questions semantically close to `question`, for "did you mean".
    ///
    /// Returns at most three, excluding the question itself. Empty when the
    /// semantic path is unavailable.
    pub async fn similar_questions(
        &self,
        question: &str,
        threshold: f32,
    ) -> Result<Vec<SimilarQuestion>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let snapshot = self.snapshot().await?;
        let k = snapshot.store().len();

        let hits = match self.semantic_hits(&snapshot, question, k).await {
            Ok(hits) => hits,
            Err(reason) => {
                log::warn!("Similar questions unavailable: {reason}");
                return Ok(Vec::new());
            }
        };

        let needle = question.to_lowercase();
        let mut similar = Vec::new();
        for (entry_id, similarity) in hits {
            if similarity < threshold {
                break;
            }
            let Some(entry) = lookup(snapshot.store(), entry_id) else {
                continue;
            };
            if entry.question.trim().to_lowercase() == needle {
                continue;
            }
            similar.push(SimilarQuestion {
                entry_id,
                question: entry.question.clone(),
                similarity,
            });
            if similar.len() == MAX_SIMILAR_QUESTIONS {
                break;
            }
        }
        Ok(similar)
    }

    /// Retrieve context for `question` and hand it to `generator`.
    pub async fn answer(
        &self,
        question: &str,
        generator: &dyn AnswerGenerator,
    ) -> Result<GeneratedAnswer> {
        let report = self.query(question, self.config.context_results).await?;
        let context = ContextAssembler::new(self.config.max_context_chars)
            .assemble(&report.query, report.entries());
        let answer = generator
            .generate(&report.query, &context)
            .await
            .map_err(|e| match e {
                SearchError::Generation(_) => e,
                other => SearchError::Generation(other.to_string()),
            })?;
        Ok(GeneratedAnswer {
            question: report.query,
            answer,
            context,
            sources: report.results,
        })
    }

    async fn semantic_hits(
        &self,
        snapshot: &IndexSnapshot,
        question: &str,
        k: usize,
    ) -> std::result::Result<Vec<(usize, f32)>, String> {
        let Some(vectors) = snapshot.vectors() else {
            return Err("semantic index not built".to_string());
        };
        let Some(embedder) = self.embedder.as_deref() else {
            return Err("no embedding provider configured".to_string());
        };
        if embedder.model_id() != vectors.model_id() {
            return Err(format!(
                "index built with '{}' but provider is '{}'",
                vectors.model_id(),
                embedder.model_id()
            ));
        }

        let embedding = embed_with_timeout(embedder, question, self.config.embed_timeout())
            .await
            .map_err(|e| e.to_string())?;
        vectors.search(&embedding, k).map_err(|e| e.to_string())
    }
}

fn lexical_ranking(
    snapshot: &IndexSnapshot,
    question: &str,
    k: usize,
) -> std::result::Result<Vec<(usize, f32)>, String> {
    match snapshot.lexical() {
        None => Err("lexical index not built".to_string()),
        Some(lexical) if lexical.vocabulary_len() == 0 => {
            Err("lexical vocabulary is empty".to_string())
        }
        Some(lexical) => Ok(lexical.search(question, k)),
    }
}

fn lookup(store: &KnowledgeStore, entry_id: usize) -> Option<&KnowledgeEntry> {
    match store.get(entry_id) {
        Ok(entry) => Some(entry),
        Err(e) => {
            log::error!("Index returned entry {entry_id} missing from the store: {e}");
            None
        }
    }
}

fn attach_entries(store: &KnowledgeStore, fused: Vec<ScoredCandidate>) -> Vec<RankedEntry> {
    fused
        .into_iter()
        .filter_map(|candidate| {
            lookup(store, candidate.entry_id).map(|entry| RankedEntry {
                entry: entry.clone(),
                explanation: candidate.explanation(),
                candidate,
            })
        })
        .collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
