use crate::config::FaqConfig;
use crate::flags::EmbedMode;
use anyhow::{Context, Result};
use faq_knowledge::KnowledgeStore;
use faq_lexical::LexicalIndex;
use faq_search::{HybridSearch, IndexSnapshot};
use faq_vector_store::{
    EmbeddingProvider, IndexCacheKey, OllamaEmbedder, StubEmbedder, VectorIndex,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// How `open_engine` treats the on-disk vector cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CachePolicy {
    /// Reuse a matching cache; on embedding failure serve lexical-only
    Reuse,
    /// Always re-embed and fail if the provider does
    Rebuild,
}

/// What `open_engine` ended up serving
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct EngineOrigin {
    pub entries: usize,
    pub embed_mode: EmbedMode,
    pub model_id: Option<String>,
    pub vectors_from_cache: bool,
    pub semantic_ready: bool,
}

pub(crate) fn embedder_for(config: &FaqConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.mode {
        EmbedMode::Ollama => Some(Arc::new(OllamaEmbedder::new(
            embedding.url.clone(),
            embedding.model.clone(),
        ))),
        EmbedMode::Stub => Some(Arc::new(StubEmbedder::new(embedding.dimension))),
        EmbedMode::Disabled => None,
    }
}

/// Load the knowledge base and publish a snapshot, reusing cached vectors
/// when their metric, model and knowledge fingerprint still match.
pub(crate) async fn open_engine(
    config: &FaqConfig,
    policy: CachePolicy,
    show_progress: bool,
) -> Result<(HybridSearch, EngineOrigin)> {
    let store = crate::load_store(config)?;

    let embedder = embedder_for(config);
    let require_semantic = policy == CachePolicy::Rebuild;
    let mut engine = HybridSearch::new(config.retrieval.clone())?
        .with_vectorizer(config.lexical.clone())
        .with_required_semantic(require_semantic);
    if let Some(embedder) = &embedder {
        engine = engine.with_embedder(Arc::clone(embedder));
    }

    let mut origin = EngineOrigin {
        entries: store.len(),
        embed_mode: config.embedding.mode,
        model_id: embedder.as_ref().map(|e| e.model_id()),
        vectors_from_cache: false,
        semantic_ready: false,
    };

    let Some(embedder) = embedder else {
        let snapshot = build_snapshot(store, config, None, false, false).await?;
        engine.publish(snapshot).await;
        return Ok((engine, origin));
    };

    let cache_path = config.vector_cache_path();
    if policy == CachePolicy::Reuse {
        let key = IndexCacheKey {
            metric: config.retrieval.metric,
            model_id: embedder.model_id(),
            fingerprint: store.fingerprint(),
        };
        if cache_path.exists() {
            match VectorIndex::load(&cache_path, &key).await {
                Ok(vectors) => {
                    let lexical = LexicalIndex::build(store.entries(), &config.lexical)?;
                    let snapshot = IndexSnapshot::from_parts(store, Some(lexical), Some(vectors))?;
                    engine.publish(snapshot).await;
                    origin.vectors_from_cache = true;
                    origin.semantic_ready = true;
                    return Ok((engine, origin));
                }
                Err(e) => log::info!("Ignoring vector cache {}: {e}", cache_path.display()),
            }
        }
    }

    let snapshot = build_snapshot(
        store,
        config,
        Some(embedder.as_ref()),
        require_semantic,
        show_progress,
    )
    .await?;

    if let Some(vectors) = snapshot.vectors() {
        origin.semantic_ready = true;
        let saved = vectors.save(&cache_path, &snapshot.fingerprint()).await;
        match saved {
            Ok(()) => log::info!("Wrote vector cache {}", cache_path.display()),
            Err(e) if policy == CachePolicy::Reuse => {
                log::warn!("Could not write vector cache {}: {e}", cache_path.display())
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to write vector cache {}", cache_path.display())
                })
            }
        }
    }

    engine.publish(snapshot).await;
    Ok((engine, origin))
}

async fn build_snapshot(
    store: KnowledgeStore,
    config: &FaqConfig,
    embedder: Option<&dyn EmbeddingProvider>,
    require_semantic: bool,
    show_progress: bool,
) -> Result<IndexSnapshot> {
    let bar = if show_progress && embedder.is_some() {
        embedding_progress_bar(store.len())
    } else {
        ProgressBar::hidden()
    };

    let progress = {
        let bar = bar.clone();
        move |done: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        }
    };

    let snapshot = IndexSnapshot::build(
        store,
        &config.lexical,
        embedder,
        &config.retrieval,
        require_semantic,
        progress,
    )
    .await;
    bar.finish_and_clear();
    Ok(snapshot?)
}

fn embedding_progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} {bar:40.cyan/blue} {pos}/{len} ({eta})")
    {
        bar.set_style(style);
    }
    bar.set_message("Embedding entries");
    bar
}
