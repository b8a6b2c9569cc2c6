use anyhow::{Context as AnyhowContext, Result};
use cache::{open_engine, CachePolicy, EngineOrigin};
use clap::{Args, Parser, Subcommand};
use config::FaqConfig;
use faq_knowledge::KnowledgeStore;
use faq_search::OllamaGenerator;
use flags::EmbedMode;
use serde::Serialize;
use std::env;
use std::io;
use std::path::PathBuf;

mod cache;
mod config;
mod flags;
mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "faq")]
#[command(about = "Hybrid semantic + keyword search over a Q&A knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./faq.toml when present)
    #[arg(long, global = true, env = "FAQ_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base file with Q:/A: markers
    #[arg(long, global = true, env = "FAQ_KB")]
    kb: Option<PathBuf>,

    /// Directory for the vector index cache
    #[arg(long, global = true, env = "FAQ_CACHE_DIR")]
    cache: Option<PathBuf>,

    /// Embedding backend for the semantic path
    #[arg(long, global = true, value_enum, env = "FAQ_EMBED_MODE")]
    embed_mode: Option<EmbedMode>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show knowledge base statistics
    Stats(StatsArgs),

    /// Build the lexical and vector indices and write the vector cache
    Index(IndexArgs),

    /// Rank knowledge entries for a query
    Search(SearchArgs),

    /// Assemble the generator context for a query
    Context(ContextArgs),

    /// Answer a question with retrieved context and a completion model
    Ask(AskArgs),

    /// Show how a query was ranked
    Explain(ExplainArgs),

    /// List the most important keywords of a text
    Terms(TermsArgs),

    /// Suggest stored questions similar to a question
    Similar(SimilarArgs),

    /// Case-insensitive substring lookup over questions and answers
    Find(FindArgs),
}

#[derive(Args)]
struct StatsArgs {
    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value_t = 5)]
    limit: usize,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ContextArgs {
    /// Search query
    query: String,

    /// Character budget (default: retrieval.max_context_chars)
    #[arg(long)]
    max_chars: Option<usize>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct AskArgs {
    /// Question to answer
    query: String,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExplainArgs {
    /// Search query
    query: String,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TermsArgs {
    /// Text to analyze
    text: String,

    /// Number of terms
    #[arg(long, short = 'n', default_value_t = 10)]
    limit: usize,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SimilarArgs {
    /// Question to compare against stored questions
    question: String,

    /// Minimum similarity (default: retrieval.similar_threshold)
    #[arg(long)]
    threshold: Option<f32>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FindArgs {
    /// Text to look for
    term: String,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Commands::Stats(args) => args.json,
            Commands::Index(args) => args.json,
            Commands::Search(args) => args.json,
            Commands::Context(args) => args.json,
            Commands::Ask(args) => args.json,
            Commands::Explain(args) => args.json,
            Commands::Terms(args) => args.json,
            Commands::Similar(args) => args.json,
            Commands::Find(args) => args.json,
        }
    }
}

#[derive(Serialize)]
struct IndexSummary {
    #[serde(flatten)]
    origin: EngineOrigin,
    vocabulary: usize,
    relaxed_vocabulary: bool,
    cache: Option<PathBuf>,
}

#[derive(Serialize)]
struct ContextOutput<'a> {
    query: &'a str,
    max_chars: usize,
    context: String,
}

#[derive(Serialize)]
struct TermsOutput<'a> {
    text: &'a str,
    terms: Vec<(String, f32)>,
}

#[derive(Serialize)]
struct SimilarOutput<'a> {
    question: &'a str,
    threshold: f32,
    similar: Vec<faq_search::SimilarQuestion>,
}

/// Merge file, environment and flag settings (flag > env > file > default).
fn resolve_config(cli: &Cli) -> Result<FaqConfig> {
    let mut config = FaqConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| env::var(key).ok())?;

    if let Some(kb) = &cli.kb {
        config.knowledge.path = kb.clone();
    }
    if let Some(cache) = &cli.cache {
        config.knowledge.cache_dir = cache.clone();
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode;
    }

    config.validate()?;
    Ok(config)
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    if cli.command.json() {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(&cli)?;
    log::debug!(
        "Knowledge base {}, embedding mode {}",
        config.knowledge.path.display(),
        config.embedding.mode
    );
    let show_progress = !cli.quiet;

    match cli.command {
        Commands::Stats(args) => run_stats(args, &config)?,
        Commands::Index(args) => run_index(args, &config, show_progress).await?,
        Commands::Search(args) => run_search(args, &config, show_progress).await?,
        Commands::Context(args) => run_context(args, &config, show_progress).await?,
        Commands::Ask(args) => run_ask(args, &config, show_progress).await?,
        Commands::Explain(args) => run_explain(args, &config, show_progress).await?,
        Commands::Terms(args) => run_terms(args, &config, show_progress).await?,
        Commands::Similar(args) => run_similar(args, &config, show_progress).await?,
        Commands::Find(args) => run_find(args, &config)?,
    }

    Ok(())
}

fn load_store(config: &FaqConfig) -> Result<KnowledgeStore> {
    KnowledgeStore::from_path(&config.knowledge.path).with_context(|| {
        format!(
            "Failed to load knowledge base {}",
            config.knowledge.path.display()
        )
    })
}

fn run_stats(args: StatsArgs, config: &FaqConfig) -> Result<()> {
    let stats = load_store(config)?.stats();

    if args.json {
        print_json(&stats)?;
    } else {
        print_stdout(&report::render_stats(&stats))?;
    }
    Ok(())
}

async fn run_index(args: IndexArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let (engine, origin) = open_engine(config, CachePolicy::Rebuild, show_progress).await?;
    let snapshot = engine.snapshot().await?;
    let lexical = snapshot.lexical();

    let summary = IndexSummary {
        vocabulary: lexical.map_or(0, |l| l.vocabulary_len()),
        relaxed_vocabulary: lexical.is_some_and(|l| l.used_relaxed_vocabulary()),
        cache: origin
            .semantic_ready
            .then(|| config.vector_cache_path()),
        origin,
    };

    if args.json {
        print_json(&summary)?;
    } else {
        eprintln!(
            "Indexed {} entries ({} lexical terms{}), semantic index {}",
            summary.origin.entries,
            summary.vocabulary,
            if summary.relaxed_vocabulary {
                ", relaxed vocabulary"
            } else {
                ""
            },
            match &summary.cache {
                Some(path) => format!("cached at {}", path.display()),
                None => "disabled".to_string(),
            }
        );
    }
    Ok(())
}

/// Rank knowledge entries for a query
async fn run_search(args: SearchArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let report = engine.query(&args.query, args.limit).await?;

    if args.json {
        print_json(&report)?;
    } else {
        print_stdout(&report::render_search(&report))?;
    }
    Ok(())
}

async fn run_context(args: ContextArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let max_chars = args
        .max_chars
        .unwrap_or(config.retrieval.max_context_chars);
    let context = engine.context_for(&args.query, max_chars).await?;

    if args.json {
        print_json(&ContextOutput {
            query: args.query.trim(),
            max_chars,
            context,
        })?;
    } else {
        print_stdout(&context)?;
    }
    Ok(())
}

async fn run_ask(args: AskArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let generation = &config.generation;
    let generator = OllamaGenerator::new(
        generation.url.clone(),
        generation.model.clone(),
        generation.timeout(),
    )?
    .with_temperature(generation.temperature)
    .with_max_tokens(generation.max_tokens);

    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let answer = engine
        .answer(&args.query, &generator)
        .await
        .with_context(|| format!("Failed to answer with model {}", generator.model()))?;

    if args.json {
        print_json(&answer)?;
    } else {
        print_stdout(&report::render_answer(&answer))?;
    }
    Ok(())
}

async fn run_explain(args: ExplainArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let explanation = engine.explain(&args.query).await?;

    if args.json {
        print_json(&explanation)?;
    } else {
        print_stdout(&report::render_explanation(&explanation))?;
    }
    Ok(())
}

async fn run_terms(args: TermsArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let snapshot = engine.snapshot().await?;
    let terms = snapshot
        .lexical()
        .map(|lexical| lexical.important_terms(&args.text, args.limit))
        .unwrap_or_default();

    if args.json {
        print_json(&TermsOutput {
            text: &args.text,
            terms,
        })?;
    } else {
        print_stdout(&report::render_terms(&terms))?;
    }
    Ok(())
}

async fn run_similar(args: SimilarArgs, config: &FaqConfig, show_progress: bool) -> Result<()> {
    let threshold = args
        .threshold
        .unwrap_or(config.retrieval.similar_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("--threshold must be within [0, 1], got {threshold}");
    }

    let (engine, _) = open_engine(config, CachePolicy::Reuse, show_progress).await?;
    let similar = engine.similar_questions(&args.question, threshold).await?;

    if args.json {
        print_json(&SimilarOutput {
            question: &args.question,
            threshold,
            similar,
        })?;
    } else {
        print_stdout(&report::render_similar(&args.question, &similar))?;
    }
    Ok(())
}

fn run_find(args: FindArgs, config: &FaqConfig) -> Result<()> {
    let store = load_store(config)?;
    let matches = store.search_by_substring(&args.term);

    if args.json {
        print_json(&matches)?;
    } else {
        print_stdout(&report::render_matches(&args.term, &matches))?;
    }
    Ok(())
}
