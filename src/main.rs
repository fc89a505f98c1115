//! # Scholar Match CLI (`smatch`)
//!
//! Builds the recommendation engine from a TOML config and an
//! `authors_data` JSON file, then answers queries or serves HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `smatch recommend <user_id> "<need>"` | Rank researchers to introduce to a user |
//! | `smatch similar <id>` | Authors with the closest profile vectors |
//! | `smatch search "<text>"` | Plain semantic search over authors |
//! | `smatch graph <id>` | Direct and second-degree co-authors |
//! | `smatch validate` | Parse the payload and report counts |
//! | `smatch serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! smatch --config ./config/smatch.toml recommend 42 "graph neural networks for chemistry"
//! smatch recommend 42 "protein folding" --top-n 10 --no-llm --json
//! smatch similar 42 -k 3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scholar_match::config::{self, Config, LoggingConfig};
use scholar_match::dataset::load_authors_file;
use scholar_match::engine::{RecommendRequest, RecommendationEngine};
use scholar_match::graph::CoauthorGraph;
use scholar_match::models::{AuthorId, AuthorMatch, AuthorsData, RankedResult};
use scholar_match::server;
use scholar_match::vectorize::AuthorVectorizer;

/// Scholar Match: hybrid researcher recommendations from semantic
/// similarity, co-authorship proximity, and recency.
#[derive(Parser)]
#[command(name = "smatch", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/smatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend researchers for a user and a free-text research need.
    Recommend {
        /// Requesting author id.
        user_id: String,
        /// Research need.
        query: String,
        /// Number of results (defaults to `[retrieval].top_n`).
        #[arg(long)]
        top_n: Option<usize>,
        /// Vector candidates fetched before re-scoring.
        #[arg(long)]
        search_limit: Option<usize>,
        /// Skip the LLM rerank pass.
        #[arg(long)]
        no_llm: bool,
        #[arg(long)]
        json: bool,
    },

    /// List the authors most similar to a given author.
    Similar {
        id: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Semantic search over author profiles.
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Show an author's co-authorship neighbourhood.
    Graph {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Validate the authors payload without embedding anything.
    Validate,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.logging);

    match cli.command {
        Commands::Recommend {
            user_id,
            query,
            top_n,
            search_limit,
            no_llm,
            json,
        } => {
            let engine = load_engine(&cfg).await?;
            let request = RecommendRequest {
                requester_id: AuthorId::parse(&user_id),
                query,
                top_n: top_n.unwrap_or(cfg.retrieval.top_n),
                search_limit: search_limit.unwrap_or(cfg.retrieval.search_limit),
                use_llm: cfg.retrieval.use_llm && !no_llm,
            };
            let results = engine.recommend(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_ranked(&results);
            }
        }
        Commands::Similar { id, k, json } => {
            let engine = load_engine(&cfg).await?;
            let results =
                engine.similar_authors(&AuthorId::parse(&id), k.unwrap_or(cfg.retrieval.top_n))?;
            print_matches(&results, json)?;
        }
        Commands::Search { query, k, json } => {
            let engine = load_engine(&cfg).await?;
            let results = engine
                .search(&query, k.unwrap_or(cfg.retrieval.top_n))
                .await?;
            print_matches(&results, json)?;
        }
        Commands::Graph { id, json } => {
            let authors = load_authors_file(&cfg.data.authors_path)?;
            let graph = CoauthorGraph::build(&authors);
            print_neighbourhood(&authors, &graph, &AuthorId::parse(&id), json)?;
        }
        Commands::Validate => {
            let authors = load_authors_file(&cfg.data.authors_path)?;
            print_summary(&authors);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn load_engine(cfg: &Config) -> anyhow::Result<RecommendationEngine> {
    let engine = RecommendationEngine::from_config(cfg)?;
    let authors = load_authors_file(&cfg.data.authors_path)?;
    engine.refresh(authors).await?;
    Ok(engine)
}

fn print_ranked(results: &[RankedResult]) {
    if results.is_empty() {
        println!("No recommendations.");
        return;
    }
    for r in results {
        let last_year = r
            .components
            .last_publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>2}. {} (id {})  score={:.3}  vector={:.3}  {}  last={}",
            r.rank,
            r.name,
            r.id,
            r.final_score,
            r.components.vector_score,
            r.components.connection_label,
            last_year
        );
        if let Some(reasoning) = &r.llm_reasoning {
            println!("    {}", reasoning);
        }
    }
}

fn print_matches(results: &[AuthorMatch], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No matches.");
    }
    for (i, m) in results.iter().enumerate() {
        println!(
            "{:>2}. {} (id {})  score={:.3}  {}",
            i + 1,
            m.name,
            m.id,
            m.score,
            m.interests.join(", ")
        );
    }
    Ok(())
}

fn print_neighbourhood(
    authors: &AuthorsData,
    graph: &CoauthorGraph,
    id: &AuthorId,
    json: bool,
) -> anyhow::Result<()> {
    let name_of = |other: &AuthorId| {
        authors
            .get(other)
            .map(|a| a.name.as_str())
            .unwrap_or("Unknown")
    };
    let direct: Vec<&AuthorId> = graph.direct(id).into_iter().flatten().collect();
    let second: Vec<&AuthorId> = graph.second_degree(id).into_iter().flatten().collect();

    if json {
        let value = serde_json::json!({
            "id": id,
            "name": authors.get(id).map(|a| a.name.as_str()),
            "direct": direct,
            "second_degree": second,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match authors.get(id) {
        Some(a) => println!("{} (id {})", a.name, id),
        None => println!("Author {} is not in the payload", id),
    }
    println!("Co-authors ({}):", direct.len());
    for other in &direct {
        println!("  {} (id {})", name_of(other), other);
    }
    println!("2nd degree ({}):", second.len());
    for other in &second {
        println!("  {} (id {})", name_of(other), other);
    }
    Ok(())
}

fn print_summary(authors: &AuthorsData) {
    let graph = CoauthorGraph::build(authors);
    let publications: usize = authors.values().map(|a| a.publications.len()).sum();
    let dated = authors
        .values()
        .filter(|a| a.last_publication_year().is_some())
        .count();
    let empty = authors
        .values()
        .filter(|a| AuthorVectorizer::chunks(a).is_empty())
        .count();

    println!("authors:          {}", authors.len());
    println!("publications:     {}", publications);
    println!("co-author edges:  {}", graph.edge_count());
    println!("with dated pubs:  {}", dated);
    println!("without content:  {}", empty);
}
