//! newslens-trust - operator CLI
//!
//! Classify text, preview seeds, submit documents and cast or inspect votes
//! against the local SQLite store. Output is JSON on stdout; logs go to
//! stderr through tracing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newslens_common::config::{write_toml_config, TomlConfig};
use newslens_common::events::EventBus;
use newslens_common::{db, BiasClass, VoteInput};
use newslens_trust::bias::seed::{parse_lean, SeedInput, SourceReputation};
use newslens_trust::bias::{estimate_seed, normalizer};
use newslens_trust::store::{DocumentStore, SqliteStore};
use newslens_trust::{create_document, ClassifierClient, NewSubmission, VoteEngine};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "newslens-trust")]
#[command(about = "Trust scoring tools for newslens")]
#[command(version)]
struct Args {
    /// Config file (default: NEWSLENS_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides NEWSLENS_DATABASE and the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify text with the remote zero-shot classifier
    Classify {
        /// Text to classify
        text: String,
    },
    /// Preview the seed distribution for submission metadata
    Seed {
        /// left, center, right or none
        #[arg(long, default_value = "none")]
        lean: String,
        /// verified, questionable or unknown
        #[arg(long, default_value = "unknown")]
        reputation: SourceReputation,
        #[arg(long, default_value_t = 1)]
        sources: u32,
    },
    /// Map a signed lean in [-1, 1] to a distribution and label
    Lean {
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
    /// Store a new document seeded from submission metadata
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long, default_value = "none")]
        lean: String,
        #[arg(long, default_value = "unknown")]
        reputation: SourceReputation,
        #[arg(long, default_value_t = 1)]
        sources: u32,
    },
    /// Cast or replace a vote
    Vote {
        #[arg(long)]
        user: String,
        #[arg(long)]
        document: String,
        #[arg(long)]
        bias: BiasClass,
        #[arg(long)]
        credibility: u8,
        #[arg(long)]
        quality: u8,
    },
    /// Retract a vote
    Retract {
        #[arg(long)]
        user: String,
        #[arg(long)]
        document: String,
    },
    /// Show a document's stored and recomputed trust statistics
    Stats { document: String },
    /// Show a user's recent votes
    History {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Users with the most votes
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Agreement of a user's votes with the community, 0-100
    Accuracy {
        #[arg(long)]
        user: String,
    },
    /// Write the effective configuration to a file
    InitConfig { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn seed_input(lean: &str, reputation: SourceReputation, sources: u32) -> Result<SeedInput> {
    Ok(SeedInput {
        suggested_bias: parse_lean(lean)?,
        reputation,
        source_count: sources,
    })
}

async fn open_store(config: &TomlConfig, cli_db: Option<&PathBuf>) -> Result<Arc<SqliteStore>> {
    let db_path = config.resolve_database_path(cli_db.map(|p| p.as_path()));
    info!("Database path: {}", db_path.display());
    let pool = db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(Arc::new(SqliteStore::with_snapshot_capacity(
        pool,
        config.sync.snapshot_capacity,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting newslens-trust v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let event_bus = EventBus::new(config.sync.event_capacity);

    match args.command {
        Command::Classify { text } => {
            let client = ClassifierClient::new(&config.classifier)?;
            let assessment = client.classify(&text).await?;
            print_json(&assessment)?;
        }
        Command::Seed {
            lean,
            reputation,
            sources,
        } => {
            let input = seed_input(&lean, reputation, sources)?;
            print_json(&estimate_seed(&input))?;
        }
        Command::Lean { value } => {
            print_json(&serde_json::json!({
                "score": normalizer::lean_to_score(value),
                "class": normalizer::lean_class(value),
                "label": normalizer::lean_label(value),
            }))?;
        }
        Command::Submit {
            title,
            summary,
            category,
            lean,
            reputation,
            sources,
        } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let submission = NewSubmission {
                title,
                summary,
                category,
                seed: seed_input(&lean, reputation, sources)?,
            };
            let document = create_document(store.as_ref(), &event_bus, submission).await?;
            print_json(&document)?;
        }
        Command::Vote {
            user,
            document,
            bias,
            credibility,
            quality,
        } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let engine = VoteEngine::new(store, event_bus);
            let input = VoteInput {
                bias,
                credibility,
                quality,
            };
            print_json(&engine.submit_vote(&user, &document, input).await?)?;
        }
        Command::Retract { user, document } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let engine = VoteEngine::new(store, event_bus);
            match engine.retract_vote(&user, &document).await? {
                Some(stats) => print_json(&stats)?,
                None => info!(%user, %document, "No vote to retract"),
            }
        }
        Command::Stats { document } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let stored = store
                .get_document(&document)
                .await?
                .with_context(|| format!("Document {} not found", document))?;
            let dominant = stored.stats.bias_score.dominant();
            let engine = VoteEngine::new(store, event_bus);
            let recomputed = engine.get_stats(&document).await?;
            print_json(&serde_json::json!({
                "document": stored,
                "recomputed": recomputed,
                "dominant": dominant,
            }))?;
        }
        Command::History { user, limit } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let engine = VoteEngine::new(store, event_bus);
            print_json(&engine.user_history(&user, limit).await?)?;
        }
        Command::Top { limit } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let engine = VoteEngine::new(store, event_bus);
            print_json(&engine.top_contributors(limit).await?)?;
        }
        Command::Accuracy { user } => {
            let store = open_store(&config, args.database.as_ref()).await?;
            let engine = VoteEngine::new(store, event_bus);
            print_json(&serde_json::json!({
                "user_id": user,
                "accuracy": engine.user_accuracy(&user).await?,
            }))?;
        }
        Command::InitConfig { path } => {
            write_toml_config(&config, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote config to {}", path.display());
        }
    }

    Ok(())
}
