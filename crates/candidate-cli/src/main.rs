//! Candidate Engine CLI
//!
//! The `candidates` command runs the verified-generation flows end to end.
//!
//! ## Commands
//!
//! - `resource`: one study resource whose link resolves
//! - `avatar`: one letter avatar approved by a vision judge
//! - `scholarships`: a verified batch of scholarship matches
//! - `search`: expanded, deduplicated place search
//! - `config`: print the effective engine configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use candidate_adapters::{
    AvatarGenerator, AvatarJudge, AvatarRequest, ChatClient, ChatQueryExpander, GeocodingConfig,
    GeocodingLookup, LinkVerifier, Place, ResourceGenerator, ResourceTopic, ScholarshipCriteria,
    ScholarshipGenerator, ScholarshipVerifier, StudentProfile, DEFAULT_PLACE_CATEGORIES,
};
use candidate_engine::{
    BatchWarning, CandidateEngine, EngineConfig, EngineError, UsageCounters, VerifierFailurePolicy,
};

#[derive(Parser)]
#[command(name = "candidates")]
#[command(author = "Advising Platform Engineering")]
#[command(version = candidate_engine::VERSION)]
#[command(about = "Generate, verify and retry: model suggestions you can trust", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML). CANDIDATES_* variables override it.
    #[arg(short, long, global = true, env = "CANDIDATES_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend one study resource with a reachable link
    Resource {
        /// Subject to study
        #[arg(short, long)]
        topic: String,

        /// Level, e.g. "intro" or "graduate"
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Generate a letter avatar checked by a vision model
    Avatar {
        /// Letter to draw
        #[arg(short, long)]
        letter: char,

        /// Visual style hint
        #[arg(short, long)]
        style: Option<String>,
    },

    /// Find scholarships matching a student profile
    Scholarships {
        /// Student profile (JSON)
        #[arg(short, long)]
        profile: PathBuf,
    },

    /// Search for places, expanding the query first
    Search {
        /// Free-text request, e.g. "quiet place to study near campus"
        query: String,

        /// Allowed place categories (repeatable; default: amenity, building, office, leisure)
        #[arg(short, long = "allow")]
        allow: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

fn resolve_config(path: Option<&Path>) -> Result<EngineConfig> {
    resolve_config_with(path, |key| std::env::var(key).ok())
}

/// File (if any), then overrides, then a single validation of the result.
fn resolve_config_with<F>(path: Option<&Path>, get: F) -> Result<EngineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => EngineConfig::read(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_overrides(get)?;
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn exhaustion into a user-facing message; rejection reasons stay in the logs.
fn user_facing(err: EngineError, what: &str) -> anyhow::Error {
    match err {
        EngineError::NoValidCandidate { attempts } => anyhow::anyhow!(
            "could not complete: no verified {what} after {attempts} attempt(s)"
        ),
        other => anyhow::Error::new(other),
    }
}

async fn cmd_resource(
    engine: &CandidateEngine,
    topic: String,
    level: Option<String>,
) -> Result<()> {
    let generator = ResourceGenerator::new(ChatClient::from_env()?);
    let verifier = LinkVerifier::new()?;
    let request = ResourceTopic { topic, level };

    let accepted = engine
        .single(&generator, &verifier, &request, &())
        .await
        .map_err(|e| user_facing(e, "study resource"))?;

    info!(attempts = accepted.attempts_made, "resource accepted");
    print_json(&accepted.candidate)
}

async fn cmd_avatar(engine: &CandidateEngine, letter: char, style: Option<String>) -> Result<()> {
    let chat = ChatClient::from_env()?;
    let generator = AvatarGenerator::new(chat.clone());
    let judge = AvatarJudge::new(chat);
    let request = AvatarRequest { letter, style };

    let mut policy = engine.config().retry_policy();
    policy.on_verifier_error = VerifierFailurePolicy::FailOpen;

    let accepted = engine
        .single_with_policy(&generator, &judge, &request, &request, policy)
        .await
        .map_err(|e| user_facing(e, "avatar"))?;

    info!(
        attempts = accepted.attempts_made,
        reasoning = %accepted.reasoning,
        "avatar accepted"
    );
    print_json(&accepted.candidate)
}

async fn cmd_scholarships(engine: &CandidateEngine, profile_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(profile_path)
        .with_context(|| format!("Failed to read profile {}", profile_path.display()))?;
    let profile: StudentProfile =
        serde_json::from_str(&raw).context("Profile is not valid JSON")?;

    let generator = ScholarshipGenerator::new(ChatClient::from_env()?);
    let verifier = ScholarshipVerifier::new(LinkVerifier::new()?);
    let criteria = ScholarshipCriteria::today();

    let outcome = engine
        .batch(&generator, &verifier, &profile, &criteria)
        .await;

    if let Some(BatchWarning::BelowMinimum {
        collected,
        target_min,
    }) = &outcome.warning
    {
        eprintln!(
            "warning: only {collected} verified scholarship(s), wanted at least {target_min}"
        );
    }
    print_json(&outcome.candidates)
}

async fn cmd_search(engine: &CandidateEngine, query: &str, allow: Vec<String>) -> Result<()> {
    let allowed: Vec<String> = if allow.is_empty() {
        DEFAULT_PLACE_CATEGORIES.iter().map(|c| c.to_string()).collect()
    } else {
        allow
    };
    let policy = engine
        .config()
        .search_policy()
        .with_allowed_categories(allowed);

    let expander = ChatQueryExpander::new(ChatClient::from_env()?, policy.max_queries);
    let lookup = GeocodingLookup::new(GeocodingConfig::from_env())?;

    let places: Vec<Place> = engine
        .search_with_policy(&expander, &lookup, query, &policy)
        .await;

    if places.is_empty() {
        eprintln!("No places found for '{query}'");
    }
    print_json(&places)
}

fn cmd_config(config: &EngineConfig) -> Result<()> {
    print_json(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    candidate_engine::init_tracing(cli.json, level);

    let config = resolve_config(cli.config.as_deref())?;
    let usage = Arc::new(UsageCounters::new());
    let engine = CandidateEngine::new(config)?.with_usage(usage.clone());

    let result = match cli.command {
        Commands::Resource { topic, level } => cmd_resource(&engine, topic, level).await,
        Commands::Avatar { letter, style } => cmd_avatar(&engine, letter, style).await,
        Commands::Scholarships { profile } => cmd_scholarships(&engine, &profile).await,
        Commands::Search { query, allow } => cmd_search(&engine, &query, allow).await,
        Commands::Config => cmd_config(engine.config()),
    };

    usage.flush();
    result
}
