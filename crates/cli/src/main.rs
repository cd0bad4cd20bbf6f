mod selector;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia_core::{
    load_config, BatchSummary, CacheBucket, Config, GameRecord, LookupRequest,
    MediaType, MovieRecord, Resolution, ResolvedReference, RunContext, SanitizedConfig,
};

use selector::StdinSelector;

#[derive(Debug, Parser)]
#[command(name = "marginalia", version, about = "Enrich media notes with provider metadata")]
struct Cli {
    /// Configuration file (falls back to MARGINALIA_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the effective configuration with secrets redacted
    Config,
    /// Resolve a title to a provider ID
    Lookup {
        title: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        imdb_id: Option<String>,
        #[arg(long = "type", value_enum)]
        kind: Option<Kind>,
        /// Ask when the match is ambiguous
        #[arg(short, long)]
        interactive: bool,
    },
    /// Enrich a JSON array of records in place (or into --output)
    Enrich {
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = Batch::Movies)]
        kind: Batch,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        interactive: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// Remove every entry of one bucket (omdb, tmdb, steam_search, steam)
    Clear { bucket: CacheBucket },
    /// Entry counts and age per bucket
    Stats,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Movie,
    Tv,
    Game,
}

impl From<Kind> for MediaType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Movie => MediaType::Movie,
            Kind::Tv => MediaType::Tv,
            Kind::Game => MediaType::Game,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Batch {
    Movies,
    Games,
}

#[derive(Debug, Serialize)]
struct LookupOutput<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedReference>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("MARGINALIA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    match cli.command {
        Command::Config => print_json(&SanitizedConfig::from(&config)),
        Command::Cache { action } => run_cache(config, action),
        Command::Lookup {
            title,
            year,
            imdb_id,
            kind,
            interactive,
        } => {
            let ctx = context(config, interactive)?;
            let request = LookupRequest::new(title)
                .with_year(year)
                .with_external_id(imdb_id)
                .expecting(kind.map(MediaType::from));
            run_lookup(&ctx, kind, &request).await
        }
        Command::Enrich {
            input,
            kind,
            output,
            interactive,
        } => {
            let ctx = context(config, interactive)?;
            let output = output.unwrap_or_else(|| input.clone());
            match kind {
                Batch::Movies => enrich_movies(&ctx, &input, &output).await,
                Batch::Games => enrich_games(&ctx, &input, &output).await,
            }
        }
    }
}

fn context(mut config: Config, interactive: bool) -> Result<RunContext> {
    config.enrichment.interactive |= interactive;
    let interactive = config.enrichment.interactive;

    let ctx = RunContext::from_config(config).context("Failed to set up providers")?;
    Ok(if interactive {
        ctx.with_selector(Arc::new(StdinSelector::new()))
    } else {
        ctx
    })
}

fn run_cache(config: Config, action: CacheAction) -> Result<()> {
    let ctx = RunContext::from_config(config).context("Failed to open cache")?;

    match action {
        CacheAction::Clear { bucket } => {
            let removed = ctx.cache().clear_bucket(bucket)?;
            info!(%bucket, removed, "Cache bucket cleared");
            println!("Removed {} entries from {}", removed, bucket);
            Ok(())
        }
        CacheAction::Stats => print_json(&ctx.cache().stats()?),
    }
}

async fn run_lookup(ctx: &RunContext, kind: Option<Kind>, request: &LookupRequest) -> Result<()> {
    let resolution = match kind {
        Some(Kind::Game) => ctx.steam_resolver().resolve(request).await?,
        _ => match ctx.tmdb_resolver() {
            Some(resolver) => resolver.resolve(request).await?,
            None => bail!("TMDB is not configured; add a [tmdb] section"),
        },
    };

    let resolved = match resolution {
        Resolution::Resolved(reference) => Some(reference),
        Resolution::Unresolved => None,
    };
    print_json(&LookupOutput {
        title: &request.title,
        resolved,
    })
}

async fn enrich_movies(ctx: &RunContext, input: &Path, output: &Path) -> Result<()> {
    let mut records: Vec<MovieRecord> = read_records(input)?;
    let enricher = ctx.movie_enricher(None)?;

    let result = tokio::select! {
        result = enricher.run_batch(&mut records) => result,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, saving what was enriched so far");
            Ok(BatchSummary::default())
        }
    };

    write_records(output, &records)?;
    report(result?);
    Ok(())
}

async fn enrich_games(ctx: &RunContext, input: &Path, output: &Path) -> Result<()> {
    let mut records: Vec<GameRecord> = read_records(input)?;
    let enricher = ctx.steam_enricher()?;

    let result = tokio::select! {
        result = enricher.run_batch(&mut records) => result,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, saving what was enriched so far");
            Ok(BatchSummary::default())
        }
    };

    write_records(output, &records)?;
    report(result?);
    Ok(())
}

fn report(summary: BatchSummary) {
    for warning in &summary.warnings {
        warn!(title = %warning.title, "{}", warning.message);
    }
    info!(
        processed = summary.processed,
        enriched = summary.enriched,
        warnings = summary.warnings.len(),
        "Enrichment finished"
    );
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse records in {:?}", path))
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let data = serde_json::to_string_pretty(records)?;
    std::fs::write(path, data).with_context(|| format!("Failed to write {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::parse_from([
            "marginalia",
            "lookup",
            "Heat",
            "--year",
            "1995",
            "--type",
            "movie",
            "-i",
        ]);
        match cli.command {
            Command::Lookup {
                title,
                year,
                kind,
                interactive,
                ..
            } => {
                assert_eq!(title, "Heat");
                assert_eq!(year, Some(1995));
                assert!(matches!(kind, Some(Kind::Movie)));
                assert!(interactive);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_clear_bucket() {
        let cli = Cli::parse_from(["marginalia", "--config", "x.toml", "cache", "clear", "steam-search"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        match cli.command {
            Command::Cache {
                action: CacheAction::Clear { bucket },
            } => assert_eq!(bucket, CacheBucket::SteamSearch),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
