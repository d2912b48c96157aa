mod cli;

use crossid::{
    batch::{self, BatchReport},
    config,
    engine::Engine,
    metadata::{MediaDetails, ProviderResolution},
};
use crossid_common::{KnownIds, LookupRequest, MediaKind};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;

/// Everything printed for one `resolve` invocation.
#[derive(Serialize)]
struct ResolveOutput<'a> {
    request: &'a LookupRequest,
    resolutions: Vec<ProviderResolution>,
    known_ids: KnownIds,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<MediaDetails>,
}

struct ResolveArgs {
    request: LookupRequest,
    provider: Option<String>,
    known: Vec<String>,
    strict: bool,
    details: bool,
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "crossid=debug,crossid_common=debug".to_string()
        } else {
            "crossid=info".to_string()
        }
    });

    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            title,
            original_title,
            year,
            kind,
            provider,
            known,
            strict,
            details,
            json,
        } => {
            let mut request = LookupRequest::new(title, kind);
            if let Some(original_title) = original_title {
                request = request.with_original_title(original_title);
            }
            if let Some(year) = year {
                request = request.with_year(year);
            }
            let args = ResolveArgs {
                request,
                provider,
                known,
                strict,
                details,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve(args, cli.config.as_deref()))
        }
        Commands::Batch {
            file,
            kind,
            strict,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(&file, kind, strict, json, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("crossid {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_engine(config_path: Option<&Path>, strict: bool) -> Result<Engine> {
    let mut config = config::load_config_or_default(config_path)?;
    if strict {
        config.resolver.strict = true;
    }

    let engine = Engine::from_config(&config)?;
    if engine.registry.available().is_empty() {
        anyhow::bail!(
            "No metadata providers available; add [[providers]] to the config or set TMDB_API_KEY / OMDB_API_KEY"
        );
    }
    Ok(engine)
}

fn parse_known_ids(pairs: &[String]) -> Result<KnownIds> {
    let mut known = KnownIds::new();
    for pair in pairs {
        let (source, id) = pair
            .split_once('=')
            .with_context(|| format!("Invalid --known value '{}', expected source=id", pair))?;
        if source.trim().is_empty() || id.trim().is_empty() {
            anyhow::bail!("Invalid --known value '{}', expected source=id", pair);
        }
        known.insert(source.trim(), id.trim());
    }
    Ok(known)
}

async fn resolve(args: ResolveArgs, config_path: Option<&Path>) -> Result<()> {
    let mut known_ids = parse_known_ids(&args.known)?;
    let engine = load_engine(config_path, args.strict)?;

    let resolutions = match &args.provider {
        Some(name) => {
            let provider = engine
                .registry
                .get(name)
                .filter(|p| p.is_available())
                .with_context(|| format!("Provider '{}' is not configured or has no API key", name))?;
            let result = engine
                .gateway
                .resolve(provider, &args.request, &mut known_ids)
                .await?;
            vec![ProviderResolution {
                provider: provider.name(),
                result,
            }]
        }
        None => {
            engine
                .registry
                .resolve_all(&engine.gateway, &args.request, &mut known_ids)
                .await?
        }
    };

    let mut details = Vec::new();
    if args.details {
        for resolution in &resolutions {
            let (Some(id), Some(provider)) =
                (resolution.result.id.as_deref(), engine.registry.get(resolution.provider))
            else {
                continue;
            };
            details.push(
                engine
                    .details
                    .fetch_all(provider, id, args.request.kind, &mut known_ids)
                    .await?,
            );
        }
    }

    let output = ResolveOutput {
        request: &args.request,
        resolutions,
        known_ids,
        details,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_resolution(&output);
    }

    Ok(())
}

fn print_resolution(output: &ResolveOutput<'_>) {
    println!("Title: {}", output.request.title);
    if let Some(original) = &output.request.original_title {
        println!("Original title: {}", original);
    }
    if let Some(year) = output.request.year {
        println!("Year: {}", year);
    }
    println!("Kind: {}", output.request.kind);
    println!();

    for resolution in &output.resolutions {
        match (&resolution.result.id, resolution.result.strategy) {
            (Some(id), Some(strategy)) => println!(
                "  {:<6} {} (via {}{})",
                resolution.provider,
                id,
                strategy,
                if resolution.result.matched_exactly { ", exact" } else { "" }
            ),
            _ => println!("  {:<6} not found", resolution.provider),
        }
    }

    if !output.known_ids.is_empty() {
        println!();
        println!("Known ids: {}", output.known_ids);
    }

    for details in &output.details {
        println!();
        println!("Details from {} ({}):", details.provider, details.id);
        match &details.metadata {
            Some(metadata) => {
                println!("  Title: {}", metadata.title);
                if let Some(year) = metadata.production_year {
                    println!("  Year: {}", year);
                }
                if !metadata.genres.is_empty() {
                    println!("  Genres: {}", metadata.genres.join(", "));
                }
                if let Some(runtime) = metadata.runtime_minutes {
                    println!("  Runtime: {} min", runtime);
                }
                if let Some(rating) = metadata.community_rating {
                    println!("  Rating: {:.1}", rating);
                }
            }
            None => println!("  No metadata"),
        }
        if let Some(images) = &details.images {
            if let Some(poster) = images.best_poster() {
                println!("  Poster: {}", poster.url);
            }
            if let Some(backdrop) = images.best_backdrop() {
                println!("  Backdrop: {}", backdrop.url);
            }
        }
        for trailer in &details.trailers {
            println!(
                "  Trailer: {} {}",
                trailer.name,
                trailer.url.as_deref().unwrap_or(&trailer.key)
            );
        }
    }
}

async fn run_batch(
    file: &Path,
    kind: MediaKind,
    strict: bool,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file: {:?}", file))?;
    let items = batch::parse_batch_file(&content, kind)
        .with_context(|| format!("Invalid batch file: {:?}", file))?;

    let engine = load_engine(config_path, strict)?;
    let report = engine.batch().run(items).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch(&report);
    }

    if let Some(pause) = &report.paused {
        anyhow::bail!(
            "Batch paused: provider '{}' unavailable ({}); {} item(s) pending",
            pause.provider,
            pause.reason,
            report.pending.len()
        );
    }
    Ok(())
}

fn print_batch(report: &BatchReport) {
    for item in &report.completed {
        let request = &item.item.request;
        let label = match request.year {
            Some(year) => format!("{} ({})", request.title, year),
            None => request.title.clone(),
        };
        match &item.outcome {
            batch::ItemOutcome::Resolved { .. } if item.is_found() => {
                println!("✓ {}: {}", label, item.item.known_ids)
            }
            batch::ItemOutcome::Resolved { .. } => println!("✗ {}: not found", label),
            batch::ItemOutcome::TimedOut => println!("✗ {}: timed out", label),
            batch::ItemOutcome::Invalid { reason } | batch::ItemOutcome::Failed { reason } => {
                println!("✗ {}: {}", label, reason)
            }
        }
    }
    for item in &report.pending {
        println!("… {}: pending", item.request.title);
    }
    println!();
    println!(
        "Resolved {}/{} title(s)",
        report.found(),
        report.completed.len() + report.pending.len()
    );
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };

    println!(
        "  Resolver: max_pages={}, max_diff={}, strict={}, algorithm={:?}",
        config.resolver.max_pages,
        config.resolver.max_diff,
        config.resolver.strict,
        config.resolver.algorithm
    );
    println!(
        "  Cache: capacity={}, ttl={}s",
        config.cache.capacity, config.cache.ttl_secs
    );
    println!("  Web search enabled: {}", config.web_search.enabled);
    println!(
        "  Batch: concurrency={}, timeout={}s",
        config.batch.concurrency, config.batch.timeout_secs
    );
    println!("  Providers: {}", config.providers.len());
    println!("    Enabled: {}", config.enabled_providers().count());

    Ok(())
}
