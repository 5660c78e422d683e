//! Cardnews - AI card news generator.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod data_url;
mod error;
mod export;
mod fallback;
mod model;
mod params;
mod pipeline;
mod planner;
mod ports;
mod render;
mod server;

use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;

use crate::cli::{Cli, Command, ExportArgs, GenerateArgs, ServeArgs, SettingsArgs};
use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::CardNewsError;
use crate::export::Exporter;
use crate::fallback::FallbackPolicy;
use crate::model::resolve_provider;
use crate::params::ReferenceMode;
use crate::pipeline::{CardNewsPipeline, CardsManifest, GenerationRequest};
use crate::planner::ContentPlanner;
use crate::ports::ReferenceImage;
use crate::server::AppState;

const MANIFEST_FILE: &str = "cards.json";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "cardnews=debug" } else { "cardnews=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CardNewsError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(CardNewsError::Config)?;
    tracing::debug!(path = %config_path.display(), "config loaded");

    match cli.command {
        Command::Generate(args) => generate(args, &config).await,
        Command::Export(args) => export(args, &config).await,
        Command::Serve(args) => serve(args, &config).await,
        Command::Settings(args) => settings(&args, config, &config_path),
    }
}

/// Strict parse of an optional flag, falling back to the configured default.
fn parse_or<T: FromStr<Err = String>>(value: Option<&str>, default: T) -> Result<T, CardNewsError> {
    value.map_or(Ok(default), |v| v.parse().map_err(CardNewsError::InvalidArgument))
}

fn load_references(paths: &[PathBuf], mode: ReferenceMode) -> Result<Vec<ReferenceImage>, CardNewsError> {
    paths
        .iter()
        .map(|path| {
            let data = std::fs::read(path).map_err(|e| {
                CardNewsError::InvalidArgument(format!(
                    "Cannot read reference image {}: {e}",
                    path.display()
                ))
            })?;
            Ok(ReferenceImage::from_bytes(data, mode))
        })
        .collect()
}

fn exporter(config: &Config) -> Result<Exporter, CardNewsError> {
    let font = config.export.font.as_deref().map(render::load_font).transpose()?;
    Ok(Exporter::new(font))
}

async fn generate(args: GenerateArgs, config: &Config) -> Result<(), CardNewsError> {
    let topic = args.resolve_topic()?;

    let provider = match args.provider.as_deref() {
        Some(name) => resolve_provider(name),
        None => config.image.provider(),
    }
    .map_err(CardNewsError::InvalidArgument)?;
    let reference_mode: ReferenceMode =
        args.reference_mode.parse().map_err(CardNewsError::InvalidArgument)?;

    let request = GenerationRequest {
        topic: topic.trim().to_string(),
        scene_count: args.scenes.unwrap_or(config.defaults.scene_count),
        aspect_ratio: parse_or(args.aspect_ratio.as_deref(), config.defaults.aspect_ratio)?,
        resolution: parse_or(args.resolution.as_deref(), config.defaults.resolution)?,
        art_style: parse_or(args.style.as_deref(), config.defaults.art_style)?,
        reference_images: load_references(&args.references, reference_mode)?,
    };
    // Bad input must fail before any key lookup or network call.
    request.validate()?;

    if !request.reference_images.is_empty() && !provider.supports_reference_images() {
        tracing::warn!(%provider, "provider ignores reference images");
    }
    tracing::debug!(%provider, scenes = request.scene_count, "starting generation");

    let (ctx, recording_session) = ServiceContext::from_env(provider, &config.credentials())?;
    let result = {
        let policy = FallbackPolicy::from(config.image.fallback && !args.no_fallback);
        let illustrator =
            context::illustrator(Arc::clone(&ctx.generator), provider, policy, config.image.timeout());
        let pipeline = CardNewsPipeline::new(ContentPlanner::new(Arc::clone(&ctx.text)), illustrator);
        pipeline
            .run(&request, |stage| eprintln!("[{:>3}%] {}", stage.percent(), stage.message()))
            .await
    };
    drop(ctx);

    // Failed runs are recorded too.
    if let Some(session) = recording_session {
        match session.finish() {
            Ok(path) => eprintln!("Cassette saved: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to save cassette: {e}"),
        }
    }
    let cards = result?;

    let manifest =
        CardsManifest { topic: request.topic.clone(), aspect_ratio: request.aspect_ratio, cards };
    let manifest_path = args.out_dir.join(MANIFEST_FILE);
    manifest.save(&manifest_path)?;
    eprintln!("Saved: {}", manifest_path.display());

    let fallbacks = manifest.cards.iter().filter(|card| card.used_fallback).count();
    if fallbacks > 0 {
        eprintln!("Note: {fallbacks} card(s) were drawn by the free fallback provider");
    }

    if !args.no_export {
        let report = exporter(config)?.export_all(&manifest.cards, &manifest.topic, &args.out_dir).await?;
        eprintln!("Saved: {}", report.path.display());
        if report.failed > 0 {
            eprintln!("Warning: {} card(s) could not be exported", report.failed);
        }
    }
    Ok(())
}

async fn export(args: ExportArgs, config: &Config) -> Result<(), CardNewsError> {
    let manifest = CardsManifest::load(&args.manifest)?;
    let out_dir = args.out_dir.unwrap_or_else(|| {
        args.manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    });
    let exporter = exporter(config)?;

    if let Some(index) = args.card {
        let card = index
            .checked_sub(1)
            .and_then(|i| manifest.cards.get(i))
            .ok_or_else(|| {
                CardNewsError::InvalidArgument(format!(
                    "Card {index} does not exist; the manifest has {} card(s)",
                    manifest.cards.len()
                ))
            })?;
        let path = exporter.export_one(card, index, &manifest.topic, &out_dir).await?;
        eprintln!("Saved: {}", path.display());
        return Ok(());
    }

    let report = exporter.export_all(&manifest.cards, &manifest.topic, &out_dir).await?;
    eprintln!("Saved: {}", report.path.display());
    if report.failed > 0 {
        eprintln!("Warning: {} card(s) could not be exported", report.failed);
    }
    Ok(())
}

async fn serve(args: ServeArgs, config: &Config) -> Result<(), CardNewsError> {
    let provider = config.image.provider().map_err(CardNewsError::Config)?;
    let state = AppState::new(provider, config.credentials(), config.server.credentials)
        .with_policy(FallbackPolicy::from(config.image.fallback))
        .with_timeout(config.image.timeout());
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    eprintln!("Serving on http://{bind}");
    server::serve(&bind, state).await
}

fn status(value: Option<&String>) -> &'static str {
    if value.is_some_and(|v| !v.trim().is_empty()) {
        "set"
    } else {
        "not set"
    }
}

fn settings(args: &SettingsArgs, mut config: Config, path: &Path) -> Result<(), CardNewsError> {
    if args.is_empty() {
        println!("Config: {}", path.display());
        println!("gemini key:  {}", status(config.keys.gemini.as_ref()));
        println!("openai key:  {}", status(config.keys.openai.as_ref()));
        println!("vertex key:  {}", status(config.keys.vertex.as_ref()));
        println!("project id:  {}", config.vertex.project_id.as_deref().unwrap_or("-"));
        println!("location:    {}", config.vertex.location.as_deref().unwrap_or("-"));
        println!("provider:    {}", config.image.provider);
        return Ok(());
    }

    if let Some(ref name) = args.provider {
        let provider = resolve_provider(name).map_err(CardNewsError::InvalidArgument)?;
        config.image.provider = provider.name().to_string();
    }
    if let Some(ref key) = args.gemini_key {
        config.keys.gemini = Some(key.clone());
    }
    if let Some(ref key) = args.openai_key {
        config.keys.openai = Some(key.clone());
    }
    if let Some(ref key) = args.vertex_key {
        config.keys.vertex = Some(key.clone());
    }
    if let Some(ref project_id) = args.project_id {
        config.vertex.project_id = Some(project_id.clone());
    }
    if let Some(ref location) = args.location {
        config.vertex.location = Some(location.clone());
    }

    config.save(path).map_err(CardNewsError::Config)?;
    eprintln!("Saved: {}", path.display());
    Ok(())
}
