//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Card news generator: scripts carousel scenes and illustrates them.
#[derive(Parser, Debug)]
#[command(name = "cardnews", version, about)]
pub struct Cli {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan scenes for a topic, illustrate them and export the cards.
    Generate(GenerateArgs),
    /// Re-export cards from a saved `cards.json`.
    Export(ExportArgs),
    /// Serve the image proxy and planner routes over HTTP.
    Serve(ServeArgs),
    /// Store API keys and provider settings in the config file.
    Settings(SettingsArgs),
}

/// Arguments of `cardnews generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Topic of the card news.
    #[arg(conflicts_with = "topic_file")]
    pub topic: Option<String>,

    /// Path to a file containing the topic.
    #[arg(short = 't', long, conflicts_with = "topic")]
    pub topic_file: Option<String>,

    /// Number of scenes (1-10).
    #[arg(short = 'n', long)]
    pub scenes: Option<u32>,

    /// Aspect ratio: 1:1, 9:16, 16:9.
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// Resolution: 2k, 4k.
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Art style: modern-minimal, watercolor, 3d-render, illustration, realistic.
    #[arg(long)]
    pub style: Option<String>,

    /// Image provider name or alias.
    #[arg(long)]
    pub provider: Option<String>,

    /// Reference image path (repeatable).
    #[arg(long = "reference")]
    pub references: Vec<PathBuf>,

    /// What the reference images condition: style, character, composition.
    #[arg(long, default_value = "style")]
    pub reference_mode: String,

    /// Directory for `cards.json` and the exports.
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Only write `cards.json`.
    #[arg(long)]
    pub no_export: bool,

    /// Surface provider errors instead of falling back to Pollinations.
    #[arg(long)]
    pub no_fallback: bool,
}

/// Arguments of `cardnews export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to a `cards.json` manifest.
    pub manifest: PathBuf,

    /// Output directory (defaults to the manifest's directory).
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Export only this card (1-based) as a PNG instead of the ZIP.
    #[arg(long)]
    pub card: Option<usize>,
}

/// Arguments of `cardnews serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address (defaults to the configured one).
    #[arg(long)]
    pub bind: Option<String>,
}

/// Arguments of `cardnews settings`. Omitted flags keep their stored value.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Google AI key (planner, gemini, google-ai).
    #[arg(long)]
    pub gemini_key: Option<String>,

    /// `OpenAI` key (dall-e).
    #[arg(long)]
    pub openai_key: Option<String>,

    /// Vertex AI access token or API key.
    #[arg(long)]
    pub vertex_key: Option<String>,

    /// Google Cloud project id for Vertex AI.
    #[arg(long)]
    pub project_id: Option<String>,

    /// Vertex AI region.
    #[arg(long)]
    pub location: Option<String>,

    /// Default image provider.
    #[arg(long)]
    pub provider: Option<String>,
}

impl SettingsArgs {
    /// Whether any value was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.gemini_key,
            &self.openai_key,
            &self.vertex_key,
            &self.project_id,
            &self.location,
            &self.provider,
        ]
        .iter()
        .all(|value| value.is_none())
    }
}

impl GenerateArgs {
    /// Resolve the topic from either the positional argument or the file flag.
    ///
    /// # Errors
    ///
    /// Returns an error if neither topic nor topic-file is provided,
    /// or if the file cannot be read.
    pub fn resolve_topic(&self) -> Result<String, std::io::Error> {
        if let Some(ref text) = self.topic {
            Ok(text.clone())
        } else if let Some(ref path) = self.topic_file {
            std::fs::read_to_string(path)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Provide a topic or use -t/--topic-file",
            ))
        }
    }
}
