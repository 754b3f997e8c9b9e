//! # hark
//!
//! Transcription service binary: REST + MCP server, plus one-shot CLI
//! commands over the same pipeline.

mod api;
mod mcp;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hark_core::model::list_models;
use hark_core::{ConsoleProgress, PipelineConfig, TranscribeRequest, Transcriber};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server::AppState;

/// Media to transcript service.
#[derive(Parser, Debug)]
#[command(name = "hark", version, about = "Transcribe audio/video with whisper.cpp")]
struct Cli {
    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding ggml model files.
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Model used when a request does not name one.
    #[arg(long, global = true)]
    default_model: Option<String>,

    /// Where downloaded media is saved.
    #[arg(long, global = true)]
    media_dir: Option<PathBuf>,

    /// Items transcribed concurrently per batch.
    #[arg(long, global = true)]
    max_parallel: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long, env = "HARK_LISTEN", default_value = "0.0.0.0:28796")]
        listen: SocketAddr,
    },
    /// Transcribe inputs and print the batch as JSON.
    Transcribe {
        /// Local paths or http(s) URLs.
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(short, long, default_value = "")]
        model: String,
        #[arg(short, long, default_value = "")]
        lang: String,
        /// Engine threads; 0 picks a default.
        #[arg(short = 't', long, default_value_t = 0)]
        threads: i32,
    },
    /// List known models and whether they are installed.
    Models,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(model) = &self.default_model {
            config.default_model = model.clone();
        }
        if let Some(dir) = &self.media_dir {
            config.media_dir = dir.clone();
        }
        if let Some(n) = self.max_parallel {
            config.max_parallel = n.max(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Flags with env fallbacks must see .env values
    hark_core::config::load_dotenv();
    let cli = Cli::parse();

    hark_core::set_verbose(cli.verbose);
    hark_core::init_logging();

    // After logging so invalid environment values are reported
    let mut config = PipelineConfig::from_env();
    cli.apply(&mut config);

    match &cli.command {
        Command::Serve { listen } => run_serve(config, *listen).await,
        Command::Transcribe {
            inputs,
            model,
            lang,
            threads,
        } => {
            let req = TranscribeRequest {
                in_paths: inputs.clone(),
                model: model.clone(),
                lang: lang.clone(),
                threads: *threads,
                models_dir: config.models_dir.clone(),
            };
            run_transcribe(config, req).await
        }
        Command::Models => run_models(&config),
    }
}

async fn build_transcriber(config: &PipelineConfig) -> Result<Transcriber> {
    let transcriber = Transcriber::from_config(config, hark_core::default_engine())
        .context("failed to build transcription pipeline")?;

    if let Err(e) = transcriber.audio().decoder().probe().await {
        warn!(error = %e, "ffmpeg not usable; only 16 kHz mono WAV input will decode");
    }
    if transcriber.engine().name() == "unavailable" {
        warn!("built without a recognition backend; rebuild with --features whisper");
    }
    Ok(transcriber)
}

async fn run_serve(config: PipelineConfig, listen: SocketAddr) -> Result<()> {
    let transcriber = build_transcriber(&config).await?;
    info!(
        models_dir = %config.models_dir.display(),
        default_model = %config.default_model,
        max_parallel = config.max_parallel,
        "starting server"
    );
    let state = AppState {
        transcriber: Arc::new(transcriber),
        models_dir: config.models_dir.clone(),
        shutdown: CancellationToken::new(),
    };
    server::serve(listen, state).await
}

async fn run_transcribe(config: PipelineConfig, req: TranscribeRequest) -> Result<()> {
    let transcriber = build_transcriber(&config)
        .await?
        .with_progress(Arc::new(ConsoleProgress::default()));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let batch = transcriber
        .transcribe_batch(&req, &cancel)
        .await
        .context("transcription failed")?;
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}

fn run_models(config: &PipelineConfig) -> Result<()> {
    println!("Models in {}:", config.models_dir.display());
    for status in list_models(&config.models_dir) {
        let marker = if status.installed { "*" } else { " " };
        println!(
            "  {marker} {:<12} {:<22} {}",
            status.info.alias, status.info.filename, status.info.description
        );
    }
    println!("\n* = installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_override_loaded_config() {
        let cli = Cli::try_parse_from([
            "hark",
            "--models-dir",
            "/srv/models",
            "--max-parallel",
            "0",
            "models",
        ])
        .unwrap();
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.max_parallel, 1);
        assert_eq!(config.default_model, "medium");
        assert!(matches!(cli.command, Command::Models));
    }

    #[test]
    fn transcribe_requires_inputs() {
        assert!(Cli::try_parse_from(["hark", "transcribe"]).is_err());
        let cli = Cli::try_parse_from(["hark", "transcribe", "a.wav", "-t", "3", "--lang", "de"])
            .unwrap();
        match cli.command {
            Command::Transcribe { inputs, threads, lang, .. } => {
                assert_eq!(inputs, vec!["a.wav"]);
                assert_eq!(threads, 3);
                assert_eq!(lang, "de");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
