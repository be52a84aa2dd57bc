//! Gemini Studio CLI
//!
//! Serves the studio HTTP API and WebSocket events backed by Gemini.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use studio_core::{create_router, Config, Providers, Studio, StudioSettings};
use studio_genai::GeminiClient;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Gemini Studio - quizzes, image edits and chat
///
/// Generates multiple-choice quizzes on any topic, edits images from a text
/// instruction and answers questions, all through the Gemini API.
#[derive(Parser, Debug)]
#[command(name = "studio")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: studio.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port for the HTTP server
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Gemini Studio starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, wires the Gemini client into the studio and serves
/// until Ctrl+C.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref host) = args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    // Re-validate after overrides
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    print_config(&config);

    let api_key = read_api_key(&config.api_key_env)?;
    let client = GeminiClient::from_config(&config, api_key)
        .map_err(|e| anyhow::anyhow!("Failed to create Gemini client: {e}"))?;
    tracing::debug!(client = ?client, "Gemini client ready");

    let studio = Arc::new(Studio::new(
        Providers::shared(Arc::new(client)),
        StudioSettings::from_config(&config),
    ));
    let router = create_router(studio, config.max_upload_bytes);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Gemini Studio running on http://{addr}");
    println!("  API: http://{addr}/api");
    println!("  Events: ws://{addr}/ws");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

    tracing::info!("Gemini Studio stopped");
    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Reads the API key from the environment variable named in the config.
fn read_api_key(var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!(
            "Environment variable {var} is not set\n\nSuggestion: Export your Gemini API key as {var} or change apiKeyEnv in studio.json"
        ),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Endpoint: {}", config.base_url);
    println!("  Quiz model: {}", config.models.quiz);
    println!("  Image model: {}", config.models.image);
    println!("  Chat model: {}", config.models.chat);
    println!("  Questions per quiz: {}", config.question_count);
    println!("  Search grounding: {}", config.search_grounding);
    println!("  Malformed questions: {:?}", config.malformed_questions);
    println!("  Request timeout: {}s", config.request_timeout_secs);
}
