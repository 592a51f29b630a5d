//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docqa_core::pipeline::DEFAULT_TOP_K;
use docqa_core::{CompletionOutcome, JobKind, Pipeline, ProgressEvent};
use docqa_shared::config::{AppConfig, PipelineConfig, init_config, load_config, load_config_from};

use crate::server;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docqa — answer questions from a crawled documentation site.
#[derive(Parser)]
#[command(
    name = "docqa",
    version,
    about = "Crawl a documentation site and answer questions grounded in it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to an alternate config file (default ~/.docqa/docqa.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl the configured site and rebuild the chunk index.
    Update {
        /// Override the configured site base URL.
        #[arg(short, long)]
        url: Option<String>,

        /// Override the configured base-path prefix.
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Answer a question from the indexed documentation.
    Ask {
        /// Question to be answered.
        question: String,

        /// Number of chunks to retrieve as context.
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Start the HTTP server.
    Serve {
        /// Override the configured bind host.
        #[arg(long)]
        host: Option<String>,

        /// Override the configured bind port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docqa=info",
        1 => "docqa=debug",
        _ => "docqa=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Update { url, path } => {
            cmd_update(cli.config.as_deref(), url.as_deref(), path.as_deref()).await
        }
        Command::Ask { question, top_k } => cmd_ask(cli.config.as_deref(), &question, top_k).await,
        Command::Serve { host, port } => cmd_serve(cli.config.as_deref(), host, port).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
    }
}

fn load_app_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Build a configured pipeline from the config file plus CLI overrides.
fn build_pipeline(
    config_path: Option<&std::path::Path>,
    url: Option<&str>,
    base_path: Option<&str>,
) -> Result<Pipeline> {
    let mut app = load_app_config(config_path)?;
    if let Some(url) = url {
        app.site.base_url = url.to_string();
    }
    if let Some(base_path) = base_path {
        app.site.base_path = base_path.to_string();
    }

    let config = PipelineConfig::from_app(&app)?;
    Ok(Pipeline::configured(config))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_update(
    config_path: Option<&std::path::Path>,
    url: Option<&str>,
    base_path: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(config_path, url, base_path)?;

    info!("rebuilding documentation index");
    let progress = spawn_progress_display(&pipeline);
    let result = pipeline.run_job(JobKind::Rebuild).await;
    let _ = progress.await;
    result?;

    let chunks = pipeline.cached_manifest().map(|m| m.len()).unwrap_or(0);
    println!();
    println!("  Index rebuilt.");
    println!("  Chunks: {chunks}");
    println!();

    Ok(())
}

async fn cmd_ask(
    config_path: Option<&std::path::Path>,
    question: &str,
    top_k: usize,
) -> Result<()> {
    let pipeline = build_pipeline(config_path, None, None)?;

    match pipeline.ask(question, top_k).await? {
        CompletionOutcome::Answer(answer) => {
            println!("{answer}");
            Ok(())
        }
        CompletionOutcome::Error(message) => Err(eyre!("completion failed: {message}")),
    }
}

async fn cmd_serve(
    config_path: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let app = load_app_config(config_path)?;
    let host = host.unwrap_or_else(|| app.server.host.clone());
    let port = port.unwrap_or(app.server.port);

    let config = PipelineConfig::from_app(&app)?;
    let pipeline = Arc::new(Pipeline::configured(config));

    server::serve(pipeline, &host, port).await
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress display
// ---------------------------------------------------------------------------

/// Feed pipeline progress events into an indicatif spinner until the job
/// finishes.
fn spawn_progress_display(pipeline: &Pipeline) -> tokio::task::JoinHandle<()> {
    let mut rx = pipeline.subscribe_progress();
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("static template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                ProgressEvent::CrawlSizeKnown { links } => {
                    spinner.set_message(format!("Discovered {links} pages"));
                }
                ProgressEvent::LinkFetched {
                    link,
                    position,
                    total,
                } => {
                    spinner.set_message(format!("Fetching [{position}/{total}] {link}"));
                }
                ProgressEvent::ChunkPersisted { count, .. } => {
                    spinner.set_message(format!("Persisted {count} chunks"));
                }
                ProgressEvent::QuestionGenerated {
                    position, total, ..
                } => {
                    spinner.set_message(format!("Generating questions [{position}/{total}]"));
                }
                ProgressEvent::IndexBuilt { chunks } => {
                    spinner.set_message(format!("Index built ({chunks} chunks)"));
                }
                ProgressEvent::JobFinished { .. } => break,
                ProgressEvent::JobStarted { .. } => {}
            }
        }
        spinner.finish_and_clear();
    })
}
