//! Main entry point for CLI command to start server.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::axum_factory;
use crate::configuration::Configuration;
use crate::configuration::generate_config_schema;
use crate::service::TweetGraph;

/// Options for the server
#[derive(Parser, Debug)]
#[command(name = "tweet-graph", about = "GraphQL API over a tweet feed", version)]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[arg(
        long = "log",
        default_value = "info",
        alias = "log-level",
        env = "TWEET_GRAPH_LOG"
    )]
    log_level: String,

    /// Configuration location relative to the project directory.
    #[arg(short, long = "config", env = "TWEET_GRAPH_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Prints the configuration schema.
    #[arg(long)]
    schema: bool,
}

/// The server entrypoint.
pub fn main() -> Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(nb) = std::env::var("TWEET_GRAPH_NUM_CORES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        builder.worker_threads(nb);
    }
    let runtime = builder.build()?;
    runtime.block_on(start(Opt::parse()))
}

async fn start(opt: Opt) -> Result<()> {
    if opt.schema {
        let schema = generate_config_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let builder = tracing_subscriber::fmt::fmt().with_env_filter(
        EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
    );
    if std::io::stdout().is_terminal() {
        builder.init();
    } else {
        builder.json().init();
    }

    let configuration = match &opt.config_path {
        Some(path) => {
            let path = if path.is_relative() {
                std::env::current_dir()?.join(path)
            } else {
                path.clone()
            };
            Configuration::from_file(&path)
                .with_context(|| format!("could not load configuration from {}", path.display()))?
        }
        None => Configuration::default(),
    };

    tracing::info!(
        "Tweet Graph v{} // store: {}",
        std::env!("CARGO_PKG_VERSION"),
        configuration.store().kind()
    );
    let graph = TweetGraph::from_configuration(&configuration)?;

    axum_factory::serve(graph, &configuration, shutdown_signal()).await?;
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
