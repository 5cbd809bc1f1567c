mod cli;
mod config;
mod error;
mod handler;
mod orchestrator;
mod prompt;
mod rate_limit;
mod replicate;
mod server;
mod state_machine;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use error::GenerationError;
use handler::{GenerationRequest, GenerationResponse, RequestHandler};
use prompt::PromptBuilder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Identity charged for generations started from the command line.
const CLI_IDENTITY: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.require_api_token()?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let handler = RequestHandler::from_config(&config);
            match handler.limiter_backend() {
                Some(backend) => info!(backend, limit = config.rate_limit.limit, "rate limiting enabled"),
                None => warn!("no rate limit backend configured, running in permissive mode"),
            }
            server::serve(Arc::new(handler), config.port).await?;
        }
        Command::Generate {
            image_url,
            theme,
            room,
        } => {
            let handler = RequestHandler::from_config(&config);
            let request = GenerationRequest::new(&image_url, &theme, &room);

            let progress = ui::GenerationProgress::start(&PromptBuilder::build(&theme, &room));
            let result = handler.handle(&request, CLI_IDENTITY).await;
            progress.finish(&result);
            exit_status(result)?;
        }
    }

    Ok(())
}

// Details were already printed by the spinner; only the kind is left for the exit error.
fn exit_status(result: Result<GenerationResponse, GenerationError>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => anyhow::bail!("generation failed: {}", e.kind()),
    }
}

// RUST_LOG wins over -v when set.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn,roomify=info"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
