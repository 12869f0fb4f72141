mod cli;
mod config;
mod corpus;
mod error;
mod oracle;
mod parse;
mod pipeline;
mod report;
mod scan;
mod server;
mod telemetry;
mod types;
mod workspace;

use crate::error::CheckerError;
use crate::oracle::gemini::GeminiClient;
use crate::pipeline::Pipeline;
use crate::scan::filesystem::relative_display;
use crate::scan::ExtensionAllowlist;
use crate::server::ApiServer;
use crate::workspace::GitFetcher;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const NO_SCORE: i32 = 1;
    pub const RUNTIME_FAILURE: i32 = 3;
}

async fn run(cli: cli::Cli) -> Result<i32, CheckerError> {
    let cwd = std::env::current_dir()?;
    match cli.command {
        cli::Commands::Analyze(cmd) => {
            workspace::validate_source(&cmd.repo_url)?;
            let pipeline = build_pipeline(
                &cwd,
                cmd.config.as_deref(),
                cmd.timeout_secs,
                cmd.work_root.clone(),
            )?;
            let cancel = cancel_on_interrupt();

            let summary = pipeline.run(&cmd.repo_url, &cancel).await?;

            let output_format = match cmd.format {
                cli::ReportFormat::Json => report::OutputFormat::Json,
                cli::ReportFormat::Text => report::OutputFormat::Text,
            };
            let rendered = report::render(&summary, output_format)?;
            println!("{rendered}");

            if summary.score.is_none() {
                eprintln!("warning: no score could be recovered from the analysis");
                Ok(exit_code::NO_SCORE)
            } else {
                Ok(exit_code::SUCCESS)
            }
        }
        cli::Commands::Files(cmd) => {
            if !cmd.path.exists() {
                return Err(CheckerError::PathNotFound(cmd.path.display().to_string()));
            }

            let loaded = config::load_config(&cwd, cmd.config.as_deref())?;
            let discovery = loaded.discovery_settings();
            let allowlist = ExtensionAllowlist::from(&discovery);
            let files = scan::discover(&cmd.path, &allowlist, &discovery.exclude_dirs)?;

            for file in &files {
                println!("{}", relative_display(&cmd.path, file));
            }
            println!("Total files found: {}", files.len());
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Serve(cmd) => {
            let pipeline = build_pipeline(
                &cwd,
                cmd.config.as_deref(),
                cmd.timeout_secs,
                cmd.work_root.clone(),
            )?;
            let server = ApiServer::bind(cmd.bind)?;
            server.run(Arc::new(pipeline), cancel_on_interrupt()).await?;
            Ok(exit_code::SUCCESS)
        }
    }
}

fn build_pipeline(
    cwd: &Path,
    config_path: Option<&Path>,
    timeout_secs: Option<u64>,
    work_root: Option<PathBuf>,
) -> Result<Pipeline, CheckerError> {
    let loaded = config::load_config(cwd, config_path)?;
    let mut oracle_settings = loaded.oracle_settings();
    if let Some(secs) = timeout_secs {
        oracle_settings.timeout = Duration::from_secs(secs);
    }
    let oracle = GeminiClient::from_settings(oracle_settings)?;
    Ok(Pipeline::new(&loaded, Arc::new(GitFetcher), Arc::new(oracle)).with_work_root(work_root))
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    telemetry::init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("error[{}]: {}", e.category(), e);
            std::process::exit(exit_code::RUNTIME_FAILURE);
        }
    }
}
