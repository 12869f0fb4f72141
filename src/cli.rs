use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quality-checker",
    version,
    about = "LLM-backed code quality scoring for git repositories"
)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone a repository, analyze it and print the quality summary
    Analyze(AnalyzeCommand),
    /// List the files a local tree would contribute to the corpus
    Files(FilesCommand),
    /// Serve POST /analyze over HTTP until interrupted
    Serve(ServeCommand),
}

#[derive(Args)]
pub struct AnalyzeCommand {
    pub repo_url: String,
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ReportFormat,
    /// Per-attempt oracle timeout, overriding oracle.timeout_secs
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,
    /// Directory under which the per-run checkout is created
    #[arg(long)]
    pub work_root: Option<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct FilesCommand {
    pub path: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeCommand {
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,
    /// Per-attempt oracle timeout, overriding oracle.timeout_secs
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,
    /// Directory under which each request's checkout is created
    #[arg(long)]
    pub work_root: Option<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}
