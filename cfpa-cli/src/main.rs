use anyhow::{anyhow, Context, Result};
use cfpa_bot::git::GitCli;
use cfpa_bot::{LockRegistry, RepoAnalyzer};
use cfpa_core::LangFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

/// cfpa: tools for the Minecraft mod language package
#[derive(Parser, Debug)]
#[command(name = "cfpa")]
#[command(about = "Localization repository tools", long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the localization files on every branch of a repository
    Analyze(AnalyzeArgs),
    /// Reorder a .json or .lang file by key
    SortKeys(SortKeysArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Repository link, e.g. https://github.com/owner/repo
    link: String,

    /// Directory holding cached results
    #[arg(long, default_value = "config/repo_analyze_results")]
    cache_dir: PathBuf,

    /// Directory for temporary clones
    #[arg(long, default_value = "caches")]
    scratch_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct SortKeysArgs {
    file: PathBuf,

    /// If set, print the result instead of rewriting the file
    #[arg(long)]
    dry_run: bool,
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let analyzer = RepoAnalyzer::new(
        Arc::new(GitCli::new("cfpa", "cfpa@localhost")),
        Arc::new(LockRegistry::new()),
        args.cache_dir,
        args.scratch_dir,
    );
    let result = analyzer.analyze(&args.link).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    );
    Ok(())
}

async fn run_sort_keys(args: SortKeysArgs) -> Result<()> {
    let format = LangFormat::from_path(&args.file).ok_or_else(|| {
        anyhow!(
            "{} is neither a .json nor a .lang file",
            args.file.display()
        )
    })?;
    let original = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let sorted = format.canonicalize(&original)?;

    if args.dry_run {
        print!("{}", sorted);
    } else if sorted != original {
        tokio::fs::write(&args.file, sorted)
            .await
            .with_context(|| format!("Failed to write {}", args.file.display()))?;
        info!("Sorted {}", args.file.display());
    } else {
        info!("{} is already sorted", args.file.display());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .init();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::SortKeys(args) => run_sort_keys(args).await,
    }
}
