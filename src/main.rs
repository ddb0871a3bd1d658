// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::MultiProgress;
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use truthscore::app_config::{self, Config};
use truthscore::orchestrator::{Orchestrator, RunSummary};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Translate every configured pair, then score and write reports (default command)
    Run,

    /// Translate only; existing outputs are resumed
    Translate,

    /// Score the translations already under the translated root
    Score,

    /// Generate shell completions for truthscore
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// truthscore - translation truthfulness benchmark
///
/// Translates parallel corpora with several backends and scores each
/// translation against its original with sentence embeddings.
#[derive(Parser, Debug)]
#[command(name = "truthscore")]
#[command(version)]
#[command(about = "Benchmark translation backends by embedding similarity")]
#[command(long_about = "truthscore translates line-aligned corpora with each configured backend and
scores every line against its original by cosine similarity of embeddings.

EXAMPLES:
    truthscore                                  # Translate, score and report
    truthscore translate -b gpt                 # Only translate with backend 'gpt'
    truthscore score                            # Score existing translations
    truthscore run -f                           # Discard existing outputs first
    truthscore completions bash > truthscore.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created automatically.

OUTPUT:
    {translated_root}/{backend}/{src}_to_{dst}.txt
    {translated_root}/{backend}/{backend}_truthfulness.csv")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Discard existing translation outputs and start over
    #[arg(short, long, global = true)]
    force: bool,

    /// Only use these backend ids (repeatable)
    #[arg(short, long = "backend", global = true)]
    backends: Vec<String>,

    /// Override the corpus directory
    #[arg(long, global = true, env = "TRUTHSCORE_CORPUS_ROOT")]
    corpus_root: Option<PathBuf>,

    /// Override the translation output directory
    #[arg(long, global = true, env = "TRUTHSCORE_TRANSLATED_ROOT")]
    translated_root: Option<PathBuf>,
}

// @struct: Colored stderr logger; filtering goes through log::max_level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and marker for a level
    fn style(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, marker) = Self::style(record.level());
        let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, marker, record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Load the configuration and apply command line overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }
    if let Some(root) = &cli.corpus_root {
        config.corpus_root = root.clone();
    }
    if let Some(root) = &cli.translated_root {
        config.translated_root = root.clone();
    }
    if !cli.backends.is_empty() {
        config.backends.retain(|b| cli.backends.contains(&b.id()));
        if config.backends.is_empty() {
            return Err(anyhow!("No configured backend matches {:?}", cli.backends));
        }
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn exit_code(summary: &RunSummary) -> i32 {
    if summary.cancelled {
        130
    } else if !summary.failures.is_empty() {
        1
    } else {
        0
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Completions { shell } = command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "truthscore", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    let orchestrator = Orchestrator::new(config)?
        .with_force(cli.force)
        .with_progress(MultiProgress::new());

    let cancel = orchestrator.cancellation();
    let limiter = orchestrator.request_limiter();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight requests");
            cancel.cancel();
            limiter.close();
        }
    });

    let start = std::time::Instant::now();
    let summary = match command {
        Commands::Run => orchestrator.run().await,
        Commands::Translate => orchestrator.translate().await,
        Commands::Score => orchestrator.score_existing().await?,
        Commands::Completions { .. } => return Ok(()),
    };

    summary.log();
    for (backend, paths) in &summary.reports {
        info!("{} report: {}", backend, paths.csv.display());
    }
    info!("Finished in {:.1}s", start.elapsed().as_secs_f64());

    let code = exit_code(&summary);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
