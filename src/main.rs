#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use subrelay::app_config::{self, Config};
use subrelay::artifact_cache::{ArtifactRef, FileStore};
use subrelay::database::{DatabaseConnection, Repository};
use subrelay::language_utils;
use subrelay::{DurableStore, JobState, MediaKind, PipelineOrchestrator, SubmitOutcome, SubtitleRequest};

/// How often `fetch` polls its job
const POLL_INTERVAL: Duration = Duration::from_millis(250);

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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, translate and cache a subtitle, following its progress
    Fetch(FetchArgs),

    /// List supported target languages
    Languages {
        /// Only show languages whose code or name contains this term
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Inspect the artifact cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Generate shell completions for subrelay
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// List cached artifacts (from the manifest when enabled)
    List {
        /// Only list artifacts in this language
        #[arg(short = 't', long)]
        language: Option<String>,
    },
}

#[derive(Parser, Debug)]
struct FetchArgs {
    /// Catalog (TMDB) id of the movie or series
    #[arg(value_name = "CATALOG_ID")]
    catalog_id: String,

    /// Media kind: movie, tv or anime
    #[arg(short, long, default_value = "movie")]
    kind: MediaKind,

    /// Season number (tv only)
    #[arg(short, long)]
    season: Option<u32>,

    /// Episode number (tv only)
    #[arg(short, long)]
    episode: Option<u32>,

    /// Target language code (e.g., 'ckb', 'fr', 'zh-TW')
    #[arg(short = 't', long)]
    language: Option<String>,

    /// Override the subtitles directory from the config
    #[arg(long)]
    subtitles_dir: Option<PathBuf>,
}

/// subrelay - on-demand subtitle translation
///
/// Finds a subtitle for a movie or episode, translates it and stores it as
/// WebVTT. Finished subtitles are cached and served immediately afterwards.
#[derive(Parser, Debug)]
#[command(name = "subrelay")]
#[command(version)]
#[command(about = "On-demand subtitle fetch, translation and caching")]
#[command(long_about = "subrelay finds subtitles for a movie or tv episode, translates them and caches them as WebVTT.

EXAMPLES:
    subrelay fetch 550                              # Movie, default language
    subrelay fetch 550 -t fr                        # Movie, French
    subrelay fetch 1399 -k tv -s 1 -e 1 -t de       # Episode, German
    subrelay languages --search kurd                # Search supported languages
    subrelay cache list                             # List cached subtitles
    subrelay completions bash > subrelay.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. TMDB_KEY and GOOGLE_TRANSLATE_KEY fill in API
    keys the config leaves empty.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Marker and ANSI color for a log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (marker, color) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, marker, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The real level is applied once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subrelay", &mut std::io::stdout());
            Ok(())
        }
        Commands::Languages { search } => {
            list_languages(search.as_deref());
            Ok(())
        }
        Commands::Cache { action } => {
            let config = load_config(&cli.config_path, cli.log_level)?;
            match action {
                CacheCommand::List { language } => list_cache(&config, language.as_deref()).await,
            }
        }
        Commands::Fetch(args) => {
            let mut config = load_config(&cli.config_path, cli.log_level)?;
            if let Some(dir) = &args.subtitles_dir {
                config.storage.subtitles_dir = dir.clone();
            }
            run_fetch(config, args).await
        }
    }
}

/// Load the config file (creating a default one when missing), apply
/// environment and CLI overrides, and validate the result
fn load_config(config_path: &str, cli_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(level) = cli_level {
        config.log_level = level.into();
    }
    config.apply_env_overrides();

    config.validate().context("Configuration validation failed")?;

    log::set_max_level(level_filter(&config.log_level));
    Ok(config)
}

async fn run_fetch(config: Config, args: FetchArgs) -> Result<()> {
    let pipeline = PipelineOrchestrator::from_config(&config)?;

    let request = SubtitleRequest {
        catalog_id: args.catalog_id,
        kind: args.kind,
        season: args.season,
        episode: args.episode,
        language: args.language,
    };

    match pipeline.submit_job(request).await? {
        SubmitOutcome::CacheHit { artifact } => {
            info!("Subtitle already cached");
            print_artifact(&config, &artifact);
            Ok(())
        }
        SubmitOutcome::Started { job_id } | SubmitOutcome::Attached { job_id } => {
            follow_job(&pipeline, &config, &job_id).await
        }
    }
}

/// Poll a job until it finishes, mirroring its progress on a progress bar
async fn follow_job(pipeline: &PipelineOrchestrator, config: &Config, job_id: &str) -> Result<()> {
    let progress_bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {percent}% {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));

    loop {
        let status = pipeline
            .poll_job(job_id)
            .ok_or_else(|| anyhow!("Job {} is no longer tracked", job_id))?;

        progress_bar.set_position(status.progress as u64);
        progress_bar.set_message(status.message.clone());

        match status.state {
            JobState::Complete => {
                progress_bar.finish_with_message(status.message);
                let artifact = status
                    .artifact
                    .ok_or_else(|| anyhow!("Job {} completed without an artifact", job_id))?;
                print_artifact(config, &artifact);
                return Ok(());
            }
            JobState::Failed => {
                progress_bar.abandon_with_message(status.message.clone());
                return Err(anyhow!(
                    "{} (sources tried: {})",
                    status.message,
                    status.sources_tried.join(", ")
                ));
            }
            _ => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}

fn print_artifact(config: &Config, artifact: &ArtifactRef) {
    let path = config.storage.subtitles_dir.join(&artifact.relative_path);
    println!("{}", path.display());
    if let Some(url) = &artifact.public_url {
        println!("{}", url);
    }
}

fn list_languages(search: Option<&str>) {
    let languages = match search {
        Some(term) => language_utils::search_languages(term),
        None => language_utils::supported_languages().collect(),
    };

    for language in &languages {
        println!("{:<8} {:<24} {}", language.code, language.name, language.native_name);
    }
    info!("{} language(s)", languages.len());
}

async fn list_cache(config: &Config, language: Option<&str>) -> Result<()> {
    if let Some(path) = config.manifest_path()? {
        let repository = Repository::new(DatabaseConnection::new(&path)?);
        let records = match language {
            Some(language) => repository.list_artifacts_for_language(language).await?,
            None => repository.list_artifacts().await?,
        };

        for record in &records {
            println!(
                "{}\t{}\t{}\t{} bytes\t{}",
                record.relative_path, record.source, record.created_at, record.byte_len, record.content_sha256
            );
        }
        info!("{} artifact(s) recorded in {:?}", records.len(), path);
        match repository.connection().stats() {
            Ok(stats) => info!("Manifest: {}", stats),
            Err(e) => warn!("Failed to read manifest stats: {:#}", e),
        }
        return Ok(());
    }

    // No manifest: fall back to scanning the store
    let store = FileStore::new(&config.storage.subtitles_dir);
    let paths: Vec<String> = store
        .list()
        .await?
        .into_iter()
        .filter(|path| language.is_none_or(|lang| path.split('/').any(|segment| segment == lang)))
        .collect();

    for path in &paths {
        println!("{}", path);
    }
    info!("{} artifact(s) in {:?}", paths.len(), config.storage.subtitles_dir);
    Ok(())
}
