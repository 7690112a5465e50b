// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autosubs::app_config::{self, Config, ProviderConfig, TranslationProvider};
use autosubs::database::SqliteJobRegistry;
use autosubs::file_utils::MediaKind;
use autosubs::providers::opensubtitles::OpenSubtitlesClient;
use autosubs::translation::{CacheState, PlaceholderMarker, SubtitlePipeline, SubtitleRequest};
use autosubs::JobRegistry;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Google,
    #[value(name = "googleapi")]
    GoogleApi,
    Gemini,
    #[value(name = "chatgpt")]
    ChatGpt,
    #[value(name = "deepseek")]
    DeepSeek,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Google => TranslationProvider::Google,
            CliTranslationProvider::GoogleApi => TranslationProvider::GoogleApi,
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::ChatGpt => TranslationProvider::ChatGpt,
            CliTranslationProvider::DeepSeek => TranslationProvider::DeepSeek,
        }
    }
}

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

#[derive(Debug, Clone, ValueEnum)]
enum CliMediaKind {
    Movie,
    Series,
}

impl From<CliMediaKind> for MediaKind {
    fn from(kind: CliMediaKind) -> Self {
        match kind {
            CliMediaKind::Movie => MediaKind::Movie,
            CliMediaKind::Series => MediaKind::Series,
        }
    }
}

/// Options shared by every command that touches the cache
#[derive(Parser, Debug)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Identifies one subtitle in the cache
#[derive(Parser, Debug)]
struct TargetArgs {
    /// Media id: an IMDb id, with `:season:episode` for series (e.g. tt0944947:1:3)
    #[arg(value_name = "MEDIA_ID")]
    media_id: String,

    /// Kind of title; inferred from the media id when omitted
    #[arg(short, long, value_enum)]
    kind: Option<CliMediaKind>,

    /// Target language code (e.g., 'en', 'es', 'pt-br')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,
}

#[derive(Parser, Debug)]
struct FetchArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    common: CommonArgs,

    /// API key for the provider, overriding the configured one
    #[arg(long, env = "AUTOSUBS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Provider API base URL
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Media id of the subtitle to inspect; lists active jobs when omitted
    #[arg(value_name = "MEDIA_ID")]
    media_id: Option<String>,

    /// Kind of title; inferred from the media id when omitted
    #[arg(short, long, value_enum)]
    kind: Option<CliMediaKind>,

    /// Target language code
    #[arg(short, long)]
    target_language: Option<String>,

    /// Translation provider whose cache entry to inspect
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct ReclaimArgs {
    /// Age in seconds after which a job counts as abandoned; defaults to the configured value
    #[arg(long, value_name = "SECONDS")]
    older_than_secs: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a subtitle and translate it into the target language
    #[command(alias = "get")]
    Fetch(FetchArgs),

    /// Show the cache state of a subtitle, or the active jobs
    Status(StatusArgs),

    /// Forget jobs left behind by processes that died mid-translation
    Reclaim(ReclaimArgs),

    /// Generate shell completions for autosubs
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// autosubs - subtitles fetched and translated on demand
///
/// Looks up subtitles for a movie or an episode on OpenSubtitles and translates
/// them into the requested language.
#[derive(Parser, Debug)]
#[command(name = "autosubs")]
#[command(version)]
#[command(about = "On-demand subtitle fetching and translation")]
#[command(long_about = "autosubs looks up subtitles on OpenSubtitles and translates them with the configured provider.

EXAMPLES:
    autosubs fetch tt0111161 -t pt                  # Translate a movie into Portuguese
    autosubs fetch tt0944947:1:3 -t fr -p deepseek  # Translate an episode with DeepSeek
    autosubs status tt0944947:1:3 -t fr             # Show the cache state of a subtitle
    autosubs status                                 # List active jobs
    autosubs reclaim --older-than-secs 3600         # Forget jobs abandoned over an hour ago
    autosubs completions bash > autosubs.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    google    - Google Translate web endpoint (no key required)
    googleapi - Google Cloud Translation API (requires API key)
    gemini    - Gemini API (requires API key)
    chatgpt   - ChatGPT API or any OpenAI-compatible server (requires API key)
    deepseek  - DeepSeek API (requires API key)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
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

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
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
            let color = Self::get_color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
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
    // The level is raised or lowered once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "autosubs", &mut std::io::stdout());
            Ok(())
        }
        Commands::Fetch(args) => run_fetch(args).await,
        Commands::Status(args) => run_status(args).await,
        Commands::Reclaim(args) => run_reclaim(args),
    }
}

/// Load the config file, creating a default one when it does not exist
fn load_config(common: &CommonArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &common.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config_path = &common.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    match &common.log_level {
        Some(log_level) => config.log_level = log_level.clone().into(),
        None => log::set_max_level(level_filter(&config.log_level)),
    }

    Ok(config)
}

fn open_registry(config: &Config) -> Result<SqliteJobRegistry> {
    let db_path = config.resolved_database_path()?;
    Ok(SqliteJobRegistry::new(autosubs::database::DatabaseConnection::new(&db_path)?))
}

// Rows of running jobs are left alone; reclaiming only happens on request
fn build_pipeline(config: &Config) -> Result<SubtitlePipeline> {
    let registry = open_registry(config)?;

    let source = OpenSubtitlesClient::new(
        config.source.endpoint.clone(),
        Duration::from_secs(config.source.timeout_secs),
    );

    Ok(SubtitlePipeline::new(config, Arc::new(registry), Arc::new(source)))
}

fn build_request(target: &TargetArgs, config: &Config) -> Result<SubtitleRequest> {
    let kind = match &target.kind {
        Some(kind) => kind.clone().into(),
        None if target.media_id.contains(':') => MediaKind::Series,
        None => MediaKind::Movie,
    };
    let language = target
        .target_language
        .clone()
        .unwrap_or_else(|| config.target_language.clone());
    let provider = target
        .provider
        .clone()
        .map_or(config.translation.provider, Into::into);

    Ok(SubtitleRequest::from_media_id(kind, &target.media_id, language, provider)?)
}

async fn run_fetch(args: FetchArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;

    let request = build_request(&args.target, &config)?.with_credentials(
        args.api_key.clone(),
        args.model.clone(),
        args.base_url.clone(),
    );

    // Command-line overrides are validated like configured values, for this run only
    config.translation.provider = request.provider;
    config.target_language = request.target_language.clone();
    if let Some(api_key) = &args.api_key {
        let provider_str = request.provider.to_lowercase_string();
        match config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            Some(provider_config) => provider_config.api_key = api_key.clone(),
            None => {
                let mut provider_config = ProviderConfig::new(request.provider);
                provider_config.api_key = api_key.clone();
                config.translation.available_providers.push(provider_config);
            }
        }
    }
    config.validate().context("Configuration validation failed")?;

    let pipeline = build_pipeline(&config)?;
    let outcome = pipeline.handle_request(&request).await?;

    info!("{}", outcome.response.label);
    println!("{}", outcome.response.url);

    // The job dies with the runtime, so the command stays until it is done
    if let Some(job) = outcome.job {
        info!("Waiting for {} to finish", job.key());
        if let Err(e) = job.wait().await {
            error!("{}", e.user_message());
            return Err(e.into());
        }

        let report = pipeline.inspect(&request)?;
        if report.state == CacheState::Complete {
            info!("Subtitle ready: {:?}", report.path);
        }
    }

    Ok(())
}

async fn run_status(args: StatusArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let pipeline = build_pipeline(&config)?;

    let Some(media_id) = args.media_id.clone() else {
        let jobs = pipeline.registry().active_jobs()?;
        if jobs.is_empty() {
            println!("No active jobs");
        }
        for job in jobs {
            println!(
                "{}  {}  {}  started {}",
                job.key,
                job.provider,
                job.model.as_deref().unwrap_or("-"),
                job.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            );
        }
        return Ok(());
    };

    let target = TargetArgs {
        media_id,
        kind: args.kind.clone(),
        target_language: args.target_language.clone(),
        provider: args.provider.clone(),
    };
    let request = build_request(&target, &config)?;
    let report = pipeline.inspect(&request)?;
    let state = match &report.state {
        CacheState::Absent => "not cached".to_string(),
        CacheState::Complete => "translated".to_string(),
        CacheState::Placeholder(PlaceholderMarker::TranslationFailed { reason }) => {
            format!("failed: {}", reason)
        }
        CacheState::Placeholder(marker) => marker.tag().replace('-', " "),
    };

    println!("{}", report.path.display());
    println!("{}", report.url);
    println!(
        "{}{}",
        state,
        if report.job_active { " (job active)" } else { "" }
    );

    Ok(())
}

fn run_reclaim(args: ReclaimArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let registry = open_registry(&config)?;

    let secs = args.older_than_secs.unwrap_or(config.stale_job_after_secs);
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    let removed = registry
        .reclaim_stale(chrono::Duration::seconds(secs))
        .context("Failed to reclaim stale jobs")?;

    println!("Reclaimed {} stale job(s)", removed);
    Ok(())
}
