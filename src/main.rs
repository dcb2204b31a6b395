// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use autotranslate::app_config::{self, Config, parse_upstreams};
use autotranslate::app_controller::Controller;
use autotranslate::language_utils::get_language_name;
use autotranslate::providers::mock::MockProvider;
use autotranslate::server;
use autotranslate::subtitle_source::StremioAddonSource;
use autotranslate::translation::{DocumentCache, TranslatedDocument};

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

/// Options shared by every command that loads the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Public base URL used in subtitle links
    #[arg(long, env = "PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Comma separated subtitle addon base URLs
    #[arg(long, env = "STREMIO_SUBS_BASES")]
    upstreams: Option<String>,

    /// Translation endpoint base URL
    #[arg(long, env = "LIBRETRANSLATE_API")]
    endpoint: Option<String>,

    /// Translation endpoint API key
    #[arg(long, env = "LIBRETRANSLATE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Subtitle file to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Target language tag (e.g., 'es', 'pt-BR')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Output file, defaults to `<input>.<lang>.srt` next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    /// Run the pipeline without calling the translation endpoint
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the subtitle addon server
    Serve(ServeArgs),

    /// Translate a local subtitle file
    Translate(TranslateArgs),

    /// Generate shell completions for autotranslate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Autotranslate - machine-translated subtitles for Stremio
///
/// Serves a Stremio subtitle addon that reads subtitles from other addons,
/// translates them with LibreTranslate and serves the result as SRT.
#[derive(Parser, Debug)]
#[command(name = "autotranslate")]
#[command(version)]
#[command(about = "Machine-translated subtitles for Stremio")]
#[command(long_about = "Autotranslate reads subtitles from Stremio subtitle addons, translates them and serves SRT.

EXAMPLES:
    autotranslate serve                                   # Serve with conf.json
    autotranslate serve -p 7000 --log-level debug         # Serve on another port
    autotranslate translate movie.en.srt -t es            # Translate a local file
    autotranslate translate movie.en.srt -t fr --dry-run  # Exercise the pipeline offline
    autotranslate completions bash > autotranslate.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. PORT, PUBLIC_BASE_URL, STREMIO_SUBS_BASES,
    LIBRETRANSLATE_API and LIBRETRANSLATE_API_KEY override it.")]
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

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
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
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()), now, record.level(), record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept everything here, the configured level is applied once known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "autotranslate", &mut std::io::stdout());
            Ok(())
        },
        Commands::Serve(args) => run_serve(args).await,
        Commands::Translate(args) => run_translate(args).await,
    }
}

/// Load the configuration file and apply the log level
fn load_config(common: &CommonArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&common.config_path)?;

    if let Some(log_level) = &common.log_level {
        config.log_level = log_level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    Ok(config)
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(base) = args.public_base_url.filter(|b| !b.trim().is_empty()) {
        config.server.public_base_url = Some(base.trim().to_string());
    }
    if let Some(upstreams) = args.upstreams {
        let upstreams = parse_upstreams(&upstreams);
        if !upstreams.is_empty() {
            config.source.upstreams = upstreams;
        }
    }
    if let Some(endpoint) = args.endpoint.filter(|e| !e.trim().is_empty()) {
        config.translation.endpoint = endpoint.trim().trim_end_matches('/').to_string();
    }
    if let Some(api_key) = args.api_key.filter(|k| !k.is_empty()) {
        config.translation.api_key = Some(api_key);
    }

    let controller = Controller::with_config(config)?;
    let default_target = &controller.config().server.default_target_language;
    info!("Default target language: {} ({})", default_target,
          get_language_name(default_target).unwrap_or_else(|_| "unknown".to_string()));
    info!("Upstream subtitle addons: {}", controller.config().source.upstreams.join(", "));

    match controller.pipeline().translator().client().provider().test_connection().await {
        Ok(()) => info!("Translating through {}", controller.config().translation.endpoint),
        Err(e) => warn!("Translation endpoint {} is not reachable yet: {}", controller.config().translation.endpoint, e),
    }

    server::serve(Arc::new(controller)).await
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    config.validate().context("Configuration validation failed")?;

    let target_language = args
        .target_language
        .clone()
        .unwrap_or_else(|| config.server.default_target_language.clone());

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&args.input_path, &target_language)?,
    };
    if output.exists() && !args.force_overwrite {
        warn!("Output file already exists: {}. Use -f to force overwrite.", output.display());
        return Ok(());
    }

    let controller = if args.dry_run {
        info!("Dry run: the translation endpoint is not called");
        let cache = Arc::new(DocumentCache::in_memory(config.cache.ttl()));
        let source = Arc::new(StremioAddonSource::from_config(&config.source));
        Controller::with_components(config, source, Arc::new(MockProvider::identity()), cache)
    } else {
        Controller::with_config(config)?
    };

    let translated = controller.translate_file(&args.input_path, &target_language).await?;

    tokio::fs::write(&output, translated.document.to_srt())
        .await
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    print_summary(&output, &translated);
    Ok(())
}

/// `<dir>/<stem>.<lang>.srt`, dropping a trailing language suffix from the stem
fn default_output_path(input: &Path, target_language: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Input path has no file name: {}", input.display()))?;

    let stem = match stem.rsplit_once('.') {
        Some((base, suffix)) if autotranslate::language_utils::normalize_to_part2t(suffix).is_ok() => base.to_string(),
        _ => stem,
    };

    let tag = autotranslate::language_utils::normalize_language_tag(target_language)?;
    let file_name = format!("{}.{}.srt", stem, tag);
    Ok(input.parent().unwrap_or(Path::new(".")).join(file_name))
}

fn print_summary(output: &Path, translated: &TranslatedDocument) {
    let report = &translated.report;
    println!("Output:    {}", output.display());
    println!("Blocks:    {}", translated.document.len());
    println!("Chunks:    {}", report.chunks);
    println!("Calls:     {}", report.calls);
    println!("Elapsed:   {:.2?}", translated.elapsed);
    if !report.recovered_chunks.is_empty() {
        println!("Recovered: {:?}", report.recovered_chunks);
    }
    if !report.is_complete() {
        println!("Untranslated chunks: {:?}", report.degraded_chunks);
    }
}
