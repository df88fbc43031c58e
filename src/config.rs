//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::fonts::{DEFAULT_FONT_FAMILY, FontSettings};
use crate::request::RenderRequest;
use crate::store::DEFAULT_URL_PREFIX;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "og-preview";
const ENV_PREFIX: &str = "OG_PREVIEW";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_DIR: &str = "public/previews";
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Command line
// ============================================================================

/// Command-line arguments for the og-preview binary.
#[derive(Debug, Parser)]
#[command(
    name = "og-preview",
    version,
    about = "Open Graph preview renderer and cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OG_PREVIEW_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Render one preview through the cache, or straight to a file.
    Render(Box<RenderArgs>),
    /// Print the cached previews.
    List(CacheArgs),
    /// Delete every cached preview.
    Clear(CacheArgs),
}

/// Overrides shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the directory previews are stored in.
    #[arg(long = "cache-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_directory: Option<PathBuf>,

    /// Override the public URL prefix previews are served under.
    #[arg(long = "cache-url-prefix", value_name = "PATH")]
    pub cache_url_prefix: Option<String>,

    /// Override the render timeout.
    #[arg(long = "render-timeout-ms", value_name = "MILLIS")]
    pub render_timeout_ms: Option<u64>,

    /// Override the preferred font family.
    #[arg(long = "font-family", value_name = "NAME")]
    pub font_family: Option<String>,

    /// Add a directory of font files; may be repeated.
    #[arg(long = "font-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub font_dirs: Vec<PathBuf>,

    /// Toggle loading the system's fonts.
    #[arg(
        long = "system-fonts",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub system_fonts: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Cache key of the preview; required unless --output is given.
    #[arg(long, required_unless_present = "output")]
    pub id: Option<String>,

    #[arg(long)]
    pub title: String,

    #[arg(long = "desc")]
    pub description: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long = "site-name")]
    pub site_name: Option<String>,

    #[arg(long = "background-color", value_name = "HEX")]
    pub background_color: Option<String>,

    #[arg(long = "text-color", value_name = "HEX")]
    pub text_color: Option<String>,

    /// Replace a cached preview.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub regenerate: bool,

    /// Write the PNG to this file instead of the cache.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl RenderArgs {
    /// Id used when writing straight to a file without `--id`.
    pub const OUTPUT_ID: &'static str = "preview";

    pub fn to_request(&self) -> RenderRequest {
        RenderRequest {
            id: self.id.clone().unwrap_or_else(|| Self::OUTPUT_ID.to_string()),
            title: self.title.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            category: self.category.clone(),
            site_name: self.site_name.clone(),
            background_color: self.background_color.clone(),
            text_color: self.text_color.clone(),
            force_regenerate: self.regenerate,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheArgs {
    #[command(flatten)]
    pub common: CommonOverrides,
}

// ============================================================================
// Settings
// ============================================================================

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub timeout: Duration,
    pub fonts: FontSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("render.font_dirs"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::Render(args)) => raw.apply_common_overrides(&args.common),
        Some(Command::List(args)) | Some(Command::Clear(args)) => {
            raw.apply_common_overrides(&args.common)
        }
        None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    cache: RawCacheSettings,
    render: RawRenderSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
    url_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    timeout_ms: Option<u64>,
    font_family: Option<String>,
    font_dirs: Option<Vec<PathBuf>>,
    system_fonts: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        self.apply_common_overrides(&overrides.common);
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(prefix) = overrides.cache_url_prefix.as_ref() {
            self.cache.url_prefix = Some(prefix.clone());
        }
        if let Some(timeout) = overrides.render_timeout_ms {
            self.render.timeout_ms = Some(timeout);
        }
        if let Some(family) = overrides.font_family.as_ref() {
            self.render.font_family = Some(family.clone());
        }
        if !overrides.font_dirs.is_empty() {
            self.render.font_dirs = Some(overrides.font_dirs.clone());
        }
        if let Some(system_fonts) = overrides.system_fonts {
            self.render.system_fonts = Some(system_fonts);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            cache,
            render,
            logging,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            cache: build_cache_settings(cache)?,
            render: build_render_settings(render)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
                graceful_shutdown: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
            },
            cache: CacheSettings {
                directory: PathBuf::from(DEFAULT_CACHE_DIR),
                url_prefix: DEFAULT_URL_PREFIX.to_string(),
            },
            render: RenderSettings {
                timeout: Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
                fonts: FontSettings::default(),
            },
            logging: LoggingSettings {
                level: LevelFilter::INFO,
                format: LogFormat::Compact,
            },
        }
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr = candidate.parse().map_err(|err| {
        LoadError::invalid("server.host", format!("invalid address `{candidate}`: {err}"))
    })?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let url_prefix = cache
        .url_prefix
        .unwrap_or_else(|| DEFAULT_URL_PREFIX.to_string());
    let url_prefix = url_prefix.trim_end_matches('/').to_string();
    if !url_prefix.starts_with('/') {
        return Err(LoadError::invalid(
            "cache.url_prefix",
            "must be an absolute path such as `/previews`",
        ));
    }

    Ok(CacheSettings {
        directory,
        url_prefix,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let timeout_ms = render.timeout_ms.unwrap_or(DEFAULT_RENDER_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "render.timeout_ms",
            "must be greater than zero",
        ));
    }

    let family = render
        .font_family
        .map(|family| family.trim().to_string())
        .filter(|family| !family.is_empty())
        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());

    Ok(RenderSettings {
        timeout: Duration::from_millis(timeout_ms),
        fonts: FontSettings {
            family,
            font_dirs: render.font_dirs.unwrap_or_default(),
            system_fonts: render.system_fonts.unwrap_or(true),
        },
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
