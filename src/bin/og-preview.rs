use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use og_preview::config::{self, Command, RenderArgs, Settings};
use og_preview::server::{self, AppState, ServeError};
use og_preview::telemetry::{self, TelemetryError};
use og_preview::{
    CardRenderer, GenerateError, PreviewGenerator, PreviewRenderer, PreviewStore, RenderError,
    RenderOptions, RenderedImage, StoreError, ValidationError,
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::LoadError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Serve(#[from] ServeError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        None => run_serve(settings).await,
        Some(Command::Serve(_)) => run_serve(settings).await,
        Some(Command::Render(args)) => run_render(settings, &args).await,
        Some(Command::List(_)) => run_list(settings).await,
        Some(Command::Clear(_)) => run_clear(settings).await,
    }
}

fn store(settings: &Settings) -> PreviewStore {
    PreviewStore::new(&settings.cache.directory, settings.cache.url_prefix.clone())
}

fn generator(settings: &Settings) -> Result<PreviewGenerator, AppError> {
    let renderer = CardRenderer::load(&settings.render.fonts)?;
    Ok(PreviewGenerator::new(store(settings), Arc::new(renderer))
        .with_render_timeout(settings.render.timeout))
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let generator = generator(&settings)?;
    info!(
        cache = %settings.cache.directory.display(),
        url_prefix = %settings.cache.url_prefix,
        timeout_ms = settings.render.timeout.as_millis() as u64,
        "starting og-preview"
    );

    let router = server::build_router(AppState::new(generator));
    server::serve(settings.server.addr, router, settings.server.graceful_shutdown).await?;
    Ok(())
}

async fn run_render(settings: Settings, args: &RenderArgs) -> Result<(), AppError> {
    let request = args.to_request();

    let Some(output) = args.output.as_deref() else {
        let outcome = generator(&settings)?.get_or_create(&request).await?;
        let state = if outcome.cached { "cached" } else { "generated" };
        println!("{} ({state})", outcome.url);
        return Ok(());
    };

    let (_, options) = request.validate()?;
    let renderer = CardRenderer::load(&settings.render.fonts)?;
    let image = render_with_timeout(renderer, options, settings.render.timeout).await?;
    write_output(output, &image.bytes).await?;
    println!("{}", output.display());
    Ok(())
}

async fn render_with_timeout(
    renderer: impl PreviewRenderer + 'static,
    options: RenderOptions,
    timeout: Duration,
) -> Result<RenderedImage, AppError> {
    let task = tokio::task::spawn_blocking(move || renderer.render(&options));
    let image = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| GenerateError::Timeout(timeout))???;
    Ok(image)
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let write_error = |source| AppError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_error)
}

async fn run_list(settings: Settings) -> Result<(), AppError> {
    let store = store(&settings);
    let entries = store.try_list().await?;
    for entry in &entries {
        let created = entry
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "{}\t{}\t{}\t{}",
            entry.id,
            entry.size_bytes,
            created,
            store.url(&entry.id)
        );
    }
    println!("{} cached images", entries.len());
    Ok(())
}

async fn run_clear(settings: Settings) -> Result<(), AppError> {
    let count = store(&settings).clear().await?;
    println!("Cleared {count} cached images");
    Ok(())
}
