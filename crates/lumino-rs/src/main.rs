//! `lumino`: local GGUF chat assistant.
//!
//! Starts the HTTP surface over a llama-server backed engine, then runs the
//! terminal client against it (or just serves, with `--headless`).

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use lumino_rs_config::{LayeredConfigOptions, LuminoConfig, ModelRegistry};
use lumino_rs_core::{ChatEngine, IncludeResolver, LlamaServerBackend};
use lumino_rs_server::{AppContext, serve};
use lumino_rs_tui::TuiConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "lumino", version, about)]
struct Cli {
    /// Extra lumino.json5 layered over the user and cwd configs
    #[arg(long)]
    config: Option<PathBuf>,
    /// Model file to load at startup (name inside the models directory)
    #[arg(long)]
    model: Option<String>,
    /// Directory holding .gguf files
    #[arg(long)]
    models_dir: Option<PathBuf>,
    /// Host for the HTTP surface
    #[arg(long)]
    host: Option<String>,
    /// Port for the HTTP surface
    #[arg(long)]
    port: Option<u16>,
    /// Ask for complete replies instead of streamed tokens
    #[arg(long)]
    no_stream: bool,
    /// Serve HTTP only, without the terminal client
    #[arg(long)]
    headless: bool,
}

/// Entry point for the Lumino assistant.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();
    info!(
        "starting lumino (config_set={}, model_set={}, headless={})",
        cli.config.is_some(),
        cli.model.is_some(),
        cli.headless
    );

    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        options = options.with_runtime_path(path);
    }
    let layered = LuminoConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    apply_overrides(&mut config, &cli);
    config.validate().context("invalid configuration")?;

    let registry = ModelRegistry::new(config.models_dir(&cwd))
        .with_overrides(config.models.overrides.clone());
    let backend = Arc::new(LlamaServerBackend::new(config.backend.clone()));
    let mut engine = ChatEngine::new(backend, registry.clone());

    let available = registry.list_available_models().unwrap_or_else(|err| {
        warn!("failed to list models (err={err})");
        Vec::new()
    });
    match startup_model(
        cli.model.as_deref(),
        config.models.default.as_deref(),
        &available,
    ) {
        Some(model) => match engine.switch_model(&model).await {
            Ok(profile) => info!(
                "startup model loaded (id={}, mode={})",
                profile.id,
                profile.mode()
            ),
            Err(err) => warn!("startup model failed to load (model={model}, err={err})"),
        },
        None => warn!(
            "no models found (dir={})",
            registry.models_dir().display()
        ),
    }

    let engine = engine.shared();
    let mut ctx = AppContext::new(engine.clone(), registry);
    let project_root = config.project_root(&cwd);
    if config.include.enabled {
        ctx = ctx.with_include(IncludeResolver::new(&project_root));
    }

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let server_url = format!("http://{}", listener.local_addr()?);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, ctx, async move {
        let _ = stop_rx.await;
    }));

    let outcome = if cli.headless {
        info!("serving headless (url={server_url})");
        tokio::signal::ctrl_c()
            .await
            .context("failed to wait for ctrl-c")
    } else {
        lumino_rs_tui::run(TuiConfig {
            server_url,
            project_dir: project_root,
            stream: config.tui.stream,
            render_batch: config.tui.render_batch,
        })
        .await
    };

    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("http surface failed (err={err})"),
        Err(err) => warn!("http surface task panicked (err={err})"),
    }
    engine.lock().await.shutdown().await;
    info!("lumino stopped");
    outcome
}

/// Apply command-line flags on top of the layered config.
fn apply_overrides(config: &mut LuminoConfig, cli: &Cli) {
    if let Some(host) = cli.host.as_ref() {
        config.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.models_dir.as_ref() {
        config.models.dir = Some(dir.clone());
    }
    if cli.no_stream {
        config.tui.stream = false;
    }
}

/// Pick the model to load at startup: flag, then configured default, then the
/// first file found.
fn startup_model(
    requested: Option<&str>,
    default: Option<&str>,
    available: &[String],
) -> Option<String> {
    requested
        .or(default)
        .map(str::to_string)
        .or_else(|| available.first().cloned())
}
