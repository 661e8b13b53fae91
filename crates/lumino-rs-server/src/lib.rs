//! Loopback HTTP surface for the Lumino chat engine.
//!
//! Handlers receive an [`AppContext`] built once at startup. Every route that
//! touches the engine goes through its mutex, so requests are served one at a
//! time.

mod routes;

use log::info;
use lumino_rs_config::ModelRegistry;
use lumino_rs_core::{Expanded, IncludeResolver, SharedEngine};
use std::future::Future;
use thiserror::Error;
use tokio::net::TcpListener;

pub use routes::router;

/// Errors raised while serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    engine: SharedEngine,
    registry: ModelRegistry,
    include: Option<IncludeResolver>,
}

impl AppContext {
    pub fn new(engine: SharedEngine, registry: ModelRegistry) -> Self {
        Self {
            engine,
            registry,
            include: None,
        }
    }

    /// Enable `/read` expansion of incoming messages.
    pub fn with_include(mut self, include: IncludeResolver) -> Self {
        self.include = Some(include);
        self
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    fn expand(&self, message: &str) -> Expanded {
        match &self.include {
            Some(include) => include.process(message),
            None => Expanded {
                message: message.to_string(),
                files_read: Vec::new(),
            },
        }
    }
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, ctx: AppContext, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("http surface listening (addr={addr})");
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("http surface stopped (addr={addr})");
    Ok(())
}
