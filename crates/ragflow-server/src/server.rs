//! Main RAGFlow Server implementation

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{info, warn};

use ragflow_core::{RunRecord, TriggerId, WorkflowInstanceId, WorkflowRuntime};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Hosts the workflow runtime behind the HTTP API
#[derive(Clone)]
pub struct RagflowServer {
    /// Configuration
    pub config: ServerConfig,

    runtime: WorkflowRuntime,
}

impl std::fmt::Debug for RagflowServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagflowServer")
            .field("config", &self.config)
            .field("events", &self.runtime.registered_events())
            .finish()
    }
}

impl RagflowServer {
    /// Create a server around a runtime with its workflows already registered
    pub fn new(config: ServerConfig, runtime: WorkflowRuntime) -> Self {
        Self { config, runtime }
    }

    pub fn runtime(&self) -> &WorkflowRuntime {
        &self.runtime
    }

    /// Start one run per workflow subscribed to `event_name`
    pub async fn submit_event(&self, event_name: &str, data: Value) -> ServerResult<TriggerId> {
        if event_name.trim().is_empty() {
            return Err(ServerError::ValidationError("Event name must not be empty".to_string()));
        }
        let trigger_id = self.runtime.submit(event_name, data).await?;
        info!(event = event_name, trigger_id = %trigger_id, "Event accepted");
        Ok(trigger_id)
    }

    pub async fn runs_for_trigger(&self, trigger_id: &str) -> ServerResult<Vec<RunRecord>> {
        Ok(self
            .runtime
            .runs_for_trigger(&TriggerId(trigger_id.to_string()))
            .await?)
    }

    pub async fn cancel_run(&self, run_id: &str) -> ServerResult<RunRecord> {
        let instance = self
            .runtime
            .cancel(&WorkflowInstanceId(run_id.to_string()))
            .await?;
        info!(run_id, "Run cancelled");
        Ok(RunRecord::from(&instance))
    }

    /// Run the server on the configured address until ctrl-c or SIGTERM
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Runs interrupted by a previous shutdown are resumed first, and due
    /// timers are polled for as long as the server is up.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> ServerResult<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;

        let recovered = self.runtime.recover().await?;
        if recovered > 0 {
            info!(recovered, "Resumed interrupted runs");
        }
        let timers = self
            .runtime
            .start_timer_processing(self.config.timer_poll_interval());

        let app = crate::api::build_router(Arc::new(self.clone()));
        info!("Listening on {}", addr);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        timers.abort();
        info!("Server stopped");
        served.map_err(ServerError::from)
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
