//! Event loop supervisor.
//!
//! Runs the liveness endpoint and the inbound event loop side by side.
//! Each inbound event gets its own task, so a slow relay run never holds
//! up polling or liveness checks. Runs are unbounded unless a concurrency
//! limit is configured.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::EventSource;
use crate::domain::InboundEvent;

use super::health;
use super::orchestrator::{Relay, RelayError, RelayOutcome, MSG_GENERIC_ERROR};

/// Delay before polling again after a failed poll
pub const DEFAULT_POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Owns the listen loop and the liveness endpoint
pub struct Supervisor {
    source: Arc<dyn EventSource>,
    relay: Arc<Relay>,
    run_limit: Option<Arc<Semaphore>>,
    poll_retry_delay: Duration,
}

impl Supervisor {
    pub fn new(source: Arc<dyn EventSource>, relay: Arc<Relay>) -> Self {
        Self {
            source,
            relay,
            run_limit: None,
            poll_retry_delay: DEFAULT_POLL_RETRY_DELAY,
        }
    }

    /// Cap the number of relay runs in flight. `None` means unbounded.
    pub fn with_max_concurrent_runs(mut self, limit: Option<usize>) -> Self {
        self.run_limit = limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    pub fn with_poll_retry_delay(mut self, delay: Duration) -> Self {
        self.poll_retry_delay = delay;
        self
    }

    /// Run until the process receives SIGINT or SIGTERM.
    ///
    /// The liveness listener must already be bound so a bind failure is
    /// reported before anything starts.
    pub async fn run(self, liveness: TcpListener) -> Result<()> {
        self.run_until(liveness, shutdown_signal()).await
    }

    /// Run until `shutdown` completes.
    ///
    /// In-flight relay runs are left to the runtime; dropping it drops
    /// their staged files.
    pub async fn run_until(
        self,
        liveness: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let health_task = tokio::spawn(health::serve(liveness));
        let source_name = self.source.name().to_string();
        let listen_task = tokio::spawn(async move { self.listen().await });

        info!(source = %source_name, "Bot started polling");

        tokio::select! {
            result = health_task => {
                error!(?result, "Liveness endpoint exited");
                result??;
            }
            result = listen_task => {
                error!(?result, "Event loop exited");
                result?;
            }
            () = shutdown => {
                info!("Shutdown signal received");
            }
        }

        info!("Bot stopped");
        Ok(())
    }

    /// Poll the event source forever, dispatching each event
    pub async fn listen(&self) {
        loop {
            match self.source.poll().await {
                Ok(events) => {
                    for event in events {
                        self.dispatch(event).await;
                    }
                }
                Err(e) => {
                    warn!(
                        source = self.source.name(),
                        error = %format!("{:#}", e),
                        "Poll failed, retrying in {:?}",
                        self.poll_retry_delay
                    );
                    tokio::time::sleep(self.poll_retry_delay).await;
                }
            }
        }
    }

    /// Start a relay run for one event on its own task.
    ///
    /// Waits for a free slot first when a concurrency limit is set.
    pub async fn dispatch(&self, event: InboundEvent) -> JoinHandle<RelayOutcome> {
        let permit = match &self.run_limit {
            Some(limit) => limit.clone().acquire_owned().await.ok(),
            None => None,
        };

        let relay = self.relay.clone();
        tokio::spawn(async move {
            let _permit = permit;
            run_guarded(relay, event).await
        })
    }
}

/// Run one relay in a child task so a panic is caught, logged and
/// answered instead of taking anything else down
async fn run_guarded(relay: Arc<Relay>, event: InboundEvent) -> RelayOutcome {
    let origin = event.origin.clone();
    let child = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.process(&event).await })
    };

    match child.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!(chat_id = origin.chat_id, error = %join_error, "Relay run aborted");
            if let Err(e) = relay.platform().reply(&origin, MSG_GENERIC_ERROR).await {
                warn!(chat_id = origin.chat_id, error = %e, "Failed to send reply");
            }
            RelayOutcome::Failed(RelayError::Unexpected(join_error.to_string()))
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
