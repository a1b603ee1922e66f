use std::{
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use eyre::WrapErr as _;
use tokio::{
    select,
    sync::watch,
    task::{
        JoinError,
        JoinHandle,
    },
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    error,
    info,
};

pub(crate) use self::state::State;
pub use self::state::VerifiedBlockStatus;
use self::{
    ethereum::{
        CommitmentChainClient,
        RollupClient,
    },
    reconciler::Reconciler,
};
use crate::{
    api,
    config::Config,
    metrics::Metrics,
};

mod batch;
mod error;
mod ethereum;
mod reconciler;
mod scanner;
mod state;
mod verifier;

/// The fraud detector service.
///
/// Runs two tasks: the reconciliation engine that cross-checks committed
/// state roots against the canonical and verifier rollup nodes, and the API
/// server that exposes the engine's latest status snapshot.
pub struct FraudDetector {
    // Token to signal all subtasks to shut down gracefully.
    shutdown_token: CancellationToken,
    // The API server is shut down separately so it can keep serving the
    // frozen status after the engine has halted on a mismatch.
    api_shutdown_token: CancellationToken,
    api_server: api::Serve,
    engine: Reconciler<CommitmentChainClient, RollupClient>,
    status: watch::Receiver<VerifiedBlockStatus>,
}

impl FraudDetector {
    /// Instantiates a new `FraudDetector`.
    ///
    /// # Errors
    ///
    /// - If the state commitment chain address cannot be parsed.
    /// - If any of the three RPC endpoints cannot be turned into a provider.
    /// - If the provided `api_addr` string cannot be parsed as a socket
    ///   address, or the API server cannot bind it.
    pub async fn new(cfg: Config, metrics: &'static Metrics) -> eyre::Result<(Self, ShutdownHandle)> {
        let shutdown_handle = ShutdownHandle::new();

        let contract_address = ethereum::address_from_string(&cfg.state_commitment_chain_address)
            .wrap_err("failed to parse state commitment chain address")?;
        let commitment_chain = CommitmentChainClient::new(&cfg.l1_rpc_endpoint, contract_address)
            .wrap_err("failed to initialize state commitment chain client")?;
        let canonical_node = RollupClient::new(&cfg.rollup_rpc_endpoint)
            .wrap_err("failed to initialize canonical rollup node client")?;
        let verifier_node = RollupClient::new(&cfg.verifier_rpc_endpoint)
            .wrap_err("failed to initialize verifier rollup node client")?;

        let state = Arc::new(State::new());
        let status = state.subscribe();

        let engine = reconciler::Builder {
            shutdown_token: shutdown_handle.token(),
            commitment_chain,
            canonical_node,
            verifier_node,
            state,
            metrics,
            l1_deployment_block: cfg.l1_deployment_block,
            rollup_start_block: cfg.rollup_start_block,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            confirmation_depth: cfg.l1_confirmation_depth,
            max_scan_window: cfg.max_scan_window,
        }
        .build();

        let api_socket_addr = cfg.api_addr.parse::<SocketAddr>().wrap_err_with(|| {
            format!(
                "failed to parse provided `api_addr` string as socket address: `{}`",
                cfg.api_addr
            )
        })?;
        let api_shutdown_token = CancellationToken::new();
        let api_server = api::serve(api_socket_addr, status.clone(), api_shutdown_token.clone())
            .await
            .wrap_err("failed to start API server")?;

        let service = Self {
            shutdown_token: shutdown_handle.token(),
            api_shutdown_token,
            api_server,
            engine,
            status,
        };

        Ok((service, shutdown_handle))
    }

    pub async fn run(self) {
        let Self {
            shutdown_token,
            api_shutdown_token,
            api_server,
            engine,
            status,
        } = self;

        info!(addr = %api_server.local_addr(), "spawning API server");
        let mut api_task = tokio::spawn(async move {
            api_server
                .await
                .wrap_err("api server ended unexpectedly")
        });

        let mut engine_task = tokio::spawn(async move {
            engine
                .run_until_stopped()
                .await
                .wrap_err("reconciliation engine exited with an error")
        });
        info!("spawned reconciliation engine task");

        let shutdown = select!(
            o = &mut api_task => {
                report_exit("api server", o);
                Shutdown {
                    api_task: None,
                    engine_task: Some(engine_task),
                    api_shutdown_token,
                    shutdown_token,
                }
            }
            o = &mut engine_task => {
                report_exit("reconciliation engine", o);
                if status.borrow().is_halted() && !shutdown_token.is_cancelled() {
                    // the halted status stays available to operators; only a
                    // shutdown signal or the API server dying ends the
                    // process now
                    info!("engine halted on a mismatch; continuing to serve the frozen status");
                    select!(
                        () = shutdown_token.cancelled() => {
                            info!("received shutdown signal");
                            Shutdown {
                                api_task: Some(api_task),
                                engine_task: None,
                                api_shutdown_token,
                                shutdown_token,
                            }
                        }
                        o = &mut api_task => {
                            report_exit("api server", o);
                            Shutdown {
                                api_task: None,
                                engine_task: None,
                                api_shutdown_token,
                                shutdown_token,
                            }
                        }
                    )
                } else {
                    Shutdown {
                        api_task: Some(api_task),
                        engine_task: None,
                        api_shutdown_token,
                        shutdown_token,
                    }
                }
            }
        );
        shutdown.run().await;
    }
}

/// A handle for instructing the [`FraudDetector`] to shut down.
///
/// It is returned along with its related `FraudDetector` from
/// [`FraudDetector::new`]. The `FraudDetector` will begin to shut down as
/// soon as [`ShutdownHandle::shutdown`] is called or when the
/// `ShutdownHandle` is dropped.
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    #[must_use]
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Returns a clone of the wrapped cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Consumes `self` and cancels the wrapped cancellation token.
    pub fn shutdown(self) {
        self.token.cancel();
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            info!("shutdown handle dropped, issuing shutdown to all services");
        }
        self.token.cancel();
    }
}

fn report_exit(task_name: &str, outcome: Result<eyre::Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => info!(task = task_name, "task has exited"),
        Ok(Err(error)) => {
            error!(task = task_name, %error, "task returned with error");
        }
        Err(error) => {
            error!(
                task = task_name,
                error = &error as &dyn std::error::Error,
                "task failed to complete"
            );
        }
    }
}

struct Shutdown {
    api_task: Option<JoinHandle<eyre::Result<()>>>,
    engine_task: Option<JoinHandle<eyre::Result<()>>>,
    api_shutdown_token: CancellationToken,
    shutdown_token: CancellationToken,
}

impl Shutdown {
    const API_SHUTDOWN_TIMEOUT_SECONDS: u64 = 4;
    const ENGINE_SHUTDOWN_TIMEOUT_SECONDS: u64 = 25;

    async fn run(self) {
        let Self {
            api_task,
            engine_task,
            api_shutdown_token,
            shutdown_token,
        } = self;

        shutdown_token.cancel();

        // Giving the engine 25 seconds to shut down because Kubernetes issues
        // a SIGKILL after 30.
        if let Some(mut engine_task) = engine_task {
            info!("waiting for reconciliation engine task to shut down");
            let limit = Duration::from_secs(Self::ENGINE_SHUTDOWN_TIMEOUT_SECONDS);
            match timeout(limit, &mut engine_task).await.map(flatten_result) {
                Ok(Ok(())) => info!("reconciliation engine exited gracefully"),
                Ok(Err(error)) => error!(%error, "reconciliation engine exited with an error"),
                Err(_) => {
                    error!(
                        timeout_secs = limit.as_secs(),
                        "reconciliation engine did not shut down within timeout; killing it"
                    );
                    engine_task.abort();
                }
            }
        } else {
            info!("reconciliation engine task was already dead");
        }

        // The API server lives until the very end so the status stays
        // reachable throughout shutdown.
        api_shutdown_token.cancel();
        if let Some(mut api_task) = api_task {
            info!("waiting for API server task to shut down");
            let limit = Duration::from_secs(Self::API_SHUTDOWN_TIMEOUT_SECONDS);
            match timeout(limit, &mut api_task).await.map(flatten_result) {
                Ok(Ok(())) => info!("API server exited gracefully"),
                Ok(Err(error)) => error!(%error, "API server exited with an error"),
                Err(_) => {
                    error!(
                        timeout_secs = limit.as_secs(),
                        "API server did not shut down within timeout; killing it"
                    );
                    api_task.abort();
                }
            }
        } else {
            info!("API server task was already dead");
        }
    }
}

fn flatten_result<T>(res: Result<eyre::Result<T>, JoinError>) -> eyre::Result<T> {
    match res {
        Ok(Ok(t)) => Ok(t),
        Ok(Err(error)) => Err(error),
        Err(error) => Err(eyre::Report::new(error).wrap_err("task panicked")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use ethers::types::H256;

    use super::verifier::{
        BlockVerificationResult,
        Outcome,
    };

    pub(crate) fn make_mismatch(rollup_block_number: u64) -> BlockVerificationResult {
        BlockVerificationResult {
            rollup_block_number,
            committed_root: H256::from_low_u64_be(1),
            canonical_root: H256::from_low_u64_be(2),
            verifier_root: H256::from_low_u64_be(2),
            outcome: Outcome::CommitVsCanonicalMismatch,
        }
    }
}
