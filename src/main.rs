use std::process::ExitCode;

use eyre::WrapErr as _;
use fraud_detector::{
    telemetry,
    Config,
    FraudDetector,
};
use tokio::signal::unix::{
    signal,
    SignalKind,
};
use tracing::{
    error,
    info,
    warn,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cfg: Config = match fraud_detector::config::get().wrap_err("failed to read configuration")
    {
        Err(error) => {
            eprintln!("initializing fraud detector failed:\n{error:?}");
            return ExitCode::FAILURE;
        }
        Ok(cfg) => cfg,
    };

    let metrics = match telemetry::init(&cfg).wrap_err("failed to setup telemetry") {
        Err(error) => {
            eprintln!("initializing fraud detector failed:\n{error:?}");
            return ExitCode::FAILURE;
        }
        Ok(metrics) => metrics,
    };

    info!(
        config = serde_json::to_string(&cfg).expect("serializing to a string cannot fail"),
        "initializing fraud detector"
    );

    let mut sigterm = signal(SignalKind::terminate())
        .expect("setting a SIGTERM listener should always work on Unix");
    let (detector, shutdown_handle) = match FraudDetector::new(cfg, metrics).await {
        Err(error) => {
            error!(%error, "failed initializing fraud detector");
            return ExitCode::FAILURE;
        }
        Ok(handles) => handles,
    };
    let detector_handle = tokio::spawn(detector.run());

    let shutdown_token = shutdown_handle.token();
    tokio::select!(
        _ = sigterm.recv() => {
            // We don't care about the result (i.e. whether there could be more SIGTERM signals
            // incoming); we just want to shut down as soon as we receive the first `SIGTERM`.
            info!("received SIGTERM, issuing shutdown to all services");
            shutdown_handle.shutdown();
        }
        () = shutdown_token.cancelled() => {
            warn!("stopped waiting for SIGTERM");
        }
    );

    if let Err(error) = detector_handle.await {
        error!(%error, "failed to join main fraud detector task");
    }

    info!("fraud detector stopped");
    ExitCode::SUCCESS
}
