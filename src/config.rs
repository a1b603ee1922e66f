use figment::{
    providers::Env,
    Figment,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
/// The single config for creating a fraud detector service.
pub struct Config {
    /// Log level. One of debug, info, warn, or error
    pub log: String,

    /// RPC endpoint of the base chain on which state root commitments are
    /// published.
    pub l1_rpc_endpoint: String,

    /// RPC endpoint of the canonical rollup node.
    pub rollup_rpc_endpoint: String,

    /// RPC endpoint of the independently operated verifier rollup node.
    pub verifier_rpc_endpoint: String,

    /// Address of the state commitment chain contract on the base chain.
    pub state_commitment_chain_address: String,

    /// Base chain block at which the state commitment chain was deployed;
    /// scanning starts here.
    pub l1_deployment_block: u64,

    /// First rollup block covered by the commitment log.
    pub rollup_start_block: u64,

    /// How long to wait for new base chain blocks once the scan has caught up,
    /// in milliseconds.
    pub poll_interval_ms: u64,

    /// Number of base chain blocks withheld from the scan window to avoid
    /// acting on blocks that may still be reorganized.
    pub l1_confirmation_depth: u64,

    /// Maximum number of base chain blocks scanned per cycle.
    pub max_scan_window: u64,

    /// The socket address at which the service serves the verified block
    /// status, healthz and readyz calls.
    pub api_addr: String,

    /// Writes a human readable log format to stdout instead of JSON.
    pub pretty_print: bool,

    /// Set to true to disable the metrics server
    pub no_metrics: bool,

    /// The endpoint which will be listened on for serving prometheus metrics
    pub metrics_http_listener_addr: String,
}

impl Config {
    const PREFIX: &'static str = "FRAUD_DETECTOR_";
}

/// Reads the config from the environment.
///
/// # Errors
///
/// Returns an error if a required variable is missing or a value cannot be
/// parsed as the field's type.
pub fn get() -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Env::prefixed("RUST_").split("_").only(&["log"]))
        .merge(Env::prefixed(Config::PREFIX))
        .extract()
}

#[cfg(test)]
mod tests {
    use super::{
        get,
        Config,
    };

    fn populate_environment(jail: &mut figment::Jail) {
        jail.set_env("FRAUD_DETECTOR_LOG", "info");
        jail.set_env("FRAUD_DETECTOR_L1_RPC_ENDPOINT", "http://127.0.0.1:8545");
        jail.set_env("FRAUD_DETECTOR_ROLLUP_RPC_ENDPOINT", "http://127.0.0.1:9545");
        jail.set_env(
            "FRAUD_DETECTOR_VERIFIER_RPC_ENDPOINT",
            "http://127.0.0.1:9546",
        );
        jail.set_env(
            "FRAUD_DETECTOR_STATE_COMMITMENT_CHAIN_ADDRESS",
            "0xde300f1ad3d21ab6fb1e2d25cbd3cdda95c6110c",
        );
        jail.set_env("FRAUD_DETECTOR_L1_DEPLOYMENT_BLOCK", "128");
        jail.set_env("FRAUD_DETECTOR_ROLLUP_START_BLOCK", "1");
        jail.set_env("FRAUD_DETECTOR_POLL_INTERVAL_MS", "60000");
        jail.set_env("FRAUD_DETECTOR_L1_CONFIRMATION_DEPTH", "8");
        jail.set_env("FRAUD_DETECTOR_MAX_SCAN_WINDOW", "1000");
        jail.set_env("FRAUD_DETECTOR_API_ADDR", "0.0.0.0:8555");
        jail.set_env("FRAUD_DETECTOR_PRETTY_PRINT", "false");
        jail.set_env("FRAUD_DETECTOR_NO_METRICS", "false");
        jail.set_env("FRAUD_DETECTOR_METRICS_HTTP_LISTENER_ADDR", "0.0.0.0:9000");
    }

    #[test]
    fn config_is_read_from_prefixed_environment() {
        figment::Jail::expect_with(|jail| {
            populate_environment(jail);
            let config: Config = get()?;
            assert_eq!(config.l1_deployment_block, 128);
            assert_eq!(config.rollup_start_block, 1);
            assert_eq!(config.l1_confirmation_depth, 8);
            assert_eq!(config.max_scan_window, 1000);
            assert_eq!(config.api_addr, "0.0.0.0:8555");
            Ok(())
        });
    }

    #[test]
    fn missing_required_variable_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FRAUD_DETECTOR_LOG", "info");
            let config: Result<Config, _> = get();
            assert!(config.is_err());
            Ok(())
        });
    }

    #[test]
    fn service_log_overrides_rust_log() {
        figment::Jail::expect_with(|jail| {
            populate_environment(jail);
            jail.set_env("RUST_LOG", "debug");
            let config: Config = get()?;
            assert_eq!(config.log, "info");
            Ok(())
        });
    }
}
