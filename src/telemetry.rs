use std::net::SocketAddr;

use eyre::WrapErr as _;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
    EnvFilter,
};

use crate::{
    config::Config,
    metrics::Metrics,
};

/// Installs the global tracing subscriber and, unless disabled, the prometheus
/// metrics exporter, then registers the service's metrics.
///
/// Must be called from within a tokio runtime because the metrics exporter
/// spawns its http listener on it.
///
/// # Errors
///
/// - if the configured log filter directives cannot be parsed.
/// - if a global tracing subscriber was already installed.
/// - if the metrics listener address is invalid or the exporter fails to
///   install.
pub fn init(cfg: &Config) -> eyre::Result<&'static Metrics> {
    let env_filter = EnvFilter::try_new(&cfg.log)
        .wrap_err_with(|| format!("failed to parse log filter directives `{}`", cfg.log))?;

    if cfg.pretty_print {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .wrap_err("failed installing global tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()
            .wrap_err("failed installing global tracing subscriber")?;
    }

    if !cfg.no_metrics {
        let listener_addr: SocketAddr =
            cfg.metrics_http_listener_addr.parse().wrap_err_with(|| {
                format!(
                    "failed to parse provided `metrics_http_listener_addr` string as socket \
                     address: `{}`",
                    cfg.metrics_http_listener_addr
                )
            })?;
        PrometheusBuilder::new()
            .with_http_listener(listener_addr)
            .install()
            .wrap_err("failed installing prometheus metrics exporter")?;
    }

    Ok(Box::leak(Box::new(Metrics::new())))
}
