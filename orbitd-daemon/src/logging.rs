//! Logging initialization for orbitd.
//!
//! One `fmt` layer (JSON lines or pretty) behind an `EnvFilter`. The
//! configured level applies to orbitd itself; HTTP and Docker client
//! internals stay at `warn` unless `RUST_LOG` says otherwise.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use orbitd_core::config::GeneralConfig;

/// Client crates whose debug output drowns the update log.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "bollard"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// Must be called once, before the first event. `RUST_LOG` replaces the
/// whole filter when set.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let output = output_layer(&config.log_format)?;

    tracing_subscriber::registry()
        .with(output)
        .with(build_filter(&config.log_level))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}

fn output_layer(format: &str) -> Result<BoxedLayer> {
    match format {
        "json" => Ok(tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed()),
        "pretty" => Ok(tracing_subscriber::fmt::layer().pretty().boxed()),
        other => Err(anyhow::anyhow!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(log_level)))
}

fn directives(log_level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(log_level.to_owned(), |acc, target| format!("{acc},{target}=warn"))
}
