use crate::config::LoggingConfig;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const REQUESTS_TOTAL: &str = "tabserve_requests_total";
pub const TRANSFORM_SECONDS: &str = "tabserve_transform_seconds";
pub const MODEL_LOAD_SECONDS: &str = "tabserve_model_load_seconds";

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

/// Installs the Prometheus recorder and returns the handle `/metrics` renders.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Invocations by outcome and final stage");
    describe_histogram!(TRANSFORM_SECONDS, Unit::Seconds, "Time spent in decode, predict and encode");
    describe_histogram!(MODEL_LOAD_SECONDS, Unit::Seconds, "Time spent loading the model");
}

pub fn record_request(success: bool, stage: &'static str, elapsed: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(REQUESTS_TOTAL, "outcome" => outcome, "stage" => stage).increment(1);
    histogram!(TRANSFORM_SECONDS).record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;

    #[test]
    fn test_request_metrics_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_request(true, "done", Duration::from_millis(12));
            record_request(false, "decoding", Duration::from_millis(1));
        });

        let output = handle.render();
        assert!(output.contains(REQUESTS_TOTAL));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("stage=\"decoding\""));
        assert!(output.contains(TRANSFORM_SECONDS));
    }

    #[test]
    fn test_recording_without_recorder_is_a_no_op() {
        record_request(true, "done", Duration::from_millis(3));
    }

    #[test]
    fn test_tracing_setup() {
        let config = LoggingConfig {
            filter: "debug".to_string(),
            json: true,
        };
        // Another test may already own the global subscriber.
        if init_tracing(&config).is_ok() {
            info!("Tracing initialized successfully for test");
        }
    }
}
