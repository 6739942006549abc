//! Optional Prometheus recorder installer, grounded on `soar::metrics::
//! init_metrics` minus its axum/pprof scraping endpoint (out of scope here —
//! this crate has no HTTP surface of its own). The library never calls this;
//! a consumer that wants Prometheus output opts in explicitly.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install a global Prometheus recorder for `aerostate`'s `metrics::counter!`/
/// `histogram!` calls. Call at most once per process.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}
