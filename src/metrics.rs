//! Prometheus exporter and RPC metrics.

use futures_util::future::BoxFuture;
use jsonrpsee::{
    MethodResponse,
    server::middleware::rpc::RpcServiceT,
    types::{Request, error::METHOD_NOT_FOUND_CODE},
};
use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

#[derive(Metrics, Clone)]
#[metrics(scope = "rpc")]
struct RpcCallMetrics {
    /// Calls of the method.
    calls: Counter,
    /// Calls of the method that returned an error.
    failures: Counter,
    /// Latency of the method in milliseconds.
    latency: Histogram,
}

/// A [`jsonrpsee`] middleware that records calls, failures and latency of `relay_` methods.
#[derive(Debug, Clone)]
pub struct RpcMetricsService<S> {
    service: S,
}

impl<S> RpcMetricsService<S> {
    /// Wraps `inner`.
    pub const fn new(inner: S) -> Self {
        Self { service: inner }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsService<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let method = req.method_name().to_string();
            let started_at = Instant::now();
            let response = service.call(req).await;

            // a label per unknown method name would be unbounded
            if response.as_error_code() == Some(METHOD_NOT_FOUND_CODE) {
                return response;
            }

            let metrics = RpcCallMetrics::new_with_labels(&[("method", method)]);
            metrics.calls.increment(1);
            if response.is_error() {
                metrics.failures.increment(1);
            }
            metrics.latency.record(started_at.elapsed().as_millis() as f64);
            response
        })
    }
}

/// Installs the global Prometheus recorder and serves it on `metrics_addr`.
///
/// Upkeep runs every 5 seconds. Calling this again returns the handle of the first exporter.
pub fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> eyre::Result<PrometheusHandle> {
    static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

    let mut lock = HANDLE.lock().map_err(|_| eyre::eyre!("metrics handle lock poisoned"))?;
    if let Some(handle) = &*lock {
        return Ok(handle.clone());
    }

    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|err| eyre::eyre!("could not set metrics recorder: {err}"))?;
    tokio::spawn(exporter);

    tracing::info!(target: "relay::spawn", %addr, "Started metrics server");

    *lock = Some(handle.clone());
    Ok(handle)
}
