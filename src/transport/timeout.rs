//! Per-request timeouts for chain node RPC calls.

use alloy::{
    primitives::ChainId,
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{Transport, TransportError, TransportErrorKind, TransportFut},
};
use futures::FutureExt;
use metrics::Counter;
use metrics_derive::Metrics;
use std::{
    task::{Context, Poll},
    time::Duration,
};
use tower::{Layer, Service};
use tracing::warn;

#[derive(Metrics, Clone)]
#[metrics(scope = "transport")]
struct TimeoutMetrics {
    /// Requests to a chain node that did not complete in time.
    timeouts: Counter,
}

/// A [`tower::Layer`] that fails chain node requests which do not complete within a timeout.
#[derive(Debug, Clone)]
pub struct RequestTimeoutLayer {
    timeout: Duration,
    chain_id: ChainId,
}

impl RequestTimeoutLayer {
    /// Creates a new [`RequestTimeoutLayer`] for the node of `chain_id`.
    pub const fn new(timeout: Duration, chain_id: ChainId) -> Self {
        Self { timeout, chain_id }
    }
}

impl<T> Layer<T> for RequestTimeoutLayer {
    type Service = RequestTimeoutService<T>;

    fn layer(&self, inner: T) -> Self::Service {
        RequestTimeoutService { inner, timeout: self.timeout, chain_id: self.chain_id }
    }
}

/// A transport that bounds every request with a timeout.
#[derive(Debug, Clone)]
pub struct RequestTimeoutService<T> {
    inner: T,
    timeout: Duration,
    chain_id: ChainId,
}

/// Returns the method of a single request, or the methods of a batch joined by `,`.
fn method_names(req: &RequestPacket) -> String {
    match req {
        RequestPacket::Single(req) => req.method().to_string(),
        RequestPacket::Batch(reqs) => {
            reqs.iter().map(|req| req.method()).collect::<Vec<_>>().join(",")
        }
    }
}

impl<T> Service<RequestPacket> for RequestTimeoutService<T>
where
    T: Transport + Clone,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let method = method_names(&req);
        let fut = self.inner.call(req);
        let timeout = self.timeout;
        let chain_id = self.chain_id;

        async move {
            let Ok(result) = tokio::time::timeout(timeout, fut).await else {
                warn!(chain_id, %method, ?timeout, "Chain node request timed out");
                TimeoutMetrics::new_with_labels(&[("chain_id", chain_id.to_string())])
                    .timeouts
                    .increment(1);
                return Err(TransportErrorKind::custom_str(&format!(
                    "request to chain {chain_id} timed out after {timeout:?}: {method}"
                )));
            };
            result
        }
        .boxed()
    }
}
