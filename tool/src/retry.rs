//! HTTP JSON-RPC transport that retries failed requests with exponential
//! backoff.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use alloy::{
    providers::{ProviderBuilder, RootProvider},
    rpc::{
        client::ClientBuilder,
        json_rpc::{RequestPacket, ResponsePacket},
    },
    transports::{http::ReqwestTransport, TransportError},
};
use tower::{retry::Policy, Layer, Service};
use tracing::warn;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base: Duration,
    attempt: u32,
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            attempt: 0,
            max_retries,
        }
    }

    /// The base delay doubled for every attempt already made, capped at
    /// [`MAX_BACKOFF`].
    pub fn delay(&self) -> Duration {
        self.base
            .saturating_mul(1u32 << self.attempt.min(16))
            .min(MAX_BACKOFF)
    }

    fn next_attempt(&self) -> Option<Self> {
        (self.attempt < self.max_retries).then(|| Self {
            attempt: self.attempt + 1,
            ..self.clone()
        })
    }
}

impl Policy<RequestPacket, ResponsePacket, TransportError> for RetryPolicy {
    type Future = Pin<Box<dyn Future<Output = Self> + Send + 'static>>;

    fn retry(
        &self,
        _req: &RequestPacket,
        result: Result<&ResponsePacket, &TransportError>,
    ) -> Option<Self::Future> {
        let err = result.err()?;
        let next = self.next_attempt()?;
        let delay = self.delay();
        warn!(attempt = next.attempt, ?delay, %err, "rpc request failed, retrying");
        Some(Box::pin(async move {
            tokio::time::sleep(delay).await;
            next
        }))
    }

    fn clone_request(&self, req: &RequestPacket) -> Option<RequestPacket> {
        Some(req.clone())
    }
}

#[derive(Debug, Clone)]
pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Service<RequestPacket> for RetryService<S>
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        // the clone may not be ready, so keep the polled service for this call
        let fresh = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, fresh);
        let mut policy = self.policy.clone();

        Box::pin(async move {
            loop {
                let result = inner.call(req.clone()).await;
                match policy.retry(&req, result.as_ref()) {
                    Some(next) => policy = next.await,
                    None => return result,
                }
            }
        })
    }
}

/// An HTTP provider whose requests are retried up to `max_retries` times,
/// starting `backoff` milliseconds after the first failure.
pub fn build_http_retry_provider(
    rpc_url: url::Url,
    backoff: u64,
    max_retries: u32,
) -> RootProvider<RetryService<ReqwestTransport>> {
    let layer = RetryLayer::new(RetryPolicy::new(
        Duration::from_millis(backoff),
        max_retries,
    ));
    let client = ClientBuilder::default().layer(layer).http(rpc_url);
    ProviderBuilder::new().on_client(client)
}
