//! Rate limiting middleware for the voice endpoints.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, response::IntoResponse};
use config::RateLimitTier;
use http::{
    HeaderMap, Request, Response,
    header::{ACCEPT_LANGUAGE, USER_AGENT},
};
use rate_limit::{RateLimitManager, RateLimitRequest};
use tower::Layer;
use tts::TtsError;

#[derive(Clone)]
pub struct RateLimitLayer {
    manager: Arc<RateLimitManager>,
    tiers: Arc<[RateLimitTier]>,
}

impl RateLimitLayer {
    pub fn new(manager: Arc<RateLimitManager>, tiers: &[RateLimitTier]) -> Self {
        Self {
            manager,
            tiers: Arc::from(tiers),
        }
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            manager: self.manager.clone(),
            tiers: self.tiers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    manager: Arc<RateLimitManager>,
    tiers: Arc<[RateLimitTier]>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();

        let rate_limit_request = rate_limit_request(req.headers());
        let outcome = self.manager.check_multiple_limits(&rate_limit_request, &self.tiers);

        Box::pin(async move {
            let err = match outcome.into_result() {
                Ok(()) => return next.call(req).await,
                Err(err) => err,
            };

            log::warn!("Request rejected by rate limit tier {}", err.limit());

            Ok(TtsError::from(err).into_response())
        })
    }
}

/// Collect the identity attributes of a request.
fn rate_limit_request(headers: &HeaderMap) -> RateLimitRequest {
    let mut builder = RateLimitRequest::builder();

    if let Some(ip) = extract_client_ip(headers) {
        builder = builder.ip(ip);
    }

    if let Some(user_agent) = header_str(headers, USER_AGENT.as_str()) {
        builder = builder.user_agent(user_agent);
    }

    if let Some(accept_language) = header_str(headers, ACCEPT_LANGUAGE.as_str()) {
        builder = builder.accept_language(accept_language);
    }

    builder.build()
}

/// Extract the client address from the forwarding headers.
///
/// Requests without any of them share one bucket per tier.
fn extract_client_ip(headers: &HeaderMap) -> Option<&str> {
    // The first address in the chain is the original client
    if let Some(forwarded_for) = header_str(headers, "x-forwarded-for") {
        let first = forwarded_for.split(',').next().map(str::trim).unwrap_or_default();

        if !first.is_empty() {
            return Some(first);
        }
    }

    ["x-real-ip", "cf-connecting-ip"]
        .into_iter()
        .filter_map(|name| header_str(headers, name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}
