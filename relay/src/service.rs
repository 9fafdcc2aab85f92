use crate::RelayError;
use crate::config::RelayConfig;
use crate::devices::normalize;
use crate::metrics_defs::{
    DEVICE_REQUESTS, UNAUTHORIZED_REQUESTS, UPSTREAM_DURATION, UPSTREAM_FAILURES,
};
use crate::upstream::{TailscaleApi, UpstreamError};
use bytes::Bytes;
use http::header::{
    ALLOW, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, WWW_AUTHENTICATE,
};
use http::{Method, Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;
use shared::http::{make_error_response, text_response};
use shared::{counter, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;

pub const DEVICES_PATH: &str = "/tailscale-discovery/api/devices";
pub const HEALTH_PATH: &str = "/health";

/// Answers relay requests independently of how they reached the process.
pub struct DiscoveryHandler {
    upstream: TailscaleApi,
    api_token: Option<String>,
}

impl DiscoveryHandler {
    pub fn new(config: &RelayConfig) -> Result<Self, UpstreamError> {
        Ok(DiscoveryHandler {
            upstream: TailscaleApi::new(&config.upstream)?,
            api_token: config.api_token.clone(),
        })
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<Bytes> {
        let (parts, _) = request.into_parts();

        match parts.uri.path() {
            HEALTH_PATH => text_response(StatusCode::OK, "ok\n"),
            DEVICES_PATH => {
                if parts.method != Method::GET {
                    let mut response = make_error_response(StatusCode::METHOD_NOT_ALLOWED);
                    response
                        .headers_mut()
                        .insert(ALLOW, HeaderValue::from_static("GET"));
                    return response;
                }

                if !self.is_authorized(&parts.headers) {
                    counter!(UNAUTHORIZED_REQUESTS).increment(1);
                    let mut response = make_error_response(StatusCode::UNAUTHORIZED);
                    response
                        .headers_mut()
                        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                    return response;
                }

                counter!(DEVICE_REQUESTS).increment(1);
                self.devices().await
            }
            _ => make_error_response(StatusCode::NOT_FOUND),
        }
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.api_token else {
            return true;
        };

        headers
            .get(AUTHORIZATION)
            .and_then(|value| bearer_token(value.as_bytes()))
            .is_some_and(|token| bool::from(token.ct_eq(expected.as_bytes())))
    }

    async fn devices(&self) -> Response<Bytes> {
        let started = Instant::now();
        let result = self.upstream.fetch_devices().await;
        histogram!(UPSTREAM_DURATION).record(started.elapsed().as_secs_f64());

        let api_devices = match result {
            Ok(api_devices) => api_devices,
            Err(e) => {
                counter!(UPSTREAM_FAILURES).increment(1);
                tracing::error!(error = %e, "device listing failed");
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        };

        let devices = normalize(api_devices);
        match serde_json::to_vec(&devices) {
            Ok(body) => {
                let mut response = Response::new(Bytes::from(body));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "could not serialize devices");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

/// Extracts the credentials of a `Bearer` authorization value. The scheme
/// name is case-insensitive.
fn bearer_token(value: &[u8]) -> Option<&[u8]> {
    let (scheme, token) = value.split_at_checked(6)?;
    let token = token.strip_prefix(b" ")?.trim_ascii_start();

    (scheme.eq_ignore_ascii_case(b"bearer") && !token.is_empty()).then_some(token)
}

/// Hyper adapter around [`DiscoveryHandler`].
#[derive(Clone)]
pub struct RelayService {
    handler: Arc<DiscoveryHandler>,
}

impl RelayService {
    pub fn new(handler: Arc<DiscoveryHandler>) -> Self {
        Self { handler }
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<BoxBody<Bytes, RelayError>>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let handler = self.handler.clone();

        Box::pin(async move {
            let response = handler.handle(req).await;
            Ok(response.map(|body| Full::new(body).map_err(|e| match e {}).boxed()))
        })
    }
}
