use crate::RelayError;
use crate::service::DiscoveryHandler;
use bytes::Bytes;
use lambda_http::{Body, Request, service_fn};
use std::sync::Arc;

/// Registers the handler with the Lambda runtime and serves invocations until
/// the runtime shuts the process down.
pub async fn serve(handler: Arc<DiscoveryHandler>) -> Result<(), RelayError> {
    lambda_http::run(service_fn(move |request: Request| {
        let handler = handler.clone();
        async move {
            let response = handler.handle(request).await;
            Ok::<_, lambda_http::Error>(response.map(into_lambda_body))
        }
    }))
    .await
    .map_err(|e| RelayError::Lambda(e.to_string()))
}

fn into_lambda_body(body: Bytes) -> Body {
    if body.is_empty() {
        return Body::Empty;
    }
    match String::from_utf8(body.to_vec()) {
        Ok(text) => Body::Text(text),
        Err(e) => Body::Binary(e.into_bytes()),
    }
}
