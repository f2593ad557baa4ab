//! Sending requests and classifying responses.

use reqwest::Response;
use tracing::debug;

use crate::context::CallContext;
use crate::errors::GenaiError;
use crate::http::error_helpers::check_response;
use crate::http::loud_wire;
use crate::payload::{HTTP_HEADERS_FIELD, Payload, headers_to_value, parse_object};

/// Sends `request` and returns the response if its status is 2xx.
///
/// Non-2xx responses are read and turned into [`GenaiError::Api`]. The wait
/// for the response races the call context.
pub(crate) async fn execute(
    http: &reqwest::Client,
    request: reqwest::Request,
    ctx: &CallContext,
    request_id: usize,
) -> Result<Response, GenaiError> {
    let operation = request.method().to_string();
    let url = request.url().to_string();

    loud_wire::log_request(
        request_id,
        &operation,
        &url,
        request.body().and_then(reqwest::Body::as_bytes),
    );
    debug!(request_id, %operation, %url, "Sending request");

    let response = ctx
        .run(async {
            http.execute(request)
                .await
                .map_err(|source| GenaiError::Transport {
                    operation: operation.clone(),
                    url: url.clone(),
                    source,
                })
        })
        .await?;

    let status = response.status();
    loud_wire::log_response_status(request_id, status.as_u16());
    debug!(request_id, status = status.as_u16(), "Response received");

    match check_response(response).await {
        Ok(response) => Ok(response),
        Err(e) => {
            if let GenaiError::Api(api) = &e {
                tracing::error!(
                    request_id,
                    code = api.code,
                    status = %api.status,
                    server_request_id = ?api.request_id,
                    "Request failed: {}",
                    api.message
                );
            }
            Err(e)
        }
    }
}

/// Reads a unary response body into a payload with `httpHeaders` attached.
pub(crate) async fn read_unary(response: Response, request_id: usize) -> Result<Payload, GenaiError> {
    let headers = headers_to_value(response.headers());
    let body = response.text().await?;
    loud_wire::log_response_body(request_id, &body);

    let mut payload = parse_object(&body)?;
    payload.insert(HTTP_HEADERS_FIELD.to_string(), headers);
    Ok(payload)
}
