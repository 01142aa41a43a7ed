//! The metered `/v1/messages` request handler (C6).
//!
//! Orchestrates C2 (via the [`AuthenticatedUser`] extractor) → C3 balance
//! check → upstream forward → C4 streaming extraction or direct JSON
//! parsing → C5 usage report.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use meter_core::{UsageReport, UsageTokens};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::sse::SseUsageExtractor;
use crate::state::AppState;

/// Inbound request body, typed just enough to recover the `model` field for
/// the billing fallback; every other key passes through untouched.
#[derive(Debug, Deserialize, Serialize)]
struct MessagesRequestBody {
    model: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

#[tracing::instrument(
    skip_all,
    fields(user_id = %user.principal.user_id, model = tracing::field::Empty, status = tracing::field::Empty, streaming = tracing::field::Empty),
)]
pub async fn messages(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let balance = state.balance_cache.check(&user.principal.user_id, &user.credential).await;
    if !balance.ok {
        return Err(if balance.service_unavailable { ApiError::BillingUnavailable } else { ApiError::InsufficientBalance });
    }

    // Model extraction is best-effort only; a body that doesn't parse into
    // our typed shape is still forwarded verbatim
    // rather than rejected, since the upstream API is the authority on
    // whether the body itself is valid.
    let (request_model, forward_body) = match serde_json::from_slice::<MessagesRequestBody>(&body) {
        Ok(parsed) => {
            let model = parsed.model.clone();
            let reserialized = serde_json::to_vec(&parsed).unwrap_or_else(|_| body.to_vec());
            (model, reserialized)
        }
        Err(err) => {
            tracing::debug!(error = %err, "inbound body did not parse, forwarding raw bytes");
            (None, body.to_vec())
        }
    };

    let upstream_url = format!("{}/v1/messages", state.config.anthropic_api_base_url.trim_end_matches('/'));
    let upstream_request = state
        .upstream_client
        .post(&upstream_url)
        .header("x-api-key", &state.config.anthropic_api_key)
        .header("content-type", "application/json");
    let upstream_request = forward_inbound_headers(upstream_request, &headers);

    let upstream_response = upstream_request.body(forward_body).send().await.map_err(|err| {
        tracing::warn!(error = %err, "failed to reach upstream Anthropic API");
        ApiError::UpstreamUnreachable
    })?;

    let status = StatusCode::from_u16(upstream_response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = passthrough_headers(upstream_response.headers());
    let is_event_stream = response_headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/event-stream"));

    let user_id = user.principal.user_id;

    let span = tracing::Span::current();
    span.record("status", status.as_u16());
    span.record("streaming", is_event_stream);
    if let Some(model) = &request_model {
        span.record("model", model.as_str());
    }

    if is_event_stream {
        Ok(stream_path(state, user_id, user.credential, request_model, status, response_headers, upstream_response))
    } else {
        json_path(state, user_id, user.credential, request_model, status, response_headers, upstream_response).await
    }
}

fn forward_inbound_headers(mut builder: reqwest::RequestBuilder, headers: &HeaderMap) -> reqwest::RequestBuilder {
    for name in ["anthropic-version", "anthropic-beta", "content-type"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            builder = builder.header(name, value);
        }
    }
    builder
}

/// Copy the upstream `content-type` and any `x-ratelimit*`/`request-id`
/// header through to the client response untouched.
fn passthrough_headers(upstream: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();

    if let Some(content_type) = upstream.get(reqwest::header::CONTENT_TYPE) {
        out.insert(axum::http::header::CONTENT_TYPE, content_type.clone());
    }

    for (name, value) in upstream {
        let lower = name.as_str();
        if lower.starts_with("x-ratelimit") || lower == "request-id" {
            out.insert(name.clone(), value.clone());
        }
    }

    out
}

async fn json_path(
    state: Arc<AppState>,
    user_id: String,
    credential: String,
    request_model: Option<String>,
    status: StatusCode,
    headers: HeaderMap,
    upstream_response: reqwest::Response,
) -> Result<Response, ApiError> {
    let is_json = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let body = upstream_response.bytes().await.map_err(|err| {
        tracing::warn!(error = %err, "upstream body read failed");
        ApiError::UpstreamUnreachable
    })?;

    if status.is_success() && is_json {
        meter_json_body(&state, &user_id, &credential, request_model, &body);
    }

    let mut response = (status, body).into_response();
    *response.headers_mut() = headers;
    Ok(response)
}

fn meter_json_body(state: &Arc<AppState>, user_id: &str, credential: &str, request_model: Option<String>, body: &[u8]) {
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse upstream JSON body for metering");
            return;
        }
    };

    let usage = parsed.get("usage").cloned().unwrap_or(Value::Null);
    let tokens = UsageTokens {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read_tokens: usage.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_creation_tokens: usage.get("cache_creation_input_tokens").and_then(Value::as_u64).unwrap_or(0),
    };

    if tokens.input_tokens == 0 && tokens.output_tokens == 0 {
        return;
    }

    let model = parsed.get("model").and_then(Value::as_str).map(str::to_string).or(request_model);
    emit_usage_report(state, user_id, credential, model, tokens);
}

fn stream_path(
    state: Arc<AppState>,
    user_id: String,
    credential: String,
    request_model: Option<String>,
    status: StatusCode,
    headers: HeaderMap,
    upstream_response: reqwest::Response,
) -> Response {
    let mut byte_stream = upstream_response.bytes_stream();

    let body_stream = async_stream::stream! {
        let mut extractor = SseUsageExtractor::new();

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    extractor.push_chunk(&bytes);
                    yield Ok::<Bytes, std::io::Error>(bytes);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "upstream stream read failed");
                    break;
                }
            }
        }

        extractor.finish();
        let tokens = extractor.usage();
        if tokens.input_tokens > 0 || tokens.output_tokens > 0 {
            let model = extractor.model().map(str::to_string).or(request_model);
            emit_usage_report(&state, &user_id, &credential, model, tokens);
        }
    };

    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn emit_usage_report(state: &Arc<AppState>, user_id: &str, credential: &str, model: Option<String>, tokens: UsageTokens) {
    // The upstream-reported model resolves aliases (e.g. a dated snapshot id);
    // prefer it over the request body's model, which is a fallback only.
    let model = model.unwrap_or_else(|| "unknown".to_string());
    let cost = state.pricing.cost(&model, &tokens);
    let report = UsageReport::new(user_id, model, tokens, cost);
    state.reporter.report(credential.to_string(), report);
}
