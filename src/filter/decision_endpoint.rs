use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::engine::DynEngine;
use crate::model::RequestContext;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRequest {
    rule_set_id: String,
    #[allow(dead_code)]
    path: String,
    method: String,
    client_ip: String,
    user_id: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionResponse {
    allowed: bool,
    remaining_tokens: u64,
    retry_after_millis: u64,
    matched_rule: Option<MatchedRuleDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct MatchedRuleDto {
    id: String,
    name: String,
}

fn json_body(status: StatusCode, body: impl Serialize) -> Response<BoxBody> {
    let payload = serde_json::to_string(&body).unwrap_or_else(|_| r#"{"error":"encoding failure"}"#.to_string());
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(full_body(payload))
        .unwrap()
}

/// `POST /api/ratelimit/check` (spec.md §6 remote mode): status is always 200
/// once a request body parses — the verdict, or a failure to produce one, is
/// always reported in the body, never via HTTP status.
pub async fn handle_decision(req: Request<Incoming>, engine: Arc<DynEngine>) -> Result<Response<BoxBody>, hyper::Error> {
    if req.method() != Method::POST || req.uri().path() != "/api/ratelimit/check" {
        return Ok(json_body(StatusCode::NOT_FOUND, serde_json::json!({"error": "not found"})));
    }

    let body = req.into_body().collect().await?.to_bytes();
    let parsed: DecisionRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return Ok(json_body(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": format!("invalid request body: {e}")}),
            ));
        }
    };

    let mut context = RequestContext::new(parsed.client_ip, parsed.path.clone(), parsed.method);
    if let Some(user_id) = parsed.user_id {
        context = context.with_user_id(user_id);
    }
    if let Some(api_key) = parsed.api_key {
        context = context.with_api_key(api_key);
    }
    for (key, value) in parsed.attributes {
        context = context.with_attribute(key, value);
    }

    match engine.check(&parsed.rule_set_id, &context).await {
        Ok(verdict) => {
            let retry_after_millis = (verdict.nanos_to_wait_for_refill + 999_999) / 1_000_000;
            Ok(json_body(
                StatusCode::OK,
                DecisionResponse {
                    allowed: verdict.allowed,
                    remaining_tokens: verdict.remaining_tokens,
                    retry_after_millis,
                    matched_rule: verdict.matched_rule.map(|m| MatchedRuleDto { id: m.id, name: m.name }),
                    error: None,
                },
            ))
        }
        // Status is always 200 here too — a missing rule-set, an open
        // circuit, a timeout, or a store connection failure are all reported
        // in the body, not via HTTP status (spec.md §6).
        Err(e) => Ok(json_body(
            StatusCode::OK,
            DecisionResponse {
                allowed: false,
                remaining_tokens: 0,
                retry_after_millis: 0,
                matched_rule: None,
                error: Some(e.to_string()),
            },
        )),
    }
}
