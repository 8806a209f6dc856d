use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};

use super::state::FluxgateState;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

fn json(status: u16, body: impl Into<Bytes>) -> Response<BoxBody> {
    Response::builder().status(status).body(full_body(body)).unwrap()
}

/// `/healthz`, `/readyz`, `/metrics` (ambient ops surface — mirrors the
/// teacher's admin server, scoped to fluxgate's own dependencies).
pub async fn handle_admin(req: Request<Incoming>, state: FluxgateState) -> Result<Response<BoxBody>, hyper::Error> {
    match req.uri().path() {
        "/health" | "/healthz" => Ok(json(200, r#"{"status":"ok"}"#)),

        // Readiness depends on store connectivity — the cache/rule-set layer
        // can be perfectly healthy while the store is unreachable, but no
        // rate-limit decision can be made without it.
        "/ready" | "/readyz" => {
            if state.store.ping().await.is_ok() {
                Ok(json(200, r#"{"status":"ready"}"#))
            } else {
                Ok(json(503, r#"{"status":"not ready","reason":"store unreachable"}"#))
            }
        }

        "/metrics" => {
            let body = state.metrics.render();
            Ok(Response::builder()
                .status(200)
                .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
                .body(full_body(body))
                .unwrap())
        }

        _ => Ok(json(404, r#"{"error":"not found"}"#)),
    }
}
