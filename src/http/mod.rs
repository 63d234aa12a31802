//! HTTP surface
//!
//! A hand-routed hyper service. Handlers return `Result<Response>`;
//! routing maps errors onto status codes in one place. The pixel path
//! is the exception: its contract is an unconditional image response.

pub mod api;
pub mod pixel;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::state::AppState;
use crate::types::error::{MailtraceError, Result};

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .map_err(|e| MailtraceError::Config(format!("invalid bind address: {}", e)))?;

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(route(state, req).await) }
            }))
        }
    });

    info!(addr = %addr, "HTTP server listening");
    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}

async fn route(state: Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // The pixel is routed first and outside the error mapping: its
    // contract is an unconditional image, so it returns a Response
    // directly instead of a Result.
    if method == Method::GET {
        if let Some(tracking_id) = pixel_path_id(&path) {
            return pixel::respond(&state, tracking_id, req.headers()).await;
        }
    }

    let result = match (&method, path.as_str()) {
        (&Method::POST, "/api/login") => api::login(&state, req).await,
        (&Method::GET, "/api/inbox") => api::list_inbox(&state, req).await,
        (&Method::POST, "/api/inbox") => api::inbox_action(&state, req).await,
        (&Method::POST, "/api/send") => api::send(&state, req).await,
        (&Method::GET, "/api/emails") => api::tracked_overview(&state, req).await,
        (&Method::POST, "/api/emails") => api::tracked_action(&state, req).await,
        (&Method::POST, "/api/generate-tracking-url") => {
            api::generate_tracking_url(&state, req).await
        }
        _ => Err(MailtraceError::NotFound),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

fn pixel_path_id(path: &str) -> Option<&str> {
    path.strip_prefix("/api/track/")
        .or_else(|| path.strip_prefix("/track/"))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

fn status_for(err: &MailtraceError) -> StatusCode {
    match err {
        MailtraceError::Authentication(_) => StatusCode::UNAUTHORIZED,
        MailtraceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MailtraceError::NotFound => StatusCode::NOT_FOUND,
        MailtraceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &MailtraceError) -> Response<Body> {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("Request failed: {}", err);
    }
    json_response(status, &json!({ "error": err.to_string() }))
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
