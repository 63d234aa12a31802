//! JSON API handlers
//!
//! Thin wrappers: authenticate, parse the request, call a service,
//! shape the response. Anything interesting lives in `services/`.

use hyper::{Body, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::json_response;
use crate::adapters::smtp::{SmtpSender, SmtpVerifier};
use crate::sanitize;
use crate::services::{auth, compose, mailbox, tracking};
use crate::state::{AppState, AuthSession};
use crate::types::error::{MailtraceError, Result};
use crate::types::{
    GenerateTrackingRequest, LoginRequest, MailboxActionRequest, SendRequest, SendResponse,
    TrackedActionRequest,
};

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T> {
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| MailtraceError::InvalidInput(format!("invalid request body: {}", e)))
}

fn bearer_session(state: &AppState, req: &Request<Body>) -> Result<AuthSession> {
    let token = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| MailtraceError::Authentication("Not authenticated".to_string()))?;

    state
        .sessions
        .get(token)
        .ok_or_else(|| MailtraceError::Authentication("Session expired, log in again".to_string()))
}

fn query_param(req: &Request<Body>, key: &str) -> Option<String> {
    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) if k == key => Some(v.to_string()),
                _ => None,
            }
        })
    })
}

pub async fn login(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let request: LoginRequest = read_json(req).await?;

    let verifier = SmtpVerifier::new(&state.config.mail.smtp_host, state.config.mail.smtp_port);
    let user = auth::login(&state.pool, &verifier, &request.email, &request.password).await?;

    let token = state.sessions.issue(AuthSession {
        user_id: user.id.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        secret: request.password,
    });

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "token": token,
            "user": {
                "id": user.id,
                "email": user.email,
                "displayName": user.display_name,
            },
        }),
    ))
}

pub async fn list_inbox(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;

    let folder = query_param(&req, "folder").unwrap_or_else(|| "INBOX".to_string());
    let limit = query_param(&req, "limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20)
        .clamp(1, state.config.mail.max_page_size);
    let page = query_param(&req, "page")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);

    let mut result = mailbox::list_page(
        &state.config.mail,
        &session.email,
        &session.secret,
        &folder,
        limit,
        page,
    )
    .await?;

    // Bodies are neutralized server-side; the UI renders them as-is.
    for message in &mut result.messages {
        message.body = if sanitize::is_html_content(&message.body) {
            sanitize::sanitize_html(&message.body)
        } else {
            sanitize::plain_text_to_html(&message.body)
        };
    }

    let total_pages = (result.total as usize + limit - 1) / limit;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "emails": result.messages,
            "folder": folder,
            "total": result.total,
            "page": page,
            "limit": limit,
            "totalPages": total_pages,
        }),
    ))
}

pub async fn inbox_action(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;
    let request: MailboxActionRequest = read_json(req).await?;

    let sequence_id: u32 = request.email_id.parse().map_err(|_| {
        MailtraceError::InvalidInput(format!("invalid email id: {}", request.email_id))
    })?;

    let read = match request.action.as_str() {
        "mark_read" => true,
        "mark_unread" => false,
        other => {
            return Err(MailtraceError::InvalidInput(format!(
                "invalid action: {}",
                other
            )))
        }
    };

    let folder = request.folder.unwrap_or_else(|| "INBOX".to_string());
    mailbox::set_read_state(
        &state.config.mail,
        &session.email,
        &session.secret,
        &folder,
        sequence_id,
        read,
    )
    .await?;

    Ok(json_response(StatusCode::OK, &json!({ "success": true })))
}

pub async fn send(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;
    let request: SendRequest = read_json(req).await?;

    let sender = SmtpSender::new(
        &state.config.mail.smtp_host,
        state.config.mail.smtp_port,
        &session.email,
        &session.secret,
    );

    let user = crate::adapters::sqlite::users::find_by_id(&state.pool, &session.user_id)?
        .ok_or(MailtraceError::NotFound)?;

    let outcome = compose::send_message(
        &state.pool,
        &state.config.server.base_url,
        &sender,
        &user,
        &request,
    )
    .await?;

    Ok(json_response(
        StatusCode::OK,
        &SendResponse {
            success: true,
            message_id: outcome.message_id,
            tracking_id: outcome.tracking_id,
            message: "Email sent successfully".to_string(),
        },
    ))
}

pub async fn tracked_overview(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;

    let emails = tracking::list_tracked(&state.pool, &session.user_id)?;
    let statistics = tracking::statistics(&state.pool, &session.user_id)?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "emails": emails,
            "statistics": statistics,
        }),
    ))
}

pub async fn tracked_action(state: &AppState, req: Request<Body>) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;
    let request: TrackedActionRequest = read_json(req).await?;

    if request.action != "reset_opens" {
        return Err(MailtraceError::InvalidInput(format!(
            "invalid action: {}",
            request.action
        )));
    }

    let reset = tracking::reset_opens(&state.pool, &request.email_id, &session.user_id)?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "resetOpens": reset }),
    ))
}

pub async fn generate_tracking_url(
    state: &AppState,
    req: Request<Body>,
) -> Result<Response<Body>> {
    let session = bearer_session(state, &req)?;
    let request: GenerateTrackingRequest = read_json(req).await?;

    if request.recipient_email.trim().is_empty() {
        return Err(MailtraceError::InvalidInput(
            "Recipient email is required".to_string(),
        ));
    }

    let tracked = tracking::create_tracked_email(
        &state.pool,
        &session.user_id,
        &request.recipient_email,
        request.subject.as_deref().unwrap_or(""),
        request.content.as_deref().unwrap_or(""),
    )?;

    let tracking_url = compose::tracking_url(&state.config.server.base_url, &tracked.tracking_id);

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "trackingId": tracked.tracking_id,
            "trackingUrl": tracking_url,
            "emailId": tracked.id,
        }),
    ))
}
