//! Slack webhook route
//!
//! One endpoint receives everything Slack sends: Events API URL verification
//! and callbacks as JSON, slash commands as form data. Verification failures
//! end the request before any workflow runs.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use slack::logic::verification::{
    SIGNATURE_HEADER, TIMESTAMP_HEADER, verify_signature, verify_token,
};
use slack::logic::{WebhookAction, classify, decode_webhook_body};
use slack::types::{SlackEvent, SlackWebhookRequest};
use tracing::{debug, error, trace, warn};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::logic::command::{BOX_ADD_COMMAND, handle_box_add};
use crate::logic::group_sync::{ChannelEvent, handle_channel_event};
use crate::service::RelayService;

pub const SERVICE_ROUTE_KEY: &str = "slack";

/// Response for Slack URL verification challenge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UrlVerificationResponse {
    pub challenge: String,
}

pub fn create_router() -> OpenApiRouter<Arc<RelayService>> {
    OpenApiRouter::new().routes(routes!(route_slack_webhook))
}

/// POST / - Slack webhook endpoint
#[utoipa::path(
    post,
    path = "/",
    tags = [SERVICE_ROUTE_KEY],
    request_body(content(
        (SlackWebhookRequest = "application/json"),
        (SlackWebhookRequest = "application/x-www-form-urlencoded")
    )),
    responses(
        (status = 200, description = "Challenge echo for URL verification, empty for event \
                                      callbacks, plain text reply for slash commands",
         body = UrlVerificationResponse),
        (status = 400, description = "Bad verification token, undecodable body or \
                                      unrecognized request", body = CommonError),
        (status = 401, description = "Bad request signature", body = CommonError),
    ),
    summary = "Slack webhook endpoint",
    description = "Receives Slack Events API callbacks and /boxadd slash commands. Membership \
                   events keep the channel's Box group in sync; /boxadd shares a Box item \
                   with it.",
    operation_id = "slack-webhook",
)]
pub async fn route_slack_webhook(
    State(service): State<Arc<RelayService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    trace!(bytes = body.len(), "Received Slack webhook");

    if let Some(secret) = service.slack.signing_secret.as_deref() {
        if let Err(e) = verify_signature(
            secret,
            header_str(&headers, TIMESTAMP_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
            Utc::now().timestamp(),
        ) {
            warn!(error = %e, "Rejecting webhook with invalid signature");
            return CommonError::Authentication {
                msg: e.to_string(),
                source: None,
            }
            .into_response();
        }
    }

    let request = match decode_webhook_body(header_str(&headers, CONTENT_TYPE.as_str()), &body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting undecodable webhook body");
            return e.into_response();
        }
    };

    if !verify_token(&service.slack.verification_token, request.token.as_deref()) {
        warn!("Rejecting webhook with invalid verification token");
        return CommonError::InvalidRequest {
            msg: "verification token does not match".to_string(),
            source: None,
        }
        .into_response();
    }

    match classify(request, BOX_ADD_COMMAND) {
        WebhookAction::UrlVerification { challenge } => {
            trace!("Responding to Slack URL verification challenge");
            Json(UrlVerificationResponse { challenge }).into_response()
        }
        WebhookAction::EventCallback(event) => {
            handle_event_callback(&service, event).await;
            StatusCode::OK.into_response()
        }
        WebhookAction::SlashCommand(command) => {
            trace!(channel_id = %command.channel_id, "Processing /boxadd");
            let reply =
                handle_box_add(service.chat.as_ref(), service.storage.as_ref(), &command).await;
            (StatusCode::OK, reply.text()).into_response()
        }
        WebhookAction::Unrecognized => {
            debug!("Unrecognized webhook request");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Run the group sync for an event. Failures are logged only: Slack retries
/// anything that is not a 200.
async fn handle_event_callback(service: &RelayService, event: SlackEvent) {
    let (Some(channel_id), Some(user_id)) = (event.channel_id(), event.user_id()) else {
        debug!(event_type = %event.event_type, "Ignoring event without channel or user");
        return;
    };
    trace!(
        event_type = %event.event_type,
        channel_id = %channel_id,
        user_id = %user_id,
        "Processing Slack event callback"
    );

    let actor = match service.chat.get_user(user_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            warn!(user_id = %user_id, "Event user not found in Slack");
            return;
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to resolve event user");
            return;
        }
    };

    let channel_event = ChannelEvent {
        kind: event.kind(),
        channel_id: channel_id.to_string(),
        actor,
    };

    match handle_channel_event(
        service.chat.as_ref(),
        service.storage.as_ref(),
        &channel_event,
        service.roster_concurrency,
    )
    .await
    {
        Ok(outcome) => debug!(outcome = ?outcome, "Channel event handled"),
        Err(e) => error!(
            channel_id = %channel_event.channel_id,
            error = %e,
            "Failed to sync channel event"
        ),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
