//! Decoding and classification of webhook request bodies

use serde_json::{Map, Value};
use shared::error::CommonError;
use tracing::trace;

use crate::types::{
    EVENT_TYPE_EVENT_CALLBACK, EVENT_TYPE_URL_VERIFICATION, SlackEvent, SlackWebhookRequest,
    SlashCommand,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What a webhook request asks the relay to do
#[derive(Debug, Clone)]
pub enum WebhookAction {
    UrlVerification { challenge: String },
    EventCallback(SlackEvent),
    SlashCommand(SlashCommand),
    Unrecognized,
}

/// Decode a request body as form data when the content type says so and as
/// JSON otherwise.
pub fn decode_webhook_body(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<SlackWebhookRequest, CommonError> {
    let is_form = content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false);

    if is_form {
        trace!("Decoding form-encoded webhook body");
        let fields: Map<String, Value> = form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        serde_json::from_value(Value::Object(fields)).map_err(|e| CommonError::InvalidRequest {
            msg: format!("Malformed form body: {e}"),
            source: Some(e.into()),
        })
    } else {
        trace!("Decoding JSON webhook body");
        serde_json::from_slice(body).map_err(|e| CommonError::InvalidRequest {
            msg: format!("Malformed JSON body: {e}"),
            source: Some(e.into()),
        })
    }
}

/// Classify a decoded request. Slash commands other than `allowed_command`
/// are unrecognized.
pub fn classify(request: SlackWebhookRequest, allowed_command: &str) -> WebhookAction {
    match request.kind.as_deref() {
        Some(EVENT_TYPE_URL_VERIFICATION) => {
            return match request.challenge {
                Some(challenge) => WebhookAction::UrlVerification { challenge },
                None => WebhookAction::Unrecognized,
            };
        }
        Some(EVENT_TYPE_EVENT_CALLBACK) => {
            return match request.event {
                Some(event) => WebhookAction::EventCallback(event),
                None => WebhookAction::Unrecognized,
            };
        }
        _ => {}
    }

    match request.command {
        Some(command) if command == allowed_command => {
            match (request.channel_id, request.user_id) {
                (Some(channel_id), Some(user_id)) => WebhookAction::SlashCommand(SlashCommand {
                    command,
                    channel_id,
                    user_id,
                    text: request.text.unwrap_or_default(),
                }),
                _ => WebhookAction::Unrecognized,
            }
        }
        _ => WebhookAction::Unrecognized,
    }
}
