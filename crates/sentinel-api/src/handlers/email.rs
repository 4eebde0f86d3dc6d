//! Email notifications.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::metrics;
use crate::notifier::{EmailMessage, NotifyError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub subject: String,
    #[serde(default)]
    pub html_body: Option<String>,
    pub to_email: String,
    #[serde(default)]
    pub video_attachment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailResponse {
    fn sent() -> Self {
        Self {
            success: true,
            message: Some("Email sent successfully".to_string()),
            error: None,
        }
    }

    fn failed(err: &NotifyError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(err.to_string()),
        }
    }
}

/// Send a notification email. Failures are reported in the body.
pub async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Json<EmailResponse> {
    let Some(notifier) = state.notifier.as_ref() else {
        return Json(EmailResponse::failed(&NotifyError::NotConfigured));
    };

    let message = EmailMessage {
        subject: request.subject,
        to_email: request.to_email,
        html_body: request.html_body,
        video_attachment: request.video_attachment.filter(|v| !v.is_empty()),
    };

    let response = match notifier.send(message).await {
        Ok(()) => EmailResponse::sent(),
        Err(e) => EmailResponse::failed(&e),
    };
    metrics::record_email(response.success);
    Json(response)
}
