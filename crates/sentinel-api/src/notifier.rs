//! Outbound email notifications.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP not configured")]
    NotConfigured,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    InvalidAttachment(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Authentication failed")]
    Authentication,

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// An email to deliver.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub subject: String,
    pub to_email: String,
    pub html_body: Option<String>,
    /// Recorded clip as a `data:` URL
    pub video_attachment: Option<String>,
}

/// Delivers notification emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> NotifyResult<()>;
}

/// SMTP settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub use_tls: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from_email", &self.from_email)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl SmtpConfig {
    /// Read SMTP settings; `None` when credentials or sender are missing.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty());
        let password = std::env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty());
        let from_email = std::env::var("SMTP_FROM_EMAIL").ok().filter(|v| !v.is_empty());

        match (username, password, from_email) {
            (Some(username), Some(password), Some(from_email)) => Some(Self {
                host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                username,
                password,
                from_email,
                use_tls: std::env::var("SMTP_USE_TLS")
                    .map(|v| v == "1")
                    .unwrap_or(true),
            }),
            _ => {
                warn!("SMTP credentials not configured");
                None
            }
        }
    }
}

/// [`Notifier`] over an SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = config
            .from_email
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(config.from_email.clone()))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: EmailMessage) -> NotifyResult<()> {
        let email = build_email(&self.from, &message)?;

        self.transport.send(email).await.map_err(|e| {
            if e.status().map(|code| code.to_string() == "535").unwrap_or(false) {
                warn!("SMTP authentication failed");
                NotifyError::Authentication
            } else {
                warn!(error = %e, "SMTP error");
                NotifyError::Smtp(e.to_string())
            }
        })?;

        info!(to = %message.to_email, "Email sent successfully");
        Ok(())
    }
}

/// Assemble the MIME message.
pub fn build_email(from: &Mailbox, message: &EmailMessage) -> NotifyResult<Message> {
    let to: Mailbox = message
        .to_email
        .parse()
        .map_err(|_| NotifyError::InvalidAddress(message.to_email.clone()))?;

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(
        message.html_body.clone().unwrap_or_default(),
    ));

    if let Some(data_url) = &message.video_attachment {
        let clip = decode_video_attachment(data_url)?;
        let content_type = ContentType::parse(clip.content_type)
            .map_err(|e| NotifyError::Build(e.to_string()))?;
        body = body.singlepart(Attachment::new(clip.filename.to_string()).body(clip.data, content_type));
    }

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .multipart(body)
        .map_err(|e| NotifyError::Build(e.to_string()))
}

/// A decoded `data:` URL video clip.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoClip {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// Decode a `data:video/...;base64,...` URL.
pub fn decode_video_attachment(data_url: &str) -> NotifyResult<VideoClip> {
    if !data_url.starts_with("data:") {
        return Err(NotifyError::InvalidAttachment(
            "Only data URLs are supported for video attachments".to_string(),
        ));
    }
    let Some((header, encoded)) = data_url.split_once("base64,") else {
        return Err(NotifyError::InvalidAttachment(
            "Invalid data URL format".to_string(),
        ));
    };

    let (filename, content_type) = if header.contains("video/mp4") {
        ("detection_video.mp4", "video/mp4")
    } else {
        ("detection_video.webm", "video/webm")
    };

    let data = STANDARD.decode(encoded.trim()).map_err(|e| {
        NotifyError::InvalidAttachment(format!("Failed to attach video: {}", e))
    })?;

    Ok(VideoClip {
        filename,
        content_type,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            subject: "Sentinel alert".to_string(),
            to_email: "owner@example.com".to_string(),
            html_body: Some("<p>A cat was seen</p>".to_string()),
            video_attachment: None,
        }
    }

    #[test]
    fn test_decode_mp4_attachment() {
        let clip = decode_video_attachment("data:video/mp4;base64,AAEC").unwrap();
        assert_eq!(clip.filename, "detection_video.mp4");
        assert_eq!(clip.data, vec![0, 1, 2]);
    }

    #[test]
    fn test_other_videos_are_webm() {
        let clip = decode_video_attachment("data:video/webm;codecs=vp9;base64,AAEC").unwrap();
        assert_eq!(clip.content_type, "video/webm");
    }

    #[test]
    fn test_rejects_non_data_urls() {
        let err = decode_video_attachment("https://example.com/clip.mp4").unwrap_err();
        assert_eq!(err.to_string(), "Only data URLs are supported for video attachments");

        let err = decode_video_attachment("data:video/mp4,raw").unwrap_err();
        assert_eq!(err.to_string(), "Invalid data URL format");
    }

    #[test]
    fn test_build_email_with_attachment() {
        let from: Mailbox = "sentinel@example.com".parse().unwrap();
        let mut msg = message();
        msg.video_attachment = Some("data:video/mp4;base64,AAEC".to_string());

        let email = build_email(&from, &msg).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Sentinel alert"));
        assert!(raw.contains("detection_video.mp4"));
    }

    #[test]
    fn test_build_email_rejects_bad_recipient() {
        let from: Mailbox = "sentinel@example.com".parse().unwrap();
        let mut msg = message();
        msg.to_email = "not an address".to_string();
        assert!(matches!(
            build_email(&from, &msg),
            Err(NotifyError::InvalidAddress(_))
        ));
    }
}
