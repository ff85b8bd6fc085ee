/// Outgoing mail
///
/// Notices go through the [`Mailer`] trait; [`SmtpMailer`] implements it
/// over a pooled STARTTLS relay. Only task assignments and team invitations
/// are mailed; every other notification stays in-app.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use planboard_shared::models::notification::{Notification, NotificationKind};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid mailbox {0:?}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a plain-text message to one recipient
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&config.from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);

        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::Address(address.to_string()))
}

/// Subject and body for the notification kinds worth an email
pub fn compose(notification: &Notification) -> Option<(String, String)> {
    match notification.kind {
        NotificationKind::TaskAssigned | NotificationKind::TeamInvitation => {}
        _ => return None,
    }

    let mut body = notification.message.clone();
    if let Some(link) = &notification.link {
        body.push_str("\n\n");
        body.push_str(link);
    }

    Some((format!("[Planboard] {}", notification.title), body))
}

/// Mails `notification` to `to` when its kind is mailable
///
/// Returns whether a message was sent.
pub async fn send_notification(
    mailer: &dyn Mailer,
    to: &str,
    notification: &Notification,
) -> Result<bool, MailError> {
    let Some((subject, body)) = compose(notification) else {
        return Ok(false);
    };

    mailer.send(to, &subject, &body).await?;
    Ok(true)
}
