/// Outgoing email
///
/// Three messages leave the service: the verification link after sign-up, the
/// password reset link and the invitation to join a project. They are rendered
/// here as plain text and handed to a [`Mailer`].
///
/// - [`WebhookMailer`] posts each message as JSON to a mail relay
/// - [`LogMailer`] only logs (development, or no relay configured)
/// - [`MemoryMailer`] keeps messages in memory (tests)
///
/// Failures surface as [`MailError`]; callers decide whether a failed send
/// fails the request. Nothing is retried.
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::mail::{Mail, Mailer, WebhookMailer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = WebhookMailer::new(
///     reqwest::Client::new(),
///     "https://relay.internal/send",
///     "CollabTrack <no-reply@collabtrack.app>",
/// );
/// let mail = Mail::verification("ada@example.com", "https://collabtrack.app/verify-email?token=abc");
/// mailer.send(&mail).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// Rendered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub text: String,

    /// The actionable link inside `text`
    pub link: String,
}

impl Mail {
    pub fn verification(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your CollabTrack email address".to_string(),
            text: format!(
                "Welcome to CollabTrack!\n\n\
                 Confirm your email address by opening the link below:\n\n{}\n\n\
                 The link expires in 24 hours.",
                link
            ),
            link: link.to_string(),
        }
    }

    pub fn password_reset(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your CollabTrack password".to_string(),
            text: format!(
                "Someone asked to reset the password for this address.\n\n\
                 Choose a new password here:\n\n{}\n\n\
                 The link expires in 1 hour. If this wasn't you, ignore this email.",
                link
            ),
            link: link.to_string(),
        }
    }

    pub fn invitation(to: &str, project_name: &str, inviter: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("{} invited you to {} on CollabTrack", inviter, project_name),
            text: format!(
                "{} invited you to collaborate on \"{}\".\n\n\
                 Sign up with this email address, then join the project here:\n\n{}",
                inviter, project_name, link
            ),
            link: link.to_string(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

/// Posts `{from, to, subject, text}` to a relay URL
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl WebhookMailer {
    pub fn new(client: reqwest::Client, url: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let body = RelayMessage {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::debug!(to = %mail.to, subject = %mail.subject, "Mail handed to relay");
        Ok(())
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            link = %mail.link,
            "Mail relay not configured, logging message"
        );
        Ok(())
    }
}

/// Collects messages in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Mail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_link() {
        let link = "https://collabtrack.app/join/42";
        let mail = Mail::invitation("erin@example.com", "Launch", "Ada", link);

        assert_eq!(mail.to, "erin@example.com");
        assert!(mail.subject.contains("Launch"));
        assert!(mail.text.contains(link));
        assert_eq!(mail.link, link);

        let mail = Mail::verification("a@b.io", "https://x/verify-email?token=t");
        assert!(mail.text.contains("24 hours"));

        let mail = Mail::password_reset("a@b.io", "https://x/reset-password?token=t");
        assert!(mail.text.contains("1 hour"));
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer
            .send(&Mail::verification("a@b.io", "link-1"))
            .await
            .unwrap();
        mailer
            .send(&Mail::verification("a@b.io", "link-2"))
            .await
            .unwrap();

        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(mailer.last_to("a@b.io").unwrap().link, "link-2");
        assert!(mailer.last_to("c@d.io").is_none());
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send(&Mail::verification("a@b.io", "l")).await.is_ok());
    }
}
