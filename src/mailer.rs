use std::future::Future;

use reqwest::Client;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("missing mail credentials")]
    MissingCredentials,

    #[error("no recipients resolved")]
    MissingRecipients,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        SendError::Transport(err.to_string())
    }
}

/// Delivers one plain-text message. Callers get every failure back as a value.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, subject: &str, body: &str) -> impl Future<Output = Result<(), SendError>> + Send;
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject_prefix: String,
}

impl MailConfig {
    /// Configured recipients, falling back to the sender.
    pub fn recipients(&self) -> Vec<String> {
        let base: Vec<String> = if self.to.is_empty() {
            self.from.iter().cloned().collect()
        } else {
            self.to.clone()
        };
        base.into_iter().filter(|r| !r.trim().is_empty()).collect()
    }

    pub fn full_subject(&self, subject: &str) -> String {
        format!("{} {}", self.subject_prefix, subject).trim().to_string()
    }
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    sender: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

/// Sends through a transactional-mail HTTP API (Brevo-compatible payload).
pub struct HttpMailer {
    config: MailConfig,
    client: Client,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), SendError> {
        let (Some(api_key), Some(from)) = (self.config.api_key.as_deref(), self.config.from.as_deref()) else {
            return Err(SendError::MissingCredentials);
        };
        let recipients = self.config.recipients();
        if recipients.is_empty() {
            return Err(SendError::MissingRecipients);
        }

        let full_subject = self.config.full_subject(subject);
        let payload = Payload {
            sender: Address { email: from },
            to: recipients.iter().map(|email| Address { email: email.as_str() }).collect(),
            subject: &full_subject,
            text_content: body,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            info!(subject = %full_subject, recipients = recipients.len(), "Sent email");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_else(|_| "(no body)".to_string());
            Err(SendError::Transport(format!("mail API error: {} - {}", status, text)))
        }
    }
}

/// Logs the would-be message instead of delivering it.
pub struct DryRunMailer {
    config: MailConfig,
}

impl DryRunMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

impl Mailer for DryRunMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), SendError> {
        let recipients = self.config.recipients();
        if recipients.is_empty() {
            return Err(SendError::MissingRecipients);
        }
        info!(
            subject = %self.config.full_subject(subject),
            to = %recipients.join(", "),
            body,
            "Dry run, email not sent"
        );
        Ok(())
    }
}

/// The mailer chosen at startup.
pub enum ConfiguredMailer {
    Http(HttpMailer),
    DryRun(DryRunMailer),
}

impl ConfiguredMailer {
    pub fn from_config(config: MailConfig, dry_run: bool) -> Self {
        if dry_run {
            ConfiguredMailer::DryRun(DryRunMailer::new(config))
        } else {
            ConfiguredMailer::Http(HttpMailer::new(config))
        }
    }
}

impl Mailer for ConfiguredMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), SendError> {
        match self {
            ConfiguredMailer::Http(mailer) => mailer.send(subject, body).await,
            ConfiguredMailer::DryRun(mailer) => mailer.send(subject, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailConfig {
        MailConfig {
            api_url: "http://127.0.0.1:9/unused".into(),
            api_key: None,
            from: Some("me@example.com".into()),
            to: Vec::new(),
            subject_prefix: "[NJ MVC]".into(),
        }
    }

    #[test]
    fn recipients_fall_back_to_sender() {
        assert_eq!(config().recipients(), ["me@example.com"]);

        let cfg = MailConfig {
            to: vec!["a@example.com".into(), "b@example.com".into()],
            ..config()
        };
        assert_eq!(cfg.recipients(), ["a@example.com", "b@example.com"]);

        let cfg = MailConfig { from: None, ..config() };
        assert!(cfg.recipients().is_empty());
    }

    #[test]
    fn subject_gets_prefix() {
        assert_eq!(config().full_subject("Earlier Appointment Found"), "[NJ MVC] Earlier Appointment Found");
        let cfg = MailConfig { subject_prefix: String::new(), ..config() };
        assert_eq!(cfg.full_subject("Hi"), "Hi");
    }

    #[tokio::test]
    async fn http_mailer_requires_credentials() {
        let mailer = HttpMailer::new(config());
        assert_eq!(mailer.send("s", "b").await, Err(SendError::MissingCredentials));
    }

    #[tokio::test]
    async fn http_mailer_requires_recipients() {
        let mailer = HttpMailer::new(MailConfig {
            api_key: Some("key".into()),
            from: Some(String::new()),
            ..config()
        });
        assert_eq!(mailer.send("s", "b").await, Err(SendError::MissingRecipients));
    }

    #[tokio::test]
    async fn dry_run_succeeds_without_network() {
        let mailer = ConfiguredMailer::from_config(config(), true);
        assert_eq!(mailer.send("s", "b").await, Ok(()));
    }
}
