use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

pub type DynMailer = Arc<dyn Mailer + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer {
    /// Greets a freshly registered user.
    async fn send_welcome(&self, to: &str) -> anyhow::Result<()>;
}

/// Picks the relay if one is configured, otherwise mail is only logged.
pub fn from_config(config: &Config) -> DynMailer {
    match &config.mail_webhook_url {
        Some(url) => Arc::new(WebhookMailer::new(url.clone(), config.mail_from.clone())),
        None => {
            log::warn!("MAIL_WEBHOOK_URL is not set; outgoing mail will only be logged");
            Arc::new(LogMailer {
                from: config.mail_from.clone(),
            })
        }
    }
}

#[derive(serde::Serialize, Debug, PartialEq, Eq)]
struct Message<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

fn welcome<'a>(from: &'a str, to: &'a str) -> Message<'a> {
    Message {
        from,
        to,
        subject: "Welcome!",
        text: "Thanks for signing up. Your account is ready; log in to start posting.",
    }
}

/// Hands messages to an HTTP mail relay as JSON.
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl WebhookMailer {
    pub fn new(url: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            from,
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send_welcome(&self, to: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&welcome(&self.from, to))
            .send()
            .await
            .context("failed to reach mail relay")?
            .error_for_status()
            .context("mail relay rejected message")?;

        log::info!("sent welcome mail to {}", to);

        Ok(())
    }
}

/// Development stand-in that writes the message to the log instead of sending it.
pub struct LogMailer {
    from: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, to: &str) -> anyhow::Result<()> {
        let message = welcome(&self.from, to);
        log::info!(
            "mail from {} to {}: {}: {}",
            message.from,
            message.to,
            message.subject,
            message.text
        );
        Ok(())
    }
}
