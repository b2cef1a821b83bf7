use crate::session::SearchMode;
use crate::types::Coordinates;
use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

/// Fire-and-forget lead notification to the fixed operator address.
/// Failures are logged and never surfaced to the user.
pub struct LeadNotifier {
    from: String,
    to: String,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl LeadNotifier {
    pub fn new(host: &str, port: u16, user: &str, pass: &str, from: &str, to: &str) -> Self {
        let transport = if !host.is_empty() && !user.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()
                .map(|builder| {
                    builder
                        .port(port)
                        .credentials(Credentials::new(user.to_string(), pass.to_string()))
                        .build()
                })
        } else {
            None
        };

        Self {
            from: from.to_string(),
            to: to.to_string(),
            transport,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some() && !self.from.is_empty() && !self.to.is_empty()
    }

    /// One notification per executed search: who searched, what, and where.
    pub async fn notify_lead(
        &self,
        user_email: &str,
        mode: SearchMode,
        detail: &str,
        radius_km: f64,
        center: Coordinates,
    ) -> Result<()> {
        let Some(transport) = self.transport.as_ref() else {
            info!("Email not configured, skipping lead notification");
            return Ok(());
        };
        if self.from.is_empty() || self.to.is_empty() {
            info!("Lead addresses not configured, skipping notification");
            return Ok(());
        }

        let subject = format!("New radar lead: {mode}");
        let body = format!(
            "A new user ran a market audit.\n\n\
             User: {user_email}\n\
             Search: {mode}\n\
             Detail: {detail}\n\
             Location: {center}\n\
             Radius: {radius_km} km\n",
        );

        let message = Message::builder()
            .from(self.from.parse().context("Parse from address")?)
            .to(self.to.parse().context("Parse to address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Build lead email")?;

        match transport.send(message).await {
            Ok(_) => {
                info!("Lead notification sent -> {}", self.to);
                Ok(())
            }
            Err(e) => {
                error!("Lead notification failed: {e}");
                Err(e.into())
            }
        }
    }
}
