use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use log::{debug, error, info, warn};
use std::{future::Future, sync::Arc};

use crate::config::SmtpSettings;
use crate::error::Error;
use crate::model::Outcome;

/// A target flipped between up and down; carries the new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub domain: String,
    pub up: bool,
}

impl Alert {
    pub fn state(&self) -> &'static str {
        if self.up { "UP" } else { "DOWN" }
    }

    pub fn subject(&self) -> String {
        format!("[downwatch alert] {} is {}!", self.domain, self.state())
    }

    pub fn body(&self) -> String {
        if self.up {
            format!(
                "The website {} is responding correctly again. =)\r\n",
                self.domain
            )
        } else {
            format!(
                "The website {} appears to be down. We will let you know when it is up again.\r\n",
                self.domain
            )
        }
    }
}

/// Compares a fresh outcome with the one it replaced.
///
/// A first observation is a baseline and never alerts.
pub fn transition(previous: Option<&Outcome>, outcome: &Outcome) -> Option<Alert> {
    match previous {
        Some(prev) if prev.ok != outcome.ok => Some(Alert {
            domain: outcome.domain.clone(),
            up: outcome.ok,
        }),
        _ => None,
    }
}

/// Delivers alerts to a human.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, alert: &Alert) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Sends alerts over SMTP with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, Error> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port);
        if !settings.login.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.login.clone(),
                settings.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: settings.from.parse()?,
            to: settings.to.parse()?,
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, alert: &Alert) -> Result<(), Error> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when SMTP is not configured: alerts only reach the log.
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, alert: &Alert) -> Result<(), Error> {
        warn!("{} (no SMTP configured, email not sent)", alert.subject());
        Ok(())
    }
}

/// Sends `alert` on its own task; failures are logged and not retried.
pub fn dispatch<M: Mailer>(mailer: &Arc<M>, alert: Alert) {
    let mailer = Arc::clone(mailer);
    tokio::spawn(async move {
        debug!("sending alert for {}", alert.domain);
        match mailer.send(&alert).await {
            Ok(()) => info!("alert sent: {}", alert.subject()),
            Err(e) => error!("Failed to send alert for {}: {e}", alert.domain),
        }
    });
}
