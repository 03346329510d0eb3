use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Alert, AlertChannel};
use crate::error::{DispatchError, SmtpError};
use crate::settings::{Settings, SmtpConfig};

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);
const IMPLICIT_TLS_PORT: u16 = 465;

/// Reply codes servers use for rejected or missing credentials.
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// Sends alerts to `settings.user_email` through the configured relay.
pub struct EmailChannel;

#[async_trait::async_trait]
impl AlertChannel for EmailChannel {
    async fn deliver(&self, alert: &Alert, settings: &Settings) -> Result<(), DispatchError> {
        let to = settings.user_email.trim();
        if to.is_empty() {
            return Err(DispatchError::NoRecipient);
        }
        send(&settings.smtp, to, &alert.subject(), alert.body()).await?;
        tracing::info!(target_id = %alert.target_id, to, "Alert email sent");
        Ok(())
    }
}

/// Connect and authenticate, then hang up.
pub async fn test_smtp(config: &SmtpConfig) -> Result<(), SmtpError> {
    let transport = transport(config)?;
    match transport.test_connection().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(SmtpError::Connection(format!(
            "{}:{} did not accept the connection",
            config.host, config.port
        ))),
        Err(e) => Err(classify(e)),
    }
}

/// Send a real message to `to`, confirming delivery end to end.
pub async fn send_test_email(config: &SmtpConfig, to: &str) -> Result<(), SmtpError> {
    let body = format!(
        "This is a test message from vigil.\n\nSMTP relay {}:{} is configured correctly.\n",
        config.host, config.port
    );
    send(config, to, "[vigil] Test email", body).await
}

async fn send(config: &SmtpConfig, to: &str, subject: &str, body: String) -> Result<(), SmtpError> {
    let from: Mailbox = config
        .sender()
        .parse()
        .map_err(|e| SmtpError::InvalidConfig(format!("invalid sender address: {e}")))?;
    let to: Mailbox = to
        .trim()
        .parse()
        .map_err(|e| SmtpError::InvalidConfig(format!("invalid recipient address: {e}")))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| SmtpError::InvalidConfig(e.to_string()))?;

    transport(config)?.send(message).await.map_err(classify)?;
    Ok(())
}

fn transport(config: &SmtpConfig) -> Result<Transport, SmtpError> {
    config.validate()?;
    let host = config.host.trim();

    let builder = if !config.use_tls {
        Transport::builder_dangerous(host)
    } else if config.port == IMPLICIT_TLS_PORT {
        Transport::relay(host).map_err(|e| SmtpError::Tls(e.to_string()))?
    } else {
        Transport::starttls_relay(host).map_err(|e| SmtpError::Tls(e.to_string()))?
    };

    let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
    let username = config.username.trim();
    if !username.is_empty() {
        builder = builder.credentials(Credentials::new(username.to_string(), config.clean_password()));
    }
    Ok(builder.build())
}

fn classify(e: lettre::transport::smtp::Error) -> SmtpError {
    let message = e.to_string();
    if let Some(code) = e.status() {
        if AUTH_FAILURE_CODES.contains(&code.to_string().as_str()) {
            return SmtpError::Auth(message);
        }
    }
    if e.is_tls() {
        SmtpError::Tls(message)
    } else if e.is_permanent() || e.is_transient() {
        SmtpError::Send(message)
    } else {
        SmtpError::Connection(message)
    }
}
