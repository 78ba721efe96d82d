//! # soon-mail-smtp
//!
//! SMTP implementation of `MailTransport` on top of async lettre.
//! Port 465 uses implicit TLS, anything else STARTTLS.

use anyhow::{bail, Context};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use soon_core::models::OutgoingMail;
use soon_core::traits::MailTransport;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn new(host: &str, port: u16, username: &str, password: &SecretString) -> anyhow::Result<Self> {
        let builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .with_context(|| format!("SMTP relay {host}"))?
        .port(port);

        let builder = if username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                username.to_string(),
                password.expose_secret().to_string(),
            ))
        };

        Ok(Self { mailer: builder.build() })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        let message = build_message(mail)?;
        let count = message.envelope().to().len();
        self.mailer.send(message).await.context("SMTP send")?;
        log::info!("📤 reminder '{}' sent to {count} recipient(s)", mail.subject);
        Ok(())
    }
}

/// Builds a plain-text message with every recipient on Bcc.
///
/// lettre strips Bcc from the formatted message after deriving the envelope,
/// so recipients never see each other. Unparsable addresses are skipped.
pub fn build_message(mail: &OutgoingMail) -> anyhow::Result<Message> {
    let from: Mailbox = mail
        .from
        .parse()
        .with_context(|| format!("invalid sender {:?}", mail.from))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    let mut valid = 0;
    for recipient in &mail.recipients {
        match recipient.parse::<Mailbox>() {
            Ok(mailbox) => {
                builder = builder.bcc(mailbox);
                valid += 1;
            }
            Err(err) => log::warn!("skipping recipient {recipient:?}: {err}"),
        }
    }
    if valid == 0 {
        bail!("no deliverable recipients");
    }

    builder.body(mail.body.clone()).context("building message")
}
