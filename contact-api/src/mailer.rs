use async_once_cell::OnceCell;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::borrow::Cow;

const DEFAULT_SMTP_URL: &str = "smtps://smtp.mailgun.org";

/// Mail dispatch over SMTP. The transport is established lazily on the first
/// send and reused afterwards.
pub struct Mailer {
    from: Mailbox,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    pub fn new(mail_domain: &str) -> Result<Self, MailError> {
        let from_address = format!("Portfolio contact <noreply@{mail_domain}>");
        let from = from_address
            .parse()
            .map_err(|_| MailError::BadAddress(from_address))?;
        Ok(Self {
            from,
            transport: Default::default(),
        })
    }

    /// Best-effort, at-most-one-round-trip delivery of a message with a
    /// plain-text part and an HTML alternative. No retry; the caller decides
    /// what a failure means.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<(), MailError> {
        let to_mailbox: Mailbox = to.parse().map_err(|_| MailError::BadAddress(to.into()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))
            .map_err(|error| MailError::Compose(error.to_string()))?;
        let transport = self
            .transport
            .get_or_try_init(Self::initialise_transport())
            .await?;
        transport
            .send(message)
            .await
            .map_err(|error| MailError::Send(error.to_string()))?;
        Ok(())
    }

    async fn initialise_transport() -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let smtp_url = Self::smtp_url();
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&smtp_url)
            .map_err(|error| MailError::Connect(error.to_string()))?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only attached when the URL is TLS-protected; a
        // plain smtp:// URL connects unauthenticated.
        if smtp_url.starts_with("smtps://") {
            let username = std::env::var("SMTP_USERNAME")
                .map_err(|_| MailError::Connect("SMTP_USERNAME is not set".into()))?;
            let password = std::env::var("SMTP_PASSWORD")
                .map_err(|_| MailError::Connect("SMTP_PASSWORD is not set".into()))?;
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(builder.build())
    }

    fn smtp_url() -> Cow<'static, str> {
        std::env::var("SMTP_URL")
            .map(Cow::Owned)
            .unwrap_or(DEFAULT_SMTP_URL.into())
    }
}

#[derive(Debug)]
pub enum MailError {
    BadAddress(String),
    Compose(String),
    Connect(String),
    Send(String),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::BadAddress(address) => write!(f, "Invalid mail address {address}"),
            MailError::Compose(description) => write!(f, "Error building message: {description}"),
            MailError::Connect(description) => {
                write!(f, "Unable to connect to SMTP server: {description}")
            }
            MailError::Send(description) => write!(f, "Error sending message: {description}"),
        }
    }
}

impl std::error::Error for MailError {}
