use anyhow::{anyhow, Context};

const DEFAULT_PORT: u16 = 8000;

/// Settings read once at startup. The SMTP and reCAPTCHA endpoint URLs are
/// deliberately not here: they are read at first use so tests can redirect
/// them to local fakes.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub recaptcha_secret: String,
    pub mail_domain: String,
    pub admin_email: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self {
            port,
            recaptcha_secret: required("RECAPTCHA_SECRET_KEY")?,
            mail_domain: required("MAIL_DOMAIN")?,
            admin_email: required("ADMIN_EMAIL")?,
        })
    }
}

fn required(key: &'static str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow!("Missing required environment variable {key}"))
}
