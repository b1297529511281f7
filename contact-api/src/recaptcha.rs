use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::warn;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Scores at or above this are treated as human.
pub const SCORE_THRESHOLD: f64 = 0.5;

pub struct RecaptchaVerifier {
    client: Client,
    secret: String,
}

#[derive(Debug, Clone)]
pub struct RecaptchaVerdict {
    pub score: f64,
    pub action: Option<String>,
    pub challenge_ts: Option<String>,
}

impl RecaptchaVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret: secret.into(),
        }
    }

    /// One round-trip to the siteverify endpoint. Any transport or decoding
    /// failure is an error: a challenge is never issued on an unverifiable
    /// token.
    pub async fn verify_token(&self, token: &str) -> Result<RecaptchaVerdict, RecaptchaError> {
        let payload = RecaptchaVerifyPayload {
            secret: &self.secret,
            response: token,
        };
        let response = self
            .client
            .post(Self::verification_url().as_ref())
            .form(&payload)
            .send()
            .await
            .map_err(|error| {
                warn!("Error reaching reCAPTCHA: {error}");
                RecaptchaError::Unreachable(error.to_string())
            })?;
        let body: RecaptchaResponse = response.json().await.map_err(|error| {
            warn!("Error decoding reCAPTCHA response: {error}");
            RecaptchaError::Unreachable(error.to_string())
        })?;
        evaluate(body)
    }

    fn verification_url() -> Cow<'static, str> {
        std::env::var("RECAPTCHA_VERIFY_URL")
            .map(Cow::Owned)
            .unwrap_or(RECAPTCHA_VERIFY_URL.into())
    }
}

fn evaluate(body: RecaptchaResponse) -> Result<RecaptchaVerdict, RecaptchaError> {
    if !body.success {
        return Err(RecaptchaError::Rejected(body.error_codes));
    }
    if body.score < SCORE_THRESHOLD {
        return Err(RecaptchaError::SuspiciousScore(body.score));
    }
    Ok(RecaptchaVerdict {
        score: body.score,
        action: body.action,
        challenge_ts: body.challenge_ts,
    })
}

#[derive(Serialize)]
struct RecaptchaVerifyPayload<'a> {
    secret: &'a str,
    response: &'a str,
}

#[derive(Deserialize)]
struct RecaptchaResponse {
    success: bool,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    challenge_ts: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[derive(Debug, PartialEq)]
pub enum RecaptchaError {
    /// The verifier answered `success: false`, with these error codes.
    Rejected(Vec<String>),
    /// The token verified but its score fell below [`SCORE_THRESHOLD`].
    SuspiciousScore(f64),
    /// The verifier could not be reached or answered unintelligibly.
    Unreachable(String),
}

impl std::fmt::Display for RecaptchaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecaptchaError::Rejected(codes) => {
                write!(f, "reCAPTCHA rejected the token: {codes:?}")
            }
            RecaptchaError::SuspiciousScore(score) => {
                write!(f, "reCAPTCHA score {score} below threshold")
            }
            RecaptchaError::Unreachable(description) => {
                write!(f, "reCAPTCHA unreachable: {description}")
            }
        }
    }
}

impl std::error::Error for RecaptchaError {}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    fn response(success: bool, score: f64) -> RecaptchaResponse {
        RecaptchaResponse {
            success,
            score,
            action: Some("contact".into()),
            challenge_ts: Some("2024-06-01T12:00:00Z".into()),
            error_codes: vec![],
        }
    }

    #[test]
    fn accepts_a_passing_score() -> Result<()> {
        let verdict = evaluate(response(true, 0.9));

        verify_that!(verdict, ok(anything()))?;
        verify_that!(verdict.unwrap().score, eq(0.9))
    }

    #[test]
    fn accepts_a_score_exactly_at_the_threshold() -> Result<()> {
        verify_that!(evaluate(response(true, 0.5)), ok(anything()))
    }

    #[test]
    fn rejects_a_score_just_below_the_threshold() -> Result<()> {
        verify_that!(
            evaluate(response(true, 0.4999)),
            err(eq(RecaptchaError::SuspiciousScore(0.4999)))
        )
    }

    #[test]
    fn surfaces_error_codes_on_verifier_failure() -> Result<()> {
        let body = RecaptchaResponse {
            error_codes: vec!["invalid-input-response".into()],
            ..response(false, 0.0)
        };

        verify_that!(
            evaluate(body),
            err(eq(RecaptchaError::Rejected(vec![
                "invalid-input-response".into()
            ])))
        )
    }

    #[test]
    fn a_missing_score_is_rejected() -> Result<()> {
        let body: RecaptchaResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();

        verify_that!(
            evaluate(body),
            err(eq(RecaptchaError::SuspiciousScore(0.0)))
        )
    }
}
