use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::mailer::MailError;
use crate::recaptcha::RecaptchaError;

/// Every failure a handler can produce, mapped onto a status code and a JSON
/// body at the request boundary. Internal detail is logged here and never
/// leaks to the client.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    BotRejected { details: Vec<String> },
    SuspiciousScore { score: f64 },
    BotUnreachable { detail: String },
    NoChallenge,
    OtpExpired,
    AttemptsExhausted,
    InvalidOtp { attempts_left: u8 },
    EmailNotVerified,
    StoreFull,
    Delivery { client_message: &'static str, detail: String },
    Internal(String),
}

impl ApiError {
    pub fn delivery(client_message: &'static str, error: MailError) -> Self {
        ApiError::Delivery {
            client_message,
            detail: error.to_string(),
        }
    }

    fn log(&self) {
        match self {
            ApiError::BotUnreachable { detail } => {
                error!("reCAPTCHA verification unavailable: {detail}");
            }
            ApiError::Delivery { detail, .. } => {
                error!("Mail delivery failed: {detail}");
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {detail}");
            }
            other => {
                warn!("Rejected request: {other}");
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let (status, body) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::BotRejected { details } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "reCAPTCHA verification failed", "details": details }),
            ),
            ApiError::SuspiciousScore { score } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Suspicious activity detected", "score": score }),
            ),
            ApiError::BotUnreachable { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "reCAPTCHA verification failed" }),
            ),
            ApiError::NoChallenge => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "No OTP found for this email. Please request a new one." }),
            ),
            ApiError::OtpExpired => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "OTP has expired. Please request a new one." }),
            ),
            ApiError::AttemptsExhausted => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Too many attempts. Please request a new OTP." }),
            ),
            ApiError::InvalidOtp { attempts_left } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid OTP", "attemptsLeft": attempts_left }),
            ),
            ApiError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                json!({ "error": "Email has not been verified. Please request and verify an OTP first." }),
            ),
            ApiError::StoreFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Too many pending verifications. Please try again later." }),
            ),
            ApiError::Delivery { client_message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": client_message }))
            }
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RecaptchaError> for ApiError {
    fn from(error: RecaptchaError) -> Self {
        match error {
            RecaptchaError::Rejected(details) => ApiError::BotRejected { details },
            RecaptchaError::SuspiciousScore(score) => ApiError::SuspiciousScore { score },
            RecaptchaError::Unreachable(detail) => ApiError::BotUnreachable { detail },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(message) => write!(f, "Validation error: {message}"),
            ApiError::BotRejected { details } => {
                write!(f, "Bot verification rejected: {details:?}")
            }
            ApiError::SuspiciousScore { score } => {
                write!(f, "Bot verification score too low: {score}")
            }
            ApiError::BotUnreachable { detail } => {
                write!(f, "Bot verification unavailable: {detail}")
            }
            ApiError::NoChallenge => write!(f, "No pending OTP challenge"),
            ApiError::OtpExpired => write!(f, "OTP challenge expired"),
            ApiError::AttemptsExhausted => write!(f, "OTP attempt budget exhausted"),
            ApiError::InvalidOtp { attempts_left } => {
                write!(f, "Invalid OTP, {attempts_left} attempts left")
            }
            ApiError::EmailNotVerified => write!(f, "Email not verified"),
            ApiError::StoreFull => write!(f, "Challenge store at capacity"),
            ApiError::Delivery { detail, .. } => write!(f, "Mail delivery failed: {detail}"),
            ApiError::Internal(detail) => write!(f, "Internal error: {detail}"),
        }
    }
}

impl std::error::Error for ApiError {}
