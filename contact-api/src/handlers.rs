use axum::{extract::State, Json};
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::email_templates;
use crate::error::ApiError;
use crate::otp_store::VerifyOutcome;
use crate::AppState;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN).unwrap())
}

fn generate_otp_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "running" })
}

#[derive(Deserialize)]
pub struct VerifyRecaptchaRequest {
    token: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyRecaptchaResponse {
    success: bool,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge_ts: Option<String>,
}

pub async fn verify_recaptcha(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyRecaptchaRequest>,
) -> Result<Json<VerifyRecaptchaResponse>, ApiError> {
    let Some(token) = payload.token.filter(|token| !token.is_empty()) else {
        return Err(ApiError::Validation("Token is required".into()));
    };
    let verdict = state.verifier.verify_token(&token).await?;
    Ok(Json(VerifyRecaptchaResponse {
        success: true,
        score: verdict.score,
        action: verdict.action,
        challenge_ts: verdict.challenge_ts,
    }))
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    email: Option<String>,
}

#[derive(Serialize)]
pub struct SendOtpResponse {
    success: bool,
    message: &'static str,
    email: String,
}

pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let Some(email) = payload.email.filter(|email| email_regex().is_match(email)) else {
        return Err(ApiError::Validation("Valid email is required".into()));
    };
    let code = generate_otp_code();
    if !state.store.begin_challenge(&email, &code, Utc::now()) {
        return Err(ApiError::StoreFull);
    }
    let text = format!("Your OTP is: {code}. This will expire in 10 minutes.");
    let html = email_templates::render_otp_email(&code);
    // A failed dispatch leaves the stored challenge in place; a resend
    // replaces it wholesale.
    state
        .mailer
        .send(&email, "Your Portfolio Contact Form OTP", &text, &html)
        .await
        .map_err(|error| ApiError::delivery("Failed to send OTP", error))?;
    info!("OTP dispatched to {email}");
    Ok(Json(SendOtpResponse {
        success: true,
        message: "OTP sent to email",
        email,
    }))
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    email: Option<String>,
    otp: Option<OtpValue>,
}

/// Clients submit the code as a string or a bare number; numbers are coerced
/// to their decimal form before comparison.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum OtpValue {
    Text(String),
    Number(u64),
}

impl OtpValue {
    fn into_code(self) -> String {
        match self {
            OtpValue::Text(text) => text,
            OtpValue::Number(number) => number.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    success: bool,
    message: &'static str,
    email: String,
}

pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let (Some(email), Some(otp)) = (
        payload.email.filter(|email| !email.is_empty()),
        payload.otp,
    ) else {
        return Err(ApiError::Validation("Email and OTP are required".into()));
    };
    let code = otp.into_code();
    if code.is_empty() {
        return Err(ApiError::Validation("Email and OTP are required".into()));
    }
    match state.store.verify(&email, &code, Utc::now()) {
        VerifyOutcome::Verified => {
            info!("OTP verified for {email}");
            Ok(Json(VerifyOtpResponse {
                success: true,
                message: "OTP verified successfully",
                email,
            }))
        }
        VerifyOutcome::NoChallenge => Err(ApiError::NoChallenge),
        VerifyOutcome::Expired => Err(ApiError::OtpExpired),
        VerifyOutcome::AttemptsExhausted => Err(ApiError::AttemptsExhausted),
        VerifyOutcome::InvalidCode { attempts_left } => {
            Err(ApiError::InvalidOtp { attempts_left })
        }
    }
}

#[derive(Deserialize)]
pub struct ContactSubmission {
    email: Option<String>,
    name: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

#[derive(Debug)]
struct ValidatedSubmission<'a> {
    email: &'a str,
    name: &'a str,
    subject: &'a str,
    message: &'a str,
}

impl ContactSubmission {
    /// Checks run in a fixed order and the first violated rule wins.
    fn validate(&self) -> Result<ValidatedSubmission, ApiError> {
        let ContactSubmission {
            email: Some(email),
            name: Some(name),
            subject: Some(subject),
            message: Some(message),
        } = self
        else {
            return Err(ApiError::Validation("All fields are required".into()));
        };
        if [email, name, subject, message]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(ApiError::Validation("All fields are required".into()));
        }
        if name.chars().count() < 2 {
            return Err(ApiError::Validation(
                "Name must be at least 2 characters".into(),
            ));
        }
        if subject.chars().count() < 3 {
            return Err(ApiError::Validation(
                "Subject must be at least 3 characters".into(),
            ));
        }
        if message.chars().count() < 10 {
            return Err(ApiError::Validation(
                "Message must be at least 10 characters".into(),
            ));
        }
        Ok(ValidatedSubmission {
            email,
            name,
            subject,
            message,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitContactResponse {
    success: bool,
    message: &'static str,
    confirmation_sent: bool,
}

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ContactSubmission>,
) -> Result<Json<SubmitContactResponse>, ApiError> {
    let submission = payload.validate()?;
    if !state.store.consume_pass(submission.email, Utc::now()) {
        return Err(ApiError::EmailNotVerified);
    }

    let admin_text = format!(
        "From: {} ({})\n\nSubject: {}\n\nMessage:\n{}",
        submission.name, submission.email, submission.subject, submission.message
    );
    let admin_html = email_templates::render_admin_notification(
        submission.name,
        submission.email,
        submission.subject,
        submission.message,
    );
    state
        .mailer
        .send(
            &state.config.admin_email,
            &format!("New Contact: {}", submission.subject),
            &admin_text,
            &admin_html,
        )
        .await
        .map_err(|error| ApiError::delivery("Failed to submit contact form", error))?;

    let confirmation_text =
        "Thank you for your message. We will get back to you soon.".to_string();
    let confirmation_html = email_templates::render_confirmation(
        submission.name,
        submission.subject,
        submission.message,
    );
    // The operator already has the message at this point; a failed
    // acknowledgement is reported, not treated as a failed submission.
    let confirmation_sent = match state
        .mailer
        .send(
            submission.email,
            &format!("Re: {}", submission.subject),
            &confirmation_text,
            &confirmation_html,
        )
        .await
    {
        Ok(()) => true,
        Err(error) => {
            warn!("Confirmation delivery failed: {error}");
            false
        }
    };

    info!("Contact message from {} relayed", submission.email);
    Ok(Json(SubmitContactResponse {
        success: true,
        message: "Message sent successfully! Check your email for confirmation.",
        confirmation_sent,
    }))
}
