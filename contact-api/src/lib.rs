pub mod config;
pub mod email_templates;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod otp_store;
pub mod recaptcha;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use config::Config;
use mailer::Mailer;
use otp_store::OtpStore;
use recaptcha::RecaptchaVerifier;

pub struct AppState {
    pub config: Config,
    pub store: OtpStore,
    pub verifier: RecaptchaVerifier,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let verifier = RecaptchaVerifier::new(config.recaptcha_secret.clone());
        let mailer = Mailer::new(&config.mail_domain)?;
        Ok(Arc::new(Self {
            store: OtpStore::new(),
            verifier,
            mailer,
            config,
        }))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/verify-recaptcha", post(handlers::verify_recaptcha))
        .route("/api/send-otp", post(handlers::send_otp))
        .route("/api/verify-otp", post(handlers::verify_otp))
        .route("/api/submit-contact", post(handlers::submit_contact))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
