use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::borrow::Cow;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const VERIFY_PATH: &str = "/siteverify";

/// Configurable stand-in for the reCAPTCHA siteverify endpoint.
#[derive(Clone)]
pub struct FakeRecaptcha {
    required_secret: Cow<'static, str>,
    score: f64,
    error_codes: Vec<String>,
    return_invalid_body: bool,
}

impl FakeRecaptcha {
    pub fn new(required_secret: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_secret: required_secret.into(),
            score: 0.9,
            error_codes: Vec::new(),
            return_invalid_body: false,
        }
    }

    pub fn with_score(self, score: f64) -> Self {
        Self { score, ..self }
    }

    pub fn rejecting(self, error_codes: &[&str]) -> Self {
        Self {
            error_codes: error_codes.iter().map(|code| code.to_string()).collect(),
            ..self
        }
    }

    pub fn return_invalid_body(self) -> Self {
        Self {
            return_invalid_body: true,
            ..self
        }
    }

    /// Binds an ephemeral port, points RECAPTCHA_VERIFY_URL at it, and
    /// serves in the background.
    pub async fn start(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        std::env::set_var("RECAPTCHA_VERIFY_URL", format!("http://{addr}{VERIFY_PATH}"));
        let app = Router::new().route(VERIFY_PATH, post(verify)).with_state(self);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

#[derive(Deserialize)]
struct VerifyForm {
    secret: String,
    #[allow(dead_code)]
    response: String,
}

async fn verify(State(state): State<FakeRecaptcha>, Form(form): Form<VerifyForm>) -> Response {
    if state.return_invalid_body {
        return "not json".into_response();
    }
    if form.secret != state.required_secret {
        return Json(json!({ "success": false, "error-codes": ["invalid-input-secret"] }))
            .into_response();
    }
    if !state.error_codes.is_empty() {
        return Json(json!({ "success": false, "error-codes": state.error_codes }))
            .into_response();
    }
    Json(json!({
        "success": true,
        "score": state.score,
        "action": "contact",
        "challenge_ts": "2024-06-01T12:00:00Z"
    }))
    .into_response()
}
