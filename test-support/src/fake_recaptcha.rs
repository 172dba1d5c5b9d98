use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tokio::net::TcpListener;

const VERIFY_PATH: &str = "/recaptcha/api/siteverify";

/// Token prefix which the fake accepts. A suffix `-<score>` makes it report that score.
pub const VALID_TOKEN_PREFIX: &str = "success";

/// Stand-in for the reCAPTCHA `siteverify` endpoint.
#[derive(Clone)]
pub struct FakeRecaptcha {
    required_secret: Cow<'static, str>,
    return_invalid_response: bool,
    return_server_error: bool,
}

#[derive(Deserialize)]
struct SiteverifyRequestPayload {
    secret: String,
    response: String,
}

#[derive(Serialize)]
struct SiteverifyResponsePayload {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(rename = "error-codes", skip_serializing_if = "Vec::is_empty")]
    error_codes: Vec<&'static str>,
}

impl FakeRecaptcha {
    pub fn new(required_secret: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_secret: required_secret.into(),
            return_invalid_response: false,
            return_server_error: false,
        }
    }

    pub fn return_invalid_response(self) -> Self {
        Self {
            return_invalid_response: true,
            ..self
        }
    }

    pub fn return_server_error(self) -> Self {
        Self {
            return_server_error: true,
            ..self
        }
    }

    /// Serves on an ephemeral local port and returns the verification URL.
    pub async fn start(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(VERIFY_PATH, post(verify))
            .with_state(self);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}{VERIFY_PATH}")
    }
}

async fn verify(
    State(state): State<FakeRecaptcha>,
    Form(payload): Form<SiteverifyRequestPayload>,
) -> Response {
    debug!("Fake reCAPTCHA got token {}", payload.response);
    if state.return_server_error {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if state.return_invalid_response {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response();
    }
    if payload.secret != state.required_secret {
        return Json(rejection("invalid-input-secret")).into_response();
    }
    let Some(suffix) = payload.response.strip_prefix(VALID_TOKEN_PREFIX) else {
        return Json(rejection("invalid-input-response")).into_response();
    };
    let score = match suffix.strip_prefix('-') {
        Some(score) => match score.parse() {
            Ok(score) => Some(score),
            Err(_) => return Json(rejection("invalid-input-response")).into_response(),
        },
        None if suffix.is_empty() => None,
        None => return Json(rejection("invalid-input-response")).into_response(),
    };
    Json(SiteverifyResponsePayload {
        success: true,
        score,
        error_codes: vec![],
    })
    .into_response()
}

fn rejection(error_code: &'static str) -> SiteverifyResponsePayload {
    SiteverifyResponsePayload {
        success: false,
        score: None,
        error_codes: vec![error_code],
    }
}
