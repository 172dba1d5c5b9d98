use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const CONTACT_PATH: &str = "/api/contact";

/// Stand-in for the submission endpoint which answers every POST with a canned response and
/// records the request bodies it received.
#[derive(Clone)]
pub struct FakeContactEndpoint {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeContactEndpoint {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            requests: Default::default(),
        }
    }

    /// Serves on an ephemeral local port and returns the endpoint URL.
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(CONTACT_PATH, post(submit))
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}{CONTACT_PATH}")
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn submit(
    State(state): State<FakeContactEndpoint>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(payload);
    (state.status, Json(state.body))
}
