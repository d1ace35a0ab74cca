//! In-process fake of both upstream air-quality providers, for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

/// Recorded interactions and scripted behaviour of the fake providers.
pub struct FakeState {
    pub login_calls: AtomicUsize,
    pub telemetry_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub login_ok: AtomicBool,
    pub empty_series: AtomicBool,
    pub metadata_status: AtomicU16,
    /// Delay before the telemetry and metadata endpoints answer, in milliseconds.
    pub response_delay_ms: AtomicU64,
    telemetry_statuses: Mutex<VecDeque<u16>>,
    authorizations: Mutex<Vec<String>>,
    telemetry_queries: Mutex<Vec<HashMap<String, String>>>,
}

impl FakeState {
    fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            telemetry_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            login_ok: AtomicBool::new(true),
            empty_series: AtomicBool::new(false),
            metadata_status: AtomicU16::new(200),
            response_delay_ms: AtomicU64::new(0),
            telemetry_statuses: Mutex::new(VecDeque::new()),
            authorizations: Mutex::new(Vec::new()),
            telemetry_queries: Mutex::new(Vec::new()),
        }
    }

    async fn stall(&self) {
        let delay = self.response_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    /// Statuses returned by the next telemetry calls, in order; 200 afterwards.
    pub fn script_telemetry_statuses(&self, statuses: &[u16]) {
        self.telemetry_statuses.lock().unwrap().extend(statuses.iter().copied());
    }

    /// `Authorization` headers seen by the telemetry endpoint.
    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }

    /// Query string of the latest telemetry call.
    pub fn last_telemetry_query(&self) -> HashMap<String, String> {
        self.telemetry_queries.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Running fake provider bound to an ephemeral local port.
pub struct FakeUpstream {
    pub base_url: String,
    pub metadata_url: String,
    pub state: Arc<FakeState>,
}

impl FakeUpstream {
    pub async fn spawn() -> Self {
        let state = Arc::new(FakeState::new());
        let app = Router::new()
            .route("/api/Auth/Login", post(login))
            .route("/api/Device/GetDeviceTelemetryV2", get(telemetry))
            .route("/server/getsensor.php", get(sensor))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            metadata_url: format!("http://{addr}/server/getsensor.php"),
            state,
        }
    }
}

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Json<Value> {
    let n = state.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let has_account = body.get("email").is_some() && body.get("password").is_some();
    if state.login_ok.load(Ordering::SeqCst) && has_account {
        Json(json!({"status": "Success", "data": {"data": {"token": format!("token-{n}")}}}))
    } else {
        Json(json!({"status": "Failed", "data": null}))
    }
}

async fn telemetry(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.telemetry_calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().unwrap().push(auth);
    state.telemetry_queries.lock().unwrap().push(query);

    let scripted = state.telemetry_statuses.lock().unwrap().pop_front().unwrap_or(200);
    state.stall().await;
    let status = StatusCode::from_u16(scripted).unwrap();
    if !status.is_success() {
        return (status, Json(json!({"message": "scripted failure"})));
    }
    if state.empty_series.load(Ordering::SeqCst) {
        return (status, Json(json!({"data": []})));
    }
    (
        status,
        Json(json!({"data": [
            {"cO2_ppm": 640, "humd": 45.5, "temp_C": 71.6, "moldIndex": 2,
             "o3_ppb": 18, "tvoCs_ppb": 120, "aqi": 35, "pC0_1": 0.8},
            {"cO2_ppm": 600, "humd": 44.0, "temp_C": 70.0, "moldIndex": 2,
             "o3_ppb": 17, "tvoCs_ppb": 110, "aqi": 30, "pC0_1": 0.7}
        ]})),
    )
}

async fn sensor(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.metadata_calls.fetch_add(1, Ordering::SeqCst);
    state.stall().await;
    let status = StatusCode::from_u16(state.metadata_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (status, Json(json!({"error": "scripted failure"})));
    }
    let id = query.get("sensor_id").cloned().unwrap_or_default();
    (
        status,
        Json(json!({"data": {"sensorId": id, "city": "Monterrey", "days": "41", "daysm": 17}})),
    )
}
