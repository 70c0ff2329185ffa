//! In-process stand-in for the analysis service, served over real HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::fixtures::ServiceScript;

/// What the stand-in saw of one multipart upload.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub len: usize,
}

#[derive(Default)]
struct Recorded {
    uploads: Vec<RecordedUpload>,
    analyses: Vec<Value>,
    status_polls: u32,
    results_fetches: u32,
    jobs: Vec<String>,
}

#[derive(Clone)]
struct ServiceState {
    script: Arc<ServiceScript>,
    recorded: Arc<Mutex<Recorded>>,
}

/// Running stand-in service. The server task ends with the test runtime.
pub struct TestService {
    pub base_url: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl TestService {
    pub async fn start(script: ServiceScript) -> TestService {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = ServiceState {
            script: Arc::new(script),
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/api/health", get(health))
            .route("/api/upload", post(upload))
            .route("/api/analyze", post(analyze))
            .route("/api/status/{job_id}", get(status))
            .route("/api/results/{job_id}", get(results))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test service");
        let addr: SocketAddr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test service error");
        });

        TestService {
            base_url: format!("http://{}", addr),
            recorded,
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.recorded.lock().uploads.clone()
    }

    pub fn analyses(&self) -> Vec<Value> {
        self.recorded.lock().analyses.clone()
    }

    pub fn status_polls(&self) -> u32 {
        self.recorded.lock().status_polls
    }

    pub fn results_fetches(&self) -> u32 {
        self.recorded.lock().results_fetches
    }
}

async fn health(State(state): State<ServiceState>) -> (StatusCode, Json<Value>) {
    let healthy = state.script.healthy;
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "model_initialized": true,
            "database_ready": healthy,
        })),
    )
}

async fn upload(
    State(state): State<ServiceState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let bad_request = |msg: &str| (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })));

    let mut file_name = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| bad_request("Malformed multipart body"))?
    {
        let record = RecordedUpload {
            field_name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            len: 0,
        };
        let data = field
            .bytes()
            .await
            .map_err(|_| bad_request("Unreadable file"))?;
        if record.field_name == "file" {
            file_name = record.file_name.clone();
        }
        state.recorded.lock().uploads.push(RecordedUpload {
            len: data.len(),
            ..record
        });
    }

    let file_name = file_name.ok_or_else(|| bad_request("No file provided"))?;

    if state.script.fail_upload {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "OCR model unavailable" })),
        ));
    }

    let mut recorded = state.recorded.lock();
    let job_id = format!("{}_{}", recorded.jobs.len() + 1, file_name);
    recorded.jobs.push(job_id.clone());

    Ok(Json(json!({
        "job_id": job_id,
        "ingredients": state.script.ingredients,
        "count": state.script.ingredients.len(),
    })))
}

async fn analyze(
    State(state): State<ServiceState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let filters_ok = body["filters"].as_array().is_some_and(|f| !f.is_empty());
    state.recorded.lock().analyses.push(body.clone());

    if state.script.fail_analyze {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Analysis queue unavailable" })),
        );
    }
    if !filters_ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Filters must be a non-empty list" })),
        );
    }
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": body["job_id"],
            "status": "pending",
            "message": "Analysis started",
        })),
    )
}

async fn status(
    State(state): State<ServiceState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut recorded = state.recorded.lock();
    if !recorded.jobs.contains(&job_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        );
    }
    recorded.status_polls += 1;
    if state.script.unknown_job_on_status {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        );
    }

    let status = match state.script.pending_polls {
        Some(pending) if recorded.status_polls <= pending => "analyzing",
        Some(_) => state.script.final_status,
        None => "pending",
    };
    let mut body = json!({ "job_id": job_id, "status": status });
    if status == "error" {
        body["error"] = json!("Gemini quota exceeded");
    }
    (StatusCode::OK, Json(body))
}

async fn results(
    State(state): State<ServiceState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut recorded = state.recorded.lock();
    if !recorded.jobs.contains(&job_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        );
    }
    recorded.results_fetches += 1;
    match StatusCode::from_u16(state.script.results_status) {
        Ok(StatusCode::OK) => (StatusCode::OK, Json(state.script.results.clone())),
        Ok(StatusCode::ACCEPTED) => (
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": job_id, "status": "analyzing" })),
        ),
        Ok(code) => (code, Json(json!({ "error": "Results unavailable" }))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Results unavailable" })),
        ),
    }
}
