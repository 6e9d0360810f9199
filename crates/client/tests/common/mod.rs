//! In-process stub of the assembly service for integration tests.
//!
//! Binds an axum server on `127.0.0.1:0` with the three endpoints the
//! client talks to: instance resolution, assembly status, and the
//! multipart submission POST. Status responses are scripted per assembly
//! id and every request is recorded for assertions.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::oneshot;

use assemblyline_client::api::AssemblyApi;
use assemblyline_client::config::PollConfig;
use assemblyline_client::poller::AssemblyPoller;

/// One scripted status response.
pub enum ScriptedResponse {
    /// 200 with this JSON body.
    Json(serde_json::Value),
    /// 200 with this raw body.
    Raw(String),
    /// Sit on the request far longer than any test's request timeout.
    Hang,
}

/// One recorded submission POST.
#[derive(Debug, Clone)]
pub struct Submission {
    pub assembly_id: String,
    /// Query parameters of the POST.
    pub query: HashMap<String, String>,
    /// Text form parts by field name.
    pub fields: HashMap<String, String>,
    /// File parts as (field name, file name, byte length).
    pub files: Vec<(String, String, usize)>,
}

#[derive(Default)]
struct StubState {
    /// Host advertised by `/instances/bored`, `ip:port` of this stub.
    advertised_host: String,
    /// Remaining scripted status responses per assembly id.
    scripts: HashMap<String, VecDeque<ScriptedResponse>>,
    /// Script installed for the id of the next accepted submission.
    pending_script: Option<VecDeque<ScriptedResponse>>,
    /// `?seq=` values seen per assembly id, in request order.
    seqs: HashMap<String, Vec<u64>>,
    submissions: Vec<Submission>,
    bored_override: Option<serde_json::Value>,
    reject_submissions: bool,
    submission_delay: Option<Duration>,
}

type SharedState = Arc<Mutex<StubState>>;

/// Stub assembly service listening on a random local port.
///
/// Dropping the handle shuts the server down.
pub struct StubService {
    addr: SocketAddr,
    state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubService {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("read stub listener addr");

        let state: SharedState = Arc::new(Mutex::new(StubState {
            advertised_host: addr.to_string(),
            ..StubState::default()
        }));

        let app = Router::new()
            .route("/instances/bored", get(bored_instance))
            .route(
                "/assemblies/{id}",
                get(assembly_status).post(submit_assembly),
            )
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Base URL of the stub, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Status URL for an assembly id on this stub.
    pub fn assembly_url(&self, id: &str) -> String {
        format!("{}/assemblies/{}", self.base_url(), id)
    }

    /// Script the status responses for an already-submitted assembly.
    pub fn script_assembly(&self, id: &str, responses: Vec<ScriptedResponse>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(id.to_string(), responses.into());
    }

    /// Script the status responses that become visible once the next
    /// submission POST is accepted. Until then the assembly id is
    /// unknown and status requests answer `ASSEMBLY_NOT_FOUND`.
    pub fn script_next_submission(&self, responses: Vec<ScriptedResponse>) {
        self.state.lock().unwrap().pending_script = Some(responses.into());
    }

    /// Replace the `/instances/bored` response body.
    pub fn set_bored_body(&self, body: serde_json::Value) {
        self.state.lock().unwrap().bored_override = Some(body);
    }

    /// Answer every submission POST with a 500.
    pub fn reject_submissions(&self) {
        self.state.lock().unwrap().reject_submissions = true;
    }

    /// Hold every submission POST for `delay` before accepting it.
    pub fn delay_submissions(&self, delay: Duration) {
        self.state.lock().unwrap().submission_delay = Some(delay);
    }

    /// `?seq=` values received for an assembly, in request order.
    pub fn recorded_seqs(&self, id: &str) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .seqs
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of status requests received for an assembly.
    pub fn status_request_count(&self, id: &str) -> usize {
        self.recorded_seqs(id).len()
    }

    /// Recorded submission POSTs, in arrival order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }
}

impl Drop for StubService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Poll tuning fast enough for tests: 20 ms interval, 500 ms request
/// timeout, default not-found budget.
pub fn fast_poll_config() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(20),
        request_timeout: Duration::from_millis(500),
        ..PollConfig::default()
    }
}

/// Build a poller whose HTTP client honors the config's request timeout.
pub fn poller(config: PollConfig) -> AssemblyPoller {
    let api = AssemblyApi::new(config.request_timeout).expect("build HTTP client");
    AssemblyPoller::new(api, config)
}

// ---- handlers ----

#[derive(serde::Deserialize)]
struct SeqQuery {
    #[serde(default)]
    seq: u64,
}

async fn bored_instance(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let state = state.lock().unwrap();
    let body = state
        .bored_override
        .clone()
        .unwrap_or_else(|| serde_json::json!({ "api2_host": state.advertised_host }));
    Json(body)
}

async fn assembly_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<SeqQuery>,
) -> Response {
    let scripted = {
        let mut state = state.lock().unwrap();
        state.seqs.entry(id.clone()).or_default().push(query.seq);
        match state.scripts.get_mut(&id) {
            Some(queue) => queue.pop_front(),
            // Unknown id: the worker has not registered the assembly.
            None => {
                return Json(serde_json::json!({ "error": "ASSEMBLY_NOT_FOUND" })).into_response()
            }
        }
    };

    match scripted {
        Some(ScriptedResponse::Json(body)) => Json(body).into_response(),
        Some(ScriptedResponse::Raw(body)) => body.into_response(),
        Some(ScriptedResponse::Hang) => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(serde_json::json!({ "ok": "ASSEMBLY_EXECUTING" })).into_response()
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "SCRIPT_EXHAUSTED",
                "message": "status requested after the scripted responses ran out",
            })),
        )
            .into_response(),
    }
}

async fn submit_assembly(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    let delay = state.lock().unwrap().submission_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut fields = HashMap::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("read multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(|f| f.to_string()) {
            Some(file_name) => {
                let data = field.bytes().await.expect("read file part");
                files.push((name, file_name, data.len()));
            }
            None => {
                let value = field.text().await.expect("read text part");
                fields.insert(name, value);
            }
        }
    }

    let mut state = state.lock().unwrap();
    state.submissions.push(Submission {
        assembly_id: id.clone(),
        query,
        fields,
        files,
    });

    if state.reject_submissions {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "INTERNAL_ERROR" })),
        )
            .into_response();
    }

    if let Some(script) = state.pending_script.take() {
        state.scripts.insert(id.clone(), script);
    }

    Json(serde_json::json!({ "ok": "ASSEMBLY_UPLOADING", "assembly_id": id })).into_response()
}
