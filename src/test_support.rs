//! In-process HTTP fakes for the heartbeat service and the Blue Iris API

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use md5::{Digest, Md5};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Accepts connections and never answers. Returns the address and an accept counter.
pub async fn hanging_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });

    (addr, accepted)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Default)]
struct HeartbeatState {
    requests: Mutex<Vec<RecordedRequest>>,
    // (remaining failures, status to answer with)
    failures: Mutex<(u32, u16)>,
}

/// Records every request; answers 200 unless told to fail
pub struct FakeHeartbeatServer {
    addr: SocketAddr,
    state: Arc<HeartbeatState>,
}

impl FakeHeartbeatServer {
    pub async fn start() -> Self {
        let state = Arc::new(HeartbeatState::default());
        let app = Router::new()
            .fallback(record_heartbeat)
            .with_state(Arc::clone(&state));

        Self {
            addr: serve(app).await,
            state,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    /// Answer the next `count` requests with `status`
    pub fn fail_next(&self, count: u32, status: u16) {
        *self.state.failures.lock() = (count, status);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

async fn record_heartbeat(
    State(state): State<Arc<HeartbeatState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> StatusCode {
    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        body,
    });

    let mut failures = state.failures.lock();
    if failures.0 > 0 {
        failures.0 -= 1;
        return StatusCode::from_u16(failures.1).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }
    StatusCode::OK
}

pub const FAKE_SESSION: &str = "0123456789abcdef";

/// Behaviour knobs for [`FakeBlueIris`]
#[derive(Clone)]
pub struct FakeBlueIrisOptions {
    pub user: String,
    pub password: String,
    /// Answer logins with a "noname" identity
    pub anonymous: bool,
    /// Answer camlist with HTTP 500
    pub camlist_error: bool,
    /// camlist `data` entries
    pub cameras: Vec<Value>,
    /// Short names whose camconfig call fails
    pub broken_cameras: HashSet<String>,
}

impl Default for FakeBlueIrisOptions {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            password: "secret".to_string(),
            anonymous: false,
            camlist_error: false,
            cameras: Vec::new(),
            broken_cameras: HashSet::new(),
        }
    }
}

/// camlist entry as Blue Iris reports it
pub fn camlist_entry(
    short: &str,
    display: &str,
    enabled: bool,
    online: bool,
    no_signal: bool,
) -> Value {
    json!({
        "optionValue": short,
        "optionDisplay": display,
        "isEnabled": enabled,
        "isOnline": online,
        "isNoSignal": no_signal,
    })
}

struct BlueIrisState {
    options: FakeBlueIrisOptions,
    logged_in: Mutex<bool>,
    commands: Mutex<Vec<String>>,
}

/// Minimal Blue Iris `/json` endpoint
pub struct FakeBlueIris {
    addr: SocketAddr,
    state: Arc<BlueIrisState>,
}

impl FakeBlueIris {
    pub async fn start(options: FakeBlueIrisOptions) -> Self {
        let state = Arc::new(BlueIrisState {
            options,
            logged_in: Mutex::new(false),
            commands: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/json", post(blue_iris_json))
            .with_state(Arc::clone(&state));

        Self {
            addr: serve(app).await,
            state,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().clone()
    }
}

async fn blue_iris_json(
    State(state): State<Arc<BlueIrisState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let cmd = body["cmd"].as_str().unwrap_or_default().to_string();
    state.commands.lock().push(cmd.clone());
    let options = &state.options;

    let session_valid = body["session"].as_str() == Some(FAKE_SESSION) && *state.logged_in.lock();

    let reply = match cmd.as_str() {
        "login" => match body["response"].as_str() {
            None => json!({ "result": "fail", "session": FAKE_SESSION }),
            Some(response) => {
                let mut hasher = Md5::new();
                hasher.update(
                    format!("{}:{}:{}", options.user, FAKE_SESSION, options.password).as_bytes(),
                );
                if response == hex::encode(hasher.finalize()) {
                    *state.logged_in.lock() = true;
                    let name = if options.anonymous { "noname" } else { "Test BI" };
                    let version = if options.anonymous { "noname" } else { "5.9.9.9" };
                    json!({
                        "result": "success",
                        "session": FAKE_SESSION,
                        "data": { "system name": name, "version": version },
                    })
                } else {
                    json!({ "result": "fail", "data": { "reason": "Invalid login" } })
                }
            }
        },
        "camlist" if options.camlist_error => return Err(StatusCode::INTERNAL_SERVER_ERROR),
        "camlist" if session_valid => json!({ "result": "success", "data": options.cameras }),
        "camconfig" if session_valid => {
            let camera = body["camera"].as_str().unwrap_or_default();
            if options.broken_cameras.contains(camera) {
                json!({ "result": "fail", "data": { "reason": "camera not found" } })
            } else {
                json!({ "result": "success", "data": { "pause": 0, "motion": true } })
            }
        }
        "logout" => {
            *state.logged_in.lock() = false;
            json!({ "result": "success" })
        }
        _ => json!({ "result": "fail", "data": { "reason": "Session not found" } }),
    };

    Ok(Json(reply))
}
