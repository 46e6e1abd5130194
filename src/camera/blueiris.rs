//! Blue Iris JSON API client.
//!
//! All commands are `POST <base>/json` with a JSON body. Login is a
//! two-step challenge/response: the first `login` returns a session id, the
//! second carries `md5("user:session:password")` and activates the session.

use super::managed::{CameraFlags, CameraListing, SessionInfo, VideoManagementApi};
use crate::config::ManagedApiConfig;
use crate::credentials::Secret;
use crate::error::ApiError;
use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    result: String,
    session: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        self.result == "success"
    }

    fn failure_reason(&self) -> String {
        self.data
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("no reason given")
            .to_string()
    }
}

/// Session-holding Blue Iris client. One instance per run.
pub struct BlueIrisClient {
    http: reqwest::Client,
    endpoint: Url,
    user: String,
    password: Secret,
    session: Option<String>,
}

impl BlueIrisClient {
    pub fn new(config: &ManagedApiConfig, password: Secret) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: json_endpoint(&config.url)?,
            user: config.user.clone(),
            password,
            session: None,
        })
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    async fn command(&self, body: Value) -> Result<ApiResponse, ApiError> {
        let cmd = body.get("cmd").and_then(Value::as_str).unwrap_or("?").to_string();
        debug!("Blue Iris command \"{}\"", cmd);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::transport(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::transport(format!(
                "\"{}\" returned HTTP {}",
                cmd, status
            )));
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| ApiError::protocol(format!("\"{}\": {}", cmd, e)))
    }

    fn active_session(&self) -> Result<&str, ApiError> {
        self.session
            .as_deref()
            .ok_or_else(|| ApiError::rejected("not logged in"))
    }
}

#[async_trait]
impl VideoManagementApi for BlueIrisClient {
    async fn login(&mut self) -> Result<SessionInfo, ApiError> {
        info!("Logging into {} as {} ...", self.endpoint, self.user);

        let challenge = self.command(json!({ "cmd": "login" })).await?;
        let session = challenge
            .session
            .ok_or_else(|| ApiError::protocol("login challenge carried no session"))?;

        let response = login_response(&self.user, &session, &self.password);
        let reply = self
            .command(json!({
                "cmd": "login",
                "session": session,
                "response": response,
            }))
            .await?;

        if !reply.is_success() {
            return Err(ApiError::rejected(reply.failure_reason()));
        }

        let field = |key: &str| {
            reply
                .data
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let info = SessionInfo {
            system_name: field("system name"),
            version: field("version"),
        };

        self.session = Some(reply.session.unwrap_or(session));
        Ok(info)
    }

    async fn list_cameras(&mut self) -> Result<Vec<CameraListing>, ApiError> {
        let session = self.active_session()?.to_string();
        let reply = self
            .command(json!({ "cmd": "camlist", "session": session }))
            .await?;

        if !reply.is_success() {
            return Err(ApiError::rejected(reply.failure_reason()));
        }

        let entries = reply
            .data
            .as_array()
            .ok_or_else(|| ApiError::protocol("camlist data is not a list"))?;

        entries
            .iter()
            .map(|entry| {
                let entry = entry
                    .as_object()
                    .ok_or_else(|| ApiError::protocol("camlist entry is not an object"))?;
                let short_name = entry
                    .get("optionValue")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::protocol("camlist entry without optionValue"))?
                    .to_string();
                let display_name = entry
                    .get("optionDisplay")
                    .and_then(Value::as_str)
                    .unwrap_or(short_name.as_str())
                    .to_string();

                Ok(CameraListing {
                    short_name,
                    display_name,
                    flags: merge_flags(CameraFlags::default(), entry),
                })
            })
            .collect()
    }

    async fn describe_camera(&mut self, camera: &CameraListing) -> Result<CameraFlags, ApiError> {
        let session = self.active_session()?.to_string();
        let reply = self
            .command(json!({
                "cmd": "camconfig",
                "camera": camera.short_name,
                "session": session,
            }))
            .await?;

        if !reply.is_success() {
            return Err(ApiError::rejected(reply.failure_reason()));
        }

        Ok(match reply.data.as_object() {
            Some(data) => merge_flags(camera.flags, data),
            None => camera.flags,
        })
    }

    async fn logout(&mut self) -> Result<(), ApiError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        self.command(json!({ "cmd": "logout", "session": session }))
            .await
            .map(|_| ())
    }
}

/// `<base>/json`, keeping any path prefix on the base URL
fn json_endpoint(base: &Url) -> Result<Url, ApiError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("json")
        .map_err(|e| ApiError::protocol(format!("invalid Blue Iris URL: {}", e)))
}

fn login_response(user: &str, session: &str, password: &Secret) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{}:{}:{}", user, session, password.expose()).as_bytes());
    hex::encode(hasher.finalize())
}

fn merge_flags(base: CameraFlags, fields: &Map<String, Value>) -> CameraFlags {
    let flag = |key: &str| {
        fields.get(key).and_then(|value| match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        })
    };

    CameraFlags {
        enabled: flag("isEnabled").unwrap_or(base.enabled),
        online: flag("isOnline").unwrap_or(base.online),
        no_signal: flag("isNoSignal").unwrap_or(base.no_signal),
    }
}

fn describe_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
