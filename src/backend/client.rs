use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::config::{Credentials, RuntimeConfig};
use crate::error::ProtonErrorOut;
use crate::intercept::ObservedResponse;
use crate::session::{SessionBackend, SessionState};

const APP_VERSION: &str = concat!("proton-cli@", env!("CARGO_PKG_VERSION"));

/// Proton response codes.
pub const CODE_OK: i64 = 1000;
pub const CODE_NOT_FOUND: i64 = 2501;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AuthTokens {
    #[serde(rename = "uid")]
    pub uid: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("uid", &self.uid)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

pub fn response_code(body: &Value) -> Option<i64> {
    body.get("Code").and_then(|c| c.as_i64())
}

fn error_text(body: &Value, fallback: &str) -> String {
    body.get("Error")
        .and_then(|e| e.as_str())
        .unwrap_or(fallback)
        .to_string()
}

fn transport_error(what: &str, e: reqwest::Error) -> ProtonErrorOut {
    if e.is_timeout() {
        ProtonErrorOut::timeout(format!("{what} timed out"))
    } else {
        ProtonErrorOut::http(format!("{what} failed: {e}"))
    }
}

/// Authenticated JSON client for the Proton web API.
pub struct ProtonClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Option<AuthTokens>,
    observer: Mutex<Option<UnboundedSender<ObservedResponse>>>,
}

impl ProtonClient {
    pub fn new(cfg: &RuntimeConfig) -> Result<Self, ProtonErrorOut> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.request_timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ProtonErrorOut::http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.api_url.clone(),
            tokens: None,
            observer: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ProtonErrorOut> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or_else(|| ProtonErrorOut::auth("not logged in"))?;
        Ok(builder
            .header("x-pm-appversion", APP_VERSION)
            .header("x-pm-uid", &tokens.uid)
            .bearer_auth(&tokens.access_token))
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), ProtonErrorOut> {
        debug!(account = %credentials.account, "logging in");
        self.tokens = None;

        let response = self
            .http
            .post(self.url("auth/v4"))
            .header("x-pm-appversion", APP_VERSION)
            .json(&json!({
                "Username": credentials.account,
                "Password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| transport_error("login", e))?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            return Err(ProtonErrorOut::auth(format!(
                "login rejected (HTTP {}): {}",
                status.as_u16(),
                error_text(&body, "check credentials")
            )));
        }

        let second_factor = body
            .pointer("/2FA/Enabled")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if second_factor != 0 {
            return Err(ProtonErrorOut::auth(
                "login requires a second factor, which is not supported",
            ));
        }

        let field = |key: &str| body.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let (Some(uid), Some(access_token)) = (field("UID"), field("AccessToken")) else {
            return Err(ProtonErrorOut::auth("login response is missing session tokens"));
        };

        self.tokens = Some(AuthTokens {
            uid,
            access_token,
            refresh_token: field("RefreshToken").unwrap_or_default(),
            scope: field("Scope").unwrap_or_default(),
        });
        Ok(())
    }

    /// Succeeds only while the session is accepted.
    pub async fn probe(&self) -> bool {
        let Ok(builder) = self.authorized(self.http.get(self.url("core/v4/users"))) else {
            return false;
        };
        match builder.send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                debug!(error = %e, "session probe failed");
                false
            }
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ProtonErrorOut> {
        let builder = self.authorized(self.http.get(self.url(path)).query(query))?;
        self.execute(builder, path).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ProtonErrorOut> {
        let builder = self.authorized(self.http.post(self.url(path)).json(body))?;
        self.execute(builder, path).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ProtonErrorOut> {
        let builder = self.authorized(self.http.put(self.url(path)).json(body))?;
        self.execute(builder, path).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ProtonErrorOut> {
        let builder = self.authorized(self.http.delete(self.url(path)))?;
        self.execute(builder, path).await
    }

    async fn execute(&self, builder: RequestBuilder, path: &str) -> Result<Value, ProtonErrorOut> {
        let response = builder.send().await.map_err(|e| transport_error(path, e))?;

        let status = response.status();
        let url = response.url().to_string();
        debug!(%url, status = status.as_u16(), "response");

        let text = response.text().await.map_err(|e| transport_error(path, e))?;

        // Empty successful responses (e.g. DELETE).
        let body: Value = if text.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ProtonErrorOut::api(format!("{path}: invalid JSON response: {e}")))?
        };

        self.publish(ObservedResponse {
            url,
            status: status.as_u16(),
            body: body.clone(),
        });

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProtonErrorOut::auth("session is not authenticated"));
        }
        if status == StatusCode::NOT_FOUND || response_code(&body) == Some(CODE_NOT_FOUND) {
            return Err(ProtonErrorOut::not_found(error_text(&body, "not found")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("rate limited by the Proton API");
        }
        if !status.is_success() {
            return Err(ProtonErrorOut::api(format!(
                "{path} failed (HTTP {}): {}",
                status.as_u16(),
                error_text(&body, "unexpected response")
            )));
        }

        Ok(body)
    }

    /// Starts a response subscription; every later response is published to it.
    pub fn observe(&self) -> UnboundedReceiver<ObservedResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.observer.lock() {
            *slot = Some(tx);
        }
        rx
    }

    /// Closes the subscription so the receiver drains and ends.
    pub fn stop_observing(&self) {
        if let Ok(mut slot) = self.observer.lock() {
            slot.take();
        }
    }

    fn publish(&self, response: ObservedResponse) {
        if let Ok(slot) = self.observer.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(response);
            }
        }
    }
}

#[async_trait]
impl SessionBackend for ProtonClient {
    fn restore(&mut self, state: &SessionState) -> Result<(), ProtonErrorOut> {
        let tokens = serde_json::from_value::<AuthTokens>(state.as_value().clone())
            .map_err(|e| ProtonErrorOut::auth(format!("unrecognized session state: {e}")))?;
        self.tokens = Some(tokens);
        Ok(())
    }

    fn export(&self) -> Option<SessionState> {
        self.tokens
            .as_ref()
            .and_then(|t| serde_json::to_value(t).ok())
            .map(SessionState::new)
    }

    fn reset(&mut self) {
        self.tokens = None;
    }

    async fn probe(&self) -> bool {
        ProtonClient::probe(self).await
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<(), ProtonErrorOut> {
        ProtonClient::login(self, credentials).await
    }
}
