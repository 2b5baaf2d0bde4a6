use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ProtonErrorOut;

pub const ACCOUNT_ENV: &str = "PROTON_ACCOUNT";
pub const USERNAME_ENV: &str = "PROTON_USERNAME";
pub const PASSWORD_ENV: &str = "PROTON_PASSWORD";
pub const API_URL_ENV: &str = "PROTON_API_URL";
pub const SESSION_FILE_ENV: &str = "PROTON_SESSION_FILE";
pub const TIMEOUT_ENV: &str = "PROTON_TIMEOUT_SECS";
pub const PROBE_TIMEOUT_ENV: &str = "PROTON_PROBE_TIMEOUT_MS";
pub const QUIESCENCE_ENV: &str = "PROTON_QUIESCENCE_MS";

const SESSION_FILE_NAME: &str = ".proton-calendar-session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Calendar,
    Mail,
}

impl Tool {
    fn default_api_url(self) -> &'static str {
        match self {
            Tool::Calendar => "https://calendar.proton.me/api",
            Tool::Mail => "https://mail.proton.me/api",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub credentials: Credentials,

    /// Base URL of the Proton web API, without trailing slash.
    pub api_url: String,

    /// Only the calendar tool caches a session.
    pub session_path: Option<PathBuf>,

    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub quiescence: Duration,
}

impl RuntimeConfig {
    /// The only place that reads the real process environment.
    pub fn from_env(tool: Tool) -> Result<Self, ProtonErrorOut> {
        resolve_runtime_config(tool, &|key| std::env::var(key).ok())
    }
}

fn non_empty(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn resolve_credentials(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Credentials, ProtonErrorOut> {
    let account = non_empty(lookup, ACCOUNT_ENV).or_else(|| non_empty(lookup, USERNAME_ENV));
    // Passwords may legitimately carry surrounding spaces.
    let password = lookup(PASSWORD_ENV).filter(|v| !v.is_empty());

    match (account, password) {
        (Some(account), Some(password)) => Ok(Credentials { account, password }),
        _ => Err(ProtonErrorOut::config(format!(
            "{ACCOUNT_ENV} and {PASSWORD_ENV} environment variables must be set"
        ))),
    }
}

fn parse_millis(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ProtonErrorOut> {
    match non_empty(lookup, key) {
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ProtonErrorOut::config(format!("{key} must be a number of milliseconds"))),
        None => Ok(Duration::from_millis(default)),
    }
}

fn default_session_path(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<PathBuf, ProtonErrorOut> {
    if let Some(p) = non_empty(lookup, SESSION_FILE_ENV) {
        return Ok(PathBuf::from(p));
    }
    let home = non_empty(lookup, "HOME")
        .ok_or_else(|| ProtonErrorOut::config("missing HOME environment variable"))?;
    Ok(PathBuf::from(home).join(SESSION_FILE_NAME))
}

pub fn resolve_runtime_config(
    tool: Tool,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig, ProtonErrorOut> {
    // Credentials first: nothing else matters if they are absent.
    let credentials = resolve_credentials(lookup)?;

    let api_url = non_empty(lookup, API_URL_ENV)
        .unwrap_or_else(|| tool.default_api_url().to_string())
        .trim_end_matches('/')
        .to_string();
    url::Url::parse(&api_url)
        .map_err(|e| ProtonErrorOut::config(format!("invalid {API_URL_ENV}: {e}")))?;

    let request_timeout = match non_empty(lookup, TIMEOUT_ENV) {
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ProtonErrorOut::config(format!("{TIMEOUT_ENV} must be a number of seconds")))?,
        None => Duration::from_secs(30),
    };

    let session_path = match tool {
        Tool::Calendar => Some(default_session_path(lookup)?),
        Tool::Mail => None,
    };

    Ok(RuntimeConfig {
        credentials,
        api_url,
        session_path,
        request_timeout,
        probe_timeout: parse_millis(lookup, PROBE_TIMEOUT_ENV, 5_000)?,
        quiescence: parse_millis(lookup, QUIESCENCE_ENV, 1_500)?,
    })
}
