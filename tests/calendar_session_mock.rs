use assert_cmd::Command;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_response() -> serde_json::Value {
    json!({
        "Code": 1000,
        "UID": "fresh-uid",
        "AccessToken": "fresh-access",
        "RefreshToken": "fresh-refresh",
        "Scope": "full"
    })
}

async fn mount_calendars(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/calendar/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Code": 1000,
            "Calendars": [{"ID": "cal1", "Name": "Personal", "Color": "#5064b6", "Type": 0}]
        })))
        .mount(server)
        .await;
}

fn run_calendars(server: &MockServer, session: &std::path::Path) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("proton-calendar"))
        .env("PROTON_API_URL", format!("{}/api", server.uri()))
        .env("PROTON_ACCOUNT", "me@proton.me")
        .env("PROTON_PASSWORD", "hunter2")
        .env("PROTON_SESSION_FILE", session)
        .env("PROTON_PROBE_TIMEOUT_MS", "2000")
        .env_remove("PROTON_LOG")
        .args(["calendars"])
        .output()
        .expect("run")
}

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "proton-calendar failed. status={:?}\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test]
async fn first_run_logs_in_and_writes_session_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response()))
        .expect(1)
        .mount(&server)
        .await;
    mount_calendars(&server).await;

    let output = run_calendars(&server, &session);
    assert_success(&output);

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(v[0]["id"], "cal1");
    assert_eq!(v[0]["name"], "Personal");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session).unwrap()).unwrap();
    assert_eq!(saved["uid"], "fresh-uid");
    assert_eq!(saved["accessToken"], "fresh-access");
}

#[tokio::test]
async fn valid_cached_session_skips_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");
    std::fs::write(
        &session,
        json!({"uid": "cached-uid", "accessToken": "cached-access"}).to_string(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/core/v4/users"))
        .and(header("x-pm-uid", "cached-uid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Code": 1000})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response()))
        .expect(0)
        .mount(&server)
        .await;
    mount_calendars(&server).await;

    let output = run_calendars(&server, &session);
    assert_success(&output);

    // Written back unchanged.
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session).unwrap()).unwrap();
    assert_eq!(saved["uid"], "cached-uid");
}

#[tokio::test]
async fn expired_session_triggers_exactly_one_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");
    std::fs::write(
        &session,
        json!({"uid": "stale-uid", "accessToken": "stale-access"}).to_string(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/core/v4/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"Code": 401, "Error": "Invalid access token"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response()))
        .expect(1)
        .mount(&server)
        .await;
    mount_calendars(&server).await;

    let output = run_calendars(&server, &session);
    assert_success(&output);

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session).unwrap()).unwrap();
    assert_eq!(saved["uid"], "fresh-uid");
}

#[tokio::test]
async fn unreadable_session_file_is_replaced() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");
    std::fs::write(&session, "not json at all").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response()))
        .expect(1)
        .mount(&server)
        .await;
    mount_calendars(&server).await;

    let output = run_calendars(&server, &session);
    assert_success(&output);

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session).unwrap()).unwrap();
    assert_eq!(saved["uid"], "fresh-uid");
}

#[tokio::test]
async fn rejected_login_fails_without_saving_a_session() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "Code": 8002,
            "Error": "Incorrect login credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_calendars(&server, &session);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap();
    let err: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(err["kind"], "authError");
    assert!(!session.exists());
}

#[tokio::test]
async fn second_factor_accounts_are_refused() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");

    let mut body = login_response();
    body["2FA"] = json!({"Enabled": 1});
    Mock::given(method("POST"))
        .and(path("/api/auth/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let output = run_calendars(&server, &session);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("second factor"));
    assert!(!session.exists());
}
