use tracing::{info_span, Instrument};

use crate::backend::{CalendarBackend, ProtonCalendar, ProtonClient, ProtonMail};
use crate::cli::{CalendarCli, MailCli};
use crate::config::{Credentials, RuntimeConfig, Tool};
use crate::error::ProtonErrorOut;
use crate::output::Outcome;
use crate::session::{SessionBackend, SessionManager, SessionStore};

pub mod calendar;
pub mod mail;

pub use calendar::CalendarRequest;
pub use mail::MailRequest;

/// Flags are validated first, then the environment, then the network.
pub async fn run_calendar(cli: &CalendarCli) -> Outcome {
    let request = CalendarRequest::from_command(&cli.command)?;
    let span = info_span!("command", tool = "calendar", name = request.name());

    async {
        let cfg = RuntimeConfig::from_env(Tool::Calendar)?;
        let path = cfg
            .session_path
            .clone()
            .ok_or_else(|| ProtonErrorOut::config("no session file location"))?;

        let client = ProtonClient::new(&cfg)?;
        let mut backend = ProtonCalendar::new(
            client,
            cli.calendar.clone(),
            cfg.quiescence,
            cfg.request_timeout,
        );
        let manager = SessionManager::new(SessionStore::new(path), cfg.probe_timeout);

        run_calendar_with(&request, &cfg.credentials, &manager, &mut backend).await
    }
    .instrument(span)
    .await
}

/// Establishes a session, runs one request and writes the session back
/// whether or not the request succeeded.
pub async fn run_calendar_with<B>(
    request: &CalendarRequest,
    credentials: &Credentials,
    manager: &SessionManager,
    backend: &mut B,
) -> Outcome
where
    B: SessionBackend + CalendarBackend,
{
    let origin = manager.establish(backend, credentials).await?;
    tracing::debug!(?origin, "session ready");

    let outcome = calendar::execute(request, &*backend).await;
    manager.persist(&*backend);
    outcome
}

pub async fn run_mail(cli: &MailCli) -> Outcome {
    let request = MailRequest::from_command(&cli.command)?;
    let span = info_span!("command", tool = "mail", name = request.name());

    async {
        let cfg = RuntimeConfig::from_env(Tool::Mail)?;
        let backend = ProtonMail::connect(&cfg).await?;
        mail::execute(&request, &backend).await
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::calendar::tests::FakeCalendar;
    use super::*;
    use crate::backend::{EventDraft, EventPatch, EventRange};
    use crate::session::tests::FakeSession;
    use crate::session::SessionState;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Session behavior from `FakeSession`, calendar behavior from `FakeCalendar`.
    struct FakeAccount {
        session: FakeSession,
        calendar: FakeCalendar,
    }

    #[async_trait]
    impl SessionBackend for FakeAccount {
        fn restore(&mut self, state: &SessionState) -> Result<(), ProtonErrorOut> {
            self.session.restore(state)
        }

        fn export(&self) -> Option<SessionState> {
            self.session.export()
        }

        fn reset(&mut self) {
            self.session.reset()
        }

        async fn probe(&self) -> bool {
            self.session.probe().await
        }

        async fn login(&mut self, credentials: &Credentials) -> Result<(), ProtonErrorOut> {
            self.session.login(credentials).await
        }
    }

    #[async_trait]
    impl CalendarBackend for FakeAccount {
        async fn list_calendars(&self) -> Result<Vec<Value>, ProtonErrorOut> {
            self.calendar.list_calendars().await
        }

        async fn list_events(&self, range: &EventRange) -> Result<Vec<Value>, ProtonErrorOut> {
            self.calendar.list_events(range).await
        }

        async fn get_event(&self, id: &str) -> Result<Option<Value>, ProtonErrorOut> {
            self.calendar.get_event(id).await
        }

        async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, ProtonErrorOut> {
            self.calendar.create_event(draft).await
        }

        async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<(), ProtonErrorOut> {
            self.calendar.update_event(id, patch).await
        }

        async fn delete_event(&self, id: &str) -> Result<(), ProtonErrorOut> {
            self.calendar.delete_event(id).await
        }
    }

    fn creds() -> Credentials {
        Credentials {
            account: "me@proton.me".to_string(),
            password: "pw".to_string(),
        }
    }

    #[tokio::test]
    async fn failed_operation_still_saves_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let manager = SessionManager::new(SessionStore::new(&path), Duration::from_secs(1));
        let mut account = FakeAccount {
            session: FakeSession::new("tok"),
            calendar: FakeCalendar::default(),
        };

        let request = CalendarRequest::Delete { id: "missing".to_string() };
        let err = run_calendar_with(&request, &creds(), &manager, &mut account)
            .await
            .unwrap_err();

        assert_eq!(err.kind, "notFound");
        assert_eq!(account.session.logins.load(Ordering::SeqCst), 1);
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, json!({"token": "tok"}));
    }

    #[tokio::test]
    async fn second_invocation_reuses_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let manager = SessionManager::new(SessionStore::new(&path), Duration::from_secs(1));

        let mut first = FakeAccount {
            session: FakeSession::new("tok"),
            calendar: FakeCalendar::default(),
        };
        run_calendar_with(&CalendarRequest::Calendars, &creds(), &manager, &mut first)
            .await
            .unwrap();

        let mut second = FakeAccount {
            session: FakeSession::new("tok"),
            calendar: FakeCalendar::default(),
        };
        let out = run_calendar_with(&CalendarRequest::Calendars, &creds(), &manager, &mut second)
            .await
            .unwrap();

        assert_eq!(out[0]["id"], "cal1");
        assert_eq!(second.session.logins.load(Ordering::SeqCst), 0);
    }
}
