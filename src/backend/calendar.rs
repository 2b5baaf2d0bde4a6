use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::client::{response_code, ProtonClient, CODE_OK};
use super::{CalendarBackend, EventDraft, EventPatch, EventRange};
use crate::config::Credentials;
use crate::datetime::{reschedule, schedule, DEFAULT_DURATION_MINUTES};
use crate::error::ProtonErrorOut;
use crate::intercept::ResponseWindow;
use crate::session::{SessionBackend, SessionState};

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;

pub struct ProtonCalendar {
    client: ProtonClient,
    /// Calendar id or name chosen with `--calendar`.
    selector: Option<String>,
    quiescence: Duration,
    window: Duration,
}

fn matches_selector(calendar: &Value, selector: &str) -> bool {
    let id = calendar.get("ID").and_then(|v| v.as_str());
    let name = calendar.get("Name").and_then(|v| v.as_str());
    id == Some(selector) || name.is_some_and(|n| n.eq_ignore_ascii_case(selector))
}

fn is_set(calendar: &Value, key: &str) -> bool {
    calendar.get(key).and_then(|v| v.as_i64()) == Some(1)
}

fn calendar_id(calendar: &Value) -> Option<String> {
    calendar.get("ID").and_then(|v| v.as_str()).map(str::to_string)
}

impl ProtonCalendar {
    pub fn new(
        client: ProtonClient,
        selector: Option<String>,
        quiescence: Duration,
        window: Duration,
    ) -> Self {
        Self {
            client,
            selector,
            quiescence,
            window,
        }
    }

    /// Calendars in scope: the selected one, or all of them.
    async fn calendars_in_scope(&self) -> Result<Vec<Value>, ProtonErrorOut> {
        let calendars = self.list_calendars().await?;
        match &self.selector {
            Some(sel) => calendars
                .into_iter()
                .find(|c| matches_selector(c, sel))
                .map(|c| vec![c])
                .ok_or_else(|| ProtonErrorOut::usage(format!("unknown calendar: {sel}"))),
            None => Ok(calendars),
        }
    }

    /// The calendar single-event operations act on: primary, then owned, then first.
    async fn target_calendar(&self) -> Result<String, ProtonErrorOut> {
        let calendars = self.calendars_in_scope().await?;
        let chosen = calendars
            .iter()
            .find(|c| is_set(c, "IsPrimary"))
            .or_else(|| calendars.iter().find(|c| is_set(c, "IsOwned")))
            .or_else(|| calendars.first());
        chosen
            .and_then(calendar_id)
            .ok_or_else(|| ProtonErrorOut::api("account has no calendars"))
    }

    async fn fetch_pages(&self, calendars: &[String], range: &EventRange) -> Result<usize, ProtonErrorOut> {
        let mut pages = 0;
        for calendar_id in calendars {
            for page in 0..MAX_PAGES {
                let body = self
                    .client
                    .get(
                        &format!("calendar/v1/{calendar_id}/events"),
                        &[
                            ("Start", range.from.timestamp().to_string()),
                            ("End", range.to.timestamp().to_string()),
                            ("Timezone", "UTC".to_string()),
                            ("Type", "0".to_string()),
                            ("Page", page.to_string()),
                            ("PageSize", PAGE_SIZE.to_string()),
                        ],
                    )
                    .await?;
                pages += 1;
                if body.get("More").and_then(|m| m.as_i64()).unwrap_or(0) == 0 {
                    break;
                }
            }
        }
        Ok(pages)
    }

    fn event_path(calendar_id: &str, event_id: &str) -> String {
        format!("calendar/v1/{calendar_id}/events/{event_id}")
    }

    async fn fetch_event(&self, calendar_id: &str, id: &str) -> Result<Value, ProtonErrorOut> {
        let body = self.client.get(&Self::event_path(calendar_id, id), &[]).await?;
        Ok(body.get("Event").cloned().unwrap_or(body))
    }
}

#[async_trait]
impl CalendarBackend for ProtonCalendar {
    async fn list_calendars(&self) -> Result<Vec<Value>, ProtonErrorOut> {
        let body = self.client.get("calendar/v1", &[]).await?;
        Ok(body
            .get("Calendars")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn list_events(&self, range: &EventRange) -> Result<Vec<Value>, ProtonErrorOut> {
        let calendars: Vec<String> = self
            .calendars_in_scope()
            .await?
            .iter()
            .filter_map(calendar_id)
            .collect();
        let window = ResponseWindow::url_contains(&["/calendar/v1/", "/events"], self.quiescence, self.window);
        let mut rx = self.client.observe();

        // Collected while pages are fetched. Closing the subscription ends collection.
        let fetch = async {
            let fetched = self.fetch_pages(&calendars, range).await;
            self.client.stop_observing();
            fetched
        };
        let (fetched, responses) = tokio::join!(fetch, window.collect(&mut rx));
        let pages = fetched?;

        let mut late = 0;
        while rx.try_recv().is_ok() {
            late += 1;
        }
        if late > 0 {
            warn!(late, "event pages arrived after the collection window closed");
        }
        debug!(pages, collected = responses.len(), calendars = calendars.len(), "collected event pages");

        Ok(responses
            .iter()
            .filter_map(|r| r.body.get("Events").and_then(|e| e.as_array()))
            .flatten()
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: &str) -> Result<Option<Value>, ProtonErrorOut> {
        let calendar_id = self.target_calendar().await?;
        match self.fetch_event(&calendar_id, id).await {
            Ok(event) => Ok(Some(event)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, ProtonErrorOut> {
        let calendar_id = self.target_calendar().await?;
        let (start, end) = schedule(
            draft.date,
            draft.time,
            draft.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            draft.all_day,
        )?;

        let mut data = Map::new();
        data.insert("Summary".to_string(), json!(draft.title));
        if let Some(d) = &draft.description {
            data.insert("Description".to_string(), json!(d));
        }
        if let Some(l) = &draft.location {
            data.insert("Location".to_string(), json!(l));
        }

        let full_day = i32::from(draft.all_day);
        let body = self
            .client
            .post(
                &format!("calendar/v1/{calendar_id}/events"),
                &json!({
                    "StartTime": start,
                    "EndTime": end,
                    "FullDay": full_day,
                    "StartTimezone": "UTC",
                    "SharedEvents": [{ "Data": data }],
                }),
            )
            .await?;

        let id = body
            .pointer("/Event/ID")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        info!(calendar = %calendar_id, event = ?id, "event created");
        Ok(id)
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<(), ProtonErrorOut> {
        let calendar_id = self.target_calendar().await?;

        let mut data = Map::new();
        if let Some(t) = &patch.title {
            data.insert("Summary".to_string(), json!(t));
        }
        if let Some(d) = &patch.description {
            data.insert("Description".to_string(), json!(d));
        }
        if let Some(l) = &patch.location {
            data.insert("Location".to_string(), json!(l));
        }

        let mut body = Map::new();
        if !data.is_empty() {
            body.insert("SharedEvents".to_string(), json!([{ "Data": data }]));
        }

        if patch.reschedules() {
            let current = self.fetch_event(&calendar_id, id).await?;
            let start = current.get("StartTime").and_then(|v| v.as_i64());
            let end = current.get("EndTime").and_then(|v| v.as_i64());
            let (Some(start), Some(end)) = (start, end) else {
                return Err(ProtonErrorOut::api("event has no start/end time to reschedule"));
            };
            let (new_start, new_end) =
                reschedule(start, end, patch.date, patch.time, patch.duration_minutes)?;
            body.insert("StartTime".to_string(), json!(new_start));
            body.insert("EndTime".to_string(), json!(new_end));
        }

        self.client
            .put(&Self::event_path(&calendar_id, id), &Value::Object(body))
            .await?;
        info!(calendar = %calendar_id, event = %id, fields = ?patch.touched(), "event updated");
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<(), ProtonErrorOut> {
        let calendar_id = self.target_calendar().await?;
        let body = self.client.delete(&Self::event_path(&calendar_id, id)).await?;

        // The service acknowledges a completed deletion with code 1000.
        match response_code(&body) {
            Some(CODE_OK) => {
                info!(calendar = %calendar_id, event = %id, "event deleted");
                Ok(())
            }
            other => Err(ProtonErrorOut::api(format!(
                "deletion of {id} was not confirmed (code {})",
                other.map(|c| c.to_string()).unwrap_or_else(|| "missing".to_string())
            ))),
        }
    }
}

#[async_trait]
impl SessionBackend for ProtonCalendar {
    fn restore(&mut self, state: &SessionState) -> Result<(), ProtonErrorOut> {
        self.client.restore(state)
    }

    fn export(&self) -> Option<SessionState> {
        self.client.export()
    }

    fn reset(&mut self) {
        self.client.reset()
    }

    async fn probe(&self) -> bool {
        self.client.probe().await
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<(), ProtonErrorOut> {
        self.client.login(credentials).await
    }
}
