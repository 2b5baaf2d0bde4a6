//! Collaborator seams. Handlers only talk to these traits; the HTTP
//! adapters live in the submodules.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde_json::Value;

use crate::error::ProtonErrorOut;

mod calendar;
mod client;
mod mail;

pub use calendar::ProtonCalendar;
pub use client::ProtonClient;
pub use mail::ProtonMail;

#[derive(Debug, Clone, PartialEq)]
pub struct EventRange {
    pub from: DateTime<Local>,
    pub to: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub all_day: bool,
}

/// Only `Some` fields are sent; everything else stays as it is on the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl EventPatch {
    pub fn touched(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.date.is_some() {
            fields.push("date");
        }
        if self.time.is_some() {
            fields.push("time");
        }
        if self.duration_minutes.is_some() {
            fields.push("duration");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.location.is_some() {
            fields.push("location");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched().is_empty()
    }

    pub fn reschedules(&self) -> bool {
        self.date.is_some() || self.time.is_some() || self.duration_minutes.is_some()
    }
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<Value>, ProtonErrorOut>;

    async fn list_events(&self, range: &EventRange) -> Result<Vec<Value>, ProtonErrorOut>;

    /// `Ok(None)` when the id does not resolve.
    async fn get_event(&self, id: &str) -> Result<Option<Value>, ProtonErrorOut>;

    /// Returns the new event id when the service reports one.
    async fn create_event(&self, draft: &EventDraft) -> Result<Option<String>, ProtonErrorOut>;

    async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<(), ProtonErrorOut>;

    /// Completes only once the service confirms the deletion.
    async fn delete_event(&self, id: &str) -> Result<(), ProtonErrorOut>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Set when replying.
    pub parent_id: Option<String>,
}

#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn list_messages(&self, label_id: &str, limit: usize) -> Result<Vec<Value>, ProtonErrorOut>;

    /// `Ok(None)` when the id does not resolve.
    async fn get_message(&self, id: &str) -> Result<Option<Value>, ProtonErrorOut>;

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Option<String>, ProtonErrorOut>;

    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<Value>, ProtonErrorOut>;

    async fn delete_message(&self, id: &str) -> Result<(), ProtonErrorOut>;

    async fn list_labels(&self) -> Result<Vec<Value>, ProtonErrorOut>;
}
