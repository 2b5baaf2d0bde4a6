use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

pub const NO_TITLE: &str = "(no title)";
pub const NO_SUBJECT: &str = "(no subject)";

/// A normalized object plus the fields that fell back to defaults.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extracted {
    fields: Map<String, Value>,
    missing: BTreeSet<String>,
}

impl Extracted {
    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Defaulted fields are listed under `incomplete` when there are any.
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        if !self.missing.is_empty() {
            fields.insert(
                "incomplete".to_string(),
                Value::Array(self.missing.into_iter().map(Value::String).collect()),
            );
        }
        Value::Object(fields)
    }
}

pub fn rfc3339(ts: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.to_rfc3339())
}

/// Reads fields out of a raw collaborator response by JSON pointer.
pub struct FieldReader<'a> {
    raw: &'a Value,
    out: Extracted,
}

impl<'a> FieldReader<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self {
            raw,
            out: Extracted::default(),
        }
    }

    fn found(&self, ptr: &str) -> Option<&'a Value> {
        self.raw.pointer(ptr).filter(|v| !v.is_null())
    }

    fn default_to(&mut self, key: &str, value: Value) {
        self.out.missing.insert(key.to_string());
        self.out.fields.insert(key.to_string(), value);
    }

    pub fn put(&mut self, key: &str, value: Value) -> &mut Self {
        self.out.fields.insert(key.to_string(), value);
        self
    }

    /// Strings pass through; numbers are rendered, so numeric ids survive.
    pub fn text(&mut self, key: &str, ptr: &str, default: &str) -> &mut Self {
        let value = match self.found(ptr) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        match value {
            Some(v) => self.put(key, Value::String(v)),
            None => {
                self.default_to(key, Value::String(default.to_string()));
                self
            }
        }
    }

    pub fn number(&mut self, key: &str, ptr: &str) -> &mut Self {
        match self.found(ptr).and_then(|v| v.as_i64()) {
            Some(n) => self.put(key, json!(n)),
            None => {
                self.default_to(key, json!(0));
                self
            }
        }
    }

    /// Unix seconds rendered as RFC 3339; `""` when absent.
    pub fn timestamp(&mut self, key: &str, ptr: &str) -> &mut Self {
        match self.found(ptr).and_then(|v| v.as_i64()).and_then(rfc3339) {
            Some(s) => self.put(key, Value::String(s)),
            None => {
                self.default_to(key, Value::String(String::new()));
                self
            }
        }
    }

    pub fn flag(&mut self, key: &str, ptr: &str, test: impl Fn(&Value) -> bool, default: bool) -> &mut Self {
        match self.found(ptr) {
            Some(v) => self.put(key, Value::Bool(test(v))),
            None => {
                self.default_to(key, Value::Bool(default));
                self
            }
        }
    }

    pub fn list(&mut self, key: &str, ptr: &str, map: impl Fn(&Value) -> Value) -> &mut Self {
        match self.found(ptr).and_then(|v| v.as_array()) {
            Some(items) => self.put(key, Value::Array(items.iter().map(map).collect())),
            None => {
                self.default_to(key, Value::Array(Vec::new()));
                self
            }
        }
    }

    pub fn finish(&mut self) -> Extracted {
        let out = std::mem::take(&mut self.out);
        if !out.missing.is_empty() {
            debug!(missing = ?out.missing, "defaulted fields in collaborator response");
        }
        out
    }
}

fn str_at(v: &Value, key: &str) -> Value {
    Value::String(v.get(key).and_then(|x| x.as_str()).unwrap_or("").to_string())
}

// --- Calendar

/// Shared event parts carry the cleartext fields; later parts win.
fn merged_shared_data(event: &Value) -> Value {
    let mut merged = Map::new();
    for part in event
        .get("SharedEvents")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        if let Some(data) = part.get("Data").and_then(|d| d.as_object()) {
            for (k, v) in data {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    Value::Object(merged)
}

pub fn event_item(event: &Value) -> Extracted {
    let view = json!({ "event": event, "shared": merged_shared_data(event) });
    let item = FieldReader::new(&view)
        .text("id", "/event/ID", "")
        .text("calendarId", "/event/CalendarID", "")
        .text("title", "/shared/Summary", NO_TITLE)
        .timestamp("start", "/event/StartTime")
        .timestamp("end", "/event/EndTime")
        .flag("allDay", "/event/FullDay", |v| v.as_i64().unwrap_or(0) != 0, false)
        .text("location", "/shared/Location", "")
        .text("description", "/shared/Description", "")
        .list("attendees", "/shared/Attendees", |a| {
            json!({ "email": str_at(a, "Email"), "name": str_at(a, "DisplayName") })
        })
        .flag(
            "visibility",
            "/event/Permissions",
            |v| v.as_i64().unwrap_or(0) != 0,
            false,
        )
        .finish();
    item.with_visibility_label()
}

impl Extracted {
    fn with_visibility_label(mut self) -> Self {
        let public = self
            .fields
            .get("visibility")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let label = if public { "PUBLIC" } else { "PRIVATE" };
        self.fields
            .insert("visibility".to_string(), Value::String(label.to_string()));
        self
    }
}

pub fn calendar_item(calendar: &Value) -> Extracted {
    FieldReader::new(calendar)
        .text("id", "/ID", "")
        .text("name", "/Name", "")
        .text("color", "/Color", "")
        .number("kind", "/Type")
        .flag("isOwned", "/IsOwned", |v| v.as_i64() == Some(1), false)
        .flag("isPrimary", "/IsPrimary", |v| v.as_i64() == Some(1), false)
        .finish()
}

// --- Mail

pub fn message_summary(msg: &Value) -> Extracted {
    FieldReader::new(msg)
        .text("id", "/ID", "")
        .text("subject", "/Subject", NO_SUBJECT)
        .text("sender", "/Sender/Address", "")
        .timestamp("date", "/Time")
        .flag("read", "/Unread", |v| v.as_i64() == Some(0), false)
        .number("size", "/Size")
        .finish()
}

pub fn search_item(msg: &Value) -> Extracted {
    FieldReader::new(msg)
        .text("id", "/ID", "")
        .text("subject", "/Subject", NO_SUBJECT)
        .text("sender", "/Sender/Address", "")
        .timestamp("date", "/Time")
        .finish()
}

pub fn message_detail(msg: &Value) -> Extracted {
    FieldReader::new(msg)
        .text("id", "/ID", "")
        .text("subject", "/Subject", NO_SUBJECT)
        .text("sender", "/Sender/Address", "")
        .list("to", "/ToList", |r| str_at(r, "Address"))
        .timestamp("date", "/Time")
        .text("body", "/Body", "")
        .list("attachments", "/Attachments", |a| {
            json!({
                "name": str_at(a, "Name"),
                "size": a.get("Size").and_then(|s| s.as_i64()).unwrap_or(0),
                "mime": str_at(a, "MIMEType"),
            })
        })
        .finish()
}

pub fn folder_item(label: &Value) -> Extracted {
    FieldReader::new(label)
        .text("id", "/ID", "")
        .text("name", "/Name", "")
        .number("kind", "/Type")
        .finish()
}

pub fn into_values(items: impl IntoIterator<Item = Extracted>) -> Vec<Value> {
    items.into_iter().map(Extracted::into_value).collect()
}
