use serde_json::{json, Value};
use tracing::debug;

use crate::backend::{CalendarBackend, EventDraft, EventPatch, EventRange};
use crate::cli::{CalendarCommand, EventCreateArgs, EventUpdateArgs, IdArgs};
use crate::datetime::{event_range, parse_date, parse_time};
use crate::error::ProtonErrorOut;
use crate::output::Outcome;
use crate::schema::{calendar_item, event_item, into_values};

const EVENT_NOT_FOUND: &str = "Event not found or could not be parsed";

/// A calendar command with every flag checked and parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarRequest {
    List(EventRange),
    Get { id: String },
    Create(EventDraft),
    Update { id: String, patch: EventPatch },
    Delete { id: String },
    Calendars,
}

fn required_id(args: &IdArgs) -> Result<String, ProtonErrorOut> {
    required(args.id.as_deref(), "--id is required")
}

fn required(value: Option<&str>, message: &str) -> Result<String, ProtonErrorOut> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProtonErrorOut::usage(message))
}

fn positive_duration(duration: Option<u32>) -> Result<Option<u32>, ProtonErrorOut> {
    match duration {
        Some(0) => Err(ProtonErrorOut::usage("--duration must be at least 1 minute")),
        other => Ok(other),
    }
}

fn draft_from(args: &EventCreateArgs) -> Result<EventDraft, ProtonErrorOut> {
    let (Some(title), Some(date)) = (
        args.title.as_deref().filter(|t| !t.trim().is_empty()),
        args.date.as_deref(),
    ) else {
        return Err(ProtonErrorOut::usage("--title and --date are required"));
    };

    Ok(EventDraft {
        title: title.to_string(),
        date: parse_date(date)?,
        time: args.time.as_deref().map(parse_time).transpose()?,
        duration_minutes: positive_duration(args.duration)?,
        description: args.description.clone(),
        location: args.location.clone(),
        all_day: args.all_day,
    })
}

fn patch_from(args: &EventUpdateArgs) -> Result<EventPatch, ProtonErrorOut> {
    let patch = EventPatch {
        title: args.title.clone(),
        date: args.date.as_deref().map(parse_date).transpose()?,
        time: args.time.as_deref().map(parse_time).transpose()?,
        duration_minutes: positive_duration(args.duration)?,
        description: args.description.clone(),
        location: args.location.clone(),
    };
    if patch.is_empty() {
        return Err(ProtonErrorOut::usage(
            "update requires at least one field to change",
        ));
    }
    Ok(patch)
}

impl CalendarRequest {
    pub fn from_command(command: &CalendarCommand) -> Result<Self, ProtonErrorOut> {
        Ok(match command {
            CalendarCommand::List(args) => {
                let (from, to) = event_range(args.from.as_deref(), args.to.as_deref())?;
                Self::List(EventRange { from, to })
            }
            CalendarCommand::Get(args) => Self::Get {
                id: required_id(args)?,
            },
            CalendarCommand::Create(args) => Self::Create(draft_from(args)?),
            CalendarCommand::Update(args) => Self::Update {
                id: required(args.id.as_deref(), "--id is required")?,
                patch: patch_from(args)?,
            },
            CalendarCommand::Delete(args) => Self::Delete {
                id: required_id(args)?,
            },
            CalendarCommand::Calendars => Self::Calendars,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Get { .. } => "get",
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Calendars => "calendars",
        }
    }
}

pub async fn execute<B>(request: &CalendarRequest, backend: &B) -> Outcome
where
    B: CalendarBackend + ?Sized,
{
    match request {
        CalendarRequest::List(range) => {
            let events = backend.list_events(range).await?;
            debug!(count = events.len(), "events listed");
            Ok(Value::Array(into_values(events.iter().map(event_item))))
        }

        CalendarRequest::Get { id } => match backend.get_event(id).await? {
            Some(raw) => {
                let mut item = event_item(&raw).into_value();
                if item["id"].as_str().is_some_and(str::is_empty) {
                    item["id"] = json!(id);
                }
                Ok(item)
            }
            None => Ok(json!({ "id": id, "error": EVENT_NOT_FOUND })),
        },

        CalendarRequest::Create(draft) => {
            let id = backend.create_event(draft).await?;
            // Echo what was supplied; unset optional flags stay null.
            let time = match (draft.all_day, draft.time) {
                (true, _) => Some("all-day".to_string()),
                (false, t) => t.map(|t| t.format("%H:%M").to_string()),
            };
            Ok(json!({
                "status": "created",
                "id": id,
                "title": draft.title,
                "date": draft.date.format("%Y-%m-%d").to_string(),
                "time": time,
                "duration": draft.duration_minutes,
                "location": draft.location,
                "description": draft.description,
            }))
        }

        CalendarRequest::Update { id, patch } => {
            backend.update_event(id, patch).await?;
            Ok(json!({
                "status": "updated",
                "id": id,
                "updated": patch.touched(),
            }))
        }

        CalendarRequest::Delete { id } => {
            backend.delete_event(id).await?;
            Ok(json!({ "status": "deleted", "id": id }))
        }

        CalendarRequest::Calendars => {
            let calendars = backend.list_calendars().await?;
            Ok(Value::Array(into_values(calendars.iter().map(calendar_item))))
        }
    }
}
