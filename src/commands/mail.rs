use serde_json::{json, Value};
use tracing::debug;

use crate::backend::{MailBackend, OutgoingMessage};
use crate::cli::{IdArgs, MailCommand, ReplyArgs, SendArgs};
use crate::error::ProtonErrorOut;
use crate::output::Outcome;
use crate::schema::{folder_item, into_values, message_detail, message_summary, search_item};

const MESSAGE_NOT_FOUND: &str = "Message not found or could not be parsed";

/// Built-in folders and their label ids.
const FOLDERS: &[(&str, &str, &str)] = &[
    ("inbox", "0", "Inbox"),
    ("drafts", "1", "Drafts"),
    ("sent", "2", "Sent"),
    ("trash", "3", "Trash"),
    ("spam", "4", "Spam"),
    ("all", "5", "All mail"),
    ("archive", "6", "Archive"),
];

/// Label type of built-in folders.
const SYSTEM_FOLDER_KIND: i64 = 4;

/// Case-insensitive; anything unknown lands in the inbox.
pub fn folder_label_id(folder: &str) -> &'static str {
    let folder = folder.trim();
    FOLDERS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(folder))
        .map_or(FOLDERS[0].1, |(_, id, _)| *id)
}

pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if subject.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailRequest {
    List { label_id: &'static str, limit: usize },
    Read { id: String },
    Send(OutgoingMessage),
    Reply { id: String, body: String },
    Search { query: String, limit: usize },
    Delete { id: String },
    Folders,
}

fn required(value: Option<&str>, message: &str) -> Result<String, ProtonErrorOut> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProtonErrorOut::usage(message))
}

fn required_id(args: &IdArgs) -> Result<String, ProtonErrorOut> {
    required(args.id.as_deref(), "--id is required")
}

fn bounded(limit: usize) -> Result<usize, ProtonErrorOut> {
    if limit == 0 {
        return Err(ProtonErrorOut::usage("--limit must be at least 1"));
    }
    Ok(limit)
}

fn outgoing_from(args: &SendArgs) -> Result<OutgoingMessage, ProtonErrorOut> {
    let (Some(to), Some(subject), Some(body)) = (
        args.to.as_deref().map(str::trim).filter(|v| !v.is_empty()),
        args.subject.as_deref(),
        args.body.as_deref(),
    ) else {
        return Err(ProtonErrorOut::usage("--to, --subject and --body are required"));
    };
    Ok(OutgoingMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        parent_id: None,
    })
}

fn reply_from(args: &ReplyArgs) -> Result<MailRequest, ProtonErrorOut> {
    let (Some(id), Some(body)) = (
        args.id.as_deref().map(str::trim).filter(|v| !v.is_empty()),
        args.body.as_deref(),
    ) else {
        return Err(ProtonErrorOut::usage("--id and --body are required"));
    };
    Ok(MailRequest::Reply {
        id: id.to_string(),
        body: body.to_string(),
    })
}

impl MailRequest {
    pub fn from_command(command: &MailCommand) -> Result<Self, ProtonErrorOut> {
        Ok(match command {
            MailCommand::List(args) => Self::List {
                label_id: folder_label_id(&args.folder),
                limit: bounded(args.limit)?,
            },
            MailCommand::Read(args) => Self::Read {
                id: required_id(args)?,
            },
            MailCommand::Send(args) => Self::Send(outgoing_from(args)?),
            MailCommand::Reply(args) => reply_from(args)?,
            MailCommand::Search(args) => Self::Search {
                query: required(args.query.as_deref(), "--query is required")?,
                limit: bounded(args.limit)?,
            },
            MailCommand::Delete(args) => Self::Delete {
                id: required_id(args)?,
            },
            MailCommand::Folders => Self::Folders,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Read { .. } => "read",
            Self::Send(_) => "send",
            Self::Reply { .. } => "reply",
            Self::Search { .. } => "search",
            Self::Delete { .. } => "delete",
            Self::Folders => "folders",
        }
    }
}

fn system_folders() -> impl Iterator<Item = Value> {
    FOLDERS
        .iter()
        .map(|(_, id, name)| json!({ "ID": id, "Name": name, "Type": SYSTEM_FOLDER_KIND }))
}

pub async fn execute<B>(request: &MailRequest, backend: &B) -> Outcome
where
    B: MailBackend + ?Sized,
{
    match request {
        MailRequest::List { label_id, limit } => {
            let mut messages = backend.list_messages(label_id, *limit).await?;
            messages.truncate(*limit);
            debug!(count = messages.len(), label = %label_id, "messages listed");
            Ok(Value::Array(into_values(messages.iter().map(message_summary))))
        }

        MailRequest::Read { id } => match backend.get_message(id).await? {
            Some(raw) => {
                let mut item = message_detail(&raw).into_value();
                if item["id"].as_str().is_some_and(str::is_empty) {
                    item["id"] = json!(id);
                }
                Ok(item)
            }
            None => Ok(json!({ "id": id, "error": MESSAGE_NOT_FOUND })),
        },

        MailRequest::Send(message) => {
            let id = backend.send_message(message).await?;
            Ok(json!({
                "status": "sent",
                "to": message.to,
                "subject": message.subject,
                "id": id,
            }))
        }

        MailRequest::Reply { id, body } => {
            let original = backend
                .get_message(id)
                .await?
                .ok_or_else(|| ProtonErrorOut::not_found(format!("message {id} not found")))?;
            let original = message_detail(&original);

            let to = original
                .get("sender")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ProtonErrorOut::api(format!("message {id} has no sender address")))?
                .to_string();
            let subject = reply_subject(
                original
                    .get("subject")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default(),
            );

            let reply = OutgoingMessage {
                to,
                subject,
                body: body.clone(),
                parent_id: Some(id.clone()),
            };
            backend.send_message(&reply).await?;
            Ok(json!({
                "status": "replied",
                "id": id,
                "to": reply.to,
                "subject": reply.subject,
            }))
        }

        MailRequest::Search { query, limit } => {
            let mut messages = backend.search_messages(query, *limit).await?;
            messages.truncate(*limit);
            Ok(Value::Array(into_values(messages.iter().map(search_item))))
        }

        MailRequest::Delete { id } => {
            backend.delete_message(id).await?;
            Ok(json!({ "status": "deleted", "id": id }))
        }

        MailRequest::Folders => {
            let custom = backend.list_labels().await?;
            let folders = system_folders().chain(custom);
            Ok(Value::Array(into_values(folders.map(|f| folder_item(&f)))))
        }
    }
}
