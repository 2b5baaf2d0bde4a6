use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::client::{response_code, ProtonClient, CODE_NOT_FOUND, CODE_OK};
use super::{MailBackend, OutgoingMessage};
use crate::config::RuntimeConfig;
use crate::error::ProtonErrorOut;

/// Proton label types: custom folders (3), then user labels (1).
const LABEL_TYPES: [&str; 2] = ["3", "1"];
/// Message action flag marking a draft as a reply.
const ACTION_REPLY: i64 = 0;

pub struct ProtonMail {
    client: ProtonClient,
}

fn array_at(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

impl ProtonMail {
    /// Logs in fresh; the mail tool keeps no session between runs.
    pub async fn connect(cfg: &RuntimeConfig) -> Result<Self, ProtonErrorOut> {
        let mut client = ProtonClient::new(cfg)?;
        client.login(&cfg.credentials).await?;
        Ok(Self { client })
    }

    async fn query_messages(&self, query: Vec<(&str, String)>) -> Result<Vec<Value>, ProtonErrorOut> {
        let body = self.client.get("mail/v4/messages", &query).await?;
        Ok(array_at(&body, "Messages"))
    }
}

#[async_trait]
impl MailBackend for ProtonMail {
    async fn list_messages(&self, label_id: &str, limit: usize) -> Result<Vec<Value>, ProtonErrorOut> {
        self.query_messages(vec![
            ("LabelID", label_id.to_string()),
            ("Page", "0".to_string()),
            ("PageSize", limit.to_string()),
            ("Limit", limit.to_string()),
            ("Sort", "Time".to_string()),
            ("Desc", "1".to_string()),
        ])
        .await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Value>, ProtonErrorOut> {
        match self.client.get(&format!("mail/v4/messages/{id}"), &[]).await {
            Ok(body) => Ok(Some(body.get("Message").cloned().unwrap_or(body))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Option<String>, ProtonErrorOut> {
        let mut draft = json!({
            "Message": {
                "ToList": [{ "Address": message.to }],
                "Subject": message.subject,
                "Body": message.body,
                "MIMEType": "text/plain",
            }
        });
        if let Some(parent) = &message.parent_id {
            draft["ParentID"] = json!(parent);
            draft["Action"] = json!(ACTION_REPLY);
        }

        let created = self.client.post("mail/v4/messages", &draft).await?;
        let draft_id = created
            .pointer("/Message/ID")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProtonErrorOut::api("draft creation returned no message id"))?
            .to_string();

        let sent = self
            .client
            .post(&format!("mail/v4/messages/{draft_id}"), &json!({ "Packages": [] }))
            .await?;

        let id = sent
            .pointer("/Sent/ID")
            .and_then(|v| v.as_str())
            .unwrap_or(&draft_id)
            .to_string();
        info!(message = %id, reply = message.parent_id.is_some(), "message sent");
        Ok(Some(id))
    }

    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<Value>, ProtonErrorOut> {
        self.query_messages(vec![
            ("Keyword", query.to_string()),
            ("Page", "0".to_string()),
            ("PageSize", limit.to_string()),
            ("Limit", limit.to_string()),
            ("Sort", "Time".to_string()),
            ("Desc", "1".to_string()),
        ])
        .await
    }

    async fn delete_message(&self, id: &str) -> Result<(), ProtonErrorOut> {
        let body = self
            .client
            .put("mail/v4/messages/delete", &json!({ "IDs": [id] }))
            .await?;

        // Per-message confirmation: the entry for `id` must report code 1000.
        let code = array_at(&body, "Responses")
            .iter()
            .find(|r| r.get("ID").and_then(|v| v.as_str()) == Some(id))
            .and_then(|r| r.get("Response"))
            .and_then(response_code);

        match code {
            Some(CODE_OK) => {
                info!(message = %id, "message deleted");
                Ok(())
            }
            Some(CODE_NOT_FOUND) => Err(ProtonErrorOut::not_found(format!("message {id} not found"))),
            Some(other) => Err(ProtonErrorOut::api(format!(
                "deletion of {id} was rejected (code {other})"
            ))),
            None => Err(ProtonErrorOut::api(format!("deletion of {id} was not confirmed"))),
        }
    }

    /// Custom folders first, then user labels.
    async fn list_labels(&self) -> Result<Vec<Value>, ProtonErrorOut> {
        let mut labels = Vec::new();
        for kind in LABEL_TYPES {
            let body = self
                .client
                .get("core/v4/labels", &[("Type", kind.to_string())])
                .await?;
            labels.extend(array_at(&body, "Labels"));
        }
        Ok(labels)
    }
}
