use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DispatchError;

/// Request for the notification service to email a task invite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub to: String,
    pub from: String,
    pub task_name: String,
    pub description: String,
}

impl Invite {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.to.trim().is_empty() {
            return Err(DispatchError::InvalidInvite("recipient is empty".to_string()));
        }
        if self.task_name.trim().is_empty() {
            return Err(DispatchError::InvalidInvite("task name is empty".to_string()));
        }
        Ok(())
    }
}

pub trait InviteDispatcher {
    fn send_invite(&self, invite: &Invite) -> Result<(), DispatchError>;
}

#[derive(Debug, Deserialize)]
struct ServiceReply {
    #[serde(default)]
    error: Option<String>,
}

/// Posts invites as JSON to `<endpoint>/send-invite`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpDispatcher {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let base = endpoint.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(DispatchError::InvalidInvite("notification endpoint is empty".to_string()));
        }
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{base}/send-invite"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InviteDispatcher for HttpDispatcher {
    #[tracing::instrument(skip(self, invite), fields(url = %self.url, to = %invite.to))]
    fn send_invite(&self, invite: &Invite) -> Result<(), DispatchError> {
        invite.validate()?;

        let response = self.client.post(&self.url).json(invite).send()?;
        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "invite accepted");
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        let reason = serde_json::from_str::<ServiceReply>(&body)
            .ok()
            .and_then(|reply| reply.error)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        warn!(status = status.as_u16(), reason = %reason, "invite rejected");
        debug!(body = %body, "rejection body");
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }
}
