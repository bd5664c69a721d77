use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grant lifecycle transition announced to the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantEventAction {
    /// A grant was created.
    Granted,
    /// A grant was revoked.
    Revoked,
}

/// Fire-and-forget notification payload emitted after grant mutations commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantEvent {
    /// Grant identifier.
    pub grant_id: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Grantee principal.
    pub grantee_id: String,
    /// Lifecycle transition.
    pub action: GrantEventAction,
    /// Transaction timestamp.
    pub timestamp: DateTime<Utc>,
}
