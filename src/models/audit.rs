use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Approved,
    Rejected,
    AutoClosed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Approved => "approved",
            AuditAction::Rejected => "rejected",
            AuditAction::AutoClosed => "auto_closed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AuditAction::Created),
            "approved" => Ok(AuditAction::Approved),
            "rejected" => Ok(AuditAction::Rejected),
            "auto_closed" => Ok(AuditAction::AutoClosed),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// Append-only record of a state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub action: AuditAction,
    pub performed_by: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of an entry before it is stored.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub action: AuditAction,
    pub performed_by: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub notes: Option<String>,
}
