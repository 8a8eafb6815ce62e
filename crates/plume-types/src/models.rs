use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. At least one of `username`+password (local) or
/// `federated_subject` (OAuth) exists; the schema permits both on one
/// account even though linking is not wired up yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A composed, persisted record analogous to an email. Never transmitted
/// and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
