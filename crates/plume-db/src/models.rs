/// Database row types — these map directly to SQLite rows.
/// Distinct from plume-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub federated_subject: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub scheduled_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub account_id: String,
    pub expires_at: String,
}
