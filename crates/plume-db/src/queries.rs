use crate::Database;
use crate::models::{AccountRow, MessageRow};
use anyhow::Result;
use rusqlite::Connection;

/// Outcome of an insert that may hit a uniqueness constraint.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

impl Database {
    // -- Accounts --

    /// Insert a locally-registered account. A UNIQUE violation on the
    /// username maps to `Conflict` so two concurrent registrations can
    /// never both win.
    pub fn create_local_account(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertOutcome> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO accounts (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            );
            match result {
                Ok(_) => Ok(InsertOutcome::Created),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_account_by_username(&self, username: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "username", username))
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "id", id))
    }

    /// Atomic find-or-create for federated logins. The UNIQUE constraint on
    /// federated_subject decides races: the losing insert is a no-op and the
    /// follow-up select resolves to the winner's row.
    pub fn find_or_create_federated(
        &self,
        id_if_new: &str,
        subject: &str,
        email: Option<&str>,
    ) -> Result<AccountRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, email, federated_subject) VALUES (?1, ?2, ?3)
                 ON CONFLICT(federated_subject) DO NOTHING",
                (id_if_new, email, subject),
            )?;
            query_account(conn, "federated_subject", subject)?
                .ok_or_else(|| anyhow::anyhow!("federated account missing after upsert"))
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient: &str,
        subject: &str,
        body: &str,
        scheduled_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient, subject, body, scheduled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, sender_id, recipient, subject, body, scheduled_at),
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient, subject, body, scheduled_at, created_at
                 FROM messages WHERE id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        recipient: row.get(2)?,
                        subject: row.get(3)?,
                        body: row.get(4)?,
                        scheduled_at: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Sessions --

    pub fn insert_session(
        &self,
        token_hash: &[u8],
        account_id: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, account_id, expires_at) VALUES (?1, ?2, ?3)",
                (token_hash, account_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Resolve a session token hash to its account. Expired sessions are
    /// treated as absent and removed on sight.
    pub fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let account_id: Option<String> = conn
                .query_row(
                    "SELECT account_id FROM sessions
                     WHERE token_hash = ?1 AND expires_at > datetime('now')",
                    [token_hash],
                    |row| row.get(0),
                )
                .optional()?;

            conn.execute(
                "DELETE FROM sessions WHERE expires_at <= datetime('now')",
                [],
            )?;

            match account_id {
                Some(id) => query_account(conn, "id", &id),
                None => Ok(None),
            }
        })
    }

    pub fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(())
        })
    }
}

fn query_account(conn: &Connection, column: &str, value: &str) -> Result<Option<AccountRow>> {
    // column is always a compile-time constant from this module
    let sql = format!(
        "SELECT id, username, email, password_hash, federated_subject, created_at
         FROM accounts WHERE {column} = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                federated_subject: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
