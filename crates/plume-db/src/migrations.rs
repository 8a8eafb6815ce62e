use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id                 TEXT PRIMARY KEY,
            username           TEXT UNIQUE,
            email              TEXT,
            password_hash      TEXT,
            federated_subject  TEXT UNIQUE,
            created_at         TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (password_hash IS NOT NULL OR federated_subject IS NOT NULL)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            sender_id     TEXT NOT NULL REFERENCES accounts(id),
            recipient     TEXT NOT NULL,
            subject       TEXT NOT NULL DEFAULT '',
            body          TEXT NOT NULL DEFAULT '',
            scheduled_at  TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, created_at);

        -- Only a hash of the session token is ever stored.
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash  BLOB PRIMARY KEY,
            account_id  TEXT NOT NULL REFERENCES accounts(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            expires_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_account
            ON sessions(account_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
