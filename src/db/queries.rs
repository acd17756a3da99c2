use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Credential;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Google accounts ──

pub fn get_credential(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Credential>> {
    let row = conn
        .query_row(
            "SELECT access_token, refresh_token, email, expires_at FROM google_accounts WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    Ok(row.map(|(access_token, refresh_token, email, expires_at)| Credential {
        access_token,
        refresh_token,
        email,
        expires_at: expires_at
            .and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok()),
    }))
}

pub fn save_credential(conn: &Connection, user_id: &str, credential: &Credential) -> anyhow::Result<()> {
    let expires_at = credential
        .expires_at
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string());

    conn.execute(
        "INSERT INTO google_accounts (user_id, email, access_token, refresh_token, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
           email = COALESCE(excluded.email, google_accounts.email),
           access_token = excluded.access_token,
           refresh_token = COALESCE(excluded.refresh_token, google_accounts.refresh_token),
           expires_at = excluded.expires_at,
           updated_at = datetime('now')",
        params![
            user_id,
            credential.email,
            credential.access_token,
            credential.refresh_token,
            expires_at
        ],
    )?;
    Ok(())
}
