use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (bridge schema)");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id            INTEGER PRIMARY KEY,
                display_name  TEXT NOT NULL
            );

            CREATE TABLE chat_channels (
                id                 INTEGER PRIMARY KEY,
                origin_channel_id  INTEGER,
                public             INTEGER NOT NULL DEFAULT 0,
                closed             INTEGER NOT NULL DEFAULT 0,
                email_notifs       INTEGER NOT NULL DEFAULT 1,
                created_at         TEXT NOT NULL,
                last_updated       TEXT NOT NULL
            );

            -- SQLite UNIQUE admits any number of NULLs
            CREATE UNIQUE INDEX ix_chat_channels_origin_channel_id
                ON chat_channels(origin_channel_id);

            CREATE TABLE chat_messages (
                id                 INTEGER PRIMARY KEY,
                channel_id         INTEGER NOT NULL REFERENCES chat_channels(id),
                origin_message_id  INTEGER,
                user_id            INTEGER REFERENCES users(id),
                origin_user_id     INTEGER,
                text               TEXT NOT NULL,
                hidden             INTEGER NOT NULL DEFAULT 0,
                created_at         TEXT NOT NULL,
                last_updated       TEXT NOT NULL
            );

            CREATE INDEX ix_chat_messages_channel_id ON chat_messages(channel_id);
            CREATE INDEX ix_chat_messages_origin_message_id ON chat_messages(origin_message_id);
            CREATE INDEX ix_chat_messages_user_id ON chat_messages(user_id);
            CREATE INDEX ix_channel_id_hidden ON chat_messages(channel_id, hidden);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn failed_migration_leaves_no_partial_schema() {
        let conn = Connection::open_in_memory().unwrap();
        // Collides with the last table v1 creates
        conn.execute_batch("CREATE TABLE chat_messages (id INTEGER PRIMARY KEY);")
            .unwrap();

        assert!(run(&conn).is_err());
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'chat_channels')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);

        conn.execute_batch("DROP TABLE chat_messages;").unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
