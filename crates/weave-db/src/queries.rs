use crate::SnapshotDb;
use crate::models::{Snapshot, TimelineRow};
use anyhow::Result;
use rusqlite::Connection;
use serde_json::de::from_str;
use tracing::{debug, error};
use weave_types::ConversationId;

impl SnapshotDb {
    /// Replace the stored snapshot in one transaction.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = chrono::Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute_batch("DELETE FROM briefs; DELETE FROM stash; DELETE FROM timelines;")?;

            {
                let mut stmt = tx.prepare("INSERT INTO briefs (conversation, data) VALUES (?1, ?2)")?;
                for (id, brief) in &snapshot.briefs {
                    stmt.execute((id.to_string(), serde_json::to_string(brief)?))?;
                }

                let mut stmt = tx.prepare("INSERT INTO stash (conversation, data) VALUES (?1, ?2)")?;
                for (id, meta) in &snapshot.stash {
                    stmt.execute((id.to_string(), serde_json::to_string(meta)?))?;
                }

                let mut stmt = tx.prepare(
                    "INSERT INTO timelines (conversation, pairs, entry_count, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (id, pairs) in &snapshot.timelines {
                    stmt.execute(rusqlite::params![
                        id.to_string(),
                        serde_json::to_string(pairs)?,
                        pairs.len() as i64,
                        now,
                    ])?;
                }
            }

            tx.commit()?;
            debug!(
                "Saved snapshot: {} briefs, {} stash, {} timelines",
                snapshot.briefs.len(),
                snapshot.stash.len(),
                snapshot.timelines.len()
            );
            Ok(())
        })
    }

    /// Load the stored snapshot. Rows that fail to decode are logged and left
    /// out rather than failing the whole load.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        self.with_conn(|conn| {
            let mut snapshot = Snapshot::default();

            for (key, data) in query_pairs(conn, "SELECT conversation, data FROM briefs")? {
                if let Some((id, brief)) = decode_row(&key, &data, "brief") {
                    snapshot.briefs.insert(id, brief);
                }
            }

            for (key, data) in query_pairs(conn, "SELECT conversation, data FROM stash")? {
                if let Some((id, meta)) = decode_row(&key, &data, "stash") {
                    snapshot.stash.insert(id, meta);
                }
            }

            for (key, data) in query_pairs(conn, "SELECT conversation, pairs FROM timelines")? {
                if let Some((id, pairs)) = decode_row(&key, &data, "timeline") {
                    snapshot.timelines.insert(id, pairs);
                }
            }

            Ok(snapshot)
        })
    }

    pub fn timeline_rows(&self) -> Result<Vec<TimelineRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation, entry_count, updated_at FROM timelines ORDER BY conversation",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TimelineRow {
                        conversation: row.get(0)?,
                        entry_count: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute_batch("DELETE FROM briefs; DELETE FROM stash; DELETE FROM timelines;")?;
            Ok(())
        })
    }
}

fn query_pairs(conn: &Connection, sql: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn decode_row<T: serde::de::DeserializeOwned>(
    key: &str,
    data: &str,
    table: &str,
) -> Option<(ConversationId, T)> {
    let id = match key.parse::<ConversationId>() {
        Ok(id) => id,
        Err(e) => {
            error!("Skipping {} row with bad key {:?}: {}", table, key, e);
            return None;
        }
    };
    match from_str(data) {
        Ok(value) => Some((id, value)),
        Err(e) => {
            error!("Skipping corrupt {} row for {}: {}", table, id, e);
            None
        }
    }
}
