use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::to_u64,
    models::{Observation, ObservedSize},
};

fn row_to_observation(row: &Row) -> Result<Observation> {
    let size: String = row.get("size")?;

    Ok(Observation {
        url: row.get("url")?,
        size: ObservedSize::from_header(&size),
        mime_type: row.get("mime_type")?,
    })
}

impl Database {
    /// Appends an observation to the durable hand-off queue.
    pub async fn enqueue_pending_image(&self, observation: &Observation) -> Result<()> {
        let record = observation.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pending_images (url, size, mime_type, queued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.url,
                    record.size.to_string(),
                    record.mime_type,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to queue pending image {}", record.url))?;
            Ok(())
        })
        .await
    }

    /// Reads and clears the queue as one unit, in arrival order.
    ///
    /// Only rows up to the highest sequence number that was read are
    /// deleted, so a row written after the read survives into the next
    /// drain instead of being silently discarded.
    pub async fn drain_pending_images(&self) -> Result<Vec<Observation>> {
        self.execute(|conn| {
            let tx = conn
                .transaction()
                .context("failed to open pending drain transaction")?;

            let mut drained = Vec::new();
            let mut high_water: Option<i64> = None;
            {
                let mut stmt = tx.prepare(
                    "SELECT seq, url, size, mime_type
                     FROM pending_images
                     ORDER BY seq ASC",
                )?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    high_water = Some(row.get("seq")?);
                    drained.push(row_to_observation(row)?);
                }
            }

            if let Some(max_seq) = high_water {
                tx.execute("DELETE FROM pending_images WHERE seq <= ?1", params![max_seq])
                    .context("failed to clear drained pending images")?;
            }

            tx.commit().context("failed to commit pending drain")?;
            Ok(drained)
        })
        .await
    }

    /// Queue contents without consuming them.
    pub async fn peek_pending_images(&self) -> Result<Vec<Observation>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, url, size, mime_type FROM pending_images ORDER BY seq ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut pending = Vec::new();
            while let Some(row) = rows.next()? {
                pending.push(row_to_observation(row)?);
            }
            Ok(pending)
        })
        .await
    }

    pub async fn count_pending_images(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM pending_images", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }
}
