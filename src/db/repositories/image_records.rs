use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{to_i64, to_optional_u32, to_u64},
    models::ImageRecord,
};

fn row_to_image_record(row: &Row) -> Result<ImageRecord> {
    let size: i64 = row.get("size")?;

    Ok(ImageRecord {
        url: row.get("url")?,
        size: to_u64(size, "size")?,
        mime_type: row.get("mime_type")?,
        element_tag: row.get("element_tag")?,
        element_width: to_optional_u32(row.get("element_width")?, "element_width")?,
        element_height: to_optional_u32(row.get("element_height")?, "element_height")?,
    })
}

/// Removes every committed record. Only a new run clears the store.
pub(crate) fn clear_image_records(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM image_records", [])
        .context("failed to clear image records")?;
    Ok(())
}

impl Database {
    /// Appends a batch of records in one transaction.
    ///
    /// Either every record becomes visible or none does. A url that is
    /// already stored aborts the whole commit.
    pub async fn commit_image_records(&self, records: Vec<ImageRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open image commit transaction")?;
            let committed_at = Utc::now().to_rfc3339();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO image_records (
                        url,
                        size,
                        mime_type,
                        element_tag,
                        element_width,
                        element_height,
                        committed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;

                for record in &records {
                    stmt.execute(params![
                        record.url,
                        to_i64(record.size)?,
                        record.mime_type,
                        record.element_tag,
                        record.element_width,
                        record.element_height,
                        committed_at,
                    ])
                    .with_context(|| format!("failed to insert image record {}", record.url))?;
                }
            }

            tx.commit().context("failed to commit image records")?;
            Ok(records.len())
        })
        .await
    }

    /// All committed records in commit order.
    pub async fn get_image_records(&self) -> Result<Vec<ImageRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT url, size, mime_type, element_tag, element_width, element_height
                 FROM image_records
                 ORDER BY seq ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_image_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn committed_image_urls(&self) -> Result<HashSet<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT url FROM image_records")?;
            let urls = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(urls)
        })
        .await
    }

    pub async fn count_image_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM image_records", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }
}
