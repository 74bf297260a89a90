use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_analysis_state, parse_datetime},
    models::{AnalysisState, AnalysisStatus, StateSurface},
    repositories::image_records::clear_image_records,
};

impl Database {
    pub async fn get_analysis_status(&self) -> Result<AnalysisStatus> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT state, run_id, updated_at FROM analysis_state WHERE id = 1")?;
            let mut rows = stmt.query([])?;
            let row = rows
                .next()?
                .ok_or_else(|| anyhow!("analysis_state row missing"))?;

            let state: String = row.get("state")?;
            let updated_at: String = row.get("updated_at")?;

            Ok(AnalysisStatus {
                state: parse_analysis_state(&state)?,
                run_id: row.get("run_id")?,
                updated_at: parse_datetime(&updated_at, "updated_at")?,
            })
        })
        .await
    }

    pub async fn get_analysis_state(&self) -> Result<AnalysisState> {
        Ok(self.get_analysis_status().await?.state)
    }

    pub async fn set_analysis_state(&self, state: AnalysisState) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE analysis_state SET state = ?1, updated_at = ?2 WHERE id = 1",
                params![state.as_str(), Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to set analysis state to {}", state.as_str()))?;
            Ok(())
        })
        .await
    }

    /// Starts a fresh run: clears records and any stale queued observations,
    /// then marks the run in progress, all in one transaction.
    pub async fn begin_analysis_run(&self, run_id: &str) -> Result<()> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open analysis reset transaction")?;
            clear_image_records(&tx)?;
            tx.execute("DELETE FROM pending_images", [])?;
            tx.execute(
                "UPDATE analysis_state
                 SET state = ?1, run_id = ?2, updated_at = ?3
                 WHERE id = 1",
                params![
                    AnalysisState::InProgress.as_str(),
                    run_id,
                    Utc::now().to_rfc3339()
                ],
            )?;
            tx.commit().context("failed to commit analysis reset")?;
            Ok(())
        })
        .await
    }

    /// Consistent read of everything the popup shows.
    pub async fn get_state_surface(&self) -> Result<StateSurface> {
        let image_data = self.get_image_records().await?;
        let analysis_state = self.get_analysis_state().await?;
        let pending_images = self.peek_pending_images().await?;

        Ok(StateSurface {
            image_data,
            analysis_state,
            pending_images,
        })
    }
}
