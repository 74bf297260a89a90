//! Process-wide analysis lifecycle flag, read by the popup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ImageRecord, Observation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisState {
    #[default]
    Idle,
    InProgress,
    Completed,
    Stopped,
    Error,
}

impl AnalysisState {
    pub const ALL: [AnalysisState; 5] = [
        AnalysisState::Idle,
        AnalysisState::InProgress,
        AnalysisState::Completed,
        AnalysisState::Stopped,
        AnalysisState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisState::Idle => "idle",
            AnalysisState::InProgress => "in-progress",
            AnalysisState::Completed => "completed",
            AnalysisState::Stopped => "stopped",
            AnalysisState::Error => "error",
        }
    }
}

/// Stored analysis state plus the run it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub state: AnalysisState,
    pub run_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the UI reads, keyed the way the extension's storage keys are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSurface {
    pub image_data: Vec<ImageRecord>,
    pub analysis_state: AnalysisState,
    pub pending_images: Vec<Observation>,
}
