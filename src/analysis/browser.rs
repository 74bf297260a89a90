//! The browser as seen by the orchestrator: window geometry and tab reloads.
//! How the extension carries these out is its own business.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    Fullscreen,
}

/// Window geometry captured before resizing, used to put things back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub id: i64,
    #[serde(default)]
    pub state: WindowState,
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub top: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Result<Self> {
        match (width, height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Self { width, height }),
            _ => bail!(
                "Invalid dimensions: {}x{}",
                width.map_or_else(|| "NaN".to_string(), |w| w.to_string()),
                height.map_or_else(|| "NaN".to_string(), |h| h.to_string())
            ),
        }
    }
}

/// Leading-integer parse of a dimension as the popup sends it: `"1280"`,
/// `"1280px"` and `1280` all give 1280; anything without leading digits is
/// `None`.
pub fn parse_dimension(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Deserializes a dimension given as a number or a string; unparsable values
/// become `None` so the orchestrator can report them.
pub fn deserialize_dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDimension {
        Integer(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<RawDimension>::deserialize(deserializer)? {
        Some(RawDimension::Integer(value)) => u32::try_from(value).ok(),
        Some(RawDimension::Float(value)) if value.is_finite() && value >= 0.0 => {
            u32::try_from(value.trunc() as u64).ok()
        }
        Some(RawDimension::Text(text)) => parse_dimension(&text),
        _ => None,
    })
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn current_window(&self) -> Result<WindowInfo>;

    /// Resizes the window, leaving maximized/fullscreen first if needed.
    async fn resize_window(&self, window_id: i64, viewport: Viewport) -> Result<WindowInfo>;

    async fn restore_window(&self, original: &WindowInfo) -> Result<WindowInfo>;

    /// Scrolls to the top and reloads the active tab bypassing the cache.
    async fn reload_active_tab(&self) -> Result<()>;
}
