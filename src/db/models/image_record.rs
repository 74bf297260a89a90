//! Committed image results.
//!
//! An `ImageRecord` is the correlated, deduplicated form of an
//! [`Observation`](super::Observation). `url` is the natural key of the
//! result store: no two records share one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub element_tag: Option<String>,
    pub element_width: Option<u32>,
    pub element_height: Option<u32>,
}

impl ImageRecord {
    /// Rendered pixel area, when the element was found and has a non-empty box.
    pub fn rendered_pixels(&self) -> Option<u64> {
        match (self.element_width, self.element_height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(u64::from(width) * u64::from(height))
            }
            _ => None,
        }
    }
}
