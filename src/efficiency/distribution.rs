use serde::Serialize;

use crate::db::ImageRecord;

/// Images below this share of the total are folded into "Other".
pub const OTHER_SHARE: f64 = 0.03;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeSlice {
    pub label: String,
    /// `None` for the "Other" slice.
    pub url: Option<String>,
    pub bytes: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDistribution {
    pub total_bytes: u64,
    pub slices: Vec<SizeSlice>,
}

impl SizeDistribution {
    pub fn from_records(records: &[ImageRecord]) -> Self {
        let total_bytes: u64 = records.iter().map(|record| record.size).sum();
        let threshold = total_bytes as f64 * OTHER_SHARE;
        let percentage = |bytes: u64| {
            if total_bytes == 0 {
                0.0
            } else {
                bytes as f64 / total_bytes as f64 * 100.0
            }
        };

        let mut slices = Vec::new();
        let mut other_bytes = 0u64;
        for record in records {
            if record.size as f64 >= threshold {
                slices.push(SizeSlice {
                    label: format!("{} ({})", file_name(&record.url), kilobytes(record.size)),
                    url: Some(record.url.clone()),
                    bytes: record.size,
                    percentage: percentage(record.size),
                });
            } else {
                other_bytes += record.size;
            }
        }

        if other_bytes > 0 {
            slices.push(SizeSlice {
                label: format!("Other ({})", kilobytes(other_bytes)),
                url: None,
                bytes: other_bytes,
                percentage: percentage(other_bytes),
            });
        }

        Self {
            total_bytes,
            slices,
        }
    }
}

fn file_name(url: &str) -> &str {
    match url.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "Image",
    }
}

fn kilobytes(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}
