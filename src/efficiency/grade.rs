use serde::Serialize;

use crate::db::ImageRecord;

/// Bytes transferred per rendered pixel, when the record has a usable box.
pub fn bytes_per_pixel(record: &ImageRecord) -> Option<f64> {
    if record.size == 0 {
        return None;
    }
    let pixels = record.rendered_pixels()?;
    Some(record.size as f64 / pixels as f64)
}

pub fn formatted_bytes_per_pixel(record: &ImageRecord) -> Option<String> {
    bytes_per_pixel(record).map(|bpp| format!("{bpp:.2}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EfficiencyGrade {
    A,
    B,
    C,
    D,
    F,
    Unknown,
}

impl EfficiencyGrade {
    pub const ALL: [EfficiencyGrade; 6] = [
        EfficiencyGrade::A,
        EfficiencyGrade::B,
        EfficiencyGrade::C,
        EfficiencyGrade::D,
        EfficiencyGrade::F,
        EfficiencyGrade::Unknown,
    ];

    pub fn from_bytes_per_pixel(bpp: f64) -> Self {
        if bpp < 0.3 {
            EfficiencyGrade::A
        } else if bpp < 0.9 {
            EfficiencyGrade::B
        } else if bpp < 1.8 {
            EfficiencyGrade::C
        } else if bpp < 4.0 {
            EfficiencyGrade::D
        } else {
            EfficiencyGrade::F
        }
    }

    pub fn for_record(record: &ImageRecord) -> Self {
        bytes_per_pixel(record)
            .map(Self::from_bytes_per_pixel)
            .unwrap_or(EfficiencyGrade::Unknown)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EfficiencyGrade::A => "A (Excellent)",
            EfficiencyGrade::B => "B (Good)",
            EfficiencyGrade::C => "C (Average)",
            EfficiencyGrade::D => "D (Poor)",
            EfficiencyGrade::F => "F (Inefficient)",
            EfficiencyGrade::Unknown => "Unknown",
        }
    }
}
